//! Trigger for fleet runs: a cron schedule, or a single run

use chrono::{DateTime, Utc};
use controller_lib::ConfigError;
use cron::Schedule;
use std::str::FromStr;
use std::time::Duration;

/// When fleet runs happen
#[derive(Debug, Clone)]
pub enum Trigger {
    /// One run, then exit (an external scheduler invokes us)
    Once,
    /// Repeated runs on a six-field cron schedule (sec min hour dom month dow)
    Cron(Box<Schedule>),
}

impl Trigger {
    pub fn parse(expression: Option<&str>) -> Result<Self, ConfigError> {
        let expression = match expression.map(str::trim) {
            None | Some("") => return Ok(Trigger::Once),
            Some(expression) => expression,
        };

        Schedule::from_str(expression)
            .map(|schedule| Trigger::Cron(Box::new(schedule)))
            .map_err(|e| ConfigError::InvalidSchedule {
                expression: expression.to_string(),
                reason: e.to_string(),
            })
    }

    /// Delay from `now` until the next run, or `None` when no run follows
    pub fn next_delay(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self {
            Trigger::Once => None,
            Trigger::Cron(schedule) => schedule
                .after(&now)
                .next()
                .map(|next| (next - now).to_std().unwrap_or(Duration::ZERO)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_no_expression_runs_once() {
        let trigger = Trigger::parse(None).unwrap();
        assert!(matches!(trigger, Trigger::Once));
        assert_eq!(trigger.next_delay(Utc::now()), None);

        assert!(matches!(Trigger::parse(Some("  ")).unwrap(), Trigger::Once));
    }

    #[test]
    fn test_every_five_minutes() {
        let trigger = Trigger::parse(Some("0 */5 * * * *")).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 3, 30).unwrap();

        assert_eq!(trigger.next_delay(now), Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_invalid_expression() {
        let err = Trigger::parse(Some("every five minutes")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSchedule { .. }));
    }
}
