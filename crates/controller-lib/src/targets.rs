//! Building the target list from parallel `;`-separated configuration values

use crate::error::ConfigError;
use crate::models::Target;

/// Separator between entries in each list
pub const LIST_SEPARATOR: char = ';';

fn split_list(value: &str) -> Vec<&str> {
    value.split(LIST_SEPARATOR).map(str::trim).collect()
}

/// Zip hostnames, ports and container-group names by position
///
/// All three lists must have the same length. Nothing is contacted here, so a
/// mismatch aborts the run before any network call.
pub fn parse_targets(hosts: &str, ports: &str, instances: &str) -> Result<Vec<Target>, ConfigError> {
    let hosts = split_list(hosts);
    let ports = split_list(ports);
    let instances = split_list(instances);

    if hosts.len() != ports.len() || ports.len() != instances.len() {
        return Err(ConfigError::LengthMismatch {
            hosts: hosts.len(),
            ports: ports.len(),
            instances: instances.len(),
        });
    }

    hosts
        .into_iter()
        .zip(ports)
        .zip(instances)
        .enumerate()
        .map(|(position, ((host, port), instance))| {
            if host.is_empty() {
                return Err(ConfigError::EmptyEntry {
                    field: "hostname",
                    position,
                });
            }
            if instance.is_empty() {
                return Err(ConfigError::EmptyEntry {
                    field: "container group",
                    position,
                });
            }
            let port = port.parse::<u16>().map_err(|_| ConfigError::InvalidPort {
                value: port.to_string(),
                position,
            })?;
            Ok(Target::new(host, port, instance))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aligned_lists() {
        let targets = parse_targets(
            "mc1.example.com; mc2.example.com",
            "25565;25566",
            "mc-one;mc-two",
        )
        .unwrap();

        assert_eq!(
            targets,
            vec![
                Target::new("mc1.example.com", 25565, "mc-one"),
                Target::new("mc2.example.com", 25566, "mc-two"),
            ]
        );
    }

    #[test]
    fn test_single_target() {
        let targets = parse_targets("localhost", "25565", "mc").unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].address(), "localhost:25565");
    }

    #[test]
    fn test_length_mismatch() {
        let err = parse_targets("a;b;c", "1;2", "x;y;z").unwrap_err();
        assert_eq!(
            err,
            ConfigError::LengthMismatch {
                hosts: 3,
                ports: 2,
                instances: 3
            }
        );
    }

    #[test]
    fn test_invalid_port() {
        let err = parse_targets("a;b", "25565;70000", "x;y").unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidPort {
                value: "70000".to_string(),
                position: 1
            }
        );
    }

    #[test]
    fn test_empty_entry() {
        let err = parse_targets("a;", "1;2", "x;y").unwrap_err();
        assert_eq!(
            err,
            ConfigError::EmptyEntry {
                field: "hostname",
                position: 1
            }
        );
    }
}
