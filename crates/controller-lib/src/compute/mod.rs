//! Cloud control-plane access for container groups
//!
//! The fleet driver only sees the [`ComputeControl`] and [`TokenSource`]
//! traits. The bearer token is acquired once per run and passed by reference
//! into every call.

mod azure;
mod token;

pub use azure::{parse_container_group, ContainerGroupClient, API_VERSION, DEFAULT_MANAGEMENT_URL};
pub use token::{ClientCredentials, DEFAULT_AUTHORITY_URL, MANAGEMENT_SCOPE};

use crate::error::ComputeApiError;
use crate::models::{ComputeAction, ComputeState};
use std::fmt;

pub use async_trait::async_trait;

/// OAuth bearer token for the control plane
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// Read and actuate container groups
#[async_trait]
pub trait ComputeControl: Send + Sync {
    /// Current run state of a container group
    async fn get_state(
        &self,
        instance: &str,
        token: &BearerToken,
    ) -> Result<ComputeState, ComputeApiError>;

    /// Trigger an action. Returns once the control plane acknowledged the
    /// request, not when the action has completed.
    async fn apply_action(
        &self,
        instance: &str,
        action: ComputeAction,
        token: &BearerToken,
    ) -> Result<(), ComputeApiError>;
}

/// Issues bearer tokens for the control plane
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn acquire(&self) -> Result<BearerToken, ComputeApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_debug_is_redacted() {
        let token = BearerToken::new("super-secret");
        assert_eq!(token.secret(), "super-secret");
        assert!(!format!("{token:?}").contains("super-secret"));
    }
}
