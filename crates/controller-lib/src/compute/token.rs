//! OAuth client-credentials token acquisition

use super::{BearerToken, TokenSource};
use crate::error::ComputeApiError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use tracing::debug;
use url::Url;

pub const DEFAULT_AUTHORITY_URL: &str = "https://login.microsoftonline.com";

/// Scope granting access to the management API
pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Service principal credentials exchanged for a bearer token
#[derive(Clone)]
pub struct ClientCredentials {
    client: Client,
    authority: Url,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    scope: String,
}

impl ClientCredentials {
    pub fn new(
        authority: &str,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, ComputeApiError> {
        Ok(Self {
            client: Client::new(),
            authority: Url::parse(authority)?,
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: MANAGEMENT_SCOPE.to_string(),
        })
    }

    /// Request a different scope than the management API
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    fn token_url(&self) -> Result<Url, ComputeApiError> {
        let mut url = self.authority.clone();
        url.path_segments_mut()
            .map_err(|_| ComputeApiError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend([self.tenant_id.as_str(), "oauth2", "v2.0", "token"]);
        Ok(url)
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("authority", &self.authority.as_str())
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenSource for ClientCredentials {
    async fn acquire(&self) -> Result<BearerToken, ComputeApiError> {
        let url = self.token_url()?;
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];

        let response = self
            .client
            .post(url.clone())
            .form(&form)
            .send()
            .await
            .map_err(|source| ComputeApiError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ComputeApiError::Token {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.map_err(|source| ComputeApiError::Request {
            url: url.to_string(),
            source,
        })?;
        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|e| ComputeApiError::Malformed(e.to_string()))?;

        debug!(expires_in = ?token.expires_in, "Acquired control-plane token");
        Ok(BearerToken::new(token.access_token))
    }
}
