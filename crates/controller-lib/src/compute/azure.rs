//! Azure Container Instances client

use super::{BearerToken, ComputeControl};
use crate::error::ComputeApiError;
use crate::models::{ComputeAction, ComputeState, RunState};
use async_trait::async_trait;
use reqwest::{header::CONTENT_LENGTH, Client};
use serde::Deserialize;
use tracing::debug;
use url::Url;

/// Control-plane API version for container groups
pub const API_VERSION: &str = "2023-05-01";

pub const DEFAULT_MANAGEMENT_URL: &str = "https://management.azure.com";

/// Client for container groups in one subscription and resource group
#[derive(Debug, Clone)]
pub struct ContainerGroupClient {
    client: Client,
    base_url: Url,
    subscription_id: String,
    resource_group: String,
}

impl ContainerGroupClient {
    /// Create a new client. Requests use the HTTP client's default timeouts.
    pub fn new(
        base_url: &str,
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
    ) -> Result<Self, ComputeApiError> {
        Ok(Self {
            client: Client::new(),
            base_url: Url::parse(base_url)?,
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
        })
    }

    /// URL of a container group, or of one of its actions
    fn group_url(&self, instance: &str, action: Option<ComputeAction>) -> Result<Url, ComputeApiError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ComputeApiError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?;
            segments.pop_if_empty().extend([
                "subscriptions",
                self.subscription_id.as_str(),
                "resourceGroups",
                self.resource_group.as_str(),
                "providers",
                "Microsoft.ContainerInstance",
                "containerGroups",
                instance,
            ]);
            if let Some(action) = action {
                segments.push(action.as_str());
            }
        }
        url.query_pairs_mut().append_pair("api-version", API_VERSION);
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &Url) -> Result<String, ComputeApiError> {
        let response = request.send().await.map_err(|source| ComputeApiError::Request {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ComputeApiError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl ComputeControl for ContainerGroupClient {
    async fn get_state(
        &self,
        instance: &str,
        token: &BearerToken,
    ) -> Result<ComputeState, ComputeApiError> {
        let url = self.group_url(instance, None)?;
        let request = self.client.get(url.clone()).bearer_auth(token.secret());
        let body = self.send(request, &url).await?;

        parse_container_group(instance, &body)
    }

    async fn apply_action(
        &self,
        instance: &str,
        action: ComputeAction,
        token: &BearerToken,
    ) -> Result<(), ComputeApiError> {
        let url = self.group_url(instance, Some(action))?;
        let request = self
            .client
            .post(url.clone())
            .bearer_auth(token.secret())
            .header(CONTENT_LENGTH, 0);
        let body = self.send(request, &url).await?;

        debug!(instance = %instance, action = %action, response = %body, "Container action accepted");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ContainerGroup {
    properties: GroupProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupProperties {
    #[serde(default)]
    containers: Vec<Container>,
    ip_address: Option<IpAddress>,
}

#[derive(Debug, Deserialize)]
struct Container {
    #[serde(default)]
    name: String,
    properties: Option<ContainerProperties>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContainerProperties {
    instance_view: Option<InstanceView>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceView {
    current_state: Option<CurrentState>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentState {
    state: Option<String>,
    start_time: Option<String>,
    finish_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IpAddress {
    fqdn: Option<String>,
    ip: Option<String>,
}

/// Turn a container group document into a [`ComputeState`]
///
/// Uses the container named like the group, else the first one. A missing
/// instance view means the group has not run for a while.
pub fn parse_container_group(instance: &str, body: &str) -> Result<ComputeState, ComputeApiError> {
    let group: ContainerGroup =
        serde_json::from_str(body).map_err(|e| ComputeApiError::Malformed(e.to_string()))?;

    let fqdn = group
        .properties
        .ip_address
        .and_then(|ip| ip.fqdn.or(ip.ip));

    let containers = &group.properties.containers;
    let current = containers
        .iter()
        .find(|c| c.name == instance)
        .or_else(|| containers.first())
        .and_then(|c| c.properties.as_ref())
        .and_then(|p| p.instance_view.as_ref())
        .and_then(|v| v.current_state.as_ref());

    let Some(current) = current else {
        return Ok(ComputeState {
            fqdn,
            ..ComputeState::long_stopped()
        });
    };

    let state = current
        .state
        .as_deref()
        .map(RunState::from)
        .unwrap_or(RunState::Terminated);

    let state_since = if state == RunState::Running {
        current.start_time.clone().or_else(|| current.finish_time.clone())
    } else {
        current.finish_time.clone().or_else(|| current.start_time.clone())
    };

    Ok(ComputeState {
        state,
        state_since,
        fqdn,
    })
}
