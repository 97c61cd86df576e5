//! Shared HTTP plumbing for the service clients.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use skyview_core::ServiceConfig;

use crate::types::ServiceError;

/// Build a client with the configured timeout and User-Agent.
pub(crate) fn build_client(config: &ServiceConfig) -> Result<Client, ServiceError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.as_str())
        .build()?;
    Ok(client)
}

pub(crate) fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Decode a successful JSON body, mapping every other outcome to an error.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ServiceError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ServiceError::Status {
            status: status.as_u16(),
            url: response.url().to_string(),
        });
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| ServiceError::Parse(e.to_string()))
}
