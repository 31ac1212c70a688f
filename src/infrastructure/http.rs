use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::domain::errors::DomainError;

impl From<reqwest::Error> for DomainError {
    fn from(e: reqwest::Error) -> Self {
        DomainError::UpstreamUnavailable(e.to_string())
    }
}

/// `{message, data}` wrapper every downstream service answers with.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub message: String,
    pub data: T,
}

/// One pooled client for every outbound call in the process.
pub fn build_client(timeout: Duration) -> Result<Client, DomainError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| DomainError::Internal(format!("failed to build HTTP client: {}", e)))
}

/// Comma-separated id list for `?ids=` query parameters.
pub fn ids_param(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// GET `url` with the caller's bearer token and unwrap the envelope.
pub async fn get_envelope<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    token: &str,
) -> Result<T, DomainError> {
    let response = client
        .get(url)
        .bearer_auth(token)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(DomainError::UpstreamUnavailable(format!(
            "GET {} returned {}: {}",
            url,
            status,
            body.chars().take(200).collect::<String>()
        )));
    }

    let envelope: Envelope<T> = response.json().await?;
    Ok(envelope.data)
}
