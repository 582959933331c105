use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use relay_core::errors::{ConfigError, RemoteError};

use crate::error_parsing::parse_api_error;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared HTTP client. `timeout` bounds whole requests; `None` keeps reqwest's default.
pub fn build_http_client(timeout: Option<Duration>) -> Result<Client, ConfigError> {
    let mut builder = Client::builder().connect_timeout(CONNECT_TIMEOUT);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}

/// Send a prepared request and decode a JSON success body.
pub(crate) async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, RemoteError> {
    let resp = request
        .send()
        .await
        .map_err(|e| RemoteError::NetworkError(e.to_string()))?;

    if !resp.status().is_success() {
        return Err(error_from_response(resp).await);
    }

    resp.json::<T>()
        .await
        .map_err(|e| RemoteError::MalformedResponse(e.to_string()))
}

/// Field deserializer that treats an explicit JSON `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

async fn error_from_response(resp: Response) -> RemoteError {
    let status = resp.status().as_u16();
    let retry_after = resp
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = resp.text().await.unwrap_or_default();
    let info = parse_api_error(&body, status);

    match RemoteError::from_status(status, info.message, info.code) {
        RemoteError::RateLimited { message, .. } => RemoteError::RateLimited {
            retry_after,
            message,
        },
        other => other,
    }
}
