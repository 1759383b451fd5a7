//! HTTP plumbing shared by the providers: client construction and mapping
//! transport failures and non-2xx statuses onto [`ProviderError`].

use codecouncil_core::error::ProviderError;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use std::time::Duration;
use tracing::warn;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

pub(crate) fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

pub(crate) fn transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(err.to_string())
    } else {
        ProviderError::Network(err.to_string())
    }
}

/// Map a non-success response onto a provider error.
///
/// `body` is the raw error body; `message_of` pulls a readable message out
/// of the provider's error envelope when it has one.
pub(crate) fn status_error(
    provider: &str,
    status: StatusCode,
    headers: &HeaderMap,
    body: String,
    message_of: impl Fn(&str) -> Option<String>,
) -> ProviderError {
    let message = message_of(&body).unwrap_or(body);
    warn!(provider, status = status.as_u16(), message = %message, "Provider returned error");

    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited {
            retry_after_secs: retry_after(headers).unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProviderError::AuthenticationFailed(message)
        }
        StatusCode::NOT_FOUND => ProviderError::ModelNotFound(message),
        _ => ProviderError::ApiError {
            status_code: status.as_u16(),
            message,
        },
    }
}

/// Seconds from a `Retry-After` header. HTTP-date values are ignored.
fn retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
