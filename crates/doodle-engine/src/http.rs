use std::time::Duration;

use doodle_contracts::{GenerationError, ProviderKind};
use reqwest::{Client as HttpClient, Response as HttpResponse};
use serde_json::Value;

const ERROR_BODY_MAX_CHARS: usize = 512;

pub(crate) fn build_client(timeout: Duration) -> Result<HttpClient, GenerationError> {
    HttpClient::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| GenerationError::misconfigured(format!("http client build failed: {err}")))
}

pub(crate) fn transport_error(provider: ProviderKind, err: reqwest::Error) -> GenerationError {
    let cause = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    // Request URLs may carry credentials; keep them out of the detail.
    GenerationError::unreachable(format!("{provider} {cause}: {}", err.without_url()))
}

/// Reads the body; non-2xx becomes `ProviderRejected` with the body verbatim.
pub(crate) async fn response_json_or_error(
    provider: ProviderKind,
    response: HttpResponse,
) -> Result<Value, GenerationError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| transport_error(provider, err))?;
    if !status.is_success() {
        return Err(GenerationError::rejected(format!(
            "{provider} request failed ({}): {}",
            status.as_u16(),
            truncate_text(&body, ERROR_BODY_MAX_CHARS)
        )));
    }
    serde_json::from_str(&body).map_err(|err| {
        GenerationError::unexpected_shape(format!("{provider} returned invalid JSON payload: {err}"))
    })
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

/// Compact rendering of a payload for error details.
pub(crate) fn preview(value: &Value) -> String {
    truncate_text(&value.to_string(), 200)
}

#[cfg(test)]
mod tests {
    use super::truncate_text;

    #[test]
    fn truncate_text_counts_chars_not_bytes() {
        assert_eq!(truncate_text("héllo", 10), "héllo");
        assert_eq!(truncate_text("héllo", 2), "hé…");
    }
}
