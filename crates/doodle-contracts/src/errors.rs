use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of every way a generation can fail.
///
/// Only `InvalidInput` is correctable by the person submitting the sketch;
/// the rest are provider or operator problems and surface as server errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    Misconfigured,
    ProviderRejected,
    Unreachable,
    GenerationFailed,
    Timeout,
    UnexpectedResponseShape,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::Misconfigured => "misconfigured",
            Self::ProviderRejected => "provider_rejected",
            Self::Unreachable => "unreachable",
            Self::GenerationFailed => "generation_failed",
            Self::Timeout => "timeout",
            Self::UnexpectedResponseShape => "unexpected_response_shape",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn http_status(self) -> u16 {
        match self {
            Self::InvalidInput => 400,
            _ => 500,
        }
    }

    /// Whether a single failed status check may be retried on the next poll.
    pub fn is_transient_poll_error(self) -> bool {
        matches!(self, Self::Unreachable | Self::ProviderRejected)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {detail}")]
pub struct GenerationError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl GenerationError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn invalid_input(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, detail)
    }

    pub fn misconfigured(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Misconfigured, detail)
    }

    pub fn rejected(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProviderRejected, detail)
    }

    pub fn unreachable(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unreachable, detail)
    }

    pub fn unexpected_shape(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnexpectedResponseShape, detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_invalid_input_maps_to_bad_request() {
        assert_eq!(ErrorKind::InvalidInput.http_status(), 400);
        for kind in [
            ErrorKind::Misconfigured,
            ErrorKind::ProviderRejected,
            ErrorKind::Unreachable,
            ErrorKind::GenerationFailed,
            ErrorKind::Timeout,
            ErrorKind::UnexpectedResponseShape,
            ErrorKind::Cancelled,
        ] {
            assert_eq!(kind.http_status(), 500, "{kind}");
        }
    }

    #[test]
    fn display_includes_kind_and_detail() {
        let err = GenerationError::rejected("quota exceeded");
        assert_eq!(err.to_string(), "provider_rejected: quota exceeded");
    }

    #[test]
    fn wire_name_matches_serde_name() -> anyhow::Result<()> {
        let encoded = serde_json::to_value(ErrorKind::UnexpectedResponseShape)?;
        assert_eq!(encoded, serde_json::json!("unexpected_response_shape"));
        Ok(())
    }

    #[test]
    fn transport_and_status_errors_are_transient_during_polling() {
        assert!(ErrorKind::Unreachable.is_transient_poll_error());
        assert!(ErrorKind::ProviderRejected.is_transient_poll_error());
        assert!(!ErrorKind::GenerationFailed.is_transient_poll_error());
        assert!(!ErrorKind::UnexpectedResponseShape.is_transient_poll_error());
    }
}
