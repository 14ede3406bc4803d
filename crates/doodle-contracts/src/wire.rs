use serde::{Deserialize, Serialize};

use crate::errors::GenerationError;
use crate::outcome::GenerationOutcome;

pub const DEFAULT_IMAGINATION: u8 = 50;

/// Body of `POST /api/generate` as the drawing page sends it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateBody {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub imagination: Option<f64>,
}

impl GenerateBody {
    pub fn new(image: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            image: Some(image.into()),
            prompt: Some(prompt.into()),
            imagination: None,
        }
    }

    pub fn with_imagination(mut self, imagination: f64) -> Self {
        self.imagination = Some(imagination);
        self
    }

    /// Imagination rounded and clamped to `0..=100`, 50 when unset.
    pub fn imagination_level(&self) -> u8 {
        match self.imagination {
            Some(value) if value.is_finite() => value.round().clamp(0.0, 100.0) as u8,
            _ => DEFAULT_IMAGINATION,
        }
    }

    pub fn prompt_text(&self) -> &str {
        self.prompt.as_deref().map(str::trim).unwrap_or("")
    }
}

/// Reply body: `{ "image": ... }` on success, `{ "error": ... }` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GenerateReply {
    Image { image: String },
    Error { error: String },
}

impl GenerateReply {
    /// HTTP status paired with the reply body.
    pub fn from_outcome(outcome: &GenerationOutcome) -> (u16, Self) {
        match outcome {
            GenerationOutcome::Complete { image_ref } => (
                200,
                Self::Image {
                    image: image_ref.to_client_string(),
                },
            ),
            GenerationOutcome::Failed { reason, detail } => (
                reason.http_status(),
                Self::Error {
                    error: user_message(&GenerationError::new(*reason, detail.clone())),
                },
            ),
        }
    }
}

fn user_message(err: &GenerationError) -> String {
    use crate::errors::ErrorKind;

    let headline = match err.kind {
        ErrorKind::InvalidInput => return err.detail.clone(),
        ErrorKind::Misconfigured => "Image provider is not configured",
        ErrorKind::ProviderRejected => "Image provider rejected the request",
        ErrorKind::Unreachable => "Image provider is unreachable",
        ErrorKind::GenerationFailed => "Image generation failed",
        ErrorKind::Timeout => "Timed out waiting for image generation",
        ErrorKind::UnexpectedResponseShape => "Unexpected response from image provider",
        ErrorKind::Cancelled => "Image generation was cancelled",
    };
    if err.detail.trim().is_empty() {
        headline.to_string()
    } else {
        format!("{headline}: {}", err.detail)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::errors::ErrorKind;
    use crate::outcome::ImageReference;

    #[test]
    fn imagination_defaults_to_fifty_and_clamps() {
        let mut body = GenerateBody::new("data:image/png;base64,AA==", "cat");
        assert_eq!(body.imagination_level(), 50);
        body.imagination = Some(140.0);
        assert_eq!(body.imagination_level(), 100);
        body.imagination = Some(-3.0);
        assert_eq!(body.imagination_level(), 0);
        body.imagination = Some(20.4);
        assert_eq!(body.imagination_level(), 20);
        body.imagination = Some(f64::NAN);
        assert_eq!(body.imagination_level(), 50);
    }

    #[test]
    fn body_accepts_missing_fields() -> anyhow::Result<()> {
        let body: GenerateBody = serde_json::from_value(json!({ "image": "abc" }))?;
        assert_eq!(body.image.as_deref(), Some("abc"));
        assert_eq!(body.prompt_text(), "");
        assert_eq!(body.imagination_level(), 50);
        Ok(())
    }

    #[test]
    fn success_reply_serializes_image_only() -> anyhow::Result<()> {
        let outcome = GenerationOutcome::Complete {
            image_ref: ImageReference::inline("AQID", "image/png"),
        };
        let (status, reply) = GenerateReply::from_outcome(&outcome);
        assert_eq!(status, 200);
        assert_eq!(
            serde_json::to_value(reply)?,
            json!({ "image": "data:image/png;base64,AQID" })
        );
        Ok(())
    }

    #[test]
    fn failure_reply_uses_kind_status_and_message() -> anyhow::Result<()> {
        let outcome = GenerationOutcome::Failed {
            reason: ErrorKind::InvalidInput,
            detail: "No image provided".to_string(),
        };
        let (status, reply) = GenerateReply::from_outcome(&outcome);
        assert_eq!(status, 400);
        assert_eq!(
            serde_json::to_value(reply)?,
            json!({ "error": "No image provided" })
        );

        let outcome = GenerationOutcome::Failed {
            reason: ErrorKind::Timeout,
            detail: "60 polls".to_string(),
        };
        let (status, reply) = GenerateReply::from_outcome(&outcome);
        assert_eq!(status, 500);
        assert_eq!(
            reply,
            GenerateReply::Error {
                error: "Timed out waiting for image generation: 60 polls".to_string()
            }
        );
        Ok(())
    }
}
