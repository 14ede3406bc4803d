use serde::{Deserialize, Serialize};

use crate::errors::{ErrorKind, GenerationError};

/// A renderable pointer to a generated image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageReference {
    Url { url: String },
    InlineData { data: String, mime_type: String },
}

impl ImageReference {
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url { url: url.into() }
    }

    pub fn inline(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::InlineData {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn is_url(&self) -> bool {
        matches!(self, Self::Url { .. })
    }

    /// The form a browser can put straight into an `<img src>`.
    pub fn to_client_string(&self) -> String {
        match self {
            Self::Url { url } => url.clone(),
            Self::InlineData { data, mime_type } => format!("data:{mime_type};base64,{data}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationOutcome {
    Complete { image_ref: ImageReference },
    Failed { reason: ErrorKind, detail: String },
}

impl GenerationOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }

    pub fn reason(&self) -> Option<ErrorKind> {
        match self {
            Self::Complete { .. } => None,
            Self::Failed { reason, .. } => Some(*reason),
        }
    }

    pub fn image_ref(&self) -> Option<&ImageReference> {
        match self {
            Self::Complete { image_ref } => Some(image_ref),
            Self::Failed { .. } => None,
        }
    }
}

impl From<GenerationError> for GenerationOutcome {
    fn from(err: GenerationError) -> Self {
        Self::Failed {
            reason: err.kind,
            detail: err.detail,
        }
    }
}

impl From<Result<ImageReference, GenerationError>> for GenerationOutcome {
    fn from(result: Result<ImageReference, GenerationError>) -> Self {
        match result {
            Ok(image_ref) => Self::Complete { image_ref },
            Err(err) => err.into(),
        }
    }
}
