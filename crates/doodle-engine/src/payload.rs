use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use doodle_contracts::GenerationError;
use reqwest::multipart::{Form, Part};
use sha2::{Digest, Sha256};

pub const DEFAULT_MIME_TYPE: &str = "image/png";

/// Raw sketch bytes plus their MIME type, decoded once from a data URL.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    bytes: Vec<u8>,
    mime_type: String,
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("bytes", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Accepts `data:<mime>;base64,<data>` or a bare base64 string (assumed PNG).
    pub fn decode(data_url: &str) -> Result<Self, GenerationError> {
        let trimmed = data_url.trim();
        if trimmed.is_empty() {
            return Err(GenerationError::invalid_input("No image provided"));
        }

        let (mime_type, encoded) = match split_data_url(trimmed) {
            Some(parts) => parts?,
            None => (DEFAULT_MIME_TYPE.to_string(), trimmed),
        };
        let bytes = BASE64
            .decode(encoded)
            .map_err(|err| GenerationError::invalid_input(format!("image is not valid base64: {err}")))?;
        if bytes.is_empty() {
            return Err(GenerationError::invalid_input("image data is empty"));
        }
        Ok(Self { bytes, mime_type })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn to_inline_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_inline_base64())
    }

    /// Appends the bytes to `form` as a file field.
    pub fn to_multipart(
        &self,
        form: Form,
        field_name: &str,
        file_name: &str,
    ) -> Result<Form, GenerationError> {
        let part = Part::bytes(self.bytes.clone())
            .file_name(file_name.to_string())
            .mime_str(&self.mime_type)
            .map_err(|err| {
                GenerationError::invalid_input(format!(
                    "unsupported image type '{}': {err}",
                    self.mime_type
                ))
            })?;
        Ok(form.part(field_name.to_string(), part))
    }

    /// Short stable digest for logs and journals; never the bytes themselves.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.bytes);
        hex::encode(&digest[..8])
    }
}

/// `None` when the string carries no `data:` prefix.
pub(crate) fn split_data_url(raw: &str) -> Option<Result<(String, &str), GenerationError>> {
    let rest = raw.strip_prefix("data:")?;
    let Some((header, data)) = rest.split_once(',') else {
        return Some(Err(GenerationError::invalid_input(
            "image data URL is missing its ',' separator",
        )));
    };
    let mut params = header.split(';');
    let mime_type = params
        .next()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_MIME_TYPE)
        .to_string();
    if !params.any(|param| param.trim().eq_ignore_ascii_case("base64")) {
        return Some(Err(GenerationError::invalid_input(
            "only base64 image data URLs are supported",
        )));
    }
    Some(Ok((mime_type, data.trim())))
}
