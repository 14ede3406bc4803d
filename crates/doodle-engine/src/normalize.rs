use doodle_contracts::{GenerationError, ImageReference};
use serde_json::Value;

use crate::http::preview;
use crate::payload::split_data_url;

const URL_FIELDS: &[&str] = &["url"];
const INLINE_FIELDS: &[&str] = &["base64", "b64_json"];
const MIME_FIELDS: &[&str] = &["mime_type", "mimeType", "content_type"];

/// Pulls exactly one image out of a provider's "completed" payload.
///
/// Strings starting with `http` are URLs, anything else is inline base64
/// tagged with `default_mime`. Arrays yield their first element only.
/// Objects prefer `url` over inline data.
pub fn normalize_image(payload: &Value, default_mime: &str) -> Result<ImageReference, GenerationError> {
    extract(payload, default_mime).ok_or_else(|| {
        GenerationError::unexpected_shape(format!(
            "no usable image in provider response: {}",
            preview(payload)
        ))
    })
}

fn extract(payload: &Value, default_mime: &str) -> Option<ImageReference> {
    match payload {
        Value::String(raw) => from_string(raw, default_mime),
        Value::Array(items) => items.first().and_then(|first| extract(first, default_mime)),
        Value::Object(obj) => {
            if let Some(url) = first_non_empty(obj, URL_FIELDS) {
                return Some(ImageReference::url(url));
            }
            let data = first_non_empty(obj, INLINE_FIELDS)?;
            let mime = first_non_empty(obj, MIME_FIELDS).unwrap_or(default_mime);
            from_string(data, mime)
        }
        _ => None,
    }
}

fn from_string(raw: &str, default_mime: &str) -> Option<ImageReference> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with("http") {
        return Some(ImageReference::url(trimmed));
    }
    match split_data_url(trimmed) {
        Some(Ok((mime, data))) if !data.is_empty() => Some(ImageReference::inline(data, mime)),
        Some(_) => None,
        None => Some(ImageReference::inline(trimmed, default_mime)),
    }
}

fn first_non_empty<'a>(obj: &'a serde_json::Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| obj.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|value| !value.is_empty())
}
