use async_trait::async_trait;
use doodle_contracts::{GenerationError, ImageReference, ProviderKind};
use reqwest::Client as HttpClient;
use serde_json::{json, Value};

use super::{ProviderAdapter, Submission};
use crate::config::ProviderConfig;
use crate::http::{build_client, response_json_or_error, transport_error, truncate_text};
use crate::GenerationRequest;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_STYLE_SUFFIX: &str = "Make it a high quality anime illustration with vibrant colors, clean lineart, cel shading, manga art style.\nIMPORTANT: Add a beautiful, detailed anime-style background that fits the scene. Do not leave the background empty or white.";

pub const GUIDANCE_EXACT: &str = "IMPORTANT: Follow the sketch EXACTLY. Keep the exact same pose, proportions, and composition. Only change the style to anime.";
pub const GUIDANCE_CLOSE: &str = "Follow the sketch closely but you can make small improvements to proportions. Keep the same pose and composition.";
pub const GUIDANCE_REFERENCE: &str = "Use the sketch as a strong reference. Keep the general pose and composition but feel free to enhance details.";
pub const GUIDANCE_INSPIRATION: &str = "Use the sketch as inspiration. You can be creative with details while keeping the general idea.";
pub const GUIDANCE_LOOSE: &str = "Use the sketch as loose inspiration only. Be very creative and artistic with your interpretation.";

const DEFAULT_INLINE_MIME: &str = "image/png";

/// Buckets imagination into one of five instructions: ≤20, ≤40, ≤60, ≤80, else.
pub fn imagination_guidance(imagination_level: u8) -> &'static str {
    match imagination_level {
        0..=20 => GUIDANCE_EXACT,
        21..=40 => GUIDANCE_CLOSE,
        41..=60 => GUIDANCE_REFERENCE,
        61..=80 => GUIDANCE_INSPIRATION,
        _ => GUIDANCE_LOOSE,
    }
}

pub fn compose_prompt(prompt: &str, imagination_level: u8, style_suffix: &str) -> String {
    let prompt = prompt.trim();
    let headline = if prompt.is_empty() {
        "Transform this sketch into anime style.".to_string()
    } else {
        format!("Transform this sketch into anime style: {prompt}.")
    };
    let mut lines = vec![headline, imagination_guidance(imagination_level).to_string()];
    if !style_suffix.trim().is_empty() {
        lines.push(style_suffix.trim().to_string());
    }
    lines.join("\n")
}

/// Gemini image model via `generateContent`; answers in one call.
pub struct GoogleAdapter {
    config: ProviderConfig,
    http: HttpClient,
}

impl GoogleAdapter {
    pub fn new(config: ProviderConfig) -> Result<Self, GenerationError> {
        config.credential()?;
        let http = build_client(config.request_timeout)?;
        Ok(Self { config, http })
    }

    fn endpoint_for_model(&self) -> String {
        let trimmed = self.config.model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.config.base_url, model_path)
    }

    fn content_payload(&self, request: &GenerationRequest) -> Value {
        json!({
            "contents": [{
                "parts": [
                    {
                        "inline_data": {
                            "mime_type": request.sketch().mime_type(),
                            "data": request.sketch().to_inline_base64(),
                        }
                    },
                    {
                        "text": compose_prompt(
                            request.prompt_text(),
                            request.imagination_level(),
                            &self.config.style_suffix,
                        )
                    },
                ]
            }],
            "generationConfig": {
                "temperature": 1,
                "topK": 40,
                "topP": 0.95,
                "maxOutputTokens": 8192,
            },
        })
    }

    /// First inline image among all candidate parts; accepts both casings.
    fn extract_image(response: &Value) -> Result<ImageReference, GenerationError> {
        let mut texts = Vec::new();
        let parts = response
            .get("candidates")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|candidate| candidate.pointer("/content/parts").and_then(Value::as_array))
            .flatten();
        for part in parts {
            let inline = part
                .get("inlineData")
                .map(|inline| (inline, "mimeType"))
                .or_else(|| part.get("inline_data").map(|inline| (inline, "mime_type")));
            if let Some((inline, mime_key)) = inline {
                if let Some(data) = inline
                    .get("data")
                    .and_then(Value::as_str)
                    .filter(|data| !data.trim().is_empty())
                {
                    let mime = inline
                        .get(mime_key)
                        .and_then(Value::as_str)
                        .filter(|mime| !mime.trim().is_empty())
                        .unwrap_or(DEFAULT_INLINE_MIME);
                    return Ok(ImageReference::inline(data.trim(), mime));
                }
            }
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                texts.push(truncate_text(text.trim(), 200));
            }
        }

        let mut detail = "No image data received from Google API".to_string();
        if !texts.is_empty() {
            detail.push_str(&format!("; model replied: {}", texts.join(" ")));
        }
        Err(GenerationError::unexpected_shape(detail))
    }
}

#[async_trait]
impl ProviderAdapter for GoogleAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn send(&self, request: &GenerationRequest) -> Result<Submission, GenerationError> {
        let api_key = self.config.credential()?;
        tracing::info!(
            provider = %self.kind(),
            model = %self.config.model,
            imagination = request.imagination_level(),
            has_prompt = !request.prompt_text().is_empty(),
            "submitting Gemini image request"
        );

        let response = self
            .http
            .post(self.endpoint_for_model())
            .header("x-goog-api-key", api_key.expose())
            .json(&self.content_payload(request))
            .send()
            .await
            .map_err(|err| transport_error(self.kind(), err))?;
        let payload = response_json_or_error(self.kind(), response).await?;
        Ok(Submission::Complete(Self::extract_image(&payload)?))
    }
}

#[cfg(test)]
mod tests {
    use doodle_contracts::ErrorKind;
    use httpmock::{Method::POST, MockServer};

    use super::*;
    use crate::providers::testing::{sketch_request, SKETCH_B64};

    fn adapter(server: &MockServer) -> Result<GoogleAdapter, GenerationError> {
        GoogleAdapter::new(
            ProviderConfig::new(ProviderKind::Google)
                .with_credential("g-key")
                .with_base_url(server.url("/v1beta")),
        )
    }

    #[test]
    fn guidance_buckets_switch_exactly_after_each_boundary() {
        let expected = [
            (0, GUIDANCE_EXACT),
            (20, GUIDANCE_EXACT),
            (21, GUIDANCE_CLOSE),
            (40, GUIDANCE_CLOSE),
            (41, GUIDANCE_REFERENCE),
            (60, GUIDANCE_REFERENCE),
            (61, GUIDANCE_INSPIRATION),
            (80, GUIDANCE_INSPIRATION),
            (81, GUIDANCE_LOOSE),
            (100, GUIDANCE_LOOSE),
            (255, GUIDANCE_LOOSE),
        ];
        for (level, guidance) in expected {
            assert_eq!(imagination_guidance(level), guidance, "level {level}");
        }
    }

    #[test]
    fn every_level_maps_to_one_of_five_instructions() {
        let tiers = [
            GUIDANCE_EXACT,
            GUIDANCE_CLOSE,
            GUIDANCE_REFERENCE,
            GUIDANCE_INSPIRATION,
            GUIDANCE_LOOSE,
        ];
        let mut seen = std::collections::BTreeSet::new();
        for level in 0..=100u8 {
            let guidance = imagination_guidance(level);
            assert!(tiers.contains(&guidance));
            seen.insert(guidance);
        }
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn composed_prompt_handles_empty_user_prompt() {
        let composed = compose_prompt("", 10, "");
        assert_eq!(
            composed,
            format!("Transform this sketch into anime style.\n{GUIDANCE_EXACT}")
        );
        let composed = compose_prompt("a knight", 90, DEFAULT_STYLE_SUFFIX);
        assert!(composed.starts_with("Transform this sketch into anime style: a knight.\n"));
        assert!(composed.contains(GUIDANCE_LOOSE));
        assert!(composed.ends_with("Do not leave the background empty or white."));
    }

    #[tokio::test]
    async fn inline_image_is_returned_without_prompt() -> Result<(), GenerationError> {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/gemini-2.5-flash-image:generateContent")
                    .header("x-goog-api-key", "g-key")
                    .body_includes(format!("\"data\":\"{SKETCH_B64}\""))
                    .body_includes("\"mime_type\":\"image/png\"")
                    .body_includes("\"maxOutputTokens\":8192");
                then.status(200).body(
                    json!({
                        "candidates": [{
                            "content": { "parts": [
                                { "text": "Here is your image" },
                                { "inlineData": { "mimeType": "image/webp", "data": "AQID" } }
                            ] }
                        }]
                    })
                    .to_string(),
                );
            })
            .await;

        let outcome = adapter(&server)?.send(&sketch_request("", 50)).await?;

        mock.assert_async().await;
        assert_eq!(
            outcome,
            Submission::Complete(ImageReference::inline("AQID", "image/webp"))
        );
        Ok(())
    }

    #[test]
    fn snake_case_parts_and_default_mime_are_accepted() -> Result<(), GenerationError> {
        let response = json!({
            "candidates": [{ "content": { "parts": [ { "inline_data": { "data": "AQID" } } ] } }]
        });
        assert_eq!(
            GoogleAdapter::extract_image(&response)?,
            ImageReference::inline("AQID", "image/png")
        );
        Ok(())
    }

    #[test]
    fn text_only_reply_is_unexpected_shape_quoting_the_text() {
        let response = json!({
            "candidates": [{ "content": { "parts": [ { "text": "I cannot draw that." } ] } }]
        });
        let err = GoogleAdapter::extract_image(&response).err();
        assert_eq!(
            err,
            Some(GenerationError::new(
                ErrorKind::UnexpectedResponseShape,
                "No image data received from Google API; model replied: I cannot draw that."
            ))
        );
    }

    #[tokio::test]
    async fn polling_is_not_supported() -> Result<(), GenerationError> {
        let server = MockServer::start_async().await;
        let err = adapter(&server)?
            .check_status(&crate::providers::PendingTask::new("x", ProviderKind::Google))
            .await
            .err();
        assert_eq!(err.map(|err| err.kind), Some(ErrorKind::UnexpectedResponseShape));
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_error_never_carries_the_api_key() {
        let adapter = GoogleAdapter::new(
            ProviderConfig::new(ProviderKind::Google)
                .with_credential("SECRET-GKEY-123")
                .with_base_url("http://127.0.0.1:9/v1beta"),
        );
        let err = match adapter {
            Ok(adapter) => adapter.send(&sketch_request("a fox", 50)).await.err(),
            Err(err) => Some(err),
        };
        let Some(err) = err else {
            panic!("request to a closed port succeeded");
        };
        assert_eq!(err.kind, ErrorKind::Unreachable);
        assert!(!err.detail.contains("SECRET-GKEY-123"), "{}", err.detail);
        assert!(!err.to_string().contains("SECRET-GKEY-123"));
    }
}
