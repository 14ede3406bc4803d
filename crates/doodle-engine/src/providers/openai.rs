use std::str::FromStr;

use async_trait::async_trait;
use doodle_contracts::{GenerationError, ProviderKind};
use reqwest::multipart::Form as MultipartForm;
use reqwest::Client as HttpClient;
use serde_json::{json, Value};

use super::{augment_prompt, require_prompt, ProviderAdapter, Submission};
use crate::config::ProviderConfig;
use crate::http::{build_client, preview, response_json_or_error, transport_error};
use crate::normalize::normalize_image;
use crate::GenerationRequest;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_STYLE_SUFFIX: &str = "anime style, high quality anime illustration, vibrant colors, clean lineart, cel shading, manga art style, detailed anime artwork";
const GENERATIONS_SIZE: &str = "1024x1024";
const EDITS_SIZE: &str = "512x512";
const SKETCH_FILE_NAME: &str = "doodle.png";

/// Which images endpoint the sketch goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenAiMode {
    /// Text-to-image; the sketch is accepted but not uploaded.
    #[default]
    Generations,
    /// Multipart upload of the sketch as the image to edit.
    Edits,
}

impl OpenAiMode {
    pub fn default_model(self) -> &'static str {
        match self {
            Self::Generations => "dall-e-3",
            Self::Edits => "dall-e-2",
        }
    }
}

impl FromStr for OpenAiMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "generations" | "generate" => Ok(Self::Generations),
            "edits" | "edit" => Ok(Self::Edits),
            other => Err(format!("unknown OpenAI image mode '{other}'")),
        }
    }
}

/// DALL·E adapter: one synchronous call, no imagination control.
pub struct OpenAiAdapter {
    config: ProviderConfig,
    http: HttpClient,
}

impl OpenAiAdapter {
    pub fn new(config: ProviderConfig) -> Result<Self, GenerationError> {
        config.credential()?;
        let http = build_client(config.request_timeout)?;
        Ok(Self { config, http })
    }

    fn endpoint(&self) -> String {
        let path = match self.config.openai_mode {
            OpenAiMode::Generations => "images/generations",
            OpenAiMode::Edits => "images/edits",
        };
        format!("{}/{path}", self.config.base_url)
    }

    fn generations_payload(&self, prompt: &str) -> Value {
        json!({
            "model": self.config.model,
            "prompt": prompt,
            "n": 1,
            "size": GENERATIONS_SIZE,
            "quality": "standard",
        })
    }

    fn edits_form(
        &self,
        prompt: String,
        request: &GenerationRequest,
    ) -> Result<MultipartForm, GenerationError> {
        let form = MultipartForm::new()
            .text("model", self.config.model.clone())
            .text("prompt", prompt)
            .text("n", "1")
            .text("size", EDITS_SIZE);
        request.sketch().to_multipart(form, "image", SKETCH_FILE_NAME)
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn send(&self, request: &GenerationRequest) -> Result<Submission, GenerationError> {
        require_prompt(self.kind(), request)?;
        let api_key = self.config.credential()?;
        let prompt = augment_prompt(request.prompt_text(), &self.config.style_suffix);
        let endpoint = self.endpoint();
        tracing::info!(
            provider = %self.kind(),
            mode = ?self.config.openai_mode,
            model = %self.config.model,
            prompt_chars = prompt.chars().count(),
            "submitting OpenAI image request"
        );

        let builder = self.http.post(&endpoint).bearer_auth(api_key.expose());
        let builder = match self.config.openai_mode {
            OpenAiMode::Generations => builder.json(&self.generations_payload(&prompt)),
            OpenAiMode::Edits => builder.multipart(self.edits_form(prompt, request)?),
        };
        let response = builder
            .send()
            .await
            .map_err(|err| transport_error(self.kind(), err))?;
        let payload = response_json_or_error(self.kind(), response).await?;

        let data = payload.get("data").ok_or_else(|| {
            GenerationError::unexpected_shape(format!(
                "No image data received from OpenAI API: {}",
                preview(&payload)
            ))
        })?;
        Ok(Submission::Complete(normalize_image(data, "image/png")?))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use doodle_contracts::{ErrorKind, ImageReference};
    use httpmock::{Method::POST, MockServer};

    use super::*;
    use crate::payload::ImagePayload;
    use crate::providers::testing::sketch_request;

    fn adapter(server: &MockServer, mode: OpenAiMode) -> Result<OpenAiAdapter, GenerationError> {
        let mut config = ProviderConfig::new(ProviderKind::OpenAi)
            .with_credential("sk-test")
            .with_base_url(server.url("/v1"));
        config.openai_mode = mode;
        config.model = mode.default_model().to_string();
        config.request_timeout = Duration::from_secs(5);
        OpenAiAdapter::new(config)
    }

    #[tokio::test]
    async fn generations_returns_url_and_appends_style() -> Result<(), GenerationError> {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/images/generations")
                    .header("authorization", "Bearer sk-test")
                    .body_includes("\"model\":\"dall-e-3\"")
                    .body_includes("\"prompt\":\"a cat, anime style, high quality anime illustration")
                    .body_includes("\"size\":\"1024x1024\"");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(
                        serde_json::json!({
                            "created": 1,
                            "data": [{ "url": "https://oaidalle.example/img.png" }]
                        })
                        .to_string(),
                    );
            })
            .await;

        let outcome = adapter(&server, OpenAiMode::Generations)?
            .send(&sketch_request("a cat", 90))
            .await?;

        mock.assert_async().await;
        assert_eq!(
            outcome,
            Submission::Complete(ImageReference::url("https://oaidalle.example/img.png"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn edits_uploads_sketch_as_multipart_and_reads_b64() -> Result<(), GenerationError> {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/images/edits")
                    .body_includes("name=\"image\"; filename=\"doodle.png\"")
                    .body_includes("plain-sketch-bytes")
                    .body_includes("512x512");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(serde_json::json!({ "data": [{ "b64_json": "AQID" }] }).to_string());
            })
            .await;

        let sketch = ImagePayload::new(b"plain-sketch-bytes".to_vec(), "image/png");
        let outcome = adapter(&server, OpenAiMode::Edits)?
            .send(&GenerationRequest::new(sketch, "a cat", 50))
            .await?;

        mock.assert_async().await;
        assert_eq!(
            outcome,
            Submission::Complete(ImageReference::inline("AQID", "image/png"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn non_success_status_is_provider_rejected_with_body() -> Result<(), GenerationError> {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/images/generations");
                then.status(400)
                    .body("{\"error\":{\"message\":\"content policy\"}}");
            })
            .await;

        let err = adapter(&server, OpenAiMode::Generations)?
            .send(&sketch_request("a cat", 50))
            .await
            .err();

        let err = err.ok_or_else(|| GenerationError::unexpected_shape("expected failure"))?;
        assert_eq!(err.kind, ErrorKind::ProviderRejected);
        assert!(err.detail.contains("(400)"));
        assert!(err.detail.contains("content policy"));
        Ok(())
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected_before_any_call() -> Result<(), GenerationError> {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200);
            })
            .await;

        let err = adapter(&server, OpenAiMode::Generations)?
            .send(&sketch_request("   ", 50))
            .await
            .err();

        assert_eq!(
            err,
            Some(GenerationError::invalid_input("prompt required"))
        );
        mock.assert_calls_async(0).await;
        Ok(())
    }

    #[tokio::test]
    async fn success_without_data_is_unexpected_shape() -> Result<(), GenerationError> {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/images/generations");
                then.status(200).body("{\"data\":[]}");
            })
            .await;

        let err = adapter(&server, OpenAiMode::Generations)?
            .send(&sketch_request("a cat", 50))
            .await
            .err();
        assert_eq!(err.map(|err| err.kind), Some(ErrorKind::UnexpectedResponseShape));
        Ok(())
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() -> Result<(), GenerationError> {
        let mut config = ProviderConfig::new(ProviderKind::OpenAi)
            .with_credential("sk-test")
            .with_base_url("http://127.0.0.1:9/v1");
        config.request_timeout = Duration::from_secs(2);
        let err = OpenAiAdapter::new(config)?
            .send(&sketch_request("a cat", 50))
            .await
            .err();
        assert_eq!(err.map(|err| err.kind), Some(ErrorKind::Unreachable));
        Ok(())
    }
}
