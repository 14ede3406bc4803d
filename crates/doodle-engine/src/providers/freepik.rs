use async_trait::async_trait;
use doodle_contracts::{GenerationError, ProviderKind};
use reqwest::Client as HttpClient;
use serde_json::{json, Value};

use super::{
    augment_prompt, classify_status, require_prompt, task_url, PendingTask, ProviderAdapter,
    StatusClass, Submission, TaskStatus,
};
use crate::config::ProviderConfig;
use crate::http::{build_client, preview, response_json_or_error, transport_error};
use crate::normalize::normalize_image;
use crate::GenerationRequest;

pub const DEFAULT_BASE_URL: &str = "https://api.freepik.com/v1";
pub const DEFAULT_MODEL: &str = "realism";
pub const DEFAULT_STYLE_SUFFIX: &str =
    "anime style, anime illustration, cel shading, vibrant colors, clean lineart, manga art style";
/// Lowest structure strength sent alongside a sketch reference.
pub const STRUCTURE_STRENGTH_FLOOR: u8 = 70;

const API_KEY_HEADER: &str = "x-freepik-api-key";
const MYSTIC_PATH: &str = "ai/mystic";
const INLINE_MIME: &str = "image/jpeg";
const COMPLETE_STATUSES: &[&str] = &["COMPLETED"];
const FAILED_STATUSES: &[&str] = &["FAILED"];

/// Inverts imagination into Mystic's `structure_strength`, floored while a
/// sketch reference is attached so the sketch is never ignored.
pub fn structure_strength(imagination_level: u8, has_reference: bool) -> u8 {
    let strength = 100 - imagination_level.min(100);
    if has_reference {
        strength.max(STRUCTURE_STRENGTH_FLOOR)
    } else {
        strength
    }
}

/// Freepik Mystic: a task-based provider keyed by `x-freepik-api-key`.
pub struct FreepikAdapter {
    config: ProviderConfig,
    http: HttpClient,
}

impl FreepikAdapter {
    pub fn new(config: ProviderConfig) -> Result<Self, GenerationError> {
        config.credential()?;
        let http = build_client(config.request_timeout)?;
        Ok(Self { config, http })
    }

    fn mystic_endpoint(&self) -> String {
        format!("{}/{MYSTIC_PATH}", self.config.base_url)
    }

    fn mystic_payload(&self, request: &GenerationRequest) -> Value {
        json!({
            "prompt": augment_prompt(request.prompt_text(), &self.config.style_suffix),
            "aspect_ratio": "square_1_1",
            "model": self.config.model,
            "resolution": "2k",
            "filter_nsfw": true,
            "structure_reference": request.sketch().to_inline_base64(),
            "structure_strength": structure_strength(request.imagination_level(), true),
        })
    }

    fn data_of(payload: &Value) -> Result<&Value, GenerationError> {
        payload.get("data").ok_or_else(|| {
            GenerationError::unexpected_shape(format!(
                "Unexpected response format from Freepik API: {}",
                preview(payload)
            ))
        })
    }
}

#[async_trait]
impl ProviderAdapter for FreepikAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Freepik
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn send(&self, request: &GenerationRequest) -> Result<Submission, GenerationError> {
        require_prompt(self.kind(), request)?;
        let api_key = self.config.credential()?;
        let payload = self.mystic_payload(request);
        tracing::info!(
            provider = %self.kind(),
            model = %self.config.model,
            imagination = request.imagination_level(),
            structure_strength = payload["structure_strength"].as_u64().unwrap_or_default(),
            sketch_base64_chars = payload["structure_reference"].as_str().map(str::len).unwrap_or_default(),
            "submitting Freepik Mystic request"
        );

        let response = self
            .http
            .post(self.mystic_endpoint())
            .header(API_KEY_HEADER, api_key.expose())
            .json(&payload)
            .send()
            .await
            .map_err(|err| transport_error(self.kind(), err))?;
        let result = response_json_or_error(self.kind(), response).await?;
        let data = Self::data_of(&result)?;

        // An inline image wins over a task id.
        let has_inline_image = data.is_string()
            || data
                .get("base64")
                .and_then(Value::as_str)
                .is_some_and(|value| !value.trim().is_empty());
        if !has_inline_image {
            if let Some(task_id) = data
                .get("task_id")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
            {
                return Ok(Submission::Pending(PendingTask::new(task_id, self.kind())));
            }
        }
        Ok(Submission::Complete(normalize_image(data, INLINE_MIME)?))
    }

    async fn check_status(&self, task: &PendingTask) -> Result<TaskStatus, GenerationError> {
        let api_key = self.config.credential()?;
        let response = self
            .http
            .get(task_url(&self.config.base_url, MYSTIC_PATH, &task.task_id))
            .header(API_KEY_HEADER, api_key.expose())
            .send()
            .await
            .map_err(|err| transport_error(self.kind(), err))?;
        let result = response_json_or_error(self.kind(), response).await?;
        let Some(data) = result.get("data") else {
            tracing::debug!(task_id = %task.task_id, "Freepik status without data; still waiting");
            return Ok(TaskStatus::StillPending);
        };

        let raw = data
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default();
        tracing::debug!(task_id = %task.task_id, status = raw, "Freepik task status");
        match classify_status(raw, COMPLETE_STATUSES, FAILED_STATUSES) {
            StatusClass::Complete => {
                let generated = data.get("generated").unwrap_or(&Value::Null);
                Ok(TaskStatus::Complete(normalize_image(generated, INLINE_MIME)?))
            }
            StatusClass::Failed => Ok(TaskStatus::Failed("Image generation failed".to_string())),
            StatusClass::Pending => Ok(TaskStatus::StillPending),
        }
    }
}
