use async_trait::async_trait;
use doodle_contracts::{ErrorKind, GenerationError, ImageReference, ProviderKind};
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

pub const DEFAULT_BASE_URL: &str = "https://api.replicate.com/v1";
/// ControlNet scribble model version.
pub const DEFAULT_MODEL_VERSION: &str =
    "f1d05494d18833b371307b065e75123d6a620b22df34e6c317669d7b425b0780";
pub const DEFAULT_STYLE_SUFFIX: &str =
    "beautiful detailed digital art, highly detailed, professional composition";

const COMPLETE_STATUSES: &[&str] = &["succeeded"];
const FAILED_STATUSES: &[&str] = &["failed", "canceled"];

/// Replicate predictions: submit, then poll `predictions/{id}`.
pub struct ReplicateAdapter {
    config: ProviderConfig,
    http: HttpClient,
}

impl ReplicateAdapter {
    pub fn new(config: ProviderConfig) -> Result<Self, GenerationError> {
        config.credential()?;
        let http = build_client(config.request_timeout)?;
        Ok(Self { config, http })
    }

    fn predictions_endpoint(&self) -> String {
        format!("{}/predictions", self.config.base_url)
    }

    fn prediction_payload(&self, request: &GenerationRequest) -> Value {
        json!({
            "version": self.config.model,
            "input": {
                "image": request.sketch().to_data_url(),
                "prompt": augment_prompt(request.prompt_text(), &self.config.style_suffix),
            },
        })
    }

    fn status_of(prediction: &Value) -> (StatusClass, &str) {
        let raw = prediction
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default();
        (classify_status(raw, COMPLETE_STATUSES, FAILED_STATUSES), raw)
    }

    fn output_of(prediction: &Value) -> Result<ImageReference, GenerationError> {
        let output = prediction.get("output").unwrap_or(&Value::Null);
        normalize_image(output, "image/png")
    }

    fn failure_detail(prediction: &Value) -> String {
        prediction
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Replicate prediction failed: {}", preview(prediction)))
    }
}

#[async_trait]
impl ProviderAdapter for ReplicateAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Replicate
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn send(&self, request: &GenerationRequest) -> Result<Submission, GenerationError> {
        require_prompt(self.kind(), request)?;
        let api_key = self.config.credential()?;
        let payload = self.prediction_payload(request);
        tracing::info!(
            provider = %self.kind(),
            version = %self.config.model,
            sketch_bytes = request.sketch().bytes().len(),
            "submitting Replicate prediction"
        );

        let response = self
            .http
            .post(self.predictions_endpoint())
            .bearer_auth(api_key.expose())
            .json(&payload)
            .send()
            .await
            .map_err(|err| transport_error(self.kind(), err))?;
        let prediction = response_json_or_error(self.kind(), response).await?;

        match Self::status_of(&prediction).0 {
            StatusClass::Complete => Ok(Submission::Complete(Self::output_of(&prediction)?)),
            StatusClass::Failed => Err(GenerationError::new(
                ErrorKind::GenerationFailed,
                Self::failure_detail(&prediction),
            )),
            StatusClass::Pending => {
                let task_id = prediction
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .ok_or_else(|| {
                        GenerationError::unexpected_shape(format!(
                            "Replicate prediction missing id: {}",
                            preview(&prediction)
                        ))
                    })?;
                Ok(Submission::Pending(PendingTask::new(task_id, self.kind())))
            }
        }
    }

    async fn check_status(&self, task: &PendingTask) -> Result<TaskStatus, GenerationError> {
        let api_key = self.config.credential()?;
        let response = self
            .http
            .get(task_url(&self.config.base_url, "predictions", &task.task_id))
            .bearer_auth(api_key.expose())
            .send()
            .await
            .map_err(|err| transport_error(self.kind(), err))?;
        let prediction = response_json_or_error(self.kind(), response).await?;

        let (class, raw) = Self::status_of(&prediction);
        tracing::debug!(task_id = %task.task_id, status = raw, "Replicate prediction status");
        match class {
            StatusClass::Complete => Ok(TaskStatus::Complete(Self::output_of(&prediction)?)),
            StatusClass::Failed => Ok(TaskStatus::Failed(Self::failure_detail(&prediction))),
            StatusClass::Pending => Ok(TaskStatus::StillPending),
        }
    }
}
