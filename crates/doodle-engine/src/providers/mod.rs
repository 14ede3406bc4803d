use std::sync::Arc;

use async_trait::async_trait;
use doodle_contracts::{GenerationError, ImageReference, ProviderKind};

use crate::config::ProviderConfig;
use crate::GenerationRequest;

pub mod freepik;
pub mod google;
pub mod openai;
pub mod replicate;

pub use freepik::FreepikAdapter;
pub use google::GoogleAdapter;
pub use openai::{OpenAiAdapter, OpenAiMode};
pub use replicate::ReplicateAdapter;

/// Handle for a job a task-based provider accepted but has not finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTask {
    pub task_id: String,
    pub provider: ProviderKind,
}

impl PendingTask {
    pub fn new(task_id: impl Into<String>, provider: ProviderKind) -> Self {
        Self {
            task_id: task_id.into(),
            provider,
        }
    }
}

/// What the single submission call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Complete(ImageReference),
    Pending(PendingTask),
}

/// What one status check produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Complete(ImageReference),
    Failed(String),
    StillPending,
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn config(&self) -> &ProviderConfig;

    /// Builds the provider's native request and performs exactly one call.
    async fn send(&self, request: &GenerationRequest) -> Result<Submission, GenerationError>;

    /// One status query for a task returned by [`ProviderAdapter::send`].
    async fn check_status(&self, task: &PendingTask) -> Result<TaskStatus, GenerationError> {
        Err(GenerationError::unexpected_shape(format!(
            "{} does not issue pollable tasks (got task {})",
            self.kind(),
            task.task_id
        )))
    }
}

/// Constructs the adapter `config.kind` names; fails when the credential is absent.
pub fn build_adapter(config: ProviderConfig) -> Result<Arc<dyn ProviderAdapter>, GenerationError> {
    let adapter: Arc<dyn ProviderAdapter> = match config.kind {
        ProviderKind::OpenAi => Arc::new(OpenAiAdapter::new(config)?),
        ProviderKind::Replicate => Arc::new(ReplicateAdapter::new(config)?),
        ProviderKind::Freepik => Arc::new(FreepikAdapter::new(config)?),
        ProviderKind::Google => Arc::new(GoogleAdapter::new(config)?),
    };
    Ok(adapter)
}

/// Appends the configured style text to the user's prompt.
pub fn augment_prompt(prompt: &str, style_suffix: &str) -> String {
    let prompt = prompt.trim();
    let suffix = style_suffix.trim();
    match (prompt.is_empty(), suffix.is_empty()) {
        (_, true) => prompt.to_string(),
        (true, false) => suffix.to_string(),
        (false, false) => format!("{prompt}, {suffix}"),
    }
}

pub(crate) fn require_prompt(
    kind: ProviderKind,
    request: &GenerationRequest,
) -> Result<(), GenerationError> {
    if request.prompt_text().is_empty() && !kind.allows_empty_prompt() {
        return Err(GenerationError::invalid_input("prompt required"));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatusClass {
    Complete,
    Failed,
    Pending,
}

/// Case-insensitive mapping of a provider's status word.
pub(crate) fn classify_status(raw: &str, complete: &[&str], failed: &[&str]) -> StatusClass {
    let status = raw.trim();
    if complete.iter().any(|word| status.eq_ignore_ascii_case(word)) {
        StatusClass::Complete
    } else if failed.iter().any(|word| status.eq_ignore_ascii_case(word)) {
        StatusClass::Failed
    } else {
        StatusClass::Pending
    }
}

pub(crate) fn task_url(base_url: &str, path: &str, task_id: &str) -> String {
    format!("{}/{}/{}", base_url.trim_end_matches('/'), path, task_id.trim())
}


#[cfg(test)]
mod tests {
    use doodle_contracts::ErrorKind;

    use super::testing::sketch_request;
    use super::*;

    #[test]
    fn augment_prompt_joins_with_comma() {
        assert_eq!(augment_prompt("a fox", "anime style"), "a fox, anime style");
        assert_eq!(augment_prompt("", "anime style"), "anime style");
        assert_eq!(augment_prompt("a fox", "  "), "a fox");
    }

    #[test]
    fn empty_prompt_only_allowed_for_image_conditioned_providers() {
        let request = sketch_request("", 50);
        assert_eq!(
            require_prompt(ProviderKind::Freepik, &request).err().map(|err| err.kind),
            Some(ErrorKind::InvalidInput)
        );
        assert!(require_prompt(ProviderKind::Google, &request).is_ok());
    }

    #[test]
    fn status_words_are_case_insensitive() {
        let complete = ["succeeded"];
        let failed = ["failed", "canceled"];
        assert_eq!(classify_status("SUCCEEDED", &complete, &failed), StatusClass::Complete);
        assert_eq!(classify_status("Canceled", &complete, &failed), StatusClass::Failed);
        assert_eq!(classify_status("processing", &complete, &failed), StatusClass::Pending);
        assert_eq!(classify_status("", &complete, &failed), StatusClass::Pending);
    }

    #[test]
    fn missing_credential_blocks_adapter_construction() {
        for kind in ProviderKind::ALL {
            let err = build_adapter(ProviderConfig::new(kind)).err();
            assert_eq!(err.map(|err| err.kind), Some(ErrorKind::Misconfigured), "{kind}");
        }
    }

    #[test]
    fn configured_adapters_report_their_kind() -> Result<(), GenerationError> {
        for kind in ProviderKind::ALL {
            let adapter = build_adapter(ProviderConfig::new(kind).with_credential("key"))?;
            assert_eq!(adapter.kind(), kind);
        }
        Ok(())
    }
}
