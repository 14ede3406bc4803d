use std::sync::Arc;

use doodle_contracts::events::{
    EventPayload, EventWriter, GENERATION_FINISHED, GENERATION_STARTED, POLL_ATTEMPT, TASK_PENDING,
};
use doodle_contracts::wire::GenerateBody;
use doodle_contracts::{
    ErrorKind, GenerationError, GenerationOutcome, ImageReference, ProviderKind,
};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::ProviderConfig;
use crate::payload::ImagePayload;
use crate::poller::Poller;
use crate::providers::{build_adapter, ProviderAdapter, Submission};
use crate::GenerationRequest;

/// The single entry point the endpoint shell calls.
///
/// Holds the deployment's one adapter, or the construction error that keeps
/// every request `Misconfigured` without touching the network. Cheap to share
/// behind an `Arc`; every call is independent.
pub struct Generator {
    kind: ProviderKind,
    adapter: Result<Arc<dyn ProviderAdapter>, GenerationError>,
    poller: Poller,
    journal: Option<EventWriter>,
}

impl Generator {
    pub fn new(config: ProviderConfig) -> Self {
        let kind = config.kind;
        let poller = Poller::from_config(&config);
        let adapter = build_adapter(config);
        if let Err(err) = &adapter {
            tracing::error!(provider = %kind, error = %err, "image provider unavailable");
        }
        Self {
            kind,
            adapter,
            poller,
            journal: None,
        }
    }

    pub fn from_adapter(adapter: Arc<dyn ProviderAdapter>) -> Self {
        Self {
            kind: adapter.kind(),
            poller: Poller::from_config(adapter.config()),
            adapter: Ok(adapter),
            journal: None,
        }
    }

    pub fn with_journal(mut self, journal: EventWriter) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn provider(&self) -> ProviderKind {
        self.kind
    }

    pub fn is_configured(&self) -> bool {
        self.adapter.is_ok()
    }

    pub async fn generate(&self, body: &GenerateBody) -> GenerationOutcome {
        self.generate_with_cancel(body, &CancellationToken::new())
            .await
    }

    /// Runs one request to exactly one outcome; `cancel` aborts submission or polling.
    pub async fn generate_with_cancel(
        &self,
        body: &GenerateBody,
        cancel: &CancellationToken,
    ) -> GenerationOutcome {
        let request_id = Uuid::new_v4().to_string();
        let outcome = GenerationOutcome::from(self.run(&request_id, body, cancel).await);

        match &outcome {
            GenerationOutcome::Complete { image_ref } => tracing::info!(
                request_id = %request_id,
                provider = %self.kind,
                url = image_ref.is_url(),
                "generation complete"
            ),
            GenerationOutcome::Failed { reason, detail } => tracing::warn!(
                request_id = %request_id,
                provider = %self.kind,
                reason = %reason,
                detail = %detail,
                "generation failed"
            ),
        }
        self.record(&request_id, GENERATION_FINISHED, finished_payload(&outcome));
        outcome
    }

    async fn run(
        &self,
        request_id: &str,
        body: &GenerateBody,
        cancel: &CancellationToken,
    ) -> Result<ImageReference, GenerationError> {
        let raw_image = body.image.as_deref().map(str::trim).unwrap_or_default();
        if raw_image.is_empty() {
            return Err(GenerationError::invalid_input("No image provided"));
        }
        let adapter = self.adapter.as_ref().map_err(Clone::clone)?;
        let sketch = ImagePayload::decode(raw_image)?;
        let request =
            GenerationRequest::new(sketch, body.prompt_text(), body.imagination_level());

        self.record(
            request_id,
            GENERATION_STARTED,
            object(json!({
                "provider": self.kind,
                "imagination": request.imagination_level(),
                "prompt_chars": request.prompt_text().chars().count(),
                "sketch_mime": request.sketch().mime_type(),
                "sketch_sha256": request.sketch().fingerprint(),
            })),
        );

        let submission = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(GenerationError::new(
                    ErrorKind::Cancelled,
                    "request abandoned before the provider answered",
                ));
            }
            submission = adapter.send(&request) => submission?,
        };

        match submission {
            Submission::Complete(image) => Ok(image),
            Submission::Pending(task) => {
                self.record(
                    request_id,
                    TASK_PENDING,
                    object(json!({ "provider": task.provider, "task_id": task.task_id })),
                );
                self.poller
                    .wait(&**adapter, &task, cancel, |attempt, report| {
                        self.record(
                            request_id,
                            POLL_ATTEMPT,
                            object(json!({ "attempt": attempt, "status": report.as_str() })),
                        );
                    })
                    .await
            }
        }
    }

    fn record(&self, request_id: &str, event_type: &str, payload: EventPayload) {
        let Some(journal) = &self.journal else {
            return;
        };
        if let Err(err) = journal.emit(event_type, request_id, payload) {
            tracing::warn!(
                path = %journal.path().display(),
                event_type,
                error = %err,
                "failed to write generation journal"
            );
        }
    }
}

fn finished_payload(outcome: &GenerationOutcome) -> EventPayload {
    match outcome {
        GenerationOutcome::Complete { image_ref } => object(json!({
            "status": "complete",
            "image_kind": if image_ref.is_url() { "url" } else { "inline" },
        })),
        GenerationOutcome::Failed { reason, detail } => object(json!({
            "status": "failed",
            "reason": reason,
            "detail": detail,
        })),
    }
}

fn object(value: Value) -> EventPayload {
    match value {
        Value::Object(map) => map,
        _ => EventPayload::new(),
    }
}
