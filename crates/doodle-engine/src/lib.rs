//! Sketch-to-image generation core.
//!
//! A [`Generator`] owns exactly one [`ProviderAdapter`], chosen from
//! configuration at start-up. Synchronous providers answer the submission
//! with an image; task-based providers hand back a [`PendingTask`] that the
//! [`Poller`] drives to completion with a fixed, non-blocking delay.

pub mod config;
pub mod facade;
mod http;
pub mod normalize;
pub mod payload;
pub mod poller;
pub mod providers;

pub use config::{Credential, ProviderConfig};
pub use doodle_contracts::{ErrorKind, GenerationError, GenerationOutcome, ImageReference, ProviderKind};
pub use facade::Generator;
pub use payload::ImagePayload;
pub use poller::Poller;
pub use providers::{build_adapter, PendingTask, ProviderAdapter, Submission, TaskStatus};

pub const MAX_IMAGINATION: u8 = 100;

/// A validated generation request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    sketch: ImagePayload,
    prompt_text: String,
    imagination_level: u8,
}

impl GenerationRequest {
    pub fn new(sketch: ImagePayload, prompt_text: impl Into<String>, imagination_level: u8) -> Self {
        Self {
            sketch,
            prompt_text: prompt_text.into().trim().to_string(),
            imagination_level: imagination_level.min(MAX_IMAGINATION),
        }
    }

    pub fn sketch(&self) -> &ImagePayload {
        &self.sketch
    }

    pub fn prompt_text(&self) -> &str {
        &self.prompt_text
    }

    pub fn imagination_level(&self) -> u8 {
        self.imagination_level
    }
}
