pub mod errors;
pub mod events;
pub mod outcome;
pub mod providers;
pub mod wire;

pub use errors::{ErrorKind, GenerationError};
pub use outcome::{GenerationOutcome, ImageReference};
pub use providers::ProviderKind;
