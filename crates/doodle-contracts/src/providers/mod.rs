use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The image backends an adapter exists for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    Replicate,
    Freepik,
    Google,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::OpenAi,
        ProviderKind::Replicate,
        ProviderKind::Freepik,
        ProviderKind::Google,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Replicate => "replicate",
            Self::Freepik => "freepik",
            Self::Google => "google",
        }
    }

    /// Prefix for this provider's environment keys, e.g. `FREEPIK_API_KEY`.
    pub fn env_prefix(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI",
            Self::Replicate => "REPLICATE",
            Self::Freepik => "FREEPIK",
            Self::Google => "GOOGLE",
        }
    }

    /// Task-based providers acknowledge a submission and must be polled.
    pub fn is_task_based(self) -> bool {
        matches!(self, Self::Replicate | Self::Freepik)
    }

    /// Only providers that condition on the image alone accept an empty prompt.
    pub fn allows_empty_prompt(self) -> bool {
        matches!(self, Self::Google)
    }

    pub fn list() -> Vec<String> {
        let mut names = Self::ALL
            .iter()
            .map(|kind| kind.name().to_string())
            .collect::<Vec<String>>();
        names.sort();
        names
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "openai" | "dalle" | "dall-e" => Ok(Self::OpenAi),
            "replicate" => Ok(Self::Replicate),
            "freepik" | "mystic" => Ok(Self::Freepik),
            "google" | "gemini" => Ok(Self::Google),
            _ => Err(format!(
                "Unknown provider '{}'. Expected one of: {}.",
                raw.trim(),
                Self::list().join(", ")
            )),
        }
    }
}
