use std::env;
use std::fmt;
use std::time::Duration;

use doodle_contracts::{GenerationError, ProviderKind};

use crate::providers::{freepik, google, openai, replicate, OpenAiMode};

pub const PROVIDER_ENV: &str = "DOODLE_PROVIDER";
pub const DEFAULT_PROVIDER: ProviderKind = ProviderKind::OpenAi;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 60;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const MAX_BODY_BYTES_ENV: &str = "DOODLE_MAX_BODY_BYTES";
pub const DEFAULT_MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// An API secret. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into().trim().to_string();
        (!value.is_empty()).then_some(Self(value))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Everything one adapter needs, resolved once at start-up.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub credential: Option<Credential>,
    pub base_url: String,
    pub model: String,
    pub style_suffix: String,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub request_timeout: Duration,
    pub openai_mode: OpenAiMode,
}

impl ProviderConfig {
    /// Built-in defaults for `kind`, without a credential.
    pub fn new(kind: ProviderKind) -> Self {
        Self::with_openai_mode(kind, OpenAiMode::default())
    }

    fn with_openai_mode(kind: ProviderKind, openai_mode: OpenAiMode) -> Self {
        let (base_url, model, style_suffix) = match kind {
            ProviderKind::OpenAi => (
                openai::DEFAULT_BASE_URL,
                openai_mode.default_model(),
                openai::DEFAULT_STYLE_SUFFIX,
            ),
            ProviderKind::Replicate => (
                replicate::DEFAULT_BASE_URL,
                replicate::DEFAULT_MODEL_VERSION,
                replicate::DEFAULT_STYLE_SUFFIX,
            ),
            ProviderKind::Freepik => (
                freepik::DEFAULT_BASE_URL,
                freepik::DEFAULT_MODEL,
                freepik::DEFAULT_STYLE_SUFFIX,
            ),
            ProviderKind::Google => (
                google::DEFAULT_BASE_URL,
                google::DEFAULT_MODEL,
                google::DEFAULT_STYLE_SUFFIX,
            ),
        };
        Self {
            kind,
            credential: None,
            base_url: base_url.to_string(),
            model: model.to_string(),
            style_suffix: style_suffix.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            openai_mode,
        }
    }

    pub fn from_env(kind: ProviderKind) -> Self {
        Self::from_lookup(kind, non_empty_env)
    }

    /// Reads every setting through `lookup`, which must treat blank values as absent.
    pub fn from_lookup(kind: ProviderKind, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let prefix = kind.env_prefix();
        let openai_mode = match lookup("OPENAI_IMAGE_MODE") {
            Some(raw) if kind == ProviderKind::OpenAi => raw.parse().unwrap_or_else(|err| {
                tracing::warn!(%err, "ignoring OPENAI_IMAGE_MODE");
                OpenAiMode::default()
            }),
            _ => OpenAiMode::default(),
        };
        let mut config = Self::with_openai_mode(kind, openai_mode);

        config.credential = credential_keys(kind)
            .iter()
            .find_map(|key| lookup(key))
            .and_then(Credential::new);
        if let Some(base_url) = lookup(&format!("{prefix}_API_BASE"))
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
        {
            config.base_url = base_url;
        }
        if let Some(model) = lookup(&format!("{prefix}_MODEL")) {
            config.model = model.trim().to_string();
        }
        if let Some(suffix) = lookup(&format!("{prefix}_STYLE_SUFFIX")) {
            config.style_suffix = suffix.trim().to_string();
        }
        if let Some(ms) = parse_positive(lookup("DOODLE_POLL_INTERVAL_MS")) {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(attempts) = parse_positive(lookup("DOODLE_MAX_POLL_ATTEMPTS")) {
            config.max_poll_attempts = u32::try_from(attempts).unwrap_or(u32::MAX);
        }
        if let Some(secs) = parse_positive(lookup("DOODLE_REQUEST_TIMEOUT_SECS")) {
            config.request_timeout = Duration::from_secs(secs);
        }
        config
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Credential::new(credential);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_polling(mut self, poll_interval: Duration, max_poll_attempts: u32) -> Self {
        self.poll_interval = poll_interval;
        self.max_poll_attempts = max_poll_attempts;
        self
    }

    pub fn credential(&self) -> Result<&Credential, GenerationError> {
        self.credential.as_ref().ok_or_else(|| {
            GenerationError::misconfigured(format!(
                "{} not set",
                credential_keys(self.kind).join(" or ")
            ))
        })
    }

    pub fn is_configured(&self) -> bool {
        self.credential.is_some()
    }
}

pub fn credential_keys(kind: ProviderKind) -> &'static [&'static str] {
    match kind {
        ProviderKind::OpenAi => &["OPENAI_API_KEY"],
        ProviderKind::Replicate => &["REPLICATE_API_TOKEN", "REPLICATE_API_KEY"],
        ProviderKind::Freepik => &["FREEPIK_API_KEY"],
        ProviderKind::Google => &["GOOGLE_API_KEY", "GEMINI_API_KEY"],
    }
}

/// The deployment's active provider: `DOODLE_PROVIDER`, else OpenAI.
pub fn selected_provider(lookup: impl Fn(&str) -> Option<String>) -> Result<ProviderKind, String> {
    match lookup(PROVIDER_ENV) {
        Some(raw) => raw.parse(),
        None => Ok(DEFAULT_PROVIDER),
    }
}

/// Request body cap for the HTTP endpoint; sketches arrive as data URLs.
pub fn max_body_bytes(lookup: impl Fn(&str) -> Option<String>) -> usize {
    parse_positive(lookup(MAX_BODY_BYTES_ENV))
        .and_then(|bytes| usize::try_from(bytes).ok())
        .unwrap_or(DEFAULT_MAX_BODY_BYTES)
}

pub fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_positive(raw: Option<String>) -> Option<u64> {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
}
