use serde::Deserialize;
use std::time::Duration;
use thiserror::Error as ThisError;

/// Terminal outcome of a failed generation call.
#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum GenerationError {
    #[error("invalid response from provider")]
    InvalidResponse,

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: f64 },

    #[error("provider error: {message}")]
    Api { message: String },

    #[error("missing or rejected API key")]
    InvalidApiKey,

    #[error("image generation returned no image")]
    ImageGenerationFailed,

    #[error("failed to save generated image")]
    ImageSaveFailed,

    #[error("HTTP error with status {code}")]
    Http { code: u16 },
}

/// Failure of a single job attempt, before it is surfaced to the caller.
#[derive(Debug, ThisError)]
pub enum AttemptError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl From<AttemptError> for GenerationError {
    fn from(e: AttemptError) -> Self {
        match e {
            AttemptError::Generation(inner) => inner,
            AttemptError::Transport(err) => GenerationError::Api {
                message: format!("transport error: {err}"),
            },
        }
    }
}

/// Errors raised while wiring up the client.
#[derive(Debug, ThisError)]
pub enum SetupError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl From<figment::Error> for SetupError {
    fn from(e: figment::Error) -> Self {
        SetupError::Config(Box::new(e))
    }
}

/// How the retry policy should treat a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryClass {
    RateLimited { retry_after: Option<Duration> },
    Transient,
    Fatal,
}

pub trait IsRetryable {
    fn retry_class(&self) -> RetryClass;

    fn is_retryable(&self) -> bool {
        !matches!(self.retry_class(), RetryClass::Fatal)
    }
}

impl IsRetryable for GenerationError {
    fn retry_class(&self) -> RetryClass {
        match self {
            GenerationError::RateLimitExceeded { retry_after_secs } => RetryClass::RateLimited {
                retry_after: Duration::try_from_secs_f64(*retry_after_secs).ok(),
            },
            _ => RetryClass::Fatal,
        }
    }
}

impl IsRetryable for AttemptError {
    fn retry_class(&self) -> RetryClass {
        match self {
            AttemptError::Generation(inner) => inner.retry_class(),
            AttemptError::Transport(_) => RetryClass::Transient,
        }
    }
}

/// Error envelope returned by the provider on non-2xx responses.
#[derive(Deserialize, Debug)]
pub struct ProviderError {
    pub error: ProviderErrorBody,
}

#[derive(Deserialize, Debug)]
pub struct ProviderErrorBody {
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub code: Option<serde_json::Value>,
}

impl ProviderError {
    /// Parse `error.message` out of a raw body, if present and non-empty.
    pub fn message_from(body: &[u8]) -> Option<String> {
        serde_json::from_slice::<ProviderError>(body)
            .ok()?
            .error
            .message
            .filter(|m| !m.is_empty())
    }
}
