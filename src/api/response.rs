use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use tracing::{debug, warn};

use crate::error::{GenerationError, ProviderError};

/// Status, headers and fully read body of one provider response.
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Dispatch on status: 2xx yields the body, everything else a classified error.
    pub fn into_success_body(self, default_retry_after_secs: f64) -> Result<Vec<u8>, GenerationError> {
        let status = self.status;
        if status.is_success() {
            return Ok(self.body);
        }

        match status {
            StatusCode::UNAUTHORIZED => {
                warn!("provider rejected API key");
                Err(GenerationError::InvalidApiKey)
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_secs =
                    retry_after_secs(&self.headers).unwrap_or(default_retry_after_secs);
                warn!(retry_after_secs, "provider rate limit hit");
                Err(GenerationError::RateLimitExceeded { retry_after_secs })
            }
            _ => {
                let message = ProviderError::message_from(&self.body)
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
                warn!(status = status.as_u16(), %message, "provider returned error");
                Err(GenerationError::Api { message })
            }
        }
    }
}

/// Parse `Retry-After` as delta-seconds or an HTTP-date.
pub fn retry_after_secs(headers: &HeaderMap) -> Option<f64> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(secs) = raw.parse::<f64>() {
        return (secs.is_finite() && secs >= 0.0).then_some(secs);
    }

    let at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    let wait = (at - Utc::now()).num_milliseconds().max(0) as f64 / 1000.0;
    debug!(%raw, wait, "Retry-After given as HTTP-date");
    Some(wait)
}
