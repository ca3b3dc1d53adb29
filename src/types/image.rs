use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::GenerationError;

/// Images per request; one portrait per subject.
pub const IMAGE_COUNT: u32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct ImageRequest<'a> {
    pub model: &'a str,
    pub prompt: String,
    pub n: u32,
    pub size: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
    url: Option<String>,
}

/// Where the generated image bytes are.
#[derive(Debug, PartialEq)]
pub enum ImagePayload {
    Inline(Vec<u8>),
    Remote(Url),
}

/// Decode `data[0]`, preferring `b64_json` over `url`.
pub fn decode_image(body: &[u8]) -> Result<ImagePayload, GenerationError> {
    let resp: ImageResponse =
        serde_json::from_slice(body).map_err(|_| GenerationError::InvalidResponse)?;
    let datum = resp
        .data
        .into_iter()
        .next()
        .ok_or(GenerationError::ImageGenerationFailed)?;

    match (datum.b64_json, datum.url) {
        (Some(b64), _) => STANDARD
            .decode(b64.trim())
            .map(ImagePayload::Inline)
            .map_err(|_| GenerationError::InvalidResponse),
        (None, Some(url)) => Url::parse(&url)
            .map(ImagePayload::Remote)
            .map_err(|_| GenerationError::InvalidResponse),
        (None, None) => Err(GenerationError::ImageGenerationFailed),
    }
}
