use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use url::Url;

use crate::api::openai_api::OpenAiApi;
use crate::config::{Config, ProviderConfig};
use crate::credentials::CredentialSource;
use crate::error::{AttemptError, GenerationError, SetupError};
use crate::service::{RequestQueue, SleepFn};
use crate::storage::AssetStore;
use crate::types::image::{IMAGE_COUNT, ImagePayload, ImageRequest, decode_image};
use crate::types::text::{TextRequest, decode_text};

pub const IMAGE_GENERATIONS_PATH: &str = "images/generations";

/// Text and image generation against the provider.
///
/// Every call runs as one job on the [`RequestQueue`]; a job performs exactly
/// one HTTP attempt and the queue owns all retrying. Cheap to clone.
#[derive(Clone)]
pub struct GenerativeClient {
    http: reqwest::Client,
    credentials: Arc<dyn CredentialSource>,
    queue: RequestQueue,
    assets: AssetStore,
    provider: Arc<ProviderConfig>,
    text_url: Url,
    image_url: Url,
    default_retry_after_secs: f64,
}

impl GenerativeClient {
    pub fn new(cfg: &Config, credentials: Arc<dyn CredentialSource>) -> Result<Self, SetupError> {
        let provider = &cfg.provider;
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("story-synth/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(provider.connect_timeout_secs))
            .timeout(Duration::from_secs(provider.request_timeout_secs));
        if let Some(proxy_url) = provider.proxy.as_ref() {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
        }
        let http = builder.build()?;

        Ok(Self {
            http,
            credentials,
            queue: RequestQueue::new(cfg.retry.policy()),
            assets: AssetStore::new(cfg.basic.assets_dir.clone()),
            text_url: provider.endpoint(provider.text_endpoint.path())?,
            image_url: provider.endpoint(IMAGE_GENERATIONS_PATH)?,
            provider: Arc::new(provider.clone()),
            default_retry_after_secs: cfg.retry.default_retry_after_secs,
        })
    }

    /// Replace how the queue waits between retries.
    pub fn with_sleeper(mut self, sleep: SleepFn) -> Self {
        self.queue = self.queue.with_sleeper(sleep);
        self
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    fn api_key(&self) -> Result<String, GenerationError> {
        self.credentials.current_key().ok_or_else(|| {
            warn!("no API key configured");
            GenerationError::InvalidApiKey
        })
    }

    /// Generate story or scene text for `prompt`.
    pub async fn generate_text(&self, prompt: &str) -> Result<String, GenerationError> {
        let key = self.api_key()?;
        let body = TextRequest::build(&self.provider, prompt);
        info!(model = %self.provider.text_model, prompt_chars = prompt.len(), "generating text");

        let text = self
            .queue
            .enqueue(|| self.send_text(&key, &body))
            .await
            .map_err(GenerationError::from)?;
        info!(chars = text.len(), "text generated");
        Ok(text)
    }

    /// Generate a portrait for `subject_id`, reusing the stored one unless
    /// `force_regenerate` is set. Returns the asset path.
    pub async fn generate_character_portrait(
        &self,
        description: &str,
        subject_id: &str,
        force_regenerate: bool,
    ) -> Result<PathBuf, GenerationError> {
        let key = self.api_key()?;

        if !force_regenerate {
            match self.assets.existing(subject_id).await {
                Ok(Some(path)) => {
                    info!(subject_id, path = %path.display(), "reusing existing portrait");
                    return Ok(path);
                }
                Ok(None) => {}
                Err(e) if e.kind() == io::ErrorKind::InvalidInput => {
                    warn!(subject_id, error = %e, "rejecting subject id");
                    return Err(GenerationError::ImageSaveFailed);
                }
                Err(e) => {
                    warn!(subject_id, error = %e, "could not check for existing portrait");
                }
            }
        } else if let Err(e) = self.assets.path_for(subject_id) {
            warn!(subject_id, error = %e, "rejecting subject id");
            return Err(GenerationError::ImageSaveFailed);
        }

        let body = ImageRequest {
            model: &self.provider.image_model,
            prompt: self.provider.render_portrait_prompt(description),
            n: IMAGE_COUNT,
            size: &self.provider.image_size,
        };
        info!(
            subject_id,
            model = %self.provider.image_model,
            size = %self.provider.image_size,
            force_regenerate,
            "generating portrait"
        );

        self.queue
            .enqueue(|| self.send_image(&key, &body, subject_id))
            .await
            .map_err(GenerationError::from)
    }

    /// Remove the stored asset for `subject_id`; absent assets are not an error.
    pub async fn delete_asset(&self, subject_id: &str) -> io::Result<()> {
        if !self.assets.delete(subject_id).await? {
            info!(subject_id, "no asset to delete");
        }
        Ok(())
    }

    async fn send_text(&self, key: &str, body: &TextRequest<'_>) -> Result<String, AttemptError> {
        let raw = OpenAiApi::post_json(&self.http, self.text_url.clone(), key, body).await?;
        let bytes = raw.into_success_body(self.default_retry_after_secs)?;
        Ok(decode_text(&bytes)?)
    }

    async fn send_image(
        &self,
        key: &str,
        body: &ImageRequest<'_>,
        subject_id: &str,
    ) -> Result<PathBuf, AttemptError> {
        let raw = OpenAiApi::post_json(&self.http, self.image_url.clone(), key, body).await?;
        let bytes = raw.into_success_body(self.default_retry_after_secs)?;

        let image = match decode_image(&bytes)? {
            ImagePayload::Inline(image) => image,
            ImagePayload::Remote(url) => self.download(url).await?,
        };

        self.assets
            .write(subject_id, &image)
            .await
            .map_err(|e| {
                warn!(subject_id, error = %e, "failed to save portrait");
                AttemptError::from(GenerationError::ImageSaveFailed)
            })
    }

    async fn download(&self, url: Url) -> Result<Vec<u8>, AttemptError> {
        let raw = OpenAiApi::get(&self.http, url).await?;
        if !raw.status.is_success() {
            let code = raw.status.as_u16();
            warn!(code, "image download failed");
            return Err(GenerationError::Http { code }.into());
        }
        Ok(raw.body)
    }
}
