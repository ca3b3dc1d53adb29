use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::error::SetupError;
use crate::service::retry_policy::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const ENV_PREFIX: &str = "STORY_SYNTH_";
pub const CONFIG_FILE: &str = "config.toml";

/// Top-level configuration, passed explicitly to whatever builds a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub basic: BasicConfig,
    pub provider: ProviderConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicConfig {
    pub api_key: String,
    pub loglevel: String,
    pub assets_dir: PathBuf,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            loglevel: "info".to_string(),
            assets_dir: PathBuf::from("character_avatars"),
        }
    }
}

/// Which text-generation endpoint to call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEndpoint {
    #[default]
    ChatCompletions,
    Responses,
}

impl TextEndpoint {
    pub fn path(self) -> &'static str {
        match self {
            TextEndpoint::ChatCompletions => "chat/completions",
            TextEndpoint::Responses => "responses",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub text_endpoint: TextEndpoint,
    pub text_model: String,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub image_model: String,
    pub image_size: String,
    /// Image prompt template; `{description}` is replaced by the caller's text.
    pub portrait_prompt: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub proxy: Option<Url>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            text_endpoint: TextEndpoint::default(),
            text_model: "o4-mini".to_string(),
            system_prompt: Some("You are a creative storyteller.".to_string()),
            temperature: Some(0.7),
            max_output_tokens: Some(1000),
            image_model: "gpt-image-1".to_string(),
            image_size: "1024x1024".to_string(),
            portrait_prompt: "Create a detailed portrait of a character with the following \
                description: {description}. The image should be a high-quality, professional \
                character portrait."
                .to_string(),
            request_timeout_secs: 120,
            connect_timeout_secs: 10,
            proxy: None,
        }
    }
}

impl ProviderConfig {
    /// Resolve an endpoint path against `base_url`, keeping any path prefix such as `/v1`.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        let mut base = self.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Url::parse(&base)?.join(path)
    }

    pub fn render_portrait_prompt(&self, description: &str) -> String {
        if self.portrait_prompt.contains("{description}") {
            self.portrait_prompt.replace("{description}", description)
        } else {
            format!("{} {}", self.portrait_prompt, description)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_secs: f64,
    pub jitter: bool,
    /// Wait applied to a 429 that carries no usable `Retry-After`.
    pub default_retry_after_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 1.0,
            jitter: true,
            default_retry_after_secs: 60.0,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        let base = Duration::try_from_secs_f64(self.base_delay_secs).unwrap_or(Duration::from_secs(1));
        let policy = RetryPolicy::new(self.max_attempts, base);
        if self.jitter {
            policy
        } else {
            policy.without_jitter()
        }
    }
}

impl Config {
    /// Defaults, then `config.toml`, then `STORY_SYNTH_*` variables, then `OPENAI_API_KEY`.
    pub fn load() -> Result<Self, SetupError> {
        Self::load_from(CONFIG_FILE)
    }

    pub fn load_from(config_file: &str) -> Result<Self, SetupError> {
        Ok(Self::figment(config_file).extract()?)
    }

    pub fn figment(config_file: &str) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(
                Env::raw()
                    .only(&["OPENAI_API_KEY"])
                    .map(|_| "basic.api_key".into()),
            )
    }
}
