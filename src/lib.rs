pub mod api;
pub mod config;
pub mod credentials;
pub mod error;
pub mod service;
pub mod storage;
pub mod types;

pub use api::GenerativeClient;
pub use config::Config;
pub use credentials::{CredentialSource, SharedKey, StaticKey};
pub use error::GenerationError;
pub use service::{RequestQueue, RetryPolicy};
