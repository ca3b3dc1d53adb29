pub mod client;
pub mod openai_api;
pub mod response;

pub use client::GenerativeClient;
