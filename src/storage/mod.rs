//! Local storage for generated assets.

pub mod assets;

pub use assets::AssetStore;
