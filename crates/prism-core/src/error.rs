//! Error types for Prism

use thiserror::Error;

/// The main error type for Prism operations.
///
/// The shading stages themselves never fail; every variant here describes a
/// host-contract violation caught before a draw or dispatch, or a failure in
/// the tooling around the core (config, files, images).
#[derive(Debug, Error)]
pub enum PrismError {
    #[error("Index out of range in {table}: index {index} but only {len} slots")]
    IndexOutOfRange {
        table: &'static str,
        index: u32,
        len: usize,
    },

    #[error("Invalid light kind: {0}")]
    InvalidLightKind(u32),

    #[error("Invalid alpha mode: {0}")]
    InvalidAlphaMode(u32),

    #[error("Invalid cube face index: {0}")]
    InvalidCubeFace(u32),

    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),

    #[error("Image error: {0}")]
    ImageError(String),
}

/// Result type alias for Prism operations
pub type Result<T> = std::result::Result<T, PrismError>;

impl From<toml::de::Error> for PrismError {
    fn from(err: toml::de::Error) -> Self {
        PrismError::TomlParseError(err.to_string())
    }
}
