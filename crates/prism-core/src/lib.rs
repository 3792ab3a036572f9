//! Prism Core - Foundational types shared by the Prism crates
//!
//! This crate provides the pieces every other Prism crate depends on:
//! - `PrismError` / `Result` - the error taxonomy for host-side checks
//! - `PrismConfig` - layered `prism.toml` configuration

mod config;
mod error;

pub use config::{
    BakeConfig, BakeFileSection, LogConfig, LogFileSection, PrismConfig, PrismConfigFile,
    DEFAULT_THETA_SAMPLES, MAX_THETA_SAMPLES,
};
pub use error::{PrismError, Result};
