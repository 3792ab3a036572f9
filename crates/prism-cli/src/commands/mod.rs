//! CLI command implementations

pub mod bake;
pub mod shade;
