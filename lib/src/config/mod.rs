//! Configuration for print objects and print regions.
//!
//! Configs are plain serde structs with builder methods. Missing JSON
//! fields fall back to the defaults.

mod print_config;

pub use print_config::{InfillPattern, PrintObjectConfig, PrintRegionConfig};

use crate::Result;
use serde::de::DeserializeOwned;

/// Parse a config from JSON and validate it.
pub fn from_json_str<T>(json: &str) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    let config: T = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}

/// Config types that can check their own invariants.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

impl Validate for PrintObjectConfig {
    fn validate(&self) -> Result<()> {
        PrintObjectConfig::validate(self)
    }
}

impl Validate for PrintRegionConfig {
    fn validate(&self) -> Result<()> {
        PrintRegionConfig::validate(self)
    }
}
