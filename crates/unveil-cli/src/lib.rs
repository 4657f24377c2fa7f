//! Unveil command line support
//!
//! - [`demo`]: offline collaborators used without a base URL
//! - [`simulator`]: randomized runs checking the controller invariants

#![allow(missing_docs)]

pub mod demo;
pub mod simulator;

use std::path::Path;
use unveil_core::{ConfigError, UnveilConfig};

/// Load the configuration file if given, else defaults; validated either way
///
/// # Errors
/// Read, parse or validation failures
pub fn load_config(path: Option<&Path>) -> Result<UnveilConfig, ConfigError> {
    let config = match path {
        Some(path) => UnveilConfig::load(path)?,
        None => UnveilConfig::default(),
    };
    config.validate()?;
    Ok(config)
}
