// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! YAML loader for [`DataPlaneConfig`].
//!
//! ```yaml
//! max_transfer_bytes: 1048576
//! negotiated_transports: false
//! buffer_cache:
//!   enabled: true
//!   max_thread_blocks: 64
//! ```
//!
//! Missing keys keep their defaults; unknown keys are ignored.

use super::DataPlaneConfig;
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Load a configuration file.
pub fn load_yaml(path: &Path) -> Result<DataPlaneConfig> {
    if !path.exists() {
        return Err(Error::ConfigFileNotFound(path.display().to_string()));
    }
    let content = fs::read_to_string(path)?;
    let config = from_yaml_str(&content)?;
    log::debug!(
        "[config] loaded {} (max_transfer_bytes={})",
        path.display(),
        config.max_transfer_bytes
    );
    Ok(config)
}

/// Parse configuration from YAML text.
pub fn from_yaml_str(content: &str) -> Result<DataPlaneConfig> {
    // An empty document deserializes to null; treat it as all defaults.
    if content.trim().is_empty() {
        return Ok(DataPlaneConfig::default());
    }
    let config: DataPlaneConfig = serde_yaml::from_str(content)
        .map_err(|e| Error::Config(format!("invalid YAML: {}", e)))?;
    config.validate()?;
    Ok(config)
}
