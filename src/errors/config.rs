// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Errors raised while loading a plugin configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read plugin configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid YAML for a plugin configuration.
    #[error("Failed to parse plugin configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The configuration parsed but violates a constraint.
    #[error("Invalid plugin configuration: {0}")]
    Invalid(String),
}
