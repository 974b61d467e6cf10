// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for kube-deploy

use thiserror::Error;

/// Result type alias for kube-deploy operations
pub type Result<T> = std::result::Result<T, DeployError>;

/// Errors raised by the tool itself, before or around `kubectl`
///
/// A failing `kubectl` invocation is not an error here: it is reported through
/// [`crate::rollout::RolloutReport`] so its exit status can be passed through.
#[derive(Error, Debug)]
pub enum DeployError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// No environment given on the command line or in the environment
    #[error("No deployment environment selected. Set {var} or pass --env")]
    MissingEnvironment { var: String },

    /// Environment name is not usable as a namespace
    #[error("Invalid environment name '{name}': {reason}")]
    InvalidEnvironment { name: String, reason: String },

    /// One or more manifest files are missing
    #[error("Missing manifest files: {}", paths.join(", "))]
    ManifestsMissing { paths: Vec<String> },

    /// IO error wrapper
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialize error: {0}")]
    TomlSerError(#[from] toml::ser::Error),
}
