// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration management for kube-deploy

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DeployError, Result};

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "kube-deploy.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding one generated manifest directory per environment
    #[serde(default = "default_manifest_root")]
    pub manifest_root: PathBuf,

    /// How `kubectl` is invoked
    #[serde(default)]
    pub kubectl: KubectlConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `kubectl` invocation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubectlConfig {
    /// Program to run, looked up on `PATH` when not absolute
    #[serde(default = "default_program")]
    pub program: PathBuf,

    /// Pass `--record=true` so the change is annotated on the resource
    #[serde(default = "default_true")]
    pub record: bool,

    /// Pass `--validate=true` for client-side schema validation
    #[serde(default = "default_true")]
    pub validate: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for KubectlConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            record: true,
            validate: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            manifest_root: default_manifest_root(),
            kubectl: KubectlConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The parsed configuration or an error
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(DeployError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;

        config.validate()?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.manifest_root.as_os_str().is_empty() {
            return Err(DeployError::InvalidConfig {
                message: "manifest_root cannot be empty".to_string(),
            });
        }

        if self.kubectl.program.as_os_str().is_empty() {
            return Err(DeployError::InvalidConfig {
                message: "kubectl.program cannot be empty".to_string(),
            });
        }

        match self.logging.format.as_str() {
            "text" | "json" => {}
            other => {
                return Err(DeployError::InvalidConfig {
                    message: format!("Unknown logging format '{}', expected text or json", other),
                })
            }
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Contents written by `kube-deploy init`
pub fn default_config_file() -> &'static str {
    r#"# SPDX-License-Identifier: AGPL-3.0-or-later
# kube-deploy configuration

# Manifests are read from <manifest_root>/<env>/<name>.yaml
manifest_root = "etc/kube/gen"

[kubectl]
program = "kubectl"
record = true
validate = true

[logging]
level = "warn"
format = "text"
"#
}

// Default value functions

fn default_manifest_root() -> PathBuf {
    PathBuf::from("etc/kube/gen")
}

fn default_program() -> PathBuf {
    PathBuf::from("kubectl")
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}
