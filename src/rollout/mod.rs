// SPDX-License-Identifier: AGPL-3.0-or-later
//! Manifest rollout: planning and execution
//!
//! A rollout applies the five manifests of one environment with `kubectl`,
//! strictly one after another, and stops at the first failing invocation.

mod executor;
mod plan;

pub use executor::{RolloutExecutor, RolloutReport, StepOutcome, StepStatus};
pub use plan::{Invocation, RolloutPlan};

use std::fmt;

use crate::error::{DeployError, Result};

/// Environment variable that selects the deployment environment
pub const ENV_VAR: &str = "ZKSYNC_ENV";

/// Longest name Kubernetes accepts for a namespace
const MAX_NAMESPACE_LEN: usize = 63;

/// The manifests of a deployment, in application order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Manifest {
    /// Shared configuration consumed by every other resource
    ConfigMap,
    /// API server
    Server,
    /// Proof generator
    Prover,
    /// Reverse proxy in front of the server
    Nginx,
    /// External routing to nginx
    Ingress,
}

impl Manifest {
    /// Application order; configmap must exist before the pods that mount it
    pub const ORDER: [Manifest; 5] = [
        Manifest::ConfigMap,
        Manifest::Server,
        Manifest::Prover,
        Manifest::Nginx,
        Manifest::Ingress,
    ];

    /// Short name, also the manifest file stem
    pub fn name(&self) -> &'static str {
        match self {
            Manifest::ConfigMap => "configmap",
            Manifest::Server => "server",
            Manifest::Prover => "prover",
            Manifest::Nginx => "nginx",
            Manifest::Ingress => "ingress",
        }
    }

    /// File name inside the environment directory
    pub fn file_name(&self) -> String {
        format!("{}.yaml", self.name())
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A validated deployment environment name
///
/// The name is used as a Kubernetes namespace and as a directory name, so it
/// must be a DNS-1123 label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment(String);

impl Environment {
    /// Validate and wrap an environment name
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if let Some(reason) = label_violation(&name) {
            return Err(DeployError::InvalidEnvironment { name, reason });
        }
        Ok(Self(name))
    }

    /// Resolve the environment from an optional value (CLI flag or `ZKSYNC_ENV`)
    pub fn resolve(value: Option<&str>) -> Result<Self> {
        match value {
            Some(name) => Self::new(name),
            None => Err(DeployError::MissingEnvironment {
                var: ENV_VAR.to_string(),
            }),
        }
    }

    /// Namespace the manifests are applied to
    pub fn namespace(&self) -> &str {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn label_violation(name: &str) -> Option<String> {
    if name.is_empty() {
        return Some("name is empty".to_string());
    }
    if name.len() > MAX_NAMESPACE_LEN {
        return Some(format!("longer than {} characters", MAX_NAMESPACE_LEN));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Some(format!(
            "invalid character '{}', only lowercase letters, digits and '-' are allowed",
            c
        ));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Some("must start and end with a letter or digit".to_string());
    }
    None
}
