// SPDX-License-Identifier: AGPL-3.0-or-later
//! Resolution of a rollout into concrete `kubectl` invocations

use std::path::{Path, PathBuf};

use super::{Environment, Manifest};
use crate::config::Config;

/// One fully-resolved `kubectl apply` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Manifest this call applies
    pub manifest: Manifest,
    /// Path of the manifest file
    pub path: PathBuf,
    /// Program to run
    pub program: PathBuf,
    /// Arguments after the program
    pub args: Vec<String>,
}

impl Invocation {
    fn apply(config: &Config, environment: &Environment, manifest: Manifest) -> Self {
        let path = config
            .manifest_root
            .join(environment.as_str())
            .join(manifest.file_name());

        let args = vec![
            "apply".to_string(),
            "-f".to_string(),
            path.display().to_string(),
            "--namespace".to_string(),
            environment.namespace().to_string(),
            format!("--record={}", config.kubectl.record),
            format!("--validate={}", config.kubectl.validate),
        ];

        Self {
            manifest,
            path,
            program: config.kubectl.program.clone(),
            args,
        }
    }

    /// Human-readable command line, for logs and dry runs
    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// The ordered invocations for one environment
#[derive(Debug, Clone)]
pub struct RolloutPlan {
    environment: Environment,
    invocations: Vec<Invocation>,
}

impl RolloutPlan {
    /// Build the plan; performs no I/O
    pub fn new(config: &Config, environment: Environment) -> Self {
        let invocations = Manifest::ORDER
            .iter()
            .map(|manifest| Invocation::apply(config, &environment, *manifest))
            .collect();

        Self {
            environment,
            invocations,
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn invocations(&self) -> &[Invocation] {
        &self.invocations
    }

    /// Manifest paths that do not exist on disk, in plan order
    pub fn missing_manifests(&self) -> Vec<&Path> {
        self.invocations
            .iter()
            .map(|invocation| invocation.path.as_path())
            .filter(|path| !path.is_file())
            .collect()
    }
}
