// SPDX-License-Identifier: AGPL-3.0-or-later
//! kube-deploy: applies a deployment's Kubernetes manifests for one environment
//!
//! The environment name picks the manifest directory and doubles as the target
//! namespace. Manifests are applied one at a time with `kubectl apply` in a
//! fixed order, and the first failure stops the rollout.
//!
//! # Features
//!
//! * **Fixed Order:** configmap, server, prover, nginx, ingress
//! * **Fail Fast:** the failing `kubectl` exit status becomes the process status
//! * **Dry Run:** print the resolved commands without touching the cluster

pub mod config;
pub mod error;
pub mod rollout;

pub use config::Config;
pub use error::{DeployError, Result};
