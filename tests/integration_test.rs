// SPDX-License-Identifier: AGPL-3.0-or-later
//! Integration tests for kube-deploy

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::tempdir;

fn kube_deploy() -> Command {
    let mut cmd = Command::cargo_bin("kube-deploy").unwrap();
    cmd.env_remove("ZKSYNC_ENV").env_remove("RUST_LOG");
    cmd
}

/// Test the version command
#[test]
fn test_version_command() {
    let mut cmd = kube_deploy();
    cmd.arg("version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("kube-deploy v"));
}

/// Test the help output
#[test]
fn test_help_command() {
    let mut cmd = kube_deploy();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("ZKSYNC_ENV"));
}

/// Test init command creates config file
#[test]
fn test_init_creates_config() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("kube-deploy.toml");

    let mut cmd = kube_deploy();
    cmd.arg("--config").arg(&config_path).arg("init");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Created configuration file"));

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("SPDX-License-Identifier"));
    assert!(content.contains("manifest_root"));
}

/// Test init refuses to overwrite without --force
#[test]
fn test_init_existing_without_force() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("kube-deploy.toml");
    std::fs::write(&config_path, "old content").unwrap();

    let mut cmd = kube_deploy();
    cmd.arg("--config").arg(&config_path).arg("init");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    assert_eq!(std::fs::read_to_string(&config_path).unwrap(), "old content");
}

/// Test init with --force overwrites existing config
#[test]
fn test_init_force() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("kube-deploy.toml");
    std::fs::write(&config_path, "old content").unwrap();

    let mut cmd = kube_deploy();
    cmd.arg("--config")
        .arg(&config_path)
        .arg("init")
        .arg("--force");
    cmd.assert().success();

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(!content.contains("old content"));
    assert!(content.contains("program = \"kubectl\""));
}

/// Test config command shows defaults when no file exists
#[test]
fn test_config_defaults() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("nonexistent.toml");

    let mut cmd = kube_deploy();
    cmd.arg("--config").arg(&config_path).arg("config");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Using defaults"))
        .stdout(predicate::str::contains("etc/kube/gen"));
}

/// Test apply without any environment selected
#[test]
fn test_apply_without_environment() {
    let temp_dir = tempdir().unwrap();

    let mut cmd = kube_deploy();
    cmd.arg("--config")
        .arg(temp_dir.path().join("absent.toml"))
        .arg("apply");
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("ZKSYNC_ENV"));
}

/// Test apply rejects an environment that is not a valid namespace
#[test]
fn test_apply_invalid_environment() {
    let temp_dir = tempdir().unwrap();

    let mut cmd = kube_deploy();
    cmd.env("ZKSYNC_ENV", "../prod")
        .arg("--config")
        .arg(temp_dir.path().join("absent.toml"))
        .arg("apply");
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid environment name"));
}

/// Test dry run prints every command without running kubectl
#[test]
fn test_apply_dry_run() {
    let temp_dir = tempdir().unwrap();

    let mut cmd = kube_deploy();
    cmd.env("ZKSYNC_ENV", "dev")
        .arg("--config")
        .arg(temp_dir.path().join("absent.toml"))
        .arg("--dry-run")
        .arg("apply");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("DRY RUN"))
        .stdout(predicate::str::contains(
            "kubectl apply -f etc/kube/gen/dev/configmap.yaml --namespace dev --record=true --validate=true",
        ))
        .stdout(predicate::str::contains("etc/kube/gen/dev/ingress.yaml"))
        .stdout(predicate::str::contains("completed successfully"));
}

#[cfg(unix)]
mod with_stub_kubectl {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    const MANIFESTS: [&str; 5] = ["configmap", "server", "prover", "nginx", "ingress"];

    struct Fixture {
        _temp_dir: tempfile::TempDir,
        root: PathBuf,
        config_path: PathBuf,
        log_path: PathBuf,
    }

    impl Fixture {
        /// Stub kubectl that logs its arguments and fails on `fail_on` with `code`
        fn new(fail_on: Option<(&str, i32)>) -> Self {
            let temp_dir = tempdir().unwrap();
            let root = temp_dir.path().to_path_buf();
            let log_path = root.join("kubectl.log");
            let stub_path = root.join("kubectl");

            let failure = match fail_on {
                Some((manifest, code)) => format!(
                    "case \"$3\" in\n  */{}.yaml) exit {} ;;\nesac\n",
                    manifest, code
                ),
                None => String::new(),
            };
            let script = format!(
                "#!/bin/sh\necho \"$@\" >> \"{}\"\n{}exit 0\n",
                log_path.display(),
                failure
            );
            std::fs::write(&stub_path, script).unwrap();
            std::fs::set_permissions(&stub_path, std::fs::Permissions::from_mode(0o755)).unwrap();

            let config_path = root.join("kube-deploy.toml");
            write_config(&config_path, &root.join("manifests"), &stub_path);

            Self {
                _temp_dir: temp_dir,
                root,
                config_path,
                log_path,
            }
        }

        fn add_manifests(&self, env: &str) {
            let dir = self.root.join("manifests").join(env);
            std::fs::create_dir_all(&dir).unwrap();
            for name in MANIFESTS {
                std::fs::write(dir.join(format!("{}.yaml", name)), "apiVersion: v1\n").unwrap();
            }
        }

        fn apply(&self, env: &str) -> Command {
            let mut cmd = kube_deploy();
            cmd.env("ZKSYNC_ENV", env)
                .arg("--config")
                .arg(&self.config_path)
                .arg("apply");
            cmd
        }

        fn logged_calls(&self) -> Vec<String> {
            std::fs::read_to_string(&self.log_path)
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect()
        }

        fn expected_call(&self, env: &str, manifest: &str) -> String {
            format!(
                "apply -f {}/{}/{}.yaml --namespace {} --record=true --validate=true",
                self.root.join("manifests").display(),
                env,
                manifest,
                env
            )
        }
    }

    fn write_config(path: &Path, manifest_root: &Path, program: &Path) {
        let content = format!(
            "manifest_root = \"{}\"\n\n[kubectl]\nprogram = \"{}\"\n",
            manifest_root.display(),
            program.display()
        );
        std::fs::write(path, content).unwrap();
    }

    /// All five manifests applied in order, exit status zero
    #[test]
    fn test_apply_runs_all_in_order() {
        let fixture = Fixture::new(None);

        fixture
            .apply("dev")
            .assert()
            .success()
            .stdout(predicate::str::contains("applied ingress"));

        let expected: Vec<_> = MANIFESTS
            .iter()
            .map(|m| fixture.expected_call("dev", m))
            .collect();
        assert_eq!(fixture.logged_calls(), expected);
    }

    /// A failing invocation stops the rollout and its status is passed through
    #[test]
    fn test_apply_stops_on_first_failure() {
        let fixture = Fixture::new(Some(("prover", 3)));

        fixture
            .apply("stage")
            .assert()
            .code(3)
            .stderr(predicate::str::contains("prover failed with exit status 3"));

        let calls = fixture.logged_calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[2], fixture.expected_call("stage", "prover"));
    }

    /// Failure on the very first manifest runs nothing else
    #[test]
    fn test_apply_configmap_failure() {
        let fixture = Fixture::new(Some(("configmap", 1)));

        fixture.apply("dev").assert().code(1);
        assert_eq!(fixture.logged_calls().len(), 1);
    }

    /// Changing the environment changes only the path and namespace
    #[test]
    fn test_environment_changes_only_path_and_namespace() {
        let dev = Fixture::new(None);
        let prod = Fixture::new(None);

        dev.apply("dev").assert().success();
        prod.apply("prod").assert().success();

        let dev_calls = dev.logged_calls();
        let prod_calls = prod.logged_calls();
        assert_eq!(dev_calls.len(), 5);
        assert_eq!(prod_calls.len(), 5);

        for (index, manifest) in MANIFESTS.iter().enumerate() {
            assert_eq!(dev_calls[index], dev.expected_call("dev", manifest));
            assert_eq!(prod_calls[index], prod.expected_call("prod", manifest));
        }
    }

    /// --env takes precedence over ZKSYNC_ENV
    #[test]
    fn test_env_flag_overrides_variable() {
        let fixture = Fixture::new(None);

        fixture.apply("dev").arg("--env").arg("qa").assert().success();

        let calls = fixture.logged_calls();
        assert_eq!(calls[0], fixture.expected_call("qa", "configmap"));
    }

    /// kubectl that cannot be started maps to the shell's 127
    #[test]
    fn test_missing_kubectl() {
        let fixture = Fixture::new(None);
        write_config(
            &fixture.config_path,
            &fixture.root.join("manifests"),
            &fixture.root.join("no-such-kubectl"),
        );

        fixture
            .apply("dev")
            .assert()
            .code(127)
            .stderr(predicate::str::contains("configmap could not be applied"));
    }

    /// check reports missing manifests without running kubectl
    #[test]
    fn test_check_missing_manifests() {
        let fixture = Fixture::new(None);

        let mut cmd = kube_deploy();
        cmd.env("ZKSYNC_ENV", "dev")
            .arg("--config")
            .arg(&fixture.config_path)
            .arg("check");
        cmd.assert()
            .failure()
            .stderr(predicate::str::contains("Missing manifest files"))
            .stderr(predicate::str::contains("configmap.yaml"));

        assert!(fixture.logged_calls().is_empty());
    }

    /// check succeeds once every manifest exists
    #[test]
    fn test_check_all_present() {
        let fixture = Fixture::new(None);
        fixture.add_manifests("dev");

        let mut cmd = kube_deploy();
        cmd.env("ZKSYNC_ENV", "dev")
            .arg("--config")
            .arg(&fixture.config_path)
            .arg("check");
        cmd.assert()
            .success()
            .stdout(predicate::str::contains("All 5 manifests present"));

        assert!(fixture.logged_calls().is_empty());
    }
}
