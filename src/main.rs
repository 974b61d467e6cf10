// SPDX-License-Identifier: AGPL-3.0-or-later
//! kube-deploy: applies an environment's Kubernetes manifests in order

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use kube_deploy::{
    config::{self, LoggingConfig, DEFAULT_CONFIG_FILE},
    rollout::{Environment, RolloutExecutor, RolloutPlan, StepStatus, ENV_VAR},
    Config, DeployError,
};

/// kube-deploy: Kubernetes manifest rollout
///
/// Applies the configmap, server, prover, nginx and ingress manifests of one
/// environment with `kubectl apply`, stopping at the first failure.
#[derive(Parser, Debug)]
#[command(name = "kube-deploy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Deployment environment, also the target namespace
    #[arg(long, env = ENV_VAR, global = true)]
    env: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Dry run mode (print kubectl commands without running them)
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply all manifests for the environment
    #[command(alias = "deploy")]
    Apply,

    /// Show the kubectl commands and verify the manifest files exist
    Check,

    /// Show configuration
    Config,

    /// Initialize a new configuration file
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show version information
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logging settings come from the config file when it is readable; a broken
    // file is reported by the command itself.
    let logging = Config::load_or_default(&cli.config)
        .map(|config| config.logging)
        .unwrap_or_default();
    init_logging(&cli, &logging);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli, logging: &LoggingConfig) {
    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        logging.level.as_str()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout belongs to kubectl and the report
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.debug)
        .with_writer(std::io::stderr);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Version => {
            println!("kube-deploy v{}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }

        Commands::Init { force } => init_config(&cli.config, force).map(|_| ExitCode::SUCCESS),

        Commands::Config => show_config(&cli.config).map(|_| ExitCode::SUCCESS),

        Commands::Check => {
            check_manifests(&cli.config, cli.env.as_deref()).map(|_| ExitCode::SUCCESS)
        }

        Commands::Apply => apply(&cli.config, cli.env.as_deref(), cli.dry_run).await,
    }
}

/// Initialize a new configuration file
fn init_config(config_path: &Path, force: bool) -> anyhow::Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(config_path, config::default_config_file())
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    info!("Created configuration file: {}", config_path.display());
    println!("Created configuration file: {}", config_path.display());
    Ok(())
}

/// Show the effective configuration
fn show_config(config_path: &Path) -> anyhow::Result<()> {
    if !config_path.exists() {
        println!("No configuration file found. Using defaults:");
        println!();
        println!("{}", Config::default().to_toml()?);
        return Ok(());
    }

    let config = load_config(config_path)?;
    println!("{}", config.to_toml()?);
    Ok(())
}

fn load_config(config_path: &Path) -> anyhow::Result<Config> {
    Config::load_or_default(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))
}

fn load_plan(config_path: &Path, env: Option<&str>) -> anyhow::Result<RolloutPlan> {
    let config = load_config(config_path)?;
    let environment = Environment::resolve(env)?;
    Ok(RolloutPlan::new(&config, environment))
}

/// Print the plan and verify every manifest file is present
fn check_manifests(config_path: &Path, env: Option<&str>) -> anyhow::Result<()> {
    let plan = load_plan(config_path, env)?;

    println!("Rollout plan for namespace '{}':", plan.environment());
    println!();
    for invocation in plan.invocations() {
        println!("  {}", invocation.command_line());
    }
    println!();

    let missing = plan.missing_manifests();
    if !missing.is_empty() {
        return Err(DeployError::ManifestsMissing {
            paths: missing.iter().map(|p| p.display().to_string()).collect(),
        }
        .into());
    }

    println!("All {} manifests present", plan.invocations().len());
    Ok(())
}

/// Apply every manifest in order; exit with the first failing status
async fn apply(config_path: &Path, env: Option<&str>, dry_run: bool) -> anyhow::Result<ExitCode> {
    let plan = load_plan(config_path, env)?;

    if dry_run {
        println!("[DRY RUN] Would apply manifests to namespace '{}':", plan.environment());
    } else {
        println!("Applying manifests to namespace '{}'", plan.environment());
    }

    let executor = RolloutExecutor::new(dry_run);
    let report = executor.execute(&plan).await;

    for step in &report.steps {
        match &step.status {
            StepStatus::Planned => println!("  {}", step.command_line),
            StepStatus::Applied => println!("  applied {}", step.manifest),
            StepStatus::Failed { exit_code } => {
                eprintln!("  {} failed with exit status {}", step.manifest, exit_code)
            }
            StepStatus::SpawnFailed { message } => {
                eprintln!("  {} could not be applied: {}", step.manifest, message)
            }
        }
    }

    if report.success() {
        println!("Rollout completed successfully ({} ms)", report.total_duration_ms);
        return Ok(ExitCode::SUCCESS);
    }

    let code = report.exit_code();
    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}
