//! Cairn CLI - Sequenced End-to-End Health Checks
//!
//! Walk an ordered series of HTTP steps (or TLS targets) and produce one
//! monitoring-plugin verdict: a status line on stdout and an exit code of
//! 0/1/2/3 for OK/WARNING/CRITICAL/UNKNOWN.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cairn::config::Config;
use cairn::engine::{RawStep, Runner, RunThresholds, Severity, StepSequence};
use cairn::probe::{CertProbe, HttpProbe, TlsResolver, VerifyMode};
use cairn::report;

/// Cairn - sequenced end-to-end health checks
#[derive(Debug, Parser)]
#[command(name = "cairn")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run an HTTP step series from a configuration file
    Run {
        /// Path to series configuration file
        #[arg(short, long, default_value = "series.yaml")]
        config: String,

        /// Whole-run deadline, overriding the config file (e.g. "30s", "2m")
        #[arg(short, long, value_parser = humantime::parse_duration)]
        timeout: Option<Duration>,
    },

    /// Check TLS targets for a stapled OCSP revocation status
    Cert {
        /// Target as host[:port]; repeatable, port defaults to 443
        #[arg(short = 'T', long = "target", required = true)]
        targets: Vec<String>,

        /// Skip certificate chain verification
        #[arg(long)]
        no_verify: bool,

        /// Failure policy applied to every target
        #[arg(long, default_value = "critical")]
        on_failure: String,

        /// Warning threshold for per-target handshake duration
        #[arg(short, long, default_value = "")]
        warning: String,

        /// Critical threshold for per-target handshake duration
        #[arg(short = 'C', long, default_value = "")]
        critical: String,

        /// Whole-run deadline (e.g. "30s", "2m")
        #[arg(short, long, value_parser = humantime::parse_duration)]
        timeout: Option<Duration>,
    },

    /// Generate a default configuration file
    Init {
        /// Output file path
        #[arg(short, long, default_value = "series.yaml")]
        output: String,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "series.yaml")]
        config: String,
    },
}

fn setup_logging(verbose: bool, json: bool) {
    let env_filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    // Diagnostics go to stderr; stdout carries only the plugin line.
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.json);

    let code = match cli.command {
        Commands::Run { config, timeout } => run_series(&config, timeout).await,

        Commands::Cert {
            targets,
            no_verify,
            on_failure,
            warning,
            critical,
            timeout,
        } => run_cert(&targets, no_verify, &on_failure, &warning, &critical, timeout).await,

        Commands::Init { output } => init_config(&output),

        Commands::Validate { config } => validate_config(&config),
    };

    std::process::exit(code);
}

/// Print the check-itself-failed line and return the UNKNOWN exit code
fn check_failure(err: &anyhow::Error) -> i32 {
    println!("cairn {} - {err:#}", Severity::Unknown);
    Severity::Unknown.exit_code()
}

/// Run an HTTP step series
async fn run_series(config_path: &str, timeout_override: Option<Duration>) -> i32 {
    let prepared = load_series(config_path);
    let (config, sequence, thresholds) = match prepared {
        Ok(p) => p,
        Err(e) => return check_failure(&e),
    };

    tracing::info!(
        series = %config.series.name,
        steps = sequence.len(),
        config = %config_path,
        "Series configuration loaded"
    );

    let probe = match HttpProbe::new().context("failed to build HTTP client") {
        Ok(p) => p,
        Err(e) => return check_failure(&e),
    };

    let deadline = timeout_override.or(config.timeout);
    let outcome = Runner::new(&probe).run(&sequence, &thresholds, deadline).await;

    println!("{}", report::render("cairn", &outcome));
    outcome.verdict.severity().exit_code()
}

fn load_series(config_path: &str) -> Result<(Config, StepSequence, RunThresholds)> {
    let config = Config::from_file(config_path)
        .with_context(|| format!("failed to load config from {config_path}"))?;
    let sequence = config.to_sequence().context("invalid step configuration")?;
    let thresholds = config
        .to_thresholds(&sequence)
        .context("invalid threshold configuration")?;
    Ok((config, sequence, thresholds))
}

/// Run the TLS/OCSP variant against a list of targets
async fn run_cert(
    targets: &[String],
    no_verify: bool,
    on_failure: &str,
    warning: &str,
    critical: &str,
    timeout: Option<Duration>,
) -> i32 {
    let prepared = load_cert_series(targets, on_failure, warning, critical);
    let (sequence, thresholds) = match prepared {
        Ok(p) => p,
        Err(e) => return check_failure(&e),
    };

    let verify = if no_verify {
        VerifyMode::NoVerification
    } else {
        VerifyMode::Full
    };
    let probe = CertProbe::new(TlsResolver::new(), verify);

    let outcome = Runner::new(&probe).run(&sequence, &thresholds, timeout).await;

    println!("{}", report::render("cairn", &outcome));
    outcome.verdict.severity().exit_code()
}

fn load_cert_series(
    targets: &[String],
    on_failure: &str,
    warning: &str,
    critical: &str,
) -> Result<(StepSequence, RunThresholds)> {
    let raws: Vec<(String, RawStep)> = targets
        .iter()
        .map(|target| {
            (
                target.clone(),
                RawStep {
                    target: target.clone(),
                    on_failure: Some(on_failure.to_string()),
                    ..Default::default()
                },
            )
        })
        .collect();

    let sequence = StepSequence::from(raws.iter().map(|(n, r)| (n.as_str(), r)))
        .context("invalid target configuration")?;
    let thresholds = RunThresholds::build(&sequence, warning, critical, "", "")
        .context("invalid threshold configuration")?;
    Ok((sequence, thresholds))
}

/// Generate a default configuration file
fn init_config(output: &str) -> i32 {
    let config = Config::default_config();
    let result = config
        .to_yaml()
        .context("failed to serialize config")
        .and_then(|yaml| {
            std::fs::write(output, &yaml)
                .with_context(|| format!("failed to write config to {output}"))
        });

    if let Err(e) = result {
        return check_failure(&e);
    }

    println!("Created {output}");
    println!();
    println!("Edit the file to configure your series, then run:");
    println!("  cairn run --config {output}");
    0
}

/// Validate a configuration file
fn validate_config(config_path: &str) -> i32 {
    let (config, sequence, thresholds) = match load_series(config_path) {
        Ok(p) => p,
        Err(e) => return check_failure(&e),
    };

    println!("Configuration is valid!");
    println!();
    println!("Series: {}", config.series.name);
    println!("Steps (execution order):");

    for step in sequence.iter() {
        let mut notes = vec![step.method().to_string()];
        if let Some(t) = thresholds.step_warning.get(step.name()) {
            notes.push(format!("warning {t}"));
        }
        if let Some(t) = thresholds.step_critical.get(step.name()) {
            notes.push(format!("critical {t}"));
        }
        notes.push(format!("on failure {}", step.on_failure()));
        println!("  - {} ({}) [{}]", step.name(), step.target(), notes.join(", "));
    }

    if let Some(timeout) = config.timeout {
        println!();
        println!("Deadline: {}", humantime::format_duration(timeout));
    }
    0
}
