use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use facegate_cli::cli::Cli;
use facegate_cli::commands::{dispatch, exit_code};
use facegate_cli::config::Config;
use facegate_cli::output::render;
use facegate_core::EnrollmentLifecycle;
use facegate_store::{DescriptorCipher, SqliteGalleryStore};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_code(&err)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let config = Config::load(cli)?;
    tracing::debug!(
        db = %config.db_path.display(),
        source = ?config.source,
        threshold = config.policy.threshold,
        early_exit = ?config.policy.early_exit_threshold,
        "configuration resolved"
    );

    let mut store = SqliteGalleryStore::open(&config.db_path)
        .with_context(|| format!("failed to open gallery database {}", config.db_path.display()))?;
    if let Some(key) = &config.store_key {
        store = store.with_cipher(
            DescriptorCipher::from_passphrase(key).context("invalid store key")?,
        );
    }

    let lifecycle = EnrollmentLifecycle::new(store)
        .with_policy(config.policy)
        .with_enrollment_policy(config.enrollment_policy);

    let report = dispatch(&cli.command, &lifecycle)?;
    render(&report, cli.output_mode())
}
