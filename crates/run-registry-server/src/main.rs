// crates/run-registry-server/src/main.rs
// ============================================================================
// Module: Run Registry Entry Point
// Description: Binary entry point loading configuration and serving HTTP.
// Purpose: Provide a small, fail-closed launcher for the registry service.
// Dependencies: clap, run-registry-config, run-registry-server, tokio
// ============================================================================

//! ## Overview
//! The binary parses its command line, loads and validates the TOML
//! configuration, and hands off to the server loop. Configuration errors
//! surface before any socket is bound.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use run_registry_config::RegistryConfig;
use run_registry_server::server;
use thiserror::Error;

// ============================================================================
// SECTION: CLI
// ============================================================================

/// Run registry service launcher.
#[derive(Debug, Parser)]
#[command(name = "run-registry", version, about = "Experiment run registry service")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, value_name = "PATH")]
    config: PathBuf,
    /// Validate the configuration and exit without serving.
    #[arg(long)]
    check_config: bool,
}

/// Launcher errors.
#[derive(Debug, Error)]
enum MainError {
    /// Configuration could not be loaded or validated.
    #[error("{0}")]
    Config(#[from] run_registry_config::ConfigError),
    /// Server assembly or serve loop failed.
    #[error("{0}")]
    Serve(#[from] server::ServeError),
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Binary entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Loads configuration and serves until shutdown.
async fn run() -> Result<(), MainError> {
    let cli = Cli::parse();
    let config = RegistryConfig::load(&cli.config)?;
    if cli.check_config {
        return Ok(());
    }
    server::run(config).await?;
    Ok(())
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let mut stderr = std::io::stderr();
    let _ = writeln!(&mut stderr, "{message}");
    ExitCode::FAILURE
}
