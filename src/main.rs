//! # Main — CLI Entry Point
//!
//! Routes `frobpoly` subcommands to the reconstruction library. Handles the
//! shared concerns: `.env` loading, structured logging, and the Rayon thread
//! pool used for batch solving.
//!
//! ## Subcommands
//!
//! - `charpoly`: reconstruct one characteristic polynomial from a problem file.
//! - `batch`: solve every `[[problem]]` of a file in parallel.
//! - `companion`: print the companion matrix of a monic polynomial.
//! - `dirichlet`: expand an Euler-factor table into Dirichlet coefficients.
//!
//! ## Global Options
//!
//! - `--threads` / `FROBPOLY_THREADS`: Rayon thread pool size (0 = all cores).
//! - `--json`: machine-readable output on stdout.
//!
//! Logs go to stderr; `RUST_LOG` filters them and `LOG_FORMAT=json` switches
//! to JSON lines.

mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(
    name = "frobpoly",
    about = "Exact Frobenius characteristic polynomials from p-adic approximations"
)]
struct Cli {
    /// Number of rayon worker threads (defaults to all logical cores)
    #[arg(long, env = "FROBPOLY_THREADS")]
    threads: Option<usize>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconstruct the characteristic polynomial described by a problem file
    Charpoly {
        /// Problem file (.toml or .json)
        #[arg(long)]
        input: PathBuf,
    },
    /// Solve every [[problem]] in a file, in parallel
    Batch {
        /// Batch file (.toml or .json)
        #[arg(long)]
        input: PathBuf,
    },
    /// Print the companion matrix of x^n + c1 x^(n-1) + ... + cn
    Companion {
        /// Coefficients 1,c1,...,cn (leading coefficient first)
        #[arg(long, allow_hyphen_values = true)]
        coeffs: String,
    },
    /// Dirichlet coefficients of an Euler product
    Dirichlet {
        /// Euler-factor file with an [euler_factors] table keyed by prime
        #[arg(long)]
        input: PathBuf,
        /// Largest index to compute (default: next prime after the largest key, minus one)
        #[arg(long)]
        bound: Option<u64>,
    },
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // LOG_FORMAT=json for log shipping, human-readable otherwise
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    let cli = Cli::parse();
    cli::configure_rayon(cli.threads);

    match &cli.command {
        Commands::Charpoly { input } => cli::run_charpoly(input, cli.json),
        Commands::Batch { input } => cli::run_batch(input, cli.json),
        Commands::Companion { coeffs } => cli::run_companion(coeffs, cli.json),
        Commands::Dirichlet { input, bound } => cli::run_dirichlet(input, *bound, cli.json),
    }
}
