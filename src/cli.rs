//! # CLI Execution Functions
//!
//! Extracted from `main.rs` to keep the entry point slim. Contains the execution
//! logic for each subcommand and the rayon configuration.
//!
//! Results go to stdout (`--json` for machine-readable output); progress and
//! diagnostics go through `tracing` on stderr.

use anyhow::{Context, Result};
use frobpoly::dirichlet::dirichlet_coefficients;
use frobpoly::problem::{solve_batch, BatchFile, EulerFactorFile, Problem};
use frobpoly::{format_coefficients, parse_integer_list, IntMatrix};
use rug::Integer;
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};

fn strings(values: &[Integer]) -> Vec<String> {
    values.iter().map(Integer::to_string).collect()
}

// ── Reconstruction ──────────────────────────────────────────────

/// Solve a single problem file.
pub fn run_charpoly(input: &Path, json: bool) -> Result<()> {
    let problem = Problem::load(input)?;
    let started = Instant::now();
    let solution = problem.solve()?;
    info!(
        problem = %solution.name,
        sign = solution.sign,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "reconstruction complete"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&solution)?);
    } else {
        println!("{}", solution);
    }
    Ok(())
}

/// Solve every problem of a batch file on the rayon pool. All problems are
/// attempted; the command fails afterwards if any of them did.
pub fn run_batch(input: &Path, json: bool) -> Result<()> {
    let batch = BatchFile::load(input)?;
    let started = Instant::now();
    let results = solve_batch(&batch.problem);

    let mut failed = 0usize;
    let mut solved = Vec::new();
    for (problem, result) in batch.problem.iter().zip(results) {
        match result {
            Ok(solution) => solved.push(solution),
            Err(e) => {
                failed += 1;
                error!(problem = %problem.label(), error = %format!("{:#}", e), "problem failed");
            }
        }
    }
    info!(
        solved = solved.len(),
        failed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "batch complete"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&solved)?);
    } else {
        for solution in &solved {
            println!("{}: {}", solution.name, solution);
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} problems failed", failed, batch.problem.len());
    }
    Ok(())
}

// ── Utilities ───────────────────────────────────────────────────

/// Print the companion matrix of the monic polynomial with coefficients
/// `1,c1,...,cn`.
pub fn run_companion(coeffs: &str, json: bool) -> Result<()> {
    let coeffs = parse_integer_list(coeffs).context("parsing --coeffs")?;
    let m = IntMatrix::companion(&coeffs)?;

    if json {
        let rows: Vec<Vec<String>> = m.rows().iter().map(|row| strings(row)).collect();
        println!("{}", serde_json::to_string(&rows)?);
    } else {
        for row in m.rows() {
            println!("{}", format_coefficients(row));
        }
    }
    Ok(())
}

/// Expand an Euler-factor file into Dirichlet coefficients [0, a1, ..., aB].
pub fn run_dirichlet(input: &Path, bound: Option<u64>, json: bool) -> Result<()> {
    let file = EulerFactorFile::load(input)?;
    if bound.is_some() && file.bound.is_some() {
        warn!("--bound overrides the bound given in the file");
    }
    let factors = file.factors()?;
    let coefficients = dirichlet_coefficients(&factors, bound.or(file.bound))
        .with_context(|| format!("expanding {}", input.display()))?;
    info!(
        primes = factors.len(),
        bound = coefficients.len().saturating_sub(1),
        "Dirichlet coefficients computed"
    );

    if json {
        println!("{}", serde_json::to_string(&strings(&coefficients))?);
    } else {
        println!("{}", format_coefficients(&coefficients));
    }
    Ok(())
}

// ── Rayon ───────────────────────────────────────────────────────

pub fn configure_rayon(threads: Option<usize>) {
    let num_threads = threads.unwrap_or(0);
    if num_threads > 0 {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
        {
            warn!(error = %e, "Could not configure rayon thread pool");
        }
    }
}
