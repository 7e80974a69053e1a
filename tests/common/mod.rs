//! Shared test helpers for integration tests.

#![allow(dead_code)]

use frobpoly::matrix::{IntMatrix, QAdicMatrix};
use frobpoly::qadic::UnramifiedRing;
use rug::ops::Pow;
use rug::Integer;
use std::path::PathBuf;

pub fn integers(values: &[i64]) -> Vec<Integer> {
    values.iter().map(|&v| Integer::from(v)).collect()
}

/// Product of two polynomials given constant term first.
pub fn polymul(a: &[Integer], b: &[Integer]) -> Vec<Integer> {
    let mut out = vec![Integer::new(); a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += Integer::from(x * y);
        }
    }
    out
}

/// x² − t·x + p^w, constant term first.
pub fn weil_quadratic(p: u64, weight: u32, t: i64) -> Vec<Integer> {
    vec![Integer::from(p).pow(weight), Integer::from(-t), Integer::from(1)]
}

/// Companion matrix of the monic `charpoly` (constant term first), embedded
/// in Z_p with precision cap `cap`.
pub fn companion_problem(p: u64, cap: u32, charpoly: &[Integer]) -> QAdicMatrix {
    let normalized: Vec<Integer> = charpoly.iter().rev().cloned().collect();
    let m = IntMatrix::companion(&normalized).unwrap();
    QAdicMatrix::from_integer_matrix(UnramifiedRing::padic(p, cap).unwrap(), &m)
}

/// Path of a file under the repository's `problems/` directory.
pub fn problem_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("problems")
        .join(name)
}
