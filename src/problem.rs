//! Problem files: TOML/JSON descriptions of a Frobenius matrix, batch solving,
//! and Euler-factor tables.
//!
//! A problem names the prime, exponent, weight and precision vector of a
//! reconstruction and lists the matrix entries. Entries are written the way
//! p-adic numbers are usually printed:
//!
//! ```toml
//! p = 17
//! weight = 1
//! precision = [2, 1, 1]
//! matrix = [
//!     ["O(17)", "8 + O(17)"],
//!     ["O(17)", "15 + O(17)"],
//! ]
//! ```
//!
//! Elements of a proper unramified extension are given by coordinates in the
//! power basis of `modulus`: `{ value = [3, "12*17"], prec = 2 }`.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use rug::ops::Pow;
use rug::Integer;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::frobenius::charpoly_frobenius;
use crate::matrix::QAdicMatrix;
use crate::qadic::UnramifiedRing;

// ── File formats ────────────────────────────────────────────────

/// An integer written either natively or as a decimal/expansion string, so
/// values beyond i64 survive TOML and JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Text(String),
}

impl Scalar {
    pub fn to_integer(&self) -> Result<Integer> {
        match self {
            Scalar::Int(v) => Ok(Integer::from(*v)),
            Scalar::Text(s) => parse_integer_expression(s),
        }
    }
}

/// One matrix entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entry {
    Integer(i64),
    Expansion(String),
    Coordinates {
        value: Vec<Scalar>,
        #[serde(default)]
        prec: Option<u32>,
    },
}

/// A single reconstruction problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    #[serde(default)]
    pub name: Option<String>,
    pub p: u64,
    #[serde(default = "default_exponent")]
    pub a: u32,
    pub weight: u32,
    pub precision: Vec<u32>,
    /// Defining polynomial of the coefficient ring, constant term first.
    #[serde(default)]
    pub modulus: Option<Vec<Scalar>>,
    #[serde(default)]
    pub cap: Option<u32>,
    pub matrix: Vec<Vec<Entry>>,
}

fn default_exponent() -> u32 {
    1
}

/// Reconstructed polynomial as written to JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    pub name: String,
    /// Coefficients, constant term first, as decimal strings.
    pub coefficients: Vec<String>,
    pub sign: i32,
}

impl std::fmt::Display for Solution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.coefficients.join(", "))
    }
}

/// A file of `[[problem]]` tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFile {
    pub problem: Vec<Problem>,
}

/// Euler factors keyed by prime, each constant term first (`[1, c1, c2, ...]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EulerFactorFile {
    #[serde(default)]
    pub bound: Option<u64>,
    pub euler_factors: BTreeMap<String, Vec<Scalar>>,
}

// ── Parsing ─────────────────────────────────────────────────────

fn parse_by_extension<T: DeserializeOwned>(path: &Path, content: &str) -> Result<T> {
    if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(content).with_context(|| format!("parsing JSON {}", path.display()))
    } else {
        toml::from_str(content).with_context(|| format!("parsing TOML {}", path.display()))
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

/// `N` or `N^K`.
fn parse_power(text: &str) -> Result<(Integer, u32)> {
    let text = text.trim();
    let (base, exponent) = match text.split_once('^') {
        Some((b, e)) => {
            let e: u32 = e
                .trim()
                .parse()
                .with_context(|| format!("bad exponent in '{}'", text))?;
            (b.trim(), e)
        }
        None => (text, 1),
    };
    let base: Integer = base
        .parse()
        .with_context(|| format!("bad integer '{}'", base))?;
    Ok((base, exponent))
}

/// Split `expr` at `+` and binary `-` into (negative, term) pairs. A `-`
/// that opens a term negates it.
fn signed_terms(expr: &str) -> Result<Vec<(bool, &str)>> {
    let mut terms = Vec::new();
    let mut negative = false;
    let mut start = 0;
    for (i, c) in expr.char_indices() {
        if c != '+' && c != '-' {
            continue;
        }
        let term = expr[start..i].trim();
        if term.is_empty() {
            if c == '+' {
                bail!("empty term in '{}'", expr);
            }
            negative = !negative;
        } else {
            terms.push((negative, term));
            negative = c == '-';
        }
        start = i + 1;
    }
    let last = expr[start..].trim();
    if last.is_empty() {
        bail!("empty term in '{}'", expr);
    }
    terms.push((negative, last));
    Ok(terms)
}

/// `N^K * M^L * ...`
fn parse_product(term: &str) -> Result<Integer> {
    let mut product = Integer::from(1);
    for factor in term.split('*') {
        let (base, exponent) = parse_power(factor)?;
        product *= base.pow(exponent);
    }
    Ok(product)
}

/// Sum and difference of products of powers, without an `O()` term.
fn parse_integer_expression(expr: &str) -> Result<Integer> {
    let mut value = Integer::new();
    for (negative, term) in signed_terms(expr)? {
        let product = parse_product(term)?;
        if negative {
            value -= product;
        } else {
            value += product;
        }
    }
    Ok(value)
}

/// Parse a p-adic expansion such as `"8*17 + 16*17^2 + O(17^3)"` into its
/// integer value and, when an `O()` term is present, its absolute precision.
/// Terms may be subtracted: `"8 - 3*17 + O(17^2)"`.
pub fn parse_expansion(expr: &str, prime: u64) -> Result<(Integer, Option<u32>)> {
    let mut value = Integer::new();
    let mut prec = None;
    for (negative, term) in signed_terms(expr)? {
        if let Some(inner) = term.strip_prefix("O(").and_then(|t| t.strip_suffix(')')) {
            if prec.is_some() {
                bail!("more than one O() term in '{}'", expr);
            }
            let (base, exponent) = parse_power(inner)?;
            if base != prime {
                bail!("O() base {} in '{}' does not match p = {}", base, expr, prime);
            }
            prec = Some(exponent);
        } else if negative {
            value -= parse_product(term)?;
        } else {
            value += parse_product(term)?;
        }
    }
    Ok((value, prec))
}

/// Entry after parsing: power-basis coordinates (a single one for base-ring
/// values) and optional precision.
struct ParsedEntry {
    coords: Vec<Integer>,
    prec: Option<u32>,
}

impl Entry {
    fn parse(&self, prime: u64) -> Result<ParsedEntry> {
        match self {
            Entry::Integer(v) => Ok(ParsedEntry {
                coords: vec![Integer::from(*v)],
                prec: None,
            }),
            Entry::Expansion(s) => {
                let (value, prec) = parse_expansion(s, prime)?;
                Ok(ParsedEntry {
                    coords: vec![value],
                    prec,
                })
            }
            Entry::Coordinates { value, prec } => Ok(ParsedEntry {
                coords: value
                    .iter()
                    .map(Scalar::to_integer)
                    .collect::<Result<Vec<_>>>()?,
                prec: *prec,
            }),
        }
    }
}

// ── Problems ────────────────────────────────────────────────────

impl Problem {
    /// Load a problem from a `.json` file, or TOML otherwise.
    pub fn load(path: &Path) -> Result<Problem> {
        parse_by_extension(path, &read(path)?)
    }

    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!(
                "p={} a={} w={} d={}",
                self.p,
                self.a,
                self.weight,
                self.matrix.len()
            ),
        }
    }

    fn parse_entries(&self) -> Result<Vec<Vec<ParsedEntry>>> {
        self.matrix
            .iter()
            .enumerate()
            .map(|(i, row)| {
                row.iter()
                    .enumerate()
                    .map(|(j, e)| {
                        e.parse(self.p)
                            .with_context(|| format!("matrix entry ({}, {})", i, j))
                    })
                    .collect()
            })
            .collect()
    }

    fn ring(&self, cap: u32) -> Result<UnramifiedRing> {
        let modulus = match &self.modulus {
            Some(m) => m
                .iter()
                .map(Scalar::to_integer)
                .collect::<Result<Vec<_>>>()
                .context("parsing modulus")?,
            None => vec![Integer::new(), Integer::from(1)],
        };
        UnramifiedRing::new(self.p, modulus, cap)
            .with_context(|| format!("building coefficient ring for {}", self.label()))
    }

    /// Matrix of the p-power Frobenius over the problem's coefficient ring.
    pub fn build_matrix(&self) -> Result<QAdicMatrix> {
        let entries = self.parse_entries()?;
        let cap = match self.cap {
            Some(cap) => cap,
            None => entries
                .iter()
                .flatten()
                .filter_map(|e| e.prec)
                .chain(self.precision.iter().copied())
                .max()
                .unwrap_or(0)
                .max(1),
        };
        let ring = self.ring(cap)?;
        debug!(problem = %self.label(), cap, degree = ring.degree(), "building matrix");

        let rows = entries
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                row.into_iter()
                    .enumerate()
                    .map(|(j, e)| {
                        ring.element(e.coords, e.prec.unwrap_or(cap))
                            .with_context(|| format!("matrix entry ({}, {})", i, j))
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        QAdicMatrix::new(ring, rows).with_context(|| format!("assembling {}", self.label()))
    }

    /// Reconstruct the characteristic polynomial of the q-power Frobenius.
    pub fn solve(&self) -> Result<Solution> {
        let frob = self.build_matrix()?;
        let reconstruction =
            charpoly_frobenius(&frob, &self.precision, self.p, self.weight, self.a)
                .with_context(|| format!("reconstructing {}", self.label()))?;
        let solution = Solution {
            name: self.label(),
            coefficients: reconstruction
                .coefficients
                .iter()
                .map(Integer::to_string)
                .collect(),
            sign: reconstruction.sign.as_i32(),
        };
        info!(problem = %solution.name, charpoly = %solution, "solved");
        Ok(solution)
    }
}

impl BatchFile {
    pub fn load(path: &Path) -> Result<BatchFile> {
        parse_by_extension(path, &read(path)?)
    }
}

/// Solve independent problems on the rayon pool; results keep input order.
pub fn solve_batch(problems: &[Problem]) -> Vec<Result<Solution>> {
    info!(count = problems.len(), "solving batch");
    problems.par_iter().map(Problem::solve).collect()
}

impl EulerFactorFile {
    pub fn load(path: &Path) -> Result<EulerFactorFile> {
        parse_by_extension(path, &read(path)?)
    }

    /// Factor table keyed by numeric prime.
    pub fn factors(&self) -> Result<BTreeMap<u64, Vec<Integer>>> {
        self.euler_factors
            .iter()
            .map(|(key, factor)| {
                let prime: u64 = key
                    .trim()
                    .parse()
                    .with_context(|| format!("Euler factor key '{}' is not an integer", key))?;
                let coeffs = factor
                    .iter()
                    .map(Scalar::to_integer)
                    .collect::<Result<Vec<_>>>()
                    .with_context(|| format!("Euler factor at {}", prime))?;
                Ok((prime, coeffs))
            })
            .collect()
    }
}
