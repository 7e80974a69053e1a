//! # Dirichlet — L-series Coefficients from Euler Factors
//!
//! Expands an Euler product Π_p L_p(p^(−s))^(−1) into its Dirichlet series
//! Σ a_n n^(−s), given the local factors L_p(t) = 1 + c₁t + c₂t² + … for a
//! finite set of primes. Primes without a supplied factor have L_p = 1.
//!
//! ## Algorithm
//!
//! 1. **Prime powers**: a_{p^r} is the t^r coefficient of 1/L_p(t), from the
//!    recurrence b₀ = 1, b_r = −Σ_{j=1}^{min(r, deg)} c_j · b_{r−j}.
//! 2. **Multiplicativity**: a smallest-prime-factor sieve splits every n ≤ B
//!    as p^r · m with p ∤ m, and a_n = a_{p^r} · a_m. Walking n upward, both
//!    factors are always already known.
//!
//! The default bound is nextprime(max p) − 1: the largest B for which every
//! prime ≤ B has a supplied factor.

use rug::integer::IsPrime;
use rug::Integer;
use std::collections::BTreeMap;

/// Errors from expanding an Euler product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirichletError {
    EmptyFactors,
    /// The factor at `prime` does not start with 1.
    NotNormalized { prime: u64 },
    /// A key of the factor table is not prime.
    NotPrime { key: u64 },
}

impl std::fmt::Display for DirichletError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirichletError::EmptyFactors => write!(f, "no Euler factors supplied"),
            DirichletError::NotNormalized { prime } => {
                write!(f, "Euler factor at {} must have constant term 1", prime)
            }
            DirichletError::NotPrime { key } => write!(f, "Euler factor key {} is not prime", key),
        }
    }
}

impl std::error::Error for DirichletError {}

/// Smallest prime factor of every n ≤ limit (spf[0] = 0, spf[1] = 1).
pub fn smallest_prime_factors(limit: usize) -> Vec<usize> {
    let mut spf: Vec<usize> = (0..=limit).collect();
    let mut i = 2;
    while i * i <= limit {
        if spf[i] == i {
            for j in (i * i..=limit).step_by(i) {
                if spf[j] == j {
                    spf[j] = i;
                }
            }
        }
        i += 1;
    }
    spf
}

/// First `terms + 1` coefficients of 1/L(t) for L(t) = factor[0] + factor[1]·t + …,
/// with factor[0] = 1.
fn inverse_series(factor: &[Integer], terms: usize) -> Vec<Integer> {
    let degree = factor.len().saturating_sub(1);
    let mut b = Vec::with_capacity(terms + 1);
    b.push(Integer::from(1));
    for r in 1..=terms {
        let mut acc = Integer::new();
        for j in 1..=r.min(degree) {
            acc -= Integer::from(&factor[j] * &b[r - j]);
        }
        b.push(acc);
    }
    b
}

/// nextprime(max_prime) − 1.
pub fn default_bound(max_prime: u64) -> u64 {
    let next = Integer::from(max_prime).next_prime();
    next.to_u64().unwrap_or(u64::MAX) - 1
}

/// Dirichlet coefficients [0, a₁, …, a_B] of the Euler product.
pub fn dirichlet_coefficients(
    euler_factors: &BTreeMap<u64, Vec<Integer>>,
    bound: Option<u64>,
) -> Result<Vec<Integer>, DirichletError> {
    let max_prime = *euler_factors
        .keys()
        .next_back()
        .ok_or(DirichletError::EmptyFactors)?;
    for (&prime, factor) in euler_factors {
        if prime < 2 || Integer::from(prime).is_probably_prime(25) == IsPrime::No {
            return Err(DirichletError::NotPrime { key: prime });
        }
        if factor.first().map_or(true, |c| *c != 1) {
            return Err(DirichletError::NotNormalized { prime });
        }
    }

    let limit = bound.unwrap_or_else(|| default_bound(max_prime)) as usize;
    let spf = smallest_prime_factors(limit);
    let mut a = vec![Integer::new(); limit + 1];
    if limit >= 1 {
        a[1] = Integer::from(1);
    }

    let trivial = [Integer::from(1)];
    for n in 2..=limit {
        let p = spf[n];
        if p == n {
            let factor = euler_factors
                .get(&(p as u64))
                .map_or(&trivial[..], Vec::as_slice);
            let mut powers = Vec::new();
            let mut pk = p;
            loop {
                powers.push(pk);
                match pk.checked_mul(p) {
                    Some(next) if next <= limit => pk = next,
                    _ => break,
                }
            }
            let series = inverse_series(factor, powers.len());
            for (r, &pk) in powers.iter().enumerate() {
                a[pk] = series[r + 1].clone();
            }
            continue;
        }

        let mut m = n;
        while m % p == 0 {
            m /= p;
        }
        if m == 1 {
            continue;
        }
        a[n] = Integer::from(&a[n / m] * &a[m]);
    }
    Ok(a)
}
