//! Property-based tests for frobpoly's reconstruction pipeline.
//!
//! These tests use the `proptest` framework to check the algebraic laws the
//! reconstruction must satisfy across randomly generated inputs. The inputs
//! are genuine Weil polynomials: products of quadratics x² − t·x + p^w with
//! t² ≤ 4p^w, whose roots all have absolute value p^(w/2). Each polynomial is
//! fed in as the exact companion matrix of the polynomial, so the expected
//! output is known in advance.
//!
//! # How to run
//!
//! ```bash
//! # Run all property tests:
//! cargo test --test property_tests
//!
//! # Increase case count for thorough testing (default is 256):
//! PROPTEST_CASES=10000 cargo test --test property_tests
//! ```
//!
//! # Testing strategy
//!
//! - **Reconstruction**: exactness on Weil polynomials, the functional
//!   equation law, the odd-weight sign law, determinism, and rejection of
//!   insufficient precision.
//! - **Higher powers**: q = p^a with a ∈ {2, 3} over a quadratic extension,
//!   checked against the power-sum recurrence for the eigenvalues.
//! - **Unramified rings**: σ^f = id and σ a ring homomorphism.
//!
//! Each property is named `prop_<subject>_<invariant>`.

mod common;

use common::{companion_problem, integers, polymul, weil_quadratic};
use frobpoly::frobenius::{charpoly_frobenius, CharpolyError, FunctionalEquation, Sign};
use frobpoly::matrix::{IntMatrix, QAdicMatrix};
use frobpoly::qadic::UnramifiedRing;
use rug::ops::Pow;
use proptest::prelude::*;
use rug::Integer;

const PRIMES: [u64; 6] = [3, 5, 7, 11, 13, 17];

/// Strategy: (p, weight, list of traces) for a product of Weil quadratics.
fn weil_input(max_factors: usize) -> impl Strategy<Value = (u64, u32, Vec<i64>)> {
    (prop::sample::select(PRIMES.to_vec()), prop::sample::select(vec![1u32, 3]))
        .prop_flat_map(move |(p, w)| {
            let q = (p as i64).pow(w);
            // largest t with t² ≤ 4q
            let bound = (1..).take_while(|t: &i64| t * t <= 4 * q).last().unwrap_or(0);
            (
                Just(p),
                Just(w),
                prop::collection::vec(-bound..=bound, 1..=max_factors),
            )
        })
}

fn weil_polynomial(p: u64, w: u32, traces: &[i64]) -> Vec<Integer> {
    traces
        .iter()
        .fold(integers(&[1]), |acc, &t| polymul(&acc, &weil_quadratic(p, w, t)))
}

/// Uniform precision vector comfortably past the uniqueness bound.
fn generous_precision(degree: usize, w: u32) -> Vec<u32> {
    vec![(degree as u32) * w + 4; degree + 1]
}

// == Reconstruction =============================================================

proptest! {
    /// The exact Weil polynomial comes back from its truncated residues.
    #[test]
    fn prop_weil_polynomial_reconstructed_exactly((p, w, traces) in weil_input(3)) {
        let expected = weil_polynomial(p, w, &traces);
        let degree = expected.len() - 1;
        let precision = generous_precision(degree, w);
        let frob = companion_problem(p, precision[0], &expected);

        let r = charpoly_frobenius(&frob, &precision, p, w, 1).unwrap();
        prop_assert_eq!(r.coefficients, expected);
    }

    /// cp[i] = ε · cp[d−i] · p^(a(d−2i)w/2) holds exactly for i ≤ d/2.
    #[test]
    fn prop_functional_equation_holds((p, w, traces) in weil_input(3)) {
        let expected = weil_polynomial(p, w, &traces);
        let degree = expected.len() - 1;
        let precision = generous_precision(degree, w);
        let frob = companion_problem(p, precision[0], &expected);

        let r = charpoly_frobenius(&frob, &precision, p, w, 1).unwrap();
        let fe = FunctionalEquation::new(p, w, 1, degree).unwrap();
        for i in 0..=degree / 2 {
            let twist = fe.twist(i).unwrap().unwrap();
            let mirrored = Integer::from(&r.coefficients[degree - i] * &twist);
            let expected_i = match r.sign {
                Sign::Plus => mirrored,
                Sign::Minus => -mirrored,
            };
            prop_assert_eq!(&r.coefficients[i], &expected_i);
        }
    }

    /// Odd weight always resolves ε = +1.
    #[test]
    fn prop_odd_weight_sign_is_plus((p, w, traces) in weil_input(2)) {
        let expected = weil_polynomial(p, w, &traces);
        let degree = expected.len() - 1;
        let precision = generous_precision(degree, w);
        let frob = companion_problem(p, precision[0], &expected);

        let r = charpoly_frobenius(&frob, &precision, p, w, 1).unwrap();
        prop_assert_eq!(r.sign, Sign::Plus);
    }

    /// Even weight: x² − t·x + p² has ε = +1 for every admissible trace,
    /// read off the constant term p².
    #[test]
    fn prop_even_weight_sign_from_constant_term(
        (p, t) in prop::sample::select(PRIMES.to_vec())
            .prop_flat_map(|p| (Just(p), -2 * p as i64..=2 * p as i64)),
    ) {
        let expected = weil_quadratic(p, 2, t);
        let precision = vec![8, 8, 8];
        let frob = companion_problem(p, 8, &expected);

        let r = charpoly_frobenius(&frob, &precision, p, 2, 1).unwrap();
        prop_assert_eq!(r.sign, Sign::Plus);
        prop_assert_eq!(r.coefficients, expected);
    }

    /// Repeated invocations agree bit for bit.
    #[test]
    fn prop_reconstruction_is_deterministic((p, w, traces) in weil_input(2)) {
        let expected = weil_polynomial(p, w, &traces);
        let degree = expected.len() - 1;
        let precision = generous_precision(degree, w);
        let frob = companion_problem(p, precision[0], &expected);

        let first = charpoly_frobenius(&frob, &precision, p, w, 1).unwrap();
        let second = charpoly_frobenius(&frob, &precision, p, w, 1).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Precision 1 everywhere never satisfies k·p > 2d·p^(k/2) when p < 16,
    /// so the reconstruction must refuse.
    #[test]
    fn prop_insufficient_precision_rejected(
        p in prop::sample::select(vec![3u64, 5, 7, 11, 13]),
        traces in prop::collection::vec(-1i64..=1, 1..=3),
    ) {
        let expected = weil_polynomial(p, 1, &traces);
        let degree = expected.len() - 1;
        let precision = vec![1; degree + 1];
        let frob = companion_problem(p, 1, &expected);

        let err = charpoly_frobenius(&frob, &precision, p, 1, 1).unwrap_err();
        let is_precision_error = matches!(err, CharpolyError::PrecisionInsufficient { k: 1, .. });
        prop_assert!(is_precision_error, "unexpected error: {:?}", err);
    }
}

// == Higher powers ==============================================================

/// (p, degree-2 Conway polynomial constant term first).
const QUADRATIC_EXTENSIONS: [(u64, &[i64]); 3] = [(3, &[2, 2, 1]), (5, &[2, 4, 1]), (7, &[3, 6, 1])];

/// x² − s_a·x + P^a for the roots of x² − t·x + P, P = p^w, where
/// s_0 = 2, s_1 = t, s_n = t·s_(n−1) − P·s_(n−2).
fn power_quadratic(p: u64, w: u32, t: i64, a: u32) -> Vec<Integer> {
    let big_p = Integer::from(p).pow(w);
    let t = Integer::from(t);
    let (mut prev, mut cur) = (Integer::from(2), t.clone());
    for _ in 1..a {
        let next = Integer::from(&t * &cur) - Integer::from(&big_p * &prev);
        prev = cur;
        cur = next;
    }
    vec![big_p.pow(a), -cur, Integer::from(1)]
}

fn higher_power_input() -> impl Strategy<Value = (usize, u32, u32, Vec<i64>)> {
    (
        0..QUADRATIC_EXTENSIONS.len(),
        prop::sample::select(vec![1u32, 3]),
        2u32..=3,
    )
        .prop_flat_map(|(idx, w, a)| {
            let q = (QUADRATIC_EXTENSIONS[idx].0 as i64).pow(w);
            let bound = (1..).take_while(|t: &i64| t * t <= 4 * q).last().unwrap_or(0);
            (
                Just(idx),
                Just(w),
                Just(a),
                prop::collection::vec(-bound..=bound, 1..=2),
            )
        })
}

proptest! {
    /// The p-power Frobenius given as a companion matrix over Z_(p²) lifts
    /// to the exact charpoly of its a-th power.
    #[test]
    fn prop_higher_power_reconstructed_exactly((idx, w, a, traces) in higher_power_input()) {
        let (p, modulus) = QUADRATIC_EXTENSIONS[idx];
        let base = weil_polynomial(p, w, &traces);
        let expected = traces
            .iter()
            .fold(integers(&[1]), |acc, &t| polymul(&acc, &power_quadratic(p, w, t, a)));
        let degree = base.len() - 1;
        let cap = a * degree as u32 * w / 2 + 4;

        let normalized: Vec<Integer> = base.iter().rev().cloned().collect();
        let ring = UnramifiedRing::new(p, integers(modulus), cap).unwrap();
        let frob = QAdicMatrix::from_integer_matrix(ring, &IntMatrix::companion(&normalized).unwrap());

        let precision = vec![cap; degree + 1];
        let r = charpoly_frobenius(&frob, &precision, p, w, a).unwrap();
        prop_assert_eq!(r.sign, Sign::Plus);
        prop_assert_eq!(r.coefficients, expected);
    }
}

// == Unramified rings ===========================================================

/// (p, Conway polynomial constant term first).
const EXTENSIONS: [(u64, &[i64]); 6] = [
    (2, &[1, 1, 1]),
    (2, &[1, 1, 0, 1]),
    (3, &[2, 2, 1]),
    (3, &[1, 2, 0, 1]),
    (5, &[2, 4, 1]),
    (7, &[3, 6, 1]),
];

fn extension_element() -> impl Strategy<Value = (usize, Vec<u64>, Vec<u64>, u32)> {
    (0..EXTENSIONS.len(), 1u32..6).prop_flat_map(|(idx, prec)| {
        let f = EXTENSIONS[idx].1.len() - 1;
        let bound = EXTENSIONS[idx].0.pow(prec);
        (
            Just(idx),
            prop::collection::vec(0..bound, f),
            prop::collection::vec(0..bound, f),
            Just(prec),
        )
    })
}

fn ring_for(idx: usize) -> UnramifiedRing {
    let (p, modulus) = EXTENSIONS[idx];
    UnramifiedRing::new(p, integers(modulus), 6).unwrap()
}

proptest! {
    /// σ has order f on Z_q with q = p^f.
    #[test]
    fn prop_frobenius_order_is_degree((idx, x, _y, prec) in extension_element()) {
        let ring = ring_for(idx);
        let x = ring.element(x.into_iter().map(Integer::from).collect(), prec).unwrap();
        let mut image = x.clone();
        for _ in 0..ring.degree() {
            image = ring.frobenius(&image);
        }
        prop_assert_eq!(image, x);
    }

    /// σ(x·y) = σ(x)·σ(y) and σ(x+y) = σ(x)+σ(y).
    #[test]
    fn prop_frobenius_is_ring_homomorphism((idx, x, y, prec) in extension_element()) {
        let ring = ring_for(idx);
        let x = ring.element(x.into_iter().map(Integer::from).collect(), prec).unwrap();
        let y = ring.element(y.into_iter().map(Integer::from).collect(), 6).unwrap();

        let product = ring.frobenius(&ring.mul(&x, &y));
        let product_of_images = ring.mul(&ring.frobenius(&x), &ring.frobenius(&y));
        prop_assert_eq!(product, product_of_images);

        let sum = ring.frobenius(&ring.add(&x, &y));
        let sum_of_images = ring.add(&ring.frobenius(&x), &ring.frobenius(&y));
        prop_assert_eq!(sum, sum_of_images);
    }
}
