//! # QAdic — Truncated Unramified p-adic Rings
//!
//! Explicit representation of the ring Z_q = W(F_q), q = p^f, truncated at a
//! fixed absolute precision cap. Frobenius matrices produced by p-adic
//! cohomology algorithms live over this ring; before their characteristic
//! polynomial can be reconstructed they must be twisted by the Galois action
//! and multiplied together (see `frobenius::frobenius_power`).
//!
//! ## Representation
//!
//! The ring is Z_p[ζ]/(g(ζ)) for a monic g of degree f that is irreducible
//! mod p. An element is a pair (coordinates, precision): coordinates in the
//! power basis 1, ζ, …, ζ^(f−1), each reduced into [0, p^N), together with
//! the absolute precision N (the element is known modulo p^N). The degree-1
//! ring with g(x) = x is plain Z_p.
//!
//! Precision follows capped-absolute rules:
//!
//! - `x + y` is known modulo p^min(N_x, N_y);
//! - `x · y` is known modulo p^min(v(x) + N_y, v(y) + N_x, cap).
//!
//! ## Frobenius Twist
//!
//! The arithmetic Frobenius σ is the unique ring automorphism with
//! σ(x) ≡ x^p (mod p). It is determined by σ(ζ), the root of g congruent to
//! ζ^p mod p, which is found once per ring by Newton–Hensel lifting:
//!
//!   x₀ = ζ^p,   x_{n+1} = x_n − g(x_n) · g′(x_n)^(−1).
//!
//! Units are inverted mod p as u^(p^f − 2) (F_q is a field) and the inverse is
//! lifted with the Newton step y ← y(2 − u·y). The twist of an element is then
//! Σ cᵢ σ(ζ)ⁱ, evaluated at the element's own precision.

use rug::ops::{Pow, RemRounding};
use rug::Integer;

/// Errors from constructing rings or elements, or from coercing elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QAdicError {
    /// The residue characteristic must be at least 2.
    InvalidPrime { p: u64 },
    /// A ring needs a positive precision cap.
    ZeroCap,
    /// The defining polynomial must have degree ≥ 1.
    ModulusTooShort { len: usize },
    /// The defining polynomial must be monic.
    ModulusNotMonic,
    /// An element was given more coordinates than the ring degree.
    CoefficientCount { expected: usize, actual: usize },
    /// An element's precision exceeds the ring's cap.
    PrecisionExceedsCap { prec: u32, cap: u32 },
    /// Hensel lifting of σ(ζ) failed: the defining polynomial is not
    /// separable (hence not irreducible) mod p.
    NotSeparable,
    /// Coercion to Z found a non-zero coordinate on ζ^index.
    NotInBaseRing { index: usize },
}

impl std::fmt::Display for QAdicError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QAdicError::InvalidPrime { p } => write!(f, "invalid residue characteristic {}", p),
            QAdicError::ZeroCap => write!(f, "precision cap must be positive"),
            QAdicError::ModulusTooShort { len } => write!(
                f,
                "defining polynomial needs degree >= 1 (got {} coefficients)",
                len
            ),
            QAdicError::ModulusNotMonic => write!(f, "defining polynomial is not monic"),
            QAdicError::CoefficientCount { expected, actual } => write!(
                f,
                "element has {} coordinates but the ring has degree {}",
                actual, expected
            ),
            QAdicError::PrecisionExceedsCap { prec, cap } => {
                write!(f, "precision {} exceeds ring cap {}", prec, cap)
            }
            QAdicError::NotSeparable => {
                write!(f, "defining polynomial is not separable mod p; cannot lift Frobenius")
            }
            QAdicError::NotInBaseRing { index } => write!(
                f,
                "element has a non-zero coordinate on zeta^{} and does not lie in Z_p",
                index
            ),
        }
    }
}

impl std::error::Error for QAdicError {}

/// An element of a truncated unramified ring: power-basis coordinates plus
/// absolute precision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QAdic {
    coeffs: Vec<Integer>,
    prec: u32,
}

impl QAdic {
    /// Power-basis coordinates, each in [0, p^prec).
    pub fn coefficients(&self) -> &[Integer] {
        &self.coeffs
    }

    /// Absolute precision: the element is known modulo p^precision.
    pub fn precision(&self) -> u32 {
        self.prec
    }
}

/// Z_p[ζ]/(g) truncated at absolute precision `cap`, with the Frobenius image
/// of the generator precomputed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnramifiedRing {
    prime: u64,
    p: Integer,
    /// Monic defining polynomial, constant term first.
    modulus: Vec<Integer>,
    cap: u32,
    p_cap: Integer,
    /// σ(ζ)^i mod p^cap for i in 0..degree.
    frobenius_basis: Vec<Vec<Integer>>,
}

impl UnramifiedRing {
    /// Build Z_p[ζ]/(modulus) truncated at `cap`.
    ///
    /// `modulus` is monic, constant term first, and assumed irreducible mod p
    /// (like the primality of `prime`, this is not verified beyond what
    /// Hensel lifting needs).
    pub fn new(prime: u64, modulus: Vec<Integer>, cap: u32) -> Result<Self, QAdicError> {
        if prime < 2 {
            return Err(QAdicError::InvalidPrime { p: prime });
        }
        if cap == 0 {
            return Err(QAdicError::ZeroCap);
        }
        if modulus.len() < 2 {
            return Err(QAdicError::ModulusTooShort { len: modulus.len() });
        }
        match modulus.last() {
            Some(lead) if *lead == 1 => {}
            _ => return Err(QAdicError::ModulusNotMonic),
        }

        let p = Integer::from(prime);
        let p_cap = p.clone().pow(cap);
        let degree = modulus.len() - 1;
        let modulus: Vec<Integer> = modulus
            .into_iter()
            .enumerate()
            .map(|(i, c)| if i == degree { c } else { c.rem_euc(&p_cap) })
            .collect();

        let mut ring = UnramifiedRing {
            prime,
            p,
            modulus,
            cap,
            p_cap,
            frobenius_basis: Vec::new(),
        };
        ring.frobenius_basis = ring.compute_frobenius_basis()?;
        Ok(ring)
    }

    /// The degree-1 ring Z_p truncated at `cap`.
    pub fn padic(prime: u64, cap: u32) -> Result<Self, QAdicError> {
        Self::new(prime, vec![Integer::new(), Integer::from(1)], cap)
    }

    pub fn prime(&self) -> u64 {
        self.prime
    }

    /// Residue degree f (so the residue field is F_{p^f}).
    pub fn degree(&self) -> usize {
        self.modulus.len() - 1
    }

    pub fn cap(&self) -> u32 {
        self.cap
    }

    pub fn modulus(&self) -> &[Integer] {
        &self.modulus
    }

    /// Build an element from power-basis coordinates known modulo p^prec.
    /// Missing trailing coordinates are zero.
    pub fn element(&self, coeffs: Vec<Integer>, prec: u32) -> Result<QAdic, QAdicError> {
        if coeffs.len() > self.degree() {
            return Err(QAdicError::CoefficientCount {
                expected: self.degree(),
                actual: coeffs.len(),
            });
        }
        if prec > self.cap {
            return Err(QAdicError::PrecisionExceedsCap {
                prec,
                cap: self.cap,
            });
        }
        let m = self.p_pow(prec);
        let mut reduced: Vec<Integer> = coeffs.into_iter().map(|c| c.rem_euc(&m)).collect();
        reduced.resize(self.degree(), Integer::new());
        Ok(QAdic {
            coeffs: reduced,
            prec,
        })
    }

    /// Embed an integer known modulo p^prec.
    pub fn from_integer(&self, value: Integer, prec: u32) -> Result<QAdic, QAdicError> {
        self.element(vec![value], prec)
    }

    /// Embed an integer at full (cap) precision.
    pub fn exact(&self, value: Integer) -> QAdic {
        let m = &self.p_cap;
        let mut coeffs = vec![Integer::new(); self.degree()];
        coeffs[0] = value.rem_euc(m);
        QAdic {
            coeffs,
            prec: self.cap,
        }
    }

    pub fn one(&self) -> QAdic {
        self.exact(Integer::from(1))
    }

    pub fn zero(&self, prec: u32) -> QAdic {
        QAdic {
            coeffs: vec![Integer::new(); self.degree()],
            prec: prec.min(self.cap),
        }
    }

    /// Check that `x` has the shape of an element of this ring.
    pub fn validate(&self, x: &QAdic) -> Result<(), QAdicError> {
        if x.coeffs.len() != self.degree() {
            return Err(QAdicError::CoefficientCount {
                expected: self.degree(),
                actual: x.coeffs.len(),
            });
        }
        if x.prec > self.cap {
            return Err(QAdicError::PrecisionExceedsCap {
                prec: x.prec,
                cap: self.cap,
            });
        }
        Ok(())
    }

    /// p-adic valuation of `x`; an element indistinguishable from zero has
    /// valuation equal to its precision.
    pub fn valuation(&self, x: &QAdic) -> u32 {
        x.coeffs
            .iter()
            .filter(|c| **c != 0)
            .map(|c| Integer::from(c).remove_factor(&self.p).1)
            .min()
            .map_or(x.prec, |v| v.min(x.prec))
    }

    pub fn add(&self, x: &QAdic, y: &QAdic) -> QAdic {
        let prec = x.prec.min(y.prec);
        let m = self.p_pow(prec);
        let coeffs = x
            .coeffs
            .iter()
            .zip(&y.coeffs)
            .map(|(a, b)| Integer::from(a + b).rem_euc(&m))
            .collect();
        QAdic { coeffs, prec }
    }

    pub fn mul(&self, x: &QAdic, y: &QAdic) -> QAdic {
        let prec = (self.valuation(x) + y.prec)
            .min(self.valuation(y) + x.prec)
            .min(self.cap);
        let m = self.p_pow(prec);
        QAdic {
            coeffs: self.mul_reduced(&x.coeffs, &y.coeffs, &m),
            prec,
        }
    }

    /// Apply the arithmetic Frobenius σ to `x`, keeping its precision.
    pub fn frobenius(&self, x: &QAdic) -> QAdic {
        if self.degree() == 1 {
            return x.clone();
        }
        let m = self.p_pow(x.prec);
        let mut coeffs = vec![Integer::new(); self.degree()];
        for (c, image) in x.coeffs.iter().zip(&self.frobenius_basis) {
            if *c == 0 {
                continue;
            }
            for (acc, b) in coeffs.iter_mut().zip(image) {
                *acc += Integer::from(c * b);
            }
        }
        for acc in &mut coeffs {
            *acc = std::mem::take(acc).rem_euc(&m);
        }
        QAdic {
            coeffs,
            prec: x.prec,
        }
    }

    /// Coerce `x` to Z, returning its canonical residue in [0, p^prec).
    pub fn to_integer(&self, x: &QAdic) -> Result<Integer, QAdicError> {
        if let Some(index) = x.coeffs.iter().skip(1).position(|c| *c != 0) {
            return Err(QAdicError::NotInBaseRing { index: index + 1 });
        }
        Ok(x.coeffs[0].clone())
    }

    pub(crate) fn p_pow(&self, k: u32) -> Integer {
        self.p.clone().pow(k)
    }

    // ── Polynomial arithmetic modulo (g, m) ─────────────────────────

    fn unit_coords(&self) -> Vec<Integer> {
        let mut one = vec![Integer::new(); self.degree()];
        one[0] = Integer::from(1);
        one
    }

    /// Product of two coordinate vectors, reduced by g and then mod m.
    fn mul_reduced(&self, x: &[Integer], y: &[Integer], m: &Integer) -> Vec<Integer> {
        let f = self.degree();
        let mut prod = vec![Integer::new(); 2 * f - 1];
        for (i, xi) in x.iter().enumerate() {
            if *xi == 0 {
                continue;
            }
            for (j, yj) in y.iter().enumerate() {
                prod[i + j] += Integer::from(xi * yj);
            }
        }
        // ζ^f = −(g₀ + g₁ζ + … + g_{f−1}ζ^{f−1}); fold from the top down.
        for top in (f..prod.len()).rev() {
            let lead = std::mem::take(&mut prod[top]);
            if lead == 0 {
                continue;
            }
            for (i, g) in self.modulus[..f].iter().enumerate() {
                prod[top - f + i] -= Integer::from(&lead * g);
            }
        }
        prod.truncate(f);
        prod.into_iter().map(|c| c.rem_euc(m)).collect()
    }

    /// base^exp in the ring, coordinates mod m.
    fn pow_reduced(&self, base: &[Integer], exp: &Integer, m: &Integer) -> Vec<Integer> {
        let mut result = self.unit_coords();
        for i in (0..exp.significant_bits()).rev() {
            result = self.mul_reduced(&result, &result, m);
            if exp.get_bit(i) {
                result = self.mul_reduced(&result, base, m);
            }
        }
        result
    }

    /// Evaluate the polynomial `poly` (constant term first) at `x`, mod m.
    fn eval_reduced(&self, poly: &[Integer], x: &[Integer], m: &Integer) -> Vec<Integer> {
        let mut acc = vec![Integer::new(); self.degree()];
        for c in poly.iter().rev() {
            acc = self.mul_reduced(&acc, x, m);
            acc[0] += c;
            acc[0] = std::mem::take(&mut acc[0]).rem_euc(m);
        }
        acc
    }

    /// Inverse of a unit mod p^cap.
    fn invert_reduced(&self, u: &[Integer]) -> Result<Vec<Integer>, QAdicError> {
        let f = self.degree() as u32;
        let u_mod_p: Vec<Integer> = u.iter().map(|c| Integer::from(c).rem_euc(&self.p)).collect();
        let field_order_minus_two = self.p.clone().pow(f) - 2u32;
        let mut y = self.pow_reduced(&u_mod_p, &field_order_minus_two, &self.p);
        if self.mul_reduced(&u_mod_p, &y, &self.p) != self.unit_coords() {
            return Err(QAdicError::NotSeparable);
        }

        let mut prec = 1u32;
        while prec < self.cap {
            prec = (2 * prec).min(self.cap);
            let m = self.p_pow(prec);
            let mut correction: Vec<Integer> = self
                .mul_reduced(u, &y, &m)
                .into_iter()
                .map(|c| (-c).rem_euc(&m))
                .collect();
            correction[0] += 2u32;
            y = self.mul_reduced(&y, &correction, &m);
        }
        Ok(y)
    }

    /// Powers σ(ζ)^i, i < degree, with σ(ζ) Hensel-lifted from ζ^p.
    fn compute_frobenius_basis(&self) -> Result<Vec<Vec<Integer>>, QAdicError> {
        let f = self.degree();
        let unit = self.unit_coords();
        if f == 1 {
            return Ok(vec![unit]);
        }

        let m = &self.p_cap;
        let mut zeta = vec![Integer::new(); f];
        zeta[1] = Integer::from(1);
        let mut root = self.pow_reduced(&zeta, &self.p, m);

        let derivative: Vec<Integer> = self
            .modulus
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, c)| Integer::from(c * i as u32))
            .collect();

        // Quadratic convergence: ⌈log2 cap⌉ + 1 steps always suffice.
        let steps = u32::BITS - self.cap.leading_zeros() + 1;
        let mut converged = false;
        for _ in 0..=steps {
            let residual = self.eval_reduced(&self.modulus, &root, m);
            if residual.iter().all(|c| *c == 0) {
                converged = true;
                break;
            }
            let slope = self.eval_reduced(&derivative, &root, m);
            let step = self.mul_reduced(&residual, &self.invert_reduced(&slope)?, m);
            for (r, s) in root.iter_mut().zip(step) {
                *r = Integer::from(&*r - &s).rem_euc(m);
            }
        }
        if !converged {
            return Err(QAdicError::NotSeparable);
        }

        let mut basis = Vec::with_capacity(f);
        basis.push(unit);
        for i in 1..f {
            let next = self.mul_reduced(&basis[i - 1], &root, m);
            basis.push(next);
        }
        Ok(basis)
    }
}
