//! # Frobenius — Exact Characteristic Polynomials from p-adic Approximations
//!
//! Recovers the integer characteristic polynomial of the q-power Frobenius
//! (q = p^a) acting on a d-dimensional cohomology space of weight w, given
//! the p-power Frobenius matrix known only to finite p-adic precision and a
//! per-coefficient precision guarantee.
//!
//! ## Pipeline
//!
//! 1. **Lift** (`frobenius_power`): F · σ(F) · … · σ^(a−1)(F), coerced to Z.
//! 2. **Truncate** (`truncate_charpoly`): det(xI − F) with coefficient i
//!    reduced modulo p^precision[i].
//! 3. **Sign** (`resolve_sign`): the functional equation
//!    cp[i] = ε · cp[d−i] · p^(a(d−2i)w/2), ε ∈ {±1}. Odd weight forces ε = +1;
//!    even weight reads ε off the first coefficient pair whose residues are
//!    both non-zero modulo their common modulus.
//! 4. **Newton lift** (`newton_lift`): for k = 1..⌈d/2⌉, Newton's identities
//!    turn the residue of the elementary symmetric function e_k into the
//!    residue of the power sum s_k modulo k·p^precision[d−k]. Every root has
//!    absolute value p^(aw/2) (the Weil bound), so |s_k| ≤ d·p^(awk/2), and the
//!    precondition k·p^precision[d−k] > 2d·p^(awk/2) makes the representative
//!    in that window unique. The exact s_k then yields the exact e_k.
//!
//! ## Exactness
//!
//! All analytic comparisons are done on squares in exact integer arithmetic:
//! `r > d·p^(awk/2)` becomes `r² > d²·p^(awk)` for r ≥ 0.
//!
//! ## References
//!
//! - K. S. Kedlaya, "Counting points on hyperelliptic curves using
//!   Monsky–Washnitzer cohomology", J. Ramanujan Math. Soc. 16 (2001).
//! - D. Harvey, "Kedlaya's algorithm in larger characteristic", IMRN 2007.

use rug::ops::{Pow, RemRounding};
use rug::Integer;
use tracing::{debug, info};

use crate::matrix::{IntMatrix, MatrixError, QAdicMatrix};

/// The sign ε of the functional equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sign {
    Plus,
    Minus,
}

impl Sign {
    pub fn as_i32(self) -> i32 {
        match self {
            Sign::Plus => 1,
            Sign::Minus => -1,
        }
    }

    fn apply(self, value: Integer) -> Integer {
        match self {
            Sign::Plus => value,
            Sign::Minus => -value,
        }
    }
}

impl std::fmt::Display for Sign {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sign::Plus => write!(f, "+1"),
            Sign::Minus => write!(f, "-1"),
        }
    }
}

/// Output of [`charpoly_frobenius`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconstruction {
    /// Exact coefficients, constant term first; the last entry is 1.
    pub coefficients: Vec<Integer>,
    pub sign: Sign,
}

/// Errors from reconstructing a Frobenius characteristic polynomial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CharpolyError {
    /// The precision vector must have one entry per coefficient.
    InputLengthMismatch { expected: usize, actual: usize },
    /// det(xI − F) did not come out monic.
    NonMonicCharpoly { leading: Integer },
    /// precision[d−k] is too small to single out s_k; `required` is the
    /// least value that would work.
    PrecisionInsufficient { k: usize, available: u32, required: u32 },
    /// Every coefficient pair in the lower half was zero modulo its common
    /// modulus, so the even-weight sign cannot be read off.
    SignUndetermined { searched: usize },
    /// The pair at `index` contradicts the sign it determined.
    SignMismatch { index: usize },
    /// Newton's identity produced a non-integral e_k.
    NonIntegralPowerSumCorrection { k: usize, remainder: Integer },
    /// a·d·w is odd, so p^(a·d·w/2) is not an integer.
    HalfIntegralExponent { degree: usize, weight: u32, a: u32 },
    /// a·d·w does not fit in a u32 exponent.
    ExponentOverflow { degree: usize, weight: u32, a: u32 },
    InvalidPrime { p: u64 },
    ZeroExponent,
    /// The prime argument differs from the residue characteristic of the
    /// matrix ring.
    PrimeMismatch { expected: u64, actual: u64 },
    Matrix(MatrixError),
}

impl std::fmt::Display for CharpolyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CharpolyError::InputLengthMismatch { expected, actual } => write!(
                f,
                "precision vector has {} entries, expected {} (matrix dimension + 1)",
                actual, expected
            ),
            CharpolyError::NonMonicCharpoly { leading } => write!(
                f,
                "characteristic polynomial has leading coefficient {}, expected 1",
                leading
            ),
            CharpolyError::PrecisionInsufficient {
                k,
                available,
                required,
            } => write!(
                f,
                "precision {} for power sum s_{} cannot certify a unique lift (need at least {}); \
                 supply a more precise Frobenius matrix",
                available, k, required
            ),
            CharpolyError::SignUndetermined { searched } => write!(
                f,
                "functional equation sign undetermined: all {} coefficient pairs vanish at their precision",
                searched
            ),
            CharpolyError::SignMismatch { index } => write!(
                f,
                "coefficient pair ({}, d-{}) is inconsistent with the functional equation",
                index, index
            ),
            CharpolyError::NonIntegralPowerSumCorrection { k, remainder } => write!(
                f,
                "Newton identity for e_{} left remainder {} after division by {}",
                k, remainder, k
            ),
            CharpolyError::HalfIntegralExponent { degree, weight, a } => write!(
                f,
                "a*d*w = {}*{}*{} is odd; the functional equation would need half-integral powers of p",
                a, degree, weight
            ),
            CharpolyError::ExponentOverflow { degree, weight, a } => write!(
                f,
                "a*d*w = {}*{}*{} overflows a 32-bit exponent of p",
                a, degree, weight
            ),
            CharpolyError::InvalidPrime { p } => write!(f, "invalid prime {}", p),
            CharpolyError::ZeroExponent => write!(f, "Frobenius exponent a must be positive"),
            CharpolyError::PrimeMismatch { expected, actual } => write!(
                f,
                "prime {} does not match the matrix ring's prime {}",
                actual, expected
            ),
            CharpolyError::Matrix(e) => write!(f, "matrix error: {}", e),
        }
    }
}

impl std::error::Error for CharpolyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CharpolyError::Matrix(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MatrixError> for CharpolyError {
    fn from(e: MatrixError) -> Self {
        CharpolyError::Matrix(e)
    }
}

/// Shape of the functional equation: p, a, w and the degree d.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionalEquation {
    p: Integer,
    weight: u32,
    a: u32,
    degree: usize,
}

impl FunctionalEquation {
    pub fn new(prime: u64, weight: u32, a: u32, degree: usize) -> Result<Self, CharpolyError> {
        if prime < 2 {
            return Err(CharpolyError::InvalidPrime { p: prime });
        }
        if a == 0 {
            return Err(CharpolyError::ZeroExponent);
        }
        if (u64::from(a) * degree as u64 * u64::from(weight)) % 2 == 1 {
            return Err(CharpolyError::HalfIntegralExponent {
                degree,
                weight,
                a,
            });
        }
        let fe = FunctionalEquation {
            p: Integer::from(prime),
            weight,
            a,
            degree,
        };
        // Every exponent used later is a·w·m with m ≤ d.
        fe.exponent(degree)?;
        Ok(fe)
    }

    fn p_pow(&self, k: u32) -> Integer {
        self.p.clone().pow(k)
    }

    /// a·w·m as a u32.
    fn exponent(&self, m: usize) -> Result<u32, CharpolyError> {
        u32::try_from(m)
            .ok()
            .and_then(|m| self.a.checked_mul(self.weight)?.checked_mul(m))
            .ok_or(CharpolyError::ExponentOverflow {
                degree: self.degree,
                weight: self.weight,
                a: self.a,
            })
    }

    /// a(d − 2i)w/2, or `None` past the middle.
    fn twist_exponent(&self, i: usize) -> Result<Option<u32>, CharpolyError> {
        match self.degree.checked_sub(2 * i) {
            Some(span) => Ok(Some(self.exponent(span)? / 2)),
            None => Ok(None),
        }
    }

    /// p^(a(d − 2i)w/2), the factor relating cp[i] to cp[d − i].
    pub fn twist(&self, i: usize) -> Result<Option<Integer>, CharpolyError> {
        Ok(self.twist_exponent(i)?.map(|e| self.p_pow(e)))
    }

    /// Does the residue r ≥ 0 exceed the Weil bound d·p^(awk/2)?
    fn exceeds_weil_bound(&self, residue: &Integer, k: usize) -> Result<bool, CharpolyError> {
        let bound_sq = self.p_pow(self.exponent(k)?) * (self.degree * self.degree) as u64;
        Ok(Integer::from(residue * residue) > bound_sq)
    }

    /// k·p^N > 2d·p^(awk/2), compared on squares.
    fn lift_is_unique(&self, k: usize, precision: u32) -> Result<bool, CharpolyError> {
        let lhs = self.p_pow(precision) * k as u64;
        let rhs_sq = self.p_pow(self.exponent(k)?) * (4 * self.degree * self.degree) as u64;
        Ok(Integer::from(&lhs * &lhs) > rhs_sq)
    }

    /// Least precision N with k·p^N > 2d·p^(awk/2).
    fn required_precision(&self, k: usize, available: u32) -> Result<u32, CharpolyError> {
        let mut n = available;
        while !self.lift_is_unique(k, n)? {
            n += 1;
        }
        Ok(n)
    }
}

/// Phase 1: the integer matrix of the q-power Frobenius, q = p^a.
///
/// Computes F · σ(F) · σ²(F) ⋯ σ^(a−1)(F) in the truncated ring and coerces
/// the product to Z. For a = 1 the input is coerced directly.
pub fn frobenius_power(frob: &QAdicMatrix, a: u32) -> Result<IntMatrix, CharpolyError> {
    if a == 0 {
        return Err(CharpolyError::ZeroExponent);
    }
    let mut product = frob.clone();
    let mut twisted = frob.clone();
    for _ in 1..a {
        twisted = twisted.frobenius_twist();
        product = product.mul(&twisted)?;
    }
    Ok(product.to_integer_matrix()?)
}

/// Phase 2: validate det(xI − F) and reduce cp[i] modulo p^precision[i]
/// for i < d. The leading coefficient is exact and left alone.
pub fn truncate_charpoly(
    mut cp: Vec<Integer>,
    precision: &[u32],
    prime: u64,
) -> Result<Vec<Integer>, CharpolyError> {
    if precision.len() != cp.len() {
        return Err(CharpolyError::InputLengthMismatch {
            expected: cp.len(),
            actual: precision.len(),
        });
    }
    let degree = cp.len().saturating_sub(1);
    match cp.last() {
        Some(lead) if *lead == 1 => {}
        Some(lead) => {
            return Err(CharpolyError::NonMonicCharpoly {
                leading: lead.clone(),
            })
        }
        None => {
            return Err(CharpolyError::NonMonicCharpoly {
                leading: Integer::new(),
            })
        }
    }
    let p = Integer::from(prime);
    for (c, &prec) in cp.iter_mut().zip(precision).take(degree) {
        let modulus = p.clone().pow(prec);
        *c = std::mem::take(c).rem_euc(&modulus);
    }
    Ok(cp)
}

/// Phase 3: the sign ε of the functional equation.
///
/// `cp` holds residues as produced by [`truncate_charpoly`].
pub fn resolve_sign(
    cp: &[Integer],
    precision: &[u32],
    fe: &FunctionalEquation,
) -> Result<Sign, CharpolyError> {
    if fe.weight % 2 == 1 {
        // Odd weight: the Frobenius is symplectic, its charpoly reciprocal.
        return Ok(Sign::Plus);
    }
    let d = fe.degree;
    for i in 0..d / 2 {
        let Some(exp) = fe.twist_exponent(i)? else {
            break;
        };
        let m = precision[i].min(precision[d - i].saturating_add(exp));
        let modulus = fe.p_pow(m);
        if cp[i].is_divisible(&modulus) || cp[d - i].is_divisible(&modulus) {
            continue;
        }
        let mirrored = Integer::from(&cp[d - i] * &fe.p_pow(exp));
        let sign = if Integer::from(&cp[i] + &mirrored).is_divisible(&modulus) {
            Sign::Minus
        } else {
            Sign::Plus
        };
        let check = mirrored - sign.apply(cp[i].clone());
        if !check.is_divisible(&modulus) {
            return Err(CharpolyError::SignMismatch { index: i });
        }
        debug!(index = i, modulus_exp = m, %sign, "functional equation sign resolved");
        return Ok(sign);
    }
    Err(CharpolyError::SignUndetermined { searched: d / 2 })
}

/// Check k·p^precision[d−k] > 2d·p^(awk/2) for every k = 1..=⌈d/2⌉.
pub fn check_precision(precision: &[u32], fe: &FunctionalEquation) -> Result<(), CharpolyError> {
    let d = fe.degree;
    for k in 1..=(d + 1) / 2 {
        let available = precision[d - k];
        if !fe.lift_is_unique(k, available)? {
            return Err(CharpolyError::PrecisionInsufficient {
                k,
                available,
                required: fe.required_precision(k, available)?,
            });
        }
    }
    Ok(())
}

/// Phase 4: Newton-identity reconstruction of cp[1..d−1].
///
/// Expects cp[0] and cp[d] already exact and the remaining entries reduced
/// as by [`truncate_charpoly`].
pub fn newton_lift(
    mut cp: Vec<Integer>,
    precision: &[u32],
    fe: &FunctionalEquation,
    sign: Sign,
) -> Result<Vec<Integer>, CharpolyError> {
    check_precision(precision, fe)?;

    let d = fe.degree;
    let half = (d + 1) / 2;
    // e[k] = (−1)^k · cp[d−k]; s[k] = Σ λ^k over the Frobenius eigenvalues.
    let mut e: Vec<Integer> = (0..=half)
        .map(|k| {
            if k % 2 == 0 {
                cp[d - k].clone()
            } else {
                Integer::from(-&cp[d - k])
            }
        })
        .collect();
    let mut s = vec![Integer::new(); half + 1];

    for k in 1..=half {
        // Σ_{i=1}^{k−1} (−1)^i e[k−i] s[i]
        let mut acc = Integer::new();
        for i in 1..k {
            let term = Integer::from(&e[k - i] * &s[i]);
            if i % 2 == 0 {
                acc += term;
            } else {
                acc -= term;
            }
        }

        // s[k] = (−1)^(k−1) (acc + k e[k]), known modulo k·p^precision[d−k]
        let local_modulus = fe.p_pow(precision[d - k]) * k as u64;
        let mut provisional = Integer::from(&e[k] * k as u64) + &acc;
        if k % 2 == 0 {
            provisional = -provisional;
        }
        let mut power_sum = provisional.rem_euc(&local_modulus);
        if fe.exceeds_weil_bound(&power_sum, k)? {
            power_sum -= &local_modulus;
        }

        // k e[k] = (−1)^(k−1) s[k] − acc
        let mut numerator = if k % 2 == 1 {
            power_sum.clone()
        } else {
            Integer::from(-&power_sum)
        };
        numerator -= &acc;
        let (quotient, remainder) = numerator.div_rem_floor(Integer::from(k));
        if remainder != 0 {
            return Err(CharpolyError::NonIntegralPowerSumCorrection { k, remainder });
        }
        debug!(k, power_sum = %power_sum, e = %quotient, "Newton step");

        e[k] = quotient;
        s[k] = power_sum;
        cp[d - k] = if k % 2 == 0 {
            e[k].clone()
        } else {
            Integer::from(-&e[k])
        };
        // For odd d the last mirror index was fixed in the previous step.
        if let Some(twist) = fe.twist(k)? {
            cp[k] = sign.apply(Integer::from(&cp[d - k] * &twist));
        }
    }
    Ok(cp)
}

/// Reconstruct the exact characteristic polynomial of the q-power Frobenius.
///
/// - `frob`: p-power Frobenius matrix over the truncated ring;
/// - `precision`: precision[i] means coefficient i of det(xI − F) is correct
///   modulo p^precision[i] (length d + 1);
/// - `p`, `weight`, `a`: the prime, the motive weight and q = p^a.
///
/// Returns the coefficients constant term first, leading term 1, satisfying
/// cp[i] = ε·cp[d−i]·p^(a(d−2i)w/2) exactly.
pub fn charpoly_frobenius(
    frob: &QAdicMatrix,
    precision: &[u32],
    p: u64,
    weight: u32,
    a: u32,
) -> Result<Reconstruction, CharpolyError> {
    let degree = frob.dim();
    if precision.len() != degree + 1 {
        return Err(CharpolyError::InputLengthMismatch {
            expected: degree + 1,
            actual: precision.len(),
        });
    }
    if frob.ring().prime() != p {
        return Err(CharpolyError::PrimeMismatch {
            expected: frob.ring().prime(),
            actual: p,
        });
    }
    let fe = FunctionalEquation::new(p, weight, a, degree)?;

    let lifted = frobenius_power(frob, a)?;
    let mut cp = truncate_charpoly(lifted.charpoly(), precision, p)?;
    debug!(degree, p, a, weight, "characteristic polynomial truncated");

    let sign = resolve_sign(&cp, precision, &fe)?;
    cp[0] = sign.apply(fe.p_pow(fe.exponent(degree)? / 2));

    let coefficients = newton_lift(cp, precision, &fe, sign)?;
    info!(degree, p, a, weight, %sign, "Frobenius characteristic polynomial reconstructed");
    Ok(Reconstruction { coefficients, sign })
}
