//! # Matrix — Square Matrices over Z and over Truncated p-adic Rings
//!
//! Two matrix types back the reconstruction pipeline:
//!
//! - [`QAdicMatrix`]: the approximate Frobenius matrix as supplied by the
//!   caller, entries in an [`UnramifiedRing`]. Supports products, the
//!   entrywise Frobenius twist, and coercion to integers.
//! - [`IntMatrix`]: exact integer matrices. Computes characteristic
//!   polynomials and builds companion matrices.
//!
//! ## Algorithm: Faddeev–LeVerrier
//!
//! For an n×n integer matrix A, set M₀ = 0, c_n = 1 and for k = 1..n:
//!
//!   M_k = A·M_{k−1} + c_{n−k+1}·I,   c_{n−k} = −tr(A·M_k) / k.
//!
//! Every division is exact over Z, so the whole computation stays in
//! arbitrary-precision integers. The result is det(xI − A), constant term
//! first, and is monic by construction.

use rug::Integer;

use crate::qadic::{QAdic, QAdicError, UnramifiedRing};

/// Errors from building or combining matrices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatrixError {
    /// A matrix needs at least one row.
    Empty,
    /// Row `row` has `len` entries but the matrix has `dim` rows.
    NotSquare { row: usize, len: usize, dim: usize },
    /// Companion coefficients must start with 1.
    NotNormalized { leading: Integer },
    /// Operands of a product have different dimensions.
    DimensionMismatch { left: usize, right: usize },
    /// An entry is not a valid element of the matrix ring.
    Entry {
        row: usize,
        col: usize,
        source: QAdicError,
    },
}

impl std::fmt::Display for MatrixError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatrixError::Empty => write!(f, "matrix has no rows"),
            MatrixError::NotSquare { row, len, dim } => write!(
                f,
                "row {} has {} entries but the matrix has {} rows",
                row, len, dim
            ),
            MatrixError::NotNormalized { leading } => write!(
                f,
                "companion coefficients must start with 1 (got {})",
                leading
            ),
            MatrixError::DimensionMismatch { left, right } => {
                write!(f, "cannot multiply {0}x{0} by {1}x{1}", left, right)
            }
            MatrixError::Entry { row, col, source } => {
                write!(f, "entry ({}, {}): {}", row, col, source)
            }
        }
    }
}

impl std::error::Error for MatrixError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MatrixError::Entry { source, .. } => Some(source),
            _ => None,
        }
    }
}

fn check_square<I: IntoIterator<Item = usize>>(lens: I, dim: usize) -> Result<(), MatrixError> {
    if dim == 0 {
        return Err(MatrixError::Empty);
    }
    for (row, len) in lens.into_iter().enumerate() {
        if len != dim {
            return Err(MatrixError::NotSquare { row, len, dim });
        }
    }
    Ok(())
}

// ── Integer matrices ────────────────────────────────────────────

/// A non-empty square matrix of arbitrary-precision integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntMatrix {
    rows: Vec<Vec<Integer>>,
}

impl IntMatrix {
    pub fn new(rows: Vec<Vec<Integer>>) -> Result<Self, MatrixError> {
        check_square(rows.iter().map(Vec::len), rows.len())?;
        Ok(IntMatrix { rows })
    }

    pub fn from_i64(rows: &[Vec<i64>]) -> Result<Self, MatrixError> {
        Self::new(
            rows.iter()
                .map(|row| row.iter().map(|&v| Integer::from(v)).collect())
                .collect(),
        )
    }

    pub fn identity(dim: usize) -> Result<Self, MatrixError> {
        Self::new(
            (0..dim)
                .map(|i| {
                    (0..dim)
                        .map(|j| Integer::from(u32::from(i == j)))
                        .collect()
                })
                .collect(),
        )
    }

    /// Companion matrix A of `coeffs = [1, c1, …, cn]`, satisfying
    /// det(1 − tA) = 1 + c1·t + … + cn·t^n.
    ///
    /// Layout: a zero first row above the identity in the first n−1 columns,
    /// last column −(cn, …, c1).
    pub fn companion(coeffs: &[Integer]) -> Result<Self, MatrixError> {
        let (leading, tail) = coeffs.split_first().ok_or(MatrixError::Empty)?;
        if *leading != 1 {
            return Err(MatrixError::NotNormalized {
                leading: leading.clone(),
            });
        }
        let n = tail.len();
        if n == 0 {
            return Err(MatrixError::Empty);
        }
        let rows = (0..n)
            .map(|i| {
                let mut row: Vec<Integer> = (0..n - 1)
                    .map(|j| Integer::from(u32::from(i == j + 1)))
                    .collect();
                row.push(Integer::from(-&tail[n - 1 - i]));
                row
            })
            .collect();
        Ok(IntMatrix { rows })
    }

    pub fn dim(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Vec<Integer>] {
        &self.rows
    }

    pub fn trace(&self) -> Integer {
        self.rows
            .iter()
            .enumerate()
            .fold(Integer::new(), |acc, (i, row)| acc + &row[i])
    }

    pub fn mul(&self, other: &IntMatrix) -> Result<IntMatrix, MatrixError> {
        if self.dim() != other.dim() {
            return Err(MatrixError::DimensionMismatch {
                left: self.dim(),
                right: other.dim(),
            });
        }
        Ok(self.mul_unchecked(other))
    }

    fn mul_unchecked(&self, other: &IntMatrix) -> IntMatrix {
        let n = self.dim();
        let rows = (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| {
                        let mut acc = Integer::new();
                        for k in 0..n {
                            acc += Integer::from(&self.rows[i][k] * &other.rows[k][j]);
                        }
                        acc
                    })
                    .collect()
            })
            .collect();
        IntMatrix { rows }
    }

    /// Coefficients of det(xI − A), constant term first (length dim + 1).
    pub fn charpoly(&self) -> Vec<Integer> {
        let n = self.dim();
        let mut coeffs = vec![Integer::new(); n + 1];
        coeffs[n] = Integer::from(1);

        // am = A·M_(k−1), with M_0 = 0
        let mut am = IntMatrix {
            rows: vec![vec![Integer::new(); n]; n],
        };
        for k in 1..=n {
            // M_k = A·M_(k−1) + c_(n−k+1)·I
            let mut m = am;
            for (i, row) in m.rows.iter_mut().enumerate() {
                row[i] += &coeffs[n - k + 1];
            }
            am = self.mul_unchecked(&m);
            coeffs[n - k] = -am.trace().div_exact(&Integer::from(k));
        }
        coeffs
    }
}

// ── Matrices over a truncated unramified ring ───────────────────

/// A non-empty square matrix with entries in an [`UnramifiedRing`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QAdicMatrix {
    ring: UnramifiedRing,
    rows: Vec<Vec<QAdic>>,
}

impl QAdicMatrix {
    pub fn new(ring: UnramifiedRing, rows: Vec<Vec<QAdic>>) -> Result<Self, MatrixError> {
        check_square(rows.iter().map(Vec::len), rows.len())?;
        for (i, row) in rows.iter().enumerate() {
            for (j, entry) in row.iter().enumerate() {
                ring.validate(entry).map_err(|source| MatrixError::Entry {
                    row: i,
                    col: j,
                    source,
                })?;
            }
        }
        Ok(QAdicMatrix { ring, rows })
    }

    /// Embed an integer matrix with every entry at the ring's cap precision.
    pub fn from_integer_matrix(ring: UnramifiedRing, m: &IntMatrix) -> Self {
        let rows = m
            .rows()
            .iter()
            .map(|row| row.iter().map(|v| ring.exact(v.clone())).collect())
            .collect();
        QAdicMatrix { ring, rows }
    }

    pub fn ring(&self) -> &UnramifiedRing {
        &self.ring
    }

    pub fn dim(&self) -> usize {
        self.rows.len()
    }

    pub fn get(&self, row: usize, col: usize) -> &QAdic {
        &self.rows[row][col]
    }

    pub fn mul(&self, other: &QAdicMatrix) -> Result<QAdicMatrix, MatrixError> {
        if self.dim() != other.dim() {
            return Err(MatrixError::DimensionMismatch {
                left: self.dim(),
                right: other.dim(),
            });
        }
        let ring = &self.ring;
        let n = self.dim();
        let rows = (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| {
                        let mut acc = ring.mul(&self.rows[i][0], &other.rows[0][j]);
                        for k in 1..n {
                            acc = ring.add(&acc, &ring.mul(&self.rows[i][k], &other.rows[k][j]));
                        }
                        acc
                    })
                    .collect()
            })
            .collect();
        Ok(QAdicMatrix {
            ring: ring.clone(),
            rows,
        })
    }

    /// Apply σ to every entry; returns a new matrix.
    pub fn frobenius_twist(&self) -> QAdicMatrix {
        let rows = self
            .rows
            .iter()
            .map(|row| row.iter().map(|x| self.ring.frobenius(x)).collect())
            .collect();
        QAdicMatrix {
            ring: self.ring.clone(),
            rows,
        }
    }

    /// Coerce every entry to its canonical integer residue.
    pub fn to_integer_matrix(&self) -> Result<IntMatrix, MatrixError> {
        let mut rows = Vec::with_capacity(self.dim());
        for (i, row) in self.rows.iter().enumerate() {
            let mut out = Vec::with_capacity(row.len());
            for (j, x) in row.iter().enumerate() {
                let value = self.ring.to_integer(x).map_err(|source| MatrixError::Entry {
                    row: i,
                    col: j,
                    source,
                })?;
                out.push(value);
            }
            rows.push(out);
        }
        Ok(IntMatrix { rows })
    }
}
