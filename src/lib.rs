pub mod dirichlet;
pub mod frobenius;
pub mod matrix;
pub mod problem;
pub mod qadic;

pub use frobenius::{charpoly_frobenius, CharpolyError, Reconstruction, Sign};
pub use matrix::{IntMatrix, MatrixError, QAdicMatrix};
pub use qadic::{QAdic, QAdicError, UnramifiedRing};

use rug::Integer;

/// Render integer coefficients as `[c0, c1, ...]`.
pub fn format_coefficients(coeffs: &[Integer]) -> String {
    let parts: Vec<String> = coeffs.iter().map(Integer::to_string).collect();
    format!("[{}]", parts.join(", "))
}

/// Parse a comma-separated integer list such as `"1,-2,17"`.
pub fn parse_integer_list(text: &str) -> anyhow::Result<Vec<Integer>> {
    text.split(',')
        .map(|part| {
            let part = part.trim();
            part.parse::<Integer>()
                .map_err(|e| anyhow::anyhow!("bad integer '{}': {}", part, e))
        })
        .collect()
}
