//! Errors reported by the relation engine.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RelError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RelError {
    /// A coordinate lies outside the declared dimensions.
    #[error("bit ({row}, {col}) is out of range for a {rows}x{cols} relation")]
    OutOfRange { row: u64, col: u64, rows: u64, cols: u64 },

    /// Operand relations are incompatible for the requested operation.
    #[error("dimension mismatch in {op}: {left_rows}x{left_cols} vs {right_rows}x{right_cols}")]
    DimensionMismatch {
        op: &'static str,
        left_rows: u64,
        left_cols: u64,
        right_rows: u64,
        right_cols: u64,
    },

    /// Operands belong to different contexts.
    #[error("relations belong to different contexts")]
    CrossContext,

    /// The node store is exhausted. The context can not be used any more.
    #[error("node store is full ({capacity} nodes)")]
    OutOfMemory { capacity: usize },

    /// A relation must either be `0x0` or have both dimensions positive.
    #[error("invalid dimension {rows}x{cols}")]
    InvalidDimension { rows: u64, cols: u64 },

    /// Random density outside of `(0, 1]`.
    #[error("invalid probability {0}, expected a value in (0, 1]")]
    InvalidProbability(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let e = RelError::OutOfRange {
            row: 3,
            col: 5,
            rows: 4,
            cols: 4,
        };
        assert_eq!(e.to_string(), "bit (3, 5) is out of range for a 4x4 relation");

        let e = RelError::DimensionMismatch {
            op: "meet",
            left_rows: 2,
            left_cols: 3,
            right_rows: 3,
            right_cols: 2,
        };
        assert_eq!(e.to_string(), "dimension mismatch in meet: 2x3 vs 3x2");

        assert_eq!(
            RelError::OutOfMemory { capacity: 4 }.to_string(),
            "node store is full (4 nodes)"
        );
    }
}
