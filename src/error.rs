//! Error types of the tile estimator

use thiserror::Error;

/// Result type alias for tile estimation
pub type Result<T> = std::result::Result<T, TileError>;

/// Errors raised while partitioning or estimating a tile
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TileError {
    /// a sub-matrix request that reads outside the source matrix
    #[error(
        "invalid partition of {what}: rows {row_start}..{row_end} cols {col_start}..{col_end} \
         outside a {matrix_rows}x{matrix_cols} matrix",
        row_end = .row_start + .rows,
        col_end = .col_start + .cols
    )]
    InvalidPartition {
        /// which matrix was sliced
        what: &'static str,
        row_start: usize,
        col_start: usize,
        rows: usize,
        cols: usize,
        matrix_rows: usize,
        matrix_cols: usize,
    },

    /// a geometry value that would make the estimate meaningless (zero PEs, zero banks...)
    #[error("invalid tile geometry: {0}")]
    InvalidGeometry(String),

    /// paired matrices disagree on their shared dimension
    #[error("shape mismatch: {what} is {got_rows}x{got_cols}, expected {expected_rows}x{expected_cols}")]
    ShapeMismatch {
        what: &'static str,
        got_rows: usize,
        got_cols: usize,
        expected_rows: usize,
        expected_cols: usize,
    },

    /// the digital regime needs the sequence lengths of the decoder layer
    #[error("digital workload requested without decoder sequence lengths")]
    MissingDecoderShape,
}
