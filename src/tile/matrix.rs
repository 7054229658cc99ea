//! Dense matrices and the partitioning of a weight matrix onto the PEs of a tile
//!
//! A weight matrix is `rows x cols` (one row per input line of the crossbar), the paired
//! activation matrix is `rows x num_vectors` (one column per input vector).

use std::fmt::Debug;

use itertools::iproduct;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TileError};
use crate::tools::math::ceil_div;

/// a dense row-major matrix of conductances or activations
#[derive(Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// the `0 x 0` matrix, stands for "no previous weights"
    pub const fn empty() -> Self {
        Self {
            rows: 0,
            cols: 0,
            data: Vec::new(),
        }
    }

    pub fn from_elem(rows: usize, cols: usize, value: f64) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::from_elem(rows, cols, 0.0)
    }

    /// the all-ones activation used as a stand-in for "every row activated"
    pub fn ones(rows: usize, cols: usize) -> Self {
        Self::from_elem(rows, cols, 1.0)
    }

    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let data = iproduct!(0..rows, 0..cols).map(|(r, c)| f(r, c)).collect();
        Self { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.data.iter()
    }

    fn check_region(
        &self,
        what: &'static str,
        row_start: usize,
        col_start: usize,
        rows: usize,
        cols: usize,
    ) -> Result<()> {
        if row_start + rows > self.rows || col_start + cols > self.cols {
            return Err(TileError::InvalidPartition {
                what,
                row_start,
                col_start,
                rows,
                cols,
                matrix_rows: self.rows,
                matrix_cols: self.cols,
            });
        }
        Ok(())
    }

    /// copy the rectangular region `[row_start, row_start+rows) x [col_start, col_start+cols)`
    pub fn slice(&self, row_start: usize, col_start: usize, rows: usize, cols: usize) -> Result<Self> {
        self.check_region("weight matrix", row_start, col_start, rows, cols)?;
        let mut data = Vec::with_capacity(rows * cols);
        for r in row_start..row_start + rows {
            data.extend_from_slice(&self.row(r)[col_start..col_start + cols]);
        }
        Ok(Self { rows, cols, data })
    }

    /// copy `rows` activation rows starting at `row_start`, keeping the first `num_vectors`
    /// input-vector columns
    pub fn slice_input(&self, row_start: usize, num_vectors: usize, rows: usize) -> Result<Self> {
        self.check_region("activation matrix", row_start, 0, rows, num_vectors)?;
        let mut data = Vec::with_capacity(rows * num_vectors);
        for r in row_start..row_start + rows {
            data.extend_from_slice(&self.row(r)[..num_vectors]);
        }
        Ok(Self {
            rows,
            cols: num_vectors,
            data,
        })
    }
}

impl Debug for Matrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Matrix({}x{})", self.rows, self.cols)
    }
}

/// one rectangular block of the weight matrix assigned to one PE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    /// index of the row-group
    pub row_block: usize,
    /// index of the column-group
    pub col_block: usize,
    pub row_start: usize,
    pub col_start: usize,
    pub rows: usize,
    pub cols: usize,
}

impl Partition {
    pub fn size(&self) -> usize {
        self.rows * self.cols
    }

    /// cut this block out of the new/old weights and the activations
    pub fn extract(&self, workload: &super::Workload<'_>) -> Result<PartitionData> {
        Ok(PartitionData {
            new_weights: workload
                .new_weights
                .slice(self.row_start, self.col_start, self.rows, self.cols)?,
            old_weights: workload
                .old_weights
                .slice(self.row_start, self.col_start, self.rows, self.cols)?,
            input: workload
                .input
                .slice_input(self.row_start, workload.num_vectors(), self.rows)?,
        })
    }
}

/// the matrices handed to one PE
#[derive(Debug, Clone)]
pub struct PartitionData {
    pub new_weights: Matrix,
    pub old_weights: Matrix,
    pub input: Matrix,
}

/// the `ceil(rows/pe_size) x ceil(cols/pe_size)` grid used by conventional mapping,
/// the last row/column block is clamped to what remains
pub fn grid_partitions(rows: usize, cols: usize, pe_size: usize) -> Vec<Partition> {
    let row_blocks = ceil_div(rows, pe_size);
    let col_blocks = ceil_div(cols, pe_size);
    iproduct!(0..row_blocks, 0..col_blocks)
        .map(|(i, j)| Partition {
            row_block: i,
            col_block: j,
            row_start: i * pe_size,
            col_start: j * pe_size,
            rows: pe_size.min(rows - i * pe_size),
            cols: pe_size.min(cols - j * pe_size),
        })
        .collect()
}

/// the row bands used by novel mapping: at most `num_pe` bands of full width,
/// band `i` starts at `i * min(pe_size, band_height)`
pub fn row_bands(rows: usize, cols: usize, num_pe: usize, pe_size: usize) -> Vec<Partition> {
    let band_height = pe_size.min(ceil_div(rows, num_pe));
    (0..num_pe)
        .map(|i| (i, i * band_height))
        .take_while(|&(_, start)| start < rows)
        .map(|(i, start)| Partition {
            row_block: i,
            col_block: 0,
            row_start: start,
            col_start: 0,
            rows: band_height.min(rows - start),
            cols,
        })
        .collect()
}
