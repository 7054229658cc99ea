//! # Description
//! - the per-PE estimator: one processing element holding a sub-matrix of the weights
//! - the tile treats it as a black box, it only hands in matrices and reads the result back
//!
//! # Components
//! - [`PeEstimator`]: the estimator seam, implemented by [`analytic::AnalyticPe`]
//! - [`PeRequest`]: everything one estimation needs
//! - [`PeArea`]: the footprint and area breakdown of one PE

use serde::{Deserialize, Serialize};

use crate::tile::{matrix::Matrix, result::PeResult};

pub mod analytic;

/// one PE estimation: a weight sub-matrix, its previous value and the activations driving it
#[derive(Debug, Clone, Copy)]
pub struct PeRequest<'a> {
    pub new_weights: &'a Matrix,
    pub old_weights: &'a Matrix,
    /// `rows x num_vectors`
    pub input: &'a Matrix,
    pub novel_mapping: bool,
    pub digital: bool,
    /// duplication the PE applies internally across its subarrays
    pub row_duplication: usize,
    pub col_duplication: usize,
    /// subarrays along each side of the PE
    pub num_subarray_row: usize,
    pub num_subarray_col: usize,
    pub layer_number: usize,
}

impl PeRequest<'_> {
    pub fn rows(&self) -> usize {
        self.new_weights.rows()
    }

    pub fn cols(&self) -> usize {
        self.new_weights.cols()
    }

    pub fn num_vectors(&self) -> usize {
        self.input.cols()
    }
}

/// area (m²) and footprint (m) of one PE
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct PeArea {
    pub height: f64,
    pub width: f64,
    /// the PE-local buffer, already part of `other`
    pub buffer: f64,
    pub adc: f64,
    pub accumulation: f64,
    pub other: f64,
    pub array: f64,
}

impl PeArea {
    pub fn total(&self) -> f64 {
        self.adc + self.accumulation + self.other + self.array
    }
}

pub trait PeEstimator {
    /// latency/energy of one sub-matrix on one PE
    fn estimate(&mut self, request: &PeRequest<'_>) -> PeResult;
    /// area of a PE made of `num_subarray_row x num_subarray_col` subarrays
    fn area(&mut self, num_subarray_row: usize, num_subarray_col: usize) -> PeArea;
}

impl<T: PeEstimator + ?Sized> PeEstimator for &mut T {
    fn estimate(&mut self, request: &PeRequest<'_>) -> PeResult {
        (**self).estimate(request)
    }

    fn area(&mut self, num_subarray_row: usize, num_subarray_col: usize) -> PeArea {
        (**self).area(num_subarray_row, num_subarray_col)
    }
}
