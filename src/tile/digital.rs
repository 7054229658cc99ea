//! The tile standing for one transformer decoder layer on digital PEs.
//!
//! The layer is replayed as six linear-algebra stages run one after another. The weights of each
//! stage are unknown at estimation time, a random 0/1 pattern over the conductance bounds stands
//! in for them and an all-ones activation marks every row as read.

use std::fmt::Debug;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    config::{Param, TransformerShape},
    fabric::Fabric,
    matrix::Matrix,
    result::TileResult,
};
use crate::{
    error::{Result, TileError},
    pe::{PeEstimator, PeRequest},
};

/// the source of the stand-in weight patterns
pub trait RandomSource: Debug {
    fn next_bit(&mut self) -> bool;
}

/// uniform bits from a seeded ChaCha stream, identical seeds give identical runs
#[derive(Debug, Clone)]
pub struct SeededBits(ChaCha8Rng);

impl SeededBits {
    pub fn new(seed: u64) -> Self {
        Self(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl RandomSource for SeededBits {
    fn next_bit(&mut self) -> bool {
        self.0.gen_bool(0.5)
    }
}

/// sequence lengths of the decoder step being estimated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderShape {
    /// tokens processed by this step
    pub seq_len: usize,
    /// tokens held in the key/value cache
    pub seq_len_total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderStage {
    /// Wv, standing for Wq and Wk as well
    ValueProjection,
    KeyCache,
    ValueCache,
    OutputProjection,
    FeedForward1,
    FeedForward2,
}

impl DecoderStage {
    pub const ALL: [DecoderStage; 6] = [
        DecoderStage::ValueProjection,
        DecoderStage::KeyCache,
        DecoderStage::ValueCache,
        DecoderStage::OutputProjection,
        DecoderStage::FeedForward1,
        DecoderStage::FeedForward2,
    ];

    /// `(rows, cols)` of the stage matrix, stored transposed with `synapse_bit` columns per weight
    pub fn shape(&self, t: &TransformerShape, decoder: &DecoderShape) -> (usize, usize) {
        let bits = t.synapse_bit;
        match self {
            DecoderStage::ValueProjection => (t.d_v * t.n_heads, t.d_model * bits),
            DecoderStage::KeyCache => (decoder.seq_len_total, t.d_k * t.n_heads * bits),
            DecoderStage::ValueCache => (t.d_v * t.n_heads, decoder.seq_len_total * bits),
            DecoderStage::OutputProjection => (t.d_model, t.d_v * t.n_heads * bits),
            DecoderStage::FeedForward1 => (t.d_hidden, t.d_model * bits),
            DecoderStage::FeedForward2 => (t.d_model, t.d_hidden * bits),
        }
    }

    /// identical matrices folded into one estimate: the three projections share one shape
    pub fn copies(&self) -> f64 {
        match self {
            DecoderStage::ValueProjection => 3.0,
            _ => 1.0,
        }
    }
}

/// each cell is the max or min conductance with equal probability
pub fn stand_in_weights(
    rows: usize,
    cols: usize,
    param: &Param,
    rng: &mut dyn RandomSource,
) -> Matrix {
    Matrix::from_fn(rows, cols, |_, _| {
        if rng.next_bit() {
            param.max_conductance
        } else {
            param.min_conductance
        }
    })
}

/// the six stages serialized, then the token traffic through the tile buffers
pub fn estimate_decoder(
    estimator: &mut impl PeEstimator,
    fabric: &mut Fabric,
    param: &Param,
    transformer: &TransformerShape,
    decoder: &DecoderShape,
    layer_number: usize,
    rng: &mut dyn RandomSource,
) -> Result<TileResult> {
    if decoder.seq_len == 0 {
        return Err(TileError::InvalidGeometry(
            "decoder seq_len must be at least 1".to_string(),
        ));
    }
    let (num_subarray_row, num_subarray_col) = fabric.pe_subarrays(param);
    let no_old_weights = Matrix::empty();
    let mut tile = TileResult::default();

    for stage in DecoderStage::ALL {
        let (rows, cols) = stage.shape(transformer, decoder);
        let weights = stand_in_weights(rows, cols, param, rng);
        let input = Matrix::ones(rows, decoder.seq_len);
        let pe = estimator.estimate(&PeRequest {
            new_weights: &weights,
            old_weights: &no_old_weights,
            input: &input,
            novel_mapping: false,
            digital: true,
            row_duplication: 1,
            col_duplication: 1,
            num_subarray_row,
            num_subarray_col,
            layer_number,
        });
        debug!(
            ?stage,
            rows,
            cols,
            read_latency = pe.read_latency,
            read_energy = pe.read_dynamic_energy,
            "decoder stage"
        );
        tile.merge_serial(&pe, stage.copies());
    }

    // every token enters and leaves the layer once, whatever the stage shapes
    let token_bits = (decoder.seq_len * transformer.d_model * transformer.synapse_bit) as f64;
    let input = fabric.input_traffic(token_bits);
    let output = fabric.output_traffic(token_bits);
    let side = fabric.pe_layout_side(param);
    let pe_area = estimator.area(side, side);
    let interconnect = fabric.interconnect_traffic(pe_area.height, pe_area.width, 2.0 * token_bits);
    tile.add_transfer(&input, &output, &interconnect, 0.0);
    tile.leakage += fabric.leakage();
    Ok(tile)
}
