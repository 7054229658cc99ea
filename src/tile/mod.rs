//! # Description
//! - a tile: a grid of PEs sharing an accumulation tree, input/output buffers, an H-tree and an
//!   activation unit
//! - the tile is built once from a [`config::Config`], then answers any number of area and
//!   performance queries
//!
//! # Components
//! - [`matrix`]: dense matrices and their partitioning onto PEs
//! - [`mapping`]: the regime one estimation runs in
//! - [`fabric`]: the shared components and their sizing
//! - [`aggregate`]: conventional and novel mapping
//! - [`digital`]: the decoder-layer path
//! - [`area`]: the area breakdown
//! - [`result`]: per-PE and per-tile metrics and how they combine

use tracing::{info, info_span};

use crate::{
    circuit::CircuitFactory,
    error::{Result, TileError},
    pe::PeEstimator,
};

pub mod aggregate;
pub mod area;
pub mod config;
pub mod digital;
pub mod fabric;
pub mod mapping;
pub mod matrix;
pub mod result;

use aggregate::Aggregator;
use area::TileArea;
use config::{Config, MappingMode, Param, TileGeometry, TransformerShape};
pub use digital::DecoderShape;
use digital::{RandomSource, SeededBits};
use fabric::{Fabric, FabricKind, FabricSizing};
use mapping::MappingRegime;
use matrix::Matrix;
use result::TileResult;

static NO_MATRIX: Matrix = Matrix::empty();

fn missing_novel() -> TileError {
    TileError::InvalidGeometry("the tile has no novel-mapping fabric".to_string())
}

/// the matrices of one layer handed to the tile
#[derive(Debug, Clone, Copy)]
pub struct Workload<'a> {
    pub new_weights: &'a Matrix,
    /// weights before the update, same shape as `new_weights`
    pub old_weights: &'a Matrix,
    /// `rows x num_vectors`
    pub input: &'a Matrix,
    pub layer_number: usize,
    /// only read by digital tiles
    pub decoder: Option<DecoderShape>,
}

impl<'a> Workload<'a> {
    pub fn new(
        new_weights: &'a Matrix,
        old_weights: &'a Matrix,
        input: &'a Matrix,
        layer_number: usize,
    ) -> Self {
        Self {
            new_weights,
            old_weights,
            input,
            layer_number,
            decoder: None,
        }
    }

    pub fn num_vectors(&self) -> usize {
        self.input.cols()
    }

    fn validate(&self) -> Result<()> {
        let (rows, cols) = self.new_weights.shape();
        if self.old_weights.shape() != (rows, cols) {
            return Err(TileError::ShapeMismatch {
                what: "old weights",
                got_rows: self.old_weights.rows(),
                got_cols: self.old_weights.cols(),
                expected_rows: rows,
                expected_cols: cols,
            });
        }
        if self.input.rows() != rows {
            return Err(TileError::ShapeMismatch {
                what: "input activations",
                got_rows: self.input.rows(),
                got_cols: self.input.cols(),
                expected_rows: rows,
                expected_cols: self.input.cols(),
            });
        }
        Ok(())
    }
}

impl Workload<'static> {
    /// a decoder step, the weights are synthesized by the tile
    pub fn decoder(decoder: DecoderShape, layer_number: usize) -> Self {
        Self {
            new_weights: &NO_MATRIX,
            old_weights: &NO_MATRIX,
            input: &NO_MATRIX,
            layer_number,
            decoder: Some(decoder),
        }
    }
}

#[derive(Debug)]
pub struct Tile<E> {
    geometry: TileGeometry,
    param: Param,
    transformer: TransformerShape,
    estimator: E,
    conventional: Fabric,
    novel: Option<Fabric>,
    rng: Box<dyn RandomSource>,
}

impl<E: PeEstimator> Tile<E> {
    /// size both fabrics, the buffer bank counts are fixed from here on
    pub fn new(config: &Config, estimator: E, circuits: &impl CircuitFactory) -> Result<Self> {
        let geometry = &config.geometry;
        if geometry.speed_up_row == 0 || geometry.speed_up_col == 0 {
            return Err(TileError::InvalidGeometry(
                "speed-up factors must be at least 1".to_string(),
            ));
        }
        let param = &config.param;
        let conventional = Fabric::new(
            FabricKind::Conventional,
            geometry.num_pe,
            geometry.pe_size,
            param,
            circuits,
        )?;
        let novel = if param.novel_mapping || geometry.mapping == MappingMode::Novel {
            Some(Fabric::new(
                FabricKind::Novel,
                geometry.novel_num_pe(),
                geometry.novel_pe_size(),
                param,
                circuits,
            )?)
        } else {
            None
        };
        info!(
            num_pe = geometry.num_pe,
            pe_size = geometry.pe_size,
            novel = novel.is_some(),
            "tile initialized"
        );
        Ok(Self {
            geometry: geometry.clone(),
            param: param.clone(),
            transformer: config.transformer.clone(),
            estimator,
            conventional,
            novel,
            rng: Box::new(SeededBits::new(config.workload.seed)),
        })
    }

    /// replace the source of the stand-in decoder weights
    pub fn with_random_source(mut self, rng: impl RandomSource + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    pub fn regime(&self) -> MappingRegime {
        MappingRegime::select(&self.geometry)
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    pub fn fabric(&self, kind: FabricKind) -> Option<&Fabric> {
        match kind {
            FabricKind::Conventional => Some(&self.conventional),
            FabricKind::Novel => self.novel.as_ref(),
        }
    }

    fn fabric_mut(&mut self, kind: FabricKind) -> Result<&mut Fabric> {
        match kind {
            FabricKind::Conventional => Ok(&mut self.conventional),
            FabricKind::Novel => self.novel.as_mut().ok_or_else(missing_novel),
        }
    }

    /// the fabric the current regime runs on
    pub fn active_fabric(&self) -> FabricKind {
        if self.regime().is_novel() {
            FabricKind::Novel
        } else {
            FabricKind::Conventional
        }
    }

    pub fn sizing(&self) -> Vec<FabricSizing> {
        std::iter::once(&self.conventional)
            .chain(self.novel.as_ref())
            .map(|fabric| fabric.sizing)
            .collect()
    }

    pub fn calculate_area(&mut self, kind: FabricKind) -> Result<TileArea> {
        let side = self
            .fabric(kind)
            .ok_or_else(missing_novel)?
            .pe_layout_side(&self.param);
        let pe_area = self.estimator.area(side, side);
        Ok(area::compose(self.fabric_mut(kind)?, &pe_area))
    }

    pub fn calculate_performance(&mut self, workload: &Workload<'_>) -> Result<TileResult> {
        let regime = self.regime();
        let _span = info_span!("tile", %regime).entered();
        let result = match regime {
            MappingRegime::Digital => {
                let decoder = workload.decoder.ok_or(TileError::MissingDecoderShape)?;
                digital::estimate_decoder(
                    &mut self.estimator,
                    &mut self.conventional,
                    &self.param,
                    &self.transformer,
                    &decoder,
                    workload.layer_number,
                    self.rng.as_mut(),
                )?
            }
            _ => {
                workload.validate()?;
                let fabric = match self.active_fabric() {
                    FabricKind::Conventional => &mut self.conventional,
                    FabricKind::Novel => self.novel.as_mut().ok_or_else(missing_novel)?,
                };
                Aggregator {
                    estimator: &mut self.estimator,
                    fabric,
                    param: &self.param,
                    geometry: &self.geometry,
                }
                .run(regime, workload)?
            }
        };
        info!(
            read_latency = result.read_latency,
            read_energy = result.read_dynamic_energy,
            leakage = result.leakage,
            "tile estimated"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        circuit::analytic::AnalyticCircuits,
        pe::analytic::AnalyticPe,
        test_helpers::{AlternatingBits, FixedCircuits, FixedPe},
    };

    fn config(geometry: TileGeometry) -> Config {
        Config {
            geometry,
            ..Default::default()
        }
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let mut tile = Tile::new(
            &config(TileGeometry::default()),
            FixedPe::new(1.0, 1.0),
            &FixedCircuits::default(),
        )
        .unwrap();
        let new = Matrix::zeros(8, 8);
        let old = Matrix::zeros(8, 4);
        let input = Matrix::ones(8, 2);
        let err = tile
            .calculate_performance(&Workload::new(&new, &old, &input, 0))
            .unwrap_err();
        assert!(matches!(err, TileError::ShapeMismatch { what: "old weights", .. }));

        let input = Matrix::ones(4, 2);
        let err = tile
            .calculate_performance(&Workload::new(&new, &new, &input, 0))
            .unwrap_err();
        assert!(matches!(err, TileError::ShapeMismatch { what: "input activations", .. }));
    }

    #[test]
    fn digital_tile_needs_the_decoder_shape() {
        let geometry = TileGeometry {
            digital: true,
            ..Default::default()
        };
        let mut tile = Tile::new(&config(geometry), FixedPe::new(1.0, 1.0), &FixedCircuits::default())
            .unwrap()
            .with_random_source(AlternatingBits::default());
        let new = Matrix::zeros(2, 2);
        let input = Matrix::ones(2, 1);
        let err = tile
            .calculate_performance(&Workload::new(&new, &new, &input, 0))
            .unwrap_err();
        assert_eq!(err, TileError::MissingDecoderShape);

        let mut small = Config::default();
        small.geometry.digital = true;
        small.transformer = TransformerShape {
            d_model: 4,
            d_k: 2,
            d_v: 2,
            n_heads: 1,
            d_hidden: 8,
            synapse_bit: 1,
        };
        let mut tile = Tile::new(&small, FixedPe::new(1.0, 1.0), &FixedCircuits::default()).unwrap();
        let result = tile
            .calculate_performance(&Workload::decoder(
                DecoderShape {
                    seq_len: 2,
                    seq_len_total: 4,
                },
                1,
            ))
            .unwrap();
        assert_eq!(result.read_latency, 6.0);
        assert_eq!(result.read_dynamic_energy, 8.0);
        assert_eq!(tile.estimator().requests.len(), 6);
    }

    #[test]
    fn novel_fabric_is_optional() {
        let mut tile = Tile::new(
            &config(TileGeometry::default()),
            FixedPe::new(1.0, 1.0),
            &FixedCircuits::default(),
        )
        .unwrap();
        assert!(tile.fabric(FabricKind::Novel).is_none());
        assert!(tile.calculate_area(FabricKind::Novel).is_err());
        assert_eq!(tile.sizing().len(), 1);

        let geometry = TileGeometry {
            mapping: MappingMode::Novel,
            novel_num_pe: Some(9),
            ..Default::default()
        };
        let tile = Tile::new(&config(geometry), FixedPe::new(1.0, 1.0), &FixedCircuits::default())
            .unwrap();
        assert_eq!(tile.active_fabric(), FabricKind::Novel);
        assert_eq!(tile.sizing()[1].num_pe, 9);
    }

    #[test]
    fn zero_speed_up_is_rejected() {
        let geometry = TileGeometry {
            speed_up_row: 0,
            ..Default::default()
        };
        let err = Tile::new(&config(geometry), FixedPe::new(1.0, 1.0), &FixedCircuits::default())
            .unwrap_err();
        assert!(matches!(err, TileError::InvalidGeometry(_)));
    }

    #[test]
    fn analytic_tile_end_to_end() {
        let config = Config::default();
        let circuits = AnalyticCircuits::new(config.technology.clone(), config.param.clk_freq);
        let pe = AnalyticPe::new(config.technology.clone(), config.param.clone());
        let mut tile = Tile::new(&config, pe, &circuits).unwrap();

        let area = tile.calculate_area(FabricKind::Conventional).unwrap();
        let parts = area.interconnect + area.adc + area.accumulation + area.other + area.array;
        assert!((area.total - parts).abs() <= 1e-9 * area.total);

        let new = Matrix::from_elem(300, 200, config.param.max_conductance);
        let old = Matrix::from_elem(300, 200, config.param.min_conductance);
        let input = Matrix::ones(300, 32);
        let result = tile
            .calculate_performance(&Workload::new(&new, &old, &input, 1))
            .unwrap();
        assert!(result.read_latency > 0.0);
        assert!(result.read_dynamic_energy > 0.0);
        assert!(result.leakage > 0.0);
        // inference only
        assert_eq!(result.read_dynamic_energy_ag, 0.0);
    }
}
