//! Run the tile on the configured workload and collect the results into reports.
//!
//! Every configuration point gets its own [`Tile`] built from the analytic collaborators, so a
//! sweep estimates its points on independent workers.

use std::collections::BTreeMap;

use eyre::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::info;

use crate::{
    circuit::analytic::AnalyticCircuits,
    pe::analytic::AnalyticPe,
    tile::{
        area::TileArea,
        config::Config,
        digital::{stand_in_weights, RandomSource, SeededBits},
        fabric::FabricSizing,
        mapping::MappingRegime,
        matrix::Matrix,
        result::TileResult,
        DecoderShape, Tile, Workload,
    },
};

/// the matrices of the layer estimated by `run` and `sweep`
#[derive(Debug, Clone)]
pub struct SyntheticLayer {
    pub new_weights: Matrix,
    pub old_weights: Matrix,
    /// one bit per row and input vector
    pub input: Matrix,
}

impl SyntheticLayer {
    pub fn new(config: &Config, rng: &mut dyn RandomSource) -> Self {
        let workload = &config.workload;
        let (rows, cols) = (workload.weight_rows, workload.weight_cols);
        let old_weights = stand_in_weights(rows, cols, &config.param, rng);
        let new_weights = stand_in_weights(rows, cols, &config.param, rng);
        let input = Matrix::from_fn(rows, workload.num_vectors, |_, _| {
            if rng.next_bit() {
                1.0
            } else {
                0.0
            }
        });
        Self {
            new_weights,
            old_weights,
            input,
        }
    }

    pub fn workload(&self, layer_number: usize) -> Workload<'_> {
        Workload::new(&self.new_weights, &self.old_weights, &self.input, layer_number)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TileReport {
    pub config_name: String,
    pub regime: MappingRegime,
    /// area of the fabric the regime runs on
    pub area: TileArea,
    /// `None` for area-only runs
    pub performance: Option<TileResult>,
    pub fabrics: Vec<FabricSizing>,
}

impl TileReport {
    pub fn show_results(&self) {
        println!("config: {}", self.config_name);
        println!("regime: {}", self.regime);
        self.area.show_results();
        for fabric in &self.fabrics {
            println!(
                "{:?} fabric: {} PEs of {}, adder bits: {}, input banks: {}, output banks: {}",
                fabric.kind,
                fabric.num_pe,
                fabric.pe_size,
                fabric.adder_bits,
                fabric.num_in_buffer_core,
                fabric.num_out_buffer_core
            );
        }
        if let Some(perf) = &self.performance {
            println!("read latency: {:e} s", perf.read_latency);
            println!("read dynamic energy: {:e} J", perf.read_dynamic_energy);
            println!("ag latency: {:e} s", perf.read_latency_ag);
            println!("ag dynamic energy: {:e} J", perf.read_dynamic_energy_ag);
            println!("wu latency: {:e} s", perf.write_latency_wu);
            println!("wu dynamic energy: {:e} J", perf.write_dynamic_energy_wu);
            println!("buffer latency: {:e} s", perf.buffer_latency);
            println!("interconnect latency: {:e} s", perf.ic_latency);
            println!("leakage: {:e} W", perf.leakage);
            println!("total latency: {:e} s", perf.total_latency());
            println!("total energy: {:e} J", perf.total_energy());
        }
    }
}

/// mean, population std and max of each reported quantity over the sweep points
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SweepReport {
    pub points: Vec<TileReport>,
    pub summary: BTreeMap<String, (f64, f64, f64)>,
    /// the points taken as the layers of one network
    pub total: TileResult,
}

/// # Example
/// ```
/// use neuro_tile::report::mean_std_max;
/// assert_eq!(mean_std_max([1.0, 3.0]), (2.0, 1.0, 3.0));
/// ```
pub fn mean_std_max(data: impl IntoIterator<Item = f64> + Clone) -> (f64, f64, f64) {
    let mean = data.clone().into_iter().mean();
    let std = data.clone().into_iter().population_std_dev();
    let max = data.into_iter().fold(f64::NEG_INFINITY, f64::max);
    (mean, std, max)
}

impl SweepReport {
    pub fn new(points: Vec<TileReport>) -> Self {
        let mut summary = BTreeMap::new();
        if !points.is_empty() {
            summary.insert(
                "area".to_string(),
                mean_std_max(points.iter().map(|p| p.area.total)),
            );
            let perf = points.iter().filter_map(|p| p.performance).collect::<Vec<_>>();
            if !perf.is_empty() {
                summary.insert(
                    "read_latency".to_string(),
                    mean_std_max(perf.iter().map(|p| p.read_latency)),
                );
                summary.insert(
                    "read_dynamic_energy".to_string(),
                    mean_std_max(perf.iter().map(|p| p.read_dynamic_energy)),
                );
                summary.insert(
                    "total_latency".to_string(),
                    mean_std_max(perf.iter().map(|p| p.total_latency())),
                );
                summary.insert(
                    "leakage".to_string(),
                    mean_std_max(perf.iter().map(|p| p.leakage)),
                );
            }
        }
        let total = points
            .iter()
            .filter_map(|p| p.performance)
            .fold(TileResult::default(), |acc, p| acc + p);
        Self {
            points,
            summary,
            total,
        }
    }

    pub fn show_results(&self) {
        println!("points: {}", self.points.len());
        for (name, (mean, std, max)) in &self.summary {
            println!("{name}: mean {mean:e}, std {std:e}, max {max:e}");
        }
        println!("total energy: {:e} J", self.total.total_energy());
        println!("total latency: {:e} s", self.total.total_latency());
    }
}

/// a tile built from the analytic PE and circuit models of the config
pub fn build_tile(config: &Config) -> Result<Tile<AnalyticPe>> {
    let circuits = AnalyticCircuits::new(config.technology.clone(), config.param.clk_freq);
    let pe = AnalyticPe::new(config.technology.clone(), config.param.clone());
    Tile::new(config, pe, &circuits).wrap_err("failed to build the tile")
}

fn area_of(tile: &mut Tile<AnalyticPe>) -> Result<TileArea> {
    let kind = tile.active_fabric();
    tile.calculate_area(kind)
        .wrap_err_with(|| format!("failed to compute the {kind:?} fabric area"))
}

/// area only, no workload is synthesized
pub fn run_area(config: &Config, config_name: &str) -> Result<TileReport> {
    let mut tile = build_tile(config)?;
    let area = area_of(&mut tile)?;
    Ok(TileReport {
        config_name: config_name.to_string(),
        regime: tile.regime(),
        area,
        performance: None,
        fabrics: tile.sizing(),
    })
}

/// area and performance of the configured workload
pub fn run(config: &Config, config_name: &str) -> Result<TileReport> {
    let mut tile = build_tile(config)?;
    let regime = tile.regime();
    info!(config_name, %regime, "estimating tile");
    let area = area_of(&mut tile)?;

    let workload = &config.workload;
    let performance = if regime.is_digital() {
        let decoder = DecoderShape {
            seq_len: workload.seq_len,
            seq_len_total: workload.seq_len_total,
        };
        tile.calculate_performance(&Workload::decoder(decoder, workload.layer_number))
    } else {
        let layer = SyntheticLayer::new(config, &mut SeededBits::new(workload.seed));
        tile.calculate_performance(&layer.workload(workload.layer_number))
    }
    .wrap_err_with(|| format!("failed to estimate {config_name}"))?;

    Ok(TileReport {
        config_name: config_name.to_string(),
        regime,
        area,
        performance: Some(performance),
        fabrics: tile.sizing(),
    })
}

/// estimate every point on its own worker, the report keeps the input order
pub fn sweep(configs: &[(String, Config)]) -> Result<SweepReport> {
    let points = configs
        .par_iter()
        .map(|(name, config)| run(config, name))
        .collect::<Result<Vec<_>>>()?;
    Ok(SweepReport::new(points))
}
