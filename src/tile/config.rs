use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::circuit::analytic::TechnologyParams;

/// how the weight matrix is laid onto the PEs
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MappingMode {
    #[default]
    Conventional,
    Novel,
}

/// shape of the PE grid and the duplication requested for it
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TileGeometry {
    /// PEs along one side of the square grid
    pub num_pe: usize,
    /// rows (= cols) one PE holds natively
    pub pe_size: usize,
    pub speed_up_row: usize,
    pub speed_up_col: usize,
    pub mapping: MappingMode,
    /// the tile runs one decoder layer on digital PEs
    pub digital: bool,
    /// PE count of the novel-mapping fabric, `num_pe` when unset
    pub novel_num_pe: Option<usize>,
    /// PE size of the novel-mapping fabric, `pe_size` when unset
    pub novel_pe_size: Option<usize>,
}

impl Default for TileGeometry {
    fn default() -> Self {
        Self {
            num_pe: 4,
            pe_size: 256,
            speed_up_row: 1,
            speed_up_col: 1,
            mapping: MappingMode::Conventional,
            digital: false,
            novel_num_pe: None,
            novel_pe_size: None,
        }
    }
}

impl TileGeometry {
    pub fn speed_up(&self) -> usize {
        self.speed_up_row * self.speed_up_col
    }

    pub fn novel_num_pe(&self) -> usize {
        self.novel_num_pe.unwrap_or(self.num_pe)
    }

    pub fn novel_pe_size(&self) -> usize {
        self.novel_pe_size.unwrap_or(self.pe_size)
    }
}

/// circuit-level parameters shared by every component of the tile
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Param {
    pub num_row_subarray: usize,
    pub num_col_subarray: usize,
    pub num_bit_input: usize,
    pub cell_bit: usize,
    pub clk_freq: f64,
    pub level_output: usize,
    pub num_col_muxed: usize,
    pub num_col_per_synapse: usize,
    /// thresholding is done by the accumulation tree, no separate activation unit
    pub chip_activation: bool,
    /// ReLU when set, sigmoid otherwise
    pub relu: bool,
    /// also build the novel-mapping fabric
    pub novel_mapping: bool,
    pub parallel_read: bool,
    pub training_estimation: bool,
    pub tile_buffer_core_size_row: usize,
    pub tile_buffer_core_size_col: usize,
    pub local_bus_delay_tolerance: f64,
    pub min_conductance: f64,
    pub max_conductance: f64,
}

impl Default for Param {
    fn default() -> Self {
        Self {
            num_row_subarray: 128,
            num_col_subarray: 128,
            num_bit_input: 8,
            cell_bit: 1,
            clk_freq: 1e9,
            level_output: 32,
            num_col_muxed: 8,
            num_col_per_synapse: 8,
            chip_activation: false,
            relu: true,
            novel_mapping: false,
            parallel_read: true,
            training_estimation: false,
            tile_buffer_core_size_row: 32,
            tile_buffer_core_size_col: 32,
            local_bus_delay_tolerance: 0.1,
            min_conductance: 1e-6,
            max_conductance: 1e-5,
        }
    }
}

/// shape of one transformer decoder layer
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TransformerShape {
    pub d_model: usize,
    pub d_k: usize,
    pub d_v: usize,
    pub n_heads: usize,
    pub d_hidden: usize,
    pub synapse_bit: usize,
}

impl Default for TransformerShape {
    fn default() -> Self {
        Self {
            d_model: 512,
            d_k: 64,
            d_v: 64,
            n_heads: 8,
            d_hidden: 2048,
            synapse_bit: 8,
        }
    }
}

/// the layer handed to the tile by the `run` and `sweep` commands
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct WorkloadConfig {
    pub weight_rows: usize,
    pub weight_cols: usize,
    pub num_vectors: usize,
    pub layer_number: usize,
    /// tokens of the current sequence, digital tiles only
    pub seq_len: usize,
    /// tokens held in the key/value cache, digital tiles only
    pub seq_len_total: usize,
    pub seed: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            weight_rows: 512,
            weight_cols: 512,
            num_vectors: 64,
            layer_number: 0,
            seq_len: 128,
            seq_len_total: 1024,
            seed: 42,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub geometry: TileGeometry,
    pub param: Param,
    pub transformer: TransformerShape,
    pub technology: TechnologyParams,
    pub workload: WorkloadConfig,
    pub output_path: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            geometry: Default::default(),
            param: Default::default(),
            transformer: Default::default(),
            technology: Default::default(),
            workload: Default::default(),
            output_path: PathBuf::from("output/tile.json"),
            log_dir: PathBuf::from("output/"),
        }
    }
}

impl Config {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config {path:?}"))?;
        toml::from_str(&content).wrap_err_with(|| format!("failed to parse config {path:?}"))
    }

    /// the file stem, used to name the configuration point in reports
    pub fn name(path: impl AsRef<Path>) -> String {
        path.as_ref()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
