//! The components a tile shares between its PEs, sized once when the tile is built.
//!
//! A tile has a conventional fabric and, when novel mapping is enabled, a second one with its
//! own PE count and PE size. Each fabric keeps its own buffer bank counts.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::Param;
use crate::{
    circuit::{
        Accumulator, AccumulatorSpec, ActivationSpec, ActivationUnit, Buffer, BufferSpec,
        CircuitFactory, Cost, Interconnect, InterconnectSpec,
    },
    error::{Result, TileError},
    tools::math::{ceil_div, ceil_log2, ceil_sqrt},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FabricKind {
    /// `num_pe x num_pe` grid
    Conventional,
    /// `num_pe` PEs laid out on a `ceil(sqrt(num_pe))` square mesh
    Novel,
}

/// the sizing decisions of a fabric, reported alongside the results
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FabricSizing {
    pub kind: FabricKind,
    pub num_pe: usize,
    pub pe_size: usize,
    pub adder_bits: usize,
    pub num_in_buffer_core: usize,
    pub num_out_buffer_core: usize,
}

#[derive(Debug)]
pub struct Fabric {
    pub sizing: FabricSizing,
    pub accumulation: Box<dyn Accumulator>,
    pub input_buffer: Box<dyn Buffer>,
    pub output_buffer: Box<dyn Buffer>,
    pub interconnect: Box<dyn Interconnect>,
    /// `None` under chip activation
    pub activation: Option<Box<dyn ActivationUnit>>,
}

fn check_positive(name: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(TileError::InvalidGeometry(format!("{name} must be at least 1")));
    }
    Ok(())
}

/// width of the partial sums leaving one PE
///
/// a PE smaller than one subarray adds no row bits, the width never drops below the column term
pub fn adder_bits(param: &Param, pe_size: usize) -> usize {
    let pe_rows = ceil_log2(pe_size as f64 / param.num_row_subarray as f64);
    let column = if param.parallel_read {
        ceil_log2(param.level_output as f64)
    } else {
        (ceil_log2(param.num_row_subarray as f64) + param.cell_bit).saturating_sub(1)
    };
    column + param.num_bit_input + param.num_col_per_synapse + 1 + pe_rows
}

/// a buffer holding `num_bit` bits: one bank sized to fit when it is smaller than a core,
/// otherwise as many full cores as needed
fn buffer_spec(num_bit: f64, narrow_interface: f64, param: &Param) -> (BufferSpec, usize) {
    let core_bits = (param.tile_buffer_core_size_row * param.tile_buffer_core_size_col) as f64;
    let banks = ((num_bit / core_bits).ceil() as usize).max(1);
    let spec = if num_bit < core_bits {
        BufferSpec {
            num_bit,
            interface_width: narrow_interface,
        }
    } else {
        BufferSpec {
            num_bit: core_bits,
            interface_width: param.tile_buffer_core_size_col as f64,
        }
    };
    (spec, banks)
}

impl Fabric {
    pub fn new(
        kind: FabricKind,
        num_pe: usize,
        pe_size: usize,
        param: &Param,
        circuits: &impl CircuitFactory,
    ) -> Result<Self> {
        check_positive("num_pe", num_pe)?;
        check_positive("pe_size", pe_size)?;
        check_positive("num_row_subarray", param.num_row_subarray)?;
        check_positive("num_col_subarray", param.num_col_subarray)?;
        check_positive("num_col_muxed", param.num_col_muxed)?;
        check_positive("num_col_per_synapse", param.num_col_per_synapse)?;
        check_positive("num_bit_input", param.num_bit_input)?;
        check_positive("tile_buffer_core_size_row", param.tile_buffer_core_size_row)?;
        check_positive("tile_buffer_core_size_col", param.tile_buffer_core_size_col)?;

        let adder_bits = adder_bits(param, pe_size);
        let columns_out = ceil_div(num_pe * param.num_col_subarray, param.num_col_muxed);

        let mut accumulation = circuits.accumulator();
        accumulation.initialize(AccumulatorSpec {
            num_adder_tree: num_pe,
            num_adder_bit: adder_bits,
            num_unit: columns_out,
        });

        let activation = (!param.chip_activation).then(|| {
            let mut unit = circuits.activation(param.relu);
            unit.initialize(if param.relu {
                ActivationSpec::ReLu {
                    num_unit: ceil_div(pe_size * param.num_col_subarray, param.num_col_muxed),
                    num_bit: param.num_bit_input,
                }
            } else {
                ActivationSpec::Sigmoid {
                    num_y_bit: param.num_bit_input,
                    num_entry: adder_bits + ceil_log2(num_pe as f64),
                    num_unit: columns_out,
                }
            });
            unit
        });

        let out_width = if param.chip_activation {
            adder_bits
        } else {
            param.num_bit_input
        };
        let (out_spec, num_out_buffer_core) = buffer_spec(
            (out_width * num_pe * param.num_col_subarray) as f64 / param.num_col_muxed as f64,
            (out_width * num_pe) as f64,
            param,
        );
        let mut output_buffer = circuits.buffer();
        output_buffer.initialize(out_spec);

        let (in_spec, num_in_buffer_core) = buffer_spec(
            (num_pe * param.num_bit_input * param.num_row_subarray) as f64,
            (num_pe * param.num_row_subarray) as f64,
            param,
        );
        let mut input_buffer = circuits.buffer();
        input_buffer.initialize(in_spec);

        let side = match kind {
            FabricKind::Conventional => num_pe,
            FabricKind::Novel => ceil_sqrt(num_pe),
        };
        let mut interconnect = circuits.interconnect();
        interconnect.initialize(InterconnectSpec {
            num_row: side,
            num_col: side,
            delay_tolerance: param.local_bus_delay_tolerance,
            bus_width: (side * param.num_row_subarray) as f64,
        });

        let sizing = FabricSizing {
            kind,
            num_pe,
            pe_size,
            adder_bits,
            num_in_buffer_core,
            num_out_buffer_core,
        };
        debug!(?sizing, "fabric initialized");
        Ok(Self {
            sizing,
            accumulation,
            input_buffer,
            output_buffer,
            interconnect,
            activation,
        })
    }

    pub fn kind(&self) -> FabricKind {
        self.sizing.kind
    }

    pub fn num_pe(&self) -> usize {
        self.sizing.num_pe
    }

    pub fn pe_size(&self) -> usize {
        self.sizing.pe_size
    }

    /// PEs physically present in the fabric
    pub fn pe_count(&self) -> usize {
        match self.sizing.kind {
            FabricKind::Conventional => self.sizing.num_pe * self.sizing.num_pe,
            FabricKind::Novel => self.sizing.num_pe,
        }
    }

    /// subarrays along each side of one PE when estimating performance
    pub fn pe_subarrays(&self, param: &Param) -> (usize, usize) {
        (
            ceil_div(self.sizing.pe_size, param.num_row_subarray),
            ceil_div(self.sizing.pe_size, param.num_col_subarray),
        )
    }

    /// side of the square subarray layout used for the PE area query
    pub fn pe_layout_side(&self, param: &Param) -> usize {
        let (rows, cols) = self.pe_subarrays(param);
        ceil_sqrt(rows * cols)
    }

    /// width of one value written back to the output buffer
    pub fn output_value_bits(&self) -> usize {
        self.activation
            .as_ref()
            .map(|unit| unit.output_bits())
            .unwrap_or_else(|| self.accumulation.num_adder_bit())
    }

    /// banks usable in parallel: limited by the bank count and by how many interfaces fit
    /// on the bus
    fn bank_parallelism(&self, banks: usize, interface_width: f64) -> f64 {
        let bus_slots = (self.interconnect.bus_width() / interface_width).ceil();
        (banks as f64).min(bus_slots).max(1.0)
    }

    /// move `num_bit` bits through the input buffer, spread over the parallel banks
    pub fn input_traffic(&mut self, num_bit: f64) -> Cost {
        let parallel =
            self.bank_parallelism(self.sizing.num_in_buffer_core, self.input_buffer.interface_width());
        self.input_buffer.calculate_cost(num_bit).parallel_banks(parallel)
    }

    pub fn output_traffic(&mut self, num_bit: f64) -> Cost {
        let parallel = self
            .bank_parallelism(self.sizing.num_out_buffer_core, self.output_buffer.interface_width());
        self.output_buffer.calculate_cost(num_bit).parallel_banks(parallel)
    }

    /// `num_bit` bits crossing the H-tree between PEs of the given footprint
    pub fn interconnect_traffic(&mut self, pe_height: f64, pe_width: f64, num_bit: f64) -> Cost {
        let num_read = num_bit / self.interconnect.bus_width();
        self.interconnect.calculate_cost(pe_height, pe_width, num_read)
    }

    pub fn leakage(&self) -> f64 {
        self.accumulation.leakage() + self.input_buffer.leakage() + self.output_buffer.leakage()
    }
}
