//! A first-order PE model: subarrays read in bit-serial fashion, columns multiplexed onto
//! shared ADCs, a shift-add per column group and a PE-local buffer.

use tracing::trace;

use super::{PeArea, PeEstimator, PeRequest};
use crate::{
    circuit::analytic::TechnologyParams,
    tile::{config::Param, result::PeResult, result::training_gate},
    tools::math::ceil_div,
};

#[derive(Debug, Clone)]
pub struct AnalyticPe {
    tech: TechnologyParams,
    param: Param,
}

impl AnalyticPe {
    pub fn new(tech: TechnologyParams, param: Param) -> Self {
        Self { tech, param }
    }

    fn clk_period(&self) -> f64 {
        1.0 / self.param.clk_freq
    }

    /// fraction of the input bits that are set, scales the array read energy
    fn input_density(request: &PeRequest<'_>) -> f64 {
        let size = request.input.rows() * request.input.cols();
        if size == 0 {
            return 0.0;
        }
        request.input.iter().filter(|&&v| v != 0.0).count() as f64 / size as f64
    }

    /// latency/energy of writing `new` over `old`, pulses proportional to the conductance step
    fn write_cost(&self, request: &PeRequest<'_>) -> (f64, f64) {
        if request.new_weights.shape() != request.old_weights.shape() {
            return (0.0, 0.0);
        }
        let range = self.param.max_conductance - self.param.min_conductance;
        if range <= 0.0 {
            return (0.0, 0.0);
        }
        let mut latency = 0.0;
        let mut pulses = 0.0;
        for r in 0..request.rows() {
            let row_pulses = request
                .new_weights
                .row(r)
                .iter()
                .zip(request.old_weights.row(r))
                .map(|(new, old)| ((new - old).abs() / range * self.tech.max_write_pulse).ceil())
                .collect::<Vec<_>>();
            // a row is written at once, the slowest cell sets the pace
            latency += row_pulses.iter().cloned().fold(0.0, f64::max) * self.tech.write_pulse_latency;
            pulses += row_pulses.iter().sum::<f64>();
        }
        (latency, pulses * self.tech.write_pulse_energy)
    }
}

impl PeEstimator for AnalyticPe {
    fn estimate(&mut self, request: &PeRequest<'_>) -> PeResult {
        let param = &self.param;
        let tech = &self.tech;
        let rows = request.rows();
        let cols = request.cols();
        let num_vectors = request.num_vectors() as f64;
        let duplication = (request.row_duplication.max(1) * request.col_duplication.max(1)) as f64;

        let row_groups = ceil_div(rows, param.num_row_subarray).max(1) as f64;
        let col_groups = ceil_div(cols, param.num_col_subarray).max(1) as f64;
        let cycles = num_vectors * param.num_bit_input as f64;
        let row_serial = if param.parallel_read {
            1.0
        } else {
            rows.min(param.num_row_subarray) as f64
        };
        let mux = param.num_col_muxed as f64 * row_serial;

        // digital PEs reduce with adders instead of converting
        let (adc_latency, adc_energy) = if request.digital {
            (0.0, 0.0)
        } else {
            (
                cycles * mux * tech.adc_latency / duplication,
                cycles * row_groups * cols as f64 * row_serial * tech.adc_energy,
            )
        };
        let accum_latency = cycles * mux * tech.shift_add_latency / duplication;
        let accum_energy = cycles * row_groups * cols as f64 * tech.shift_add_energy;
        let other_latency = cycles * mux * tech.array_latency / duplication;
        let other_energy = cycles
            * (rows * cols) as f64
            * Self::input_density(request)
            * tech.cell_read_energy;

        let buffer_bits = (rows + cols) as f64 * num_vectors;
        let buffer_latency =
            buffer_bits / param.num_row_subarray as f64 * self.clk_period() / duplication;
        let buffer_energy = buffer_bits * tech.buffer_energy_per_bit;

        let read_latency = adc_latency + accum_latency + other_latency + buffer_latency;
        let read_energy = adc_energy + accum_energy + other_energy + buffer_energy;

        // the transposed read of the backward pass costs as much as the forward one
        let gate = if request.digital {
            0.0
        } else {
            training_gate(param.training_estimation, request.layer_number)
        };
        let (write_latency, write_energy) = if gate > 0.0 {
            self.write_cost(request)
        } else {
            (0.0, 0.0)
        };
        trace!(
            rows,
            cols,
            read_latency,
            read_energy,
            write_latency,
            "analytic pe estimate"
        );

        PeResult {
            read_latency,
            read_dynamic_energy: read_energy,
            read_latency_ag: read_latency * gate,
            read_dynamic_energy_ag: read_energy * gate,
            write_latency_wu: write_latency,
            write_dynamic_energy_wu: write_energy,
            buffer_latency,
            buffer_dynamic_energy: buffer_energy,
            ic_latency: 0.0,
            ic_dynamic_energy: 0.0,
            core_latency_adc: adc_latency,
            core_latency_accum: accum_latency,
            core_latency_other: other_latency,
            core_energy_adc: adc_energy,
            core_energy_accum: accum_energy,
            core_energy_other: other_energy,
            read_latency_peak_fw: read_latency - buffer_latency,
            read_dynamic_energy_peak_fw: read_energy - buffer_energy,
            read_latency_peak_ag: (read_latency - buffer_latency) * gate,
            read_dynamic_energy_peak_ag: (read_energy - buffer_energy) * gate,
            write_latency_peak_wu: write_latency,
            write_dynamic_energy_peak_wu: write_energy,
            leakage: row_groups * col_groups * duplication * tech.subarray_leakage,
        }
    }

    fn area(&mut self, num_subarray_row: usize, num_subarray_col: usize) -> PeArea {
        let param = &self.param;
        let tech = &self.tech;
        let subarrays = (num_subarray_row * num_subarray_col) as f64;
        let adcs_per_subarray = ceil_div(param.num_col_subarray, param.num_col_muxed) as f64;

        let array = subarrays
            * (param.num_row_subarray * param.num_col_subarray) as f64
            * tech.cell_area;
        let adc = subarrays * adcs_per_subarray * tech.adc_area;
        let accumulation = subarrays * adcs_per_subarray * tech.shift_add_area;
        let buffer = (num_subarray_row * param.num_row_subarray * param.num_bit_input) as f64
            * tech.buffer_area_per_bit;
        let other = subarrays * tech.periphery_area + buffer;

        let mut area = PeArea {
            buffer,
            adc,
            accumulation,
            other,
            array,
            ..Default::default()
        };
        let total = area.total();
        area.height = total.sqrt();
        area.width = if area.height > 0.0 { total / area.height } else { 0.0 };
        area
    }
}
