//! First-order models of the tile primitives.
//!
//! Every model is a handful of per-bit coefficients from [`TechnologyParams`] scaled by the
//! sizing the tile hands in. They are good enough to compare mapping strategies against each
//! other, not to sign off a layout.

use serde::{Deserialize, Serialize};

use super::{
    Accumulator, AccumulatorSpec, ActivationSpec, ActivationUnit, Buffer, BufferSpec,
    CircuitFactory, Cost, Interconnect, InterconnectSpec,
};
use crate::tools::math::count_to_log;

/// per-bit coefficients of the analytic models, SI units (m, m², s, J, W)
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TechnologyParams {
    pub adder_area_per_bit: f64,
    pub adder_energy_per_bit: f64,
    pub adder_leakage_per_bit: f64,

    pub buffer_area_per_bit: f64,
    pub buffer_energy_per_bit: f64,
    pub buffer_leakage_per_bit: f64,

    pub wire_pitch: f64,
    pub wire_delay_per_m: f64,
    pub wire_energy_per_bit_per_m: f64,

    pub relu_area_per_bit: f64,
    pub relu_energy_per_bit: f64,
    pub sigmoid_area_per_bit: f64,
    pub sigmoid_energy_per_read: f64,

    // processing element
    pub cell_area: f64,
    pub cell_read_energy: f64,
    pub array_latency: f64,
    pub adc_area: f64,
    pub adc_latency: f64,
    pub adc_energy: f64,
    pub shift_add_area: f64,
    pub shift_add_latency: f64,
    pub shift_add_energy: f64,
    pub periphery_area: f64,
    pub write_pulse_latency: f64,
    pub write_pulse_energy: f64,
    pub max_write_pulse: f64,
    pub subarray_leakage: f64,
}

impl Default for TechnologyParams {
    fn default() -> Self {
        Self {
            adder_area_per_bit: 5e-12,
            adder_energy_per_bit: 1e-15,
            adder_leakage_per_bit: 1e-9,
            buffer_area_per_bit: 5e-13,
            buffer_energy_per_bit: 5e-15,
            buffer_leakage_per_bit: 1e-10,
            wire_pitch: 1e-7,
            wire_delay_per_m: 1e-7,
            wire_energy_per_bit_per_m: 2e-10,
            relu_area_per_bit: 2e-12,
            relu_energy_per_bit: 2e-16,
            sigmoid_area_per_bit: 1e-12,
            sigmoid_energy_per_read: 1e-14,
            cell_area: 1e-14,
            cell_read_energy: 1e-16,
            array_latency: 5e-10,
            adc_area: 1e-10,
            adc_latency: 1e-9,
            adc_energy: 2e-13,
            shift_add_area: 2e-10,
            shift_add_latency: 2e-10,
            shift_add_energy: 5e-15,
            periphery_area: 2e-9,
            write_pulse_latency: 1e-8,
            write_pulse_energy: 1e-13,
            max_write_pulse: 64.0,
            subarray_leakage: 1e-6,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnalyticAdderTree {
    tech: TechnologyParams,
    clk_period: f64,
    spec: AccumulatorSpec,
}

impl AnalyticAdderTree {
    fn num_adders(&self) -> usize {
        self.spec.num_unit * self.spec.num_adder_tree.saturating_sub(1).max(1)
    }
}

impl Accumulator for AnalyticAdderTree {
    fn initialize(&mut self, spec: AccumulatorSpec) {
        self.spec = spec;
    }

    fn calculate_area(&mut self, _height: Option<f64>, _width: Option<f64>) -> f64 {
        self.num_adders() as f64 * self.spec.num_adder_bit as f64 * self.tech.adder_area_per_bit
    }

    fn calculate_cost(&mut self, num_read: f64, num_add: usize) -> Cost {
        let depth = count_to_log(num_add).max(1) as f64;
        let adders = (num_add.saturating_sub(1).max(1) * self.spec.num_unit) as f64;
        Cost {
            read_latency: num_read * depth * self.clk_period,
            read_dynamic_energy: num_read
                * adders
                * self.spec.num_adder_bit as f64
                * self.tech.adder_energy_per_bit,
            ..Default::default()
        }
    }

    fn num_adder_bit(&self) -> usize {
        self.spec.num_adder_bit
    }

    fn leakage(&self) -> f64 {
        self.num_adders() as f64 * self.spec.num_adder_bit as f64 * self.tech.adder_leakage_per_bit
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnalyticBuffer {
    tech: TechnologyParams,
    clk_period: f64,
    spec: BufferSpec,
}

impl Buffer for AnalyticBuffer {
    fn initialize(&mut self, spec: BufferSpec) {
        self.spec = spec;
    }

    fn calculate_area(&mut self, _height: Option<f64>, _width: Option<f64>) -> f64 {
        self.spec.num_bit * self.tech.buffer_area_per_bit
    }

    fn calculate_cost(&mut self, num_bit: f64) -> Cost {
        let accesses = (num_bit / self.spec.interface_width).ceil();
        let energy = num_bit * self.tech.buffer_energy_per_bit;
        Cost {
            read_latency: accesses * self.clk_period,
            write_latency: accesses * self.clk_period,
            read_dynamic_energy: energy,
            write_dynamic_energy: energy,
        }
    }

    fn interface_width(&self) -> f64 {
        self.spec.interface_width
    }

    fn leakage(&self) -> f64 {
        self.spec.num_bit * self.tech.buffer_leakage_per_bit
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnalyticHTree {
    tech: TechnologyParams,
    clk_period: f64,
    spec: InterconnectSpec,
}

impl AnalyticHTree {
    fn span(&self, pe_height: f64, pe_width: f64) -> f64 {
        self.spec.num_row as f64 * pe_height + self.spec.num_col as f64 * pe_width
    }
}

impl Interconnect for AnalyticHTree {
    fn initialize(&mut self, spec: InterconnectSpec) {
        self.spec = spec;
    }

    fn calculate_area(&mut self, pe_height: f64, pe_width: f64, fold: usize) -> f64 {
        let levels = count_to_log(self.spec.num_row * self.spec.num_col).max(1) as f64;
        self.span(pe_height, pe_width) * levels / 2.0 * self.spec.bus_width * self.tech.wire_pitch
            / fold.max(1) as f64
    }

    fn calculate_cost(&mut self, pe_height: f64, pe_width: f64, num_read: f64) -> Cost {
        let distance = self.span(pe_height, pe_width) / 2.0;
        let hop = (distance * self.tech.wire_delay_per_m)
            .max(self.clk_period * self.spec.delay_tolerance);
        Cost {
            read_latency: num_read.ceil() * hop,
            read_dynamic_energy: num_read
                * self.spec.bus_width
                * distance
                * self.tech.wire_energy_per_bit_per_m,
            ..Default::default()
        }
    }

    fn bus_width(&self) -> f64 {
        self.spec.bus_width
    }
}

#[derive(Debug, Clone)]
pub struct AnalyticActivation {
    tech: TechnologyParams,
    clk_period: f64,
    spec: ActivationSpec,
}

impl ActivationUnit for AnalyticActivation {
    fn initialize(&mut self, spec: ActivationSpec) {
        self.spec = spec;
    }

    fn calculate_area(&mut self, _height: Option<f64>, _width: Option<f64>) -> f64 {
        match self.spec {
            ActivationSpec::ReLu { num_unit, num_bit } => {
                (num_unit * num_bit) as f64 * self.tech.relu_area_per_bit
            }
            ActivationSpec::Sigmoid {
                num_y_bit,
                num_entry,
                num_unit,
            } => (num_unit * num_entry * num_y_bit) as f64 * self.tech.sigmoid_area_per_bit,
        }
    }

    fn calculate_cost(&mut self, num_read: f64) -> Cost {
        let read_dynamic_energy = match self.spec {
            ActivationSpec::ReLu { num_unit, num_bit } => {
                num_read * (num_unit * num_bit) as f64 * self.tech.relu_energy_per_bit
            }
            ActivationSpec::Sigmoid { num_unit, .. } => {
                num_read * num_unit as f64 * self.tech.sigmoid_energy_per_read
            }
        };
        Cost {
            read_latency: num_read.ceil() * self.clk_period,
            read_dynamic_energy,
            ..Default::default()
        }
    }

    fn lanes(&self) -> usize {
        match self.spec {
            ActivationSpec::ReLu { num_unit, .. } => num_unit,
            ActivationSpec::Sigmoid { num_entry, .. } => num_entry,
        }
    }

    fn output_bits(&self) -> usize {
        match self.spec {
            ActivationSpec::ReLu { num_bit, .. } => num_bit,
            ActivationSpec::Sigmoid { num_y_bit, .. } => num_y_bit,
        }
    }
}

/// builds the analytic primitives for a given clock
#[derive(Debug, Clone)]
pub struct AnalyticCircuits {
    pub tech: TechnologyParams,
    pub clk_freq: f64,
}

impl AnalyticCircuits {
    pub fn new(tech: TechnologyParams, clk_freq: f64) -> Self {
        Self { tech, clk_freq }
    }

    fn clk_period(&self) -> f64 {
        1.0 / self.clk_freq
    }
}

impl CircuitFactory for AnalyticCircuits {
    fn accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(AnalyticAdderTree {
            tech: self.tech.clone(),
            clk_period: self.clk_period(),
            spec: Default::default(),
        })
    }

    fn buffer(&self) -> Box<dyn Buffer> {
        Box::new(AnalyticBuffer {
            tech: self.tech.clone(),
            clk_period: self.clk_period(),
            spec: Default::default(),
        })
    }

    fn interconnect(&self) -> Box<dyn Interconnect> {
        Box::new(AnalyticHTree {
            tech: self.tech.clone(),
            clk_period: self.clk_period(),
            spec: Default::default(),
        })
    }

    fn activation(&self, relu: bool) -> Box<dyn ActivationUnit> {
        let spec = if relu {
            ActivationSpec::ReLu {
                num_unit: 1,
                num_bit: 1,
            }
        } else {
            ActivationSpec::Sigmoid {
                num_y_bit: 1,
                num_entry: 1,
                num_unit: 1,
            }
        };
        Box::new(AnalyticActivation {
            tech: self.tech.clone(),
            clk_period: self.clk_period(),
            spec,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circuits() -> AnalyticCircuits {
        AnalyticCircuits::new(TechnologyParams::default(), 1e9)
    }

    #[test]
    fn buffer_cost_scales_with_bits() {
        let mut buffer = circuits().buffer();
        buffer.initialize(BufferSpec {
            num_bit: 1024.0,
            interface_width: 64.0,
        });
        let small = buffer.calculate_cost(640.0);
        let large = buffer.calculate_cost(6400.0);
        assert!((small.read_latency - 10e-9).abs() < 1e-15);
        assert!((large.energy() / small.energy() - 10.0).abs() < 1e-9);
        assert_eq!(buffer.interface_width(), 64.0);
    }

    #[test]
    fn adder_tree_depth_follows_inputs() {
        let mut tree = circuits().accumulator();
        tree.initialize(AccumulatorSpec {
            num_adder_tree: 8,
            num_adder_bit: 16,
            num_unit: 4,
        });
        let two = tree.calculate_cost(1.0, 2);
        let eight = tree.calculate_cost(1.0, 8);
        assert!((eight.read_latency / two.read_latency - 3.0).abs() < 1e-9);
        assert!(tree.calculate_area(None, Some(1e-4)) > 0.0);
        assert_eq!(tree.num_adder_bit(), 16);
    }

    #[test]
    fn activation_lanes() {
        let factory = circuits();
        let mut relu = factory.activation(true);
        relu.initialize(ActivationSpec::ReLu {
            num_unit: 32,
            num_bit: 8,
        });
        assert_eq!(relu.lanes(), 32);
        assert_eq!(relu.output_bits(), 8);

        let mut sigmoid = factory.activation(false);
        sigmoid.initialize(ActivationSpec::Sigmoid {
            num_y_bit: 8,
            num_entry: 20,
            num_unit: 4,
        });
        assert_eq!(sigmoid.lanes(), 20);
        assert!(sigmoid.calculate_cost(3.0).read_latency > 0.0);
    }
}
