//! # Description
//! - the circuit primitives shared by all PEs of a tile
//! - accumulation tree, buffers, interconnect and the activation unit are collaborators: the tile
//!   only sizes them, asks for their area and asks for the cost of a given amount of work
//! - [`analytic`] holds first-order models of each primitive so the binary runs end-to-end
//!
//! # Components
//! - [`Accumulator`]: adder tree merging partial sums across row-groups
//! - [`Buffer`]: input/output buffer banks of the tile
//! - [`Interconnect`]: the H-tree between the buffers and the PEs
//! - [`ActivationUnit`]: ReLU (bit shifter) or sigmoid lookup

use std::fmt::Debug;

use derive_more::{Add, AddAssign};
use serde::{Deserialize, Serialize};

pub mod analytic;

/// the latency/energy of one invocation of a primitive
#[derive(Serialize, Deserialize, Clone, Copy, Default, Debug, PartialEq, Add, AddAssign)]
pub struct Cost {
    pub read_latency: f64,
    pub write_latency: f64,
    pub read_dynamic_energy: f64,
    pub write_dynamic_energy: f64,
}

impl Cost {
    pub fn latency(&self) -> f64 {
        self.read_latency + self.write_latency
    }

    pub fn energy(&self) -> f64 {
        self.read_dynamic_energy + self.write_dynamic_energy
    }

    /// divide the latency by the number of banks working in parallel
    pub fn parallel_banks(self, banks: f64) -> Self {
        Self {
            read_latency: self.read_latency / banks,
            write_latency: self.write_latency / banks,
            ..self
        }
    }
}

/// sizing of the accumulation tree
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AccumulatorSpec {
    /// inputs of each tree
    pub num_adder_tree: usize,
    /// width of the leaf adders
    pub num_adder_bit: usize,
    /// trees working in parallel
    pub num_unit: usize,
}

/// sizing of one buffer bank
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BufferSpec {
    pub num_bit: f64,
    pub interface_width: f64,
}

/// sizing of the H-tree
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InterconnectSpec {
    pub num_row: usize,
    pub num_col: usize,
    pub delay_tolerance: f64,
    pub bus_width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActivationSpec {
    ReLu {
        num_unit: usize,
        num_bit: usize,
    },
    Sigmoid {
        num_y_bit: usize,
        num_entry: usize,
        num_unit: usize,
    },
}

pub trait Accumulator: Debug {
    fn initialize(&mut self, spec: AccumulatorSpec);
    /// area with an optional height/width constraint
    fn calculate_area(&mut self, height: Option<f64>, width: Option<f64>) -> f64;
    /// `num_read` sequential reductions over `num_add` inputs
    fn calculate_cost(&mut self, num_read: f64, num_add: usize) -> Cost;
    /// output width of the tree
    fn num_adder_bit(&self) -> usize;
    fn leakage(&self) -> f64;
}

pub trait Buffer: Debug {
    fn initialize(&mut self, spec: BufferSpec);
    fn calculate_area(&mut self, height: Option<f64>, width: Option<f64>) -> f64;
    /// move `num_bit` bits in and out through the interface
    fn calculate_cost(&mut self, num_bit: f64) -> Cost;
    fn interface_width(&self) -> f64;
    fn leakage(&self) -> f64;
}

pub trait Interconnect: Debug {
    fn initialize(&mut self, spec: InterconnectSpec);
    /// area given the footprint of one PE
    fn calculate_area(&mut self, pe_height: f64, pe_width: f64, fold: usize) -> f64;
    /// `num_read` bus transfers across PEs of the given footprint
    fn calculate_cost(&mut self, pe_height: f64, pe_width: f64, num_read: f64) -> Cost;
    fn bus_width(&self) -> f64;
}

pub trait ActivationUnit: Debug {
    fn initialize(&mut self, spec: ActivationSpec);
    fn calculate_area(&mut self, height: Option<f64>, width: Option<f64>) -> f64;
    fn calculate_cost(&mut self, num_read: f64) -> Cost;
    /// operations handled per invocation
    fn lanes(&self) -> usize;
    /// width of one activated output
    fn output_bits(&self) -> usize;
}

/// creates fresh, uninitialized primitives for one fabric of a tile
pub trait CircuitFactory {
    fn accumulator(&self) -> Box<dyn Accumulator>;
    fn buffer(&self) -> Box<dyn Buffer>;
    fn interconnect(&self) -> Box<dyn Interconnect>;
    fn activation(&self, relu: bool) -> Box<dyn ActivationUnit>;
}
