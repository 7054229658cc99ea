//! Deterministic collaborators for unit tests: a PE that always reports the same result and
//! circuit primitives with a fixed cost that log every cost query.

use std::{cell::RefCell, rc::Rc};

use crate::{
    circuit::{
        Accumulator, AccumulatorSpec, ActivationSpec, ActivationUnit, Buffer, BufferSpec,
        CircuitFactory, Cost, Interconnect, InterconnectSpec,
    },
    pe::{PeArea, PeEstimator, PeRequest},
    tile::{digital::RandomSource, result::PeResult},
};

/// what the tile asked one PE to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedRequest {
    pub rows: usize,
    pub cols: usize,
    pub num_vectors: usize,
    pub row_duplication: usize,
    pub col_duplication: usize,
    pub novel_mapping: bool,
    pub digital: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FixedPe {
    pub result: PeResult,
    pub area: PeArea,
    pub requests: Vec<RecordedRequest>,
}

impl FixedPe {
    pub fn new(latency: f64, energy: f64) -> Self {
        Self {
            result: PeResult {
                read_latency: latency,
                read_dynamic_energy: energy,
                read_latency_ag: latency,
                read_dynamic_energy_ag: energy,
                write_latency_wu: latency,
                write_dynamic_energy_wu: energy,
                read_latency_peak_fw: latency,
                read_dynamic_energy_peak_fw: energy,
                core_latency_accum: latency,
                core_energy_accum: energy,
                leakage: 1.0,
                ..Default::default()
            },
            area: PeArea {
                height: 1.0,
                width: 1.0,
                adc: 0.25,
                accumulation: 0.25,
                other: 0.25,
                array: 0.25,
                ..Default::default()
            },
            requests: vec![],
        }
    }
}

impl PeEstimator for FixedPe {
    fn estimate(&mut self, request: &PeRequest<'_>) -> PeResult {
        self.requests.push(RecordedRequest {
            rows: request.rows(),
            cols: request.cols(),
            num_vectors: request.num_vectors(),
            row_duplication: request.row_duplication,
            col_duplication: request.col_duplication,
            novel_mapping: request.novel_mapping,
            digital: request.digital,
        });
        self.result
    }

    fn area(&mut self, _num_subarray_row: usize, _num_subarray_col: usize) -> PeArea {
        self.area
    }
}

/// the volume one cost query was made for, in call order
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitCall {
    Accumulation { num_read: f64, num_add: usize },
    /// bits moved through a buffer
    Buffer(f64),
    /// bus reads on the H-tree
    Interconnect(f64),
    /// invocations per lane
    Activation(f64),
}

pub type CallLog = Rc<RefCell<Vec<CircuitCall>>>;

/// every primitive reports the same area and leakage, each kind its own cost
#[derive(Debug, Clone, Default)]
pub struct FixedCircuits {
    pub area: f64,
    pub leakage: f64,
    pub accumulation: Cost,
    pub buffer: Cost,
    pub interconnect: Cost,
    pub activation: Cost,
    /// shared by every component built from this factory
    pub calls: CallLog,
}

impl FixedCircuits {
    pub fn calls(&self) -> Vec<CircuitCall> {
        self.calls.borrow().clone()
    }
}

#[derive(Debug, Default)]
struct FixedAccumulator {
    spec: AccumulatorSpec,
    area: f64,
    leakage: f64,
    cost: Cost,
    calls: CallLog,
}

impl Accumulator for FixedAccumulator {
    fn initialize(&mut self, spec: AccumulatorSpec) {
        self.spec = spec;
    }

    fn calculate_area(&mut self, _height: Option<f64>, _width: Option<f64>) -> f64 {
        self.area
    }

    fn calculate_cost(&mut self, num_read: f64, num_add: usize) -> Cost {
        self.calls
            .borrow_mut()
            .push(CircuitCall::Accumulation { num_read, num_add });
        self.cost
    }

    fn num_adder_bit(&self) -> usize {
        self.spec.num_adder_bit
    }

    fn leakage(&self) -> f64 {
        self.leakage
    }
}

#[derive(Debug, Default)]
struct FixedBuffer {
    spec: BufferSpec,
    area: f64,
    leakage: f64,
    cost: Cost,
    calls: CallLog,
}

impl Buffer for FixedBuffer {
    fn initialize(&mut self, spec: BufferSpec) {
        self.spec = spec;
    }

    fn calculate_area(&mut self, _height: Option<f64>, _width: Option<f64>) -> f64 {
        self.area
    }

    fn calculate_cost(&mut self, num_bit: f64) -> Cost {
        self.calls.borrow_mut().push(CircuitCall::Buffer(num_bit));
        self.cost
    }

    fn interface_width(&self) -> f64 {
        self.spec.interface_width
    }

    fn leakage(&self) -> f64 {
        self.leakage
    }
}

#[derive(Debug, Default)]
struct FixedInterconnect {
    spec: InterconnectSpec,
    area: f64,
    cost: Cost,
    calls: CallLog,
}

impl Interconnect for FixedInterconnect {
    fn initialize(&mut self, spec: InterconnectSpec) {
        self.spec = spec;
    }

    fn calculate_area(&mut self, _pe_height: f64, _pe_width: f64, _fold: usize) -> f64 {
        self.area
    }

    fn calculate_cost(&mut self, _pe_height: f64, _pe_width: f64, num_read: f64) -> Cost {
        self.calls
            .borrow_mut()
            .push(CircuitCall::Interconnect(num_read));
        self.cost
    }

    fn bus_width(&self) -> f64 {
        self.spec.bus_width
    }
}

#[derive(Debug)]
struct FixedActivation {
    spec: Option<ActivationSpec>,
    area: f64,
    cost: Cost,
    calls: CallLog,
}

impl ActivationUnit for FixedActivation {
    fn initialize(&mut self, spec: ActivationSpec) {
        self.spec = Some(spec);
    }

    fn calculate_area(&mut self, _height: Option<f64>, _width: Option<f64>) -> f64 {
        self.area
    }

    fn calculate_cost(&mut self, num_read: f64) -> Cost {
        self.calls
            .borrow_mut()
            .push(CircuitCall::Activation(num_read));
        self.cost
    }

    fn lanes(&self) -> usize {
        match self.spec {
            Some(ActivationSpec::ReLu { num_unit, .. }) => num_unit,
            Some(ActivationSpec::Sigmoid { num_entry, .. }) => num_entry,
            None => 1,
        }
    }

    fn output_bits(&self) -> usize {
        match self.spec {
            Some(ActivationSpec::ReLu { num_bit, .. }) => num_bit,
            Some(ActivationSpec::Sigmoid { num_y_bit, .. }) => num_y_bit,
            None => 0,
        }
    }
}

impl CircuitFactory for FixedCircuits {
    fn accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(FixedAccumulator {
            area: self.area,
            leakage: self.leakage,
            cost: self.accumulation,
            calls: self.calls.clone(),
            ..Default::default()
        })
    }

    fn buffer(&self) -> Box<dyn Buffer> {
        Box::new(FixedBuffer {
            area: self.area,
            leakage: self.leakage,
            cost: self.buffer,
            calls: self.calls.clone(),
            ..Default::default()
        })
    }

    fn interconnect(&self) -> Box<dyn Interconnect> {
        Box::new(FixedInterconnect {
            area: self.area,
            cost: self.interconnect,
            calls: self.calls.clone(),
            ..Default::default()
        })
    }

    fn activation(&self, _relu: bool) -> Box<dyn ActivationUnit> {
        Box::new(FixedActivation {
            spec: None,
            area: self.area,
            cost: self.activation,
            calls: self.calls.clone(),
        })
    }
}

/// alternates 0, 1, 0, 1...
#[derive(Debug, Default)]
pub struct AlternatingBits(bool);

impl RandomSource for AlternatingBits {
    fn next_bit(&mut self) -> bool {
        self.0 = !self.0;
        !self.0
    }
}
