//! Per-PE and per-tile performance bundles and the rules used to combine them.
//!
//! Parallel components take the maximum latency, serial components take the sum,
//! energies always sum.

use derive_more::{Add, AddAssign};
use serde::{Deserialize, Serialize};

use crate::circuit::Cost;

/// latency (s) / energy (J) / leakage (W) of one estimation, split by category
#[derive(Serialize, Deserialize, Clone, Copy, Default, Debug, PartialEq, Add, AddAssign)]
pub struct PerfMetrics {
    /// forward read
    pub read_latency: f64,
    pub read_dynamic_energy: f64,
    /// activation-gradient pass
    pub read_latency_ag: f64,
    pub read_dynamic_energy_ag: f64,
    /// weight-update pass
    pub write_latency_wu: f64,
    pub write_dynamic_energy_wu: f64,

    pub buffer_latency: f64,
    pub buffer_dynamic_energy: f64,
    pub ic_latency: f64,
    pub ic_dynamic_energy: f64,

    pub core_latency_adc: f64,
    pub core_latency_accum: f64,
    pub core_latency_other: f64,
    pub core_energy_adc: f64,
    pub core_energy_accum: f64,
    pub core_energy_other: f64,

    pub read_latency_peak_fw: f64,
    pub read_dynamic_energy_peak_fw: f64,
    pub read_latency_peak_ag: f64,
    pub read_dynamic_energy_peak_ag: f64,
    pub write_latency_peak_wu: f64,
    pub write_dynamic_energy_peak_wu: f64,

    pub leakage: f64,
}

/// what the Per-PE Estimator returns for one sub-matrix
pub type PeResult = PerfMetrics;
/// the aggregated result of one tile
pub type TileResult = PerfMetrics;

/// `1.0` when the activation-gradient / weight-update passes are estimated for this layer
pub fn training_gate(training_estimation: bool, layer_number: usize) -> f64 {
    if training_estimation && layer_number != 0 {
        1.0
    } else {
        0.0
    }
}

impl PerfMetrics {
    /// fold in a PE that runs concurrently with the ones already merged
    ///
    /// read-side latencies take the max, weight-update latencies are accumulated since the
    /// arrays are written one after another in the worst case
    pub fn merge_parallel(&mut self, pe: &PeResult) {
        self.read_latency = self.read_latency.max(pe.read_latency);
        self.read_dynamic_energy += pe.read_dynamic_energy;
        self.read_latency_ag = self.read_latency_ag.max(pe.read_latency_ag);
        self.read_dynamic_energy_ag += pe.read_dynamic_energy_ag;
        self.write_latency_wu += pe.write_latency_wu;
        self.write_dynamic_energy_wu += pe.write_dynamic_energy_wu;

        self.read_latency_peak_fw = self.read_latency_peak_fw.max(pe.read_latency_peak_fw);
        self.read_dynamic_energy_peak_fw += pe.read_dynamic_energy_peak_fw;
        self.read_latency_peak_ag = self.read_latency_peak_ag.max(pe.read_latency_peak_ag);
        self.read_dynamic_energy_peak_ag += pe.read_dynamic_energy_peak_ag;
        self.write_latency_peak_wu += pe.write_latency_peak_wu;
        self.write_dynamic_energy_peak_wu += pe.write_dynamic_energy_peak_wu;

        self.buffer_latency = self.buffer_latency.max(pe.buffer_latency);
        self.buffer_dynamic_energy += pe.buffer_dynamic_energy;
        self.ic_latency = self.ic_latency.max(pe.ic_latency);
        self.ic_dynamic_energy += pe.ic_dynamic_energy;

        self.core_latency_adc = self.core_latency_adc.max(pe.core_latency_adc);
        self.core_latency_accum = self.core_latency_accum.max(pe.core_latency_accum);
        self.core_latency_other = self.core_latency_other.max(pe.core_latency_other);
        self.core_energy_adc += pe.core_energy_adc;
        self.core_energy_accum += pe.core_energy_accum;
        self.core_energy_other += pe.core_energy_other;

        self.leakage = self.leakage.max(pe.leakage);
    }

    /// fold in a stage that runs after the ones already merged, `copies` identical matrices
    /// are charged energy but share the latency
    pub fn merge_serial(&mut self, pe: &PeResult, copies: f64) {
        self.read_latency += pe.read_latency;
        self.read_dynamic_energy += pe.read_dynamic_energy * copies;
        self.read_latency_ag += pe.read_latency_ag;
        self.read_dynamic_energy_ag += pe.read_dynamic_energy_ag * copies;

        self.buffer_latency += pe.buffer_latency;
        self.buffer_dynamic_energy += pe.buffer_dynamic_energy * copies;
        self.ic_latency += pe.ic_latency;
        self.ic_dynamic_energy += pe.ic_dynamic_energy * copies;

        self.core_latency_adc += pe.core_latency_adc;
        self.core_latency_accum += pe.core_latency_accum;
        self.core_latency_other += pe.core_latency_other;
        self.core_energy_adc += pe.core_energy_adc * copies;
        self.core_energy_accum += pe.core_energy_accum * copies;
        self.core_energy_other += pe.core_energy_other * copies;

        self.leakage += pe.leakage * copies;
    }

    /// divide every read-side latency by the replication speed-up
    pub fn speed_up_reads(&mut self, factor: f64) {
        self.read_latency /= factor;
        self.read_latency_ag /= factor;
        self.read_latency_peak_fw /= factor;
        self.read_latency_peak_ag /= factor;
        self.core_latency_adc /= factor;
        self.core_latency_accum /= factor;
        self.core_latency_other /= factor;
        self.buffer_latency /= factor;
        self.ic_latency /= factor;
    }

    /// a single PE result standing for `copies` duplicated PEs holding the same weights:
    /// reads get faster, every copy still has to be written
    pub fn duplicated(pe: &PeResult, copies: f64) -> Self {
        let mut tile = Self {
            write_latency_wu: pe.write_latency_wu * copies,
            write_dynamic_energy_wu: pe.write_dynamic_energy_wu * copies,
            write_latency_peak_wu: pe.write_latency_peak_wu * copies,
            write_dynamic_energy_peak_wu: pe.write_dynamic_energy_peak_wu * copies,
            ..*pe
        };
        tile.speed_up_reads(copies);
        tile
    }

    /// the accumulation tree merging partial sums of different row-groups
    pub fn add_accumulation(&mut self, cost: &Cost, gate: f64) {
        let latency = cost.read_latency;
        let energy = cost.read_dynamic_energy;
        self.read_latency += latency;
        self.read_latency_ag += latency * gate;
        self.read_latency_peak_fw += latency;
        self.read_latency_peak_ag += latency * gate;
        self.read_dynamic_energy += energy;
        self.read_dynamic_energy_ag += energy * gate;
        self.read_dynamic_energy_peak_fw += energy;
        self.read_dynamic_energy_peak_ag += energy * gate;
        self.core_latency_accum += latency * (1.0 + gate);
        self.core_energy_accum += energy * (1.0 + gate);
    }

    /// the activation unit only runs in the forward pass
    pub fn add_activation(&mut self, cost: &Cost) {
        self.read_latency += cost.read_latency;
        self.read_dynamic_energy += cost.read_dynamic_energy;
        self.read_latency_peak_fw += cost.read_latency;
        self.read_dynamic_energy_peak_fw += cost.read_dynamic_energy;
        self.core_latency_other += cost.read_latency;
        self.core_energy_other += cost.read_dynamic_energy;
    }

    /// buffer and interconnect traffic of one pass, charged to the forward pass and,
    /// scaled by `gate`, to the activation-gradient pass
    pub fn add_transfer(&mut self, input: &Cost, output: &Cost, interconnect: &Cost, gate: f64) {
        let buffer_latency = input.latency() + output.latency();
        let buffer_energy = input.energy() + output.energy();
        for scale in [1.0, gate] {
            self.buffer_latency += buffer_latency * scale;
            self.buffer_dynamic_energy += buffer_energy * scale;
            self.ic_latency += interconnect.read_latency * scale;
            self.ic_dynamic_energy += interconnect.read_dynamic_energy * scale;
        }
        self.read_latency += buffer_latency + interconnect.read_latency;
        self.read_dynamic_energy += buffer_energy + interconnect.read_dynamic_energy;
        self.read_latency_ag += (buffer_latency + interconnect.read_latency) * gate;
        self.read_dynamic_energy_ag += (buffer_energy + interconnect.read_dynamic_energy) * gate;
    }

    /// moving the weight deltas into the arrays for the weight-update pass
    pub fn add_delta_weight_transfer(&mut self, input: &Cost, interconnect: &Cost, gate: f64) {
        let latency = input.latency() + interconnect.read_latency;
        let energy = input.energy() + interconnect.read_dynamic_energy;
        self.write_latency_wu += latency * gate;
        self.write_dynamic_energy_wu += energy * gate;
        self.buffer_latency += input.latency() * gate;
        self.buffer_dynamic_energy += input.energy() * gate;
        self.ic_latency += interconnect.read_latency * gate;
        self.ic_dynamic_energy += interconnect.read_dynamic_energy * gate;
    }

    /// energy of all three passes
    pub fn total_energy(&self) -> f64 {
        self.read_dynamic_energy + self.read_dynamic_energy_ag + self.write_dynamic_energy_wu
    }

    pub fn total_latency(&self) -> f64 {
        self.read_latency + self.read_latency_ag + self.write_latency_wu
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pe(latency: f64, energy: f64) -> PeResult {
        PeResult {
            read_latency: latency,
            read_dynamic_energy: energy,
            write_latency_wu: latency,
            write_dynamic_energy_wu: energy,
            read_latency_peak_fw: latency,
            leakage: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn parallel_merge_maxes_latency_and_sums_energy() {
        let mut tile = TileResult::default();
        for (l, e) in [(10.0, 5.0), (30.0, 5.0), (20.0, 5.0)] {
            tile.merge_parallel(&pe(l, e));
        }
        assert_eq!(tile.read_latency, 30.0);
        assert_eq!(tile.read_latency_peak_fw, 30.0);
        assert_eq!(tile.read_dynamic_energy, 15.0);
        // writes are serialized
        assert_eq!(tile.write_latency_wu, 60.0);
        assert_eq!(tile.write_dynamic_energy_wu, 15.0);
        assert_eq!(tile.leakage, 1.0);
    }

    #[test]
    fn duplication_speeds_reads_and_multiplies_writes() {
        let tile = TileResult::duplicated(&pe(16.0, 3.0), 4.0);
        assert_eq!(tile.read_latency, 4.0);
        assert_eq!(tile.read_dynamic_energy, 3.0);
        assert_eq!(tile.write_latency_wu, 64.0);
        assert_eq!(tile.write_dynamic_energy_wu, 12.0);
    }

    #[test]
    fn gated_accumulation() {
        let cost = Cost {
            read_latency: 2.0,
            read_dynamic_energy: 3.0,
            ..Default::default()
        };
        let mut off = TileResult::default();
        off.add_accumulation(&cost, training_gate(false, 3));
        assert_eq!(off.read_latency, 2.0);
        assert_eq!(off.read_latency_ag, 0.0);
        assert_eq!(off.core_latency_accum, 2.0);

        let mut on = TileResult::default();
        on.add_accumulation(&cost, training_gate(true, 3));
        assert_eq!(on.read_latency_ag, on.read_latency);
        assert_eq!(on.read_dynamic_energy_peak_ag, 3.0);
        assert_eq!(on.core_energy_accum, 6.0);

        assert_eq!(training_gate(true, 0), 0.0);
    }

    #[test]
    fn serial_merge_counts_fused_copies() {
        let mut tile = TileResult::default();
        tile.merge_serial(&pe(1.0, 2.0), 3.0);
        tile.merge_serial(&pe(1.0, 2.0), 1.0);
        assert_eq!(tile.read_latency, 2.0);
        assert_eq!(tile.read_dynamic_energy, 8.0);
        assert_eq!(tile.leakage, 4.0);
    }
}
