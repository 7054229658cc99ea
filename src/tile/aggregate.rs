//! Spreading one weight matrix over the PEs of a fabric and reducing the per-PE results.
//!
//! PEs run concurrently, so read-side latencies reduce by max and energies by sum. Weight
//! updates are written one array after another, their latency sums. After the PEs, the
//! accumulation tree, the activation unit, the buffers and the H-tree add their share.

use tracing::{debug, warn};

use super::{
    config::{Param, TileGeometry},
    fabric::{Fabric, FabricKind},
    mapping::{Duplication, MappingRegime},
    matrix::{grid_partitions, row_bands, Partition, PartitionData},
    result::{training_gate, PeResult, TileResult},
    Workload,
};
use crate::{
    error::{Result, TileError},
    pe::{PeEstimator, PeRequest},
    tools::math::ceil_div,
};

pub struct Aggregator<'t, E> {
    pub estimator: &'t mut E,
    pub fabric: &'t mut Fabric,
    pub param: &'t Param,
    pub geometry: &'t TileGeometry,
}

impl<E: PeEstimator> Aggregator<'_, E> {
    pub fn run(&mut self, regime: MappingRegime, workload: &Workload<'_>) -> Result<TileResult> {
        let (mut tile, max_pe_leakage) = match regime {
            MappingRegime::ConventionalSerial => self.serial(workload)?,
            MappingRegime::ConventionalDuplicated(Duplication::Full) => {
                self.full_duplication(workload)?
            }
            MappingRegime::ConventionalDuplicated(Duplication::Partial) => {
                self.partial_duplication(workload)?
            }
            MappingRegime::Novel => self.novel(workload)?,
            MappingRegime::Digital => {
                return Err(TileError::InvalidGeometry(
                    "the digital regime has no weight partitioning".to_string(),
                ))
            }
        };
        self.post_process(&mut tile, workload, regime.is_novel());
        tile.leakage = max_pe_leakage * self.fabric.pe_count() as f64 + self.fabric.leakage();
        Ok(tile)
    }

    fn estimate(
        &mut self,
        data: &PartitionData,
        duplication: (usize, usize),
        workload: &Workload<'_>,
    ) -> PeResult {
        let (num_subarray_row, num_subarray_col) = self.fabric.pe_subarrays(self.param);
        self.estimator.estimate(&PeRequest {
            new_weights: &data.new_weights,
            old_weights: &data.old_weights,
            input: &data.input,
            novel_mapping: self.fabric.kind() == FabricKind::Novel,
            digital: false,
            row_duplication: duplication.0,
            col_duplication: duplication.1,
            num_subarray_row,
            num_subarray_col,
            layer_number: workload.layer_number,
        })
    }

    /// estimate every partition and reduce them as concurrent PEs
    fn reduce(
        &mut self,
        partitions: &[Partition],
        workload: &Workload<'_>,
    ) -> Result<(TileResult, f64)> {
        let mut tile = TileResult::default();
        let mut max_leakage = 0f64;
        for partition in partitions {
            let data = partition.extract(workload)?;
            let pe = self.estimate(&data, (1, 1), workload);
            debug!(
                row_block = partition.row_block,
                col_block = partition.col_block,
                rows = partition.rows,
                cols = partition.cols,
                read_latency = pe.read_latency,
                read_energy = pe.read_dynamic_energy,
                "pe estimated"
            );
            tile.merge_parallel(&pe);
            max_leakage = max_leakage.max(pe.leakage);
        }
        Ok((tile, max_leakage))
    }

    fn serial(&mut self, workload: &Workload<'_>) -> Result<(TileResult, f64)> {
        let (rows, cols) = workload.new_weights.shape();
        let pe_size = self.fabric.pe_size();
        let partitions = grid_partitions(rows, cols, pe_size);
        let num_pe = self.fabric.num_pe();
        if ceil_div(rows, pe_size) > num_pe || ceil_div(cols, pe_size) > num_pe {
            warn!(
                rows,
                cols,
                pe_size,
                num_pe,
                "the matrix needs more PEs than the tile holds, every block is still estimated"
            );
        }
        let (mut tile, leakage) = self.reduce(&partitions, workload)?;
        self.accumulate(&mut tile, num_pe, workload);
        Ok((tile, leakage))
    }

    /// every PE holds the whole matrix, the PE itself spreads the remaining copies
    fn full_duplication(&mut self, workload: &Workload<'_>) -> Result<(TileResult, f64)> {
        let (rows, cols) = workload.new_weights.shape();
        let whole = Partition {
            row_block: 0,
            col_block: 0,
            row_start: 0,
            col_start: 0,
            rows,
            cols,
        };
        let data = whole.extract(workload)?;
        let num_pe = self.fabric.num_pe();
        let duplication = (
            ceil_div(self.geometry.speed_up_row, num_pe),
            ceil_div(self.geometry.speed_up_col, num_pe),
        );
        let pe = self.estimate(&data, duplication, workload);
        debug!(?duplication, read_latency = pe.read_latency, "fully duplicated pe");
        Ok((
            TileResult::duplicated(&pe, (num_pe * num_pe) as f64),
            pe.leakage,
        ))
    }

    fn partial_duplication(&mut self, workload: &Workload<'_>) -> Result<(TileResult, f64)> {
        let (rows, cols) = workload.new_weights.shape();
        let pe_size = self.fabric.pe_size();
        let partitions = grid_partitions(rows, cols, pe_size);
        let (mut tile, leakage) = self.reduce(&partitions, workload)?;
        tile.speed_up_reads(self.geometry.speed_up() as f64);
        // a single row-group has no partial sums to merge
        let row_groups = ceil_div(rows, pe_size);
        if row_groups > 1 {
            self.accumulate(&mut tile, row_groups, workload);
        }
        Ok((tile, leakage))
    }

    fn novel(&mut self, workload: &Workload<'_>) -> Result<(TileResult, f64)> {
        let (rows, cols) = workload.new_weights.shape();
        let num_pe = self.fabric.num_pe();
        let bands = row_bands(rows, cols, num_pe, self.fabric.pe_size());
        if bands.iter().map(|band| band.rows).sum::<usize>() < rows {
            warn!(
                rows,
                num_pe,
                pe_size = self.fabric.pe_size(),
                "the row bands do not cover the matrix, the remaining rows are not estimated"
            );
        }
        let (mut tile, leakage) = self.reduce(&bands, workload)?;
        let speed_up = self.geometry.speed_up() as f64;
        tile.speed_up_reads(speed_up);
        // every copy is written
        tile.write_dynamic_energy_wu *= speed_up;
        self.accumulate(&mut tile, num_pe, workload);
        Ok((tile, leakage))
    }

    /// bit-serial reads of the accumulated column groups
    fn read_count(&self, workload: &Workload<'_>) -> f64 {
        let param = self.param;
        ((workload.num_vectors() / param.num_bit_input)
            * ceil_div(param.num_col_muxed, param.num_col_per_synapse)) as f64
    }

    fn accumulate(&mut self, tile: &mut TileResult, num_add: usize, workload: &Workload<'_>) {
        let num_read = self.read_count(workload);
        let cost = self.fabric.accumulation.calculate_cost(num_read, num_add);
        debug!(num_read, num_add, latency = cost.read_latency, "accumulation");
        tile.add_accumulation(
            &cost,
            training_gate(self.param.training_estimation, workload.layer_number),
        );
    }

    fn post_process(&mut self, tile: &mut TileResult, workload: &Workload<'_>, novel: bool) {
        let param = self.param;
        let (rows, cols) = workload.new_weights.shape();
        let num_vectors = workload.num_vectors() as f64;
        let num_pe = self.fabric.num_pe() as f64;
        let gate = training_gate(param.training_estimation, workload.layer_number);

        let num_read = self.read_count(workload);
        if let Some(unit) = self.fabric.activation.as_mut() {
            let lanes = unit.lanes().max(1) as f64;
            tile.add_activation(&unit.calculate_cost(num_read / lanes));
        }

        let mut output_bits = (ceil_div(cols, param.num_col_per_synapse)
            * (1 + self.fabric.output_value_bits())) as f64
            * num_vectors
            / param.num_bit_input as f64;
        let mut input_bits = (rows as f64) * num_vectors;
        if novel {
            output_bits /= num_pe;
            input_bits /= num_pe.sqrt();
        }

        let input = self.fabric.input_traffic(input_bits);
        let output = self.fabric.output_traffic(output_bits);
        let side = self.fabric.pe_layout_side(param);
        let pe_area = self.estimator.area(side, side);
        let interconnect =
            self.fabric
                .interconnect_traffic(pe_area.height, pe_area.width, input_bits + output_bits);
        tile.add_transfer(&input, &output, &interconnect, gate);

        if gate > 0.0 {
            let delta_bits = (rows * cols) as f64;
            let input = self.fabric.input_buffer.calculate_cost(delta_bits);
            let interconnect =
                self.fabric
                    .interconnect_traffic(pe_area.height, pe_area.width, delta_bits);
            tile.add_delta_weight_transfer(&input, &interconnect, gate);
        }
    }
}
