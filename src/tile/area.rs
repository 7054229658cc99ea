use serde::{Deserialize, Serialize};
use tracing::debug;

use super::fabric::Fabric;
use crate::{pe::PeArea, tools::math::ceil_sqrt};

/// area (m²) breakdown of one tile, `total` is the sum of the five categories
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct TileArea {
    pub total: f64,
    pub interconnect: f64,
    pub adc: f64,
    pub accumulation: f64,
    /// buffers, activation and PE periphery
    pub other: f64,
    pub array: f64,
    /// side of the square footprint
    pub height: f64,
    pub width: f64,
}

impl TileArea {
    pub fn show_results(&self) {
        println!("total area: {:e} m^2", self.total);
        println!("footprint: {:e} x {:e} m", self.height, self.width);
        println!("interconnect: {:e}", self.interconnect);
        println!("adc: {:e}", self.adc);
        println!("accumulation: {:e}", self.accumulation);
        println!("other: {:e}", self.other);
        println!("array: {:e}", self.array);
    }
}

/// place `fabric.pe_count()` PEs of footprint `pe` together with the shared components
pub fn compose(fabric: &mut Fabric, pe: &PeArea) -> TileArea {
    let num_pe = fabric.pe_count();
    let side = ceil_sqrt(num_pe) as f64;
    let num_pe = num_pe as f64;

    let accumulation = fabric.accumulation.calculate_area(None, Some(side * pe.width));
    let activation = fabric
        .activation
        .as_mut()
        .map(|unit| unit.calculate_area(None, Some(side * pe.width)))
        .unwrap_or(0.0);
    let input_buffer = fabric.input_buffer.calculate_area(Some(side * pe.height), None)
        * fabric.sizing.num_in_buffer_core as f64;
    let output_buffer = fabric.output_buffer.calculate_area(None, Some(side * pe.width))
        * fabric.sizing.num_out_buffer_core as f64;
    let interconnect = fabric.interconnect.calculate_area(pe.height, pe.width, 16);

    let adc = pe.adc * num_pe;
    let accumulation = pe.accumulation * num_pe + accumulation;
    let other = pe.other * num_pe + input_buffer + output_buffer + activation;
    let array = pe.array * num_pe;
    let total = interconnect + adc + accumulation + other + array;
    let height = total.sqrt();
    let width = if height > 0.0 { total / height } else { 0.0 };
    debug!(total, interconnect, adc, accumulation, other, array, "tile area");

    TileArea {
        total,
        interconnect,
        adc,
        accumulation,
        other,
        array,
        height,
        width,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test_helpers::FixedCircuits,
        tile::{config::Param, fabric::FabricKind},
    };

    fn pe_area() -> PeArea {
        PeArea {
            height: 2e-4,
            width: 3e-4,
            buffer: 1e-9,
            adc: 1e-8,
            accumulation: 2e-8,
            other: 3e-8,
            array: 4e-8,
        }
    }

    #[test]
    fn total_is_the_sum_of_its_parts() {
        let circuits = FixedCircuits {
            area: 7e-9,
            ..Default::default()
        };
        for kind in [FabricKind::Conventional, FabricKind::Novel] {
            let mut fabric = Fabric::new(kind, 4, 256, &Param::default(), &circuits).unwrap();
            let area = compose(&mut fabric, &pe_area());
            let sum = area.interconnect + area.adc + area.accumulation + area.other + area.array;
            assert!((area.total - sum).abs() <= 1e-9 * area.total);
            assert!((area.height * area.width - area.total).abs() <= 1e-9 * area.total);
        }
    }

    #[test]
    fn buffers_scale_with_bank_count() {
        let circuits = FixedCircuits {
            area: 1.0,
            ..Default::default()
        };
        let mut fabric =
            Fabric::new(FabricKind::Conventional, 4, 256, &Param::default(), &circuits).unwrap();
        let area = compose(&mut fabric, &PeArea::default());
        // input banks + output banks + activation unit, all 1.0 each
        let banks = fabric.sizing.num_in_buffer_core + fabric.sizing.num_out_buffer_core;
        assert_eq!(area.other, banks as f64 + 1.0);
        assert_eq!(area.accumulation, 1.0);
        assert_eq!(area.interconnect, 1.0);
        assert_eq!(area.array, 0.0);
    }
}
