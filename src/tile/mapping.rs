use std::fmt::Display;

use enum_as_inner::EnumAsInner;
use serde::{Deserialize, Serialize};

use super::config::{MappingMode, TileGeometry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Duplication {
    /// every PE holds the whole matrix
    Full,
    /// fewer copies than PEs, each distinct block is estimated once
    Partial,
}

/// the way one estimation call spreads the weights over the PEs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumAsInner)]
pub enum MappingRegime {
    /// one decoder layer on digital PEs, six serialized stages
    Digital,
    /// grid partition, no duplication
    ConventionalSerial,
    ConventionalDuplicated(Duplication),
    /// row bands only, one per PE
    Novel,
}

impl MappingRegime {
    /// digital wins over the mapping mode, duplication only matters for conventional mapping
    pub fn select(geometry: &TileGeometry) -> Self {
        if geometry.digital {
            return Self::Digital;
        }
        match geometry.mapping {
            MappingMode::Novel => Self::Novel,
            MappingMode::Conventional if geometry.speed_up() <= 1 => Self::ConventionalSerial,
            MappingMode::Conventional
                if geometry.speed_up_row >= geometry.num_pe
                    && geometry.speed_up_col >= geometry.num_pe =>
            {
                Self::ConventionalDuplicated(Duplication::Full)
            }
            MappingMode::Conventional => Self::ConventionalDuplicated(Duplication::Partial),
        }
    }
}

impl Display for MappingRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MappingRegime::Digital => write!(f, "digital"),
            MappingRegime::ConventionalSerial => write!(f, "conventional"),
            MappingRegime::ConventionalDuplicated(Duplication::Full) => {
                write!(f, "conventional-full-duplication")
            }
            MappingRegime::ConventionalDuplicated(Duplication::Partial) => {
                write!(f, "conventional-partial-duplication")
            }
            MappingRegime::Novel => write!(f, "novel"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(speed_up_row: usize, speed_up_col: usize) -> TileGeometry {
        TileGeometry {
            num_pe: 4,
            speed_up_row,
            speed_up_col,
            ..Default::default()
        }
    }

    #[test]
    fn selection() {
        assert_eq!(
            MappingRegime::select(&geometry(1, 1)),
            MappingRegime::ConventionalSerial
        );
        assert_eq!(
            MappingRegime::select(&geometry(4, 8)),
            MappingRegime::ConventionalDuplicated(Duplication::Full)
        );
        let partial = MappingRegime::select(&geometry(8, 2));
        assert_eq!(partial.as_conventional_duplicated(), Some(&Duplication::Partial));

        let novel = TileGeometry {
            mapping: MappingMode::Novel,
            ..geometry(4, 4)
        };
        assert!(MappingRegime::select(&novel).is_novel());

        let digital = TileGeometry {
            digital: true,
            ..novel
        };
        assert!(MappingRegime::select(&digital).is_digital());
        assert_eq!(MappingRegime::Digital.to_string(), "digital");
    }
}
