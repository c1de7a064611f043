//! Area classification and traversal flags

use navmesh_grid::{QueryFilter, MAX_AREAS};
use serde::{Deserialize, Serialize};

/// Traversal flags; a query visits nodes carrying at least one requested flag
pub use navmesh_grid::NodeFlags as Flags;

/// Classification attached to every triangle and terrain cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum AreaType {
    /// Solid but never walkable
    Null = 0,
    Water = 1,
    Door = 2,
    Pathgrid = 3,
    Ground = 63,
}

impl AreaType {
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(AreaType::Null),
            1 => Some(AreaType::Water),
            2 => Some(AreaType::Door),
            3 => Some(AreaType::Pathgrid),
            63 => Some(AreaType::Ground),
            _ => None,
        }
    }

    /// Flags a node of this area carries
    pub fn flags(self) -> Flags {
        match self {
            AreaType::Null => Flags::empty(),
            AreaType::Water => Flags::SWIM,
            AreaType::Door => Flags::DOOR,
            AreaType::Pathgrid => Flags::PATHGRID,
            AreaType::Ground => Flags::WALK,
        }
    }
}

/// Per-area flag table indexed by area id
pub fn area_flags_table() -> Vec<Flags> {
    (0..MAX_AREAS as u8)
        .map(|id| AreaType::from_id(id).map_or(Flags::empty(), AreaType::flags))
        .collect()
}

/// Traversal cost multipliers per medium
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaCosts {
    pub swim: f32,
    pub walk: f32,
    pub door: f32,
    pub pathgrid: f32,
}

impl Default for AreaCosts {
    fn default() -> Self {
        Self {
            swim: 1.0,
            walk: 1.0,
            door: 2.0,
            pathgrid: 1.0,
        }
    }
}

/// Query filter for the given flags and costs
pub fn make_query_filter(include_flags: Flags, costs: &AreaCosts) -> QueryFilter {
    QueryFilter::new(include_flags)
        .with_area_cost(AreaType::Water.id(), costs.swim)
        .with_area_cost(AreaType::Door.id(), costs.door)
        .with_area_cost(AreaType::Pathgrid.id(), costs.pathgrid)
        .with_area_cost(AreaType::Ground.id(), costs.walk)
}
