//! Node flags and query filtering

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Number of distinct area ids a filter can weight.
pub const MAX_AREAS: usize = 64;

bitflags! {
    /// Traversal flags carried by every walkable node
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct NodeFlags: u16 {
        /// Walkable on foot
        const WALK = 0x01;
        /// Swimmable water surface
        const SWIM = 0x02;
        /// Door that can be opened
        const DOOR = 0x04;
        /// Node covered by a scripted path grid
        const PATHGRID = 0x08;
    }
}

/// Filter deciding which nodes a query may visit and how much each area costs
#[derive(Debug, Clone)]
pub struct QueryFilter {
    /// A node passes if it has at least one of these flags
    pub include_flags: NodeFlags,
    /// A node is rejected if it has any of these flags
    pub exclude_flags: NodeFlags,
    /// Cost multiplier per area id
    pub area_cost: [f32; MAX_AREAS],
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self {
            include_flags: NodeFlags::all(),
            exclude_flags: NodeFlags::empty(),
            area_cost: [1.0; MAX_AREAS],
        }
    }
}

impl QueryFilter {
    /// Creates a filter accepting the given flags at unit cost
    pub fn new(include_flags: NodeFlags) -> Self {
        Self {
            include_flags,
            ..Default::default()
        }
    }

    /// Sets the traversal cost of one area id
    pub fn with_area_cost(mut self, area: u8, cost: f32) -> Self {
        if let Some(slot) = self.area_cost.get_mut(area as usize) {
            *slot = cost;
        }
        self
    }

    /// Checks whether a node with the given flags may be visited
    #[inline]
    pub fn pass_filter(&self, flags: NodeFlags) -> bool {
        flags.intersects(self.include_flags) && !flags.intersects(self.exclude_flags)
    }

    /// Cost multiplier of an area id
    #[inline]
    pub fn cost(&self, area: u8) -> f32 {
        self.area_cost
            .get(area as usize)
            .copied()
            .unwrap_or(1.0)
    }
}
