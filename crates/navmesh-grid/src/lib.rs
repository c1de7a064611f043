//! Walkable grid navmesh tiles.
//!
//! Triangles and water planes are rasterized into a span grid, every span top with
//! enough clearance becomes a walkable node, and the nodes of one tile are stored
//! as a compact [`GridTile`]. Queries ([`GridQuery`]) run over any set of tiles
//! reachable through a [`TileSource`].

mod config;
mod filter;
mod heightfield;
mod query;
mod rasterization;
mod tile;

pub use config::GridConfig;
pub use filter::{NodeFlags, QueryFilter, MAX_AREAS};
pub use heightfield::{Span, SpanGrid};
pub use query::{GridQuery, NodeRef, PathResult, QueryParams, TileSource, Walk};
pub use rasterization::{clear_unwalkable_triangles, rasterize_triangle, rasterize_triangles};
pub use tile::{build_tile, GridNode, GridTile, TileInput, WaterRect};

/// Area id for spans that are never walkable.
pub const NULL_AREA: u8 = 0;
