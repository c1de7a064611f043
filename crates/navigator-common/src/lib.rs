//! Common utilities and data structures shared by the grid navmesh and the navigator

mod geometry;
mod mesh;

pub use geometry::*;
pub use mesh::ObjMesh;

/// Represents a 3D position. The world is Z-up; X and Y are horizontal.
pub type Vec3 = glam::Vec3;

/// Error types for the library
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid input geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("navmesh tile generation failed: {0}")]
    Generation(String),

    #[error("tile cache error: {0}")]
    Cache(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for navigator operations
pub type Result<T> = std::result::Result<T, Error>;
