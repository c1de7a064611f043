//! Tile generation behind a narrow interface: RecastMesh in, tile payload out

use crate::agent_bounds::AgentBounds;
use crate::area_type::AreaType;
use crate::recast_mesh::RecastMesh;
use crate::settings::RecastSettings;
use crate::tile_position::{make_real_tile_bounds_with_border, TilePosition};
use glam::{Vec2, Vec3};
use navigator_common::Result;
use navmesh_grid::{build_tile, GridTile, TileInput, WaterRect};

/// Produces the walkable payload of one tile
pub trait TileGenerator: Send + Sync {
    /// Returns `Ok(None)` when nothing in the tile is walkable
    fn generate(
        &self,
        agent: &AgentBounds,
        settings: &RecastSettings,
        tile: TilePosition,
        mesh: &RecastMesh,
    ) -> Result<Option<GridTile>>;
}

/// Generator backed by the layered walkable grid
#[derive(Debug, Clone, Copy, Default)]
pub struct GridTileGenerator;

impl TileGenerator for GridTileGenerator {
    fn generate(
        &self,
        agent: &AgentBounds,
        settings: &RecastSettings,
        tile: TilePosition,
        mesh: &RecastMesh,
    ) -> Result<Option<GridTile>> {
        let geometry = TileGeometry::from_recast_mesh(settings, tile, mesh);
        let config = agent.grid_config(settings);
        build_tile(
            &config,
            &TileInput {
                position: tile,
                vertices: &geometry.vertices,
                indices: &geometry.indices,
                areas: &geometry.areas,
                water: &geometry.water,
            },
        )
    }
}

/// Flattened triangles and water of a RecastMesh, terrain included
#[derive(Debug, Default)]
pub(crate) struct TileGeometry {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
    pub areas: Vec<u8>,
    pub water: Vec<WaterRect>,
}

impl TileGeometry {
    pub fn from_recast_mesh(settings: &RecastSettings, tile: TilePosition, mesh: &RecastMesh) -> Self {
        let mut geometry = TileGeometry {
            vertices: mesh.mesh().vertices().to_vec(),
            indices: mesh.mesh().indices().to_vec(),
            areas: mesh.mesh().area_types().iter().map(|a| a.id()).collect(),
            water: Vec::with_capacity(mesh.water().len()),
        };

        for heightfield in mesh.heightfields() {
            let base = geometry.vertex_count();
            for row in 0..heightfield.length {
                for column in 0..heightfield.width {
                    let xy = heightfield.sample_position(column, row);
                    geometry.push_vertex(xy.extend(heightfield.height(column, row)));
                }
            }
            for row in 0..heightfield.length.saturating_sub(1) {
                for column in 0..heightfield.width.saturating_sub(1) {
                    let v00 = base + row * heightfield.width + column;
                    let v10 = v00 + 1;
                    let v01 = v00 + heightfield.width;
                    let v11 = v01 + 1;
                    geometry.push_triangle([v00, v10, v11], AreaType::Ground);
                    geometry.push_triangle([v00, v11, v01], AreaType::Ground);
                }
            }
        }

        let tile_bounds = make_real_tile_bounds_with_border(settings, tile);
        for flat in mesh.flat_heightfields() {
            let (min, max) = flat.bounds();
            let Some(rect) = tile_bounds.intersection(&crate::tile_position::TileBounds::new(min, max)) else {
                continue;
            };
            geometry.push_quad(rect.min, rect.max, flat.height);
        }

        for water in mesh.water() {
            let (min, max) = water.bounds();
            geometry.water.push(WaterRect {
                min,
                max,
                level: water.water.level,
            });
        }

        geometry
    }

    fn vertex_count(&self) -> u32 {
        (self.vertices.len() / 3) as u32
    }

    fn push_vertex(&mut self, v: Vec3) {
        self.vertices.extend_from_slice(&v.to_array());
    }

    fn push_triangle(&mut self, indices: [u32; 3], area: AreaType) {
        self.indices.extend_from_slice(&indices);
        self.areas.push(area.id());
    }

    fn push_quad(&mut self, min: Vec2, max: Vec2, height: f32) {
        let base = self.vertex_count();
        self.push_vertex(Vec3::new(min.x, min.y, height));
        self.push_vertex(Vec3::new(max.x, min.y, height));
        self.push_vertex(Vec3::new(max.x, max.y, height));
        self.push_vertex(Vec3::new(min.x, max.y, height));
        self.push_triangle([base, base + 1, base + 2], AreaType::Ground);
        self.push_triangle([base, base + 2, base + 3], AreaType::Ground);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_bounds::CollisionShapeType;
    use crate::recast_mesh::{FlatHeightfield, Heightfield, Mesh, Version};
    use glam::IVec2;

    fn settings() -> RecastSettings {
        RecastSettings {
            cell_size: 0.5,
            cell_height: 0.1,
            tile_size: 16,
            border_size: 4,
            ..Default::default()
        }
    }

    fn agent() -> AgentBounds {
        AgentBounds::new(CollisionShapeType::Cylinder, Vec3::new(0.4, 0.4, 0.9))
    }

    #[test]
    fn test_heightfield_is_triangulated() {
        let heightfield = Heightfield {
            cell_position: IVec2::ZERO,
            cell_size: 8,
            length: 3,
            width: 3,
            min_x: 0,
            min_y: 0,
            original_size: 3,
            min_height: 0.0,
            max_height: 0.0,
            heights: vec![0.0; 9],
        };
        let mesh = RecastMesh::new(Version::default(), Mesh::default(), Vec::new(), vec![heightfield], Vec::new());
        let geometry = TileGeometry::from_recast_mesh(&settings(), IVec2::ZERO, &mesh);
        assert_eq!(geometry.vertices.len(), 27);
        assert_eq!(geometry.areas.len(), 8);
        assert_eq!(&geometry.indices[..6], &[0, 1, 4, 0, 4, 3]);
        assert_eq!(&geometry.vertices[12..15], &[4.0, 4.0, 0.0]);
    }

    #[test]
    fn test_flat_heightfield_is_clipped_to_tile() {
        let flat = FlatHeightfield {
            cell_position: IVec2::ZERO,
            cell_size: 1000,
            height: 2.0,
        };
        let mesh = RecastMesh::new(Version::default(), Mesh::default(), Vec::new(), Vec::new(), vec![flat]);
        let geometry = TileGeometry::from_recast_mesh(&settings(), IVec2::new(1, 1), &mesh);
        assert_eq!(&geometry.vertices[..3], &[6.0, 6.0, 2.0]);
        assert_eq!(&geometry.vertices[6..9], &[18.0, 18.0, 2.0]);
    }

    #[test]
    fn test_flat_ground_generates_tile() {
        let flat = FlatHeightfield {
            cell_position: IVec2::ZERO,
            cell_size: 1000,
            height: 0.0,
        };
        let mesh = RecastMesh::new(Version::default(), Mesh::default(), Vec::new(), Vec::new(), vec![flat]);
        let tile = GridTileGenerator
            .generate(&agent(), &settings(), IVec2::new(1, 1), &mesh)
            .unwrap()
            .unwrap();
        assert_eq!(tile.node_count(), 16 * 16);
    }
}
