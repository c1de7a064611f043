//! Debug dumps of RecastMeshes

use crate::generator::TileGeometry;
use crate::recast_mesh::RecastMesh;
use crate::settings::RecastSettings;
use crate::tile_position::TilePosition;
use glam::Vec3;
use navigator_common::{ObjMesh, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

/// File a tile's RecastMesh is dumped to
pub fn recast_mesh_dump_path(prefix: &str, tile: TilePosition) -> PathBuf {
    PathBuf::from(format!("{prefix}{}_{}.obj", tile.x, tile.y))
}

/// Triangles of a RecastMesh with terrain triangulated
pub fn recast_mesh_to_obj(settings: &RecastSettings, tile: TilePosition, mesh: &RecastMesh) -> ObjMesh {
    let geometry = TileGeometry::from_recast_mesh(settings, tile, mesh);
    ObjMesh {
        vertices: geometry.vertices.chunks_exact(3).map(Vec3::from_slice).collect(),
        indices: geometry.indices,
    }
}

/// Writes a RecastMesh as Wavefront OBJ to `<prefix><x>_<y>.obj`
pub fn write_recast_mesh_obj(
    settings: &RecastSettings,
    prefix: &str,
    tile: TilePosition,
    mesh: &RecastMesh,
) -> Result<PathBuf> {
    let path = recast_mesh_dump_path(prefix, tile);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(&path)?);
    writeln_header(&mut writer, mesh)?;
    recast_mesh_to_obj(settings, tile, mesh).write_obj(&mut writer)?;
    Ok(path)
}

fn writeln_header(writer: &mut impl std::io::Write, mesh: &RecastMesh) -> Result<()> {
    let version = mesh.version();
    writeln!(
        writer,
        "# recast mesh generation {} revision {}, {} water",
        version.generation,
        version.revision,
        mesh.water().len()
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area_type::AreaType;
    use crate::recast_mesh::Version;
    use crate::recast_mesh_builder::RecastMeshBuilder;
    use crate::shapes::CollisionGeometry;
    use crate::test_helpers::TempDir;
    use crate::tile_position::TileBounds;
    use glam::{Affine3A, IVec2, Vec2};

    #[test]
    fn test_dump_path() {
        assert_eq!(
            recast_mesh_dump_path("dump/mesh_", IVec2::new(-1, 2)),
            PathBuf::from("dump/mesh_-1_2.obj")
        );
    }

    #[test]
    fn test_write_recast_mesh_obj() {
        let dir = TempDir::new("recast_mesh_obj");
        let mut builder = RecastMeshBuilder::new(TileBounds::new(Vec2::splat(-10.0), Vec2::splat(10.0)));
        builder.add_object(
            &CollisionGeometry::Box { half_extents: Vec3::ONE },
            &Affine3A::IDENTITY,
            AreaType::Ground,
        );
        let mesh = builder.create(Version::new(1, 3));
        let prefix = format!("{}/", dir.path().display());
        let path = write_recast_mesh_obj(&RecastSettings::default(), &prefix, IVec2::ZERO, &mesh).unwrap();

        let obj = ObjMesh::from_obj(&path).unwrap();
        assert_eq!(obj.vertices.len(), 8);
        assert_eq!(obj.triangle_count(), 12);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# recast mesh generation 1 revision 3"));
    }
}
