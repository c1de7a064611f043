//! CLI utility for building navmesh tiles and querying them

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use glam::{IVec2, Vec3};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use detour_navigator::{
    AgentBounds, AreaCosts, CollisionGeometry, CollisionShapeType, Flags, HeightfieldShape,
    LogLoadingListener, Navigator, NavigatorSettings, ObjectId, ObjectShapes, ObjectTransform,
    Status, WaitConditionType,
};
use navigator_common::ObjMesh;

/// Side of one generated terrain cell
const TERRAIN_CELL_SIZE: i32 = 64;

/// A CLI utility for the tiled navmesh navigator
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(ClapArgs, Debug)]
struct SceneArgs {
    /// Input mesh file (OBJ format); a flat terrain is generated when omitted
    #[clap(long, value_parser)]
    input: Option<PathBuf>,

    /// Navigator settings (JSON); missing fields keep their defaults
    #[clap(long, value_parser)]
    settings: Option<PathBuf>,

    /// Tile database reused across runs
    #[clap(long, value_parser)]
    db: Option<PathBuf>,

    /// Worker threads; zero builds tiles on the main thread
    #[clap(long)]
    threads: Option<usize>,

    /// Agent half extents (x,y,z)
    #[clap(long, value_parser = parse_vector, default_value = "0.3,0.3,0.9")]
    agent: Vec3,

    /// Generated terrain radius, in cells around the origin
    #[clap(long, default_value = "1")]
    terrain_cells: i32,

    /// Player position (x,y,z); defaults to the scene center
    #[clap(long, value_parser = parse_vector)]
    player: Option<Vec3>,

    /// Writes every built tile's input geometry as OBJ files with this prefix
    #[clap(long)]
    dump_recast_mesh: Option<String>,

    /// Let the agent swim as well as walk
    #[clap(long)]
    swim: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build every tile around the player and report statistics
    Build {
        #[clap(flatten)]
        scene: SceneArgs,
    },

    /// Find a path
    FindPath {
        #[clap(flatten)]
        scene: SceneArgs,

        /// Start position (x,y,z)
        #[clap(long, value_parser = parse_vector)]
        start: Vec3,

        /// End position (x,y,z)
        #[clap(long, value_parser = parse_vector)]
        end: Vec3,

        /// Distance from the end that still counts as arrived
        #[clap(long, default_value = "0.0")]
        end_tolerance: f32,

        /// Output path file
        #[clap(long, value_parser)]
        output: Option<PathBuf>,
    },

    /// Cast a ray along the navmesh surface
    Raycast {
        #[clap(flatten)]
        scene: SceneArgs,

        #[clap(long, value_parser = parse_vector)]
        start: Vec3,

        #[clap(long, value_parser = parse_vector)]
        end: Vec3,
    },

    /// Snap a position onto the navmesh
    Nearest {
        #[clap(flatten)]
        scene: SceneArgs,

        #[clap(long, value_parser = parse_vector)]
        position: Vec3,

        /// Search box half extents (x,y,z)
        #[clap(long, value_parser = parse_vector, default_value = "2,2,4")]
        extents: Vec3,
    },

    /// Pick random reachable points around a center
    Random {
        #[clap(flatten)]
        scene: SceneArgs,

        #[clap(long, value_parser = parse_vector)]
        center: Vec3,

        #[clap(long, default_value = "10.0")]
        radius: f32,

        #[clap(long, default_value = "1")]
        count: usize,

        #[clap(long)]
        seed: Option<u64>,
    },
}

/// Parse a comma-separated vector
fn parse_vector(s: &str) -> Result<Vec3, String> {
    let parts: Vec<&str> = s.split(',').collect();

    if parts.len() != 3 {
        return Err(format!(
            "Vector must have 3 components, got {}",
            parts.len()
        ));
    }

    let x = parts[0].trim().parse::<f32>().map_err(|e| e.to_string())?;
    let y = parts[1].trim().parse::<f32>().map_err(|e| e.to_string())?;
    let z = parts[2].trim().parse::<f32>().map_err(|e| e.to_string())?;

    Ok(Vec3::new(x, y, z))
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Build { scene } => build(&scene),
        Commands::FindPath {
            scene,
            start,
            end,
            end_tolerance,
            output,
        } => find_path(&scene, start, end, end_tolerance, output.as_deref()),
        Commands::Raycast { scene, start, end } => raycast(&scene, start, end),
        Commands::Nearest {
            scene,
            position,
            extents,
        } => nearest(&scene, position, extents),
        Commands::Random {
            scene,
            center,
            radius,
            count,
            seed,
        } => random(&scene, center, radius, count, seed),
    }
}

/// Navigator with the scene loaded and every tile around the player built
struct Scene {
    navigator: Navigator,
    agent: AgentBounds,
    flags: Flags,
}

impl SceneArgs {
    fn load_settings(&self) -> Result<NavigatorSettings> {
        let mut settings = match &self.settings {
            Some(path) => {
                let json = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read settings: {}", path.display()))?;
                NavigatorSettings::from_json_str(&json)
                    .with_context(|| format!("Invalid settings file: {}", path.display()))?
            }
            None => NavigatorSettings::default(),
        };
        if let Some(threads) = self.threads {
            settings = settings.with_threads(threads);
        }
        if let Some(db) = &self.db {
            settings = settings.with_nav_mesh_db(db.clone(), true);
        }
        if let Some(prefix) = &self.dump_recast_mesh {
            settings = settings.with_recast_mesh_dump(prefix.clone());
        }
        Ok(settings)
    }

    fn load(&self, player_hint: Option<Vec3>) -> Result<Scene> {
        let settings = self.load_settings()?;
        let navigator = Navigator::new(settings).context("Failed to create navigator")?;

        let agent = AgentBounds::new(CollisionShapeType::Cylinder, self.agent);
        if !navigator.add_agent(agent) {
            bail!("Agent {:?} is too small for the configured cell height", self.agent);
        }

        let mut guard = navigator.make_update_guard();
        let center = match &self.input {
            Some(input) => {
                println!("Loading mesh from {}...", input.display());
                let mesh = ObjMesh::from_obj(input)
                    .with_context(|| format!("Failed to load mesh: {}", input.display()))?;
                let (bmin, bmax) = mesh
                    .bounds()
                    .ok_or_else(|| anyhow!("Mesh {} has no vertices", input.display()))?;
                println!(
                    "Mesh loaded: {} vertices, {} triangles",
                    mesh.vertices.len(),
                    mesh.triangle_count()
                );
                let shape = Arc::new(CollisionGeometry::TriangleMesh {
                    vertices: mesh.vertices,
                    indices: mesh.indices,
                });
                navigator.add_object(
                    ObjectId(0),
                    ObjectShapes::new(shape, ObjectTransform::default()),
                    Some(&mut guard),
                );
                (bmin + bmax) * 0.5
            }
            None => {
                let r = self.terrain_cells.max(0);
                for x in -r..r {
                    for y in -r..r {
                        navigator.add_heightfield(
                            IVec2::new(x, y),
                            TERRAIN_CELL_SIZE,
                            HeightfieldShape::Plane { height: 0.0 },
                            Some(&mut guard),
                        );
                    }
                }
                println!(
                    "Generated flat terrain: {}x{} cells of {} units",
                    2 * r,
                    2 * r,
                    TERRAIN_CELL_SIZE
                );
                Vec3::ZERO
            }
        };

        let player = self.player.or(player_hint).unwrap_or(center);
        println!("Building navmesh tiles around {:?}...", player);
        navigator.update(player, Some(guard));
        let mut listener = LogLoadingListener::default();
        navigator.wait(WaitConditionType::AllJobsDone, Some(&mut listener));

        let flags = if self.swim {
            Flags::WALK | Flags::SWIM
        } else {
            Flags::WALK
        };
        Ok(Scene {
            navigator,
            agent,
            flags,
        })
    }
}

fn build(scene_args: &SceneArgs) -> Result<()> {
    let scene = scene_args.load(None)?;
    let stats = scene.navigator.report_stats();

    for (agent, nav_mesh) in scene.navigator.get_nav_meshes() {
        let nav_mesh = nav_mesh.lock_const();
        println!(
            "Agent {:?} {:?}: {} tiles, version {:?}",
            agent.shape_type,
            agent.half_extents,
            nav_mesh.tile_count(),
            nav_mesh.version()
        );
    }
    println!(
        "Jobs: {} pushed, {} processed",
        stats.updater.pushed, stats.updater.processed
    );
    println!(
        "Tiles cache: {} entries, {} hits of {} gets",
        stats.updater.tiles_cache.entries,
        stats.updater.tiles_cache.hits,
        stats.updater.tiles_cache.get_count
    );
    if let Some(db) = stats.updater.db {
        println!(
            "Tile DB: {} hits of {} reads, {} writes",
            db.hits, db.reads, db.writes
        );
    }

    Ok(())
}

fn find_path(
    scene_args: &SceneArgs,
    start: Vec3,
    end: Vec3,
    end_tolerance: f32,
    output: Option<&Path>,
) -> Result<()> {
    let scene = scene_args.load(Some(start))?;

    println!("Finding path from {:?} to {:?}...", start, end);

    let mut path = Vec::new();
    let status = scene.navigator.find_path(
        &scene.agent,
        start,
        end,
        scene.flags,
        &AreaCosts::default(),
        end_tolerance,
        &mut path,
    );
    match status {
        Status::Success => println!("Found path with {} waypoints", path.len()),
        Status::PartialPath => println!(
            "End is unreachable; partial path with {} waypoints",
            path.len()
        ),
        Status::StartPolygonNotFound => bail!("Start {:?} is not on the navmesh", start),
        Status::NavMeshNotFound => bail!("No navmesh for agent {:?}", scene.agent.half_extents),
    }

    if let Some(output_path) = output {
        println!("Saving path to {}...", output_path.display());

        let mut file = File::create(output_path)
            .with_context(|| format!("Failed to create output file: {}", output_path.display()))?;

        writeln!(file, "# Path from {:?} to {:?}", start, end)?;
        writeln!(file, "# {} waypoints, {:?}", path.len(), status)?;

        for point in &path {
            writeln!(file, "{},{},{}", point.x, point.y, point.z)?;
        }
    } else {
        println!("Path:");
        for (i, point) in path.iter().enumerate() {
            println!("{}: {},{},{}", i, point.x, point.y, point.z);
        }
    }

    Ok(())
}

fn raycast(scene_args: &SceneArgs, start: Vec3, end: Vec3) -> Result<()> {
    let scene = scene_args.load(Some(start))?;
    let hit = scene
        .navigator
        .raycast(&scene.agent, start, end, scene.flags)
        .ok_or_else(|| anyhow!("Start {:?} is not on the navmesh", start))?;

    if hit == end {
        println!("Unobstructed: {},{},{}", hit.x, hit.y, hit.z);
    } else {
        println!("Hit at {},{},{}", hit.x, hit.y, hit.z);
    }
    Ok(())
}

fn nearest(scene_args: &SceneArgs, position: Vec3, extents: Vec3) -> Result<()> {
    let scene = scene_args.load(Some(position))?;
    let found = scene
        .navigator
        .find_nearest_nav_mesh_position(&scene.agent, position, extents, scene.flags)
        .ok_or_else(|| anyhow!("No navmesh within {:?} of {:?}", extents, position))?;

    println!("{},{},{}", found.x, found.y, found.z);
    Ok(())
}

fn random(
    scene_args: &SceneArgs,
    center: Vec3,
    radius: f32,
    count: usize,
    seed: Option<u64>,
) -> Result<()> {
    let scene = scene_args.load(Some(center))?;
    let mut rng = match seed {
        Some(seed) => fastrand::Rng::with_seed(seed),
        None => fastrand::Rng::new(),
    };

    for i in 0..count {
        let point = scene
            .navigator
            .find_random_point_around_circle(&scene.agent, center, radius, scene.flags, &mut rng)
            .ok_or_else(|| anyhow!("Center {:?} is not on the navmesh", center))?;
        println!("{}: {},{},{}", i, point.x, point.y, point.z);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vector() {
        assert_eq!(parse_vector("1,2.5,-3").unwrap(), Vec3::new(1.0, 2.5, -3.0));
        assert_eq!(parse_vector(" 1, 2, 3").unwrap(), Vec3::new(1.0, 2.0, 3.0));
        assert!(parse_vector("1,2").is_err());
        assert!(parse_vector("a,b,c").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "navigator",
            "find-path",
            "--start",
            "1,2,0",
            "--end",
            "10,2,0",
            "--swim",
            "--threads",
            "0",
        ])
        .unwrap();
        match args.command {
            Commands::FindPath { scene, start, end, .. } => {
                assert!(scene.swim);
                assert_eq!(scene.threads, Some(0));
                assert_eq!(scene.agent, Vec3::new(0.3, 0.3, 0.9));
                assert_eq!(start, Vec3::new(1.0, 2.0, 0.0));
                assert_eq!(end, Vec3::new(10.0, 2.0, 0.0));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_generated_scene_finds_path() {
        let scene_args = SceneArgs {
            input: None,
            settings: None,
            db: None,
            threads: Some(0),
            agent: Vec3::new(0.3, 0.3, 0.9),
            terrain_cells: 1,
            player: None,
            dump_recast_mesh: None,
            swim: false,
        };
        let scene = scene_args.load(None).unwrap();
        let mut path = Vec::new();
        let status = scene.navigator.find_path(
            &scene.agent,
            Vec3::new(-10.0, 0.5, 0.0),
            Vec3::new(10.0, 0.5, 0.0),
            scene.flags,
            &AreaCosts::default(),
            0.0,
            &mut path,
        );
        assert_eq!(status, Status::Success);
        assert!(path.len() >= 2);
    }
}
