//! Persistent tile store
//!
//! Every generated tile is kept in its own file:
//! `<root>/<agent>/<worldspace>/<x>_<y>/<input crc32>.tile`. A file holds a small
//! header, the full generation input (so CRC collisions are detected) and the
//! LZ4-compressed tile. Unreadable or mismatching files are misses.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use navigator_common::{Error, Result};
use navmesh_grid::GridTile;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::tile_position::TilePosition;

/// 'NMTD' in little-endian
pub const TILE_DB_MAGIC: u32 = 0x4454_4D4E;
pub const TILE_DB_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileDbStats {
    pub reads: u64,
    pub hits: u64,
    pub writes: u64,
    pub refused_writes: u64,
    pub used_size: u64,
    pub max_size: u64,
}

/// Key of one stored tile
#[derive(Debug, Clone, Copy)]
pub struct TileDbKey<'a> {
    /// Identifies the agent bounds and settings the tile was generated for
    pub agent: u32,
    pub worldspace: &'a str,
    pub tile: TilePosition,
    /// Serialized generation input
    pub input: &'a [u8],
}

pub struct TileDb {
    root: PathBuf,
    max_size: u64,
    used_size: AtomicU64,
    reads: AtomicU64,
    hits: AtomicU64,
    writes: AtomicU64,
    refused_writes: AtomicU64,
}

impl TileDb {
    /// Opens (and creates if needed) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>, max_size: u64) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let used_size = directory_size(&root)?;
        log::info!(
            "Opened tile DB {} ({} of {} bytes used)",
            root.display(),
            used_size,
            max_size
        );
        Ok(Self {
            root,
            max_size,
            used_size: AtomicU64::new(used_size),
            reads: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            refused_writes: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, key: &TileDbKey) -> PathBuf {
        self.root
            .join(format!("{:08x}", key.agent))
            .join(sanitize(key.worldspace))
            .join(format!("{}_{}", key.tile.x, key.tile.y))
            .join(format!("{:08x}.tile", crc32fast::hash(key.input)))
    }

    /// Looks a tile up; any read or decoding failure is a miss
    pub fn get(&self, key: &TileDbKey) -> Option<Arc<GridTile>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let path = self.path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                log::warn!("Failed to read tile DB file {}: {e}", path.display());
                return None;
            }
        };
        match decode(&bytes, key.input) {
            Ok(Some(tile)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(Arc::new(tile))
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("Ignoring corrupted tile DB file {}: {e}", path.display());
                None
            }
        }
    }

    /// Stores a tile unless the store is full; returns whether it was written
    pub fn put(&self, key: &TileDbKey, tile: &GridTile) -> bool {
        match self.try_put(key, tile) {
            Ok(written) => written,
            Err(e) => {
                log::warn!(
                    "Failed to write tile ({}, {}) to tile DB: {e}",
                    key.tile.x,
                    key.tile.y
                );
                false
            }
        }
    }

    fn try_put(&self, key: &TileDbKey, tile: &GridTile) -> Result<bool> {
        let bytes = encode(key.input, tile)?;
        let size = bytes.len() as u64;
        let path = self.path(key);
        // An overwrite only changes the size by the difference to the old file
        let previous = fs::metadata(&path).map_or(0, |m| m.len());
        let reserved = self
            .used_size
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                let used = used.saturating_sub(previous);
                (used.saturating_add(size) <= self.max_size).then_some(used + size)
            })
            .is_ok();
        if !reserved {
            self.refused_writes.fetch_add(1, Ordering::Relaxed);
            log::warn!(
                "Tile DB size limit of {} bytes reached, tile ({}, {}) is not stored",
                self.max_size,
                key.tile.x,
                key.tile.y
            );
            return Ok(false);
        }

        let result = write_atomically(&path, &bytes);
        if result.is_err() {
            // The old file, if any, is still in place
            let _ = self
                .used_size
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                    Some(used.saturating_sub(size).saturating_add(previous))
                });
        }
        result?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    pub fn stats(&self) -> TileDbStats {
        TileDbStats {
            reads: self.reads.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            refused_writes: self.refused_writes.load(Ordering::Relaxed),
            used_size: self.used_size.load(Ordering::Relaxed),
            max_size: self.max_size,
        }
    }
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp = path.with_extension(format!("tmp{}", std::process::id()));
    {
        let mut file = fs::File::create(&temp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&temp, path)?;
    Ok(())
}

fn directory_size(path: &Path) -> Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if metadata.is_dir() {
            total += directory_size(&entry.path())?;
        } else {
            total += metadata.len();
        }
    }
    Ok(total)
}

fn encode(input: &[u8], tile: &GridTile) -> Result<Vec<u8>> {
    let payload = postcard::to_allocvec(tile).map_err(|e| Error::Serialization(e.to_string()))?;
    let compressed = lz4_flex::compress_prepend_size(&payload);

    let mut out = Vec::with_capacity(20 + input.len() + compressed.len());
    out.write_u32::<LittleEndian>(TILE_DB_MAGIC)?;
    out.write_u32::<LittleEndian>(TILE_DB_VERSION)?;
    out.write_u32::<LittleEndian>(input.len() as u32)?;
    out.write_all(input)?;
    out.write_u32::<LittleEndian>(crc32fast::hash(&compressed))?;
    out.write_u32::<LittleEndian>(compressed.len() as u32)?;
    out.write_all(&compressed)?;
    Ok(out)
}

/// `Ok(None)` when the file belongs to another input
fn decode(bytes: &[u8], input: &[u8]) -> Result<Option<GridTile>> {
    let mut reader = Cursor::new(bytes);
    let magic = reader.read_u32::<LittleEndian>()?;
    if magic != TILE_DB_MAGIC {
        return Err(Error::Cache(format!("bad magic {magic:#010x}")));
    }
    let version = reader.read_u32::<LittleEndian>()?;
    if version != TILE_DB_VERSION {
        return Err(Error::Cache(format!("unsupported version {version}")));
    }

    let stored_input = read_block(&mut reader)?;
    if stored_input != input {
        return Ok(None);
    }

    let checksum = reader.read_u32::<LittleEndian>()?;
    let compressed = read_block(&mut reader)?;
    if crc32fast::hash(&compressed) != checksum {
        return Err(Error::Cache("checksum mismatch".to_string()));
    }
    let payload = lz4_flex::decompress_size_prepended(&compressed)
        .map_err(|e| Error::Cache(format!("decompression failed: {e}")))?;
    let tile = postcard::from_bytes(&payload).map_err(|e| Error::Serialization(e.to_string()))?;
    Ok(Some(tile))
}

fn read_block(reader: &mut Cursor<&[u8]>) -> Result<Vec<u8>> {
    let len = reader.read_u32::<LittleEndian>()? as usize;
    let remaining = reader.get_ref().len() as u64 - reader.position();
    if len as u64 > remaining {
        return Err(Error::Cache(format!("block of {len} bytes exceeds file")));
    }
    let mut block = vec![0; len];
    reader.read_exact(&mut block)?;
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TempDir;
    use glam::IVec2;
    use navmesh_grid::{GridNode, NodeFlags};

    fn tile() -> GridTile {
        let node = GridNode {
            height: 1.5,
            area: 63,
            flags: NodeFlags::WALK,
        };
        GridTile::from_columns(IVec2::new(3, -4), 1, 0.5, vec![vec![node]]).unwrap()
    }

    fn key<'a>(input: &'a [u8]) -> TileDbKey<'a> {
        TileDbKey {
            agent: 7,
            worldspace: "sys::default",
            tile: IVec2::new(3, -4),
            input,
        }
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new("tile_db_round_trip");
        let db = TileDb::open(dir.path(), 1 << 20).unwrap();
        assert!(db.get(&key(b"input")).is_none());
        assert!(db.put(&key(b"input"), &tile()));
        assert_eq!(*db.get(&key(b"input")).unwrap(), tile());
        assert!(db.get(&key(b"other input")).is_none());

        let stats = db.stats();
        assert_eq!(stats.reads, 3);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.writes, 1);
        assert!(stats.used_size > 0);

        let reopened = TileDb::open(dir.path(), 1 << 20).unwrap();
        assert_eq!(reopened.stats().used_size, stats.used_size);
        assert!(reopened.get(&key(b"input")).is_some());
    }

    #[test]
    fn test_corrupted_file_is_a_miss() {
        let dir = TempDir::new("tile_db_corrupted");
        let db = TileDb::open(dir.path(), 1 << 20).unwrap();
        assert!(db.put(&key(b"input"), &tile()));
        let path = db.path(&key(b"input"));

        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&path, &bytes).unwrap();
        assert!(db.get(&key(b"input")).is_none());

        fs::write(&path, b"garbage").unwrap();
        assert!(db.get(&key(b"input")).is_none());
    }

    #[test]
    fn test_size_limit_refuses_writes() {
        let dir = TempDir::new("tile_db_size_limit");
        let db = TileDb::open(dir.path(), 16).unwrap();
        assert!(!db.put(&key(b"input"), &tile()));
        assert!(db.get(&key(b"input")).is_none());
        assert_eq!(db.stats().refused_writes, 1);
    }

    #[test]
    fn test_overwrite_keeps_used_size() {
        let dir = TempDir::new("tile_db_overwrite");
        let db = TileDb::open(dir.path(), 1 << 20).unwrap();
        assert!(db.put(&key(b"input"), &tile()));
        let used = db.stats().used_size;
        let file_size = fs::metadata(db.path(&key(b"input"))).unwrap().len();
        assert_eq!(used, file_size);

        for _ in 0..3 {
            assert!(db.put(&key(b"input"), &tile()));
        }
        let stats = db.stats();
        assert_eq!(stats.writes, 4);
        assert_eq!(stats.used_size, used);
        assert_eq!(TileDb::open(dir.path(), 1 << 20).unwrap().stats().used_size, used);
    }

    #[test]
    fn test_overwrite_fits_under_tight_limit() {
        let dir = TempDir::new("tile_db_overwrite_limit");
        let sizing_dir = TempDir::new("tile_db_overwrite_limit_size");
        let sizing = TileDb::open(sizing_dir.path(), 1 << 20).unwrap();
        assert!(sizing.put(&key(b"input"), &tile()));
        let file_size = sizing.stats().used_size;

        let db = TileDb::open(dir.path(), file_size).unwrap();
        assert!(db.put(&key(b"input"), &tile()));
        assert!(db.put(&key(b"input"), &tile()));
        assert_eq!(db.stats().refused_writes, 0);
        assert_eq!(db.stats().used_size, file_size);
    }

    #[test]
    fn test_worldspace_is_sanitized() {
        assert_eq!(sanitize("sys::default"), "sys__default");
        assert_eq!(sanitize(""), "_");
    }
}
