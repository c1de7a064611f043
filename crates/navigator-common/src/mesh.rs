//! Indexed triangle meshes and Wavefront OBJ input/output

use crate::{Error, Result};
use glam::Vec3;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// Indexed triangle mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjMesh {
    pub vertices: Vec<Vec3>,
    /// Three indices per triangle
    pub indices: Vec<u32>,
}

impl ObjMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Loads a mesh from an OBJ file
    pub fn from_obj<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut mesh = Self::new();
        for (number, line) in reader.lines().enumerate() {
            mesh.parse_line(&line?, number + 1)?;
        }
        Ok(mesh)
    }

    /// Parses OBJ content; faces with more than three vertices are fan triangulated
    pub fn from_obj_str(content: &str) -> Result<Self> {
        let mut mesh = Self::new();
        for (number, line) in content.lines().enumerate() {
            mesh.parse_line(line, number + 1)?;
        }
        Ok(mesh)
    }

    fn parse_line(&mut self, line: &str, number: usize) -> Result<()> {
        let invalid = |what: &str| Error::InvalidGeometry(format!("line {number}: {what}"));
        let mut tokens = line.split_whitespace();

        match tokens.next() {
            Some("v") => {
                let mut coordinate = || -> Result<f32> {
                    tokens
                        .next()
                        .ok_or_else(|| invalid("vertex has fewer than 3 coordinates"))?
                        .parse::<f32>()
                        .map_err(|_| invalid("vertex coordinate is not a number"))
                };
                let v = Vec3::new(coordinate()?, coordinate()?, coordinate()?);
                self.vertices.push(v);
            }
            Some("f") => {
                let face = tokens
                    .map(|token| {
                        let index = token.split('/').next().unwrap_or_default();
                        match index.parse::<i64>() {
                            Ok(i) if i > 0 => Ok((i - 1) as u32),
                            // Negative indices count back from the last vertex
                            Ok(i) if i < 0 && (-i) as usize <= self.vertices.len() => {
                                Ok((self.vertices.len() as i64 + i) as u32)
                            }
                            _ => Err(invalid("bad face index")),
                        }
                    })
                    .collect::<Result<Vec<u32>>>()?;
                if face.len() < 3 {
                    return Err(invalid("face has fewer than 3 vertices"));
                }
                for i in 1..face.len() - 1 {
                    self.indices.extend_from_slice(&[face[0], face[i], face[i + 1]]);
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Writes the mesh as OBJ
    pub fn write_obj<W: Write>(&self, writer: &mut W) -> Result<()> {
        for v in &self.vertices {
            writeln!(writer, "v {} {} {}", v.x, v.y, v.z)?;
        }
        for tri in self.indices.chunks_exact(3) {
            writeln!(writer, "f {} {} {}", tri[0] + 1, tri[1] + 1, tri[2] + 1)?;
        }
        Ok(())
    }

    /// Axis-aligned bounds, `None` for a mesh without vertices
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        self.vertices
            .iter()
            .map(|v| (*v, *v))
            .reduce(|(amin, amax), (bmin, bmax)| (amin.min(bmin), amax.max(bmax)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_obj_str_triangulates_quads() {
        let mesh = ObjMesh::from_obj_str(
            "# quad\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2//1 3//1 4//1\n",
        )
        .unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn test_negative_face_indices() {
        let mesh = ObjMesh::from_obj_str("v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n").unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_invalid_input() {
        assert!(ObjMesh::from_obj_str("v 0 0\n").is_err());
        assert!(ObjMesh::from_obj_str("v 0 0 x\n").is_err());
        assert!(ObjMesh::from_obj_str("v 0 0 0\nf 1 2\n").is_err());
        assert!(ObjMesh::from_obj_str("f 0 1 2\n").is_err());
    }

    #[test]
    fn test_write_then_read() {
        let mesh = ObjMesh {
            vertices: vec![Vec3::ZERO, Vec3::X, Vec3::new(0.5, 1.5, -2.0)],
            indices: vec![0, 1, 2],
        };
        let mut out = Vec::new();
        mesh.write_obj(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("f 1 2 3"));
        assert_eq!(ObjMesh::from_obj_str(&text).unwrap(), mesh);
        assert_eq!(mesh.bounds(), Some((Vec3::new(0.0, 0.0, -2.0), Vec3::new(1.0, 1.5, 0.0))));
    }
}
