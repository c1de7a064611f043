//! Collision shapes consumed from the physics side

use glam::{Affine3A, Quat, Vec3};
use std::sync::{Arc, PoisonError, RwLock};

/// Shape of a tracked object in its local space
#[derive(Debug, Clone)]
pub enum CollisionGeometry {
    /// Indexed triangles
    TriangleMesh { vertices: Vec<Vec3>, indices: Vec<u32> },
    /// Box centred on the origin
    Box { half_extents: Vec3 },
    /// Regular height grid centred on its bounding box
    HeightField(HeightFieldGeometry),
    /// Children with fixed local transforms
    CompoundStatic(Vec<ChildShape>),
    /// Children whose local transforms may change while the object is tracked
    CompoundMutable(MutableCompound),
    Scaled {
        shape: Arc<CollisionGeometry>,
        scale: Vec3,
    },
    RotatedTranslated {
        shape: Arc<CollisionGeometry>,
        transform: Affine3A,
    },
}

/// Child of a compound shape
#[derive(Debug, Clone)]
pub struct ChildShape {
    pub transform: Affine3A,
    pub shape: Arc<CollisionGeometry>,
}

impl ChildShape {
    pub fn new(transform: Affine3A, shape: CollisionGeometry) -> Self {
        Self {
            transform,
            shape: Arc::new(shape),
        }
    }
}

/// Compound whose children the physics side re-poses in place
#[derive(Debug, Clone, Default)]
pub struct MutableCompound {
    children: Arc<RwLock<Vec<ChildShape>>>,
}

impl MutableCompound {
    pub fn new(children: Vec<ChildShape>) -> Self {
        Self {
            children: Arc::new(RwLock::new(children)),
        }
    }

    /// Copy of the current children
    pub fn children(&self) -> Vec<ChildShape> {
        self.children
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current local transforms of every child
    pub fn child_transforms(&self) -> Vec<Affine3A> {
        self.children
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|c| c.transform)
            .collect()
    }

    /// Moves one child; returns false for an unknown index
    pub fn set_child_transform(&self, index: usize, transform: Affine3A) -> bool {
        let mut children = self.children.write().unwrap_or_else(PoisonError::into_inner);
        match children.get_mut(index) {
            Some(child) => {
                child.transform = transform;
                true
            }
            None => false,
        }
    }
}

/// Height grid with `width * length` samples, row-major along Y
#[derive(Debug, Clone, PartialEq)]
pub struct HeightFieldGeometry {
    pub width: usize,
    pub length: usize,
    pub heights: Vec<f32>,
    pub min_height: f32,
    pub max_height: f32,
    /// Sample spacing along X and Y, height scale along Z
    pub scale: Vec3,
}

impl HeightFieldGeometry {
    /// Local position of sample `(x, y)`; the grid is centred on its bounding box
    pub fn local_vertex(&self, x: usize, y: usize) -> Vec3 {
        let mid = (self.min_height + self.max_height) * 0.5;
        let h = self.heights.get(y * self.width + x).copied().unwrap_or(mid);
        Vec3::new(
            (x as f32 - (self.width as f32 - 1.0) * 0.5) * self.scale.x,
            (y as f32 - (self.length as f32 - 1.0) * 0.5) * self.scale.y,
            (h - mid) * self.scale.z,
        )
    }

    pub fn local_half_extents(&self) -> Vec3 {
        Vec3::new(
            (self.width as f32 - 1.0) * 0.5 * self.scale.x,
            (self.length as f32 - 1.0) * 0.5 * self.scale.y,
            (self.max_height - self.min_height) * 0.5 * self.scale.z,
        )
        .abs()
    }
}

/// Terrain of one cell
#[derive(Debug, Clone, PartialEq)]
pub enum HeightfieldShape {
    /// Flat terrain at a single height
    Plane { height: f32 },
    /// Square height grid of side `size`, row-major along Y
    Surface {
        heights: Arc<[f32]>,
        size: usize,
        min_height: f32,
        max_height: f32,
    },
}

/// World placement of a tracked object
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: f32,
}

impl Default for ObjectTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: 1.0,
        }
    }
}

impl ObjectTransform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn to_affine(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(Vec3::splat(self.scale), self.rotation, self.position)
    }
}

/// Everything the navigator knows about one object
#[derive(Debug, Clone)]
pub struct ObjectShapes {
    /// Main collision shape, walkable on top
    pub shape: Arc<CollisionGeometry>,
    /// Optional shape the agents must not walk on
    pub avoid: Option<Arc<CollisionGeometry>>,
    pub transform: ObjectTransform,
}

impl ObjectShapes {
    pub fn new(shape: Arc<CollisionGeometry>, transform: ObjectTransform) -> Self {
        Self {
            shape,
            avoid: None,
            transform,
        }
    }

    pub fn with_avoid(mut self, avoid: Arc<CollisionGeometry>) -> Self {
        self.avoid = Some(avoid);
        self
    }

    /// Same shapes placed the same way
    pub fn same_as(&self, other: &ObjectShapes) -> bool {
        let same_avoid = match (&self.avoid, &other.avoid) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        Arc::ptr_eq(&self.shape, &other.shape) && same_avoid && self.transform == other.transform
    }

    /// Local transforms of every mutable compound child, for change detection
    pub fn mutable_child_transforms(&self) -> Vec<Affine3A> {
        let mut out = Vec::new();
        collect_mutable_transforms(&self.shape, &mut out);
        if let Some(avoid) = &self.avoid {
            collect_mutable_transforms(avoid, &mut out);
        }
        out
    }
}

fn collect_mutable_transforms(shape: &CollisionGeometry, out: &mut Vec<Affine3A>) {
    match shape {
        CollisionGeometry::CompoundMutable(compound) => {
            for child in compound.children() {
                out.push(child.transform);
                collect_mutable_transforms(&child.shape, out);
            }
        }
        CollisionGeometry::CompoundStatic(children) => {
            for child in children {
                collect_mutable_transforms(&child.shape, out);
            }
        }
        CollisionGeometry::Scaled { shape, .. } | CollisionGeometry::RotatedTranslated { shape, .. } => {
            collect_mutable_transforms(shape, out)
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_transform_to_affine() {
        let transform = ObjectTransform {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            scale: 2.0,
        };
        let p = transform.to_affine().transform_point3(Vec3::X);
        assert!((p - Vec3::new(1.0, 4.0, 3.0)).length() < 1e-5);
    }

    #[test]
    fn test_mutable_compound_transforms() {
        let compound = MutableCompound::new(vec![ChildShape::new(
            Affine3A::IDENTITY,
            CollisionGeometry::Box {
                half_extents: Vec3::ONE,
            },
        )]);
        let shapes = ObjectShapes::new(
            Arc::new(CollisionGeometry::CompoundMutable(compound.clone())),
            ObjectTransform::default(),
        );
        let before = shapes.mutable_child_transforms();
        assert!(compound.set_child_transform(0, Affine3A::from_translation(Vec3::X)));
        assert!(!compound.set_child_transform(3, Affine3A::IDENTITY));
        assert_ne!(before, shapes.mutable_child_transforms());
    }

    #[test]
    fn test_same_as_uses_shape_identity() {
        let shape = Arc::new(CollisionGeometry::Box {
            half_extents: Vec3::ONE,
        });
        let a = ObjectShapes::new(shape.clone(), ObjectTransform::default());
        let b = ObjectShapes::new(shape, ObjectTransform::default());
        let c = ObjectShapes::new(
            Arc::new(CollisionGeometry::Box {
                half_extents: Vec3::ONE,
            }),
            ObjectTransform::default(),
        );
        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
        let moved = ObjectShapes {
            transform: ObjectTransform::from_position(Vec3::X),
            ..a.clone()
        };
        assert!(!a.same_as(&moved));
    }
}
