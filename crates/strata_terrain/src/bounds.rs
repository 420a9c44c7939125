//! Bounding volumes and rays for LOD meshes.

use glam::Vec3;

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl BoundingBox {
    /// Creates a box from its corners.
    #[must_use]
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box containing every point, or the default box when empty.
    #[must_use]
    pub fn from_points(points: &[Vec3]) -> Self {
        let Some(&first) = points.first() else {
            return Self::default();
        };
        let (min, max) = points
            .iter()
            .fold((first, first), |(min, max), &p| (min.min(p), max.max(p)));
        Self { min, max }
    }

    /// Box center.
    #[must_use]
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Box size per axis.
    #[must_use]
    #[inline]
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Slab test. Returns the entry distance along the ray, clamped to 0
    /// when the origin is inside.
    #[must_use]
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        let inv = ray.direction.recip();
        let t0 = (self.min - ray.origin) * inv;
        let t1 = (self.max - ray.origin) * inv;
        let near = t0.min(t1).max_element();
        let far = t0.max(t1).min_element();
        if far < 0.0 || near > far {
            return None;
        }
        Some(near.max(0.0))
    }
}

/// Bounding sphere.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingSphere {
    /// Center.
    pub center: Vec3,
    /// Radius.
    pub radius: f32,
}

impl BoundingSphere {
    /// Creates a sphere.
    #[must_use]
    #[inline]
    pub const fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Sphere enclosing `bbox`.
    #[must_use]
    pub fn from_box(bbox: &BoundingBox) -> Self {
        Self {
            center: bbox.center(),
            radius: bbox.extent().length() * 0.5,
        }
    }
}

/// Ray with origin and direction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    /// Start point.
    pub origin: Vec3,
    /// Direction, not necessarily normalised.
    pub direction: Vec3,
}

impl Ray {
    /// Creates a ray.
    #[must_use]
    #[inline]
    pub const fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Point at parameter `t`.
    #[must_use]
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Möller-Trumbore intersection. Returns the ray parameter of the hit;
    /// back faces are accepted.
    #[must_use]
    pub fn intersect_triangle(&self, v0: Vec3, v1: Vec3, v2: Vec3) -> Option<f32> {
        const EPSILON: f32 = 1.0e-7;
        let e1 = v1 - v0;
        let e2 = v2 - v0;
        let p = self.direction.cross(e2);
        let det = e1.dot(p);
        if det.abs() < EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let s = self.origin - v0;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(e1);
        let v = self.direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = e2.dot(q) * inv_det;
        (t >= 0.0).then_some(t)
    }
}
