#![warn(missing_docs)]

//! Math types for the fabcam operation pipeline.
//!
//! Thin wrappers around nalgebra providing the handful of geometric
//! primitives the operation ledger needs: points, vectors, planes,
//! axis-aligned boxes with segment clipping, tolerance constants, and the
//! structural content hasher used to detect unchanged work between builds.
//!
//! # Example
//!
//! ```
//! use fabcam_math::{BoundingBox, Plane, Point3, Vec3};
//!
//! let plane = Plane::new(Point3::new(0.0, 0.0, 10.0), Vec3::z()).unwrap();
//! let projected = plane.point_project(&Point3::new(1.0, 2.0, 3.0));
//! assert!((projected.z - 10.0).abs() < 1e-12);
//!
//! let bounds = BoundingBox::new(Point3::origin(), Point3::new(10.0, 10.0, 10.0));
//! let clipped = bounds.clip_segment(
//!     &Point3::new(5.0, 5.0, 20.0),
//!     &Point3::new(5.0, 5.0, -20.0),
//!     1e-8,
//! );
//! assert!(clipped.is_some());
//! ```

mod bbox;
pub mod hash;
mod plane;

pub use bbox::BoundingBox;
pub use hash::{ContentHash, ContentHasher};
pub use plane::Plane;

use nalgebra::Vector3;

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// Tolerance constants for geometric comparisons.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    /// Linear distance tolerance in mm.
    pub linear: f64,
    /// Collinearity tolerance, expressed as the sine of the angle between
    /// two directions.
    pub collinear: f64,
}

impl Tolerance {
    /// Default machining tolerances (1e-8 mm linear, 1e-6 collinear).
    pub const DEFAULT: Self = Self {
        linear: 1e-8,
        collinear: 1e-6,
    };

    /// Check if two points are coincident within tolerance.
    pub fn points_equal(&self, a: &Point3, b: &Point3) -> bool {
        (a - b).norm() < self.linear
    }

    /// Check whether two directions lie on the same line, pointing either way.
    ///
    /// Zero-length inputs are never collinear.
    pub fn collinear(&self, a: &Vec3, b: &Vec3) -> bool {
        let lengths = a.norm() * b.norm();
        if lengths < self.linear {
            return false;
        }
        a.cross(b).norm() / lengths < self.collinear
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Convert a point into the `[x, y, z]` array used by JSON records.
pub fn point_to_array(p: &Point3) -> [f64; 3] {
    [p.x, p.y, p.z]
}

/// Convert a vector into the `[x, y, z]` array used by JSON records.
pub fn vec_to_array(v: &Vec3) -> [f64; 3] {
    [v.x, v.y, v.z]
}
