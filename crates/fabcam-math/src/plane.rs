//! Oriented planes.

use crate::{Point3, Vec3};

/// An infinite plane through a contact point with a unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// A point on the plane.
    pub contact: Point3,
    /// Unit normal of the plane.
    pub normal: Vec3,
}

impl Plane {
    /// Create a plane, normalizing `normal`.
    ///
    /// Returns `None` when `normal` has zero length.
    pub fn new(contact: Point3, normal: Vec3) -> Option<Self> {
        let length = normal.norm();
        if length < 1e-12 {
            return None;
        }
        Some(Self {
            contact,
            normal: normal / length,
        })
    }

    /// Signed distance from the plane to `point`, positive on the normal side.
    pub fn signed_distance(&self, point: &Point3) -> f64 {
        (point - self.contact).dot(&self.normal)
    }

    /// Orthogonal projection of `point` onto the plane.
    pub fn point_project(&self, point: &Point3) -> Point3 {
        point - self.normal * self.signed_distance(point)
    }

    /// Remove the normal component of `vector`, leaving its in-plane part.
    pub fn vector_project(&self, vector: &Vec3) -> Vec3 {
        vector - self.normal * vector.dot(&self.normal)
    }

    /// The parallel plane `distance` millimeters along the normal.
    pub fn offset(&self, distance: f64) -> Self {
        Self {
            contact: self.contact + self.normal * distance,
            normal: self.normal,
        }
    }
}
