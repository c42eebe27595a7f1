//! Axis-aligned bounding boxes.
//!
//! Mount and solid bounds are tracked as boxes; drill lines are clipped
//! against them to decide whether a fastener passes through a solid.

use crate::Point3;

/// Axis-aligned bounding box in 3D.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl BoundingBox {
    /// Create a box from min and max corners.
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Create an empty (inverted) box suitable for expansion.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Smallest box containing every point.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3>) -> Self {
        let mut bounds = Self::empty();
        for p in points {
            bounds.include_point(p);
        }
        bounds
    }

    /// True when no point has been included yet.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand this box to include a point.
    pub fn include_point(&mut self, p: &Point3) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    /// Expand this box to include another box.
    pub fn enclose(&mut self, other: &BoundingBox) {
        if other.is_empty() {
            return;
        }
        self.include_point(&other.min);
        self.include_point(&other.max);
    }

    /// Extent along X, Y and Z (zero for an empty box).
    pub fn size(&self) -> [f64; 3] {
        if self.is_empty() {
            return [0.0; 3];
        }
        [
            self.max.x - self.min.x,
            self.max.y - self.min.y,
            self.max.z - self.min.z,
        ]
    }

    /// Clip the segment `start..end` to this box.
    ///
    /// Returns the clipped `(begin, finish)` points, with `begin` on the
    /// `start` side, or `None` when no portion of positive length lies
    /// inside. A box that is flat along any axis never intersects.
    pub fn clip_segment(&self, start: &Point3, end: &Point3, epsilon: f64) -> Option<(Point3, Point3)> {
        if self.is_empty() {
            return None;
        }
        let mut begin_ratio = 0.0_f64;
        let mut finish_ratio = 1.0_f64;
        for axis in 0..3 {
            let (s, e) = (start[axis], end[axis]);
            let (minimum, maximum) = (self.min[axis], self.max[axis]);
            if (maximum - minimum).abs() < epsilon
                || (s > maximum && e > maximum)
                || (s < minimum && e < minimum)
            {
                return None;
            }

            let distance = e - s;
            if distance.abs() < epsilon {
                continue;
            }
            let minimum_ratio = (minimum - s) / distance;
            let maximum_ratio = (maximum - s) / distance;
            let (near, far) = if maximum_ratio > minimum_ratio {
                (minimum_ratio, maximum_ratio)
            } else {
                (maximum_ratio, minimum_ratio)
            };
            begin_ratio = begin_ratio.max(near);
            finish_ratio = finish_ratio.min(far);
            if begin_ratio > finish_ratio {
                return None;
            }
        }

        let delta = end - start;
        let begin = start + delta * begin_ratio;
        let finish = start + delta * finish_ratio;
        if (finish - begin).norm() < epsilon {
            return None;
        }
        Some((begin, finish))
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}
