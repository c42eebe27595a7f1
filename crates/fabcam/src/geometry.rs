//! 2D profiles placed in 3D: circles and filleted polygons.

use fabcam_math::{point_to_array, vec_to_array, BoundingBox, ContentHasher, Plane, Point3, Tolerance, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{FabError, Result};

/// A circle lying in the plane through `center` with the given normal.
#[derive(Debug, Clone, PartialEq)]
pub struct Circle {
    /// Center point.
    pub center: Point3,
    /// Normal of the circle's plane.
    pub normal: Vec3,
    /// Diameter in mm.
    pub diameter: f64,
}

/// A polygon corner with an optional fillet.
#[derive(Debug, Clone, PartialEq)]
pub struct Corner {
    /// Corner point.
    pub point: Point3,
    /// Fillet radius in mm; zero for a sharp corner.
    pub radius: f64,
}

/// A closed planar polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    /// Corners in boundary order.
    pub corners: Vec<Corner>,
}

/// A single planar profile.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// Circle.
    Circle(Circle),
    /// Polygon.
    Polygon(Polygon),
}

impl Circle {
    /// Create a circle.
    pub fn new(center: Point3, normal: Vec3, diameter: f64) -> Self {
        Self {
            center,
            normal,
            diameter,
        }
    }
}

impl Polygon {
    /// Polygon with sharp corners.
    pub fn new(points: impl IntoIterator<Item = Point3>) -> Self {
        Self {
            corners: points
                .into_iter()
                .map(|point| Corner { point, radius: 0.0 })
                .collect(),
        }
    }

    /// Polygon from `(point, fillet radius)` pairs.
    pub fn filleted(corners: impl IntoIterator<Item = (Point3, f64)>) -> Self {
        Self {
            corners: corners
                .into_iter()
                .map(|(point, radius)| Corner { point, radius })
                .collect(),
        }
    }

    /// Axis-aligned rectangle in the XY plane at height `z`.
    pub fn rectangle(min: (f64, f64), max: (f64, f64), z: f64) -> Self {
        Self::new([
            Point3::new(min.0, min.1, z),
            Point3::new(max.0, min.1, z),
            Point3::new(max.0, max.1, z),
            Point3::new(min.0, max.1, z),
        ])
    }

    /// Newell normal; its length is twice the enclosed area.
    fn newell(&self) -> Vec3 {
        let mut normal = Vec3::zeros();
        let count = self.corners.len();
        for (i, corner) in self.corners.iter().enumerate() {
            let a = corner.point;
            let b = self.corners[(i + 1) % count].point;
            normal.x += (a.y - b.y) * (a.z + b.z);
            normal.y += (a.z - b.z) * (a.x + b.x);
            normal.z += (a.x - b.x) * (a.y + b.y);
        }
        normal
    }

    fn validate(&self, tolerance: &Tolerance) -> std::result::Result<(), String> {
        let count = self.corners.len();
        if count < 3 {
            return Err(format!("polygon needs at least 3 corners, has {count}"));
        }
        for (i, corner) in self.corners.iter().enumerate() {
            if !(corner.radius >= 0.0 && corner.radius.is_finite()) {
                return Err(format!("corner {i} has invalid fillet radius {}", corner.radius));
            }
            let next = &self.corners[(i + 1) % count];
            if tolerance.points_equal(&corner.point, &next.point) {
                return Err(format!("corners {i} and {} coincide", (i + 1) % count));
            }
        }
        let normal = self.newell();
        if normal.norm() / 2.0 < tolerance.linear {
            return Err("polygon encloses no area".to_string());
        }
        let unit = normal.normalize();
        let origin = self.corners[0].point;
        if let Some((i, _)) = self
            .corners
            .iter()
            .enumerate()
            .find(|(_, c)| (c.point - origin).dot(&unit).abs() > tolerance.linear.max(1e-6))
        {
            return Err(format!("corner {i} is not coplanar"));
        }
        if let Some((i, j)) = self.self_intersection(&unit) {
            return Err(format!("polygon edges {i} and {j} intersect"));
        }
        Ok(())
    }

    /// First pair of non-adjacent edges that touch, in 2D after dropping
    /// the dominant axis of `normal`.
    fn self_intersection(&self, normal: &Vec3) -> Option<(usize, usize)> {
        let drop = normal.iamax();
        let flat: Vec<(f64, f64)> = self
            .corners
            .iter()
            .map(|c| match drop {
                0 => (c.point.y, c.point.z),
                1 => (c.point.z, c.point.x),
                _ => (c.point.x, c.point.y),
            })
            .collect();
        let count = flat.len();
        for i in 0..count {
            for j in (i + 1)..count {
                let adjacent = j == i + 1 || (i == 0 && j == count - 1);
                if adjacent {
                    continue;
                }
                let (a, b) = (flat[i], flat[(i + 1) % count]);
                let (c, d) = (flat[j], flat[(j + 1) % count]);
                if segments_touch(a, b, c, d) {
                    return Some((i, j));
                }
            }
        }
        None
    }
}

fn cross(o: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

fn on_segment(a: (f64, f64), b: (f64, f64), p: (f64, f64)) -> bool {
    p.0 >= a.0.min(b.0) && p.0 <= a.0.max(b.0) && p.1 >= a.1.min(b.1) && p.1 <= a.1.max(b.1)
}

fn segments_touch(a: (f64, f64), b: (f64, f64), c: (f64, f64), d: (f64, f64)) -> bool {
    const EPS: f64 = 1e-12;
    let d1 = cross(c, d, a);
    let d2 = cross(c, d, b);
    let d3 = cross(a, b, c);
    let d4 = cross(a, b, d);
    if ((d1 > EPS && d2 < -EPS) || (d1 < -EPS && d2 > EPS)) && ((d3 > EPS && d4 < -EPS) || (d3 < -EPS && d4 > EPS)) {
        return true;
    }
    (d1.abs() <= EPS && on_segment(c, d, a))
        || (d2.abs() <= EPS && on_segment(c, d, b))
        || (d3.abs() <= EPS && on_segment(a, b, c))
        || (d4.abs() <= EPS && on_segment(a, b, d))
}

impl Geometry {
    /// Kind name used in records.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Geometry::Circle(_) => "Circle",
            Geometry::Polygon(_) => "Polygon",
        }
    }

    /// Enclosed area in mm², ignoring fillets.
    pub fn area(&self) -> f64 {
        match self {
            Geometry::Circle(c) => std::f64::consts::PI * (c.diameter / 2.0).powi(2),
            Geometry::Polygon(p) => p.newell().norm() / 2.0,
        }
    }

    /// Axis-aligned bounds of the profile.
    pub fn bounds(&self) -> BoundingBox {
        match self {
            Geometry::Circle(c) => {
                let radius = c.diameter / 2.0;
                let normal = c.normal.try_normalize(1e-12).unwrap_or_else(Vec3::z);
                let extent = Vec3::new(
                    radius * (1.0 - normal.x * normal.x).max(0.0).sqrt(),
                    radius * (1.0 - normal.y * normal.y).max(0.0).sqrt(),
                    radius * (1.0 - normal.z * normal.z).max(0.0).sqrt(),
                );
                BoundingBox::new(c.center - extent, c.center + extent)
            }
            Geometry::Polygon(p) => BoundingBox::from_points(p.corners.iter().map(|c| &c.point)),
        }
    }

    /// The profile projected onto `plane`.
    pub fn project(&self, plane: &Plane) -> Geometry {
        match self {
            Geometry::Circle(c) => Geometry::Circle(Circle {
                center: plane.point_project(&c.center),
                normal: plane.normal,
                diameter: c.diameter,
            }),
            Geometry::Polygon(p) => Geometry::Polygon(Polygon {
                corners: p
                    .corners
                    .iter()
                    .map(|c| Corner {
                        point: plane.point_project(&c.point),
                        radius: c.radius,
                    })
                    .collect(),
            }),
        }
    }

    /// Check the profile is not degenerate.
    pub fn validate(&self, tolerance: &Tolerance) -> std::result::Result<(), String> {
        match self {
            Geometry::Circle(c) => {
                if !(c.diameter > tolerance.linear && c.diameter.is_finite()) {
                    return Err(format!("circle diameter {} is not positive", c.diameter));
                }
                if c.normal.norm() < tolerance.linear {
                    return Err("circle normal has zero length".to_string());
                }
                Ok(())
            }
            Geometry::Polygon(p) => p.validate(tolerance),
        }
    }

    /// Feed the profile into a content hash.
    pub fn hash_into(&self, hasher: &mut ContentHasher) {
        match self {
            Geometry::Circle(c) => {
                hasher.text("circle").point(&c.center).vector(&c.normal).real(c.diameter);
            }
            Geometry::Polygon(p) => {
                hasher.text("polygon").count(p.corners.len());
                for corner in &p.corners {
                    hasher.point(&corner.point).real(corner.radius);
                }
            }
        }
    }

    /// JSON record of the profile.
    pub fn to_record(&self) -> GeometryRecord {
        match self {
            Geometry::Circle(c) => GeometryRecord::Circle {
                center: point_to_array(&c.center),
                normal: vec_to_array(&c.normal),
                diameter: c.diameter,
            },
            Geometry::Polygon(p) => GeometryRecord::Polygon {
                corners: p
                    .corners
                    .iter()
                    .map(|c| CornerRecord {
                        point: point_to_array(&c.point),
                        radius: c.radius,
                    })
                    .collect(),
            },
        }
    }

    /// Rebuild a profile from its record.
    pub fn from_record(record: &GeometryRecord) -> Geometry {
        match record {
            GeometryRecord::Circle {
                center,
                normal,
                diameter,
            } => Geometry::Circle(Circle {
                center: Point3::from(*center),
                normal: Vec3::from(*normal),
                diameter: *diameter,
            }),
            GeometryRecord::Polygon { corners } => Geometry::Polygon(Polygon {
                corners: corners
                    .iter()
                    .map(|c| Corner {
                        point: Point3::from(c.point),
                        radius: c.radius,
                    })
                    .collect(),
            }),
        }
    }
}

impl From<Circle> for Geometry {
    fn from(circle: Circle) -> Self {
        Geometry::Circle(circle)
    }
}

impl From<Polygon> for Geometry {
    fn from(polygon: Polygon) -> Self {
        Geometry::Polygon(polygon)
    }
}

/// JSON record of a polygon corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CornerRecord {
    /// Corner point.
    pub point: [f64; 3],
    /// Fillet radius.
    pub radius: f64,
}

/// JSON record of a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", deny_unknown_fields)]
pub enum GeometryRecord {
    /// Circle.
    Circle {
        /// Center point.
        center: [f64; 3],
        /// Plane normal.
        normal: [f64; 3],
        /// Diameter.
        diameter: f64,
    },
    /// Polygon.
    Polygon {
        /// Corners in boundary order.
        corners: Vec<CornerRecord>,
    },
}

/// One profile or an ordered tuple of profiles.
///
/// The largest profile is the boundary (the first one wins ties); the rest
/// are through-pockets for an extrude or islands for a pocket.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometries {
    items: Vec<Geometry>,
}

impl Geometries {
    /// A tuple of profiles. Fails when `items` is empty.
    pub fn new(items: Vec<Geometry>) -> Result<Self> {
        if items.is_empty() {
            return Err(FabError::schema("geometry", "geometry", "needs at least one profile"));
        }
        Ok(Self { items })
    }

    /// A single profile.
    pub fn single(geometry: impl Into<Geometry>) -> Self {
        Self {
            items: vec![geometry.into()],
        }
    }

    /// Profiles in the order given.
    pub fn items(&self) -> &[Geometry] {
        &self.items
    }

    /// Index of the boundary profile.
    pub fn boundary_index(&self) -> usize {
        let mut best = 0;
        for (index, geometry) in self.items.iter().enumerate().skip(1) {
            if geometry.area() > self.items[best].area() {
                best = index;
            }
        }
        best
    }

    /// The boundary profile.
    pub fn boundary(&self) -> &Geometry {
        &self.items[self.boundary_index()]
    }

    /// Every profile except the boundary, in order.
    pub fn inner(&self) -> Vec<Geometry> {
        let boundary = self.boundary_index();
        self.items
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != boundary)
            .map(|(_, geometry)| geometry.clone())
            .collect()
    }

    /// Union of the profiles' bounds.
    pub fn bounds(&self) -> BoundingBox {
        let mut bounds = BoundingBox::empty();
        for geometry in &self.items {
            bounds.enclose(&geometry.bounds());
        }
        bounds
    }

    /// Every profile projected onto `plane`.
    pub fn project(&self, plane: &Plane) -> Geometries {
        Self {
            items: self.items.iter().map(|g| g.project(plane)).collect(),
        }
    }

    /// Validate every profile, reporting the first failure.
    pub fn validate(&self, tolerance: &Tolerance) -> std::result::Result<(), String> {
        for (index, geometry) in self.items.iter().enumerate() {
            geometry
                .validate(tolerance)
                .map_err(|message| format!("profile {index}: {message}"))?;
        }
        Ok(())
    }

    /// Feed every profile, in order, into a content hash.
    pub fn hash_into(&self, hasher: &mut ContentHasher) {
        hasher.count(self.items.len());
        for geometry in &self.items {
            geometry.hash_into(hasher);
        }
    }

    /// Records of every profile.
    pub fn to_records(&self) -> Vec<GeometryRecord> {
        self.items.iter().map(Geometry::to_record).collect()
    }

    /// Rebuild from records.
    pub fn from_records(records: &[GeometryRecord]) -> Result<Self> {
        Self::new(records.iter().map(Geometry::from_record).collect())
    }
}

impl From<Geometry> for Geometries {
    fn from(geometry: Geometry) -> Self {
        Self::single(geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(size: f64, z: f64) -> Geometry {
        Polygon::rectangle((0.0, 0.0), (size, size), z).into()
    }

    #[test]
    fn test_area_and_bounds() {
        let sq = square(10.0, 0.0);
        assert_relative_eq!(sq.area(), 100.0, epsilon = 1e-9);
        assert_eq!(sq.bounds().size(), [10.0, 10.0, 0.0]);

        let circle: Geometry = Circle::new(Point3::new(5.0, 5.0, 0.0), Vec3::z(), 4.0).into();
        assert_relative_eq!(circle.area(), std::f64::consts::PI * 4.0, epsilon = 1e-9);
        let bounds = circle.bounds();
        assert_relative_eq!(bounds.min, Point3::new(3.0, 3.0, 0.0), epsilon = 1e-9);
        assert_relative_eq!(bounds.max, Point3::new(7.0, 7.0, 0.0), epsilon = 1e-9);
    }

    #[test]
    fn test_validate() {
        let tol = Tolerance::DEFAULT;
        assert!(square(10.0, 0.0).validate(&tol).is_ok());
        assert!(Geometry::from(Circle::new(Point3::origin(), Vec3::z(), 0.0)).validate(&tol).is_err());
        assert!(Geometry::from(Circle::new(Point3::origin(), Vec3::zeros(), 3.0)).validate(&tol).is_err());

        let line = Polygon::new([Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 0.0, 0.0)]);
        assert!(Geometry::from(line).validate(&tol).is_err());

        let bow_tie = Polygon::new([
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 10.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(0.0, 10.0, 0.0),
        ]);
        let message = Geometry::from(bow_tie).validate(&tol).unwrap_err();
        assert!(message.contains("intersect"), "{message}");

        let repeated = Polygon::new([
            Point3::origin(),
            Point3::origin(),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ]);
        assert!(Geometry::from(repeated).validate(&tol).is_err());
    }

    #[test]
    fn test_vertical_polygon_is_valid() {
        let wall = Polygon::new([
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 5.0, 0.0),
            Point3::new(0.0, 5.0, 5.0),
            Point3::new(0.0, 0.0, 5.0),
        ]);
        assert!(Geometry::from(wall).validate(&Tolerance::DEFAULT).is_ok());
    }

    #[test]
    fn test_boundary_is_largest() {
        let hole: Geometry = Circle::new(Point3::new(5.0, 5.0, 0.0), Vec3::z(), 2.0).into();
        let geometries = Geometries::new(vec![hole.clone(), square(10.0, 0.0)]).unwrap();
        assert_eq!(geometries.boundary_index(), 1);
        assert_eq!(geometries.inner(), vec![hole]);
        assert!(Geometries::new(Vec::new()).is_err());

        let tie = Geometries::new(vec![square(10.0, 0.0), square(10.0, 1.0)]).unwrap();
        assert_eq!(tie.boundary_index(), 0);
    }

    #[test]
    fn test_project() {
        let plane = Plane::new(Point3::new(0.0, 0.0, -3.0), Vec3::z()).unwrap();
        let projected = square(10.0, 7.0).project(&plane);
        assert_eq!(projected.bounds().min.z, -3.0);
        assert_eq!(projected.bounds().max.z, -3.0);
    }

    #[test]
    fn test_record_roundtrip() {
        let geometries = Geometries::new(vec![
            square(10.0, 0.0),
            Circle::new(Point3::new(5.0, 5.0, 0.0), Vec3::z(), 2.0).into(),
        ])
        .unwrap();
        let json = serde_json::to_value(geometries.to_records()).unwrap();
        assert_eq!(json[1]["kind"], "Circle");
        let records: Vec<GeometryRecord> = serde_json::from_value(json).unwrap();
        assert_eq!(Geometries::from_records(&records).unwrap(), geometries);
    }

    #[test]
    fn test_record_rejects_unknown_fields() {
        let json = serde_json::json!({"kind": "Circle", "center": [0, 0, 0], "normal": [0, 0, 1], "diameter": 3, "color": "red"});
        assert!(serde_json::from_value::<GeometryRecord>(json).is_err());
    }
}
