//! Tool shapes: the geometric profile a bit is built on.

use std::path::{Path, PathBuf};

use crate::error::{Result, ToolsError};

/// A named tool profile backed by a template file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    /// Shape name, e.g. `endmill` or `v-bit`.
    pub name: String,
    /// Path to the shape template file.
    pub path: PathBuf,
}

impl Shape {
    /// Create a shape.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Names of the shapes referenced by the standard bit templates.
pub const STANDARD_SHAPE_NAMES: [&str; 10] = [
    "ballend",
    "bullnose",
    "chamfer",
    "dovetail",
    "drill",
    "endmill",
    "probe",
    "slittingsaw",
    "thread-mill",
    "v-bit",
];

/// A name-sorted shape catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shapes {
    shapes: Vec<Shape>,
}

impl Shapes {
    /// Build a catalog, rejecting repeated names.
    pub fn new(shapes: impl IntoIterator<Item = Shape>) -> Result<Self> {
        let mut shapes: Vec<Shape> = shapes.into_iter().collect();
        shapes.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(pair) = shapes.windows(2).find(|pair| pair[0].name == pair[1].name) {
            return Err(ToolsError::duplicate("shape", &pair[0].name));
        }
        Ok(Self { shapes })
    }

    /// The ten standard shapes, with template files under `directory`.
    pub fn standard(directory: impl AsRef<Path>) -> Self {
        let directory = directory.as_ref();
        let mut shapes: Vec<Shape> = STANDARD_SHAPE_NAMES
            .iter()
            .map(|name| Shape::new(*name, directory.join(format!("{name}.fcstd"))))
            .collect();
        shapes.sort_by(|a, b| a.name.cmp(&b.name));
        Self { shapes }
    }

    /// Exact-match lookup.
    pub fn lookup(&self, name: &str) -> Result<&Shape> {
        self.shapes
            .binary_search_by(|shape| shape.name.as_str().cmp(name))
            .map(|index| &self.shapes[index])
            .map_err(|_| ToolsError::not_found("shape", name))
    }

    /// Shapes in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.iter()
    }

    /// Number of shapes.
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// True when the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let shapes = Shapes::standard("Shape");
        assert_eq!(shapes.len(), 10);
        let shape = shapes.lookup("v-bit").unwrap();
        assert_eq!(shape.path, Path::new("Shape").join("v-bit.fcstd"));
        assert_eq!(
            shapes.lookup("missing"),
            Err(ToolsError::NotFound {
                kind: "shape",
                key: "missing".into()
            })
        );
    }

    #[test]
    fn test_sorted_and_duplicates() {
        let shapes = Shapes::new([Shape::new("b", "b.fcstd"), Shape::new("a", "a.fcstd")]).unwrap();
        let names: Vec<&str> = shapes.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);

        let duplicate = Shapes::new([Shape::new("a", "1.fcstd"), Shape::new("a", "2.fcstd")]);
        assert!(matches!(duplicate, Err(ToolsError::DuplicateKey { kind: "shape", .. })));
    }
}
