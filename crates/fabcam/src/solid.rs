//! Solids: the owners of mounts.

use fabcam_math::{BoundingBox, ContentHash, ContentHasher, Point3, Vec3};
use fabcam_tools::ToolControllerTable;

use crate::error::{FabError, MountFailure, Result};
use crate::join::Join;
use crate::mount::Mount;
use crate::operation::{HoleKey, Operation};
use crate::production::{KernelPass, ProductionContext, SolidReport};
use crate::record::SolidRecord;
use crate::settings::ProductionSettings;
use crate::stock::Stock;

/// A part machined from one piece of stock.
#[derive(Debug, Clone, PartialEq)]
pub struct Solid {
    name: String,
    material: String,
    color: String,
    mounts: Vec<Mount>,
    stock: Option<Stock>,
}

impl Solid {
    /// An empty solid.
    pub fn new(name: impl Into<String>, material: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            material: material.into(),
            color: color.into(),
            mounts: Vec::new(),
            stock: None,
        }
    }

    /// Machine this solid from `stock`.
    pub fn with_stock(mut self, stock: Stock) -> Self {
        self.stock = Some(stock);
        self
    }

    /// Solid name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Material name.
    pub fn material(&self) -> &str {
        &self.material
    }

    /// Display color.
    pub fn color(&self) -> &str {
        &self.color
    }

    /// Stock, if assigned.
    pub fn stock(&self) -> Option<&Stock> {
        self.stock.as_ref()
    }

    /// Mounts in production order.
    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    /// Append a new mount and return it for population.
    pub fn mount(
        &mut self,
        name: impl Into<String>,
        contact: Point3,
        normal: Vec3,
        orient: Vec3,
        depth: f64,
    ) -> Result<&mut Mount> {
        let name = name.into();
        if self.mounts.iter().any(|mount| mount.name() == name) {
            return Err(FabError::duplicate("mount", format!("{}.{name}", self.name)));
        }
        let mount = Mount::new(self.name.clone(), name, contact, normal, orient, depth)?;
        let index = self.mounts.len();
        self.mounts.push(mount);
        Ok(&mut self.mounts[index])
    }

    fn mount_index(&self, name: &str) -> Result<usize> {
        self.mounts
            .iter()
            .position(|mount| mount.name() == name)
            .ok_or_else(|| FabError::not_found("mount", format!("{}.{name}", self.name)))
    }

    /// Mount named `name`.
    pub fn get_mount(&self, name: &str) -> Result<&Mount> {
        Ok(&self.mounts[self.mount_index(name)?])
    }

    /// Mutable mount named `name`.
    pub fn mount_mut(&mut self, name: &str) -> Result<&mut Mount> {
        let index = self.mount_index(name)?;
        Ok(&mut self.mounts[index])
    }

    /// Union of every mount's extruded bounds.
    pub fn bounds(&self) -> BoundingBox {
        let mut bounds = BoundingBox::empty();
        for mount in &self.mounts {
            bounds.enclose(&mount.bounds());
        }
        bounds
    }

    /// Stock size `[x, y, z]` for this solid.
    pub fn stock_envelope(&self) -> Result<[f64; 3]> {
        let stock = self.stock.as_ref().ok_or_else(|| FabError::not_found("stock", &self.name))?;
        stock.envelope(&self.bounds())
    }

    /// Drill a hole wherever a join crosses this solid along a mount normal.
    ///
    /// `mounts` limits the candidate mounts; `None` means all of them. A
    /// join yields a hole on a mount only when its axis is collinear with the
    /// mount normal (either direction) and its segment, clipped to the solid
    /// bounds, is not empty. Both tests use the tolerances in `settings`. Holes with equal keys and diameters are grouped
    /// in first-seen order and recorded as `{name}_{group}`.
    ///
    /// Returns the number of hole operations recorded.
    pub fn drill_joins(
        &mut self,
        name: &str,
        joins: &[Join],
        mounts: Option<&[&str]>,
        settings: &ProductionSettings,
    ) -> Result<usize> {
        let selected = match mounts {
            None => (0..self.mounts.len()).collect::<Vec<_>>(),
            Some(names) => names
                .iter()
                .map(|mount| self.mount_index(mount))
                .collect::<Result<Vec<_>>>()?,
        };
        let bounds = self.bounds();
        let tolerance = settings.tolerance();

        let mut recorded = 0;
        for index in selected {
            let mount = &self.mounts[index];
            let mut groups: Vec<(HoleKey, f64, Vec<Point3>)> = Vec::new();
            for join in joins {
                if !tolerance.collinear(&join.axis(), &mount.normal()) {
                    continue;
                }
                let Some((begin, finish)) = bounds.clip_segment(&join.start, &join.end, tolerance.linear) else {
                    continue;
                };
                let depth = (finish - begin).norm().min(mount.depth());
                let is_top = tolerance.points_equal(&join.start, &begin);
                let key = HoleKey::new(join.fasten.thread_name(), join.hole_kind, depth, is_top);
                let diameter = join.fasten.diameter(join.hole_kind);
                let center = mount.plane().point_project(&join.start);
                match groups.iter_mut().find(|(k, d, _)| *k == key && *d == diameter) {
                    Some((_, _, centers)) => centers.push(center),
                    None => groups.push((key, diameter, vec![center])),
                }
            }

            let mount = &mut self.mounts[index];
            for (group, (key, diameter, centers)) in groups.into_iter().enumerate() {
                mount.record_operation(Operation::hole(format!("{name}_{group}"), key, diameter, centers));
                recorded += 1;
            }
        }
        Ok(recorded)
    }

    /// Hash of material, color and every mount hash in order.
    pub fn content_hash(&self) -> ContentHash {
        let mut hasher = ContentHasher::new("solid");
        hasher.text(&self.material).text(&self.color).count(self.mounts.len());
        for mount in &self.mounts {
            hasher.child(&mount.content_hash());
        }
        hasher.finish()
    }

    /// The content hash cut to `settings.hash_text_length` hex digits.
    pub fn hash_text(&self, settings: &ProductionSettings) -> String {
        self.content_hash().short(settings.hash_text_length)
    }

    /// Intern every unproduced operation's controller, mount by mount.
    pub fn resolve_tool_controllers(&mut self, table: &mut ToolControllerTable) {
        for mount in &mut self.mounts {
            mount.resolve_tool_controllers(table);
        }
    }

    fn report(&self, produced_mounts: Vec<String>, failures: Vec<MountFailure>) -> SolidReport {
        SolidReport {
            solid: self.name.clone(),
            hash: self.content_hash(),
            produced_mounts,
            failures,
        }
    }

    fn failure(&self, mount: &Mount, error: &FabError) -> MountFailure {
        MountFailure {
            solid: self.name.clone(),
            mount: mount.name().to_string(),
            detail: error.to_string(),
        }
    }

    /// Build-key seed for the mount at `index`: this solid's identity and
    /// the content of every mount before it, which all cut the same body.
    fn build_seed(&self, index: usize) -> ContentHash {
        let mut hasher = ContentHasher::new("solid_body");
        hasher.text(&self.name).text(&self.material).text(&self.color).count(index);
        for mount in &self.mounts[..index] {
            hasher.child(&mount.content_hash());
        }
        hasher.finish()
    }

    /// Produce every mount with controllers already resolved. A failing
    /// mount is reported and its siblings still run.
    pub fn produce_geometry(&mut self, pass: &mut KernelPass<'_>) -> SolidReport {
        let mut produced = Vec::new();
        let mut failures = Vec::new();
        for index in 0..self.mounts.len() {
            let seed = self.build_seed(index);
            match self.mounts[index].produce_geometry(&seed, pass) {
                Ok(()) => produced.push(self.mounts[index].name().to_string()),
                Err(error) => failures.push(self.failure(&self.mounts[index], &error)),
            }
        }
        self.report(produced, failures)
    }

    /// Resolve and produce every mount in order. A failing mount is
    /// reported and its siblings still run.
    pub fn post_produce1(&mut self, context: &mut ProductionContext<'_>) -> SolidReport {
        let mut produced = Vec::new();
        let mut failures = Vec::new();
        for index in 0..self.mounts.len() {
            let seed = self.build_seed(index);
            match self.mounts[index].post_produce1(&seed, context) {
                Ok(()) => produced.push(self.mounts[index].name().to_string()),
                Err(error) => failures.push(self.failure(&self.mounts[index], &error)),
            }
        }
        self.report(produced, failures)
    }

    /// Serialize every mount, failed ones included.
    pub fn serialize(&mut self) -> Result<SolidRecord> {
        let hash = self.content_hash();
        let mounts = self.mounts.iter_mut().map(Mount::serialize).collect::<Result<Vec<_>>>()?;
        Ok(SolidRecord {
            name: self.name.clone(),
            material: self.material.clone(),
            color: self.color.clone(),
            hash,
            mounts,
        })
    }

    /// Re-record a solid from its record, checking the recorded hash.
    pub fn from_record(record: &SolidRecord, controllers: &ToolControllerTable) -> Result<Self> {
        let mut solid = Self::new(record.name.clone(), record.material.clone(), record.color.clone());
        for mount in &record.mounts {
            if solid.mounts.iter().any(|m| m.name() == mount.name) {
                return Err(FabError::duplicate("mount", format!("{}.{}", record.name, mount.name)));
            }
            solid.mounts.push(Mount::from_record(&record.name, mount, controllers)?);
        }
        if solid.content_hash() != record.hash {
            return Err(FabError::schema(&record.name, "hash", "does not match the recorded content"));
        }
        Ok(solid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Geometries, Polygon};
    use crate::join::{Fasten, HoleKind, ThreadProfile};
    use crate::operation::OperationKind;

    /// A 40x40x10 block with top and bottom mounts.
    fn block() -> Solid {
        let mut solid = Solid::new("block", "aluminum", "silver");
        solid
            .mount("top", Point3::new(0.0, 0.0, 10.0), Vec3::z(), Vec3::y(), 10.0)
            .unwrap()
            .extrude(
                "outline",
                Geometries::single(Polygon::rectangle((0.0, 0.0), (40.0, 40.0), 10.0)),
                10.0,
                true,
            );
        solid
            .mount("bottom", Point3::origin(), -Vec3::z(), Vec3::y(), 10.0)
            .unwrap();
        solid
    }

    fn settings() -> ProductionSettings {
        ProductionSettings::default()
    }

    fn m3() -> Fasten {
        Fasten::new("M3x0.5", ThreadProfile::IsoCoarse, "M3").unwrap()
    }

    fn vertical(x: f64, y: f64) -> Join {
        Join::new(m3(), Point3::new(x, y, 10.0), Point3::new(x, y, -20.0)).unwrap()
    }

    fn holes(mount: &Mount) -> Vec<(&HoleKey, usize)> {
        mount
            .operations()
            .iter()
            .filter_map(|op| match op.kind() {
                OperationKind::Hole { key, centers, .. } => Some((key, centers.len())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_duplicate_mount_name() {
        let mut solid = block();
        assert!(matches!(
            solid.mount("top", Point3::origin(), Vec3::z(), Vec3::y(), 1.0),
            Err(FabError::DuplicateKey { kind: "mount", .. })
        ));
        assert!(matches!(solid.get_mount("side"), Err(FabError::NotFound { .. })));
        assert_eq!(solid.mount_mut("bottom").unwrap().solid(), "block");
    }

    #[test]
    fn test_bounds_and_stock() {
        let solid = block();
        let bounds = solid.bounds();
        assert_eq!(bounds.min, Point3::origin());
        assert_eq!(bounds.max, Point3::new(40.0, 40.0, 10.0));
        assert!(matches!(solid.stock_envelope(), Err(FabError::NotFound { kind: "stock", .. })));

        let solid = solid.with_stock(Stock::new("plate", 5.0, [6.35, 12.7], 2.0).unwrap());
        assert_eq!(solid.stock_envelope().unwrap(), [45.0, 45.0, 12.7]);
    }

    #[test]
    fn test_perpendicular_join_drills_nothing() {
        let mut solid = block();
        let across = Join::new(m3(), Point3::new(-5.0, 20.0, 5.0), Point3::new(45.0, 20.0, 5.0)).unwrap();
        assert_eq!(solid.drill_joins("joins", &[across], None, &settings()).unwrap(), 0);
        assert!(solid.mounts().iter().all(|m| holes(m).is_empty()));
    }

    #[test]
    fn test_join_outside_solid_drills_nothing() {
        let mut solid = block();
        assert_eq!(solid.drill_joins("joins", &[vertical(60.0, 60.0)], None, &settings()).unwrap(), 0);
    }

    #[test]
    fn test_collinear_joins_coalesce() {
        let mut solid = block();
        let joins = [vertical(5.0, 5.0), vertical(35.0, 5.0), vertical(35.0, 35.0)];
        let recorded = solid.drill_joins("joins", &joins, Some(&["top"]), &settings()).unwrap();
        assert_eq!(recorded, 1);

        let top = solid.get_mount("top").unwrap();
        let found = holes(top);
        assert_eq!(found.len(), 1);
        let (key, count) = found[0];
        assert_eq!(count, 3);
        assert_eq!(key.thread_name, "M3x0.5");
        assert_eq!(key.kind, HoleKind::Close);
        assert_eq!(key.depth, 10.0);
        assert!(key.is_top);
        assert_eq!(top.operations().last().unwrap().name(), "joins_0");
        assert!(holes(solid.get_mount("bottom").unwrap()).is_empty());
    }

    #[test]
    fn test_distinct_keys_split_groups() {
        let mut solid = block();
        let joins = [
            vertical(5.0, 5.0),
            vertical(35.0, 5.0).with_hole_kind(HoleKind::Thread),
            vertical(35.0, 35.0),
        ];
        assert_eq!(solid.drill_joins("joins", &joins, Some(&["top"]), &settings()).unwrap(), 2);
        let top = solid.get_mount("top").unwrap();
        let names: Vec<&str> = top.operations().iter().skip(1).map(|op| op.name()).collect();
        assert_eq!(names, ["joins_0", "joins_1"]);
        let found = holes(top);
        assert_eq!((found[0].0.kind, found[0].1), (HoleKind::Close, 2));
        assert_eq!((found[1].0.kind, found[1].1), (HoleKind::Thread, 1));
    }

    #[test]
    fn test_all_mounts_by_default() {
        let mut solid = block();
        assert_eq!(solid.drill_joins("joins", &[vertical(5.0, 5.0)], None, &settings()).unwrap(), 2);
        let bottom = holes(solid.get_mount("bottom").unwrap());
        assert_eq!(bottom.len(), 1);
        // Projected onto the bottom plane.
        match solid.get_mount("bottom").unwrap().operations()[0].kind() {
            OperationKind::Hole { centers, .. } => assert_eq!(centers[0], Point3::new(5.0, 5.0, 0.0)),
            other => panic!("expected a hole, got {other:?}"),
        }
        assert!(matches!(
            solid.drill_joins("joins", &[], Some(&["side"]), &settings()),
            Err(FabError::NotFound { kind: "mount", .. })
        ));
    }

    #[test]
    fn test_buried_join_is_not_top() {
        let mut solid = block();
        let short = Join::new(m3(), Point3::new(5.0, 5.0, 20.0), Point3::new(5.0, 5.0, 4.0)).unwrap();
        solid.drill_joins("joins", &[short], Some(&["top"]), &settings()).unwrap();
        let (key, _) = holes(solid.get_mount("top").unwrap())[0];
        assert!(!key.is_top);
        assert_eq!(key.depth, 6.0);
    }

    #[test]
    fn test_collinear_tolerance_from_settings() {
        // About 0.01 rad off the mount normal.
        let tilted = Join::new(m3(), Point3::new(5.0, 5.0, 20.0), Point3::new(5.3, 5.0, -10.0)).unwrap();

        let mut strict = block();
        let recorded = strict
            .drill_joins("joins", std::slice::from_ref(&tilted), Some(&["top"]), &settings())
            .unwrap();
        assert_eq!(recorded, 0);

        let loose = ProductionSettings {
            collinear_tolerance: 0.1,
            ..settings()
        };
        let mut relaxed = block();
        assert_eq!(relaxed.drill_joins("joins", &[tilted], Some(&["top"]), &loose).unwrap(), 1);
        assert_eq!(holes(relaxed.get_mount("top").unwrap()).len(), 1);
    }

    #[test]
    fn test_hash_covers_material_and_mounts() {
        let a = block();
        let mut b = block();
        assert_eq!(a.content_hash(), b.content_hash());
        assert_eq!(a.hash_text(&settings()).len(), 16);
        let short = ProductionSettings {
            hash_text_length: 8,
            ..settings()
        };
        assert_eq!(a.hash_text(&short), &a.hash_text(&settings())[..8]);

        let c = Solid { material: "brass".into(), ..block() };
        assert_ne!(a.content_hash(), c.content_hash());

        b.drill_joins("joins", &[vertical(5.0, 5.0)], None, &settings()).unwrap();
        assert_ne!(a.content_hash(), b.content_hash());

        let renamed = Solid { name: "other".into(), ..block() };
        assert_eq!(a.content_hash(), renamed.content_hash());
    }
}
