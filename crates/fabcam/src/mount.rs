//! Mounts: oriented work planes holding an ordered operation ledger.

use fabcam_math::{vec_to_array, point_to_array, BoundingBox, ContentHash, ContentHasher, Plane, Point3, Tolerance, Vec3};
use fabcam_tools::ToolControllerTable;

use crate::error::{FabError, Result};
use crate::geometry::Geometries;
use crate::operation::{Operation, OperationKind, OperationState};
use crate::production::{KernelPass, ProductionContext};
use crate::record::MountRecord;

/// An oriented work plane on a solid.
///
/// The ledger is append-only and its order is the machining order.
#[derive(Debug, Clone, PartialEq)]
pub struct Mount {
    name: String,
    solid: String,
    plane: Plane,
    orient: Vec3,
    depth: f64,
    operations: Vec<Operation>,
    bounds: BoundingBox,
    failure: Option<String>,
}

impl Mount {
    /// Create an empty mount on `solid`.
    ///
    /// `orient` is projected onto the plane and normalized; it must not be
    /// parallel to `normal`. `depth` limits how far operations reach below
    /// the plane.
    pub fn new(
        solid: impl Into<String>,
        name: impl Into<String>,
        contact: Point3,
        normal: Vec3,
        orient: Vec3,
        depth: f64,
    ) -> Result<Self> {
        let name = name.into();
        let plane = Plane::new(contact, normal).ok_or_else(|| FabError::schema(&name, "normal", "has zero length"))?;
        let orient = plane
            .vector_project(&orient)
            .try_normalize(Tolerance::DEFAULT.linear)
            .ok_or_else(|| FabError::schema(&name, "orient", "has no component in the mount plane"))?;
        if !(depth.is_finite() && depth > 0.0) {
            return Err(FabError::schema(&name, "depth", format!("must be positive, found {depth}")));
        }
        Ok(Self {
            name,
            solid: solid.into(),
            plane,
            orient,
            depth,
            operations: Vec::new(),
            bounds: BoundingBox::empty(),
            failure: None,
        })
    }

    /// Mount name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the owning solid.
    pub fn solid(&self) -> &str {
        &self.solid
    }

    /// The work plane.
    pub fn plane(&self) -> &Plane {
        &self.plane
    }

    /// Contact point of the plane.
    pub fn contact(&self) -> Point3 {
        self.plane.contact
    }

    /// Unit normal of the plane.
    pub fn normal(&self) -> Vec3 {
        self.plane.normal
    }

    /// Unit in-plane orientation.
    pub fn orient(&self) -> Vec3 {
        self.orient
    }

    /// Depth limit.
    pub fn depth(&self) -> f64 {
        self.depth
    }

    /// Operations in ledger order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Bounds of the material extruded on this mount.
    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// Why the last production attempt stopped, if it did.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Append `operation` to the ledger and return it.
    pub fn record_operation(&mut self, operation: Operation) -> &mut Operation {
        if let OperationKind::Extrude { geometries, depth, .. } = operation.kind() {
            self.enclose(geometries, *depth);
        }
        let index = self.operations.len();
        self.operations.push(operation);
        &mut self.operations[index]
    }

    // The extruded volume spans the profiles projected on the top plane and
    // on the plane `depth` below it.
    fn enclose(&mut self, geometries: &Geometries, depth: f64) {
        let bottom = self.plane.offset(-depth);
        self.bounds.enclose(&geometries.project(&self.plane).bounds());
        self.bounds.enclose(&geometries.project(&bottom).bounds());
    }

    /// Record an extrude.
    pub fn extrude(
        &mut self,
        name: impl Into<String>,
        geometries: impl Into<Geometries>,
        depth: f64,
        contour: bool,
    ) -> &mut Operation {
        self.record_operation(Operation::extrude(name, geometries, depth, contour))
    }

    /// Record a pocket.
    pub fn pocket(&mut self, name: impl Into<String>, geometries: impl Into<Geometries>, depth: f64) -> &mut Operation {
        self.record_operation(Operation::pocket(name, geometries, depth))
    }

    /// Hash of the plane fields alone.
    pub fn plane_hash(&self) -> ContentHash {
        let mut hasher = ContentHasher::new("mount_plane");
        hasher
            .point(&self.plane.contact)
            .vector(&self.plane.normal)
            .vector(&self.orient)
            .real(self.depth);
        hasher.finish()
    }

    /// Hash of the plane fields and every operation hash in ledger order.
    pub fn content_hash(&self) -> ContentHash {
        let mut hasher = ContentHasher::new("mount");
        hasher
            .point(&self.plane.contact)
            .vector(&self.plane.normal)
            .vector(&self.orient)
            .real(self.depth)
            .count(self.operations.len());
        for operation in &self.operations {
            hasher.child(&operation.content_hash());
        }
        hasher.finish()
    }

    /// Intern the controller of every unproduced operation, in ledger order.
    pub fn resolve_tool_controllers(&mut self, table: &mut ToolControllerTable) {
        for operation in &mut self.operations {
            operation.resolve_tool_controller(table);
        }
    }

    /// Produce every unproduced operation in ledger order, stopping at the
    /// first failure.
    ///
    /// `seed` identifies the body this mount cuts: the owning solid and
    /// every mount produced before this one. Each build key chains the
    /// seed, the plane hash and the ledger up to the keyed operation.
    pub fn produce_geometry(&mut self, seed: &ContentHash, pass: &mut KernelPass<'_>) -> Result<()> {
        let result = self.produce_ledger(seed, pass);
        self.failure = result.as_ref().err().map(ToString::to_string);
        result
    }

    fn produce_ledger(&mut self, seed: &ContentHash, pass: &mut KernelPass<'_>) -> Result<()> {
        let mut key = ContentHasher::new("build_key");
        key.child(seed).child(&self.plane_hash());
        for operation in &mut self.operations {
            key.child(&operation.content_hash());
            if operation.state() != OperationState::Recorded {
                continue;
            }
            let build_key = key.clone().finish();
            let reused = match pass.previous_output(&build_key) {
                Some(output) => {
                    operation.reuse(output)?;
                    true
                }
                None => {
                    operation.produce(&self.plane, &mut *pass.kernel)?;
                    false
                }
            };
            if let Some(output) = operation.output() {
                pass.record(build_key, output.clone(), reused);
            }
        }
        Ok(())
    }

    /// Resolve controllers, then produce, in ledger order.
    pub fn post_produce1(&mut self, seed: &ContentHash, context: &mut ProductionContext<'_>) -> Result<()> {
        self.resolve_tool_controllers(context.controllers);
        self.produce_geometry(seed, &mut context.pass)
    }

    /// Serialize every operation.
    ///
    /// After a failed production the operations the failure cut off are
    /// written with `null` produced paths and stay recorded; otherwise every
    /// operation must have been produced.
    pub fn serialize(&mut self) -> Result<MountRecord> {
        let failed = self.failure.is_some();
        let operations = self
            .operations
            .iter_mut()
            .map(|operation| {
                if failed && operation.state() == OperationState::Recorded {
                    Ok(operation.to_record())
                } else {
                    operation.serialize()
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(MountRecord {
            name: self.name.clone(),
            contact: point_to_array(&self.plane.contact),
            normal: vec_to_array(&self.plane.normal),
            orient: vec_to_array(&self.orient),
            depth: self.depth,
            failure: self.failure.clone(),
            operations,
        })
    }

    /// Re-record a mount of `solid` from its record.
    pub fn from_record(solid: &str, record: &MountRecord, controllers: &ToolControllerTable) -> Result<Self> {
        let mut mount = Self::new(
            solid,
            record.name.clone(),
            Point3::from(record.contact),
            Vec3::from(record.normal),
            Vec3::from(record.orient),
            record.depth,
        )?;
        for operation in &record.operations {
            mount.record_operation(Operation::from_record(operation, controllers)?);
        }
        Ok(mount)
    }
}
