//! Machining operations: extrude, pocket and hole groups.
//!
//! An [`Operation`] moves through three states. It is *recorded* into a
//! mount's ledger, *produced* by the geometry kernel (or reused from a
//! previous run's build cache), and finally *serialized* into its JSON
//! record. Transitions only move forward.

use std::fmt;

use fabcam_math::{point_to_array, ContentHash, ContentHasher, Plane, Point3};
use fabcam_tools::{ToolController, ToolControllerTable};
use serde::{Deserialize, Serialize};

use crate::error::{FabError, Result};
use crate::geometry::Geometries;
use crate::join::HoleKind;
use crate::kernel::{GeometryKernel, KernelOutput};
use crate::record::OperationRecord;

/// Lifecycle state of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OperationState {
    /// In a ledger, not yet produced.
    Recorded,
    /// Kernel output attached and tool controller resolved.
    Produced,
    /// JSON record emitted.
    Serialized,
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationState::Recorded => "recorded",
            OperationState::Produced => "produced",
            OperationState::Serialized => "serialized",
        })
    }
}

/// Grouping key for holes: placements with equal keys share one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct HoleKey {
    /// Fastener thread name.
    pub thread_name: String,
    /// Hole diameter choice.
    pub kind: HoleKind,
    /// Hole depth, rounded to 1e-6 mm.
    pub depth: f64,
    /// Whether the hole starts at the fastener head.
    pub is_top: bool,
}

impl HoleKey {
    /// Build a key, rounding `depth` so nearly equal depths group together.
    pub fn new(thread_name: impl Into<String>, kind: HoleKind, depth: f64, is_top: bool) -> Self {
        Self {
            thread_name: thread_name.into(),
            kind,
            depth: (depth * 1e6).round() / 1e6,
            is_top,
        }
    }
}

/// Kind-specific content of an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationKind {
    /// Extrude the boundary profile, cutting the other profiles through.
    Extrude {
        /// Boundary plus through-pockets.
        geometries: Geometries,
        /// Extrusion depth (mm).
        depth: f64,
        /// Also generate a profile cut path.
        contour: bool,
    },
    /// Pocket the boundary profile, leaving the other profiles as islands.
    Pocket {
        /// Boundary plus islands.
        geometries: Geometries,
        /// Pocket depth (mm).
        depth: f64,
    },
    /// Drill every center with the same diameter and depth.
    Hole {
        /// Grouping key.
        key: HoleKey,
        /// Drill diameter (mm).
        diameter: f64,
        /// Placement points on the mount plane.
        centers: Vec<Point3>,
    },
}

impl OperationKind {
    /// Lowercase kind tag.
    pub fn tag(&self) -> &'static str {
        match self {
            OperationKind::Extrude { .. } => "extrude",
            OperationKind::Pocket { .. } => "pocket",
            OperationKind::Hole { .. } => "hole",
        }
    }

    /// Depth below the mount plane.
    pub fn depth(&self) -> f64 {
        match self {
            OperationKind::Extrude { depth, .. } | OperationKind::Pocket { depth, .. } => *depth,
            OperationKind::Hole { key, .. } => key.depth,
        }
    }
}

/// One unit of machining work in a mount's ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    name: String,
    kind: OperationKind,
    tool_controller: Option<ToolController>,
    tool_controller_index: Option<usize>,
    state: OperationState,
    output: Option<KernelOutput>,
}

impl Operation {
    fn recorded(name: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            name: name.into(),
            kind,
            tool_controller: None,
            tool_controller_index: None,
            state: OperationState::Recorded,
            output: None,
        }
    }

    /// An extrude of `depth` mm.
    pub fn extrude(name: impl Into<String>, geometries: impl Into<Geometries>, depth: f64, contour: bool) -> Self {
        Self::recorded(
            name,
            OperationKind::Extrude {
                geometries: geometries.into(),
                depth,
                contour,
            },
        )
    }

    /// A pocket `depth` mm deep.
    pub fn pocket(name: impl Into<String>, geometries: impl Into<Geometries>, depth: f64) -> Self {
        Self::recorded(
            name,
            OperationKind::Pocket {
                geometries: geometries.into(),
                depth,
            },
        )
    }

    /// A group of holes sharing `key`.
    pub fn hole(name: impl Into<String>, key: HoleKey, diameter: f64, centers: Vec<Point3>) -> Self {
        Self::recorded(name, OperationKind::Hole { key, diameter, centers })
    }

    /// Request `controller` for this operation.
    pub fn with_tool_controller(mut self, controller: ToolController) -> Self {
        self.tool_controller = Some(controller);
        self
    }

    /// Request `controller`; only allowed before production.
    pub fn set_tool_controller(&mut self, controller: ToolController) -> Result<()> {
        if self.state != OperationState::Recorded {
            return Err(self.invalid(OperationState::Recorded));
        }
        self.tool_controller = Some(controller);
        self.tool_controller_index = None;
        Ok(())
    }

    /// Operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind-specific content.
    pub fn kind(&self) -> &OperationKind {
        &self.kind
    }

    /// Lifecycle state.
    pub fn state(&self) -> OperationState {
        self.state
    }

    /// The requested tool controller.
    pub fn tool_controller(&self) -> Option<&ToolController> {
        self.tool_controller.as_ref()
    }

    /// Index of the requested controller in the run's table, once resolved.
    pub fn tool_controller_index(&self) -> Option<usize> {
        self.tool_controller_index
    }

    /// Kernel output, once produced.
    pub fn output(&self) -> Option<&KernelOutput> {
        self.output.as_ref()
    }

    /// Structural hash over the kind tag, geometry, depth and kind flags.
    ///
    /// The name and the tool controller are not hashed.
    pub fn content_hash(&self) -> ContentHash {
        let mut hasher = ContentHasher::new("operation");
        hasher.text(self.kind.tag());
        match &self.kind {
            OperationKind::Extrude {
                geometries,
                depth,
                contour,
            } => {
                geometries.hash_into(&mut hasher);
                hasher.real(*depth).flag(*contour);
            }
            OperationKind::Pocket { geometries, depth } => {
                geometries.hash_into(&mut hasher);
                hasher.real(*depth);
            }
            OperationKind::Hole { key, diameter, centers } => {
                hasher
                    .text(&key.thread_name)
                    .text(key.kind.as_str())
                    .real(key.depth)
                    .flag(key.is_top)
                    .real(*diameter)
                    .count(centers.len());
                for center in centers {
                    hasher.point(center);
                }
            }
        }
        hasher.finish()
    }

    fn invalid(&self, to: OperationState) -> FabError {
        FabError::InvalidState {
            operation: self.name.clone(),
            from: self.state,
            to,
        }
    }

    /// Intern the requested controller, if any, and remember its index.
    pub fn resolve_tool_controller(&mut self, table: &mut ToolControllerTable) -> Option<usize> {
        if self.state == OperationState::Recorded {
            self.tool_controller_index = self.tool_controller.as_ref().map(|c| table.intern(c));
        }
        self.tool_controller_index
    }

    fn check_producible(&self) -> Result<()> {
        if self.state != OperationState::Recorded {
            return Err(self.invalid(OperationState::Produced));
        }
        if self.tool_controller.is_some() && self.tool_controller_index.is_none() {
            return Err(FabError::schema(&self.name, "tool_controller", "was not resolved before production"));
        }
        Ok(())
    }

    /// Run the kernel for this operation on `plane`.
    pub fn produce(&mut self, plane: &Plane, kernel: &mut dyn GeometryKernel) -> Result<()> {
        self.check_producible()?;
        let output = match &self.kind {
            OperationKind::Extrude {
                geometries,
                depth,
                contour,
            } => {
                let projected = geometries.project(plane);
                kernel.extrude(plane, projected.boundary(), &projected.inner(), *depth, *contour)
            }
            OperationKind::Pocket { geometries, depth } => {
                let projected = geometries.project(plane);
                kernel.pocket(plane, projected.boundary(), &projected.inner(), *depth)
            }
            OperationKind::Hole { key, diameter, centers } => kernel.drill(plane, *diameter, key.depth, centers),
        }
        .map_err(|error| FabError::geometry(&self.name, error.0))?;
        self.output = Some(output);
        self.state = OperationState::Produced;
        Ok(())
    }

    /// Take a previous run's kernel output instead of calling the kernel.
    pub fn reuse(&mut self, output: KernelOutput) -> Result<()> {
        self.check_producible()?;
        self.output = Some(output);
        self.state = OperationState::Produced;
        Ok(())
    }

    /// Emit the JSON record, moving to the serialized state.
    ///
    /// Serializing again returns the same record.
    pub fn serialize(&mut self) -> Result<OperationRecord> {
        if self.state == OperationState::Recorded {
            return Err(self.invalid(OperationState::Serialized));
        }
        self.state = OperationState::Serialized;
        Ok(self.to_record())
    }

    /// The JSON record as it stands, without changing state. Unproduced
    /// operations carry `null` produced paths.
    pub(crate) fn to_record(&self) -> OperationRecord {
        let name = self.name.clone();
        let tool_controller = self.tool_controller_index;
        let hash = self.content_hash();
        let output = self.output.as_ref();
        match &self.kind {
            OperationKind::Extrude {
                geometries,
                depth,
                contour,
            } => OperationRecord::Extrude {
                name,
                geometry: geometries.to_records(),
                depth: *depth,
                contour: *contour,
                tool_controller,
                hash,
                contour_path: output.and_then(|o| o.contour_path),
            },
            OperationKind::Pocket { geometries, depth } => OperationRecord::Pocket {
                name,
                geometry: geometries.to_records(),
                depth: *depth,
                tool_controller,
                hash,
                bottom_path: output.and_then(|o| o.bottom_path),
            },
            OperationKind::Hole { key, diameter, centers } => OperationRecord::Hole {
                name,
                thread_name: key.thread_name.clone(),
                hole_kind: key.kind,
                depth: key.depth,
                is_top: key.is_top,
                diameter: *diameter,
                centers: centers.iter().map(point_to_array).collect(),
                tool_controller,
                hash,
            },
        }
    }

    /// Re-record an operation from its JSON record.
    ///
    /// The controller index is looked up in `controllers`; the recorded
    /// hash must match the rebuilt content.
    pub fn from_record(record: &OperationRecord, controllers: &ToolControllerTable) -> Result<Self> {
        let mut operation = match record {
            OperationRecord::Extrude {
                name,
                geometry,
                depth,
                contour,
                ..
            } => Self::extrude(name.clone(), Geometries::from_records(geometry)?, *depth, *contour),
            OperationRecord::Pocket {
                name, geometry, depth, ..
            } => Self::pocket(name.clone(), Geometries::from_records(geometry)?, *depth),
            OperationRecord::Hole {
                name,
                thread_name,
                hole_kind,
                depth,
                is_top,
                diameter,
                centers,
                ..
            } => Self::hole(
                name.clone(),
                HoleKey::new(thread_name.clone(), *hole_kind, *depth, *is_top),
                *diameter,
                centers.iter().copied().map(Point3::from).collect(),
            ),
        };
        if let Some(index) = record.tool_controller() {
            let controller = controllers
                .get(index)
                .ok_or_else(|| FabError::not_found("tool controller", index))?;
            operation.tool_controller = Some(controller.clone());
        }
        if operation.content_hash() != record.hash() {
            return Err(FabError::schema(record.name(), "hash", "does not match the recorded content"));
        }
        Ok(operation)
    }
}
