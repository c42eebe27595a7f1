//! JSON records handed to the downstream post-processor.
//!
//! Every record denies unknown fields, and fields that may be `null`
//! (`tool_controller`, produced paths, a mount's `failure`) must still be
//! present.

use fabcam_math::ContentHash;
use fabcam_tools::{Bits, ToolController, ToolControllerRecord, ToolControllerTable};
use serde::{Deserialize, Serialize};

use crate::error::{FabError, Result};
use crate::geometry::GeometryRecord;
use crate::join::HoleKind;
use crate::kernel::KernelHandle;
use crate::solid::Solid;

/// JSON record of one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum OperationRecord {
    /// An extrude.
    Extrude {
        /// Operation name.
        name: String,
        /// Profiles, boundary included, in recorded order.
        geometry: Vec<GeometryRecord>,
        /// Extrusion depth.
        depth: f64,
        /// Whether a profile cut path was requested.
        contour: bool,
        /// Index into the tool controller table.
        #[serde(deserialize_with = "Option::deserialize")]
        tool_controller: Option<usize>,
        /// Content hash.
        hash: ContentHash,
        /// Produced profile cut path.
        #[serde(deserialize_with = "Option::deserialize")]
        contour_path: Option<KernelHandle>,
    },
    /// A pocket.
    Pocket {
        /// Operation name.
        name: String,
        /// Profiles, boundary included, in recorded order.
        geometry: Vec<GeometryRecord>,
        /// Pocket depth.
        depth: f64,
        /// Index into the tool controller table.
        #[serde(deserialize_with = "Option::deserialize")]
        tool_controller: Option<usize>,
        /// Content hash.
        hash: ContentHash,
        /// Produced floor path.
        #[serde(deserialize_with = "Option::deserialize")]
        bottom_path: Option<KernelHandle>,
    },
    /// A group of holes sharing one hole key.
    Hole {
        /// Operation name.
        name: String,
        /// Fastener thread name.
        thread_name: String,
        /// Hole diameter choice.
        hole_kind: HoleKind,
        /// Hole depth.
        depth: f64,
        /// Whether the holes start at the fastener head.
        is_top: bool,
        /// Drill diameter.
        diameter: f64,
        /// Placement points on the mount plane.
        centers: Vec<[f64; 3]>,
        /// Index into the tool controller table.
        #[serde(deserialize_with = "Option::deserialize")]
        tool_controller: Option<usize>,
        /// Content hash.
        hash: ContentHash,
    },
}

impl OperationRecord {
    /// The operation name.
    pub fn name(&self) -> &str {
        match self {
            OperationRecord::Extrude { name, .. }
            | OperationRecord::Pocket { name, .. }
            | OperationRecord::Hole { name, .. } => name,
        }
    }

    /// The recorded content hash.
    pub fn hash(&self) -> ContentHash {
        match self {
            OperationRecord::Extrude { hash, .. }
            | OperationRecord::Pocket { hash, .. }
            | OperationRecord::Hole { hash, .. } => *hash,
        }
    }

    /// The recorded tool controller index.
    pub fn tool_controller(&self) -> Option<usize> {
        match self {
            OperationRecord::Extrude { tool_controller, .. }
            | OperationRecord::Pocket { tool_controller, .. }
            | OperationRecord::Hole { tool_controller, .. } => *tool_controller,
        }
    }
}

/// JSON record of one mount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MountRecord {
    /// Mount name.
    pub name: String,
    /// Plane contact point.
    pub contact: [f64; 3],
    /// Plane normal.
    pub normal: [f64; 3],
    /// In-plane orientation.
    pub orient: [f64; 3],
    /// Depth limit.
    pub depth: f64,
    /// Error that stopped this mount's production. Operations it cut off
    /// have `null` produced paths.
    #[serde(deserialize_with = "Option::deserialize")]
    pub failure: Option<String>,
    /// Operations in ledger order.
    pub operations: Vec<OperationRecord>,
}

/// JSON record of one solid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SolidRecord {
    /// Solid name.
    pub name: String,
    /// Material name.
    pub material: String,
    /// Display color.
    pub color: String,
    /// Content hash over material, color and mounts.
    pub hash: ContentHash,
    /// Mounts in production order.
    pub mounts: Vec<MountRecord>,
}

/// Everything one production run hands downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductionDocument {
    /// Interned tool controllers in index order.
    pub tool_controllers: Vec<ToolControllerRecord>,
    /// Solids in production order.
    pub solids: Vec<SolidRecord>,
}

impl ProductionDocument {
    /// Serialize every produced solid together with the controller table.
    ///
    /// Every operation must have been produced, except those cut off by a
    /// failed mount, which are written with that mount's failure.
    /// Serializing moves each produced operation to its final state.
    pub fn from_solids(solids: &mut [Solid], controllers: &ToolControllerTable) -> Result<Self> {
        let solids = solids.iter_mut().map(Solid::serialize).collect::<Result<Vec<_>>>()?;
        Ok(Self {
            tool_controllers: controllers.records(),
            solids,
        })
    }

    /// Pretty-printed JSON text.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Rebuild the controller table, resolving bit names through `bits`.
    ///
    /// Records must list controllers in index order with no repeats.
    pub fn controllers(&self, bits: &Bits) -> Result<ToolControllerTable> {
        let mut table = ToolControllerTable::new();
        for record in &self.tool_controllers {
            let mut controller = ToolController::new(bits.lookup(&record.bit)?.clone(), record.tool_number);
            controller.cooling = record.cooling;
            controller.spindle_direction = record.spindle_direction;
            controller.spindle_speed = record.spindle_speed;
            controller.horizontal_feed = record.horizontal_feed;
            controller.horizontal_rapid = record.horizontal_rapid;
            controller.vertical_feed = record.vertical_feed;
            controller.vertical_rapid = record.vertical_rapid;
            let index = table.intern(&controller);
            if index != record.index {
                return Err(FabError::schema(
                    "tool_controllers",
                    "index",
                    format!("expected {index}, found {}", record.index),
                ));
            }
        }
        Ok(table)
    }

    /// Re-record every solid, ready for a fresh production run.
    pub fn solids(&self, controllers: &ToolControllerTable) -> Result<Vec<Solid>> {
        self.solids
            .iter()
            .map(|record| Solid::from_record(record, controllers))
            .collect()
    }
}
