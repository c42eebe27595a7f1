#![warn(missing_docs)]

//! Machining operation production and change detection.
//!
//! A [`Solid`] owns [`Mount`]s, each an oriented work plane with an ordered
//! ledger of [`Operation`]s (extrude, pocket and hole groups). Every
//! operation carries a structural content hash that rolls up through its
//! mount and solid, so a rebuild can tell exactly which kernel work changed.
//! Production runs through one [`ToolControllerTable`] per run and emits a
//! [`ProductionDocument`] for the downstream post-processor.
//!
//! # Example
//!
//! ```
//! use fabcam::{
//!     produce_solids, Circle, Geometries, MockKernel, Point3, Polygon, ProductionDocument,
//!     ProductionSettings, Solid, ToolControllerTable, Vec3,
//! };
//!
//! let mut solid = Solid::new("plate", "aluminum", "silver");
//! let top = solid.mount("top", Point3::new(0.0, 0.0, 10.0), Vec3::z(), Vec3::y(), 10.0)?;
//! top.extrude("outline", Geometries::single(Polygon::rectangle((0.0, 0.0), (40.0, 40.0), 10.0)), 10.0, true);
//! top.pocket("bore", Geometries::single(Circle::new(Point3::new(20.0, 20.0, 10.0), Vec3::z(), 12.0)), 3.0);
//!
//! let settings = ProductionSettings::default();
//! let mut controllers = ToolControllerTable::new();
//! let mut solids = vec![solid];
//! let mut kernel = MockKernel::from_settings(&settings);
//! let production = produce_solids(&mut solids, &mut controllers, &mut kernel, &settings, None);
//! let report = production.report.into_result()?;
//! assert_eq!(report.produced, 2);
//!
//! let document = ProductionDocument::from_solids(&mut solids, &controllers)?;
//! assert!(document.to_json()?.contains("\"kind\": \"pocket\""));
//! # Ok::<(), fabcam::FabError>(())
//! ```

mod error;
mod geometry;
mod join;
mod kernel;
mod mount;
mod operation;
mod production;
mod record;
mod settings;
mod solid;
mod stock;

pub use error::{FabError, MountFailure, Result};
pub use geometry::{Circle, Corner, CornerRecord, Geometries, Geometry, GeometryRecord, Polygon};
pub use join::{Fasten, HoleKind, Join, ThreadProfile};
pub use kernel::{GeometryKernel, KernelCall, KernelError, KernelHandle, KernelOutput, MockKernel};
pub use mount::Mount;
pub use operation::{HoleKey, Operation, OperationKind, OperationState};
pub use production::{
    produce_solids, produce_solids_parallel, BuildCache, KernelPass, Production, ProductionContext,
    ProductionReport, SolidReport,
};
pub use record::{MountRecord, OperationRecord, ProductionDocument, SolidRecord};
pub use settings::ProductionSettings;
pub use solid::Solid;
pub use stock::Stock;

pub use fabcam_math::{BoundingBox, ContentHash, Plane, Point3, Tolerance, Vec3};
pub use fabcam_tools::{ToolController, ToolControllerTable};
