#![warn(missing_docs)]

//! Tool catalogs for fabcam.
//!
//! This crate holds the tooling data model that machining operations
//! reference: shapes, the ten bit kinds with their templates, tool
//! libraries, and the tool controller interning table shared by a
//! production run.
//!
//! # Example
//!
//! ```
//! use fabcam_tools::{
//!     BitTemplates, BitType, Bits, Library, Shapes, ToolController, ToolControllerTable,
//! };
//!
//! let shapes = Shapes::standard("Shape");
//! let templates = BitTemplates::standard();
//! let endmill = templates.get(BitType::EndMill)?.example(&shapes)?;
//!
//! // Bits round-trip through their JSON records.
//! let record = templates.to_json(&endmill)?;
//! assert_eq!(templates.from_json(&record, &shapes)?, endmill);
//!
//! let bits = Bits::new([endmill])?;
//! let library = Library::from_bindings("Default", &[(1, "5mm_Endmill")], &bits)?;
//!
//! let mut table = ToolControllerTable::new();
//! let controller = ToolController::new(library.lookup_number(1)?.clone(), 1);
//! assert_eq!(table.intern(&controller), 0);
//! assert_eq!(table.intern(&controller), 0);
//! # Ok::<(), fabcam_tools::ToolsError>(())
//! ```

mod attributes;
mod bit;
mod controller;
mod error;
mod library;
mod shape;
mod template;
mod value;

pub use attributes::Attributes;
pub use bit::{
    BallEnd, Bit, BitKind, BitType, Bits, BullNose, Chamfer, DoveTail, Drill, EndMill, Probe,
    SlittingSaw, ThreadMill, VGroove,
};
pub use controller::{
    Cooling, SpindleDirection, ToolController, ToolControllerRecord, ToolControllerTable,
};
pub use error::{Result, ToolsError};
pub use library::{Libraries, Library, LibraryEntry, LIBRARY_VERSION};
pub use shape::{Shape, Shapes, STANDARD_SHAPE_NAMES};
pub use template::{AttributeSpec, BitTemplate, BitTemplates, ParameterSpec, DIMENSION_TYPES};
pub use value::{describe_types, AttributeValue, Dimension, ValueType};
