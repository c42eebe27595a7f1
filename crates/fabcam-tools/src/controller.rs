//! Tool controllers and the per-run interning table.
//!
//! A [`ToolController`] pairs a bit with spindle and feed settings. During a
//! production run every operation resolves its controller through one
//! [`ToolControllerTable`], which hands out stable indices in first-seen
//! order so downstream consumers can refer to controllers by number.

use std::collections::HashMap;

use fabcam_math::{ContentHash, ContentHasher};
use serde::{Deserialize, Serialize};

use crate::bit::Bit;

/// Coolant mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Cooling {
    /// No coolant.
    #[default]
    None,
    /// Flood coolant.
    Flood,
    /// Mist coolant.
    Mist,
}

impl Cooling {
    fn as_str(self) -> &'static str {
        match self {
            Cooling::None => "None",
            Cooling::Flood => "Flood",
            Cooling::Mist => "Mist",
        }
    }
}

/// Spindle rotation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SpindleDirection {
    /// Clockwise (M3).
    #[default]
    Clockwise,
    /// Counter-clockwise (M4).
    CounterClockwise,
}

/// A bit with its speeds and feeds.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolController {
    /// The cutting bit.
    pub bit: Bit,
    /// Tool number in the machine's tool table.
    pub tool_number: u32,
    /// Coolant mode.
    pub cooling: Cooling,
    /// Spindle direction.
    pub spindle_direction: SpindleDirection,
    /// Spindle speed (RPM).
    pub spindle_speed: f64,
    /// Horizontal cutting feed (mm/min).
    pub horizontal_feed: f64,
    /// Horizontal rapid rate (mm/min).
    pub horizontal_rapid: f64,
    /// Vertical cutting feed (mm/min).
    pub vertical_feed: f64,
    /// Vertical rapid rate (mm/min).
    pub vertical_rapid: f64,
}

impl ToolController {
    /// Create a controller with default speeds and feeds.
    pub fn new(bit: Bit, tool_number: u32) -> Self {
        Self {
            bit,
            tool_number,
            cooling: Cooling::None,
            spindle_direction: SpindleDirection::Clockwise,
            spindle_speed: 12000.0,
            horizontal_feed: 1000.0,
            horizontal_rapid: 3000.0,
            vertical_feed: 300.0,
            vertical_rapid: 1000.0,
        }
    }

    /// Structural hash over the bit and every speed and feed.
    pub fn content_hash(&self) -> ContentHash {
        let mut hasher = ContentHasher::new("tool_controller");
        hasher
            .child(&self.bit.content_hash())
            .integer(i64::from(self.tool_number))
            .text(self.cooling.as_str())
            .flag(self.spindle_direction == SpindleDirection::Clockwise)
            .real(self.spindle_speed)
            .real(self.horizontal_feed)
            .real(self.horizontal_rapid)
            .real(self.vertical_feed)
            .real(self.vertical_rapid);
        hasher.finish()
    }

    /// The serialized record of this controller at `index`.
    pub fn record(&self, index: usize) -> ToolControllerRecord {
        ToolControllerRecord {
            index,
            bit: self.bit.name.clone(),
            tool_number: self.tool_number,
            cooling: self.cooling,
            spindle_direction: self.spindle_direction,
            spindle_speed: self.spindle_speed,
            horizontal_feed: self.horizontal_feed,
            horizontal_rapid: self.horizontal_rapid,
            vertical_feed: self.vertical_feed,
            vertical_rapid: self.vertical_rapid,
        }
    }
}

/// JSON record of an interned controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolControllerRecord {
    /// Index in the controller table.
    pub index: usize,
    /// Bit name.
    pub bit: String,
    /// Tool number.
    pub tool_number: u32,
    /// Coolant mode.
    pub cooling: Cooling,
    /// Spindle direction.
    pub spindle_direction: SpindleDirection,
    /// Spindle speed (RPM).
    pub spindle_speed: f64,
    /// Horizontal cutting feed (mm/min).
    pub horizontal_feed: f64,
    /// Horizontal rapid rate (mm/min).
    pub horizontal_rapid: f64,
    /// Vertical cutting feed (mm/min).
    pub vertical_feed: f64,
    /// Vertical rapid rate (mm/min).
    pub vertical_rapid: f64,
}

/// Append-only table of distinct tool controllers for one production run.
#[derive(Debug, Clone, Default)]
pub struct ToolControllerTable {
    controllers: Vec<ToolController>,
    index: HashMap<ContentHash, usize>,
}

impl ToolControllerTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of a structurally equal controller, appending `candidate` if
    /// none exists yet.
    pub fn intern(&mut self, candidate: &ToolController) -> usize {
        let key = candidate.content_hash();
        if let Some(&existing) = self.index.get(&key) {
            return existing;
        }
        let position = self.controllers.len();
        self.controllers.push(candidate.clone());
        self.index.insert(key, position);
        position
    }

    /// Index of `candidate` without interning it.
    pub fn position(&self, candidate: &ToolController) -> Option<usize> {
        self.index.get(&candidate.content_hash()).copied()
    }

    /// Controller at `index`.
    pub fn get(&self, index: usize) -> Option<&ToolController> {
        self.controllers.get(index)
    }

    /// Number of distinct controllers.
    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    /// True when nothing has been interned.
    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    /// Controllers in index order.
    pub fn iter(&self) -> impl Iterator<Item = &ToolController> {
        self.controllers.iter()
    }

    /// Records in index order.
    pub fn records(&self) -> Vec<ToolControllerRecord> {
        self.controllers
            .iter()
            .enumerate()
            .map(|(index, controller)| controller.record(index))
            .collect()
    }

    /// JSON array of records in index order.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!(self.records())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Shapes;
    use crate::template::BitTemplates;
    use crate::BitType;

    fn controller(bit_type: BitType, tool_number: u32) -> ToolController {
        let bit = BitTemplates::standard()
            .get(bit_type)
            .unwrap()
            .example(&Shapes::standard("Shape"))
            .unwrap();
        ToolController::new(bit, tool_number)
    }

    #[test]
    fn test_intern_same_value_twice() {
        let mut table = ToolControllerTable::new();
        let a = controller(BitType::EndMill, 1);
        assert_eq!(table.intern(&a), 0);
        assert_eq!(table.intern(&a.clone()), 0);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_intern_first_seen_order() {
        let mut table = ToolControllerTable::new();
        let drill = controller(BitType::Drill, 2);
        let endmill = controller(BitType::EndMill, 1);
        let mut fast = endmill.clone();
        fast.spindle_speed = 18000.0;

        assert_eq!(table.intern(&drill), 0);
        assert_eq!(table.intern(&endmill), 1);
        assert_eq!(table.intern(&fast), 2);
        assert_eq!(table.intern(&drill), 0);
        assert_eq!(table.get(1), Some(&endmill));
        assert_eq!(table.position(&fast), Some(2));
    }

    #[test]
    fn test_replay_is_deterministic() {
        let sequence = [
            controller(BitType::V, 3),
            controller(BitType::EndMill, 1),
            controller(BitType::V, 3),
            controller(BitType::Drill, 2),
        ];
        let replay = || {
            let mut table = ToolControllerTable::new();
            sequence.iter().map(|c| table.intern(c)).collect::<Vec<_>>()
        };
        assert_eq!(replay(), [0, 1, 0, 2]);
        assert_eq!(replay(), replay());
    }

    #[test]
    fn test_records() {
        let mut table = ToolControllerTable::new();
        let mut mist = controller(BitType::EndMill, 1);
        mist.cooling = Cooling::Mist;
        table.intern(&mist);
        let json = table.to_json();
        assert_eq!(json[0]["index"], 0);
        assert_eq!(json[0]["bit"], "5mm_Endmill");
        assert_eq!(json[0]["cooling"], "Mist");
        assert_eq!(json[0]["spindle_direction"], "Clockwise");
        let records: Vec<ToolControllerRecord> = serde_json::from_value(json).unwrap();
        assert_eq!(records, table.records());
    }
}
