//! Tool bit definitions.
//!
//! A [`Bit`] is a common header (name, source file, shape, attributes) plus
//! a [`BitKind`] payload holding the dimensions of one of the ten bit kinds.
//! Every dimension is keyed by the PascalCase name used in bit records.

use std::fmt;
use std::path::PathBuf;

use fabcam_math::{ContentHash, ContentHasher};

use crate::attributes::Attributes;
use crate::error::{Result, ToolsError};
use crate::shape::Shape;
use crate::value::Dimension;

macro_rules! bit_dimensions {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$field_meta:meta])* $field:ident => $key:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            $( $(#[$field_meta])* pub $field: Dimension, )+
        }

        impl $name {
            /// Record keys of every dimension, in record order.
            pub const KEYS: &'static [&'static str] = &[$($key),+];

            fn dimensions(&self) -> Vec<(&'static str, &Dimension)> {
                vec![$(($key, &self.$field)),+]
            }

            fn from_dimensions(
                mut take: impl FnMut(&'static str) -> Result<Dimension>,
            ) -> Result<Self> {
                Ok(Self {
                    $( $field: take($key)?, )+
                })
            }
        }
    };
}

bit_dimensions! {
    /// Ball end mill dimensions.
    BallEnd {
        /// Height of the cutting flutes.
        cutting_edge_height => "CuttingEdgeHeight",
        /// Cutting diameter.
        diameter => "Diameter",
        /// Overall length.
        length => "Length",
        /// Shank diameter.
        shank_diameter => "ShankDiameter",
    }
}

bit_dimensions! {
    /// Bull nose (corner radius) end mill dimensions.
    BullNose {
        /// Height of the cutting flutes.
        cutting_edge_height => "CuttingEdgeHeight",
        /// Cutting diameter.
        diameter => "Diameter",
        /// Radius of the flat bottom.
        flat_radius => "FlatRadius",
        /// Overall length.
        length => "Length",
        /// Shank diameter.
        shank_diameter => "ShankDiameter",
    }
}

bit_dimensions! {
    /// Chamfer bit dimensions.
    Chamfer {
        /// Included cutting angle.
        cutting_edge_angle => "CuttingEdgeAngle",
        /// Height of the cutting edge.
        cutting_edge_height => "CuttingEdgeHeight",
        /// Widest cutting diameter.
        diameter => "Diameter",
        /// Overall length.
        length => "Length",
        /// Shank diameter.
        shank_diameter => "ShankDiameter",
        /// Diameter at the tip.
        tip_diameter => "TipDiameter",
    }
}

bit_dimensions! {
    /// Dove tail cutter dimensions.
    DoveTail {
        /// Cutting angle of the dove tail flank.
        cutting_edge_angle => "CuttingEdgeAngle",
        /// Height of the cutting edge.
        cutting_edge_height => "CuttingEdgeHeight",
        /// Widest cutting diameter.
        diameter => "Diameter",
        /// Overall length.
        length => "Length",
        /// Neck diameter.
        neck_diameter => "NeckDiameter",
        /// Neck height.
        neck_height => "NeckHeight",
        /// Shank diameter.
        shank_diameter => "ShankDiameter",
        /// Diameter at the tip.
        tip_diameter => "TipDiameter",
    }
}

bit_dimensions! {
    /// Twist drill dimensions.
    Drill {
        /// Drill diameter.
        diameter => "Diameter",
        /// Overall length.
        length => "Length",
        /// Included point angle.
        tip_angle => "TipAngle",
    }
}

bit_dimensions! {
    /// Flat end mill dimensions.
    EndMill {
        /// Height of the cutting flutes.
        cutting_edge_height => "CuttingEdgeHeight",
        /// Cutting diameter.
        diameter => "Diameter",
        /// Overall length.
        length => "Length",
        /// Shank diameter.
        shank_diameter => "ShankDiameter",
    }
}

bit_dimensions! {
    /// Touch probe dimensions.
    Probe {
        /// Ball diameter.
        diameter => "Diameter",
        /// Overall length.
        length => "Length",
        /// Shaft diameter.
        shaft_diameter => "ShaftDiameter",
    }
}

bit_dimensions! {
    /// Slitting saw dimensions.
    SlittingSaw {
        /// Blade thickness.
        blade_thickness => "BladeThickness",
        /// Clamp cap diameter.
        cap_diameter => "CapDiameter",
        /// Clamp cap height.
        cap_height => "CapHeight",
        /// Blade diameter.
        diameter => "Diameter",
        /// Overall length.
        length => "Length",
        /// Shank diameter.
        shank_diameter => "ShankDiameter",
    }
}

bit_dimensions! {
    /// Thread mill dimensions.
    ThreadMill {
        /// Crest width.
        crest => "Crest",
        /// Thread profile angle.
        cutting_angle => "CuttingAngle",
        /// Major cutting diameter.
        diameter => "Diameter",
        /// Overall length.
        length => "Length",
        /// Neck diameter.
        neck_diameter => "NeckDiameter",
        /// Neck length.
        neck_length => "NeckLength",
        /// Shank diameter.
        shank_diameter => "ShankDiameter",
    }
}

bit_dimensions! {
    /// V-groove engraving bit dimensions.
    VGroove {
        /// Included cutting angle.
        cutting_edge_angle => "CuttingEdgeAngle",
        /// Height of the cutting edge.
        cutting_edge_height => "CuttingEdgeHeight",
        /// Widest cutting diameter.
        diameter => "Diameter",
        /// Overall length.
        length => "Length",
        /// Shank diameter.
        shank_diameter => "ShankDiameter",
        /// Diameter at the tip.
        tip_diameter => "TipDiameter",
    }
}

/// The ten bit kinds, without their dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BitType {
    /// Ball end mill.
    BallEnd,
    /// Bull nose end mill.
    BullNose,
    /// Chamfer bit.
    Chamfer,
    /// Dove tail cutter.
    DoveTail,
    /// Twist drill.
    Drill,
    /// Flat end mill.
    EndMill,
    /// Touch probe.
    Probe,
    /// Slitting saw.
    SlittingSaw,
    /// Thread mill.
    ThreadMill,
    /// V-groove bit.
    V,
}

impl BitType {
    /// Every bit type, in record-name order.
    pub const ALL: [BitType; 10] = [
        BitType::BallEnd,
        BitType::BullNose,
        BitType::Chamfer,
        BitType::DoveTail,
        BitType::Drill,
        BitType::EndMill,
        BitType::Probe,
        BitType::SlittingSaw,
        BitType::ThreadMill,
        BitType::V,
    ];

    /// Name written to the `kind` field of bit records.
    pub fn as_str(self) -> &'static str {
        match self {
            BitType::BallEnd => "BallEnd",
            BitType::BullNose => "BullNose",
            BitType::Chamfer => "Chamfer",
            BitType::DoveTail => "DoveTail",
            BitType::Drill => "Drill",
            BitType::EndMill => "EndMill",
            BitType::Probe => "Probe",
            BitType::SlittingSaw => "SlittingSaw",
            BitType::ThreadMill => "ThreadMill",
            BitType::V => "V",
        }
    }

    /// Parse a record `kind` name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// Record keys of this type's dimensions.
    pub fn dimension_keys(self) -> &'static [&'static str] {
        match self {
            BitType::BallEnd => BallEnd::KEYS,
            BitType::BullNose => BullNose::KEYS,
            BitType::Chamfer => Chamfer::KEYS,
            BitType::DoveTail => DoveTail::KEYS,
            BitType::Drill => Drill::KEYS,
            BitType::EndMill => EndMill::KEYS,
            BitType::Probe => Probe::KEYS,
            BitType::SlittingSaw => SlittingSaw::KEYS,
            BitType::ThreadMill => ThreadMill::KEYS,
            BitType::V => VGroove::KEYS,
        }
    }
}

impl fmt::Display for BitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific bit dimensions.
#[derive(Debug, Clone, PartialEq)]
pub enum BitKind {
    /// Ball end mill.
    BallEnd(BallEnd),
    /// Bull nose end mill.
    BullNose(BullNose),
    /// Chamfer bit.
    Chamfer(Chamfer),
    /// Dove tail cutter.
    DoveTail(DoveTail),
    /// Twist drill.
    Drill(Drill),
    /// Flat end mill.
    EndMill(EndMill),
    /// Touch probe.
    Probe(Probe),
    /// Slitting saw.
    SlittingSaw(SlittingSaw),
    /// Thread mill.
    ThreadMill(ThreadMill),
    /// V-groove bit.
    V(VGroove),
}

impl BitKind {
    /// The bit type of this payload.
    pub fn bit_type(&self) -> BitType {
        match self {
            BitKind::BallEnd(_) => BitType::BallEnd,
            BitKind::BullNose(_) => BitType::BullNose,
            BitKind::Chamfer(_) => BitType::Chamfer,
            BitKind::DoveTail(_) => BitType::DoveTail,
            BitKind::Drill(_) => BitType::Drill,
            BitKind::EndMill(_) => BitType::EndMill,
            BitKind::Probe(_) => BitType::Probe,
            BitKind::SlittingSaw(_) => BitType::SlittingSaw,
            BitKind::ThreadMill(_) => BitType::ThreadMill,
            BitKind::V(_) => BitType::V,
        }
    }

    /// `(record key, dimension)` pairs in record order.
    pub fn dimensions(&self) -> Vec<(&'static str, &Dimension)> {
        match self {
            BitKind::BallEnd(d) => d.dimensions(),
            BitKind::BullNose(d) => d.dimensions(),
            BitKind::Chamfer(d) => d.dimensions(),
            BitKind::DoveTail(d) => d.dimensions(),
            BitKind::Drill(d) => d.dimensions(),
            BitKind::EndMill(d) => d.dimensions(),
            BitKind::Probe(d) => d.dimensions(),
            BitKind::SlittingSaw(d) => d.dimensions(),
            BitKind::ThreadMill(d) => d.dimensions(),
            BitKind::V(d) => d.dimensions(),
        }
    }

    /// Build a payload of `bit_type`, pulling each dimension from `take`.
    pub fn from_dimensions(
        bit_type: BitType,
        take: impl FnMut(&'static str) -> Result<Dimension>,
    ) -> Result<Self> {
        Ok(match bit_type {
            BitType::BallEnd => BitKind::BallEnd(BallEnd::from_dimensions(take)?),
            BitType::BullNose => BitKind::BullNose(BullNose::from_dimensions(take)?),
            BitType::Chamfer => BitKind::Chamfer(Chamfer::from_dimensions(take)?),
            BitType::DoveTail => BitKind::DoveTail(DoveTail::from_dimensions(take)?),
            BitType::Drill => BitKind::Drill(Drill::from_dimensions(take)?),
            BitType::EndMill => BitKind::EndMill(EndMill::from_dimensions(take)?),
            BitType::Probe => BitKind::Probe(Probe::from_dimensions(take)?),
            BitType::SlittingSaw => BitKind::SlittingSaw(SlittingSaw::from_dimensions(take)?),
            BitType::ThreadMill => BitKind::ThreadMill(ThreadMill::from_dimensions(take)?),
            BitType::V => BitKind::V(VGroove::from_dimensions(take)?),
        })
    }

    /// Cutting diameter.
    pub fn diameter(&self) -> &Dimension {
        match self {
            BitKind::BallEnd(d) => &d.diameter,
            BitKind::BullNose(d) => &d.diameter,
            BitKind::Chamfer(d) => &d.diameter,
            BitKind::DoveTail(d) => &d.diameter,
            BitKind::Drill(d) => &d.diameter,
            BitKind::EndMill(d) => &d.diameter,
            BitKind::Probe(d) => &d.diameter,
            BitKind::SlittingSaw(d) => &d.diameter,
            BitKind::ThreadMill(d) => &d.diameter,
            BitKind::V(d) => &d.diameter,
        }
    }
}

/// A concrete cutting tool.
#[derive(Debug, Clone, PartialEq)]
pub struct Bit {
    /// Bit name, unique within a bit catalog.
    pub name: String,
    /// File the bit was loaded from, if any.
    pub source: Option<PathBuf>,
    /// The shape this bit is built on.
    pub shape: Shape,
    /// Non-geometric attributes.
    pub attributes: Attributes,
    /// Kind-specific dimensions.
    pub kind: BitKind,
}

impl Bit {
    /// Create a bit with no source file.
    pub fn new(name: impl Into<String>, shape: Shape, attributes: Attributes, kind: BitKind) -> Self {
        Self {
            name: name.into(),
            source: None,
            shape,
            attributes,
            kind,
        }
    }

    /// Set the file the bit came from.
    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// The bit type.
    pub fn bit_type(&self) -> BitType {
        self.kind.bit_type()
    }

    /// Structural hash over name, type, shape, dimensions and attributes.
    ///
    /// The source file does not contribute.
    pub fn content_hash(&self) -> ContentHash {
        let mut hasher = ContentHasher::new("bit");
        hasher
            .text(&self.name)
            .text(self.bit_type().as_str())
            .text(&self.shape.name);
        let dimensions = self.kind.dimensions();
        hasher.count(dimensions.len());
        for (key, dimension) in dimensions {
            hasher.text(key);
            dimension.hash_into(&mut hasher);
        }
        self.attributes.hash_into(&mut hasher);
        hasher.finish()
    }
}

/// A name-sorted bit catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bits {
    bits: Vec<Bit>,
}

impl Bits {
    /// Build a catalog, rejecting repeated names.
    pub fn new(bits: impl IntoIterator<Item = Bit>) -> Result<Self> {
        let mut bits: Vec<Bit> = bits.into_iter().collect();
        bits.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(pair) = bits.windows(2).find(|pair| pair[0].name == pair[1].name) {
            return Err(ToolsError::duplicate("bit", &pair[0].name));
        }
        Ok(Self { bits })
    }

    /// Exact-match lookup.
    pub fn lookup(&self, name: &str) -> Result<&Bit> {
        self.bits
            .binary_search_by(|bit| bit.name.as_str().cmp(name))
            .map(|index| &self.bits[index])
            .map_err(|_| ToolsError::not_found("bit", name))
    }

    /// Bits in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Bit> {
        self.bits.iter()
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// True when the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }
}
