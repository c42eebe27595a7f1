//! Bit templates: per-kind schemas used to validate and marshal bits.
//!
//! A template lists the required dimensions of its bit kind and the
//! optional attributes it accepts, each with an example value. Records are
//! JSON objects of the form
//!
//! ```text
//! {"kind": "EndMill", "name": "5mm_Endmill", "source": "Bit/5mm_Endmill.fctb",
//!  "shape": "endmill", "attributes": [["Flutes", 2], ["Material", "HSS"]],
//!  "CuttingEdgeHeight": "30.000 mm", "Diameter": 5.0, ...}
//! ```
//!
//! where `source` and `attributes` may be omitted and every other field is
//! required. Unknown fields are rejected.

use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::attributes::Attributes;
use crate::bit::{Bit, BitKind, BitType};
use crate::error::{Result, ToolsError};
use crate::shape::Shapes;
use crate::value::{describe_types, AttributeValue, Dimension, ValueType};

/// Value types accepted by every bit dimension.
pub const DIMENSION_TYPES: [ValueType; 2] = [ValueType::Real, ValueType::Text];

const HEADER_FIELDS: [&str; 5] = ["kind", "name", "source", "shape", "attributes"];

/// A required bit dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    /// Record key.
    pub name: &'static str,
    /// Example value.
    pub example: Dimension,
}

/// An optional bit attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSpec {
    /// Attribute name.
    pub name: String,
    /// Accepted value types.
    pub types: Vec<ValueType>,
    /// Example value.
    pub example: AttributeValue,
}

impl AttributeSpec {
    /// Create an attribute spec.
    pub fn new(name: impl Into<String>, types: &[ValueType], example: impl Into<AttributeValue>) -> Self {
        Self {
            name: name.into(),
            types: types.to_vec(),
            example: example.into(),
        }
    }

    fn accepts(&self, value: &AttributeValue) -> bool {
        let value_type = value.value_type();
        self.types.contains(&value_type)
            || (value_type == ValueType::Integer && self.types.contains(&ValueType::Real))
    }

    /// Read a JSON value, narrowing it to the first accepted type it fits.
    ///
    /// Integers stay integers wherever `accepts` admits them, so a bit that
    /// validates reads back unchanged.
    fn coerce(&self, value: &Value) -> Option<AttributeValue> {
        if let Some(integer) = value.as_i64().map(AttributeValue::Integer) {
            if self.accepts(&integer) {
                return Some(integer);
            }
        }
        self.types.iter().find(|t| t.accepts(value)).and_then(|t| match t {
            ValueType::Integer => value.as_i64().map(AttributeValue::Integer),
            ValueType::Real => value.as_f64().map(AttributeValue::Real),
            ValueType::Text => value.as_str().map(AttributeValue::from),
            ValueType::Flag => value.as_bool().map(AttributeValue::Flag),
        })
    }
}

/// Schema for one bit kind.
#[derive(Debug, Clone, PartialEq)]
pub struct BitTemplate {
    /// The bit kind this template describes.
    pub bit_type: BitType,
    /// Name of the template's example bit.
    pub example_name: String,
    /// Name of the shape the example bit uses.
    pub shape_name: String,
    /// Required dimensions, in record order.
    pub parameters: Vec<ParameterSpec>,
    /// Optional attributes.
    pub attributes: Vec<AttributeSpec>,
}

impl BitTemplate {
    /// Create a template. `examples` are given in dimension key order.
    pub fn new(
        bit_type: BitType,
        example_name: &str,
        shape_name: &str,
        examples: &[&str],
        attributes: Vec<AttributeSpec>,
    ) -> Self {
        let parameters = bit_type
            .dimension_keys()
            .iter()
            .zip(examples)
            .map(|(name, example)| ParameterSpec {
                name: *name,
                example: Dimension::from(*example),
            })
            .collect();
        Self {
            bit_type,
            example_name: example_name.to_string(),
            shape_name: shape_name.to_string(),
            parameters,
            attributes,
        }
    }

    fn attribute(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|spec| spec.name == name)
    }

    /// Check that `bit` is of this template's kind and carries only
    /// declared attributes of accepted types.
    pub fn validate(&self, bit: &Bit) -> Result<()> {
        if bit.bit_type() != self.bit_type {
            return Err(ToolsError::schema(
                &bit.name,
                "kind",
                format!("must be `{}`, found `{}`", self.bit_type, bit.bit_type()),
            ));
        }
        for (name, value) in bit.attributes.iter() {
            let spec = self
                .attribute(name)
                .ok_or_else(|| ToolsError::schema(&bit.name, name, "is not an attribute of this bit kind"))?;
            if !spec.accepts(value) {
                return Err(ToolsError::schema(
                    &bit.name,
                    name,
                    format!("must be one of {}", describe_types(&spec.types)),
                ));
            }
        }
        Ok(())
    }

    /// Marshal `bit` into its JSON record.
    pub fn to_json(&self, bit: &Bit) -> Result<Value> {
        self.validate(bit)?;
        let mut record = Map::new();
        record.insert("kind".into(), Value::from(self.bit_type.as_str()));
        record.insert("name".into(), Value::from(bit.name.as_str()));
        if let Some(source) = &bit.source {
            record.insert("source".into(), Value::from(source.to_string_lossy().into_owned()));
        }
        record.insert("shape".into(), Value::from(bit.shape.name.as_str()));
        record.insert("attributes".into(), bit.attributes.to_json());
        for (key, dimension) in bit.kind.dimensions() {
            record.insert(key.into(), dimension.to_json());
        }
        Ok(Value::Object(record))
    }

    /// Validate a JSON record and build its bit, resolving the shape
    /// through `shapes`.
    pub fn from_json(&self, record: &Value, shapes: &Shapes) -> Result<Bit> {
        let context = format!("{} bit", self.bit_type);
        let object = record
            .as_object()
            .ok_or_else(|| ToolsError::schema(&context, "<record>", "must be a JSON object"))?;

        let keys = self.bit_type.dimension_keys();
        if let Some(unknown) = object
            .keys()
            .find(|key| !HEADER_FIELDS.contains(&key.as_str()) && !keys.contains(&key.as_str()))
        {
            return Err(ToolsError::schema(&context, unknown, "is not a known field"));
        }

        let kind = required_text(object, &context, "kind")?;
        if kind != self.bit_type.as_str() {
            return Err(ToolsError::schema(
                &context,
                "kind",
                format!("must be `{}`, found `{kind}`", self.bit_type),
            ));
        }
        let name = required_text(object, &context, "name")?.to_string();
        let source = match object.get("source") {
            None => None,
            Some(Value::String(path)) => Some(PathBuf::from(path)),
            Some(_) => return Err(ToolsError::schema(&name, "source", "must be one of (str)")),
        };
        let shape = shapes.lookup(required_text(object, &name, "shape")?)?.clone();
        let attributes = self.attributes_from_json(&name, object.get("attributes"))?;
        let kind = BitKind::from_dimensions(self.bit_type, |key| {
            let value = object
                .get(key)
                .ok_or_else(|| ToolsError::schema(&name, key, "is missing"))?;
            Dimension::from_json(value).ok_or_else(|| {
                ToolsError::schema(&name, key, format!("must be one of {}", describe_types(&DIMENSION_TYPES)))
            })
        })?;

        Ok(Bit {
            name,
            source,
            shape,
            attributes,
            kind,
        })
    }

    fn attributes_from_json(&self, context: &str, value: Option<&Value>) -> Result<Attributes> {
        let mut attributes = Attributes::new();
        let Some(value) = value else {
            return Ok(attributes);
        };
        let pairs = value
            .as_array()
            .ok_or_else(|| ToolsError::schema(context, "attributes", "must be a list of [name, value] pairs"))?;
        for pair in pairs {
            let (name, value) = match pair.as_array().map(Vec::as_slice) {
                Some([Value::String(name), value]) => (name, value),
                _ => {
                    return Err(ToolsError::schema(
                        context,
                        "attributes",
                        "must be a list of [name, value] pairs",
                    ))
                }
            };
            let spec = self
                .attribute(name)
                .ok_or_else(|| ToolsError::schema(context, name, "is not an attribute of this bit kind"))?;
            let value = spec.coerce(value).ok_or_else(|| {
                ToolsError::schema(context, name, format!("must be one of {}", describe_types(&spec.types)))
            })?;
            attributes
                .insert(name.as_str(), value)
                .map_err(|_| ToolsError::schema(context, name, "appears more than once"))?;
        }
        Ok(attributes)
    }

    /// The template's example bit.
    pub fn example(&self, shapes: &Shapes) -> Result<Bit> {
        let shape = shapes.lookup(&self.shape_name)?.clone();
        let attributes = Attributes::from_pairs(
            self.attributes
                .iter()
                .map(|spec| (spec.name.clone(), spec.example.clone())),
        )?;
        let kind = BitKind::from_dimensions(self.bit_type, |key| {
            self.parameters
                .iter()
                .find(|spec| spec.name == key)
                .map(|spec| spec.example.clone())
                .ok_or_else(|| ToolsError::schema(&self.example_name, key, "has no example value"))
        })?;
        Ok(Bit::new(self.example_name.clone(), shape, attributes, kind))
    }
}

fn required_text<'a>(object: &'a Map<String, Value>, context: &str, field: &str) -> Result<&'a str> {
    match object.get(field) {
        None => Err(ToolsError::schema(context, field, "is missing")),
        Some(Value::String(text)) => Ok(text),
        Some(_) => Err(ToolsError::schema(context, field, "must be one of (str)")),
    }
}

/// The registry of bit templates, one per bit kind.
#[derive(Debug, Clone, PartialEq)]
pub struct BitTemplates {
    templates: Vec<BitTemplate>,
}

impl BitTemplates {
    /// The ten standard templates.
    pub fn standard() -> Self {
        use ValueType::{Flag, Integer, Text};

        let cutter = |flutes: i64| {
            vec![
                AttributeSpec::new("Flutes", &[Integer], flutes),
                AttributeSpec::new("Material", &[Text], "HSS"),
            ]
        };
        let templates = vec![
            BitTemplate::new(
                BitType::BallEnd,
                "6mm_Ball_End",
                "ballend",
                &["40.0000 mm", "5.000 mm", "50.000 mm", "3.000 mm"],
                cutter(2),
            ),
            BitTemplate::new(
                BitType::BullNose,
                "6mm_Bull_Nose",
                "bullnose",
                &["40.0000 mm", "5.000 mm", "1.5000 mm", "50.000 mm", "3.000 mm"],
                cutter(2),
            ),
            BitTemplate::new(
                BitType::Chamfer,
                "45degree_chamfer",
                "chamfer",
                &["60.000 °", "6.350 mm", "12.000 mm", "30.000 mm", "6.350 mm", "5.000 mm"],
                cutter(2),
            ),
            BitTemplate::new(
                BitType::DoveTail,
                "no_dovetail_yet",
                "dovetail",
                &[
                    "60.000 °",
                    "9.000 mm",
                    "19.050 mm",
                    "54.200 mm",
                    "8.000 mm",
                    "5.000 mm",
                    "9.525 mm",
                    "5.000 mm",
                ],
                cutter(2),
            ),
            BitTemplate::new(
                BitType::Drill,
                "5mm_Drill",
                "drill",
                &["3.000 mm", "50.000 mm", "119.000 °"],
                cutter(2),
            ),
            BitTemplate::new(
                BitType::EndMill,
                "5mm_Endmill",
                "endmill",
                &["30.000 mm", "5.000 mm", "50.000 mm", "3.000 mm"],
                cutter(2),
            ),
            BitTemplate::new(
                BitType::Probe,
                "probe",
                "probe",
                &["6.000 mm", "50.000 mm", "4.000 mm"],
                vec![AttributeSpec::new("Spindle Power", &[Flag], false)],
            ),
            BitTemplate::new(
                BitType::SlittingSaw,
                "slittingsaw",
                "slittingsaw",
                &["3.000 mm", "8.000 mm", "3.000 mm", "76.200 mm", "50.000 mm", "19.050 mm"],
                cutter(30),
            ),
            BitTemplate::new(
                BitType::ThreadMill,
                "5mm-thread-cutter",
                "thread-mill",
                &[
                    "0.100 mm",
                    "60.000 °",
                    "5.000 mm",
                    "50.000 mm",
                    "3.000 mm",
                    "20.000 mm",
                    "5.000 mm",
                ],
                cutter(10),
            ),
            BitTemplate::new(
                BitType::V,
                "60degree_VBit",
                "v-bit",
                &["90.000 °", "1.000 mm", "10.000 mm", "20.000 mm", "5.000 mm", "1.000 mm"],
                cutter(4),
            ),
        ];
        Self { templates }
    }

    /// Template for `bit_type`.
    pub fn get(&self, bit_type: BitType) -> Result<&BitTemplate> {
        self.templates
            .iter()
            .find(|template| template.bit_type == bit_type)
            .ok_or_else(|| ToolsError::not_found("bit template", bit_type))
    }

    /// Templates in bit type order.
    pub fn iter(&self) -> impl Iterator<Item = &BitTemplate> {
        self.templates.iter()
    }

    /// Marshal any bit through its kind's template.
    pub fn to_json(&self, bit: &Bit) -> Result<Value> {
        self.get(bit.bit_type())?.to_json(bit)
    }

    /// Read a bit record, dispatching on its `kind` field.
    pub fn from_json(&self, record: &Value, shapes: &Shapes) -> Result<Bit> {
        let kind = record
            .get("kind")
            .ok_or_else(|| ToolsError::schema("bit", "kind", "is missing"))?;
        let name = kind
            .as_str()
            .ok_or_else(|| ToolsError::schema("bit", "kind", "must be one of (str)"))?;
        let bit_type = BitType::from_name(name)
            .ok_or_else(|| ToolsError::schema("bit", "kind", format!("`{name}` is not a bit kind")))?;
        self.get(bit_type)?.from_json(record, shapes)
    }
}

impl Default for BitTemplates {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn setup() -> (BitTemplates, Shapes) {
        (BitTemplates::standard(), Shapes::standard("Shape"))
    }

    #[test]
    fn test_every_example_roundtrips() {
        let (templates, shapes) = setup();
        for template in templates.iter() {
            let bit = template.example(&shapes).unwrap();
            assert_eq!(bit.bit_type(), template.bit_type);
            let record = templates.to_json(&bit).unwrap();
            assert_eq!(record["kind"], json!(template.bit_type.as_str()));
            let parsed = templates.from_json(&record, &shapes).unwrap();
            assert_eq!(parsed, bit, "{} did not roundtrip", template.bit_type);
        }
    }

    #[test]
    fn test_roundtrip_with_source_and_literal_dimensions() {
        let (templates, shapes) = setup();
        let template = templates.get(BitType::Drill).unwrap();
        let mut bit = template.example(&shapes).unwrap().with_source("Bit/5mm_Drill.fctb");
        if let BitKind::Drill(drill) = &mut bit.kind {
            drill.diameter = Dimension::Value(5.0);
            drill.tip_angle = Dimension::Symbol("D1".into());
        }
        let record = template.to_json(&bit).unwrap();
        assert_eq!(record["source"], json!("Bit/5mm_Drill.fctb"));
        assert_eq!(record["Diameter"], json!(5.0));
        assert_eq!(template.from_json(&record, &shapes).unwrap(), bit);
    }

    #[test]
    fn test_example_attributes() {
        let (templates, shapes) = setup();
        let saw = templates.get(BitType::SlittingSaw).unwrap().example(&shapes).unwrap();
        assert_eq!(saw.attributes.get("Flutes"), Some(&AttributeValue::Integer(30)));
        let probe = templates.get(BitType::Probe).unwrap().example(&shapes).unwrap();
        assert_eq!(probe.attributes.get("Spindle Power"), Some(&AttributeValue::Flag(false)));
        assert_eq!(probe.shape.name, "probe");
    }

    fn endmill_record() -> Value {
        json!({
            "kind": "EndMill",
            "name": "3mm",
            "shape": "endmill",
            "attributes": [["Flutes", 3]],
            "CuttingEdgeHeight": 12.0,
            "Diameter": 3.0,
            "Length": 40.0,
            "ShankDiameter": "3.000 mm"
        })
    }

    fn violation_field(result: Result<Bit>) -> String {
        match result {
            Err(ToolsError::SchemaViolation { field, .. }) => field,
            other => panic!("expected a schema violation, got {other:?}"),
        }
    }

    #[test]
    fn test_attributes_optional() {
        let (templates, shapes) = setup();
        let mut record = endmill_record();
        record.as_object_mut().unwrap().remove("attributes");
        let bit = templates.from_json(&record, &shapes).unwrap();
        assert!(bit.attributes.is_empty());
        assert_eq!(bit.source, None);
    }

    #[test]
    fn test_missing_parameter_rejected() {
        let (templates, shapes) = setup();
        let mut record = endmill_record();
        record.as_object_mut().unwrap().remove("Length");
        assert_eq!(violation_field(templates.from_json(&record, &shapes)), "Length");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let (templates, shapes) = setup();
        let mut record = endmill_record();
        record["TipAngle"] = json!(118.0);
        assert_eq!(violation_field(templates.from_json(&record, &shapes)), "TipAngle");
    }

    #[test]
    fn test_wrong_types_rejected() {
        let (templates, shapes) = setup();

        let mut record = endmill_record();
        record["Diameter"] = json!(true);
        assert_eq!(violation_field(templates.from_json(&record, &shapes)), "Diameter");

        let mut record = endmill_record();
        record["attributes"] = json!([["Flutes", "three"]]);
        assert_eq!(violation_field(templates.from_json(&record, &shapes)), "Flutes");

        let mut record = endmill_record();
        record["attributes"] = json!([["Coating", "TiN"]]);
        assert_eq!(violation_field(templates.from_json(&record, &shapes)), "Coating");

        let mut record = endmill_record();
        record["name"] = json!(7);
        assert_eq!(violation_field(templates.from_json(&record, &shapes)), "name");
    }

    #[test]
    fn test_kind_checked() {
        let (templates, shapes) = setup();
        let mut record = endmill_record();
        record["kind"] = json!("Router");
        assert_eq!(violation_field(templates.from_json(&record, &shapes)), "kind");

        let drill = templates.get(BitType::Drill).unwrap();
        assert_eq!(violation_field(drill.from_json(&endmill_record(), &shapes)), "CuttingEdgeHeight");
    }

    #[test]
    fn test_unknown_shape_is_not_found() {
        let (templates, shapes) = setup();
        let mut record = endmill_record();
        record["shape"] = json!("corncob");
        assert!(matches!(
            templates.from_json(&record, &shapes),
            Err(ToolsError::NotFound { kind: "shape", .. })
        ));
    }

    #[test]
    fn test_integer_in_real_attribute_roundtrips() {
        let (_, shapes) = setup();
        let mut template = BitTemplates::standard().get(BitType::EndMill).unwrap().clone();
        template
            .attributes
            .push(AttributeSpec::new("Helix", &[ValueType::Real], 30.0));
        let mut bit = template.example(&shapes).unwrap();
        assert_eq!(bit.attributes.get("Helix"), Some(&AttributeValue::Real(30.0)));
        bit.attributes = Attributes::new();
        bit.attributes.insert("Helix", AttributeValue::Integer(30)).unwrap();
        template.validate(&bit).unwrap();

        let parsed = template.from_json(&template.to_json(&bit).unwrap(), &shapes).unwrap();
        assert_eq!(parsed.attributes.get("Helix"), Some(&AttributeValue::Integer(30)));
        assert_eq!(parsed, bit);

        bit.attributes = Attributes::new();
        bit.attributes.insert("Helix", AttributeValue::Real(30.5)).unwrap();
        let parsed = template.from_json(&template.to_json(&bit).unwrap(), &shapes).unwrap();
        assert_eq!(parsed, bit);
    }

    #[test]
    fn test_validate_rejects_undeclared_attribute() {
        let (templates, shapes) = setup();
        let template = templates.get(BitType::V).unwrap();
        let mut bit = template.example(&shapes).unwrap();
        bit.attributes.insert("Coating", "TiN".into()).unwrap();
        assert!(template.to_json(&bit).is_err());

        let endmill = templates.get(BitType::EndMill).unwrap();
        assert!(endmill.validate(&template.example(&shapes).unwrap()).is_err());
    }
}
