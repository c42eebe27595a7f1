//! Bit attributes: named values that do not describe tool geometry.

use fabcam_math::ContentHasher;
use serde_json::Value;

use crate::error::{Result, ToolsError};
use crate::value::AttributeValue;

/// A name-sorted set of attribute pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    pairs: Vec<(String, AttributeValue)>,
}

impl Attributes {
    /// An empty attribute set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from pairs, sorting by name and rejecting repeated names.
    pub fn from_pairs<N: Into<String>>(pairs: impl IntoIterator<Item = (N, AttributeValue)>) -> Result<Self> {
        let mut attributes = Self::new();
        for (name, value) in pairs {
            attributes.insert(name, value)?;
        }
        Ok(attributes)
    }

    /// Insert one attribute, keeping the set sorted.
    pub fn insert(&mut self, name: impl Into<String>, value: AttributeValue) -> Result<()> {
        let name = name.into();
        match self.pairs.binary_search_by(|(n, _)| n.as_str().cmp(&name)) {
            Ok(_) => Err(ToolsError::duplicate("attribute", name)),
            Err(position) => {
                self.pairs.insert(position, (name, value));
                Ok(())
            }
        }
    }

    /// Value of the named attribute.
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.pairs
            .binary_search_by(|(n, _)| n.as_str().cmp(name))
            .ok()
            .map(|index| &self.pairs[index].1)
    }

    /// Pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.pairs.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True when there are no attributes.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// JSON form: `[[name, value], ...]`.
    pub fn to_json(&self) -> Value {
        Value::Array(
            self.pairs
                .iter()
                .map(|(n, v)| Value::Array(vec![Value::String(n.clone()), v.to_json()]))
                .collect(),
        )
    }

    /// Feed the sorted pairs into a content hash.
    pub fn hash_into(&self, hasher: &mut ContentHasher) {
        hasher.count(self.pairs.len());
        for (name, value) in &self.pairs {
            hasher.text(name);
            value.hash_into(hasher);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sorted_insert() {
        let attributes = Attributes::from_pairs([
            ("Material", AttributeValue::from("HSS")),
            ("Flutes", AttributeValue::from(2_i64)),
        ])
        .unwrap();
        let names: Vec<&str> = attributes.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["Flutes", "Material"]);
        assert_eq!(attributes.get("Flutes"), Some(&AttributeValue::Integer(2)));
        assert_eq!(attributes.get("Coating"), None);
        assert_eq!(attributes.to_json(), json!([["Flutes", 2], ["Material", "HSS"]]));
    }

    #[test]
    fn test_duplicate_rejected() {
        let result = Attributes::from_pairs([
            ("Flutes", AttributeValue::from(2_i64)),
            ("Flutes", AttributeValue::from(4_i64)),
        ]);
        assert!(matches!(result, Err(ToolsError::DuplicateKey { .. })));
    }

    #[test]
    fn test_equality_ignores_insert_order() {
        let a = Attributes::from_pairs([("A", AttributeValue::from(1_i64)), ("B", true.into())]).unwrap();
        let b = Attributes::from_pairs([("B", AttributeValue::from(true)), ("A", 1_i64.into())]).unwrap();
        assert_eq!(a, b);
    }
}
