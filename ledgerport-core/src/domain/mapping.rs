//! Source field → target field mapping

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Map;

/// Ordered association from source field names to canonical target fields.
///
/// A source with no target is "do not import". On the wire this is a JSON
/// object whose unmapped entries carry an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "Map<String, serde_json::Value>", try_from = "Map<String, serde_json::Value>")]
pub struct FieldMapping {
    entries: Vec<(String, Option<String>)>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or clear the target for a source field. Blank targets clear.
    pub fn set(&mut self, source: impl Into<String>, target: Option<&str>) {
        let source = source.into();
        let target = target
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from);
        match self.entries.iter_mut().find(|(s, _)| *s == source) {
            Some(entry) => entry.1 = target,
            None => self.entries.push((source, target)),
        }
    }

    pub fn with(mut self, source: impl Into<String>, target: &str) -> Self {
        self.set(source, Some(target));
        self
    }

    pub fn target_of(&self, source: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(s, _)| s == source)
            .and_then(|(_, t)| t.as_deref())
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(s, _)| s.as_str())
    }

    /// Mapped `(source, target)` pairs in source order
    pub fn mapped(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter_map(|(s, t)| t.as_deref().map(|t| (s.as_str(), t)))
    }

    pub fn is_target_mapped(&self, target: &str) -> bool {
        self.mapped().any(|(_, t)| t == target)
    }

    pub fn mapped_count(&self) -> usize {
        self.mapped().count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<FieldMapping> for Map<String, serde_json::Value> {
    fn from(mapping: FieldMapping) -> Self {
        mapping
            .entries
            .into_iter()
            .map(|(s, t)| (s, serde_json::Value::String(t.unwrap_or_default())))
            .collect()
    }
}

impl TryFrom<Map<String, serde_json::Value>> for FieldMapping {
    type Error = String;

    fn try_from(map: Map<String, serde_json::Value>) -> Result<Self, Self::Error> {
        let mut mapping = FieldMapping::new();
        for (source, target) in map {
            match target {
                serde_json::Value::String(t) => mapping.set(source, Some(t.as_str())),
                serde_json::Value::Null => mapping.set(source, None),
                other => {
                    return Err(format!(
                        "mapping target for \"{}\" must be a string, got {}",
                        source, other
                    ))
                }
            }
        }
        Ok(mapping)
    }
}

/// A reason a mapping cannot advance past the mapping stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "field", rename_all = "camelCase")]
pub enum MappingIssue {
    NoFieldsMapped,
    RequiredTargetUnmapped(String),
    DuplicateTarget(String),
}

impl MappingIssue {
    /// The target field the issue is about, if any
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::NoFieldsMapped => None,
            Self::RequiredTargetUnmapped(f) | Self::DuplicateTarget(f) => Some(f),
        }
    }
}

impl fmt::Display for MappingIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFieldsMapped => f.write_str("Map at least one field before continuing"),
            Self::RequiredTargetUnmapped(field) => {
                write!(f, "Required field \"{}\" is not mapped", field)
            }
            Self::DuplicateTarget(field) => {
                write!(f, "Field \"{}\" is mapped multiple times", field)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_target_means_unmapped() {
        let mut m = FieldMapping::new();
        m.set("Order ID", Some("order_number"));
        m.set("Junk", Some("  "));
        assert_eq!(m.target_of("Order ID"), Some("order_number"));
        assert_eq!(m.target_of("Junk"), None);
        assert_eq!(m.mapped_count(), 1);
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn test_wire_format() {
        let mut m = FieldMapping::new().with("Order ID", "order_number");
        m.set("Junk", None);
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, r#"{"Order ID":"order_number","Junk":""}"#);

        let back: FieldMapping = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_rejects_non_string_targets() {
        let result: Result<FieldMapping, _> = serde_json::from_str(r#"{"a": 1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_issue_messages() {
        assert_eq!(
            MappingIssue::RequiredTargetUnmapped("grand_total".into()).to_string(),
            "Required field \"grand_total\" is not mapped"
        );
        assert_eq!(
            MappingIssue::DuplicateTarget("order_number".into()).field(),
            Some("order_number")
        );
    }
}
