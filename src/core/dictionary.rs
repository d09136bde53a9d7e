//! Purpose: Load per-version HL7 v2 definitions and resolve segment/datatype layouts.
//! Exports: `Dictionary`, `SchemaResolver`, `SegmentDefinition`, `FieldDefinition`,
//! `DatatypeDefinition`, `SubfieldDefinition`, `DatatypeKind`.
//! Role: Read-only lookup service consumed by the structural decoder.
//! Invariants: Resolution never fails; gaps degrade to synthetic passthrough definitions.
//! Invariants: Versions match by exact string; no range matching.
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct FieldDefinition {
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub datatype: Option<String>,
}

impl FieldDefinition {
    /// Synthetic definition used when a field position is undeclared (e.g. `MSH2`).
    pub fn positional(segment_id: &str, position: usize) -> Self {
        Self {
            desc: None,
            name: Some(format!("{segment_id}{position}")),
            datatype: None,
        }
    }

    /// Description if present, otherwise the name.
    pub fn label(&self) -> Option<&str> {
        self.desc
            .as_deref()
            .filter(|desc| !desc.is_empty())
            .or(self.name.as_deref())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct SegmentDefinition {
    #[serde(skip)]
    pub segment_id: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

impl SegmentDefinition {
    pub fn undeclared(segment_id: &str) -> Self {
        Self {
            segment_id: segment_id.to_string(),
            desc: String::new(),
            fields: Vec::new(),
        }
    }

    /// Definition for the field at `index` (0-based, i.e. raw position `index + 1`).
    pub fn field(&self, index: usize) -> FieldDefinition {
        self.fields
            .get(index)
            .cloned()
            .unwrap_or_else(|| FieldDefinition::positional(&self.segment_id, index + 1))
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct SubfieldDefinition {
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub datatype: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DatatypeKind {
    Primitive,
    Composite,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct DatatypeDefinition {
    #[serde(skip)]
    pub code: String,
    #[serde(default)]
    pub subfields: Vec<SubfieldDefinition>,
}

impl DatatypeDefinition {
    pub fn primitive(code: &str) -> Self {
        Self {
            code: code.to_string(),
            subfields: Vec::new(),
        }
    }

    pub fn kind(&self) -> DatatypeKind {
        if self.subfields.is_empty() {
            DatatypeKind::Primitive
        } else {
            DatatypeKind::Composite
        }
    }

    /// Subfield at `index`, or a positional passthrough definition when undeclared.
    pub fn subfield(&self, index: usize) -> SubfieldDefinition {
        self.subfields.get(index).cloned().unwrap_or_else(|| {
            let prefix = if self.code.is_empty() {
                "Component"
            } else {
                self.code.as_str()
            };
            SubfieldDefinition {
                desc: format!("{prefix}{}", index + 1),
                datatype: String::new(),
            }
        })
    }
}

/// Lookup seam between the decoder and whatever backs the definitions.
pub trait SchemaResolver: Send + Sync {
    fn resolve_segment(&self, segment_id: &str, version: &str) -> SegmentDefinition;
    fn resolve_datatype(&self, code: &str, version: &str) -> DatatypeDefinition;
}

#[derive(Clone, Debug, Default, Deserialize)]
struct VersionDefinitions {
    #[serde(default)]
    segments: HashMap<String, SegmentDefinition>,
    #[serde(default, alias = "fields")]
    datatypes: HashMap<String, DatatypeDefinition>,
}

#[derive(Clone, Debug, Default)]
pub struct Dictionary {
    versions: HashMap<String, VersionDefinitions>,
}

#[derive(Deserialize)]
struct DictionaryFile {
    definitions: HashMap<String, VersionDefinitions>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DictionaryDocument {
    Wrapped(DictionaryFile),
    Bare(HashMap<String, VersionDefinitions>),
}

impl Dictionary {
    /// A dictionary with no versions; every lookup degrades to passthrough.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a dictionary document: either `{ "definitions": { <version>: ... } }`
    /// or the bare `{ <version>: ... }` map.
    pub fn from_json_str(input: &str) -> Result<Self, Error> {
        let document: DictionaryDocument = serde_json::from_str(input).map_err(|err| {
            Error::new(ErrorKind::Parse)
                .with_message("invalid dictionary document")
                .with_source(err)
        })?;
        Ok(Self::from_document(document))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, Error> {
        let document: DictionaryDocument = serde_json::from_reader(reader).map_err(|err| {
            Error::new(ErrorKind::Parse)
                .with_message("invalid dictionary document")
                .with_source(err)
        })?;
        Ok(Self::from_document(document))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|err| {
            let kind = if err.kind() == std::io::ErrorKind::NotFound {
                ErrorKind::NotFound
            } else {
                ErrorKind::Io
            };
            Error::new(kind)
                .with_message("failed to open dictionary")
                .with_path(path)
                .with_source(err)
        })?;
        Self::from_reader(std::io::BufReader::new(file)).map_err(|err| err.with_path(path))
    }

    fn from_document(document: DictionaryDocument) -> Self {
        let versions = match document {
            DictionaryDocument::Wrapped(file) => file.definitions,
            DictionaryDocument::Bare(map) => map,
        };
        Self { versions }
    }

    pub fn has_version(&self, version: &str) -> bool {
        self.versions.contains_key(version)
    }

    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.versions.keys().map(String::as_str)
    }
}

impl SchemaResolver for Dictionary {
    fn resolve_segment(&self, segment_id: &str, version: &str) -> SegmentDefinition {
        let found = self
            .versions
            .get(version)
            .and_then(|defs| defs.segments.get(segment_id));
        match found {
            Some(def) => SegmentDefinition {
                segment_id: segment_id.to_string(),
                desc: def.desc.clone(),
                fields: def.fields.clone(),
            },
            None => {
                tracing::debug!(segment_id, version, "segment undeclared; using positional names");
                SegmentDefinition::undeclared(segment_id)
            }
        }
    }

    fn resolve_datatype(&self, code: &str, version: &str) -> DatatypeDefinition {
        let found = self
            .versions
            .get(version)
            .and_then(|defs| defs.datatypes.get(code));
        match found {
            Some(def) => DatatypeDefinition {
                code: code.to_string(),
                subfields: def.subfields.clone(),
            },
            None => DatatypeDefinition::primitive(code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DatatypeKind, Dictionary, SchemaResolver};
    use crate::core::error::ErrorKind;

    const DOC: &str = r#"{
        "definitions": {
            "2.5": {
                "segments": {
                    "PID": {
                        "desc": "Patient Identification",
                        "fields": [
                            { "desc": "Set ID - PID", "datatype": "SI" },
                            { "desc": "Patient ID", "datatype": "CX" }
                        ]
                    }
                },
                "fields": {
                    "CX": { "subfields": [ { "desc": "ID Number", "datatype": "ST" } ] },
                    "ST": { "subfields": [] }
                }
            }
        }
    }"#;

    #[test]
    fn resolves_declared_segment_and_fields() {
        let dict = Dictionary::from_json_str(DOC).expect("dictionary");
        let pid = dict.resolve_segment("PID", "2.5");
        assert_eq!(pid.segment_id, "PID");
        assert_eq!(pid.desc, "Patient Identification");
        assert_eq!(pid.field(1).datatype.as_deref(), Some("CX"));
        assert_eq!(pid.field(1).label(), Some("Patient ID"));
    }

    #[test]
    fn undeclared_field_falls_back_to_position() {
        let dict = Dictionary::from_json_str(DOC).expect("dictionary");
        let pid = dict.resolve_segment("PID", "2.5");
        let extra = pid.field(4);
        assert_eq!(extra.label(), Some("PID5"));
        assert_eq!(extra.datatype, None);
    }

    #[test]
    fn undeclared_segment_and_version_degrade() {
        let dict = Dictionary::from_json_str(DOC).expect("dictionary");
        let zzz = dict.resolve_segment("ZZZ", "2.5");
        assert!(zzz.desc.is_empty());
        assert!(zzz.fields.is_empty());
        assert_eq!(zzz.field(0).label(), Some("ZZZ1"));

        let other = dict.resolve_segment("PID", "2.3");
        assert!(other.fields.is_empty());
    }

    #[test]
    fn datatype_kind_follows_subfields() {
        let dict = Dictionary::from_json_str(DOC).expect("dictionary");
        assert_eq!(dict.resolve_datatype("CX", "2.5").kind(), DatatypeKind::Composite);
        assert_eq!(dict.resolve_datatype("ST", "2.5").kind(), DatatypeKind::Primitive);
        assert_eq!(dict.resolve_datatype("XYZ", "2.5").kind(), DatatypeKind::Primitive);
    }

    #[test]
    fn undeclared_subfield_is_positional_passthrough() {
        let dict = Dictionary::from_json_str(DOC).expect("dictionary");
        let cx = dict.resolve_datatype("CX", "2.5");
        assert_eq!(cx.subfield(0).desc, "ID Number");
        let extra = cx.subfield(2);
        assert_eq!(extra.desc, "CX3");
        assert!(extra.datatype.is_empty());
    }

    #[test]
    fn bare_version_map_is_accepted() {
        let dict = Dictionary::from_json_str(r#"{ "2.4": { "segments": {}, "datatypes": {} } }"#)
            .expect("dictionary");
        assert!(dict.has_version("2.4"));
        assert!(!dict.has_version("2.5"));
    }

    #[test]
    fn malformed_document_is_parse_error() {
        let err = Dictionary::from_json_str("{ not json").expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn missing_file_is_not_found() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = Dictionary::from_path(temp.path().join("absent.json")).expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.path().is_some());
    }
}
