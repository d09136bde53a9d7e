//! Purpose: Translate a positional HL7 v2 tree into labeled, typed JSON via a dictionary.
//! Exports: `Decoder`, `TranslatedField`, `MAX_DEPTH`.
//! Role: Orchestrator; the only caller of the resolver, coercer and key normalizer.
//! Invariants: Field 0 (segment id) is never translated; fields start at position 1.
//! Invariants: Absent values and empty objects are omitted, never emitted as "" or null.
//! Invariants: MSH field index 1 (encoding characters) is emitted verbatim.
//! Invariants: Repeated segment ids overwrite earlier ones in the top-level object.
//! Notes: Composite recursion is capped at `MAX_DEPTH`; deeper levels pass values through.
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::core::coerce::coerce;
use crate::core::dictionary::{DatatypeDefinition, DatatypeKind, SchemaResolver, SegmentDefinition};
use crate::core::error::Error;
use crate::core::keys::KeyNormalizer;
use crate::core::reader::{HEADER_SEGMENT, RawComponent, RawField, RawMessage, RawSegment, read_message};

pub const MAX_DEPTH: usize = 32;

const SEGMENT_DESCRIPTION: &str = "SegmentDescription";
const MESSAGE_LINE: &str = "MessageLine";
const SET_ID_PREFIX: &str = "Set ID - ";
const SET_ID: &str = "SetID";

/// A translated field or subfield before it is keyed into its parent object.
#[derive(Clone, Debug, PartialEq)]
pub struct TranslatedField {
    pub name: String,
    pub value: Option<Value>,
}

#[derive(Clone)]
pub struct Decoder {
    resolver: Arc<dyn SchemaResolver>,
    keys: KeyNormalizer,
    max_depth: usize,
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

impl Decoder {
    pub fn new(resolver: Arc<dyn SchemaResolver>) -> Self {
        Self {
            resolver,
            keys: KeyNormalizer::global(),
            max_depth: MAX_DEPTH,
        }
    }

    pub fn with_keys(mut self, keys: KeyNormalizer) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn keys(&self) -> &KeyNormalizer {
        &self.keys
    }

    /// Read and decode ER7 text. Reader failures are the only error path.
    pub fn decode_text(&self, text: &str, version: Option<&str>) -> Result<Value, Error> {
        let message = read_message(text)?;
        Ok(self.decode(&message, version))
    }

    /// Decode a message; `version` overrides the MSH-12 version when given.
    pub fn decode(&self, message: &RawMessage, version: Option<&str>) -> Value {
        let version = version.or_else(|| message.version()).unwrap_or_default();
        if version.is_empty() {
            tracing::warn!("message carries no version (MSH-12); decoding without definitions");
        }

        let mut out = Map::new();
        for (index, segment) in message.segments.iter().enumerate() {
            let translated = self.translate_segment(segment, index + 1, version);
            out.insert(segment.id.clone(), translated);
        }
        tracing::debug!(segments = message.segments.len(), version, "decoded HL7 v2 message");
        Value::Object(out)
    }

    pub fn translate_segment(&self, segment: &RawSegment, line: usize, version: &str) -> Value {
        let seg_def = self.segment_definition(&segment.id, version);

        let mut out = Map::new();
        if !seg_def.desc.is_empty() {
            out.insert(SEGMENT_DESCRIPTION.to_string(), Value::String(seg_def.desc.clone()));
        }
        out.insert(MESSAGE_LINE.to_string(), Value::from(line));

        for (position, field) in segment.fields.iter().enumerate().skip(1) {
            let translated = self.translate_field(field, &seg_def, position - 1, version);
            let key = self.keys.normalize(&translated.name);
            if let Some(value) = translated.value {
                out.insert(key, value);
            }
        }
        Value::Object(out)
    }

    pub fn translate_field(
        &self,
        field: &RawField,
        seg_def: &SegmentDefinition,
        field_index: usize,
        version: &str,
    ) -> TranslatedField {
        let field_def = seg_def.field(field_index);
        let mut name = field_def
            .label()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}{}", seg_def.segment_id, field_index + 1));
        if field_index == 0 && name.starts_with(SET_ID_PREFIX) {
            name = SET_ID.to_string();
        }

        let is_encoding = seg_def.segment_id == HEADER_SEGMENT && field_index == 1;
        let datatype = field_def.datatype.as_deref().unwrap_or_default();
        let datatype_def = self.datatype_definition(datatype, version);

        let mut values: Vec<Value> = field
            .occurrences()
            .filter_map(|(value, children)| {
                if is_encoding {
                    value.map(|raw| Value::String(raw.to_string()))
                } else {
                    self.translate_value(value, children, &datatype_def, version, 1)
                }
            })
            .collect();

        let value = if values.len() > 1 {
            Some(Value::Array(values))
        } else {
            values.pop()
        };
        TranslatedField { name, value }
    }

    pub fn translate_subfield(
        &self,
        subfield: &RawComponent,
        parent: &DatatypeDefinition,
        subfield_index: usize,
        version: &str,
    ) -> TranslatedField {
        self.translate_subfield_at(
            subfield.value.as_deref(),
            &subfield.components,
            parent,
            subfield_index,
            version,
            1,
        )
    }

    fn translate_subfield_at(
        &self,
        value: Option<&str>,
        children: &[RawComponent],
        parent: &DatatypeDefinition,
        subfield_index: usize,
        version: &str,
        depth: usize,
    ) -> TranslatedField {
        let subfield_def = parent.subfield(subfield_index);
        let datatype_def = self.datatype_definition(&subfield_def.datatype, version);
        let value = self.translate_value(value, children, &datatype_def, version, depth + 1);
        TranslatedField {
            name: subfield_def.desc,
            value,
        }
    }

    fn translate_value(
        &self,
        value: Option<&str>,
        children: &[RawComponent],
        datatype_def: &DatatypeDefinition,
        version: &str,
        depth: usize,
    ) -> Option<Value> {
        if datatype_def.kind() == DatatypeKind::Primitive {
            return coerce(value, &datatype_def.code);
        }
        if depth > self.max_depth {
            tracing::warn!(
                datatype = %datatype_def.code,
                depth,
                "datatype nesting exceeds depth cap; passing value through"
            );
            return coerce(value, &datatype_def.code);
        }

        let mut object = Map::new();
        if children.is_empty() {
            let translated = self.translate_subfield_at(value, &[], datatype_def, 0, version, depth);
            self.insert_translated(&mut object, translated);
        } else {
            for (index, child) in children.iter().enumerate() {
                let translated = self.translate_subfield_at(
                    child.value.as_deref(),
                    &child.components,
                    datatype_def,
                    index,
                    version,
                    depth,
                );
                self.insert_translated(&mut object, translated);
            }
        }

        if object.is_empty() {
            None
        } else {
            Some(Value::Object(object))
        }
    }

    /// Resolved definitions always carry the identifier they were looked up by.
    fn segment_definition(&self, segment_id: &str, version: &str) -> SegmentDefinition {
        let mut seg_def = self.resolver.resolve_segment(segment_id, version);
        if seg_def.segment_id != segment_id {
            seg_def.segment_id = segment_id.to_string();
        }
        seg_def
    }

    fn datatype_definition(&self, code: &str, version: &str) -> DatatypeDefinition {
        let mut datatype_def = self.resolver.resolve_datatype(code, version);
        if datatype_def.code.is_empty() {
            datatype_def.code = code.to_string();
        }
        datatype_def
    }

    fn insert_translated(&self, object: &mut Map<String, Value>, translated: TranslatedField) {
        let key = self.keys.normalize(&translated.name);
        if let Some(value) = translated.value {
            object.insert(key, value);
        }
    }
}
