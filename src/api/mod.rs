//! Purpose: Define the stable public Rust API boundary for mediconv.
//! Exports: Conversion entry points plus the decoder, dictionary and key-store types.
//! Role: Public, additive-only surface used by the CLI, the HTTP service and tests.
//! Invariants: Everything a caller needs to decode or convert is reachable from here.
//! Invariants: Internal helpers stay in `core` and are not re-exported.

mod converter;

pub use crate::core::decode::{Decoder, MAX_DEPTH, TranslatedField};
pub use crate::core::detect::{detect_content_type, detect_editor_language, detect_format};
pub use crate::core::dictionary::{
    DatatypeDefinition, DatatypeKind, Dictionary, FieldDefinition, SchemaResolver,
    SegmentDefinition, SubfieldDefinition,
};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::format::{ContentFormat, ContentType, EditorLanguage};
pub use crate::core::keys::{KeyNormalizer, KeyStore, MemoryKeyStore, global_store};
pub use crate::core::reader::{
    Delimiters, RawComponent, RawField, RawMessage, RawSegment, read_message,
};
pub use converter::{Conversion, DecodeOptions, FormatConverter};
