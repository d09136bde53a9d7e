// Core modules implementing HL7 v2 decoding, format conversion and error modeling.
pub mod coerce;
pub mod csv_json;
pub mod decode;
pub mod detect;
pub mod dictionary;
pub mod error;
pub mod format;
pub mod keys;
pub mod reader;
pub mod xml_json;
