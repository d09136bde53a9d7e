//! Purpose: Dispatch input text to the JSON converter that matches its content type.
//! Exports: `FormatConverter`, `DecodeOptions`, `Conversion`.
//! Role: Single entry point shared by the CLI and the HTTP service.
//! Invariants: A missing or empty content type means JSON.
//! Invariants: Unknown content types fail with `Unsupported` before any decoding.
#![allow(clippy::result_large_err)]

use std::sync::Arc;

use serde_json::Value;

use crate::core::csv_json::csv_to_json;
use crate::core::decode::{Decoder, MAX_DEPTH};
use crate::core::detect::detect_format;
use crate::core::dictionary::SchemaResolver;
use crate::core::error::{Error, ErrorKind};
use crate::core::format::{ContentFormat, ContentType};
use crate::core::keys::KeyNormalizer;
use crate::core::xml_json::xml_to_json;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecodeOptions {
    /// Dictionary version to use instead of MSH-12.
    pub version: Option<String>,
    pub max_depth: usize,
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self {
            version: None,
            max_depth: MAX_DEPTH,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a conversion where the content type may have been detected.
#[derive(Clone, Debug, PartialEq)]
pub struct Conversion {
    pub content_type: ContentType,
    pub detected: bool,
    pub data: Value,
}

#[derive(Debug)]
pub struct FormatConverter {
    decoder: Decoder,
    options: DecodeOptions,
}

impl FormatConverter {
    pub fn new(resolver: Arc<dyn SchemaResolver>, options: DecodeOptions) -> Self {
        let decoder = Decoder::new(resolver).with_max_depth(options.max_depth);
        Self { decoder, options }
    }

    pub fn with_keys(mut self, keys: KeyNormalizer) -> Self {
        self.decoder = self.decoder.with_keys(keys);
        self
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    pub fn to_json(&self, input: &str, content_type: Option<&str>) -> Result<Value, Error> {
        let content_type = match content_type.map(str::trim).filter(|value| !value.is_empty()) {
            None => {
                tracing::info!("no content type given; treating input as JSON");
                ContentType::Json
            }
            Some(value) => ContentType::parse(value).ok_or_else(|| {
                Error::new(ErrorKind::Unsupported)
                    .with_message(format!("unsupported content type: {value}"))
                    .with_hint("Use application/json, text/csv, application/xml or x-application/hl7-v2+er7.")
            })?,
        };
        self.convert(input, content_type)
    }

    /// Convert using `content_type` when given, otherwise sniff the input.
    pub fn to_json_detected(
        &self,
        input: &str,
        content_type: Option<&str>,
    ) -> Result<Conversion, Error> {
        if let Some(value) = content_type.filter(|value| !value.trim().is_empty()) {
            let data = self.to_json(input, Some(value))?;
            let content_type = ContentType::parse(value).unwrap_or(ContentType::Json);
            return Ok(Conversion {
                content_type,
                detected: false,
                data,
            });
        }

        let format = detect_format(input);
        let content_type = format.content_type().ok_or_else(|| {
            Error::new(ErrorKind::Unsupported)
                .with_message("could not detect input format")
                .with_hint("Pass an explicit content type.")
        })?;
        tracing::info!(format = %format, "detected input format");
        let data = self.convert(input, content_type)?;
        Ok(Conversion {
            content_type,
            detected: true,
            data,
        })
    }

    pub fn convert(&self, input: &str, content_type: ContentType) -> Result<Value, Error> {
        match content_type.format() {
            ContentFormat::Hl7 => {
                tracing::info!("converting HL7 v2 to JSON");
                self.hl7v2_to_json(input)
            }
            ContentFormat::Csv => {
                tracing::info!("converting CSV to JSON");
                Ok(csv_to_json(input))
            }
            ContentFormat::Xml => {
                tracing::info!("converting XML to JSON");
                xml_to_json(input)
            }
            ContentFormat::Json | ContentFormat::Unknown => {
                tracing::info!("passing JSON through");
                parse_json(input)
            }
        }
    }

    pub fn hl7v2_to_json(&self, input: &str) -> Result<Value, Error> {
        self.decoder
            .decode_text(input, self.options.version.as_deref())
    }
}

fn parse_json(input: &str) -> Result<Value, Error> {
    serde_json::from_str(input).map_err(|err| {
        Error::new(ErrorKind::Parse)
            .with_message(format!("invalid JSON: {err}"))
            .with_line(err.line())
            .with_source(err)
    })
}
