//! Purpose: Guess the format of untyped input text.
//! Exports: `detect_format`, `detect_content_type`, `detect_editor_language`.
//! Role: Heuristic sniffing used when callers do not state a content type.
//! Invariants: Detection is pure and deterministic; it never fails (falls back to `Unknown`).
//! Invariants: Check order is fixed: valid JSON, HL7 header, JSON-like, XML-like, CSV-like.
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::core::format::{ContentFormat, ContentType, EditorLanguage};

static CURLY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[{}]").expect("static pattern"));
static KEY_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^}]*:[^}]*\}").expect("static pattern"));
static LOOSE_KEY_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{.*:.*\}").expect("static pattern"));
static INCOMPLETE_JSON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\{[^}]*"[^"]*"\s*:\s*"#).expect("static pattern"));

static OPENING_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^/!?][^>]*?>").expect("static pattern"));
static CLOSING_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</[^>]+>").expect("static pattern"));
static SELF_CLOSING_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+/>").expect("static pattern"));
static XML_NAMESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"xmlns(:[a-zA-Z0-9]+)?=").expect("static pattern"));
static XML_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<\?xml.*?\?>").expect("static pattern"));

const HL7_PREFIX: &str = "MSH|";

pub fn detect_format(input: &str) -> ContentFormat {
    if input.trim().is_empty() {
        return ContentFormat::Unknown;
    }
    if serde_json::from_str::<Value>(input).is_ok() {
        return ContentFormat::Json;
    }
    if input.trim_start().starts_with(HL7_PREFIX) {
        return ContentFormat::Hl7;
    }
    if is_json_likely(input) {
        return ContentFormat::Json;
    }
    if is_xml_likely(input) {
        return ContentFormat::Xml;
    }
    if is_csv_likely(input) {
        return ContentFormat::Csv;
    }
    ContentFormat::Unknown
}

pub fn detect_content_type(input: &str) -> Option<ContentType> {
    detect_format(input).content_type()
}

pub fn detect_editor_language(input: &str) -> EditorLanguage {
    detect_format(input).editor_language()
}

fn is_json_likely(input: &str) -> bool {
    let curly_braces = CURLY_RE.find_iter(input).count();
    let colons = input.matches(':').count();
    let incomplete = INCOMPLETE_JSON_RE.is_match(input);

    (curly_braces >= 2 || (curly_braces >= 1 && incomplete))
        && colons >= 1
        && (KEY_VALUE_RE.is_match(input) || LOOSE_KEY_VALUE_RE.is_match(input) || incomplete)
}

fn is_xml_likely(input: &str) -> bool {
    let opening = OPENING_TAG_RE.find_iter(input).count();
    let closing = CLOSING_TAG_RE.find_iter(input).count();
    let self_closing = SELF_CLOSING_TAG_RE.find_iter(input).count();
    let namespaces = XML_NAMESPACE_RE.find_iter(input).count();
    let has_header = XML_HEADER_RE.is_match(input);

    (has_header || namespaces >= 1 || opening >= 1) && (opening == closing || self_closing >= 1)
}

fn is_csv_likely(input: &str) -> bool {
    let lines: Vec<&str> = input.split('\n').map(|line| line.trim_end_matches('\r')).collect();
    let header = lines.first().copied().unwrap_or_default();
    let has_commas = lines.iter().any(|line| line.contains(','));
    let header_is_plain = !header
        .chars()
        .any(|ch| matches!(ch, '{' | '}' | '[' | ']' | '<' | '>' | ':'));

    (lines.len() > 1 || has_commas) && header_is_plain
}
