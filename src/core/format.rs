//! Purpose: Name the supported content types, formats and editor languages and map between them.
//! Exports: `ContentType`, `ContentFormat`, `EditorLanguage`.
//! Role: Shared vocabulary for detection, dispatch, CLI flags and HTTP headers.
//! Invariants: String parsing is case-insensitive; content types match by prefix
//! so media-type parameters (`; charset=...`) are accepted.
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ContentType {
    Json,
    Csv,
    Xml,
    Hl7v2,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ContentFormat {
    Json,
    Csv,
    Xml,
    Hl7,
    Unknown,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EditorLanguage {
    Json,
    Xml,
    Plaintext,
}

impl ContentType {
    pub const ALL: [ContentType; 4] = [
        ContentType::Json,
        ContentType::Csv,
        ContentType::Xml,
        ContentType::Hl7v2,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Csv => "text/csv",
            ContentType::Xml => "application/xml",
            ContentType::Hl7v2 => "x-application/hl7-v2+er7",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|candidate| normalized.starts_with(candidate.as_str()))
    }

    pub fn format(self) -> ContentFormat {
        match self {
            ContentType::Json => ContentFormat::Json,
            ContentType::Csv => ContentFormat::Csv,
            ContentType::Xml => ContentFormat::Xml,
            ContentType::Hl7v2 => ContentFormat::Hl7,
        }
    }

    pub fn editor_language(self) -> EditorLanguage {
        self.format().editor_language()
    }
}

impl ContentFormat {
    pub const ALL: [ContentFormat; 5] = [
        ContentFormat::Json,
        ContentFormat::Csv,
        ContentFormat::Xml,
        ContentFormat::Hl7,
        ContentFormat::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContentFormat::Json => "json",
            ContentFormat::Csv => "csv",
            ContentFormat::Xml => "xml",
            ContentFormat::Hl7 => "hl7",
            ContentFormat::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == normalized)
    }

    pub fn content_type(self) -> Option<ContentType> {
        match self {
            ContentFormat::Json => Some(ContentType::Json),
            ContentFormat::Csv => Some(ContentType::Csv),
            ContentFormat::Xml => Some(ContentType::Xml),
            ContentFormat::Hl7 => Some(ContentType::Hl7v2),
            ContentFormat::Unknown => None,
        }
    }

    pub fn editor_language(self) -> EditorLanguage {
        match self {
            ContentFormat::Json => EditorLanguage::Json,
            ContentFormat::Xml => EditorLanguage::Xml,
            ContentFormat::Csv | ContentFormat::Hl7 | ContentFormat::Unknown => {
                EditorLanguage::Plaintext
            }
        }
    }
}

impl EditorLanguage {
    pub const ALL: [EditorLanguage; 3] = [
        EditorLanguage::Json,
        EditorLanguage::Xml,
        EditorLanguage::Plaintext,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EditorLanguage::Json => "json",
            EditorLanguage::Xml => "xml",
            EditorLanguage::Plaintext => "plaintext",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == normalized)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ContentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for EditorLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{ContentFormat, ContentType, EditorLanguage};

    #[test]
    fn content_type_round_trips_through_format() {
        for content_type in ContentType::ALL {
            assert_eq!(content_type.format().content_type(), Some(content_type));
        }
        assert_eq!(ContentFormat::Unknown.content_type(), None);
    }

    #[test]
    fn content_type_parse_accepts_parameters_and_case() {
        assert_eq!(
            ContentType::parse("Application/JSON; charset=utf-8"),
            Some(ContentType::Json)
        );
        assert_eq!(ContentType::parse("text/csv"), Some(ContentType::Csv));
        assert_eq!(
            ContentType::parse("x-application/hl7-v2+er7"),
            Some(ContentType::Hl7v2)
        );
        assert_eq!(ContentType::parse("text/plain"), None);
        assert_eq!(ContentType::parse(""), None);
    }

    #[test]
    fn format_and_language_parse_exactly() {
        assert_eq!(ContentFormat::parse("HL7"), Some(ContentFormat::Hl7));
        assert_eq!(ContentFormat::parse("hl7v2"), None);
        assert_eq!(EditorLanguage::parse("PlainText"), Some(EditorLanguage::Plaintext));
        assert_eq!(EditorLanguage::parse("yaml"), None);
    }

    #[test]
    fn editor_language_mapping() {
        assert_eq!(ContentType::Json.editor_language(), EditorLanguage::Json);
        assert_eq!(ContentType::Xml.editor_language(), EditorLanguage::Xml);
        assert_eq!(ContentType::Csv.editor_language(), EditorLanguage::Plaintext);
        assert_eq!(ContentType::Hl7v2.editor_language(), EditorLanguage::Plaintext);
        assert_eq!(ContentFormat::Unknown.editor_language(), EditorLanguage::Plaintext);
    }
}
