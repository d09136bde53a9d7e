//! Purpose: Tokenize ER7-encoded HL7 v2 text into a positional segment/field tree.
//! Exports: `RawMessage`, `RawSegment`, `RawField`, `RawComponent`, `Delimiters`, `read_message`.
//! Role: Reader boundary in front of the structural decoder; knows delimiters, not dictionaries.
//! Invariants: Field 0 of every segment is the literal segment identifier.
//! Invariants: MSH fields 1 and 2 hold the field separator and encoding characters verbatim.
//! Invariants: Line endings are normalized before splitting (CR, LF and CRLF are equivalent).
//! Invariants: Error line numbers count physical lines, blank ones included.
use crate::core::error::{Error, ErrorKind};

pub const HEADER_SEGMENT: &str = "MSH";

/// Index of MSH-12 (version identifier) in `RawSegment::fields`.
const VERSION_FIELD: usize = 12;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Delimiters {
    pub field: char,
    pub component: char,
    pub repetition: char,
    pub subcomponent: char,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            field: '|',
            component: '^',
            repetition: '~',
            subcomponent: '&',
        }
    }
}

impl Delimiters {
    fn from_header(field: char, encoding: &str) -> Self {
        let defaults = Self::default();
        let mut chars = encoding.chars();
        let component = chars.next().unwrap_or(defaults.component);
        let repetition = chars.next().unwrap_or(defaults.repetition);
        let _escape = chars.next();
        let subcomponent = chars.next().unwrap_or(defaults.subcomponent);
        Self {
            field,
            component,
            repetition,
            subcomponent,
        }
    }
}

/// A positional value plus its nested components (absent when not delimited).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RawComponent {
    pub value: Option<String>,
    pub components: Vec<RawComponent>,
}

impl RawComponent {
    pub fn scalar(value: impl Into<String>) -> Self {
        Self {
            value: non_empty(value.into()),
            components: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RawField {
    pub value: Option<String>,
    pub subfields: Vec<RawComponent>,
    /// Occurrences after the first one.
    pub repetitions: Vec<RawComponent>,
}

impl RawField {
    pub fn scalar(value: impl Into<String>) -> Self {
        Self {
            value: non_empty(value.into()),
            subfields: Vec::new(),
            repetitions: Vec::new(),
        }
    }

    pub fn with_subfields(value: impl Into<String>, subfields: Vec<RawComponent>) -> Self {
        Self {
            value: non_empty(value.into()),
            subfields,
            repetitions: Vec::new(),
        }
    }

    /// Every occurrence as `(value, nested components)`, first occurrence first.
    pub fn occurrences(&self) -> impl Iterator<Item = (Option<&str>, &[RawComponent])> {
        std::iter::once((self.value.as_deref(), self.subfields.as_slice())).chain(
            self.repetitions
                .iter()
                .map(|rep| (rep.value.as_deref(), rep.components.as_slice())),
        )
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawSegment {
    pub id: String,
    pub fields: Vec<RawField>,
}

impl RawSegment {
    pub fn new(id: impl Into<String>, fields: Vec<RawField>) -> Self {
        let id = id.into();
        let mut all = Vec::with_capacity(fields.len() + 1);
        all.push(RawField::scalar(id.clone()));
        all.extend(fields);
        Self { id, fields: all }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RawMessage {
    pub delimiters: Delimiters,
    pub segments: Vec<RawSegment>,
}

impl RawMessage {
    /// Version identifier from MSH-12 (first component), if the header carries one.
    pub fn version(&self) -> Option<&str> {
        let header = self.segments.first()?;
        if header.id != HEADER_SEGMENT {
            return None;
        }
        let field = header.fields.get(VERSION_FIELD)?;
        field
            .subfields
            .first()
            .and_then(|component| component.value.as_deref())
            .or(field.value.as_deref())
    }
}

pub fn read_message(text: &str) -> Result<RawMessage, Error> {
    let normalized = text.replace("\r\n", "\r").replace('\n', "\r");
    let mut lines = normalized
        .split('\r')
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let (index, header) = lines.next().ok_or_else(|| {
        Error::new(ErrorKind::Parse)
            .with_message("invalid HL7 message: input is empty")
            .with_hint("HL7 v2 messages start with an MSH segment.")
    })?;
    let (delimiters, header) = read_header(header.trim_start(), index + 1)?;

    let mut segments = vec![header];
    for (index, line) in lines {
        segments.push(read_segment(line, &delimiters, index + 1)?);
    }

    Ok(RawMessage {
        delimiters,
        segments,
    })
}

fn read_header(line: &str, line_no: usize) -> Result<(Delimiters, RawSegment), Error> {
    let invalid = |detail: &str| {
        Error::new(ErrorKind::Parse)
            .with_message(format!("invalid HL7 message: {detail}"))
            .with_hint("HL7 v2 messages start with `MSH|^~\\&|`.")
            .with_line(line_no)
    };

    let rest = line
        .strip_prefix(HEADER_SEGMENT)
        .ok_or_else(|| invalid("first segment is not MSH"))?;
    let mut chars = rest.chars();
    let field_sep = chars
        .next()
        .ok_or_else(|| invalid("missing field separator"))?;
    if field_sep.is_alphanumeric() {
        return Err(invalid("field separator must not be alphanumeric"));
    }

    let mut parts = chars.as_str().split(field_sep);
    let encoding = parts.next().unwrap_or_default();
    if encoding.is_empty() {
        return Err(invalid("missing encoding characters"));
    }
    let delimiters = Delimiters::from_header(field_sep, encoding);

    let mut fields = vec![
        RawField::scalar(HEADER_SEGMENT),
        RawField::scalar(field_sep.to_string()),
        RawField::scalar(encoding),
    ];
    fields.extend(parts.map(|text| read_field(text, &delimiters)));

    Ok((
        delimiters,
        RawSegment {
            id: HEADER_SEGMENT.to_string(),
            fields,
        },
    ))
}

fn read_segment(line: &str, delimiters: &Delimiters, line_no: usize) -> Result<RawSegment, Error> {
    let mut parts = line.split(delimiters.field);
    let id = parts.next().unwrap_or_default().trim();
    if id.is_empty() {
        return Err(Error::new(ErrorKind::Parse)
            .with_message("invalid HL7 message: segment without identifier")
            .with_line(line_no));
    }

    let mut fields = vec![RawField::scalar(id)];
    fields.extend(parts.map(|text| read_field(text, delimiters)));
    Ok(RawSegment {
        id: id.to_string(),
        fields,
    })
}

fn read_field(text: &str, delimiters: &Delimiters) -> RawField {
    let mut occurrences = text
        .split(delimiters.repetition)
        .map(|occurrence| read_component(occurrence, delimiters.component, Some(delimiters.subcomponent)));
    let first = occurrences.next().unwrap_or_default();
    RawField {
        value: first.value,
        subfields: first.components,
        repetitions: occurrences.collect(),
    }
}

fn read_component(text: &str, separator: char, next: Option<char>) -> RawComponent {
    let parts: Vec<&str> = text.split(separator).collect();
    let components = if parts.len() > 1 {
        parts
            .into_iter()
            .map(|part| match next {
                Some(next) => read_component(part, next, None),
                None => RawComponent::scalar(part),
            })
            .collect()
    } else if let Some(next) = next.filter(|next| text.contains(*next)) {
        vec![read_component(text, next, None)]
    } else {
        Vec::new()
    };
    RawComponent {
        value: non_empty(text.to_string()),
        components,
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}
