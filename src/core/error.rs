//! Purpose: Single error type shared by the reader, converters, CLI and server.
//! Exports: `Error`, `ErrorKind`, `to_exit_code`.
//! Role: Carries a stable kind plus optional context (message, hint, path, line).
//! Invariants: Schema gaps and date anomalies never produce an `Error`.
//! Invariants: Exit code mapping is stable once published.
use std::error::Error as StdError;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    NotFound,
    Parse,
    Unsupported,
    Io,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    path: Option<PathBuf>,
    line: Option<usize>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            path: None,
            line: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// 1-based message line the error refers to, when known.
    pub fn line(&self) -> Option<usize> {
        self.line
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path.display())?;
        }
        if let Some(line) = self.line {
            write!(f, " (line: {line})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::NotFound => 3,
        ErrorKind::Parse => 4,
        ErrorKind::Unsupported => 5,
        ErrorKind::Io => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind, to_exit_code};
    use std::error::Error as _;

    #[test]
    fn exit_code_mapping_is_stable() {
        let cases = [
            (ErrorKind::Internal, 1),
            (ErrorKind::Usage, 2),
            (ErrorKind::NotFound, 3),
            (ErrorKind::Parse, 4),
            (ErrorKind::Unsupported, 5),
            (ErrorKind::Io, 6),
        ];

        for (kind, code) in cases {
            assert_eq!(to_exit_code(kind), code);
        }
    }

    #[test]
    fn display_includes_context() {
        let err = Error::new(ErrorKind::Parse)
            .with_message("invalid HL7 message")
            .with_line(3);
        assert_eq!(err.to_string(), "Parse: invalid HL7 message (line: 3)");
    }

    #[test]
    fn source_is_chained() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = Error::new(ErrorKind::Io).with_source(io);
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("missing"));
    }
}
