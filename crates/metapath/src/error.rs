use core::fmt;
use std::sync::Arc;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Raised while compiling: syntax, name resolution, unknown functions.
    Static,
    /// Raised while evaluating: missing context, arithmetic faults, casts.
    Dynamic,
    /// Raised when an operand or argument has the wrong type.
    Type,
}

/// Stable error codes emitted by the engine.
///
/// `MP*` codes mirror the XPath `XP*` codes under the Metapath prefix;
/// function library codes keep their `FO*` names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    MPST0003, // syntax error / malformed expression tree
    MPST0008, // unbound variable
    MPST0017, // unknown function or arity
    MPST0081, // unknown namespace prefix
    MPDY0002, // context item absent
    MPDY0050, // root of the context is not a document node
    MPTY0004, // type error, unsupported operator pairing, invalid result type
    MPTY0019, // not a node item for step
    MPTY0020, // base path not a sequence of nodes
    FOAR0001, // divide by zero
    FOAR0002, // numeric overflow
    FORG0001, // invalid lexical value for cast
    FORG0003, // zero-or-one called with more than one item
    FORG0004, // one-or-more called with an empty sequence
    FORG0005, // exactly-one called with other than one item
    FORG0006, // invalid argument type
    FOTY0012, // node has no typed value
    FOCH0002, // unsupported collation
    FORX0001, // invalid regex flags
    FORX0002, // invalid regex pattern
    FOER0000, // generic error
    // Fallback for codes raised by foreign function implementations (kept last)
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MPST0003 => "MPST0003",
            ErrorCode::MPST0008 => "MPST0008",
            ErrorCode::MPST0017 => "MPST0017",
            ErrorCode::MPST0081 => "MPST0081",
            ErrorCode::MPDY0002 => "MPDY0002",
            ErrorCode::MPDY0050 => "MPDY0050",
            ErrorCode::MPTY0004 => "MPTY0004",
            ErrorCode::MPTY0019 => "MPTY0019",
            ErrorCode::MPTY0020 => "MPTY0020",
            ErrorCode::FOAR0001 => "FOAR0001",
            ErrorCode::FOAR0002 => "FOAR0002",
            ErrorCode::FORG0001 => "FORG0001",
            ErrorCode::FORG0003 => "FORG0003",
            ErrorCode::FORG0004 => "FORG0004",
            ErrorCode::FORG0005 => "FORG0005",
            ErrorCode::FORG0006 => "FORG0006",
            ErrorCode::FOTY0012 => "FOTY0012",
            ErrorCode::FOCH0002 => "FOCH0002",
            ErrorCode::FORX0001 => "FORX0001",
            ErrorCode::FORX0002 => "FORX0002",
            ErrorCode::FOER0000 => "FOER0000",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }

    /// Parse a code string; a leading `err:` prefix is accepted.
    pub fn from_code(s: &str) -> Self {
        use ErrorCode::*;
        match s.strip_prefix("err:").unwrap_or(s) {
            "MPST0003" => MPST0003,
            "MPST0008" => MPST0008,
            "MPST0017" => MPST0017,
            "MPST0081" => MPST0081,
            "MPDY0002" => MPDY0002,
            "MPDY0050" => MPDY0050,
            "MPTY0004" => MPTY0004,
            "MPTY0019" => MPTY0019,
            "MPTY0020" => MPTY0020,
            "FOAR0001" => FOAR0001,
            "FOAR0002" => FOAR0002,
            "FORG0001" => FORG0001,
            "FORG0003" => FORG0003,
            "FORG0004" => FORG0004,
            "FORG0005" => FORG0005,
            "FORG0006" => FORG0006,
            "FOTY0012" => FOTY0012,
            "FOCH0002" => FOCH0002,
            "FORX0001" => FORX0001,
            "FORX0002" => FORX0002,
            "FOER0000" => FOER0000,
            _ => Unknown,
        }
    }

    /// The kind implied by the code's family.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ErrorCode::MPST0003
            | ErrorCode::MPST0008
            | ErrorCode::MPST0017
            | ErrorCode::MPST0081 => ErrorKind::Static,
            ErrorCode::MPTY0004
            | ErrorCode::MPTY0019
            | ErrorCode::MPTY0020
            | ErrorCode::FOTY0012 => ErrorKind::Type,
            _ => ErrorKind::Dynamic,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub struct Error {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub message: String,
    /// Metapath source text the error was raised for, once known.
    pub expression: Option<String>,
    #[source]
    pub source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn from_code(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self {
            kind: code.kind(),
            code,
            message: msg.into(),
            expression: None,
            source: None,
        }
    }

    /// Compose an error with a source cause.
    pub fn with_source(
        mut self,
        source: impl Into<Option<Arc<dyn std::error::Error + Send + Sync>>>,
    ) -> Self {
        self.source = source.into();
        self
    }

    /// Attach the owning expression text. An error that already names an
    /// expression keeps the innermost one.
    pub fn in_expression(mut self, text: &str) -> Self {
        if self.expression.is_none() {
            self.expression = Some(text.to_string());
        }
        self
    }

    pub fn is_static(&self) -> bool {
        self.kind == ErrorKind::Static
    }

    pub(crate) fn type_err(msg: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::MPTY0004, msg)
    }
}

impl From<fancy_regex::Error> for Error {
    fn from(e: fancy_regex::Error) -> Self {
        Error::from_code(ErrorCode::FORX0002, "invalid regular expression")
            .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error: {} ({})", self.message, self.code)?;
        if let Some(expr) = &self.expression {
            write!(f, " in expression `{expr}`")?;
        }
        Ok(())
    }
}
