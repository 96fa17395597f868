//! Source positions and user-facing diagnostics.
//!
//! Every diagnostic Craeft can raise carries a [`SourcePos`] and is rendered
//! with the same caret-underlined, ANSI-colored single line of source that
//! the original compiler used.

use std::fmt;
use std::rc::Rc;

use colored::Colorize;

/// A position within a single source file.
///
/// Lines and columns are both 1-based, matching the original compiler's
/// diagnostics and most editors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourcePos {
    pub file: Rc<str>,
    pub line: u32,
    pub column: u32,
}

impl SourcePos {
    pub fn new(file: impl Into<Rc<str>>, line: u32, column: u32) -> Self {
        SourcePos {
            file: file.into(),
            line,
            column,
        }
    }

    /// A placeholder position for synthesized nodes (built-in declarations,
    /// internal errors raised outside of any particular source location).
    pub fn synthetic() -> Self {
        SourcePos::new("<builtin>", 0, 0)
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// The distinct diagnostic headers a Craeft error can be tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lexer,
    Parser,
    Name,
    Type,
    Generic,
    Internal,
}

impl ErrorKind {
    fn header(self) -> &'static str {
        match self {
            ErrorKind::Lexer => "lexer error",
            ErrorKind::Parser => "parser error",
            ErrorKind::Name => "name error",
            ErrorKind::Type => "type error",
            ErrorKind::Generic => "error",
            ErrorKind::Internal => "internal error",
        }
    }
}

/// A single user-facing diagnostic: a kind, a message, and the position it
/// occurred at. This is the one error type every fallible operation in this
/// crate returns; nothing in non-test code panics or unwinds for a condition
/// a user's program can trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CraeftError {
    pub kind: ErrorKind,
    pub msg: String,
    pub pos: SourcePos,
}

impl CraeftError {
    pub fn new(kind: ErrorKind, msg: impl Into<String>, pos: SourcePos) -> Self {
        CraeftError {
            kind,
            msg: msg.into(),
            pos,
        }
    }

    pub fn lexer(msg: impl Into<String>, pos: SourcePos) -> Self {
        CraeftError::new(ErrorKind::Lexer, msg, pos)
    }

    pub fn parser(msg: impl Into<String>, pos: SourcePos) -> Self {
        CraeftError::new(ErrorKind::Parser, msg, pos)
    }

    pub fn name(msg: impl Into<String>, pos: SourcePos) -> Self {
        CraeftError::new(ErrorKind::Name, msg, pos)
    }

    pub fn ty(msg: impl Into<String>, pos: SourcePos) -> Self {
        CraeftError::new(ErrorKind::Type, msg, pos)
    }

    pub fn generic(msg: impl Into<String>, pos: SourcePos) -> Self {
        CraeftError::new(ErrorKind::Generic, msg, pos)
    }

    pub fn internal(msg: impl Into<String>, pos: SourcePos) -> Self {
        CraeftError::new(ErrorKind::Internal, msg, pos)
    }

    /// Render this diagnostic the way `Error::emit` does: header line,
    /// source excerpt, caret pointing at the offending column.
    pub fn emit(&self, source_line: Option<&str>) -> String {
        let header = self.kind.header();
        let mut out = format!(
            "{}:{}:{}: {} {}\n",
            self.pos.file,
            self.pos.line,
            self.pos.column,
            format!("{header}:").red().bold(),
            self.msg,
        );
        if let Some(line) = source_line {
            let pad = " ".repeat(self.pos.column.saturating_sub(1) as usize);
            out.push('\t');
            out.push_str(line);
            out.push('\n');
            out.push('\t');
            out.push_str(&pad);
            out.push_str(&"^".green().bold().to_string());
        }
        out
    }
}

impl fmt::Display for CraeftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.pos, self.kind.header(), self.msg)
    }
}

impl std::error::Error for CraeftError {}

pub type CraeftResult<T> = Result<T, CraeftError>;
