use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Represents a byte span within a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: SourceSpan) -> SourceSpan {
        SourceSpan {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Error kinds observable from NumFu programs. `Custom` carries the tag given
/// as the second argument of `error(msg, tag)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Name,
    Type,
    Index,
    Value,
    Assertion,
    Recursion,
    Import,
    Runtime,
    Custom(String),
}

impl ErrorKind {
    /// Process exit status for a failed evaluation: syntax and import
    /// problems exit with 2, everything else with 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            ErrorKind::Syntax | ErrorKind::Import => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Syntax => write!(f, "SyntaxError"),
            ErrorKind::Name => write!(f, "NameError"),
            ErrorKind::Type => write!(f, "TypeError"),
            ErrorKind::Index => write!(f, "IndexError"),
            ErrorKind::Value => write!(f, "ValueError"),
            ErrorKind::Assertion => write!(f, "AssertionError"),
            ErrorKind::Recursion => write!(f, "RecursionError"),
            ErrorKind::Import => write!(f, "ImportError"),
            ErrorKind::Runtime => write!(f, "RuntimeError"),
            ErrorKind::Custom(tag) => write!(f, "{tag}"),
        }
    }
}

/// Rich diagnostic information surfaced to end users.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Option<SourceSpan>,
    pub file: Option<PathBuf>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
            file: None,
            notes: Vec::new(),
        }
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Attach the source file, keeping the innermost attribution if one was
    /// already recorded deeper in the module graph.
    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        if self.file.is_none() {
            self.file = Some(file.into());
        }
        self
    }

    /// Render the diagnostic against its source text, with a caret line under
    /// the offending span.
    pub fn render(&self, source: Option<&str>) -> String {
        let mut out = String::new();
        let location = self
            .file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<input>".into());
        if let (Some(span), Some(code)) = (self.span, source) {
            let (line, col) = line_col(code, span.start);
            out.push_str(&format!("[at {location}:{line}:{col}]\n"));
            if let Some(text) = code.lines().nth(line - 1) {
                let width = span.end.saturating_sub(span.start).max(1);
                let width = width.min(text.len().saturating_sub(col - 1).max(1));
                out.push_str(&format!("  {text}\n"));
                out.push_str(&format!("  {}{}\n", " ".repeat(col - 1), "^".repeat(width)));
            }
        } else {
            out.push_str(&format!("[at {location}]\n"));
        }
        out.push_str(&format!("{}: {}", self.kind, self.message));
        for note in &self.notes {
            out.push_str(&format!("\n  note: {note}"));
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(span) = self.span {
            write!(f, " ({}..{})", span.start, span.end)?;
        }
        for note in &self.notes {
            write!(f, "\n  note: {note}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// Convert a byte offset into a 1-based line/column pair.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let clamped = offset.min(source.len());
    let line = source[..clamped].matches('\n').count() + 1;
    let line_start = source[..clamped].rfind('\n').map(|i| i + 1).unwrap_or(0);
    (line, clamped - line_start + 1)
}

/// Unified error type for the NumFu toolchain.
#[derive(Debug, Error)]
pub enum NumFuError {
    #[error("{0}")]
    Diagnostic(#[from] Diagnostic),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("exit({0})")]
    Exit(i32),
}

impl NumFuError {
    pub fn attach_file(self, file: &std::path::Path) -> Self {
        match self {
            NumFuError::Diagnostic(diag) => NumFuError::Diagnostic(diag.with_file(file)),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, NumFuError>;
