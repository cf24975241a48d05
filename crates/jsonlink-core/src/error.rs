//! Error types for jsonlink
//!
//! Errors are structured: a kind describing what went wrong, the document
//! that held the failing reference, and an optional cause and help message.

use std::fmt;

/// Result type alias for jsonlink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for jsonlink operations
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Document containing the reference that failed (e.g., "/etc/app/main.json")
    pub source: Option<String>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Target document does not exist
    NotFound { path: String },
    /// Target document is not well-formed JSON
    InvalidDocument { path: String },
    /// Reading failed for a reason other than absence
    Io(IoFailure),
    /// Reference cannot be re-based against its containing document
    UnresolvableReference { reference: String },
    /// A document (transitively) references itself
    CircularReference,
}

/// Specific I/O failure categories
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoFailure {
    /// File system read failed
    File { path: String },
    /// External command could not be run or exited unsuccessfully
    Command {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },
}

impl Error {
    /// Create a not found error
    pub fn not_found(path: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::NotFound { path: path.into() },
            source: None,
            help: Some("Check the path, or mark the reference optional by dropping the '!'".into()),
            cause: None,
        }
    }

    /// Create an invalid document error
    pub fn invalid_document(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidDocument { path: path.into() },
            source: None,
            help: None,
            cause: Some(message.into()),
        }
    }

    /// Create a file read error
    pub fn file_io(path: impl Into<String>, err: &std::io::Error) -> Self {
        Self {
            kind: ErrorKind::Io(IoFailure::File { path: path.into() }),
            source: None,
            help: None,
            cause: Some(err.to_string()),
        }
    }

    /// Create a command failure error
    pub fn command_failed(
        command: impl Into<String>,
        exit_code: Option<i32>,
        stderr: impl Into<String>,
    ) -> Self {
        let stderr = stderr.into();
        let cause = stderr.trim().to_string();
        Self {
            kind: ErrorKind::Io(IoFailure::Command {
                command: command.into(),
                exit_code,
                stderr,
            }),
            source: None,
            help: None,
            cause: if cause.is_empty() { None } else { Some(cause) },
        }
    }

    /// Create an error for a command that could not be started at all
    pub fn command_spawn(command: impl Into<String>, err: &std::io::Error) -> Self {
        Self {
            kind: ErrorKind::Io(IoFailure::Command {
                command: command.into(),
                exit_code: None,
                stderr: String::new(),
            }),
            source: None,
            help: Some("Check that git is installed and on PATH".into()),
            cause: Some(err.to_string()),
        }
    }

    /// Create an unresolvable reference error
    pub fn unresolvable(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::UnresolvableReference {
                reference: reference.into(),
            },
            source: None,
            help: None,
            cause: Some(message.into()),
        }
    }

    /// Create a circular reference error
    pub fn circular_reference(chain: Vec<String>) -> Self {
        Self {
            kind: ErrorKind::CircularReference,
            source: None,
            help: Some("Break the cycle by removing one of the references".into()),
            cause: Some(format!("Chain: {}", chain.join(" → "))),
        }
    }

    /// Record the document holding the failing reference, keeping the innermost one
    pub fn in_document(mut self, source: impl fmt::Display) -> Self {
        if self.source.is_none() {
            self.source = Some(source.to_string());
        }
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Check whether this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::NotFound { path } => write!(f, "Document not found: {}", path)?,
            ErrorKind::InvalidDocument { path } => write!(f, "Invalid JSON document: {}", path)?,
            ErrorKind::Io(IoFailure::File { path }) => write!(f, "Failed to read {}", path)?,
            ErrorKind::Io(IoFailure::Command {
                command, exit_code, ..
            }) => {
                write!(f, "Command failed: {}", command)?;
                if let Some(code) = exit_code {
                    write!(f, " (exit code {})", code)?;
                }
            }
            ErrorKind::UnresolvableReference { reference } => {
                write!(f, "Unresolvable reference: {}", reference)?
            }
            ErrorKind::CircularReference => write!(f, "Circular reference detected")?,
        }

        if let Some(source) = &self.source {
            write!(f, "\n  Source: {}", source)?;
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}
