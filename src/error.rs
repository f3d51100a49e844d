use std::path::PathBuf;

use thiserror::Error;

use crate::cursor::FormatErrorContext;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("invalid UTF-8 input in \"{}\": {source}", .path.display())]
    InvalidEncoding {
        path: PathBuf,
        source: std::str::Utf8Error,
    },
    #[error("invalid environment snapshot \"{}\": {source}", .path.display())]
    Snapshot {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// A parse or expansion failure, positioned inside the source buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "{kind} in \"{}\" at line {}.\n{}",
    .context.path(),
    .context.line(),
    .context.details()
)]
pub struct FormatError {
    kind: FormatErrorKind,
    context: FormatErrorContext,
}

impl FormatError {
    pub(crate) fn new(kind: FormatErrorKind, context: FormatErrorContext) -> Self {
        Self { kind, context }
    }

    pub fn kind(&self) -> &FormatErrorKind {
        &self.kind
    }

    pub fn context(&self) -> &FormatErrorContext {
        &self.context
    }

    pub fn line(&self) -> usize {
        self.context.line()
    }

    pub fn offset(&self) -> usize {
        self.context.offset()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatErrorKind {
    #[error("Invalid character in variable name")]
    InvalidCharacterInName,
    #[error("Whitespace characters are not supported after the variable name")]
    WhitespaceAfterName,
    #[error("Missing = in the environment variable declaration")]
    MissingEquals,
    #[error("Unable to unset an environment variable")]
    CannotUnsetVariable,
    #[error("Whitespace characters are not supported before the value")]
    WhitespaceBeforeValue,
    #[error("Missing quote to end the value")]
    MissingClosingQuote,
    #[error("A value containing spaces must be surrounded by quotes")]
    ValueContainsUnquotedSpace,
    #[error("Unclosed braces on variable expansion")]
    UnclosedBraces,
    #[error("Unsupported character \"{character}\" found in the default value of variable \"${name}\".")]
    UnsupportedCharacterInDefault { character: char, name: String },
    #[error("Missing closing parenthesis.")]
    MissingClosingParenthesis,
    #[error("Issue expanding a command ({message})")]
    CommandFailed { message: String },
}

/// An environment file that is missing, unreadable, or a directory.
#[derive(Debug, Error)]
#[error("Unable to read \"{}\" environment file", .path.display())]
pub struct PathError {
    path: PathBuf,
    #[source]
    source: Option<std::io::Error>,
}

impl PathError {
    pub(crate) fn new(path: impl Into<PathBuf>, source: Option<std::io::Error>) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

/// Failure reported by a [`CommandRunner`](crate::CommandRunner).
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("{stderr}")]
    Failed { status: Option<i32>, stderr: String },
}
