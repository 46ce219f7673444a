//! The error type this crate can emit.

use std::backtrace::Backtrace;
use std::fmt::{Debug, Display, Formatter};

/// The error type.
pub struct Error {
    kind: ErrorKind,
    backtrace: Backtrace,
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if f.alternate() {
            write!(f, "{} at\n{}", self.kind, self.backtrace)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Creates a new error from an error kind.
    pub fn new<E: Into<ErrorKind>>(kind: E) -> Self {
        Self {
            kind: kind.into(),
            backtrace: Backtrace::capture(),
        }
    }

    /// Gets the error kind.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl<E: Into<ErrorKind>> From<E> for Error {
    fn from(error: E) -> Self {
        let kind = error.into();
        Self {
            kind,
            backtrace: Backtrace::capture(),
        }
    }
}

/// The error kind.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A spec token could not be parsed (e.g. an empty `jar:` prefix).
    #[error("invalid scan spec token: {0:?}")]
    InvalidToken(String),
}
