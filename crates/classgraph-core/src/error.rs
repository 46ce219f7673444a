//! The error type this crate can emit.

use std::backtrace::Backtrace;
use std::fmt::{Debug, Display, Formatter};

use crate::graph::FQNameBuf;

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
    pub fn new<E: Into<ErrorKind>>(kind: E) -> Self {
        Self {
            kind: kind.into(),
            backtrace: Backtrace::capture(),
        }
    }

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
    /// The scan was interrupted before all workers drained.
    #[error("scan interrupted before completion")]
    ScanInterrupted,
    /// A worker raised an unrecoverable error; the first one is surfaced.
    #[error("fatal error in work queue worker: {0}")]
    WorkerFailed(String),
    /// Caller queried an axis that indexing was not enabled for.
    #[error("operation requires indexing to be enabled: {0}")]
    IndexingNotEnabled(&'static str),
    /// Caller used the singular-origin accessor on a multi-origin Class Info.
    #[error("{0} has multiple origins; use the plural accessor")]
    MultipleOrigins(FQNameBuf),
    /// An I/O error while reading an archive or directory entry.
    #[error("I/O error: {0}")]
    Io(String),
    /// A ZIP archive could not be opened or read.
    #[error("archive error: {0}")]
    Archive(String),
    /// A single classfile failed to parse; recorded non-fatally and
    /// surfaced via `ScanResult`'s deferred-error list rather than aborting
    /// the scan.
    #[error("failed to parse {0}: {1}")]
    ParseFailure(String, String),
}

impl From<std::io::Error> for ErrorKind {
    fn from(e: std::io::Error) -> Self {
        ErrorKind::Io(e.to_string())
    }
}

impl From<zip::result::ZipError> for ErrorKind {
    fn from(e: zip::result::ZipError) -> Self {
        ErrorKind::Archive(e.to_string())
    }
}
