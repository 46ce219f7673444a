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
    /// An unknown tag was found in the constant pool.
    #[error("{0} is not a known constant pool tag")]
    UnknownConstantPoolTag(u8),
    /// A constant-pool index pointed at an entry of the wrong kind, or past the end.
    #[error("constant pool index {0} did not resolve to the expected entry kind")]
    BadConstantPoolIndex(u16),
    /// A nom parser error occurred while reading the byte stream.
    #[error("malformed classfile: {kind:?}")]
    Malformed {
        /// the nom error kind
        kind: nom::error::ErrorKind,
    },
    /// The byte stream ended before the expected structure was fully read.
    #[error("truncated classfile: expected {0} more bytes")]
    Truncated(String),
    /// The magic number did not match `0xCAFEBABE`.
    #[error("bad magic number: {0:#x}")]
    BadMagic(u32),
}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for ErrorKind {
    fn from(e: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        match e {
            nom::Err::Incomplete(needed) => ErrorKind::Truncated(format!("{needed:?}")),
            nom::Err::Error(inner) | nom::Err::Failure(inner) => ErrorKind::Malformed {
                kind: inner.code,
            },
        }
    }
}
