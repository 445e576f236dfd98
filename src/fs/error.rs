//! The error taxonomy of the filesystem engine.

use std::fmt;
use std::io;

/// Failure of an engine operation.
///
/// Every variant except [`FsError::Io`] is recoverable: the shell reports it
/// and keeps running. A backing-file error means the image can no longer be
/// trusted and ends the session.
#[derive(Debug)]
pub enum FsError {
    /// The source file or directory does not exist.
    FileNotFound,
    /// An intermediate path component does not exist or is not a directory.
    PathNotFound,
    /// The destination name is already taken.
    Exists,
    /// The directory still holds entries besides `.` and `..`.
    NotEmpty,
    /// The image could not be created or formatted.
    CannotCreateFile,
    /// No operation is possible until `format` succeeds.
    NotFormatted,
    /// The write would exceed the maximum addressable file size.
    TooLarge,
    /// A bitmap has no zero bit left.
    OutOfSpace,
    /// The backing file failed underneath the engine.
    Io(io::Error),
}

pub type Result<T> = std::result::Result<T, FsError>;

impl From<io::Error> for FsError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileNotFound => write!(fmt, "FILE NOT FOUND"),
            Self::PathNotFound => write!(fmt, "PATH NOT FOUND"),
            Self::Exists => write!(fmt, "EXIST"),
            Self::NotEmpty => write!(fmt, "NOT EMPTY"),
            Self::CannotCreateFile => write!(fmt, "CANNOT CREATE FILE"),
            Self::NotFormatted => write!(fmt, "You must format the disk first!"),
            Self::TooLarge | Self::OutOfSpace => write!(fmt, "An unknown error occurred"),
            Self::Io(e) => write!(fmt, "backing file error: {e}"),
        }
    }
}
