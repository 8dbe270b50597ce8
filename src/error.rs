//! Errors

use std::io;

use thiserror::Error;

/// Errors generated from the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("std io error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid magic read from kxr prolog: expected \"kxrf\", found {0:?}")]
    InvalidMagic([u8; 4]),

    #[error("kxr file header is corrupt or truncated")]
    CorruptHeader,

    #[error("data format '{0}' is not supported for on-disk kxr data")]
    UnsupportedFormat(char),

    #[error("writing would exceed the buffer's declared capacity")]
    BufferOverflow,

    #[error("zlib compression failed: {0}")]
    Compression(String),

    #[error("source path does not exist: {0}")]
    SourceNotFound(std::path::PathBuf),

    #[error("source path is not a directory: {0}")]
    NotADirectory(std::path::PathBuf),

    #[error("kxr file already exists: {0}")]
    AlreadyExists(std::path::PathBuf),

    #[error("kxr container is not open for writing")]
    NotWritable,

    #[error("kxr container is already open")]
    AlreadyOpen,

    #[error("\"{0}\" is not a valid kxr filename")]
    InvalidFilename(String),

    #[error("entry name exceeds the maximum encodable length of {0} bytes")]
    NameTooLong(usize),
}

pub type Result<T> = core::result::Result<T, Error>;
