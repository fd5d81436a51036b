use std::path::PathBuf;

use thiserror::Error;

use crate::format::{MAX_METADATA_LEN, MAX_TITLE_LEN};

/// Problems with caller-supplied inputs, raised before any container
/// bytes exist.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("input file not found: {0}")]
    NotFound(PathBuf),

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("unsupported image format: {0}")]
    UnsupportedImage(String),

    #[error("image does not decode cleanly: {0}")]
    CorruptImage(String),

    #[error("title must not be empty")]
    EmptyTitle,

    #[error("title is {0} bytes, limit is {max}", max = MAX_TITLE_LEN)]
    TitleTooLong(usize),

    #[error("metadata block is {0} bytes, cap is {max}", max = MAX_METADATA_LEN)]
    MetadataTooLarge(usize),
}

/// Problems found while parsing or verifying container bytes. Each variant
/// names the check that failed and what was observed.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("bad magic bytes, not a K2SHBWI container")]
    BadMagic,

    #[error("unsupported container version {found} (this build reads up to {supported})")]
    UnsupportedVersion { found: u16, supported: u16 },

    #[error("truncated {section}: need {needed} bytes, have {available}")]
    Truncated {
        section: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("{0} unexpected trailing bytes after the checksum")]
    TrailingBytes(usize),

    #[error("checksum mismatch: stored {stored:016x}, computed {computed:016x}")]
    ChecksumMismatch { stored: u64, computed: u64 },

    #[error("unknown payload codec id {0}")]
    UnknownCodec(u8),

    #[error("malformed metadata block: {0}")]
    Metadata(String),

    #[error("payload decompression failed: {0}")]
    Decompress(String),

    #[error("payload recovered {actual} bytes, container records {expected}")]
    PayloadLength { expected: u64, actual: u64 },
}

/// Umbrella error for every fallible core operation.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
