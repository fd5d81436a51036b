//! Payload compression choices.
//!
//! The codec id is a single byte inside the checksummed payload block, so a
//! container always decodes with the codec it was encoded with and the
//! choice is tamper-protected. The table is closed: assigning a new id is a
//! format revision, not a plugin point.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::FormatError;
use crate::format::{CODEC_DEFLATE, CODEC_STORE, CODEC_ZSTD};
use crate::image::ImageKind;

/// How image bytes are stored inside the payload block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadCodec {
    /// Verbatim bytes. The right call for sources that are already
    /// compressed (png, jpeg, gif, webp).
    Store,
    /// Zstandard. Default for uncompressed sources (bmp, tiff).
    Zstd,
    /// zlib-wrapped DEFLATE, for toolchains where zstd is unavailable.
    Deflate,
}

impl PayloadCodec {
    /// Stable codec id written into the payload block.
    pub const fn id(self) -> u8 {
        match self {
            PayloadCodec::Store => CODEC_STORE,
            PayloadCodec::Zstd => CODEC_ZSTD,
            PayloadCodec::Deflate => CODEC_DEFLATE,
        }
    }

    /// Resolve a codec from its on-disk id.
    pub fn from_id(id: u8) -> Result<Self, FormatError> {
        match id {
            CODEC_STORE => Ok(PayloadCodec::Store),
            CODEC_ZSTD => Ok(PayloadCodec::Zstd),
            CODEC_DEFLATE => Ok(PayloadCodec::Deflate),
            other => Err(FormatError::UnknownCodec(other)),
        }
    }

    /// Human-readable codec name for CLI display.
    pub const fn name(self) -> &'static str {
        match self {
            PayloadCodec::Store => "store",
            PayloadCodec::Zstd => "zstd",
            PayloadCodec::Deflate => "deflate",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "store" | "raw" | "none" => Some(PayloadCodec::Store),
            "zstd" | "z" => Some(PayloadCodec::Zstd),
            "deflate" | "zlib" => Some(PayloadCodec::Deflate),
            _ => None,
        }
    }

    /// Codec choice when the caller does not pin one: store for sources
    /// that already carry their own compression, zstd otherwise.
    pub fn auto_for(kind: ImageKind) -> Self {
        if kind.is_precompressed() {
            PayloadCodec::Store
        } else {
            PayloadCodec::Zstd
        }
    }

    pub(crate) fn compress(self, raw: &[u8], zstd_level: i32) -> std::io::Result<Vec<u8>> {
        match self {
            PayloadCodec::Store => Ok(raw.to_vec()),
            PayloadCodec::Zstd => zstd::bulk::compress(raw, zstd_level),
            PayloadCodec::Deflate => {
                let mut encoder =
                    ZlibEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::default());
                encoder.write_all(raw)?;
                encoder.finish()
            }
        }
    }

    /// Recover the original bytes. `raw_len` is the recorded original size;
    /// it pre-sizes the output and any disagreement with what actually comes
    /// back is an error, never silently accepted.
    pub(crate) fn decompress(self, stored: &[u8], raw_len: u64) -> Result<Vec<u8>, FormatError> {
        let capacity = usize::try_from(raw_len).map_err(|_| {
            FormatError::Decompress(format!("recorded size {raw_len} exceeds addressable memory"))
        })?;
        let raw = match self {
            PayloadCodec::Store => stored.to_vec(),
            PayloadCodec::Zstd => zstd::bulk::decompress(stored, capacity)
                .map_err(|e| FormatError::Decompress(e.to_string()))?,
            PayloadCodec::Deflate => {
                let mut out = Vec::with_capacity(capacity);
                ZlibDecoder::new(stored)
                    .read_to_end(&mut out)
                    .map_err(|e| FormatError::Decompress(e.to_string()))?;
                out
            }
        };
        if raw.len() as u64 != raw_len {
            return Err(FormatError::PayloadLength {
                expected: raw_len,
                actual: raw.len() as u64,
            });
        }
        Ok(raw)
    }
}
