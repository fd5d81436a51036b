/// Magic bytes for K2SHBWI version 1 containers.
/// 8 bytes: "K2SHBWI" followed by a newline.
pub const MAGIC: &[u8; 8] = b"K2SHBWI\n";

/// Highest container version this build reads and the version it writes.
///
/// Versioning is extend-only: a future revision appends fields and bumps
/// this number, and a reader refuses any version above its own.
pub const CONTAINER_VERSION: u16 = 1;

/// Fixed size of the container header in bytes.
///   magic[8] + version:u16 = 10
pub const HEADER_LEN: usize = 10;

/// Size of the payload block header in bytes.
///   codec_id:u8 + raw_len:u64 = 9
pub const PAYLOAD_HEADER_LEN: usize = 9;

/// Size of the trailing checksum (xxhash3-64) in bytes.
pub const CHECKSUM_LEN: usize = 8;

/// Smallest structurally possible container:
///   header + metadata_len:u32 + empty metadata + payload_len:u64
///   + payload header + empty payload + checksum
///   = 10 + 4 + 0 + 8 + 9 + 0 + 8 = 39
pub const MIN_CONTAINER_LEN: usize = HEADER_LEN + 4 + 8 + PAYLOAD_HEADER_LEN + CHECKSUM_LEN;

/// File extension for container files.
pub const EXTENSION: &str = "k2sh";

// ── Limits ─────────────────────────────────────────────────────────────────

/// Longest permitted title, in encoded UTF-8 bytes.
pub const MAX_TITLE_LEN: usize = 256;

/// Cap on the whole metadata block. A declared length above this is rejected
/// before any allocation happens.
pub const MAX_METADATA_LEN: usize = 1 << 20;

/// Default zstd compression level when the payload codec is zstd.
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

// ── Payload codec IDs ──────────────────────────────────────────────────────

pub const CODEC_STORE: u8 = 0;
pub const CODEC_ZSTD: u8 = 1;
pub const CODEC_DEFLATE: u8 = 2;

// ── Metadata type tags ─────────────────────────────────────────────────────

/// UTF-8 string value.
pub const TAG_STRING: u8 = 1;
/// i64 little-endian value.
pub const TAG_INT: u8 = 2;
/// i64 little-endian Unix seconds, UTC.
pub const TAG_TIMESTAMP: u8 = 3;

// ── Well-known metadata field names ────────────────────────────────────────

pub const FIELD_TITLE: &str = "title";
pub const FIELD_WIDTH: &str = "source_width";
pub const FIELD_HEIGHT: &str = "source_height";
pub const FIELD_FORMAT: &str = "source_format";
pub const FIELD_CREATED_AT: &str = "created_at";

// ── Little-endian slice reads ──────────────────────────────────────────────
// Callers bounds-check before slicing; these only turn checked slices into
// integers without the try_into ceremony.

pub(crate) fn read_u16(buf: &[u8]) -> u16 {
    u16::from_le_bytes([buf[0], buf[1]])
}

pub(crate) fn read_u32(buf: &[u8]) -> u32 {
    u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])
}

pub(crate) fn read_u64(buf: &[u8]) -> u64 {
    u64::from_le_bytes([
        buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
    ])
}

pub(crate) fn read_i64(buf: &[u8]) -> i64 {
    read_u64(buf) as i64
}
