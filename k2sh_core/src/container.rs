//! Encode and decode for single-image K2SHBWI containers.
//!
//! # Layout written
//! ```text
//! [MAGIC: 8 bytes "K2SHBWI\n"]
//! [version: u16 LE]
//! [metadata_len: u32 LE] [metadata block]
//! [payload_len: u64 LE]  [payload block: codec_id:u8 + raw_len:u64 LE + stored bytes]
//! [checksum: u64 LE, xxhash3-64 over metadata block ++ payload block]
//! ```
//!
//! # Decode contract
//! Checks run in a fixed order and the first failure wins: magic, version
//! gate, section bounds, checksum, then metadata and payload structure.
//! The checksum is recomputed on every decode and inspect, not only under
//! explicit validation. No field inside the container is trusted before it.
//! Containers are immutable; changing one means re-encoding.

use tracing::debug;
use xxhash_rust::xxh3::Xxh3;

use crate::error::{FormatError, InputError, Result};
use crate::format::{
    read_u16, read_u32, read_u64, CHECKSUM_LEN, CONTAINER_VERSION, DEFAULT_ZSTD_LEVEL, HEADER_LEN,
    MAGIC, MAX_METADATA_LEN, PAYLOAD_HEADER_LEN,
};
use crate::image;
use crate::metadata::Metadata;
use crate::payload::PayloadCodec;

/// Knobs for [`encode`]. `codec: None` lets the source format choose via
/// [`PayloadCodec::auto_for`].
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    pub codec: Option<PayloadCodec>,
    /// Zstd compression level (1–22), used only when the codec is zstd.
    pub zstd_level: i32,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            codec: None,
            zstd_level: DEFAULT_ZSTD_LEVEL,
        }
    }
}

/// A decoded container: the original image bytes and their metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub image: Vec<u8>,
    pub metadata: Metadata,
}

/// Header facts and metadata, gathered without decompressing the payload.
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub version: u16,
    pub codec: PayloadCodec,
    pub metadata: Metadata,
    pub metadata_len: usize,
    /// Bytes of payload as stored (after compression).
    pub payload_stored_len: u64,
    /// Bytes the payload decompresses back to.
    pub payload_raw_len: u64,
    pub checksum: u64,
}

/// Seal `image_bytes` and `metadata` into a container.
///
/// The image must decode cleanly as a supported raster; its dimensions and
/// format are stamped into the metadata (`source_width`, `source_height`,
/// `source_format`). Encoding is deterministic: the same inputs yield
/// byte-identical containers.
pub fn encode(image_bytes: &[u8], metadata: Metadata, options: &EncodeOptions) -> Result<Vec<u8>> {
    let info = image::ensure_decodable(image_bytes)?;
    let mut metadata = metadata;
    metadata.record_source(info);

    let codec = options
        .codec
        .unwrap_or_else(|| PayloadCodec::auto_for(info.kind));
    let stored = codec.compress(image_bytes, options.zstd_level)?;

    let meta_block = metadata.to_bytes();
    if meta_block.len() > MAX_METADATA_LEN {
        return Err(InputError::MetadataTooLarge(meta_block.len()).into());
    }

    let mut payload_block = Vec::with_capacity(PAYLOAD_HEADER_LEN + stored.len());
    payload_block.push(codec.id());
    payload_block.extend_from_slice(&(image_bytes.len() as u64).to_le_bytes());
    payload_block.extend_from_slice(&stored);

    let mut hasher = Xxh3::new();
    hasher.update(&meta_block);
    hasher.update(&payload_block);
    let checksum = hasher.digest();

    let total =
        HEADER_LEN + 4 + meta_block.len() + 8 + payload_block.len() + CHECKSUM_LEN;
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&CONTAINER_VERSION.to_le_bytes());
    out.extend_from_slice(&(meta_block.len() as u32).to_le_bytes());
    out.extend_from_slice(&meta_block);
    out.extend_from_slice(&(payload_block.len() as u64).to_le_bytes());
    out.extend_from_slice(&payload_block);
    out.extend_from_slice(&checksum.to_le_bytes());

    debug!(
        codec = codec.name(),
        raw = image_bytes.len(),
        stored = stored.len(),
        total = out.len(),
        "encoded container"
    );
    Ok(out)
}

/// Verify and unpack a container back into image bytes and metadata.
pub fn decode(bytes: &[u8]) -> Result<Decoded> {
    let sections = split(bytes)?;
    verify_checksum(&sections)?;
    let metadata = Metadata::from_bytes(sections.metadata)?;
    let (codec, raw_len, stored) = parse_payload_header(sections.payload)?;
    let image = codec.decompress(stored, raw_len)?;
    debug!(codec = codec.name(), raw = image.len(), "decoded container");
    Ok(Decoded { image, metadata })
}

/// Verify a container and report header facts without reconstructing the
/// image. Backs the `info` command; a corrupt container is refused rather
/// than described.
pub fn inspect(bytes: &[u8]) -> Result<ContainerInfo> {
    let sections = split(bytes)?;
    verify_checksum(&sections)?;
    let metadata = Metadata::from_bytes(sections.metadata)?;
    let (codec, raw_len, stored) = parse_payload_header(sections.payload)?;
    Ok(ContainerInfo {
        version: sections.version,
        codec,
        metadata,
        metadata_len: sections.metadata.len(),
        payload_stored_len: stored.len() as u64,
        payload_raw_len: raw_len,
        checksum: sections.checksum,
    })
}

// ── Section parsing ────────────────────────────────────────────────────────

pub(crate) struct Sections<'a> {
    pub version: u16,
    pub metadata: &'a [u8],
    pub payload: &'a [u8],
    pub checksum: u64,
}

/// Slice a container into its sections, enforcing magic, version gate, and
/// exact bounds. Content is not trusted yet; that is the checksum's job.
pub(crate) fn split(bytes: &[u8]) -> std::result::Result<Sections<'_>, FormatError> {
    need(bytes, 0, MAGIC.len(), "magic")?;
    if &bytes[..MAGIC.len()] != MAGIC {
        return Err(FormatError::BadMagic);
    }

    need(bytes, MAGIC.len(), 2, "version")?;
    let version = read_u16(&bytes[MAGIC.len()..HEADER_LEN]);
    if version == 0 || version > CONTAINER_VERSION {
        return Err(FormatError::UnsupportedVersion {
            found: version,
            supported: CONTAINER_VERSION,
        });
    }

    let mut offset = HEADER_LEN;

    need(bytes, offset, 4, "metadata length")?;
    let metadata_len = read_u32(&bytes[offset..offset + 4]) as usize;
    offset += 4;
    if metadata_len > MAX_METADATA_LEN {
        return Err(FormatError::Metadata(format!(
            "declared length {metadata_len} exceeds the {MAX_METADATA_LEN} byte cap"
        )));
    }
    need(bytes, offset, metadata_len, "metadata block")?;
    let metadata = &bytes[offset..offset + metadata_len];
    offset += metadata_len;

    need(bytes, offset, 8, "payload length")?;
    let payload_len64 = read_u64(&bytes[offset..offset + 8]);
    offset += 8;
    let remaining = bytes.len() - offset;
    if payload_len64 > remaining as u64 {
        return Err(FormatError::Truncated {
            section: "payload block",
            needed: payload_len64.min(usize::MAX as u64) as usize,
            available: remaining,
        });
    }
    let payload_len = payload_len64 as usize;
    if payload_len < PAYLOAD_HEADER_LEN {
        return Err(FormatError::Truncated {
            section: "payload header",
            needed: PAYLOAD_HEADER_LEN,
            available: payload_len,
        });
    }
    let payload = &bytes[offset..offset + payload_len];
    offset += payload_len;

    need(bytes, offset, CHECKSUM_LEN, "checksum")?;
    let checksum = read_u64(&bytes[offset..offset + CHECKSUM_LEN]);
    offset += CHECKSUM_LEN;

    if offset != bytes.len() {
        return Err(FormatError::TrailingBytes(bytes.len() - offset));
    }

    Ok(Sections {
        version,
        metadata,
        payload,
        checksum,
    })
}

pub(crate) fn verify_checksum(sections: &Sections<'_>) -> std::result::Result<(), FormatError> {
    let mut hasher = Xxh3::new();
    hasher.update(sections.metadata);
    hasher.update(sections.payload);
    let computed = hasher.digest();
    if computed != sections.checksum {
        return Err(FormatError::ChecksumMismatch {
            stored: sections.checksum,
            computed,
        });
    }
    Ok(())
}

/// Split the payload block into codec, recorded raw length, and stored
/// bytes. `split` guarantees the block holds at least the header.
pub(crate) fn parse_payload_header(
    payload: &[u8],
) -> std::result::Result<(PayloadCodec, u64, &[u8]), FormatError> {
    let codec = PayloadCodec::from_id(payload[0])?;
    let raw_len = read_u64(&payload[1..PAYLOAD_HEADER_LEN]);
    Ok((codec, raw_len, &payload[PAYLOAD_HEADER_LEN..]))
}

fn need(
    bytes: &[u8],
    offset: usize,
    len: usize,
    section: &'static str,
) -> std::result::Result<(), FormatError> {
    let available = bytes.len().saturating_sub(offset);
    if available < len {
        return Err(FormatError::Truncated {
            section,
            needed: len,
            available,
        });
    }
    Ok(())
}
