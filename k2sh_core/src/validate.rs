//! Structural health check without image reconstruction.

use crate::container::{parse_payload_header, split, verify_checksum};
use crate::error::FormatError;
use crate::metadata::Metadata;

/// Outcome of [`validate`]: every check passed, or the first violated
/// invariant. There is no partial success.
#[derive(Debug)]
pub struct ValidationReport {
    failure: Option<FormatError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.failure.is_none()
    }

    /// The first check that failed, if any.
    pub fn failure(&self) -> Option<&FormatError> {
        self.failure.as_ref()
    }

    pub fn into_failure(self) -> Option<FormatError> {
        self.failure
    }
}

/// Run the same checks as a decode, stopping short of payload
/// decompression: magic, version gate, section bounds, checksum, metadata
/// structure, payload header. Cheap enough for large CI sweeps, idempotent,
/// side-effect-free.
pub fn validate(bytes: &[u8]) -> ValidationReport {
    ValidationReport {
        failure: checks(bytes).err(),
    }
}

fn checks(bytes: &[u8]) -> Result<(), FormatError> {
    let sections = split(bytes)?;
    verify_checksum(&sections)?;
    Metadata::from_bytes(sections.metadata)?;
    parse_payload_header(sections.payload)?;
    Ok(())
}
