//! Typed metadata carried next to the image payload.
//!
//! # Wire form
//! A metadata block is a concatenation of fields, sorted by name:
//! ```text
//! [name_len:u16][name: UTF-8][type_tag:u8][value_len:u32][value bytes]
//! ```
//! Known tags are string (1), integer (2), and timestamp (3). A field with
//! any other tag decodes to [`Value::Unknown`] and re-encodes byte-for-byte,
//! so containers written by a newer revision survive a decode → encode
//! round trip through this one.

use std::collections::BTreeMap;

use crate::error::{FormatError, InputError};
use crate::format::{
    read_i64, read_u16, read_u32, FIELD_CREATED_AT, FIELD_FORMAT, FIELD_HEIGHT, FIELD_TITLE,
    FIELD_WIDTH, MAX_TITLE_LEN, TAG_INT, TAG_STRING, TAG_TIMESTAMP,
};
use crate::image::ImageInfo;

/// One typed metadata value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(String),
    Int(i64),
    /// Unix seconds, UTC.
    Timestamp(i64),
    /// Field written with a tag this revision does not know. Carried through
    /// verbatim.
    Unknown { tag: u8, bytes: Vec<u8> },
}

/// Named fields attached to a container.
///
/// Fields live in a [`BTreeMap`] so the encoded block is always sorted by
/// name and two encodes of the same metadata are byte-identical.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Metadata {
    fields: BTreeMap<String, Value>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build metadata with just a title.
    pub fn with_title(title: impl Into<String>) -> Result<Self, InputError> {
        let mut metadata = Self::new();
        metadata.set_title(title)?;
        Ok(metadata)
    }

    /// Set the title field. Titles must be non-empty and at most
    /// [`MAX_TITLE_LEN`] encoded bytes.
    pub fn set_title(&mut self, title: impl Into<String>) -> Result<(), InputError> {
        let title = title.into();
        check_title(&title)?;
        self.fields.insert(FIELD_TITLE.to_string(), Value::Str(title));
        Ok(())
    }

    pub fn title(&self) -> Option<&str> {
        match self.fields.get(FIELD_TITLE) {
            Some(Value::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn set_created_at(&mut self, unix_seconds: i64) {
        self.fields
            .insert(FIELD_CREATED_AT.to_string(), Value::Timestamp(unix_seconds));
    }

    pub fn created_at(&self) -> Option<i64> {
        match self.fields.get(FIELD_CREATED_AT) {
            Some(Value::Timestamp(secs)) => Some(*secs),
            _ => None,
        }
    }

    /// Source raster dimensions, when the encoder recorded them.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let width = u32::try_from(self.int(FIELD_WIDTH)?).ok()?;
        let height = u32::try_from(self.int(FIELD_HEIGHT)?).ok()?;
        Some((width, height))
    }

    /// Source raster format name ("png", "jpeg", ...), when recorded.
    pub fn source_format(&self) -> Option<&str> {
        match self.fields.get(FIELD_FORMAT) {
            Some(Value::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Insert or replace an arbitrary field. Names must be non-empty.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        debug_assert!(!name.is_empty() && name.len() <= u16::MAX as usize);
        self.fields.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Fields in encoded (name) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn int(&self, name: &str) -> Option<i64> {
        match self.fields.get(name) {
            Some(Value::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Stamp what probing the source image established. Encoder-derived
    /// values replace anything the caller pre-set under the same names.
    pub(crate) fn record_source(&mut self, info: ImageInfo) {
        self.fields
            .insert(FIELD_WIDTH.to_string(), Value::Int(i64::from(info.width)));
        self.fields
            .insert(FIELD_HEIGHT.to_string(), Value::Int(i64::from(info.height)));
        self.fields.insert(
            FIELD_FORMAT.to_string(),
            Value::Str(info.kind.name().to_string()),
        );
    }

    /// Serialize to the sorted wire form.
    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for (name, value) in &self.fields {
            buf.extend_from_slice(&(name.len() as u16).to_le_bytes());
            buf.extend_from_slice(name.as_bytes());
            match value {
                Value::Str(s) => {
                    buf.push(TAG_STRING);
                    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
                    buf.extend_from_slice(s.as_bytes());
                }
                Value::Int(v) => {
                    buf.push(TAG_INT);
                    buf.extend_from_slice(&8u32.to_le_bytes());
                    buf.extend_from_slice(&v.to_le_bytes());
                }
                Value::Timestamp(v) => {
                    buf.push(TAG_TIMESTAMP);
                    buf.extend_from_slice(&8u32.to_le_bytes());
                    buf.extend_from_slice(&v.to_le_bytes());
                }
                Value::Unknown { tag, bytes } => {
                    buf.push(*tag);
                    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                    buf.extend_from_slice(bytes);
                }
            }
        }
        buf
    }

    /// Parse a metadata block. Runs after the container checksum has been
    /// verified, so failures here mean a malformed writer, not corruption.
    pub(crate) fn from_bytes(block: &[u8]) -> Result<Self, FormatError> {
        let mut fields = BTreeMap::new();
        let mut buf = block;

        while !buf.is_empty() {
            if buf.len() < 2 {
                return Err(malformed("field name length overruns the block"));
            }
            let name_len = read_u16(buf) as usize;
            buf = &buf[2..];
            if name_len == 0 {
                return Err(malformed("empty field name"));
            }
            if buf.len() < name_len {
                return Err(malformed("field name overruns the block"));
            }
            let name = std::str::from_utf8(&buf[..name_len])
                .map_err(|_| malformed("field name is not UTF-8"))?
                .to_string();
            buf = &buf[name_len..];

            if buf.len() < 5 {
                return Err(malformed(format!("field '{name}' header overruns the block")));
            }
            let tag = buf[0];
            let value_len = read_u32(&buf[1..5]) as usize;
            buf = &buf[5..];
            if buf.len() < value_len {
                return Err(malformed(format!("field '{name}' value overruns the block")));
            }
            let raw = &buf[..value_len];
            buf = &buf[value_len..];

            let value = decode_value(&name, tag, raw)?;
            if fields.insert(name.clone(), value).is_some() {
                return Err(malformed(format!("duplicate field '{name}'")));
            }
        }

        Ok(Self { fields })
    }
}

fn decode_value(name: &str, tag: u8, raw: &[u8]) -> Result<Value, FormatError> {
    match tag {
        TAG_STRING => {
            let s = std::str::from_utf8(raw)
                .map_err(|_| malformed(format!("field '{name}' is not UTF-8")))?;
            if name == FIELD_TITLE {
                check_title(s).map_err(|e| malformed(e.to_string()))?;
            }
            Ok(Value::Str(s.to_string()))
        }
        TAG_INT | TAG_TIMESTAMP => {
            if raw.len() != 8 {
                return Err(malformed(format!(
                    "field '{name}' holds {} bytes, tag {tag} requires 8",
                    raw.len()
                )));
            }
            let v = read_i64(raw);
            Ok(if tag == TAG_INT {
                Value::Int(v)
            } else {
                Value::Timestamp(v)
            })
        }
        _ => Ok(Value::Unknown {
            tag,
            bytes: raw.to_vec(),
        }),
    }
}

fn check_title(title: &str) -> Result<(), InputError> {
    if title.is_empty() {
        return Err(InputError::EmptyTitle);
    }
    if title.len() > MAX_TITLE_LEN {
        return Err(InputError::TitleTooLong(title.len()));
    }
    Ok(())
}

fn malformed(msg: impl Into<String>) -> FormatError {
    FormatError::Metadata(msg.into())
}
