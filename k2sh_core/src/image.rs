//! Source raster probing.
//!
//! The encode path must reject anything that is not a clean, decodable
//! raster before it gets sealed into a container, and the exporters need
//! the format name and MIME type back out. Both needs are served by the
//! `image` crate's signature sniffing plus a full decode check.

use std::io::Cursor;

use image::{ImageFormat, ImageReader};

use crate::error::InputError;

/// Raster formats a container can package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
    Gif,
    Webp,
    Bmp,
    Tiff,
}

impl ImageKind {
    /// Short format name, also the value stored under `source_format`.
    pub fn name(self) -> &'static str {
        match self {
            ImageKind::Png => "png",
            ImageKind::Jpeg => "jpeg",
            ImageKind::Gif => "gif",
            ImageKind::Webp => "webp",
            ImageKind::Bmp => "bmp",
            ImageKind::Tiff => "tiff",
        }
    }

    /// Preferred file extension for decoded output.
    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            other => other.name(),
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            ImageKind::Png => "image/png",
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Gif => "image/gif",
            ImageKind::Webp => "image/webp",
            ImageKind::Bmp => "image/bmp",
            ImageKind::Tiff => "image/tiff",
        }
    }

    /// Look up by stored format name (the `source_format` field).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "png" => Some(ImageKind::Png),
            "jpeg" => Some(ImageKind::Jpeg),
            "gif" => Some(ImageKind::Gif),
            "webp" => Some(ImageKind::Webp),
            "bmp" => Some(ImageKind::Bmp),
            "tiff" => Some(ImageKind::Tiff),
            _ => None,
        }
    }

    /// Look up by file extension, case-insensitive. Drives batch discovery.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(ImageKind::Png),
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "gif" => Some(ImageKind::Gif),
            "webp" => Some(ImageKind::Webp),
            "bmp" => Some(ImageKind::Bmp),
            "tif" | "tiff" => Some(ImageKind::Tiff),
            _ => None,
        }
    }

    /// True for formats that already carry their own compression, where a
    /// second pass would only burn CPU.
    pub fn is_precompressed(self) -> bool {
        !matches!(self, ImageKind::Bmp | ImageKind::Tiff)
    }

    fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Png => Some(ImageKind::Png),
            ImageFormat::Jpeg => Some(ImageKind::Jpeg),
            ImageFormat::Gif => Some(ImageKind::Gif),
            ImageFormat::WebP => Some(ImageKind::Webp),
            ImageFormat::Bmp => Some(ImageKind::Bmp),
            ImageFormat::Tiff => Some(ImageKind::Tiff),
            _ => None,
        }
    }
}

/// What probing an input raster established.
#[derive(Debug, Clone, Copy)]
pub struct ImageInfo {
    pub kind: ImageKind,
    pub width: u32,
    pub height: u32,
}

/// Identify the raster format and dimensions from the leading bytes,
/// without a full pixel decode.
pub fn probe(bytes: &[u8]) -> Result<ImageInfo, InputError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| InputError::UnsupportedImage(e.to_string()))?;
    let format = reader
        .format()
        .ok_or_else(|| InputError::UnsupportedImage("unrecognized image signature".into()))?;
    let kind = ImageKind::from_image_format(format)
        .ok_or_else(|| InputError::UnsupportedImage(format!("{format:?} input is not supported")))?;
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| InputError::CorruptImage(e.to_string()))?;
    Ok(ImageInfo {
        kind,
        width,
        height,
    })
}

/// Probe plus a full pixel decode. The encode path uses this so torn or
/// lying image bytes are rejected before they are sealed into a container.
pub fn ensure_decodable(bytes: &[u8]) -> Result<ImageInfo, InputError> {
    let info = probe(bytes)?;
    image::load_from_memory(bytes).map_err(|e| InputError::CorruptImage(e.to_string()))?;
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn tiny_png() -> Vec<u8> {
        let img = RgbImage::from_fn(6, 4, |x, y| image::Rgb([x as u8, y as u8, 9]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn probe_reads_kind_and_dimensions() {
        let info = probe(&tiny_png()).unwrap();
        assert_eq!(info.kind, ImageKind::Png);
        assert_eq!((info.width, info.height), (6, 4));
    }

    #[test]
    fn probe_rejects_garbage() {
        let err = probe(b"definitely not pixels").unwrap_err();
        assert!(matches!(err, InputError::UnsupportedImage(_)));
    }

    #[test]
    fn ensure_decodable_rejects_torn_file() {
        let png = tiny_png();
        // Keep the signature and IHDR, lose the pixel data.
        let err = ensure_decodable(&png[..40]).unwrap_err();
        assert!(matches!(err, InputError::CorruptImage(_)));
    }

    #[test]
    fn extension_lookup_is_case_insensitive() {
        assert_eq!(ImageKind::from_extension("PNG"), Some(ImageKind::Png));
        assert_eq!(ImageKind::from_extension("JpEg"), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_extension("tif"), Some(ImageKind::Tiff));
        assert_eq!(ImageKind::from_extension("txt"), None);
    }

    #[test]
    fn names_round_trip() {
        for kind in [
            ImageKind::Png,
            ImageKind::Jpeg,
            ImageKind::Gif,
            ImageKind::Webp,
            ImageKind::Bmp,
            ImageKind::Tiff,
        ] {
            assert_eq!(ImageKind::from_name(kind.name()), Some(kind));
        }
    }
}
