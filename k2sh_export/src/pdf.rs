//! Single-page PDF rendering via `printpdf` 0.8.
//!
//! printpdf 0.8 is data-oriented: a page is a `Vec<Op>` and the
//! document serialises through `PdfDocument::save()`. The layout here
//! is one A4 portrait page with a heading band at the top and the
//! image centred in the space below it, scaled to fit but never
//! upscaled.

use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, RawImage,
    RawImageData, RawImageFormat, TextItem, XObjectTransform,
};
use tracing::debug;

use k2sh_core::{Decoded, Metadata};

use crate::{ExportError, ExportFormat, FALLBACK_TITLE};

const PAGE_W_MM: f32 = 210.0;
const PAGE_H_MM: f32 = 297.0;
const MARGIN_MM: f32 = 15.0;
const TITLE_SIZE_PT: f32 = 18.0;
const CAPTION_SIZE_PT: f32 = 10.0;
const HEADING_BAND_PT: f32 = 44.0;
const IMAGE_DPI: f32 = 150.0;

pub(crate) fn render(decoded: &Decoded) -> Result<Vec<u8>, ExportError> {
    let title = decoded.metadata.title().unwrap_or(FALLBACK_TITLE);

    // Re-decode the payload to pixels; printpdf wants raw RGB8.
    let dynamic = image::load_from_memory(&decoded.image).map_err(|err| ExportError::Render {
        format: ExportFormat::Pdf,
        reason: format!("image decode: {err}"),
    })?;
    let img_width = dynamic.width() as usize;
    let img_height = dynamic.height() as usize;
    let rgb = dynamic.to_rgb8();
    let raw = RawImage {
        pixels: RawImageData::U8(rgb.into_raw()),
        width: img_width,
        height: img_height,
        data_format: RawImageFormat::RGB8,
        tag: Vec::new(),
    };

    let mut doc = PdfDocument::new(title);
    let xobject_id = doc.add_image(&raw);

    let page_w = Mm(PAGE_W_MM);
    let page_h = Mm(PAGE_H_MM);
    let page_h_pt = page_h.into_pt().0;
    let margin_pt = Mm(MARGIN_MM).into_pt().0;

    let mut ops: Vec<Op> = Vec::new();
    push_text_line(
        &mut ops,
        title.to_string(),
        BuiltinFont::HelveticaBold,
        TITLE_SIZE_PT,
        margin_pt,
        page_h_pt - margin_pt - TITLE_SIZE_PT,
    );
    if let Some(caption) = caption_line(&decoded.metadata) {
        push_text_line(
            &mut ops,
            caption,
            BuiltinFont::Helvetica,
            CAPTION_SIZE_PT,
            margin_pt,
            page_h_pt - margin_pt - TITLE_SIZE_PT - 16.0,
        );
    }

    // Area left for the image once the heading band is spent.
    let usable_w_pt = Mm(PAGE_W_MM - 2.0 * MARGIN_MM).into_pt().0;
    let usable_h_pt = page_h_pt - 2.0 * margin_pt - HEADING_BAND_PT;

    let img_w_pt = img_width as f32 / IMAGE_DPI * 72.0;
    let img_h_pt = img_height as f32 / IMAGE_DPI * 72.0;
    let scale = (usable_w_pt / img_w_pt)
        .min(usable_h_pt / img_h_pt)
        .min(1.0);
    let rendered_w_pt = img_w_pt * scale;
    let rendered_h_pt = img_h_pt * scale;
    let x_offset = margin_pt + (usable_w_pt - rendered_w_pt) / 2.0;
    let y_offset = margin_pt + (usable_h_pt - rendered_h_pt) / 2.0;

    ops.push(Op::UseXobject {
        id: xobject_id,
        transform: XObjectTransform {
            translate_x: Some(Pt(x_offset)),
            translate_y: Some(Pt(y_offset)),
            scale_x: Some(scale),
            scale_y: Some(scale),
            dpi: Some(IMAGE_DPI),
            rotate: None,
        },
    });

    debug!(rendered_w_pt, rendered_h_pt, scale, "image placed on page");

    doc.with_pages(vec![PdfPage::new(page_w, page_h, ops)]);
    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    Ok(doc.save(&PdfSaveOptions::default(), &mut warnings))
}

fn push_text_line(
    ops: &mut Vec<Op>,
    text: String,
    font: BuiltinFont,
    size_pt: f32,
    x_pt: f32,
    y_pt: f32,
) {
    ops.push(Op::StartTextSection);
    ops.push(Op::SetTextCursor {
        pos: Point {
            x: Pt(x_pt),
            y: Pt(y_pt),
        },
    });
    ops.push(Op::SetFontSizeBuiltinFont {
        size: Pt(size_pt),
        font,
    });
    ops.push(Op::WriteTextBuiltinFont {
        items: vec![TextItem::Text(text)],
        font,
    });
    ops.push(Op::EndTextSection);
}

fn caption_line(metadata: &Metadata) -> Option<String> {
    match (metadata.dimensions(), metadata.source_format()) {
        (Some((w, h)), Some(format)) => Some(format!("{w}x{h} px, {format} source")),
        (Some((w, h)), None) => Some(format!("{w}x{h} px")),
        (None, Some(format)) => Some(format!("{format} source")),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;

    fn png_fixture() -> Vec<u8> {
        let img = RgbImage::from_fn(64, 48, |x, y| image::Rgb([x as u8, y as u8, 128]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn renders_a_pdf_document() {
        let decoded = Decoded {
            image: png_fixture(),
            metadata: Metadata::with_title("Fixture").unwrap(),
        };
        let bytes = render(&decoded).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn garbage_bytes_are_a_render_error() {
        let decoded = Decoded {
            image: b"not an image".to_vec(),
            metadata: Metadata::new(),
        };
        match render(&decoded) {
            Err(ExportError::Render { format, .. }) => assert_eq!(format, ExportFormat::Pdf),
            other => panic!("expected render error, got {other:?}"),
        }
    }

    #[test]
    fn caption_reflects_recorded_fields() {
        let mut metadata = Metadata::new();
        assert_eq!(caption_line(&metadata), None);
        metadata.set(
            "source_format",
            k2sh_core::Value::Str("png".into()),
        );
        assert_eq!(caption_line(&metadata).unwrap(), "png source");
    }
}
