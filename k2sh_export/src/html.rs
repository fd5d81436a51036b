//! Self-contained HTML rendering.
//!
//! The image is inlined as a base64 data URI so the output is a single
//! file with no side-car assets. Rendering cannot fail: a container
//! that decoded successfully always has some bytes to embed, and every
//! metadata value has a printable form.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use maud::{html, Markup, DOCTYPE};

use k2sh_core::image::{probe, ImageKind};
use k2sh_core::{Decoded, Metadata, Value};

use crate::FALLBACK_TITLE;

const FALLBACK_MIME: &str = "application/octet-stream";

const CSS: &str = "\
body { margin: 0; font-family: system-ui, sans-serif; background: #111; color: #eee; }
main { max-width: 60rem; margin: 0 auto; padding: 2rem 1rem; }
h1 { font-size: 1.4rem; font-weight: 600; }
figure { margin: 1.5rem 0; text-align: center; }
figure img { max-width: 100%; height: auto; background: #000; }
table.fields { border-collapse: collapse; width: 100%; font-size: 0.9rem; }
table.fields th { text-align: left; padding: 0.3rem 1rem 0.3rem 0; color: #9ad; font-weight: 500; }
table.fields td { padding: 0.3rem 0; color: #ccc; }
table.fields tr { border-bottom: 1px solid #2a2a2a; }
";

/// Renders a decoded container as a standalone HTML page.
pub(crate) fn render(decoded: &Decoded) -> Vec<u8> {
    let title = decoded.metadata.title().unwrap_or(FALLBACK_TITLE);
    let data_uri = format!(
        "data:{};base64,{}",
        embedded_mime(decoded),
        BASE64.encode(&decoded.image)
    );

    let markup = html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                style { (CSS) }
            }
            body {
                main {
                    h1 { (title) }
                    figure {
                        img src=(data_uri) alt=(title);
                    }
                    (field_table(&decoded.metadata))
                }
            }
        }
    };
    markup.into_string().into_bytes()
}

/// MIME type for the data URI. Trusts the recorded source format,
/// falls back to sniffing the payload, then to an opaque binary type.
fn embedded_mime(decoded: &Decoded) -> &'static str {
    decoded
        .metadata
        .source_format()
        .and_then(ImageKind::from_name)
        .map(|kind| kind.mime())
        .or_else(|| probe(&decoded.image).ok().map(|info| info.kind.mime()))
        .unwrap_or(FALLBACK_MIME)
}

fn field_table(metadata: &Metadata) -> Markup {
    html! {
        @if !metadata.is_empty() {
            table.fields {
                tbody {
                    @for (name, value) in metadata.iter() {
                        tr {
                            th { (name) }
                            td { (display_value(value)) }
                        }
                    }
                }
            }
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Str(text) => text.clone(),
        Value::Int(number) => number.to_string(),
        Value::Timestamp(secs) => format!("{secs} (unix seconds)"),
        Value::Unknown { tag, bytes } => format!("{} opaque bytes (tag {tag})", bytes.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(title: &str) -> Decoded {
        let mut metadata = Metadata::with_title(title).unwrap();
        metadata.set("camera", Value::Str("front".into()));
        Decoded {
            image: vec![1, 2, 3, 4],
            metadata,
        }
    }

    #[test]
    fn page_is_a_full_document() {
        let page = String::from_utf8(render(&sample("Launch day"))).unwrap();
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<h1>Launch day</h1>"));
        assert!(page.contains("data:application/octet-stream;base64,AQIDBA=="));
        assert!(page.contains("<th>camera</th>"));
    }

    #[test]
    fn titles_are_escaped() {
        let page = String::from_utf8(render(&sample("a <b> & c"))).unwrap();
        assert!(page.contains("a &lt;b&gt; &amp; c"));
        assert!(!page.contains("<h1>a <b>"));
    }

    #[test]
    fn recorded_format_drives_the_mime_type() {
        let mut decoded = sample("x");
        decoded
            .metadata
            .set("source_format", Value::Str("png".into()));
        let page = String::from_utf8(render(&decoded)).unwrap();
        assert!(page.contains("data:image/png;base64,"));
    }
}
