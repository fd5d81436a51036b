//! End-to-end container tests: encode → (validate | decode | inspect) over
//! real raster fixtures, corruption at computed byte offsets, and the batch
//! pipeline's failure isolation.

use std::fs;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::{ImageFormat, Rgb, RgbImage};
use xxhash_rust::xxh3::xxh3_64;

use k2sh_core::format::{CONTAINER_VERSION, HEADER_LEN};
use k2sh_core::{
    decode, encode, inspect, run_batch, validate, BatchOptions, EncodeOptions, Error, FormatError,
    InputError, ItemOutcome, Metadata, PayloadCodec, Value,
};

// ── fixtures ───────────────────────────────────────────────────────────────

/// Deterministic gradient raster encoded as PNG.
fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 251) as u8, (y * 13 % 251) as u8, ((x + y) % 251) as u8])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Same gradient as uncompressed BMP.
fn bmp_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 251) as u8, (y * 13 % 251) as u8, ((x + y) % 251) as u8])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Bmp).unwrap();
    out.into_inner()
}

/// Metadata block length, read back out of an encoded container.
fn meta_len(container: &[u8]) -> usize {
    u32::from_le_bytes(container[HEADER_LEN..HEADER_LEN + 4].try_into().unwrap()) as usize
}

/// Byte offset of the payload block (codec id byte) inside a container.
fn payload_offset(container: &[u8]) -> usize {
    HEADER_LEN + 4 + meta_len(container) + 8
}

// ── round trips ────────────────────────────────────────────────────────────

#[test]
fn roundtrip_png_with_metadata() {
    let png = png_bytes(16, 16);
    let metadata = Metadata::with_title("gradient sample").unwrap();

    let container = encode(&png, metadata, &EncodeOptions::default()).unwrap();
    let decoded = decode(&container).unwrap();

    assert_eq!(decoded.image, png, "image bytes must round-trip exactly");
    assert_eq!(decoded.metadata.title(), Some("gradient sample"));
    assert_eq!(decoded.metadata.dimensions(), Some((16, 16)));
    assert_eq!(decoded.metadata.source_format(), Some("png"));
}

#[test]
fn roundtrip_every_codec() {
    let png = png_bytes(24, 8);
    for codec in [PayloadCodec::Store, PayloadCodec::Zstd, PayloadCodec::Deflate] {
        let options = EncodeOptions {
            codec: Some(codec),
            ..Default::default()
        };
        let container = encode(&png, Metadata::new(), &options).unwrap();
        let info = inspect(&container).unwrap();
        assert_eq!(info.codec, codec);

        let decoded = decode(&container).unwrap();
        assert_eq!(decoded.image, png, "{} round-trip", codec.name());
    }
}

#[test]
fn auto_codec_follows_source_format() {
    let png = png_bytes(32, 32);
    let container = encode(&png, Metadata::new(), &EncodeOptions::default()).unwrap();
    assert_eq!(inspect(&container).unwrap().codec, PayloadCodec::Store);

    let bmp = bmp_bytes(64, 64);
    let container = encode(&bmp, Metadata::new(), &EncodeOptions::default()).unwrap();
    let info = inspect(&container).unwrap();
    assert_eq!(info.codec, PayloadCodec::Zstd);
    assert!(
        info.payload_stored_len < info.payload_raw_len,
        "zstd should shrink an uncompressed gradient bmp: stored={} raw={}",
        info.payload_stored_len,
        info.payload_raw_len
    );
}

#[test]
fn encode_is_deterministic() {
    let png = png_bytes(20, 10);
    let mut metadata = Metadata::with_title("stable").unwrap();
    metadata.set("sequence", Value::Int(42));

    let a = encode(&png, metadata.clone(), &EncodeOptions::default()).unwrap();
    let b = encode(&png, metadata, &EncodeOptions::default()).unwrap();
    assert_eq!(a, b, "same inputs must produce byte-identical containers");
}

#[test]
fn unknown_metadata_fields_survive_decode() {
    let png = png_bytes(8, 8);
    let mut metadata = Metadata::new();
    metadata.set(
        "reserved_blob",
        Value::Unknown {
            tag: 77,
            bytes: vec![0xde, 0xad, 0xbe, 0xef],
        },
    );

    let container = encode(&png, metadata, &EncodeOptions::default()).unwrap();
    let decoded = decode(&container).unwrap();
    assert_eq!(
        decoded.metadata.get("reserved_blob"),
        Some(&Value::Unknown {
            tag: 77,
            bytes: vec![0xde, 0xad, 0xbe, 0xef],
        })
    );
}

#[test]
fn inspect_reports_header_facts() {
    let png = png_bytes(12, 34);
    let container = encode(&png, Metadata::new(), &EncodeOptions::default()).unwrap();
    let info = inspect(&container).unwrap();

    assert_eq!(info.version, CONTAINER_VERSION);
    assert_eq!(info.payload_raw_len, png.len() as u64);
    assert_eq!(info.metadata.dimensions(), Some((12, 34)));
    assert!(info.metadata_len > 0);
}

// ── input rejection ────────────────────────────────────────────────────────

#[test]
fn encode_rejects_non_image_bytes() {
    let err = encode(b"just some text", Metadata::new(), &EncodeOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        Error::Input(InputError::UnsupportedImage(_))
    ));
}

// ── corruption and structure ───────────────────────────────────────────────

#[test]
fn rejects_bad_magic() {
    let mut container = encode(&png_bytes(8, 8), Metadata::new(), &EncodeOptions::default()).unwrap();
    container[0] = b'X';
    assert!(matches!(
        decode(&container).unwrap_err(),
        Error::Format(FormatError::BadMagic)
    ));
    assert!(matches!(
        validate(&container).into_failure(),
        Some(FormatError::BadMagic)
    ));
}

#[test]
fn version_gate_refuses_newer_containers() {
    let mut container = encode(&png_bytes(8, 8), Metadata::new(), &EncodeOptions::default()).unwrap();
    container[8..10].copy_from_slice(&99u16.to_le_bytes());

    match decode(&container).unwrap_err() {
        Error::Format(FormatError::UnsupportedVersion { found, supported }) => {
            assert_eq!(found, 99);
            assert_eq!(supported, CONTAINER_VERSION);
        }
        other => panic!("expected UnsupportedVersion, got {other:?}"),
    }
}

#[test]
fn single_byte_flips_fail_the_checksum() {
    let container = encode(
        &png_bytes(16, 16),
        Metadata::with_title("corruptme").unwrap(),
        &EncodeOptions::default(),
    )
    .unwrap();

    // one flip inside the metadata block, one inside the stored payload,
    // one inside the checksum itself
    let targets = [
        HEADER_LEN + 4,                // first metadata byte
        payload_offset(&container) + 9, // first stored payload byte
        container.len() - 1,           // last checksum byte
    ];
    for offset in targets {
        let mut bad = container.clone();
        bad[offset] ^= 0xff;
        assert!(
            matches!(
                validate(&bad).into_failure(),
                Some(FormatError::ChecksumMismatch { .. })
            ),
            "flip at offset {offset} must fail the checksum"
        );
        assert!(decode(&bad).is_err(), "decode must refuse the same bytes");
    }
}

#[test]
fn corrupt_codec_id_is_caught_by_checksum_first() {
    let mut container =
        encode(&png_bytes(8, 8), Metadata::new(), &EncodeOptions::default()).unwrap();
    let codec_off = payload_offset(&container);
    container[codec_off] = 9;
    assert!(matches!(
        validate(&container).into_failure(),
        Some(FormatError::ChecksumMismatch { .. })
    ));
}

#[test]
fn unknown_codec_id_with_valid_checksum() {
    // Re-seal the container after planting a codec id from the future, so
    // the structural check is what fires.
    let mut container =
        encode(&png_bytes(8, 8), Metadata::new(), &EncodeOptions::default()).unwrap();
    let m = meta_len(&container);
    let codec_off = payload_offset(&container);
    container[codec_off] = 9;

    let blocks = container[HEADER_LEN + 4..HEADER_LEN + 4 + m]
        .iter()
        .chain(&container[codec_off..container.len() - 8])
        .copied()
        .collect::<Vec<u8>>();
    let checksum = xxh3_64(&blocks);
    let end = container.len();
    container[end - 8..].copy_from_slice(&checksum.to_le_bytes());

    assert!(matches!(
        validate(&container).into_failure(),
        Some(FormatError::UnknownCodec(9))
    ));
    assert!(matches!(
        decode(&container).unwrap_err(),
        Error::Format(FormatError::UnknownCodec(9))
    ));
}

#[test]
fn truncation_is_reported_per_section() {
    let container = encode(&png_bytes(16, 16), Metadata::new(), &EncodeOptions::default()).unwrap();

    // Lost checksum tail.
    let cut = &container[..container.len() - 3];
    assert!(matches!(
        validate(cut).into_failure(),
        Some(FormatError::Truncated {
            section: "checksum",
            ..
        })
    ));

    // Cut deep into the payload block.
    let cut = &container[..payload_offset(&container) + 4];
    assert!(matches!(
        validate(cut).into_failure(),
        Some(FormatError::Truncated { .. })
    ));

    // Empty input never panics.
    assert!(matches!(
        validate(&[]).into_failure(),
        Some(FormatError::Truncated { section: "magic", .. })
    ));
}

#[test]
fn trailing_bytes_are_rejected() {
    let mut container =
        encode(&png_bytes(8, 8), Metadata::new(), &EncodeOptions::default()).unwrap();
    container.extend_from_slice(&[0, 0, 0, 0]);
    assert!(matches!(
        validate(&container).into_failure(),
        Some(FormatError::TrailingBytes(4))
    ));
}

#[test]
fn validate_is_idempotent() {
    let good = encode(&png_bytes(8, 8), Metadata::new(), &EncodeOptions::default()).unwrap();
    assert!(validate(&good).is_valid());
    assert!(validate(&good).is_valid());

    let mut bad = good.clone();
    let last = bad.len() - 1;
    bad[last] ^= 0xff;
    for _ in 0..2 {
        assert!(matches!(
            validate(&bad).into_failure(),
            Some(FormatError::ChecksumMismatch { .. })
        ));
    }
}

// ── batch pipeline ─────────────────────────────────────────────────────────

#[test]
fn batch_isolates_a_corrupt_input() {
    let dir = tempfile::tempdir().unwrap();
    let input_dir = dir.path().join("in");
    let output_dir = dir.path().join("out");
    fs::create_dir(&input_dir).unwrap();

    fs::write(input_dir.join("a.png"), png_bytes(8, 8)).unwrap();
    fs::write(input_dir.join("b.png"), png_bytes(9, 9)).unwrap();
    fs::write(input_dir.join("broken.png"), b"not pixels").unwrap();
    fs::write(input_dir.join("c.png"), png_bytes(10, 10)).unwrap();

    let report = run_batch(&input_dir, &output_dir, &BatchOptions::default()).unwrap();

    assert_eq!(report.total(), 4);
    assert_eq!(report.succeeded(), 3);
    assert_eq!(report.failed(), 1);
    assert!(!report.cancelled);

    // lexicographic visit order: a, b, broken, c
    let names: Vec<_> = report
        .items
        .iter()
        .map(|item| item.input.file_name().unwrap().to_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["a.png", "b.png", "broken.png", "c.png"]);
    assert!(matches!(
        report.items[2].outcome,
        ItemOutcome::Failed {
            error: Error::Input(_)
        }
    ));

    // every success produced a validating container, the failure produced
    // nothing
    for name in ["a.k2sh", "b.k2sh", "c.k2sh"] {
        let bytes = fs::read(output_dir.join(name)).unwrap();
        assert!(validate(&bytes).is_valid(), "{name} should validate");
    }
    assert!(!output_dir.join("broken.k2sh").exists());

    let summary = report.summary();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.items[2].status, "failed");
    let json = serde_json::to_string(&summary).unwrap();
    assert!(json.contains("\"status\":\"created\""));
}

#[test]
fn batch_over_empty_directory_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let input_dir = dir.path().join("in");
    fs::create_dir(&input_dir).unwrap();

    let report = run_batch(&input_dir, &dir.path().join("out"), &BatchOptions::default()).unwrap();
    assert_eq!(report.total(), 0);
    assert!(!report.cancelled);
}

#[test]
fn batch_requires_the_input_directory() {
    let dir = tempfile::tempdir().unwrap();
    let err = run_batch(
        &dir.path().join("missing"),
        &dir.path().join("out"),
        &BatchOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Input(InputError::NotFound(_))));
}

#[test]
fn batch_ignores_unrecognized_files() {
    let dir = tempfile::tempdir().unwrap();
    let input_dir = dir.path().join("in");
    fs::create_dir(&input_dir).unwrap();
    fs::write(input_dir.join("a.png"), png_bytes(8, 8)).unwrap();
    fs::write(input_dir.join("notes.txt"), b"skip me").unwrap();

    let report = run_batch(&input_dir, &dir.path().join("out"), &BatchOptions::default()).unwrap();
    assert_eq!(report.total(), 1);
    assert_eq!(report.succeeded(), 1);
}

#[test]
fn batch_honors_the_cancel_flag() {
    let dir = tempfile::tempdir().unwrap();
    let input_dir = dir.path().join("in");
    fs::create_dir(&input_dir).unwrap();
    fs::write(input_dir.join("a.png"), png_bytes(8, 8)).unwrap();

    let flag = Arc::new(AtomicBool::new(false));
    flag.store(true, Ordering::Relaxed);
    let options = BatchOptions {
        cancel: Some(flag),
        ..Default::default()
    };

    let report = run_batch(&input_dir, &dir.path().join("out"), &options).unwrap();
    assert!(report.cancelled);
    assert_eq!(report.total(), 0);
}
