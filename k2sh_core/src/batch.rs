//! Directory-at-a-time encoding with per-item failure isolation.
//!
//! One bad input never aborts the run: its error is recorded in the report
//! and the next item proceeds. Inputs are visited in lexicographic path
//! order so two runs over the same directory report identically.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};
use walkdir::WalkDir;

use crate::container::{encode, EncodeOptions};
use crate::error::{Error, InputError, Result};
use crate::format::EXTENSION;
use crate::image::ImageKind;
use crate::io::{read_bytes, write_atomic};
use crate::metadata::Metadata;

/// Knobs for [`run_batch`].
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub encode: EncodeOptions,
    /// Checked between items; once set, the run stops at the next item
    /// boundary and the report is marked cancelled.
    pub cancel: Option<Arc<AtomicBool>>,
}

/// What happened to one input file.
#[derive(Debug)]
pub enum ItemOutcome {
    Created { output: PathBuf },
    Failed { error: Error },
}

#[derive(Debug)]
pub struct BatchItem {
    pub input: PathBuf,
    pub outcome: ItemOutcome,
}

/// Ordered per-item outcomes of one batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
    /// True when the cancel flag stopped the run before all inputs were
    /// visited.
    pub cancelled: bool,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn succeeded(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item.outcome, ItemOutcome::Created { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    /// Machine-readable view for CI consumption.
    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            total: self.total(),
            succeeded: self.succeeded(),
            failed: self.failed(),
            cancelled: self.cancelled,
            items: self
                .items
                .iter()
                .map(|item| match &item.outcome {
                    ItemOutcome::Created { output } => ItemSummary {
                        input: item.input.display().to_string(),
                        status: "created",
                        output: Some(output.display().to_string()),
                        error: None,
                    },
                    ItemOutcome::Failed { error } => ItemSummary {
                        input: item.input.display().to_string(),
                        status: "failed",
                        output: None,
                        error: Some(error.to_string()),
                    },
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub items: Vec<ItemSummary>,
}

#[derive(Debug, Serialize)]
pub struct ItemSummary {
    pub input: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Encode every recognized raster directly under `input_dir` into
/// `output_dir`, one `.k2sh` container per input.
///
/// Errors out only when the batch itself cannot run (missing input
/// directory, unwritable output directory); per-item failures land in the
/// report. A directory with zero recognized inputs is a successful empty
/// run.
pub fn run_batch(input_dir: &Path, output_dir: &Path, options: &BatchOptions) -> Result<BatchReport> {
    if !input_dir.exists() {
        return Err(InputError::NotFound(input_dir.to_path_buf()).into());
    }
    if !input_dir.is_dir() {
        return Err(InputError::NotADirectory(input_dir.to_path_buf()).into());
    }
    std::fs::create_dir_all(output_dir)?;

    let inputs = discover(input_dir)?;
    let mut report = BatchReport::default();
    let mut claimed: HashSet<PathBuf> = HashSet::new();

    for input in inputs {
        if let Some(flag) = &options.cancel {
            if flag.load(Ordering::Relaxed) {
                report.cancelled = true;
                break;
            }
        }

        let output = output_path(output_dir, &input);
        let outcome = if !claimed.insert(output.clone()) {
            ItemOutcome::Failed {
                error: Error::Io(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!(
                        "output name {} already claimed by an earlier input",
                        output.display()
                    ),
                )),
            }
        } else {
            match encode_one(&input, &output, &options.encode) {
                Ok(()) => ItemOutcome::Created { output },
                Err(err) => {
                    error!(input = %input.display(), error = %err, "batch item failed");
                    ItemOutcome::Failed { error: err }
                }
            }
        };
        report.items.push(BatchItem { input, outcome });
    }

    info!(
        total = report.total(),
        succeeded = report.succeeded(),
        failed = report.failed(),
        cancelled = report.cancelled,
        "batch finished"
    );
    Ok(report)
}

/// Direct children of `dir` with a recognized raster extension, sorted by
/// path for reproducible reports.
fn discover(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            Error::Io(e
                .into_io_error()
                .unwrap_or_else(|| io::Error::other("walk failed")))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        let recognized = path
            .extension()
            .and_then(OsStr::to_str)
            .and_then(ImageKind::from_extension)
            .is_some();
        if recognized {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn output_path(output_dir: &Path, input: &Path) -> PathBuf {
    let mut name = input
        .file_stem()
        .map(|stem| stem.to_os_string())
        .unwrap_or_else(|| "image".into());
    name.push(".");
    name.push(EXTENSION);
    output_dir.join(name)
}

fn encode_one(input: &Path, output: &Path, options: &EncodeOptions) -> Result<()> {
    let bytes = read_bytes(input)?;
    let container = encode(&bytes, Metadata::new(), options)?;
    write_atomic(output, &container)?;
    Ok(())
}
