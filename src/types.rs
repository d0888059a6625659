//! Public and internal types for the kobako API and pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// One eligible file discovered by the walk: an absolute path, consumed by exactly one worker.
pub type WorkItem = PathBuf;

/// How file bytes are stored in the generated artifact.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Gzip at maximum level, then base64. The artifact gunzips on load.
    #[default]
    Gzip,
    /// Base64 only. The artifact only decodes the text.
    Raw,
}

/// Encoded representation of one file, produced by a worker and appended once by the aggregator.
#[derive(Clone, Debug)]
pub struct Entry {
    /// Path relative to the root with `/` separators.
    pub key: String,
    pub content_type: String,
    /// Blake3 of the raw bytes, lowercase hex.
    pub digest: String,
    /// Base64 of the stored bytes (gzip or raw per [`StorageMode`]).
    pub data: String,
    /// Raw file size in bytes.
    pub size: u64,
}

/// A path that produced no entry, with the reason.
#[derive(Clone, Debug, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// What a worker sends for each work item. Every item yields exactly one result.
#[derive(Clone, Debug)]
pub enum WorkResult {
    Encoded(Entry),
    Skipped(SkippedFile),
}

/// Whether every eligible file made it into the artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Complete,
    /// Some files were found but could not be read; see [`EmbedReport::skipped`].
    Partial,
}

/// Summary of one run. Serialized as JSON by `--report`.
#[derive(Clone, Debug, Serialize)]
pub struct EmbedReport {
    pub namespace: String,
    pub storage: StorageMode,
    /// Where the artifact was written, or `None` when only generated in memory.
    pub output: Option<PathBuf>,
    /// Eligible files counted by the walk.
    pub files_found: usize,
    pub files_embedded: usize,
    pub skipped: Vec<SkippedFile>,
    /// Directory entries the walk could not read (not counted in `files_found`).
    pub walk_errors: Vec<SkippedFile>,
    pub raw_bytes: u64,
    pub encoded_bytes: u64,
    pub outcome: Outcome,
}

/// Generated source plus the report for the run that produced it.
#[derive(Clone, Debug)]
pub struct Generated {
    pub source: String,
    pub report: EmbedReport,
}

/// Lib-only options for [`generate`](crate::generate) and [`embed_dir`](crate::embed_dir).
#[derive(Clone, Debug, Default)]
pub struct EmbedOpts {
    /// Override encoder worker count. When None, derived from available threads and FD limit.
    pub num_threads: Option<usize>,
    pub storage: StorageMode,
    /// Follow symbolic links during the walk.
    pub follow_links: bool,
    /// Strict mode: fail on the first walk error or unreadable file instead of skipping.
    pub strict: bool,
    /// Extra exclude patterns (regex, matched against the full path), added after `config.kobako`'s.
    pub exclude: Vec<String>,
    /// Extension → content type overrides (extension without the dot, case-insensitive).
    pub content_types: HashMap<String, String>,
    /// When set and flipped to true, the run stops and returns [`PipelineError::Cancelled`](crate::pipeline::PipelineError::Cancelled).
    pub cancel: Option<Arc<AtomicBool>>,
}

impl From<&EmbedOpts> for Opts {
    fn from(o: &EmbedOpts) -> Self {
        Opts {
            num_threads: o.num_threads,
            storage: o.storage,
            follow_links: o.follow_links,
            strict: o.strict,
            exclude: o.exclude.clone(),
            content_types: o.content_types.clone(),
            cancel: o.cancel.clone(),
            verbose: false,
            progress: false,
            verify: false,
        }
    }
}

/// Full options (CLI). Use [`EmbedOpts`] for lib.
#[derive(Clone, Debug, Default)]
pub struct Opts {
    pub num_threads: Option<usize>,
    pub storage: StorageMode,
    pub follow_links: bool,
    pub strict: bool,
    pub exclude: Vec<String>,
    pub content_types: HashMap<String, String>,
    pub cancel: Option<Arc<AtomicBool>>,
    /// Debug logging.
    pub verbose: bool,
    /// Show a progress bar instead of one line per file.
    pub progress: bool,
    /// Re-read the written artifact and check every record's digest.
    pub verify: bool,
}
