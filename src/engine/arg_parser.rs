use clap::Parser;
use std::path::PathBuf;

use crate::StorageMode;

struct DefaultArgs;

impl DefaultArgs {
    pub const ROOT: &'static str = ".";
}

/// Embed a directory of static files into a generated Rust module.
#[derive(Clone, Parser)]
#[command(name = "kobako")]
#[command(about = "Walk ROOT, compress and encode every file, and write one Rust module that embeds them.")]
pub struct Cli {
    /// Directory to embed. Default: current directory.
    #[arg(value_name = "ROOT", default_value = DefaultArgs::ROOT)]
    pub root: PathBuf,

    /// Path of the Rust file to generate.
    #[arg(long, short = 'O', value_name = "PATH")]
    pub out: PathBuf,

    /// Encoder worker count. Default: available threads, capped by the open-file limit.
    #[arg(long, short = 'w', value_parser = clap::value_parser!(usize))]
    pub workers: Option<usize>,

    /// How file bytes are stored: gzip (decompressed on load) or raw.
    #[arg(long, value_enum)]
    pub storage: Option<StorageMode>,

    /// Exclude patterns (regex, matched against the full path). Can specify multiple: -e pat1 pat2
    #[arg(long, short = 'e', num_args = 1..)]
    pub exclude: Vec<String>,

    /// Strict mode: fail on the first unreadable file or directory instead of skipping.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub strict: Option<bool>,

    /// Follow symbolic links.
    #[arg(long, short = 'f', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub follow_links: Option<bool>,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,

    /// Show a progress bar instead of one line per file.
    #[arg(long, short = 'p', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub progress: Option<bool>,

    /// Re-read the written artifact and check every file's digest.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verify: Option<bool>,

    /// Write a JSON run report (counts, skipped files, outcome) to this path.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}
