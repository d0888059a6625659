//! Kobako: embed a directory of static files into a generated Rust module.

pub mod artifact;
pub mod embed;
pub mod engine;
pub mod pipeline;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

use log::debug;
use std::path::Path;

/// Result alias used by public kobako API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

fn log_opts(opts: &Opts) {
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_string().to_uppercase(),
        opts
    );
}

/// Walk `root` and return the generated module source plus a run report, without writing
/// anything. Reads `config.kobako` from `root` for the namespace and exclude patterns.
///
/// Check [`EmbedReport::outcome`]: [`Outcome::Partial`] means some files could not be read and
/// are listed in [`EmbedReport::skipped`]. Set [`EmbedOpts::strict`] to make that an error.
pub fn generate(root: &Path, opts: &EmbedOpts) -> Result<Generated> {
    let opts = Opts::from(opts);
    log_opts(&opts);
    embed::generate_with_opts(root, None, &opts)
}

/// Like [`generate`], then write the module to `out` (atomically; nothing is written on error).
///
/// ```ignore
/// let report = kobako::embed_dir(Path::new("static"), Path::new("src/assets.rs"), &Default::default())?;
/// println!("{} files embedded", report.files_embedded);
/// ```
pub fn embed_dir(root: &Path, out: &Path, opts: &EmbedOpts) -> Result<EmbedReport> {
    let opts = Opts::from(opts);
    log_opts(&opts);
    embed::embed_dir_with_opts(root, out, &opts)
}
