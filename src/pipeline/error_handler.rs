use anyhow::Result;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::{Opts, Outcome, SkippedFile};

/// Pipeline failures a caller may want to match on (via `anyhow::Error::downcast_ref`).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("run cancelled after {resolved} of {} files", count_label(.expected))]
    Cancelled {
        resolved: usize,
        expected: Option<usize>,
    },
    #[error("result stream closed after {resolved} of {expected} files")]
    StreamClosed { resolved: usize, expected: usize },
    #[error("walk ended without reporting a file count ({resolved} results received)")]
    MissingCount { resolved: usize },
    #[error("received more results than the {expected} files counted by the walk")]
    Overflow { expected: usize },
    #[error("strict mode: {count} file(s) could not be read, first: {first}")]
    Strict { count: usize, first: String },
}

fn count_label(expected: &Option<usize>) -> String {
    expected.map_or_else(|| "?".to_string(), |e| e.to_string())
}

/// Check pipeline state after every thread is joined. Strict: a recorded walk error or any
/// skipped file fails the run. Otherwise warn and return the outcome.
pub fn check_for_initial_error_or_skipped_paths(
    opts: &Opts,
    first_error: &Arc<Mutex<Option<String>>>,
    walk_errors: &Arc<Mutex<Vec<SkippedFile>>>,
    skipped: &[SkippedFile],
) -> Result<Outcome> {
    if opts.strict
        && let Some(msg) = first_error.lock().unwrap().take()
    {
        return Err(anyhow::anyhow!("{}", msg));
    }
    if opts.strict && !skipped.is_empty() {
        return Err(PipelineError::Strict {
            count: skipped.len(),
            first: format!("{}: {}", skipped[0].path.display(), skipped[0].reason),
        }
        .into());
    }
    let walk_error_count = walk_errors.lock().unwrap().len();
    if walk_error_count > 0 {
        log::warn!(
            "Skipped {} directory entries due to permission errors or access issues",
            walk_error_count
        );
    }
    if skipped.is_empty() {
        return Ok(Outcome::Complete);
    }
    log::warn!(
        "{} file(s) could not be read and are missing from the artifact",
        skipped.len()
    );
    if opts.verbose {
        for s in skipped {
            eprintln!("  skipped: {} ({})", s.path.display(), s.reason);
        }
    }
    Ok(Outcome::Partial)
}
