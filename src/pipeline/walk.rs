//! Directory walk: single thread, filters regular files, feeds the work queue, reports the count.

use crossbeam_channel::Sender;
use log::debug;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use walkdir::WalkDir;

use crate::engine::filters::Candidate;
use crate::{SkippedFile, WorkItem};

use super::context::PipelineContext;

/// One result from a directory walk: a path with its file kind, or an error with optional path.
pub enum WalkOutcome {
    Ok { path: PathBuf, is_file: bool },
    Err { msg: String, path: Option<PathBuf> },
}

/// Convert a walkdir result into [`WalkOutcome`].
pub fn to_outcome_walkdir(r: Result<walkdir::DirEntry, walkdir::Error>) -> WalkOutcome {
    match r {
        Ok(entry) => {
            let is_file = entry.file_type().is_file();
            WalkOutcome::Ok {
                path: entry.into_path(),
                is_file,
            }
        }
        Err(err) => WalkOutcome::Err {
            msg: format!("{}", err),
            path: err.path().map(PathBuf::from),
        },
    }
}

/// Sorted by file name so discovery order is stable across runs.
fn walkdir_iter(ctx: &PipelineContext) -> Box<dyn Iterator<Item = WalkOutcome>> {
    Box::new(
        WalkDir::new(&ctx.root)
            .follow_links(ctx.follow_links)
            .sort_by_file_name()
            .into_iter()
            .map(to_outcome_walkdir),
    )
}

pub fn spawn_walk_thread(
    work_tx: Sender<WorkItem>,
    total_tx: Sender<usize>,
    ctx: PipelineContext,
) -> JoinHandle<usize> {
    thread::spawn(move || {
        let iter = walkdir_iter(&ctx);
        run_walk_loop(work_tx, total_tx, ctx, iter)
    })
}

/// Consume `iter`, send every eligible regular file to `work_tx`, and count them. Directories
/// are never filtered, only traversed. Errors: strict → record first_error and stop; else push
/// to walk_errors. Sends the final count on `total_tx` strictly after the last send, then drops
/// `work_tx` (closing the queue). A cancelled walk sends no count. Returns the count.
pub fn run_walk_loop<I>(
    work_tx: Sender<WorkItem>,
    total_tx: Sender<usize>,
    ctx: PipelineContext,
    iter: I,
) -> usize
where
    I: Iterator<Item = WalkOutcome>,
{
    let mut count = 0_usize;
    for outcome in iter {
        if ctx.cancel.is_set() {
            // No count: a truncated total must never complete the batch.
            debug!("walk: cancelled after {} files", count);
            return count;
        }
        match outcome {
            WalkOutcome::Ok { path, is_file } => {
                if !is_file {
                    continue;
                }
                if let Some(f) = ctx.filters.rejected_by(&Candidate::new(&path, is_file)) {
                    debug!("skip {} ({})", path.display(), f.describe());
                    continue;
                }
                if work_tx.send(path).is_err() {
                    break;
                }
                count += 1;
            }
            WalkOutcome::Err { msg, path } => {
                if ctx.strict {
                    let _ = ctx
                        .first_error
                        .lock()
                        .unwrap()
                        .get_or_insert_with(|| format!("strict mode: {}", msg));
                    break;
                }
                log::warn!("Error walking directory: {}", msg);
                ctx.walk_errors.lock().unwrap().push(SkippedFile {
                    path: path.unwrap_or_else(|| PathBuf::from("<unknown>")),
                    reason: msg,
                });
            }
        }
    }
    let _ = total_tx.send(count);
    drop(work_tx);
    count
}
