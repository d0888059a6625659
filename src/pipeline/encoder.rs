//! Encoder workers: take paths from the work queue, encode each file, send one result per path.

use crossbeam_channel::{Receiver, Sender};
use log::{debug, info};
use std::path::Path;
use std::thread::{self, JoinHandle};

use crate::engine::encoding::encode_file;
use crate::engine::tools::{path_relative_to, virtual_key};
use crate::{Entry, SkippedFile, WorkItem, WorkResult};

use super::context::WorkerContext;

/// Encode one work item. Never fails: problems become [`WorkResult::Skipped`].
pub fn encode_work_item(abs_path: &Path, ctx: &WorkerContext) -> WorkResult {
    let Some(key) = virtual_key(abs_path, &ctx.root) else {
        let reason = match path_relative_to(abs_path, &ctx.root) {
            Some(rel) if rel.to_str().is_none() => "path is not valid UTF-8".to_string(),
            _ => format!("not under root {}", ctx.root.display()),
        };
        return WorkResult::Skipped(SkippedFile {
            path: abs_path.to_path_buf(),
            reason,
        });
    };
    match encode_file(abs_path, ctx.tuning.storage) {
        Ok(encoded) => WorkResult::Encoded(Entry {
            content_type: ctx.content_types.for_path(abs_path),
            key,
            digest: encoded.digest,
            data: encoded.data,
            size: encoded.size,
        }),
        Err(e) => WorkResult::Skipped(SkippedFile {
            path: abs_path.to_path_buf(),
            reason: format!("{:#}", e),
        }),
    }
}

/// Single encoder worker: read paths from work_rx until the queue is closed and drained (or the
/// run is cancelled), send one result per path on result_tx.
fn encoder_worker_loop(
    work_rx: Receiver<WorkItem>,
    result_tx: Sender<WorkResult>,
    ctx: WorkerContext,
) {
    while let Ok(abs_path) = work_rx.recv() {
        if ctx.cancel.is_set() {
            break;
        }
        let result = encode_work_item(&abs_path, &ctx);
        match &result {
            WorkResult::Encoded(entry) if ctx.tuning.announce => {
                info!("[{}] {}", ctx.tuning.namespace, entry.key)
            }
            WorkResult::Encoded(entry) => debug!("[{}] {}", ctx.tuning.namespace, entry.key),
            WorkResult::Skipped(s) => log::warn!("Skipping {}: {}", s.path.display(), s.reason),
        }
        // Aggregator gone (finished or failed): nothing left to do.
        if result_tx.send(result).is_err() {
            break;
        }
    }
    drop(result_tx);
}

/// Spawn `ctx.tuning.num_threads` encoder workers. Caller must drop its own result sender after
/// this so the result channel closes when the last worker exits.
pub fn spawn_encoder_workers(
    work_rx: Receiver<WorkItem>,
    result_tx: &Sender<WorkResult>,
    ctx: &WorkerContext,
) -> Vec<JoinHandle<()>> {
    (0..ctx.tuning.num_threads)
        .map(|_| {
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            let ctx = ctx.clone();
            thread::spawn(move || encoder_worker_loop(work_rx, result_tx, ctx))
        })
        .collect()
}
