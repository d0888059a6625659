use anyhow::Result;
use log::debug;
use std::path::Path;

use crate::engine::content_type::ContentTypes;
use crate::engine::filters::FilterChain;
use crate::engine::progress::ProgressBar;
use crate::pipeline;
use crate::utils::config::WorkerThreadLimits;
use crate::utils::fd_limit::workers_within_fd_limit;
use crate::{Opts, SkippedFile};

use super::aggregator::{Aggregate, spawn_aggregator_thread};
use super::context::{Cancel, WorkerContext};
use super::encoder::spawn_encoder_workers;
use super::walk::spawn_walk_thread;

/// Encoder pool size, storage mode and log style for this run.
pub fn setup_pipeline_tuning(opts: &Opts, namespace: &str) -> pipeline::PipelineTuning {
    let requested = WorkerThreadLimits::current().clamp(opts.num_threads);
    let num_threads = match opts.num_threads {
        // Explicit counts are honoured as given (after clamping).
        Some(_) => requested,
        None => workers_within_fd_limit(requested),
    };
    debug!("Encoder workers: {}", num_threads);
    pipeline::PipelineTuning {
        num_threads,
        storage: opts.storage,
        namespace: namespace.to_string(),
        announce: !opts.progress,
    }
}

/// Start walk, encoder pool and aggregator. `root` must already be canonical. The caller joins
/// the returned handles with [`shutdown_pipeline_handles`].
pub fn run_pipeline(
    root: &Path,
    opts: &Opts,
    filters: FilterChain,
    tuning: pipeline::PipelineTuning,
    progress: Option<ProgressBar>,
) -> Result<pipeline::PipelineHandles> {
    let cancel = Cancel::new(opts.cancel.clone());
    let channels = pipeline::create_pipeline_channels(
        root.to_path_buf(),
        filters,
        opts.strict,
        opts.follow_links,
        cancel.clone(),
    );

    let aggregator_handle = spawn_aggregator_thread(
        channels.result_rx,
        channels.total_rx,
        cancel.clone(),
        progress,
    );

    let walk_handle = spawn_walk_thread(channels.work_tx, channels.total_tx, channels.ctx);

    let worker_ctx = WorkerContext {
        root: root.to_path_buf(),
        tuning,
        content_types: ContentTypes::new(&opts.content_types),
        cancel,
    };
    let worker_handles = spawn_encoder_workers(channels.work_rx, &channels.result_tx, &worker_ctx);

    // Dropping the last sender lets the aggregator see the stream close if every worker exits.
    drop(channels.result_tx);

    Ok(pipeline::PipelineHandles {
        aggregator_handle,
        walk_handle,
        worker_handles,
        first_error: channels.first_error,
        walk_errors: channels.walk_errors,
    })
}

/// Wait for the aggregator's completion, then join the walk and every worker. Threads are always
/// joined, even when the aggregator failed; its error is returned afterwards.
pub fn shutdown_pipeline_handles(
    aggregator_handle: std::thread::JoinHandle<Result<Aggregate>>,
    walk_handle: std::thread::JoinHandle<usize>,
    worker_handles: Vec<std::thread::JoinHandle<()>>,
) -> Result<(Aggregate, usize)> {
    let aggregate = aggregator_handle
        .join()
        .map_err(|_| anyhow::anyhow!("aggregator thread panicked"))?;
    let walk_count = walk_handle
        .join()
        .map_err(|_| anyhow::anyhow!("walk thread panicked"))?;
    let mut panicked = 0_usize;
    for h in worker_handles {
        if h.join().is_err() {
            panicked += 1;
        }
    }
    if panicked > 0 {
        log::warn!("{} encoder worker(s) panicked", panicked);
    }
    Ok((aggregate?, walk_count))
}

/// Run the whole pipeline and wait for it.
/// Walk → work queue → encoder workers → result channel → aggregator → body.
pub fn collect_aggregate(
    root: &Path,
    opts: &Opts,
    filters: FilterChain,
    tuning: pipeline::PipelineTuning,
    progress: Option<ProgressBar>,
) -> Result<pipeline::CollectResult> {
    let pipeline::PipelineHandles {
        aggregator_handle,
        walk_handle,
        worker_handles,
        first_error,
        walk_errors,
    } = run_pipeline(root, opts, filters, tuning, progress)?;

    let (aggregate, walk_count) =
        shutdown_pipeline_handles(aggregator_handle, walk_handle, worker_handles)?;
    debug!(
        "main: pipeline joined, {} embedded of {} counted by the walk",
        aggregate.files_embedded, walk_count
    );

    let outcome = pipeline::check_for_initial_error_or_skipped_paths(
        opts,
        &first_error,
        &walk_errors,
        &aggregate.skipped,
    )?;
    let walk_errors: Vec<SkippedFile> = std::mem::take(&mut *walk_errors.lock().unwrap());

    Ok(pipeline::CollectResult {
        aggregate,
        walk_errors,
        outcome,
    })
}
