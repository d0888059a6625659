//! Pipeline context: channels and shared state handed to the walk, worker and aggregator threads.

use crossbeam_channel::{Receiver, Sender, bounded};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::engine::content_type::ContentTypes;
use crate::engine::filters::FilterChain;
use crate::utils::config::ChannelCaps;
use crate::{SkippedFile, StorageMode, WorkItem, WorkResult};

use super::aggregator::Aggregate;

/// Settings the encoder pool needs, resolved before the pipeline starts.
#[derive(Clone, Debug)]
pub struct PipelineTuning {
    pub num_threads: usize,
    pub storage: StorageMode,
    /// Namespace, for the per-file log line.
    pub namespace: String,
    /// Per-file lines at Info (true) or Debug (false, e.g. when a progress bar is shown).
    pub announce: bool,
}

/// Shared context for the walk thread: root, filters and error/skip state.
pub struct PipelineContext {
    pub root: PathBuf,
    pub filters: FilterChain,
    pub strict: bool,
    pub follow_links: bool,
    pub cancel: Cancel,
    pub first_error: Arc<Mutex<Option<String>>>,
    pub walk_errors: Arc<Mutex<Vec<SkippedFile>>>,
}

/// Cooperative cancel flag. A `None` flag is never set.
#[derive(Clone, Debug, Default)]
pub struct Cancel(Option<Arc<AtomicBool>>);

impl Cancel {
    pub fn new(flag: Option<Arc<AtomicBool>>) -> Self {
        Self(flag)
    }

    pub fn is_set(&self) -> bool {
        self.0.as_ref().is_some_and(|f| f.load(Ordering::Relaxed))
    }
}

/// Handles returned by [`run_pipeline`](super::run_pipeline): the aggregator's handle is the
/// completion signal; walk and workers must be joined after it.
pub struct PipelineHandles {
    pub aggregator_handle: JoinHandle<anyhow::Result<Aggregate>>,
    pub walk_handle: JoinHandle<usize>,
    pub worker_handles: Vec<JoinHandle<()>>,
    pub first_error: Arc<Mutex<Option<String>>>,
    pub walk_errors: Arc<Mutex<Vec<SkippedFile>>>,
}

/// Channels and shared state for the pipeline. Walk gets work_tx + total_tx + ctx; workers get
/// work_rx + result_tx; the aggregator gets result_rx + total_rx.
pub struct PipelineChannels {
    pub work_tx: Sender<WorkItem>,
    pub work_rx: Receiver<WorkItem>,
    pub result_tx: Sender<WorkResult>,
    pub result_rx: Receiver<WorkResult>,
    /// One-shot: the walk's final eligible-file count, sent after the last enqueue.
    pub total_tx: Sender<usize>,
    pub total_rx: Receiver<usize>,
    pub first_error: Arc<Mutex<Option<String>>>,
    pub walk_errors: Arc<Mutex<Vec<SkippedFile>>>,
    pub ctx: PipelineContext,
}

pub fn create_pipeline_channels(
    root: PathBuf,
    filters: FilterChain,
    strict: bool,
    follow_links: bool,
    cancel: Cancel,
) -> PipelineChannels {
    let (work_tx, work_rx) = bounded::<WorkItem>(ChannelCaps::WORK_QUEUE);
    let (result_tx, result_rx) = bounded::<WorkResult>(ChannelCaps::RESULTS);
    let (total_tx, total_rx) = bounded::<usize>(1);
    let first_error: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let walk_errors: Arc<Mutex<Vec<SkippedFile>>> = Arc::new(Mutex::new(Vec::new()));

    let ctx = PipelineContext {
        root,
        filters,
        strict,
        follow_links,
        cancel,
        first_error: Arc::clone(&first_error),
        walk_errors: Arc::clone(&walk_errors),
    };

    PipelineChannels {
        work_tx,
        work_rx,
        result_tx,
        result_rx,
        total_tx,
        total_rx,
        first_error,
        walk_errors,
        ctx,
    }
}

/// Everything workers need besides channels.
#[derive(Clone, Debug)]
pub struct WorkerContext {
    pub root: PathBuf,
    pub tuning: PipelineTuning,
    pub content_types: ContentTypes,
    pub cancel: Cancel,
}
