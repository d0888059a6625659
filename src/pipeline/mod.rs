//! Pipeline components: walk, encoder pool, aggregator, and the orchestration that joins them.

pub mod aggregator;
pub mod context;
pub mod encoder;
pub mod error_handler;
pub mod orchestrator;
pub mod walk;

pub use aggregator::{Aggregate, Aggregator, run_aggregator, spawn_aggregator_thread};
pub use context::{
    Cancel, PipelineChannels, PipelineContext, PipelineHandles, PipelineTuning, WorkerContext,
    create_pipeline_channels,
};
pub use encoder::{encode_work_item, spawn_encoder_workers};
pub use error_handler::{PipelineError, check_for_initial_error_or_skipped_paths};
pub use orchestrator::{
    collect_aggregate, run_pipeline, setup_pipeline_tuning, shutdown_pipeline_handles,
};
pub use walk::{WalkOutcome, run_walk_loop, spawn_walk_thread, to_outcome_walkdir};

use crate::{Outcome, SkippedFile};

/// Result of [`collect_aggregate`]: the completed batch, walk errors, and whether every
/// counted file made it in.
#[derive(Debug)]
pub struct CollectResult {
    pub aggregate: Aggregate,
    pub walk_errors: Vec<SkippedFile>,
    pub outcome: Outcome,
}
