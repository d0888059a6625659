//! Aggregator: the single owner of the output buffer.
//!
//! Results arrive in completion order on one channel; the walk's final count arrives once on
//! another. The batch is complete exactly when the count is known and every counted item has
//! resolved (as an entry or a skip). Nothing is compared against the count before it arrives,
//! and the count is only sent after the walk's last enqueue, so completion is never early.

use crossbeam_channel::{Receiver, never, select};
use log::debug;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::artifact::{CLOSING_SEPARATOR, CONTINUE_SEPARATOR, entry_literal};
use crate::engine::progress::{
    ProgressBar, finish_progress_bar, set_bar_total, update_progress_bar,
};
use crate::utils::config::ChannelCaps;
use crate::{SkippedFile, WorkResult};

use super::context::Cancel;
use super::error_handler::PipelineError;

/// What the aggregator hands back once the batch is complete.
#[derive(Debug, Default)]
pub struct Aggregate {
    /// Entry literals and separators, ending with the closing separator.
    pub body: String,
    pub files_found: usize,
    pub files_embedded: usize,
    pub skipped: Vec<SkippedFile>,
    pub raw_bytes: u64,
    pub encoded_bytes: u64,
}

/// Completion-tracking state, independent of channels.
#[derive(Debug, Default)]
pub struct Aggregator {
    buffer: String,
    expected: Option<usize>,
    resolved: usize,
    embedded: usize,
    skipped: Vec<SkippedFile>,
    raw_bytes: u64,
    encoded_bytes: u64,
    completed: bool,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expected(&self) -> Option<usize> {
        self.expected
    }

    pub fn resolved(&self) -> usize {
        self.resolved
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Record the walk's final count. Returns true if this completes the batch (e.g. zero files,
    /// or every result already arrived).
    pub fn set_expected(&mut self, total: usize) -> Result<bool, PipelineError> {
        if self.resolved > total {
            return Err(PipelineError::Overflow { expected: total });
        }
        self.expected = Some(total);
        Ok(self.try_complete())
    }

    /// Append one result. Returns true if this completes the batch; true is returned at most once
    /// per aggregator.
    pub fn accept(&mut self, result: WorkResult) -> Result<bool, PipelineError> {
        if self.completed || self.expected.is_some_and(|e| self.resolved >= e) {
            return Err(PipelineError::Overflow {
                expected: self.expected.unwrap_or(self.resolved),
            });
        }
        self.resolved += 1;
        match result {
            WorkResult::Encoded(entry) => {
                self.buffer.push_str(&entry_literal(&entry));
                self.embedded += 1;
                self.raw_bytes += entry.size;
                self.encoded_bytes += entry.data.len() as u64;
                if self.try_complete() {
                    return Ok(true);
                }
                self.buffer.push_str(CONTINUE_SEPARATOR);
                Ok(false)
            }
            WorkResult::Skipped(skip) => {
                self.skipped.push(skip);
                Ok(self.try_complete())
            }
        }
    }

    fn try_complete(&mut self) -> bool {
        if self.completed || self.expected != Some(self.resolved) {
            return false;
        }
        self.buffer.push_str(CLOSING_SEPARATOR);
        self.completed = true;
        true
    }

    /// Hand over the buffer. Only valid once complete.
    pub fn finish(self) -> Result<Aggregate, PipelineError> {
        match self.expected {
            Some(expected) if self.completed => Ok(Aggregate {
                body: self.buffer,
                files_found: expected,
                files_embedded: self.embedded,
                skipped: self.skipped,
                raw_bytes: self.raw_bytes,
                encoded_bytes: self.encoded_bytes,
            }),
            Some(expected) => Err(PipelineError::StreamClosed {
                resolved: self.resolved,
                expected,
            }),
            None => Err(PipelineError::MissingCount {
                resolved: self.resolved,
            }),
        }
    }
}

/// Drive an [`Aggregator`] from the result and count channels until the batch completes.
/// Fails if cancelled, if the result stream closes early, or if the walk never reports a count.
pub fn run_aggregator(
    result_rx: Receiver<WorkResult>,
    total_rx: Receiver<usize>,
    cancel: Cancel,
    progress: Option<ProgressBar>,
) -> Result<Aggregate, PipelineError> {
    let mut agg = Aggregator::new();
    let never_total = never::<usize>();
    let never_result = never::<WorkResult>();
    let mut total_closed = false;
    let mut results_closed = false;
    let poll = Duration::from_millis(ChannelCaps::CANCEL_POLL_MS);

    loop {
        // A finished batch stays finished even if cancel arrives afterwards.
        if agg.is_complete() {
            break;
        }
        if cancel.is_set() {
            return Err(PipelineError::Cancelled {
                resolved: agg.resolved(),
                expected: agg.expected(),
            });
        }
        if total_closed && agg.expected().is_none() {
            return Err(PipelineError::MissingCount {
                resolved: agg.resolved(),
            });
        }
        if results_closed && let Some(expected) = agg.expected() {
            return Err(PipelineError::StreamClosed {
                resolved: agg.resolved(),
                expected,
            });
        }

        let total_ch = if agg.expected().is_none() && !total_closed {
            &total_rx
        } else {
            &never_total
        };
        let result_ch = if results_closed {
            &never_result
        } else {
            &result_rx
        };

        select! {
            recv(total_ch) -> msg => match msg {
                Ok(total) => {
                    debug!("aggregator: walk found {} files", total);
                    if let Some(pb) = &progress {
                        set_bar_total(pb, total);
                    }
                    agg.set_expected(total)?;
                }
                Err(_) => total_closed = true,
            },
            recv(result_ch) -> msg => match msg {
                Ok(result) => {
                    agg.accept(result)?;
                    if let Some(pb) = &progress {
                        update_progress_bar(pb, 1);
                    }
                }
                Err(_) => results_closed = true,
            },
            default(poll) => {}
        }
    }

    if let Some(pb) = &progress {
        finish_progress_bar(pb);
    }
    debug!(
        "aggregator: batch complete, {} of {} resolved",
        agg.resolved(),
        agg.expected().unwrap_or(0)
    );
    agg.finish()
}

pub fn spawn_aggregator_thread(
    result_rx: Receiver<WorkResult>,
    total_rx: Receiver<usize>,
    cancel: Cancel,
    progress: Option<ProgressBar>,
) -> JoinHandle<anyhow::Result<Aggregate>> {
    thread::spawn(move || Ok(run_aggregator(result_rx, total_rx, cancel, progress)?))
}
