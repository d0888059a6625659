//! Progress bar for the aggregator (shown with `--progress`).

use kdam::{Animation, Bar, BarExt};
use std::sync::{Arc, Mutex};

pub type ProgressBar = Arc<Mutex<Bar>>;

/// Bar with an unknown total; [`set_bar_total`] fills it in once the walk reports its count.
pub fn create_progress_bar(desc: &'static str) -> ProgressBar {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = 0,
        desc = desc,
        animation = Animation::Classic,
        unit = " files"
    )))
}

/// Update the bar's total. Refreshes the display.
pub fn set_bar_total(pb: &ProgressBar, total: usize) {
    if let Ok(mut bar) = pb.lock() {
        bar.total = total;
        let _ = bar.refresh();
    }
}

/// Advance by `n`. Uses try_lock so the aggregator never waits on the display.
pub fn update_progress_bar(pb: &ProgressBar, n: usize) {
    if let Ok(mut bar) = pb.try_lock() {
        let _ = bar.update(n);
    }
}

/// Snap the bar to its total and end the line.
pub fn finish_progress_bar(pb: &ProgressBar) {
    if let Ok(mut bar) = pb.lock() {
        let total = bar.total;
        let _ = bar.update_to(total);
        eprintln!();
    }
}
