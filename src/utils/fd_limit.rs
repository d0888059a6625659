//! Cap the encoder pool by the process file-descriptor limit (Unix).

use log::debug;

/// Descriptors held per encoder worker: the open file plus headroom for mmap and output.
pub const FDS_PER_WORKER: usize = 4;

/// Fraction of the soft limit the pool may use.
const FD_LIMIT_FRACTION: f64 = 0.8;

/// Soft `RLIMIT_NOFILE`, or `None` when unlimited or unavailable.
#[cfg(unix)]
pub fn soft_fd_limit() -> Option<u64> {
    let mut rlim = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: getrlimit only writes into the struct we hand it.
    if unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut rlim) } != 0 {
        return None;
    }
    if rlim.rlim_cur == libc::RLIM_INFINITY {
        return None;
    }
    Some(rlim.rlim_cur as u64)
}

#[cfg(not(unix))]
pub fn soft_fd_limit() -> Option<u64> {
    None
}

/// Shrink `workers` so the pool stays under ~80% of the soft descriptor limit. Never below 1.
pub fn workers_within_fd_limit(workers: usize) -> usize {
    let Some(limit) = soft_fd_limit() else {
        return workers;
    };
    let cap = ((limit as f64 * FD_LIMIT_FRACTION) as usize / FDS_PER_WORKER).max(1);
    if cap < workers {
        debug!("Capping encoder workers {} -> {} (FD limit {})", workers, cap, limit);
        cap
    } else {
        workers
    }
}
