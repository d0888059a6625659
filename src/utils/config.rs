//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::sync::OnceLock;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived file names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    config_filename: String,
    settings_filename: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                config_filename: format!("config.{pkg}"),
                settings_filename: format!(".{pkg}.toml"),
            }
        })
    }

    /// Line-format config in the root (`config.kobako`): namespace and exclude patterns.
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Optional TOML settings in the root (`.kobako.toml`).
    pub fn settings_filename(&self) -> &str {
        &self.settings_filename
    }
}

// ---- Generated artifact ----

/// Namespace (module name) used when the config file does not set one.
pub const DEFAULT_NAMESPACE: &str = "assets";

/// Content type for unknown or missing extensions.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// First character of names the walk treats as hidden.
pub const HIDDEN_PREFIX: u8 = b'.';

// ---- Worker threads ----

/// Limits for the encoder pool size.
/// Use [`WorkerThreadLimits::current()`] to fill `all_threads` from rayon; the rest are const.
#[derive(Clone, Copy, Debug)]
pub struct WorkerThreadLimits {
    /// Available threads (from rayon); set by [`WorkerThreadLimits::current()`].
    pub all_threads: usize,
    /// Minimum pool size.
    pub floor: usize,
    /// Upper bound. Every worker holds one whole file in memory.
    pub max: usize,
}

impl Default for WorkerThreadLimits {
    fn default() -> Self {
        Self {
            all_threads: 0, // use current() to set from rayon
            floor: Self::FLOOR_THREADS,
            max: Self::MAX_THREADS,
        }
    }
}

impl WorkerThreadLimits {
    pub const FLOOR_THREADS: usize = 1;
    pub const MAX_THREADS: usize = 64;

    /// Build limits with `all_threads` set from `rayon::current_num_threads()`.
    pub fn current() -> Self {
        Self {
            all_threads: rayon::current_num_threads(),
            ..Self::default()
        }
    }

    /// Clamp a requested (or default) worker count into `floor..=max`.
    pub fn clamp(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.all_threads)
            .clamp(self.floor, self.max)
    }
}

// ---- Channels ----

/// Capacities for the work queue and the result channel.
pub struct ChannelCaps;

impl ChannelCaps {
    /// Work queue. The walk blocks when full; workers drain it independently of the aggregator.
    pub const WORK_QUEUE: usize = 10_000;
    /// Result channel. Entries carry whole encoded files, so keep this small.
    pub const RESULTS: usize = 256;
    /// How often the aggregator wakes to check the cancel flag (milliseconds).
    pub const CANCEL_POLL_MS: u64 = 200;
}

// ---- Reading ----

/// File read thresholds and buffer sizes.
pub struct ReadConsts;

impl ReadConsts {
    /// File size above which reads use memory-mapped I/O (bytes). 64 MB.
    pub const MMAP_THRESHOLD: u64 = 64 * 1024 * 1024;
    /// Buffer size for reading files below the mmap threshold (bytes). 256 KB.
    pub const READ_BUFFER_SIZE: usize = 256 * 1024;
}
