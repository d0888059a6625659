pub mod config;
pub mod fd_limit;
pub mod kobako_config;
pub mod kobako_toml;
pub mod logger;
pub mod tempfiles;

pub use config::*;
pub use fd_limit::{FDS_PER_WORKER, soft_fd_limit, workers_within_fd_limit};
pub use kobako_config::{ConfigWarning, ExcludePattern, KobakoConfig, load_config, parse_config};
pub use kobako_toml::{KobakoToml, apply_file_to_opts, load_kobako_toml};
pub use logger::setup_logging;
pub use tempfiles::{temp_path_for, write_atomic};
