//! Engine: per-file work (filters, content types, encoding), CLI, and progress display.

pub mod arg_parser;
pub mod cli;
pub mod content_type;
pub mod encoding;
pub mod filters;
pub mod progress;
pub mod tools;

// Re-export commonly used functions
pub use arg_parser::Cli;
pub use cli::handle_run;
pub use content_type::ContentTypes;
pub use encoding::{Encoded, decode_data, digest_hex, encode_bytes, encode_file};
pub use filters::{Candidate, Filter, FilterChain};
pub use tools::{path_relative_to, path_to_key, virtual_key};
