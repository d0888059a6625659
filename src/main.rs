//! Kobako CLI: embed a directory into a generated Rust module.

use anyhow::Result;
use clap::Parser;
use kobako::engine::arg_parser::Cli;
use kobako::engine::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
