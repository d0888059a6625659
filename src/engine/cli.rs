//! CLI command handler: settings file + flags → Opts, install Ctrl+C, embed, report.

use anyhow::{Context, Result};
use log::{info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::embed::embed_dir_with_opts;
use crate::engine::arg_parser::Cli;
use crate::utils::{KobakoToml, apply_file_to_opts, load_kobako_toml, setup_logging};
use crate::{EmbedReport, Opts, Outcome};

/// Overwrite opts field from a CLI flag when given.
macro_rules! apply_cli_opt {
    ($cli:expr, $opts:expr, $cli_field:ident => $opts_field:ident) => {
        if let Some(v) = $cli.$cli_field {
            $opts.$opts_field = v;
        }
    };
}

/// Defaults, then `.kobako.toml` in the root, then CLI flags.
fn setup_opts(cli: &Cli, settings: Option<&KobakoToml>) -> Opts {
    let mut opts = Opts::default();
    if let Some(file) = settings {
        apply_file_to_opts(file, &mut opts);
    }
    if cli.workers.is_some() {
        opts.num_threads = cli.workers;
    }
    apply_cli_opt!(cli, opts, storage => storage);
    apply_cli_opt!(cli, opts, strict => strict);
    apply_cli_opt!(cli, opts, follow_links => follow_links);
    apply_cli_opt!(cli, opts, verbose => verbose);
    apply_cli_opt!(cli, opts, progress => progress);
    apply_cli_opt!(cli, opts, verify => verify);
    opts.exclude.extend(cli.exclude.iter().cloned());
    opts
}

fn write_report(cli: &Cli, report: &EmbedReport) -> Result<()> {
    if let Some(path) = &cli.report {
        let json = serde_json::to_string_pretty(report).context("serialize run report")?;
        std::fs::write(path, json)
            .with_context(|| format!("write run report {}", path.display()))?;
    }
    Ok(())
}

/// Embed `cli.root` into `cli.out`. Errors (including cancellation) leave no artifact behind.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let settings = load_kobako_toml(&cli.root);
    let mut opts = setup_opts(cli, settings.as_ref().ok().and_then(Option::as_ref));
    setup_logging(opts.verbose);
    if let Err(e) = &settings {
        warn!("Ignoring settings file: {:#}", e);
    }

    let cancel_requested = Arc::new(AtomicBool::new(false));
    let cancel_requested_handler = Arc::clone(&cancel_requested);
    ctrlc::set_handler(move || {
        cancel_requested_handler.store(true, Ordering::Relaxed);
    })
    .context("set Ctrl+C handler")?;
    opts.cancel = Some(cancel_requested);

    let report = embed_dir_with_opts(&cli.root, &cli.out, &opts)?;
    write_report(cli, &report)?;

    if report.outcome == Outcome::Partial {
        warn!(
            "PARTIAL: {} of {} files embedded, {} skipped",
            report.files_embedded,
            report.files_found,
            report.skipped.len()
        );
    }
    info!(
        "OK [{} files] Saved to: {}",
        report.files_embedded,
        cli.out.display()
    );
    Ok(())
}
