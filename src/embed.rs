//! Embedding runs: config → filters → pipeline → artifact.

use anyhow::{Context, Result};
use log::debug;
use std::path::Path;

use crate::artifact;
use crate::engine::filters::FilterChain;
use crate::engine::progress::create_progress_bar;
use crate::engine::tools::{canonicalize_output, check_root_and_canonicalize};
use crate::pipeline::{CollectResult, collect_aggregate, setup_pipeline_tuning};
use crate::utils::{load_config, write_atomic};
use crate::{EmbedReport, Generated, Opts};

/// Run the pipeline on `root` and render the artifact in memory. When `output` is given and lies
/// inside `root`, it is excluded from the walk.
pub fn generate_with_opts(root: &Path, output: Option<&Path>, opts: &Opts) -> Result<Generated> {
    let root = check_root_and_canonicalize(root)?;
    let mut config = load_config(&root)?;
    config.extend_patterns(&opts.exclude);
    config.report_warnings();

    let output_canonical = output.and_then(canonicalize_output);
    let filters = FilterChain::new(output_canonical, std::mem::take(&mut config.exclude));
    debug!("{} filters, namespace `{}`", filters.filters().len(), config.namespace);

    let tuning = setup_pipeline_tuning(opts, &config.namespace);
    let progress = opts.progress.then(|| create_progress_bar("Embedding"));

    let CollectResult {
        aggregate,
        walk_errors,
        outcome,
    } = collect_aggregate(&root, opts, filters, tuning, progress)?;

    let source = artifact::render(&config.namespace, opts.storage, &aggregate.body)
        .context("Formatting error. Failed to create artifact")?;

    Ok(Generated {
        source,
        report: EmbedReport {
            namespace: config.namespace,
            storage: opts.storage,
            output: None,
            files_found: aggregate.files_found,
            files_embedded: aggregate.files_embedded,
            skipped: aggregate.skipped,
            walk_errors,
            raw_bytes: aggregate.raw_bytes,
            encoded_bytes: aggregate.encoded_bytes,
            outcome,
        },
    })
}

/// Generate the artifact for `root` and write it to `out` atomically. Nothing is written when
/// any step fails. With `opts.verify`, the written file is read back and checked.
pub fn embed_dir_with_opts(root: &Path, out: &Path, opts: &Opts) -> Result<EmbedReport> {
    let Generated { source, mut report } = generate_with_opts(root, Some(out), opts)?;
    write_atomic(out, source.as_bytes())
        .with_context(|| format!("write artifact {}", out.display()))?;

    if opts.verify {
        let written = std::fs::read_to_string(out)
            .with_context(|| format!("read back {}", out.display()))?;
        let n = artifact::verify(&written, opts.storage)
            .with_context(|| format!("verify {}", out.display()))?;
        debug!("Verified {} records in {}", n, out.display());
    }

    report.output = Some(out.to_path_buf());
    Ok(report)
}
