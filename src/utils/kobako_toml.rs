//! Load `.kobako.toml` from the root (CLI only). Lib callers pass everything through EmbedOpts.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::utils::config::PackagePaths;
use crate::{Opts, StorageMode};

#[derive(Debug, Default, Deserialize)]
pub struct KobakoToml {
    #[serde(default)]
    settings: SettingsSection,
    /// Extension → content type overrides.
    #[serde(default)]
    content_types: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsSection {
    workers: Option<usize>,
    storage: Option<StorageMode>,
    follow_links: Option<bool>,
    strict: Option<bool>,
    exclude: Option<Vec<String>>,
    verbose: Option<bool>,
    progress: Option<bool>,
    verify: Option<bool>,
}

/// Load `.kobako.toml` from `dir`. `Ok(None)` when there is no such file. Unreadable or invalid
/// files are errors; the CLI logs them once the logger is up and runs without the file.
pub fn load_kobako_toml(dir: &Path) -> Result<Option<KobakoToml>> {
    let path = dir.join(PackagePaths::get().settings_filename());
    let s = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
    };
    parse_kobako_toml(&s)
        .map(Some)
        .with_context(|| format!("parse {}", path.display()))
}

pub fn parse_kobako_toml(s: &str) -> std::result::Result<KobakoToml, toml::de::Error> {
    toml::from_str(s)
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($sec:expr, $opts:expr, $sec_field:ident => $opts_field:ident) => {
        if let Some(v) = $sec.$sec_field {
            $opts.$opts_field = v;
        }
    };
}

/// Apply file settings to opts (only fields present in the file). Call before applying CLI.
pub fn apply_file_to_opts(file: &KobakoToml, opts: &mut Opts) {
    let sec = &file.settings;
    if sec.workers.is_some() {
        opts.num_threads = sec.workers;
    }
    apply_file_opt!(sec, opts, storage => storage);
    apply_file_opt!(sec, opts, follow_links => follow_links);
    apply_file_opt!(sec, opts, strict => strict);
    apply_file_opt!(sec, opts, verbose => verbose);
    apply_file_opt!(sec, opts, progress => progress);
    apply_file_opt!(sec, opts, verify => verify);
    if let Some(ref v) = sec.exclude {
        opts.exclude.extend(v.iter().cloned());
    }
    for (ext, ct) in &file.content_types {
        opts.content_types.insert(ext.to_ascii_lowercase(), ct.clone());
    }
}
