//! Load `config.kobako` from the root: the artifact namespace and regex exclude patterns.
//!
//! Format, one directive per trimmed line:
//! - `#package <name>` sets the namespace (a Rust identifier);
//! - any other line starting with `#` is a comment;
//! - every other non-empty line is a regex; a path it matches is excluded.
//!
//! Everything is validated here. Malformed lines become [`ConfigWarning`]s and are dropped,
//! so the rest of the run only ever sees compiled patterns and a valid identifier.

use anyhow::{Context, Result};
use log::warn;
use regex::Regex;
use std::path::Path;
use thiserror::Error;

use crate::utils::config::{DEFAULT_NAMESPACE, PackagePaths};

const PACKAGE_DIRECTIVE: &str = "#package";
const COMMENT_PREFIX: char = '#';

/// A line of `config.kobako` (or a CLI/settings pattern) that was ignored.
#[derive(Debug, Error)]
pub enum ConfigWarning {
    #[error("line {line}: invalid exclude pattern `{pattern}`: {source}")]
    InvalidPattern {
        line: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("line {line}: `{name}` is not a valid module name")]
    InvalidNamespace { line: usize, name: String },
    #[error("line {line}: `#package` needs a name")]
    MissingNamespace { line: usize },
}

/// Compiled exclude pattern, keeping its source text for logs.
#[derive(Clone, Debug)]
pub struct ExcludePattern {
    pub source: String,
    pub regex: Regex,
}

impl ExcludePattern {
    pub fn compile(source: &str) -> std::result::Result<Self, regex::Error> {
        Ok(Self {
            source: source.to_string(),
            regex: Regex::new(source)?,
        })
    }
}

/// Validated contents of `config.kobako`.
#[derive(Debug)]
pub struct KobakoConfig {
    pub namespace: String,
    pub exclude: Vec<ExcludePattern>,
    pub warnings: Vec<ConfigWarning>,
}

impl Default for KobakoConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            exclude: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl KobakoConfig {
    /// Compile extra patterns (CLI / settings file) onto this config. Bad ones become warnings
    /// with `line: 0`.
    pub fn extend_patterns<'a>(&mut self, patterns: impl IntoIterator<Item = &'a String>) {
        for p in patterns {
            match ExcludePattern::compile(p) {
                Ok(pat) => self.exclude.push(pat),
                Err(source) => self.warnings.push(ConfigWarning::InvalidPattern {
                    line: 0,
                    pattern: p.clone(),
                    source,
                }),
            }
        }
    }

    /// Log every warning once.
    pub fn report_warnings(&self) {
        for w in &self.warnings {
            warn!("{}: {}", PackagePaths::get().config_filename(), w);
        }
    }
}

/// True if `name` parses as a plain (non-keyword) Rust identifier.
pub fn is_valid_namespace(name: &str) -> bool {
    syn::parse_str::<syn::Ident>(name).is_ok()
}

/// Parse config text. Never fails; bad lines are collected in `warnings`.
pub fn parse_config(text: &str) -> KobakoConfig {
    let mut config = KobakoConfig::default();
    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix(PACKAGE_DIRECTIVE)
            && (rest.is_empty() || rest.starts_with(char::is_whitespace))
        {
            match rest.split_whitespace().next() {
                Some(name) if is_valid_namespace(name) => config.namespace = name.to_string(),
                Some(name) => config.warnings.push(ConfigWarning::InvalidNamespace {
                    line: line_no,
                    name: name.to_string(),
                }),
                None => config
                    .warnings
                    .push(ConfigWarning::MissingNamespace { line: line_no }),
            }
            continue;
        }
        if line.starts_with(COMMENT_PREFIX) {
            continue;
        }
        match ExcludePattern::compile(line) {
            Ok(pat) => config.exclude.push(pat),
            Err(source) => config.warnings.push(ConfigWarning::InvalidPattern {
                line: line_no,
                pattern: line.to_string(),
                source,
            }),
        }
    }
    config
}

/// Load `config.kobako` from `root`. A missing file yields the defaults.
pub fn load_config(root: &Path) -> Result<KobakoConfig> {
    let path = root.join(PackagePaths::get().config_filename());
    match std::fs::read_to_string(&path) {
        Ok(text) => Ok(parse_config(&text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(KobakoConfig::default()),
        Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
    }
}
