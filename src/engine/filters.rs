//! Filter chain: which regular files the walk hands to the encoder pool.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::utils::config::{HIDDEN_PREFIX, PackagePaths};
use crate::utils::kobako_config::ExcludePattern;

/// One file the walk is considering.
#[derive(Clone, Copy, Debug)]
pub struct Candidate<'a> {
    pub path: &'a Path,
    /// Raw file name; not necessarily UTF-8.
    pub name: &'a OsStr,
    pub is_file: bool,
}

impl<'a> Candidate<'a> {
    pub fn new(path: &'a Path, is_file: bool) -> Self {
        let name = path.file_name().unwrap_or_default();
        Self {
            path,
            name,
            is_file,
        }
    }
}

/// A single predicate. Each rejects what it describes.
#[derive(Clone, Debug)]
pub enum Filter {
    /// Names starting with `.`.
    Hidden,
    /// The line-format config file, by name.
    ConfigFile(String),
    /// The artifact being written, by canonical path.
    OutputFile(PathBuf),
    /// User pattern matched against the full path.
    Exclude(ExcludePattern),
}

impl Filter {
    pub fn accepts(&self, c: &Candidate<'_>) -> bool {
        match self {
            Filter::Hidden => c.name.as_encoded_bytes().first() != Some(&HIDDEN_PREFIX),
            Filter::ConfigFile(name) => c.name != OsStr::new(name),
            Filter::OutputFile(out) => c.path != out.as_path(),
            Filter::Exclude(pat) => !pat.regex.is_match(&c.path.to_string_lossy()),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Filter::Hidden => "hidden".to_string(),
            Filter::ConfigFile(name) => format!("config file {name}"),
            Filter::OutputFile(out) => format!("output artifact {}", out.display()),
            Filter::Exclude(pat) => format!("exclude pattern `{}`", pat.source),
        }
    }
}

/// Ordered predicates; a candidate is eligible only if all accept. Built once, read-only after.
#[derive(Clone, Debug)]
pub struct FilterChain {
    filters: Vec<Filter>,
}

impl FilterChain {
    /// Default predicates first (hidden, config file), then the output artifact when known,
    /// then user patterns in order. The walk only consults the chain for regular files.
    pub fn new(output: Option<PathBuf>, exclude: impl IntoIterator<Item = ExcludePattern>) -> Self {
        let mut filters = vec![
            Filter::Hidden,
            Filter::ConfigFile(PackagePaths::get().config_filename().to_string()),
        ];
        filters.extend(output.map(Filter::OutputFile));
        filters.extend(exclude.into_iter().map(Filter::Exclude));
        Self { filters }
    }

    /// First filter that rejects `c`, or `None` if eligible. Short-circuits.
    pub fn rejected_by(&self, c: &Candidate<'_>) -> Option<&Filter> {
        self.filters.iter().find(|f| !f.accepts(c))
    }

    pub fn accepts(&self, c: &Candidate<'_>) -> bool {
        self.rejected_by(c).is_none()
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }
}
