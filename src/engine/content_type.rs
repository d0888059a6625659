//! Content-type inference from file extension.

use std::collections::HashMap;
use std::path::Path;

use crate::utils::config::DEFAULT_CONTENT_TYPE;

/// Common web and media types.
fn builtin(ext: &str) -> Option<&'static str> {
    let ct = match ext {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "text/javascript",
        "json" | "map" => "application/json",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "xml" => "text/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        "wasm" => "application/wasm",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "woff" => "font/woff",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        _ => return None,
    };
    Some(ct)
}

/// Registered on top of the built-in table.
const EXTRA_TYPES: &[(&str, &str)] = &[("woff2", "application/font-woff2")];

/// Extension → content type lookup: user overrides, then registered extras, then built-ins.
#[derive(Clone, Debug, Default)]
pub struct ContentTypes {
    overrides: HashMap<String, String>,
}

impl ContentTypes {
    /// `overrides` keys are extensions without the dot; matched case-insensitively.
    pub fn new(overrides: &HashMap<String, String>) -> Self {
        Self {
            overrides: overrides
                .iter()
                .map(|(k, v)| (k.trim_start_matches('.').to_ascii_lowercase(), v.clone()))
                .collect(),
        }
    }

    /// Content type for `path`. Unknown or missing extension → `application/octet-stream`.
    pub fn for_path(&self, path: &Path) -> String {
        let Some(ext) = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
        else {
            return DEFAULT_CONTENT_TYPE.to_string();
        };
        if let Some(ct) = self.overrides.get(&ext) {
            return ct.clone();
        }
        EXTRA_TYPES
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, ct)| *ct)
            .or_else(|| builtin(&ext))
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string()
    }
}
