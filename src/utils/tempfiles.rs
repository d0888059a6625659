use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Temp path next to `out` (same directory, so the final rename stays on one filesystem).
/// Hidden, so a walk that covers the output directory never picks it up.
pub fn temp_path_for(out: &Path) -> PathBuf {
    let name = out
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    out.parent()
        .unwrap_or(Path::new("."))
        .join(format!(".{name}.tmp"))
}

/// Write `contents` to `out` atomically: temp file, fsync, rename. On failure the temp file is
/// removed and `out` is untouched.
pub fn write_atomic(out: &Path, contents: &[u8]) -> Result<()> {
    let temp_path = temp_path_for(out);
    let written = (|| -> Result<()> {
        let mut f = fs::File::create(&temp_path)
            .with_context(|| format!("create temp file {}", temp_path.display()))?;
        f.write_all(contents)
            .with_context(|| format!("write temp file {}", temp_path.display()))?;
        f.sync_all().context("sync temp file")?;
        Ok(())
    })();
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }
    rename_temp_to_final(&temp_path, out)
}

pub fn rename_temp_to_final(temp_path: &Path, final_path: &Path) -> Result<()> {
    if let Err(e) = fs::rename(temp_path, final_path) {
        let _ = fs::remove_file(temp_path);
        return Err(e).with_context(|| {
            format!(
                "atomic rename temp artifact to final path ({} -> {})",
                temp_path.display(),
                final_path.display()
            )
        });
    }
    Ok(())
}
