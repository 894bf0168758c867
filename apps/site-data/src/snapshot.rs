use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

/// Writes `value` as pretty JSON to `<dir>/<file_name>`, creating `dir`.
pub async fn write_snapshot<T: Serialize>(dir: &Path, file_name: &str, value: &T) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let path = dir.join(file_name);
    let body = serde_json::to_string_pretty(value)?;
    tokio::fs::write(&path, body)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    debug!("Wrote {}", path.display());
    Ok(path)
}
