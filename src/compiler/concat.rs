//! Per-locale bundle of generated files.

use std::io;
use std::path::{Path, PathBuf};

/// Write the contents of `parts`, in order, into `dest`.
///
/// Each part is followed by a newline so statements never run together.
pub async fn concat_files(parts: &[PathBuf], dest: &Path) -> io::Result<()> {
    let mut bundle = String::new();
    for part in parts {
        let text = tokio::fs::read_to_string(part)
            .await
            .map_err(|e| io::Error::new(e.kind(), format!("{}: {e}", part.display())))?;
        bundle.push_str(&text);
        if !text.ends_with('\n') {
            bundle.push('\n');
        }
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(dest, bundle).await
}
