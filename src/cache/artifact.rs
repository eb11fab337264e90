//! Precompiled artifact lookup.
//!
//! A source file is satisfied only when the precompiled root has an artifact
//! for every configured locale. The compiler runs over a whole locale batch
//! at once, so a file missing any locale is recompiled for all of them.

use std::io;
use std::path::{Path, PathBuf};

use tokio::task::JoinSet;

use super::hash::hash_file;
use crate::compiler::OutputLayout;
use crate::{debug, log};

/// Sources that still need compiling, in input order.
///
/// Satisfied files have their artifacts copied into `output` when the
/// precompiled root differs. A copy failure marks only that file dirty; any
/// other I/O failure during the scan marks every file dirty.
pub async fn filter_dirty(
    output: &OutputLayout,
    precompiled: Option<&OutputLayout>,
    files: &[PathBuf],
    locales: &[Option<String>],
) -> Vec<PathBuf> {
    let Some(precompiled) = precompiled else {
        return files.to_vec();
    };

    match scan(output, precompiled, files, locales).await {
        Ok(dirty) => {
            debug!("cache"; "{} of {} file(s) need compiling", dirty.len(), files.len());
            dirty
        }
        Err(e) => {
            log!("cache"; "precompiled lookup in `{}` failed ({e}), compiling everything",
                precompiled.root().display());
            files.to_vec()
        }
    }
}

/// Per-file outcome of the scan.
enum Lookup {
    Satisfied,
    Dirty,
}

async fn scan(
    output: &OutputLayout,
    precompiled: &OutputLayout,
    files: &[PathBuf],
    locales: &[Option<String>],
) -> io::Result<Vec<PathBuf>> {
    let mut tasks = JoinSet::new();

    for (index, file) in files.iter().enumerate() {
        let pairs: Vec<(PathBuf, PathBuf)> = locales
            .iter()
            .map(|locale| {
                (
                    precompiled.artifact(file, locale.as_deref()),
                    output.artifact(file, locale.as_deref()),
                )
            })
            .collect();
        tasks.spawn(async move { (index, lookup(pairs).await) });
    }

    let mut dirty_indices = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let (index, outcome) = joined.map_err(io::Error::other)?;
        if let Lookup::Dirty = outcome? {
            dirty_indices.push(index);
        }
    }
    dirty_indices.sort_unstable();

    Ok(dirty_indices
        .into_iter()
        .map(|index| files[index].clone())
        .collect())
}

async fn lookup(pairs: Vec<(PathBuf, PathBuf)>) -> io::Result<Lookup> {
    for (precompiled, _) in &pairs {
        if !artifact_exists(precompiled).await? {
            return Ok(Lookup::Dirty);
        }
    }

    for (precompiled, active) in &pairs {
        if precompiled == active {
            continue;
        }
        if let Err(e) = copy_artifact(precompiled, active).await {
            debug!("cache"; "copy {} failed: {}", precompiled.display(), e);
            return Ok(Lookup::Dirty);
        }
    }

    Ok(Lookup::Satisfied)
}

/// `Ok(false)` only for a plain "not found"; anything else is unexpected.
async fn artifact_exists(path: &Path) -> io::Result<bool> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Copy unless the destination already holds identical bytes.
async fn copy_artifact(from: &Path, to: &Path) -> io::Result<()> {
    let src = hash_file(from).await;
    if let Some(src) = src
        && hash_file(to).await == Some(src)
    {
        debug!("cache"; "{} up to date ({})", to.display(), src);
        return Ok(());
    }

    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::copy(from, to).await?;
    debug!("cache"; "copied {}", to.display());
    Ok(())
}
