//! File and iteration helpers shared by the prose-md tools.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tempfile::Builder;
use walkdir::{DirEntry, WalkDir};

/// Maps `items` in parallel, keeping their order in the result.
pub fn parallel_map<T, R, F>(items: Vec<T>, func: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Send + Sync,
{
    items.into_par_iter().map(func).collect()
}

/// Writes `contents` to `path` so readers never observe partial content: a
/// temporary file in the same directory is renamed over the target. With
/// `backup`, an existing file is first copied to `<path>.bak`.
pub fn atomic_write(path: &Path, contents: &str, backup: bool) -> io::Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&parent)?;

    let mut tmp = Builder::new().prefix(".prose-md").tempfile_in(&parent)?;
    tmp.as_file_mut().write_all(contents.as_bytes())?;
    tmp.as_file_mut().sync_all()?;

    if path.exists() {
        if backup {
            fs::copy(path, backup_path(path))?;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(path)?.permissions().mode();
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(mode))?;
        }
    }

    tmp.persist(path).map(|_| ()).map_err(|err| err.error)
}

/// `notes.md` becomes `notes.md.bak`.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

pub fn is_markdown(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("md" | "markdown")
    )
}

/// Expands directories into the markdown files below them, skipping hidden
/// entries. Files named explicitly are kept whatever their extension.
/// The result is sorted and free of duplicates.
pub fn collect_markdown_files(paths: &[PathBuf]) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            walk(path, &mut files)?;
        } else {
            files.push(path.clone());
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn walk(dir: &Path, files: &mut Vec<PathBuf>) -> io::Result<()> {
    let entries = WalkDir::new(dir)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));
    for entry in entries {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() && is_markdown(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(())
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}
