//! Folder helpers shared by the ingestion entry point and the auditor.

use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};

/// Regular files directly inside `dir`, sorted by path. Subdirectories and
/// their contents are skipped.
pub fn list_regular_files(dir: &Path) -> crate::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(crate::Error::NotFound(format!("directory {}", dir.display())));
    }
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    files.sort();
    Ok(files)
}

/// Like [`list_regular_files`] but keeps only the given extensions (case-insensitive).
pub fn list_files_with_extensions(dir: &Path, extensions: &[&str]) -> crate::Result<Vec<PathBuf>> {
    Ok(list_regular_files(dir)?
        .into_iter()
        .filter(|p| has_extension(p, extensions))
        .collect())
}

pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// File stem as an owned string; empty when the path has none.
pub fn file_stem(path: &Path) -> String {
    path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default()
}

/// Last access time of a file, rendered in local time (RFC 3339).
pub fn file_access_date(path: &Path) -> crate::Result<String> {
    let meta = fs::metadata(path)?;
    let accessed = meta.accessed().or_else(|_| meta.modified())?;
    let local: DateTime<Local> = accessed.into();
    Ok(local.to_rfc3339())
}

pub const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp"];
