//! Zip packaging for multi-item jobs.
//!
//! Entry names are built from the item titles rather than the working
//! filenames, so an unpacked archive reads like a track listing. The
//! position prefix keeps playlist order even after a file manager re-sorts
//! by name.

use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("no files to archive")]
    NoFiles,
    #[error("zip write failed: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One file destined for the archive, with its display title.
#[derive(Debug, Clone)]
pub struct ArchiveEntrySource {
    pub path: PathBuf,
    pub title: String,
}

/// Strip a title down to word characters, whitespace and hyphens.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace() || *c == '-')
        .collect()
}

/// Archive entry name for a source: a three-digit position prefix, the
/// sanitized title capped at 50 characters, and the source file's extension.
pub fn entry_name(position: usize, title: &str, source_path: &Path) -> String {
    let clean: String = sanitize_title(title).chars().take(50).collect();
    let ext = source_path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    format!("{:03}_{}{}", position + 1, clean, ext)
}

/// Write all sources into a deflate-compressed zip at `zip_path`, then
/// remove the source files.
///
/// Sources that have vanished from disk are skipped with a warning rather
/// than failing the whole archive; if nothing at all could be written the
/// zip is removed again and `NoFiles` is returned. Runs blocking file io,
/// so callers on the async side dispatch it through `spawn_blocking`.
pub fn create_archive(sources: &[ArchiveEntrySource], zip_path: &Path) -> Result<(), ArchiveError> {
    if sources.is_empty() {
        return Err(ArchiveError::NoFiles);
    }

    let file = File::create(zip_path)?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut written = 0usize;
    for (position, source) in sources.iter().enumerate() {
        if !source.path.exists() {
            warn!(path = %source.path.display(), "skipping missing archive source");
            continue;
        }

        writer.start_file(entry_name(position, &source.title, &source.path), options)?;
        let mut input = File::open(&source.path)?;
        std::io::copy(&mut input, &mut writer)?;
        written += 1;
    }

    writer.finish()?;

    if written == 0 {
        // An entry-less zip is not a result
        let _ = std::fs::remove_file(zip_path);
        return Err(ArchiveError::NoFiles);
    }

    // The archive supersedes the individual outputs
    for source in sources {
        if source.path.exists() {
            std::fs::remove_file(&source.path)?;
        }
    }

    Ok(())
}
