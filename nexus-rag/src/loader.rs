//! Folder loading: turns files on disk into [`Document`]s.
//!
//! Only plain-text formats are read. Anything else (PDFs, images, office
//! files) is skipped rather than treated as an error, as are hidden entries,
//! empty files and files that are not valid UTF-8.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::document::Document;
use crate::error::{RagError, Result};

/// Extensions read by [`DirectoryLoader::default`].
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "rst", "csv", "tsv", "json", "jsonl", "yaml", "yml", "toml", "xml",
    "html", "htm", "log",
];

/// Loads every readable file under a folder, recursively.
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    extensions: Vec<String>,
}

impl Default for DirectoryLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}

impl DirectoryLoader {
    /// A loader accepting [`DEFAULT_EXTENSIONS`].
    pub fn new() -> Self {
        Self { extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect() }
    }

    /// Replace the accepted extensions (case-insensitive, without the dot).
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.into().trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    /// Read every supported file under `folder` into a [`Document`].
    ///
    /// Documents are returned in path order. Each id is the file's path
    /// relative to `folder`, so loading the same folder twice yields the
    /// same ids. An existing folder with nothing readable returns an empty
    /// `Vec`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::LoaderError`] if `folder` does not exist or is
    /// not a directory.
    pub fn load(&self, folder: impl AsRef<Path>) -> Result<Vec<Document>> {
        let folder = folder.as_ref();
        if !folder.exists() {
            return Err(RagError::LoaderError {
                path: folder.display().to_string(),
                message: "Upload folder does not exist".to_string(),
            });
        }
        if !folder.is_dir() {
            return Err(RagError::LoaderError {
                path: folder.display().to_string(),
                message: "not a directory".to_string(),
            });
        }

        let mut files: Vec<PathBuf> = WalkDir::new(folder)
            .follow_links(true)
            .into_iter()
            .filter_entry(|entry| !is_hidden(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable directory entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(DirEntry::into_path)
            .collect();
        files.sort();

        let mut documents = Vec::new();
        for path in files {
            if !self.accepts(&path) {
                debug!(path = %path.display(), "skipping unsupported file");
                continue;
            }
            let text = match std::fs::read(&path).map(String::from_utf8) {
                Ok(Ok(text)) => text,
                Ok(Err(_)) => {
                    warn!(path = %path.display(), "skipping file that is not valid UTF-8");
                    continue;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable file");
                    continue;
                }
            };
            let text = text.trim_start_matches('\u{feff}');
            if text.trim().is_empty() {
                debug!(path = %path.display(), "skipping empty file");
                continue;
            }

            let id = path
                .strip_prefix(folder)
                .unwrap_or(&path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            documents.push(Document::from_file(id, text, &path));
        }

        info!(folder = %folder.display(), document_count = documents.len(), "loaded folder");
        Ok(documents)
    }
}
