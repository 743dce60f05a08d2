//! Knowledge loader: the static reference text behind every prompt.
//!
//! Reads a directory of plain-text files once at startup and joins them into
//! a single string. Failures are per-file: an unreadable file is logged and
//! skipped, and a missing directory yields an empty knowledge base.

use sage_core::error::LoadError;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Separator placed between documents.
const SEPARATOR: &str = "\n\n";

/// Concatenated knowledge text plus the files it came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeBase {
    pub text: String,
    pub sources: Vec<PathBuf>,
}

impl KnowledgeBase {
    /// Load every file in `dir` whose extension is in `extensions`
    /// (case-insensitive), in file-name order. Never fails.
    pub fn load(dir: &Path, extensions: &[String]) -> Self {
        let read_dir = match std::fs::read_dir(dir) {
            Ok(rd) => rd,
            Err(e) => {
                let err = LoadError::MissingDirectory {
                    path: dir.to_path_buf(),
                };
                warn!(error = %err, cause = %e, "Knowledge base will be empty");
                return Self::default();
            }
        };

        let mut paths: Vec<PathBuf> = read_dir
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && has_extension(p, extensions))
            .collect();

        // File-name order keeps the text identical across runs and platforms.
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        if paths.is_empty() {
            warn!(dir = %dir.display(), "No knowledge files found");
            return Self::default();
        }

        let mut documents = Vec::with_capacity(paths.len());
        let mut sources = Vec::with_capacity(paths.len());

        for path in paths {
            match read_document(&path) {
                Ok(content) if content.is_empty() => {
                    debug!(file = %path.display(), "Skipping empty knowledge file");
                }
                Ok(content) => {
                    info!(file = %path.display(), bytes = content.len(), "Loaded knowledge file");
                    documents.push(content);
                    sources.push(path);
                }
                Err(err) => {
                    error!(error = %err, "Skipping knowledge file");
                }
            }
        }

        Self {
            text: documents.join(SEPARATOR),
            sources,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Load the `.txt` files in `dir` and return the joined text.
pub fn load_knowledge_base(dir: &Path) -> String {
    KnowledgeBase::load(dir, &["txt".to_string()]).text
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
}

fn read_document(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path)
        .map(|content| content.trim().to_string())
        .map_err(|e| LoadError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}
