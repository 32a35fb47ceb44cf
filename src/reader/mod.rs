//! Text extraction from resume documents on disk.

use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Extensions [`FileReader`] understands.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["pdf", "txt", "md"];

/// Errors raised while reading a source document.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// The path does not exist.
    #[error("Document not found: {}", .0.display())]
    NotFound(PathBuf),
    /// The file type is not handled.
    #[error("Unsupported document type: {}", .0.display())]
    Unsupported(PathBuf),
    /// Reading the file failed.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// File being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The PDF could not be parsed.
    #[error("Failed to extract PDF text from {}: {message}", path.display())]
    Pdf {
        /// File being read.
        path: PathBuf,
        /// Parser diagnostic.
        message: String,
    },
}

/// Source of raw resume text.
pub trait DocumentReader: Send + Sync {
    /// Extract the full text of the document at `path`.
    fn extract(&self, path: &Path) -> Result<String, ReaderError>;
}

/// Reader for PDF and plain-text resumes.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileReader;

impl DocumentReader for FileReader {
    fn extract(&self, path: &Path) -> Result<String, ReaderError> {
        if !path.exists() {
            return Err(ReaderError::NotFound(path.to_path_buf()));
        }

        let text = match extension_of(path).as_deref() {
            Some("pdf") => extract_pdf(path)?,
            Some("txt" | "md") => std::fs::read_to_string(path).map_err(io_error(path))?,
            _ => return Err(ReaderError::Unsupported(path.to_path_buf())),
        };

        tracing::debug!(
            file = %path.display(),
            chars = text.chars().count(),
            "Extracted document text"
        );
        Ok(text)
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ReaderError {
    move |source| ReaderError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn pdf_error(path: &Path) -> impl FnOnce(pdf_extract::OutputError) -> ReaderError {
    move |error| ReaderError::Pdf {
        path: path.to_path_buf(),
        message: error.to_string(),
    }
}

fn extract_pdf(path: &Path) -> Result<String, ReaderError> {
    let bytes = std::fs::read(path).map_err(io_error(path))?;
    let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes).map_err(pdf_error(path))?;

    tracing::debug!(file = %path.display(), pages = pages.len(), "Parsed PDF");
    for (index, page) in pages.iter().enumerate() {
        if page.trim().is_empty() {
            tracing::debug!(
                page = index + 1,
                "Page has no text layer (empty or scanned)"
            );
        }
    }
    Ok(join_pages(&pages))
}

/// Trimmed page texts joined by newlines, blank pages dropped.
fn join_pages(pages: &[String]) -> String {
    pages
        .iter()
        .map(|page| page.trim())
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
}

fn is_supported(path: &Path) -> bool {
    extension_of(path).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Expand `inputs` into the documents to process.
///
/// Files are kept as given, whatever their extension, so the reader can report them.
/// Directories are walked recursively for supported files, sorted by path.
pub fn discover_documents(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut documents = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            documents.push(input.clone());
            continue;
        }
        let mut found: Vec<PathBuf> = WalkDir::new(input)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(error) => {
                    tracing::warn!(error = %error, "Skipping unreadable directory entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && is_supported(entry.path()))
            .map(|entry| entry.into_path())
            .collect();
        found.sort();
        documents.extend(found);
    }
    documents
}
