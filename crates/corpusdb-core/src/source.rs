//! Reading corpus sources and the multi-file preprocessing step.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::fsutil::write_atomic;
use crate::types::{FileType, SourceSpec};

/// Read the raw text of a corpus source.
pub fn load_source(spec: &SourceSpec) -> Result<String> {
    if !spec.path.is_file() {
        return Err(Error::NotFound(format!("source file {}", spec.path.display())));
    }
    match spec.file_type {
        FileType::Txt => read_text_lossy(&spec.path),
        FileType::Pdf => read_pdf(&spec.path),
    }
}

fn read_text_lossy(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
            Ok(String::from_utf8_lossy(&fs::read(path)?).to_string())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(feature = "pdf")]
fn read_pdf(path: &Path) -> Result<String> {
    pdf_extract::extract_text(path).map_err(|e| Error::Operation(format!("pdf extraction failed for {}: {e}", path.display())))
}

#[cfg(not(feature = "pdf"))]
fn read_pdf(path: &Path) -> Result<String> {
    Err(Error::Validation(format!(
        "{} is a pdf source but this build lacks the `pdf` feature",
        path.display()
    )))
}

/// Files under `dir` with the given extension, sorted by path.
pub fn list_files(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some(extension))
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    files
}

/// Concatenate every `*.{extension}` file under `dir` into `output`, blank-line separated.
/// Returns the number of files joined.
pub fn concat_directory(dir: &Path, extension: &str, output: &Path) -> Result<usize> {
    if !dir.is_dir() {
        return Err(Error::NotFound(format!("directory {}", dir.display())));
    }
    let files = list_files(dir, extension);
    if files.is_empty() {
        return Err(Error::Validation(format!("no .{extension} files under {}", dir.display())));
    }
    let mut parts = Vec::with_capacity(files.len());
    for file in &files {
        let text = read_text_lossy(file)?;
        let text = text.trim();
        if !text.is_empty() {
            parts.push(text.to_string());
        }
        tracing::debug!(file = %file.display(), "concatenated");
    }
    let mut joined = parts.join("\n\n");
    joined.push('\n');
    write_atomic(output, joined.as_bytes())?;
    tracing::info!(files = files.len(), output = %output.display(), "concatenated source files");
    Ok(files.len())
}
