//! Source file discovery and the up-to-date skip rule.

use crate::error::Result;
use provider_google_drive::SourceFormat;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

/// A source file eligible for conversion.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Full path of the source file
    pub path: PathBuf,

    /// File name component (used for the upload and the PDF name)
    pub file_name: String,

    /// Size in bytes
    pub size: u64,

    /// Last modification time
    pub modified: Option<SystemTime>,

    /// The matched source format
    pub format: &'static SourceFormat,
}

impl DiscoveredFile {
    /// The PDF path this file converts into.
    pub fn output_path(&self, output_dir: &Path) -> PathBuf {
        let stem = Path::new(&self.file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_name.clone());

        output_dir.join(format!("{}.pdf", stem))
    }

    /// Whether an existing output PDF is already up to date.
    ///
    /// True when the PDF exists and its mtime is at or after the source's;
    /// any stat failure means "not up to date" so the file converts again.
    pub fn is_up_to_date(&self, output_dir: &Path) -> bool {
        let Some(source_modified) = self.modified else {
            return false;
        };

        let out_path = self.output_path(output_dir);

        match std::fs::metadata(&out_path).and_then(|m| m.modified()) {
            Ok(output_modified) => output_modified >= source_modified,
            Err(_) => false,
        }
    }
}

/// List supported files in the input directory, sorted by lowercase name.
///
/// Non-files and unsupported extensions are ignored; a file whose
/// metadata cannot be read is skipped with a warning rather than failing
/// the batch.
pub async fn discover_files(input_dir: &Path) -> Result<Vec<DiscoveredFile>> {
    let mut entries = tokio::fs::read_dir(input_dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();

        let Some(format) = SourceFormat::from_path(&path) else {
            debug!(path = %path.display(), "Ignoring unsupported entry");
            continue;
        };

        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping file (stat failed)");
                continue;
            }
        };

        if !metadata.is_file() {
            continue;
        }

        let file_name = match path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => continue,
        };

        files.push(DiscoveredFile {
            path,
            file_name,
            size: metadata.len(),
            modified: metadata.modified().ok(),
            format,
        });
    }

    files.sort_by_key(|f| f.file_name.to_lowercase());

    Ok(files)
}

/// Human-readable byte size for log lines: `512 B`, `1.2 MB`, ...
pub fn format_size(num_bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

    let mut size = num_bytes as f64;
    for (i, unit) in UNITS.iter().enumerate() {
        if size < 1024.0 || i == UNITS.len() - 1 {
            if *unit == "B" {
                return format!("{} {}", num_bytes, unit);
            }
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }

    unreachable!("size formatting covers all magnitudes")
}
