//! Office format → Google import MIME mapping.
//!
//! Uploading with the import MIME type set on the file metadata makes
//! Drive reinterpret the office document as a native Google document,
//! which can then be exported as PDF.

use std::path::Path;

/// Document family a source file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    WordProcessing,
    Spreadsheet,
    Presentation,
}

impl DocumentKind {
    /// The Google-native MIME type Drive converts this family into.
    pub fn import_mime(&self) -> &'static str {
        match self {
            DocumentKind::WordProcessing => "application/vnd.google-apps.document",
            DocumentKind::Spreadsheet => "application/vnd.google-apps.spreadsheet",
            DocumentKind::Presentation => "application/vnd.google-apps.presentation",
        }
    }
}

/// A supported source format: its extension, upload MIME type, and the
/// document family it imports into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceFormat {
    pub extension: &'static str,
    pub source_mime: &'static str,
    pub kind: DocumentKind,
}

impl SourceFormat {
    /// The MIME type Drive converts this format into on import.
    pub fn import_mime(&self) -> &'static str {
        self.kind.import_mime()
    }

    /// Look up a format by file extension (without the dot,
    /// case-insensitive).
    pub fn from_extension(extension: &str) -> Option<&'static SourceFormat> {
        let lower = extension.to_ascii_lowercase();
        SUPPORTED_FORMATS.iter().find(|f| f.extension == lower)
    }

    /// Look up a format from a file path's extension.
    pub fn from_path(path: &Path) -> Option<&'static SourceFormat> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

/// All formats the converter accepts.
pub const SUPPORTED_FORMATS: &[SourceFormat] = &[
    SourceFormat {
        extension: "doc",
        source_mime: "application/msword",
        kind: DocumentKind::WordProcessing,
    },
    SourceFormat {
        extension: "docx",
        source_mime: "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        kind: DocumentKind::WordProcessing,
    },
    SourceFormat {
        extension: "ppt",
        source_mime: "application/vnd.ms-powerpoint",
        kind: DocumentKind::Presentation,
    },
    SourceFormat {
        extension: "pptx",
        source_mime: "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        kind: DocumentKind::Presentation,
    },
    SourceFormat {
        extension: "xls",
        source_mime: "application/vnd.ms-excel",
        kind: DocumentKind::Spreadsheet,
    },
    SourceFormat {
        extension: "xlsx",
        source_mime: "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        kind: DocumentKind::Spreadsheet,
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_from_extension_known_formats() {
        let docx = SourceFormat::from_extension("docx").unwrap();
        assert_eq!(docx.kind, DocumentKind::WordProcessing);
        assert_eq!(
            docx.import_mime(),
            "application/vnd.google-apps.document"
        );

        let xls = SourceFormat::from_extension("xls").unwrap();
        assert_eq!(xls.kind, DocumentKind::Spreadsheet);
        assert_eq!(xls.source_mime, "application/vnd.ms-excel");

        let pptx = SourceFormat::from_extension("pptx").unwrap();
        assert_eq!(
            pptx.import_mime(),
            "application/vnd.google-apps.presentation"
        );
    }

    #[test]
    fn test_from_extension_is_case_insensitive() {
        assert!(SourceFormat::from_extension("DOCX").is_some());
        assert!(SourceFormat::from_extension("Xlsx").is_some());
    }

    #[test]
    fn test_from_extension_unknown() {
        assert!(SourceFormat::from_extension("pdf").is_none());
        assert!(SourceFormat::from_extension("txt").is_none());
        assert!(SourceFormat::from_extension("").is_none());
    }

    #[test]
    fn test_from_path() {
        let format = SourceFormat::from_path(&PathBuf::from("/input/Report.DOCX")).unwrap();
        assert_eq!(format.extension, "docx");

        assert!(SourceFormat::from_path(&PathBuf::from("/input/notes.txt")).is_none());
        assert!(SourceFormat::from_path(&PathBuf::from("/input/noext")).is_none());
    }

    #[test]
    fn test_all_formats_have_distinct_extensions() {
        for (i, a) in SUPPORTED_FORMATS.iter().enumerate() {
            for b in &SUPPORTED_FORMATS[i + 1..] {
                assert_ne!(a.extension, b.extension);
            }
        }
    }
}
