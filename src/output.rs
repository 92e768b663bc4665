//! Result types returned by the conversion pipeline.
//!
//! [`ConversionResult`] is the wire shape of the upload endpoint: exactly one
//! of `{"html": …, "folder": …}` or `{"error": …}`. The richer
//! [`ConversionOutput`] fields (workspace id, per-media report, timings) are
//! available to library callers but kept off the wire.

use crate::error::MediaError;
use serde::Serialize;
use std::path::PathBuf;

/// Outcome of one upload. Never both content and an error.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ConversionResult {
    Converted(ConversionOutput),
    Failed { error: String },
}

impl ConversionResult {
    pub fn is_converted(&self) -> bool {
        matches!(self, ConversionResult::Converted(_))
    }

    pub fn output(&self) -> Option<&ConversionOutput> {
        match self {
            ConversionResult::Converted(out) => Some(out),
            ConversionResult::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ConversionResult::Converted(_) => None,
            ConversionResult::Failed { error } => Some(error),
        }
    }
}

/// A successfully converted document.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    /// HTML with every image reference pointing at the served workspace.
    pub html: String,
    /// Location of the workspace holding the document's media.
    pub folder: String,
    /// Workspace identifier (also the request's correlation id).
    #[serde(skip)]
    pub workspace_id: String,
    /// Workspace directory on disk.
    #[serde(skip)]
    pub workspace: PathBuf,
    /// What happened to each vector image.
    #[serde(skip)]
    pub media: NormalizationReport,
    /// Wall-clock time spent in the pipeline.
    #[serde(skip)]
    pub duration_ms: u64,
}

/// One vector image that was rasterised and re-linked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvertedMedia {
    /// Original path relative to the workspace, e.g. `media/image3.emf`.
    pub from: String,
    /// Replacement path relative to the workspace, e.g. `media/image3.png`.
    pub to: String,
}

/// Per-file outcome of the vector media pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizationReport {
    pub converted: Vec<ConvertedMedia>,
    pub failed: Vec<MediaError>,
}

impl NormalizationReport {
    /// Number of vector files discovered.
    pub fn discovered(&self) -> usize {
        self.converted.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output() -> ConversionOutput {
        ConversionOutput {
            html: "<p>hi</p>".into(),
            folder: "uploads/output_images/1_a".into(),
            workspace_id: "1_a".into(),
            workspace: PathBuf::from("uploads/output_images/1_a"),
            media: NormalizationReport::default(),
            duration_ms: 12,
        }
    }

    #[test]
    fn converted_serialises_to_html_and_folder_only() {
        let json = serde_json::to_value(ConversionResult::Converted(output())).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 2, "got {json}");
        assert_eq!(obj["html"], "<p>hi</p>");
        assert_eq!(obj["folder"], "uploads/output_images/1_a");
    }

    #[test]
    fn failed_serialises_to_error_only() {
        let r = ConversionResult::Failed {
            error: "pandoc exited 64".into(),
        };
        assert_eq!(
            serde_json::to_string(&r).unwrap(),
            r#"{"error":"pandoc exited 64"}"#
        );
        assert!(!r.is_converted());
        assert_eq!(r.error(), Some("pandoc exited 64"));
        assert!(r.output().is_none());
    }

    #[test]
    fn report_counts() {
        let report = NormalizationReport {
            converted: vec![ConvertedMedia {
                from: "media/a.emf".into(),
                to: "media/a.png".into(),
            }],
            failed: vec![MediaError::LaunchFailed {
                file: PathBuf::from("media/b.wmf"),
                detail: "x".into(),
            }],
        };
        assert_eq!(report.discovered(), 2);
        assert!(!report.is_clean());
    }
}
