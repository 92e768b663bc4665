//! Error types for the docx2html library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ConvertError`]: **Fatal**: the request cannot produce HTML at all
//!   (workspace could not be created, pandoc rejected the document, the
//!   generated HTML could not be read). Returned as `Err(ConvertError)` from
//!   [`crate::convert::convert_upload`] and folded into
//!   [`crate::output::ConversionResult::Failed`] by
//!   [`crate::convert::handle_upload`].
//!
//! * [`MediaError`]: **Non-fatal**: a single extracted media file could not
//!   be rasterised, but the document is still usable. Stored inside
//!   [`crate::output::NormalizationReport`] so callers can inspect partial
//!   success rather than losing the whole document to one bad image.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docx2html library.
///
/// Per-media failures use [`MediaError`] and are stored in
/// [`crate::output::NormalizationReport`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Request errors ────────────────────────────────────────────────────
    /// The uploaded filename has no usable component after sanitising.
    #[error("Invalid upload filename '{name}'")]
    InvalidFilename { name: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// The per-request workspace directory could not be created.
    #[error("Failed to create workspace '{path}': {source}")]
    WorkspaceCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The uploaded bytes could not be persisted to the uploads area.
    #[error("Failed to write upload to '{path}': {source}")]
    InputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The converter exited cleanly but its HTML output is missing or unreadable.
    #[error("Failed to read generated HTML '{path}': {source}")]
    HtmlRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An external tool could not be started at all (not installed, not executable).
    #[error("Failed to launch '{tool}': {source}\nCheck that it is installed and on PATH.")]
    ToolLaunch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic filesystem failure outside the request pipeline (retention sweep).
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Converter errors ──────────────────────────────────────────────────
    /// The document converter exited with a nonzero status.
    #[error("Document conversion failed ({status}): {stderr}")]
    ConversionFailed { status: String, stderr: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// True for workspace/file creation, read and write failures.
    pub fn is_io_failure(&self) -> bool {
        matches!(
            self,
            ConvertError::InvalidFilename { .. }
                | ConvertError::WorkspaceCreate { .. }
                | ConvertError::InputWrite { .. }
                | ConvertError::HtmlRead { .. }
                | ConvertError::ToolLaunch { .. }
                | ConvertError::Io { .. }
        )
    }

    /// True when the external document converter rejected the input.
    pub fn is_conversion_failure(&self) -> bool {
        matches!(self, ConvertError::ConversionFailed { .. })
    }
}

/// A non-fatal error for a single extracted media file.
///
/// The original file is always left in the workspace when one of these is
/// recorded, so the HTML reference to it stays unrewritten.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaError {
    /// The rasteriser exited with a nonzero status.
    #[error("{}: rasterisation failed ({status}): {stderr}", file.display())]
    RasterizationFailed {
        file: PathBuf,
        status: String,
        stderr: String,
    },

    /// The rasteriser could not be started for this file.
    #[error("{}: failed to launch rasteriser: {detail}", file.display())]
    LaunchFailed { file: PathBuf, detail: String },

    /// The raster file was produced but the HTML reference could not be updated.
    #[error("{}: failed to update HTML reference: {detail}", file.display())]
    ReferenceUpdateFailed { file: PathBuf, detail: String },
}

impl MediaError {
    /// The vector file this error refers to.
    pub fn file(&self) -> &std::path::Path {
        match self {
            MediaError::RasterizationFailed { file, .. }
            | MediaError::LaunchFailed { file, .. }
            | MediaError::ReferenceUpdateFailed { file, .. } => file,
        }
    }
}

/// Render a process exit status for error messages (`exit 3`, `signal`).
pub(crate) fn describe_status(status: std::process::ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit {code}"),
        None => "terminated by signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_failed_display_carries_stderr() {
        let e = ConvertError::ConversionFailed {
            status: "exit 64".into(),
            stderr: "couldn't unpack docx container".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("exit 64"), "got: {msg}");
        assert!(msg.contains("couldn't unpack docx container"), "got: {msg}");
        assert!(e.is_conversion_failure());
        assert!(!e.is_io_failure());
    }

    #[test]
    fn workspace_create_is_io_failure() {
        let e = ConvertError::WorkspaceCreate {
            path: PathBuf::from("/nope/output_images/1_abc"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(e.is_io_failure());
        assert!(e.to_string().contains("/nope/output_images/1_abc"));
    }

    #[test]
    fn tool_launch_mentions_tool() {
        let e = ConvertError::ToolLaunch {
            tool: "pandoc".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(e.to_string().contains("pandoc"));
        assert!(e.is_io_failure());
    }

    #[test]
    fn media_error_display_and_file() {
        let e = MediaError::RasterizationFailed {
            file: PathBuf::from("media/image3.emf"),
            status: "exit 1".into(),
            stderr: "unable to open".into(),
        };
        assert!(e.to_string().contains("image3.emf"));
        assert!(e.to_string().contains("unable to open"));
        assert_eq!(e.file(), std::path::Path::new("media/image3.emf"));
    }

    #[test]
    fn media_error_serialises_with_kind_tag() {
        let e = MediaError::LaunchFailed {
            file: PathBuf::from("a.wmf"),
            detail: "not found".into(),
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["kind"], "launch_failed");
        assert_eq!(json["detail"], "not found");
    }
}
