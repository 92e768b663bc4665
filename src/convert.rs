//! Upload conversion entry points.
//!
//! [`handle_upload`] is what the HTTP layer calls: it always returns a
//! well-formed [`ConversionResult`] and never an `Err`. [`convert_upload`]
//! exposes the same pipeline with a typed error for library callers who want
//! to branch on [`ConvertError`] variants.
//!
//! Every request runs inside a `conversion` tracing span carrying its
//! correlation id, so log lines from concurrent uploads stay attributable
//! without any global state.

use crate::config::ConversionConfig;
use crate::error::ConvertError;
use crate::output::{ConversionOutput, ConversionResult};
use crate::pipeline::workspace::{self, RequestId, TransientFiles, Workspace};
use crate::pipeline::{converter, normalize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

/// Convert one uploaded document and fold any failure into the result.
///
/// # Arguments
/// * `filename`: client-supplied name; only its sanitised final component is used
/// * `bytes`:    raw document content
/// * `config`:   conversion configuration
///
/// # Returns
/// `{html, folder}` on success; `{error}` when allocation, conversion or the
/// HTML read fails. Vector images that fail to rasterise do not make the
/// request fail.
pub async fn handle_upload(
    filename: &str,
    bytes: &[u8],
    config: &ConversionConfig,
) -> ConversionResult {
    match convert_upload(filename, bytes, config).await {
        Ok(output) => ConversionResult::Converted(output),
        Err(e) => ConversionResult::Failed {
            error: e.to_string(),
        },
    }
}

/// Convert one uploaded document.
///
/// # Errors
/// Returns `Err(ConvertError)` only for fatal errors:
/// - invalid filename, workspace creation or upload write failure
/// - the converter is missing or exits nonzero
/// - the generated HTML cannot be read
///
/// The input file and intermediate HTML are removed on every path.
pub async fn convert_upload(
    filename: &str,
    bytes: &[u8],
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConvertError> {
    let id = RequestId::generate();
    let span = info_span!("conversion", request_id = %id);

    async move {
        info!("Starting conversion of '{}' ({} bytes)", filename, bytes.len());
        if let Some(ref obs) = config.observer {
            obs.on_request_start(id.as_str(), filename, bytes.len());
        }

        let result = run(id.clone(), filename, bytes, config).await;

        match &result {
            Ok(out) => info!(
                "Conversion complete: {} image(s) rasterised, {} left as-is, {}ms",
                out.media.converted.len(),
                out.media.failed.len(),
                out.duration_ms
            ),
            Err(e) => warn!("Conversion failed: {}", e),
        }
        if let Some(ref obs) = config.observer {
            let msg = result.as_ref().err().map(|e| e.to_string());
            obs.on_request_complete(id.as_str(), msg.as_deref());
        }
        result
    }
    .instrument(span)
    .await
}

/// Convert a document already on disk (CLI entry point).
pub async fn convert_file(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConvertError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await.map_err(|source| ConvertError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    convert_upload(&filename, &bytes, config).await
}

/// Synchronous wrapper around [`handle_upload`].
///
/// Creates a temporary tokio runtime internally.
pub fn handle_upload_sync(
    filename: &str,
    bytes: &[u8],
    config: &ConversionConfig,
) -> ConversionResult {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt.block_on(handle_upload(filename, bytes, config)),
        Err(e) => ConversionResult::Failed {
            error: ConvertError::Internal(format!("Failed to create tokio runtime: {e}"))
                .to_string(),
        },
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run(
    id: RequestId,
    filename: &str,
    bytes: &[u8],
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConvertError> {
    let start = Instant::now();
    let uploads_root =
        std::path::absolute(&config.uploads_root).map_err(|source| ConvertError::Io {
            path: config.uploads_root.clone(),
            source,
        })?;

    // Derive every transient path from the request id before touching disk.
    let transient = TransientFiles::new(&uploads_root, &id, filename)?;

    // ── Step 1: Allocate workspace ───────────────────────────────────────
    let workspace = workspace::allocate_for(&uploads_root, id).await?;
    if let Some(ref obs) = config.observer {
        obs.on_workspace_allocated(workspace.id().as_str(), workspace.path());
    }

    let result = run_in_workspace(&workspace, transient, bytes, config, start).await;
    // Unlike the transient files, the workspace normally survives the
    // request. After a fatal error it is only dropped while still empty:
    // nothing can reference it, and populated ones are left to retention.
    if result.is_err() {
        workspace::discard_if_empty(&workspace).await;
    }
    result
}

async fn run_in_workspace(
    workspace: &Workspace,
    transient: TransientFiles,
    bytes: &[u8],
    config: &ConversionConfig,
    start: Instant,
) -> Result<ConversionOutput, ConvertError> {
    // ── Step 2: Persist upload ───────────────────────────────────────────
    tokio::fs::write(transient.input(), bytes)
        .await
        .map_err(|source| ConvertError::InputWrite {
            path: transient.input().to_path_buf(),
            source,
        })?;
    debug!("Saved upload to {}", transient.input().display());

    // ── Step 3: Convert to HTML ──────────────────────────────────────────
    let html_path = converter::convert(transient.input(), workspace, config).await?;

    // ── Step 4: Rasterise vector media ───────────────────────────────────
    let media = normalize::normalize(workspace, &html_path, config).await;

    // ── Step 5: Read generated HTML ──────────────────────────────────────
    let html = tokio::fs::read_to_string(&html_path)
        .await
        .map_err(|source| ConvertError::HtmlRead {
            path: html_path.clone(),
            source,
        })?;

    // ── Step 6: Point media references at the served workspace ───────────
    let media_url = config.media_url(workspace.id().as_str());
    let html = config.rewriter.rewrite_prefix(&html, &media_url);

    // ── Step 7: Clean up transient files ─────────────────────────────────
    drop(transient);

    Ok(ConversionOutput {
        html,
        folder: workspace.path().display().to_string(),
        workspace_id: workspace.id().to_string(),
        workspace: workspace.path().to_path_buf(),
        media,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_filename_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConversionConfig::builder()
            .uploads_root(dir.path())
            .build()
            .unwrap();

        let result = handle_upload("../", b"PK", &config).await;
        assert!(result.error().unwrap().contains("Invalid upload filename"));
        assert!(!dir.path().join("output_images").exists());
    }

    #[tokio::test]
    async fn missing_converter_reports_error_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConversionConfig::builder()
            .uploads_root(dir.path())
            .converter(dir.path().join("no-pandoc-here"))
            .build()
            .unwrap();

        let result = handle_upload("report.docx", b"PK\x03\x04", &config).await;
        let error = result.error().expect("must fail");
        assert!(error.contains("no-pandoc-here"), "got: {error}");

        // Only the (now empty) output_images directory may remain.
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(leftovers, vec!["output_images".to_string()]);
        assert_eq!(std::fs::read_dir(dir.path().join("output_images")).unwrap().count(), 0);
    }

    #[test]
    fn sync_wrapper_runs_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConversionConfig::builder()
            .uploads_root(dir.path())
            .converter(dir.path().join("no-pandoc-here"))
            .build()
            .unwrap();
        let result = handle_upload_sync("a.docx", b"", &config);
        assert!(!result.is_converted());
    }
}
