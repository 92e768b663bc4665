//! Vector media normalisation: rasterise WMF/EMF images with Inkscape.
//!
//! Browsers cannot display Windows metafiles, and Word documents embed them
//! routinely (equations, legacy clip-art). Each vector file pandoc extracts is
//! handed to the rasteriser on its own; a failure is recorded and the loop
//! moves on, so one corrupt metafile never costs the user the whole document.
//!
//! For every discovered file, in order:
//!
//! 1. rasterise `media/x.emf` → `media/x.png`
//! 2. on success, rewrite `src="media/x.emf"` in the request's HTML
//! 3. only after the rewrite succeeded, delete `media/x.emf`
//!
//! A file that fails at step 1 or 2 is left on disk, so its (unrewritten)
//! reference still names a real file.

use crate::config::ConversionConfig;
use crate::error::{describe_status, MediaError};
use crate::output::{ConvertedMedia, NormalizationReport};
use crate::pipeline::rewrite::rewrite_reference_in_file;
use crate::pipeline::workspace::Workspace;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Rasterise every vector image in `workspace`, rewriting references in the
/// request's generated HTML at `html_path`.
///
/// Never fails as a whole: per-file problems are collected in the returned
/// report. Zero vector files is a silent no-op.
pub async fn normalize(
    workspace: &Workspace,
    html_path: &Path,
    config: &ConversionConfig,
) -> NormalizationReport {
    let request_id = workspace.id().as_str();
    let files = discover(workspace.path(), config).await;
    if let Some(ref obs) = config.observer {
        obs.on_media_discovered(request_id, files.len());
    }

    let mut report = NormalizationReport::default();
    if files.is_empty() {
        debug!("No vector media in {}", workspace.path().display());
        return report;
    }
    info!("Found {} vector image(s) to rasterise", files.len());

    for file in files {
        match normalize_one(workspace, html_path, &file, config).await {
            Ok(converted) => {
                if let Some(ref obs) = config.observer {
                    obs.on_media_converted(request_id, Path::new(&converted.from), Path::new(&converted.to));
                }
                report.converted.push(converted);
            }
            Err(e) => {
                warn!("{}", e);
                if let Some(ref obs) = config.observer {
                    obs.on_media_failed(request_id, e.file(), &e.to_string());
                }
                report.failed.push(e);
            }
        }
    }

    info!(
        "Rasterised {}/{} vector image(s)",
        report.converted.len(),
        report.discovered()
    );
    report
}

/// Recursively list vector files under `root`, sorted by path.
async fn discover(root: &Path, config: &ConversionConfig) -> Vec<PathBuf> {
    let root = root.to_path_buf();
    let config = config.clone();
    let span = tracing::Span::current();
    let walk = tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        let mut found = Vec::new();
        for entry in WalkDir::new(&root).sort_by_file_name() {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    let is_vector = entry
                        .path()
                        .extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| config.is_vector_extension(e));
                    if is_vector {
                        found.push(entry.into_path());
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable media entry: {}", e),
            }
        }
        debug!("Scanned {} for vector media: {} found", root.display(), found.len());
        found
    })
    .await;

    walk.unwrap_or_else(|e| {
        warn!("Media scan task panicked: {}", e);
        Vec::new()
    })
}

async fn normalize_one(
    workspace: &Workspace,
    html_path: &Path,
    file: &Path,
    config: &ConversionConfig,
) -> Result<ConvertedMedia, MediaError> {
    let target = file.with_extension(&config.raster_format);
    let old_rel = relative_reference(workspace.path(), file);
    let new_rel = relative_reference(workspace.path(), &target);
    let display_file = PathBuf::from(&old_rel);

    let mut export_filename = OsString::from("--export-filename=");
    export_filename.push(&target);

    debug!("Rasterising {} → {}", file.display(), target.display());
    let output = Command::new(&config.rasterizer)
        .arg(file)
        .arg(export_filename)
        .arg(format!("--export-type={}", config.raster_format))
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| MediaError::LaunchFailed {
            file: display_file.clone(),
            detail: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(MediaError::RasterizationFailed {
            file: display_file,
            status: describe_status(output.status),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        debug!("Rasteriser output for {}: {}", old_rel, stdout.trim());
    }

    if !tokio::fs::try_exists(&target).await.unwrap_or(false) {
        return Err(MediaError::RasterizationFailed {
            file: display_file,
            status: describe_status(output.status),
            stderr: format!("no output written to {}", target.display()),
        });
    }

    rewrite_reference_in_file(html_path, &old_rel, &new_rel, config.rewriter.clone())
        .await
        .map_err(|e| MediaError::ReferenceUpdateFailed {
            file: display_file.clone(),
            detail: e.to_string(),
        })?;

    if let Err(e) = tokio::fs::remove_file(file).await {
        warn!("Rasterised {} but could not delete it: {}", old_rel, e);
    }

    info!("Converted {} → {}", old_rel, new_rel);
    Ok(ConvertedMedia {
        from: old_rel,
        to: new_rel,
    })
}

/// Path of `file` relative to `root`, joined with `/` as HTML references are.
fn relative_reference(root: &Path, file: &Path) -> String {
    let rel = file.strip_prefix(root).unwrap_or(file);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
