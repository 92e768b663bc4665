//! Workspace allocation and request-scoped naming.
//!
//! Every upload gets one [`RequestId`] at entry: `<unix-millis>_<uuid>`. It
//! names the workspace directory (`<uploads>/output_images/<id>/`) **and**
//! the transient input/HTML files (`<uploads>/<id>_<filename>[.html]`), so
//! two concurrent uploads of `report.docx` never touch the same path.
//!
//! The millisecond prefix keeps directory listings sorted by creation time
//! and lets the retention sweep age workspaces without reading metadata; the
//! UUID makes ids distinct even when two requests share a clock tick.

use crate::error::ConvertError;
use crate::pipeline::converter::{html_path_for, HTML_SUFFIX};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use uuid::Uuid;

/// Directory under the uploads root that holds every workspace.
pub const OUTPUT_IMAGES_DIR: &str = "output_images";

/// Longest single path component common filesystems accept (NAME_MAX).
const MAX_FILE_NAME_BYTES: usize = 255;

static RE_REQUEST_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{13,})_([0-9a-f]{32})$").unwrap());

static RE_UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]").unwrap());

/// Correlation identifier for one request; also the workspace directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh identifier from the current time and a random UUID.
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        Self(format!("{:013}_{}", millis, Uuid::new_v4().simple()))
    }

    /// Parse an existing workspace directory name.
    ///
    /// Returns `None` for anything this crate did not generate.
    pub fn parse(s: &str) -> Option<Self> {
        RE_REQUEST_ID.is_match(s).then(|| Self(s.to_string()))
    }

    /// Creation time encoded in the identifier, in milliseconds since the epoch.
    pub fn created_at_millis(&self) -> u64 {
        RE_REQUEST_ID
            .captures(&self.0)
            .and_then(|c| c[1].parse().ok())
            .unwrap_or(0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A request-scoped media directory.
///
/// Outlives the request on purpose: the returned HTML links into it.
#[derive(Debug, Clone)]
pub struct Workspace {
    id: RequestId,
    path: PathBuf,
}

impl Workspace {
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The shared uploads area this workspace belongs to.
    ///
    /// `<uploads>/output_images/<id>` → `<uploads>`.
    pub fn uploads_root(&self) -> &Path {
        self.path
            .parent()
            .and_then(Path::parent)
            .unwrap_or_else(|| Path::new("."))
    }
}

/// Allocate a workspace with a freshly generated identifier.
pub async fn allocate(uploads_root: &Path) -> Result<Workspace, ConvertError> {
    allocate_for(uploads_root, RequestId::generate()).await
}

/// Create `<uploads_root>/output_images/<id>/`, including missing parents.
pub async fn allocate_for(uploads_root: &Path, id: RequestId) -> Result<Workspace, ConvertError> {
    let path = uploads_root.join(OUTPUT_IMAGES_DIR).join(id.as_str());
    tokio::fs::create_dir_all(&path)
        .await
        .map_err(|source| ConvertError::WorkspaceCreate {
            path: path.clone(),
            source,
        })?;
    debug!("Allocated workspace {}", path.display());
    Ok(Workspace { id, path })
}

/// Remove a workspace only if nothing was extracted into it.
///
/// Used on fatal errors: an empty workspace is never referenced by any
/// returned HTML, while a populated one is left for the retention sweep.
pub async fn discard_if_empty(workspace: &Workspace) {
    match tokio::fs::remove_dir(workspace.path()).await {
        Ok(()) => debug!("Removed empty workspace {}", workspace.path().display()),
        Err(e) => debug!(
            "Keeping workspace {}: {}",
            workspace.path().display(),
            e
        ),
    }
}

/// Reduce an uploaded filename to a single safe path component.
///
/// Keeps only the final component (no directory traversal), replaces
/// characters outside `[A-Za-z0-9._-]` with `_`, and rejects names that are
/// empty or consist only of dots.
pub fn sanitize_filename(name: &str) -> Result<String, ConvertError> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned = RE_UNSAFE_FILENAME_CHARS.replace_all(last, "_").into_owned();
    if cleaned.trim_matches('.').is_empty() {
        return Err(ConvertError::InvalidFilename {
            name: name.to_string(),
        });
    }
    Ok(cleaned)
}

/// Shorten a sanitised name to at most `max` bytes, keeping its extension.
///
/// The input is ASCII (see [`sanitize_filename`]), so byte slicing is safe.
/// An extension too long to keep alongside a one-byte stem is cut with the rest.
fn fit_filename(name: &str, max: usize) -> String {
    if name.len() <= max {
        return name.to_string();
    }
    match name.rfind('.') {
        Some(dot) if dot > 0 && name.len() - dot < max => {
            let ext = &name[dot..];
            format!("{}{}", &name[..max - ext.len()], ext)
        }
        _ => name[..max].to_string(),
    }
}

/// The input document and intermediate HTML for one request.
///
/// Both files are removed when this guard drops, so cleanup runs on success,
/// on error, on panic, and when a server task is cancelled mid-request.
#[derive(Debug)]
pub struct TransientFiles {
    input: PathBuf,
    html: PathBuf,
}

impl TransientFiles {
    /// Derive `<uploads>/<id>_<filename>` and `<uploads>/<id>_<filename>.html`.
    ///
    /// Long names are shortened so the HTML name still fits in one path
    /// component.
    pub fn new(uploads_root: &Path, id: &RequestId, filename: &str) -> Result<Self, ConvertError> {
        let budget = MAX_FILE_NAME_BYTES - id.as_str().len() - 1 - HTML_SUFFIX.len();
        let safe = fit_filename(&sanitize_filename(filename)?, budget);
        let input = uploads_root.join(format!("{}_{}", id, safe));
        let html = html_path_for(&input);
        Ok(Self { input, html })
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn html(&self) -> &Path {
        &self.html
    }
}

impl Drop for TransientFiles {
    fn drop(&mut self) {
        for path in [&self.input, &self.html] {
            match std::fs::remove_file(path) {
                Ok(()) => debug!("Removed transient file {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }
}
