//! Workspace retention: delete media directories past a maximum age.
//!
//! The pipeline deliberately leaves each workspace behind, since the returned
//! HTML links into it. Without a sweep the uploads area grows forever. The
//! age is read from the workspace id (`<unix-millis>_<uuid>`) rather than
//! filesystem timestamps, which copying or restoring a volume can reset.
//! Directories whose names are not workspace ids are never touched.

use crate::error::ConvertError;
use crate::pipeline::workspace::RequestId;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Summary of one sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    /// Workspaces removed.
    pub removed: Vec<PathBuf>,
    /// Workspaces young enough to keep.
    pub kept: usize,
    /// Entries skipped because they are not workspace directories.
    pub skipped: usize,
    /// Workspaces that were due for removal but could not be deleted.
    pub errors: Vec<String>,
}

/// Remove every workspace under `workspaces_root` older than `max_age`.
///
/// A missing `workspaces_root` is an empty sweep, not an error.
pub async fn sweep_workspaces(
    workspaces_root: &Path,
    max_age: Duration,
) -> Result<SweepReport, ConvertError> {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    sweep_at(workspaces_root, max_age, now_ms).await
}

async fn sweep_at(
    workspaces_root: &Path,
    max_age: Duration,
    now_ms: u64,
) -> Result<SweepReport, ConvertError> {
    let mut report = SweepReport::default();
    let io_err = |source| ConvertError::Io {
        path: workspaces_root.to_path_buf(),
        source,
    };

    let mut entries = match tokio::fs::read_dir(workspaces_root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
        Err(e) => return Err(io_err(e)),
    };
    let cutoff_ms = now_ms.saturating_sub(max_age.as_millis() as u64);

    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let name = entry.file_name();
        let id = name.to_str().and_then(RequestId::parse);
        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        let Some(id) = id.filter(|_| is_dir) else {
            report.skipped += 1;
            continue;
        };

        if id.created_at_millis() >= cutoff_ms {
            report.kept += 1;
            continue;
        }

        let path = entry.path();
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => {
                debug!("Removed expired workspace {}", path.display());
                report.removed.push(path);
            }
            Err(e) => {
                warn!("Failed to remove workspace {}: {}", path.display(), e);
                report.errors.push(format!("{}: {}", path.display(), e));
            }
        }
    }

    info!(
        "Retention sweep: removed {}, kept {}, skipped {}",
        report.removed.len(),
        report.kept,
        report.skipped
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR_MS: u64 = 3_600_000;
    const NOW_MS: u64 = 1_750_000_000_000;

    fn make_workspace(root: &Path, created_ms: u64) -> PathBuf {
        let path = root.join(format!("{created_ms:013}_{}", "0".repeat(32)));
        std::fs::create_dir_all(path.join("media")).unwrap();
        std::fs::write(path.join("media/image1.png"), b"x").unwrap();
        path
    }

    #[tokio::test]
    async fn removes_only_expired_workspaces() {
        let dir = tempfile::tempdir().unwrap();
        let old = make_workspace(dir.path(), NOW_MS - 48 * HOUR_MS);
        let fresh = make_workspace(dir.path(), NOW_MS - HOUR_MS);
        std::fs::create_dir(dir.path().join("not-a-workspace")).unwrap();
        std::fs::write(dir.path().join("stray.txt"), b"x").unwrap();

        let report = sweep_at(dir.path(), Duration::from_secs(24 * 3600), NOW_MS)
            .await
            .unwrap();

        assert_eq!(report.removed, vec![old.clone()]);
        assert_eq!(report.kept, 1);
        assert_eq!(report.skipped, 2);
        assert!(report.errors.is_empty());
        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(dir.path().join("not-a-workspace").exists());
    }

    #[tokio::test]
    async fn missing_root_is_empty_sweep() {
        let dir = tempfile::tempdir().unwrap();
        let report = sweep_workspaces(&dir.path().join("absent"), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(report.removed.is_empty());
        assert_eq!(report.kept + report.skipped, 0);
    }
}
