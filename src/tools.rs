//! External tool discovery helpers.
//!
//! Both external tools are resolved through `PATH` unless the config names
//! an explicit executable (`DOCX2HTML_PANDOC` / `DOCX2HTML_INKSCAPE` in the
//! CLI). [`probe`] is what `docx2html check` and server start-up use to
//! report a missing tool before the first upload fails on it.

use crate::config::ConversionConfig;
use crate::error::ConvertError;
use serde::Serialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Result of probing one external tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolStatus {
    pub role: &'static str,
    pub program: String,
    /// First line of `--version` output, or `None` when the probe failed.
    pub version: Option<String>,
    pub error: Option<String>,
}

impl ToolStatus {
    pub fn is_available(&self) -> bool {
        self.version.is_some()
    }
}

/// Display form of a configured program, as used in error messages.
pub fn display_name(program: &Path) -> String {
    program.display().to_string()
}

/// Run `<program> --version` and return the first non-empty output line.
pub async fn probe(program: &Path) -> Result<String, ConvertError> {
    let output = Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| ConvertError::ToolLaunch {
            tool: display_name(program),
            source,
        })?;

    let text = if output.stdout.is_empty() {
        String::from_utf8_lossy(&output.stderr).into_owned()
    } else {
        String::from_utf8_lossy(&output.stdout).into_owned()
    };
    let first = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
        .to_string();

    if !output.status.success() {
        return Err(ConvertError::Internal(format!(
            "'{} --version' exited with {}: {}",
            display_name(program),
            crate::error::describe_status(output.status),
            first
        )));
    }

    debug!("{} → {}", display_name(program), first);
    Ok(first)
}

/// Probe both configured tools.
pub async fn check_tools(config: &ConversionConfig) -> Vec<ToolStatus> {
    let mut statuses = Vec::with_capacity(2);
    for (role, program) in [
        ("converter", &config.converter),
        ("rasterizer", &config.rasterizer),
    ] {
        let status = match probe(program).await {
            Ok(version) => ToolStatus {
                role,
                program: display_name(program),
                version: Some(version),
                error: None,
            },
            Err(e) => {
                warn!("{} '{}' unavailable: {}", role, display_name(program), e);
                ToolStatus {
                    role,
                    program: display_name(program),
                    version: None,
                    error: Some(e.to_string()),
                }
            }
        };
        statuses.push(status);
    }
    statuses
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn probe_missing_program_fails() {
        let err = probe(Path::new("/nonexistent/docx2html-tool")).await.unwrap_err();
        assert!(matches!(err, ConvertError::ToolLaunch { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn check_tools_reports_each_role() {
        let config = ConversionConfig::builder()
            .converter("/nonexistent/pandoc")
            .rasterizer("/nonexistent/inkscape")
            .build()
            .unwrap();
        let statuses = check_tools(&config).await;
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].role, "converter");
        assert_eq!(statuses[1].role, "rasterizer");
        assert!(statuses.iter().all(|s| !s.is_available() && s.error.is_some()));
    }
}
