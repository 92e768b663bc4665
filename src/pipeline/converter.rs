//! Document converter adapter: run pandoc against the saved upload.
//!
//! Pandoc runs with the workspace as its working directory and
//! `--extract-media=.`, so embedded images land in `<workspace>/media/` and
//! the HTML references them by the relative prefix the rewriter expects.
//! Input and output paths are made absolute first for the same reason.

use crate::config::ConversionConfig;
use crate::error::{describe_status, ConvertError};
use crate::pipeline::workspace::Workspace;
use crate::tools;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Suffix appended to the input path to name the generated HTML.
pub const HTML_SUFFIX: &str = ".html";

/// `<input>` → `<input>.html`.
pub fn html_path_for(input: &Path) -> PathBuf {
    let mut s: OsString = input.as_os_str().to_owned();
    s.push(HTML_SUFFIX);
    PathBuf::from(s)
}

/// Convert `input` to HTML, extracting media into `workspace`.
///
/// Returns the path of the generated HTML. Any nonzero exit is
/// [`ConvertError::ConversionFailed`] with pandoc's stderr attached verbatim;
/// the media it may have half-extracted is not inspected here.
pub async fn convert(
    input: &Path,
    workspace: &Workspace,
    config: &ConversionConfig,
) -> Result<PathBuf, ConvertError> {
    let input = absolute(input)?;
    let html = html_path_for(&input);

    let mut cmd = Command::new(&config.converter);
    cmd.current_dir(workspace.path())
        .arg("-f")
        .arg(&config.source_format)
        .arg("-t")
        .arg("html")
        .arg("--extract-media=.")
        .arg("-o")
        .arg(&html)
        .arg(&input)
        .stdin(Stdio::null());

    debug!("Running {:?}", cmd.as_std());
    let output = cmd.output().await.map_err(|source| ConvertError::ToolLaunch {
        tool: tools::display_name(&config.converter),
        source,
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(ConvertError::ConversionFailed {
            status: describe_status(output.status),
            stderr: if stderr.is_empty() {
                "no diagnostic output".to_string()
            } else {
                stderr
            },
        });
    }

    info!("Converted {} → {}", input.display(), html.display());
    Ok(html)
}

fn absolute(path: &Path) -> Result<PathBuf, ConvertError> {
    std::path::absolute(path).map_err(|source| ConvertError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_path_appends_suffix() {
        assert_eq!(
            html_path_for(Path::new("/u/1_x_report.docx")),
            PathBuf::from("/u/1_x_report.docx.html")
        );
    }

    #[tokio::test]
    async fn missing_converter_is_tool_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let ws = crate::pipeline::workspace::allocate(dir.path()).await.unwrap();
        let input = dir.path().join("in.docx");
        std::fs::write(&input, b"PK").unwrap();
        let config = ConversionConfig::builder()
            .converter(dir.path().join("definitely-not-pandoc"))
            .build()
            .unwrap();

        let err = convert(&input, &ws, &config).await.unwrap_err();
        assert!(matches!(err, ConvertError::ToolLaunch { .. }), "got {err:?}");
        assert!(err.to_string().contains("definitely-not-pandoc"));
    }
}
