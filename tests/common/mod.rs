//! Shared helpers for integration tests.
//!
//! The pipeline shells out to pandoc and inkscape. Tests substitute small
//! POSIX shell stand-ins so they run anywhere without either tool installed.
//!
//! Fake pandoc reads the "document" line by line:
//!
//! ```text
//! text:Hello          → <p>Hello</p>
//! image:image1.png    → writes media/image1.png, emits <img src="media/image1.png" />
//! dotimage:x.emf      → writes media/x.emf,      emits <img src="./media/x.emf" />
//! CORRUPT             → exits 64 with a diagnostic on stderr
//! TRUNCATED           → exits 65 after the other lines were processed
//! ```
//!
//! Fake inkscape copies its input to `--export-filename=`, except for files
//! whose name contains `broken`, which it refuses with exit status 1, and
//! files whose name contains `blank`, for which it exits 0 without writing.

#![allow(dead_code)]

use docx2html::{ConversionConfig, ConversionConfigBuilder};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const FAKE_PANDOC: &str = r#"#!/bin/sh
out=""
input=""
media="."
while [ $# -gt 0 ]; do
  case "$1" in
    -f|-t) shift ;;
    -o) shift; out="$1" ;;
    --extract-media=*) media="${1#--extract-media=}" ;;
    *) input="$1" ;;
  esac
  shift
done
if grep -q CORRUPT "$input"; then
  echo "Error: could not parse $input: unexpected end of zip archive" >&2
  exit 64
fi
mkdir -p "$media/media"
: > "$out"
while IFS= read -r line || [ -n "$line" ]; do
  case "$line" in
    text:*) echo "<p>${line#text:}</p>" >> "$out" ;;
    image:*)
      name="${line#image:}"
      echo "bytes of $name" > "$media/media/$name"
      echo "<img src=\"media/$name\" />" >> "$out" ;;
    dotimage:*)
      name="${line#dotimage:}"
      echo "bytes of $name" > "$media/media/$name"
      echo "<img src=\"./media/$name\" />" >> "$out" ;;
  esac
done < "$input"
if grep -q TRUNCATED "$input"; then
  echo "Error: document ended unexpectedly" >&2
  exit 65
fi
"#;

const FAKE_INKSCAPE: &str = r#"#!/bin/sh
input="$1"
target=""
for arg in "$@"; do
  case "$arg" in
    --export-filename=*) target="${arg#--export-filename=}" ;;
  esac
done
case "$input" in
  *broken*) echo "** (inkscape): unsupported metafile record in $input" >&2; exit 1 ;;
  *blank*) exit 0 ;;
esac
cp "$input" "$target"
"#;

/// Fake tools, written once per test binary so no script is ever rewritten
/// while another test is exec'ing it (ETXTBSY).
fn fake_tools() -> &'static (PathBuf, PathBuf) {
    static TOOLS: OnceLock<(PathBuf, PathBuf)> = OnceLock::new();
    TOOLS.get_or_init(|| {
        let bin = PathBuf::from(env!("CARGO_TARGET_TMPDIR"))
            .join(format!("docx2html-fake-tools-{}", std::process::id()));
        std::fs::create_dir_all(&bin).unwrap();
        (
            write_script(&bin.join("pandoc"), FAKE_PANDOC),
            write_script(&bin.join("inkscape"), FAKE_INKSCAPE),
        )
    })
}

/// A scratch uploads area plus fake tools.
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub pandoc: PathBuf,
    pub inkscape: PathBuf,
}

impl Harness {
    pub fn new() -> Self {
        let (pandoc, inkscape) = fake_tools().clone();
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
            pandoc,
            inkscape,
        }
    }

    /// Uploads area inside the scratch directory.
    pub fn uploads(&self) -> PathBuf {
        self.dir.path().join("uploads")
    }

    pub fn workspaces(&self) -> PathBuf {
        self.uploads().join("output_images")
    }

    /// Builder pre-wired to this harness.
    pub fn builder(&self) -> ConversionConfigBuilder {
        ConversionConfig::builder()
            .uploads_root(self.uploads())
            .converter(&self.pandoc)
            .rasterizer(&self.inkscape)
    }

    pub fn config(&self) -> ConversionConfig {
        self.builder().build().expect("valid config")
    }

    /// Files (not directories) left directly in the uploads area.
    pub fn stray_files(&self) -> Vec<String> {
        match std::fs::read_dir(self.uploads()) {
            Ok(entries) => entries
                .filter_map(Result::ok)
                .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Workspace directories currently on disk.
    pub fn workspace_dirs(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(self.workspaces()) {
            Ok(entries) => entries
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Build a fake "document" from directive lines.
pub fn document(lines: &[&str]) -> Vec<u8> {
    let mut doc = lines.join("\n");
    doc.push('\n');
    doc.into_bytes()
}

#[cfg(unix)]
fn write_script(path: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    std::fs::write(path, body).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_path_buf()
}

#[cfg(not(unix))]
fn write_script(path: &Path, body: &str) -> PathBuf {
    std::fs::write(path, body).unwrap();
    path.to_path_buf()
}
