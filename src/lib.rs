//! # docx2html
//!
//! Turn an uploaded Word document into HTML that a browser can render
//! straight away, images included.
//!
//! ## Why this crate?
//!
//! pandoc converts `.docx` to HTML well, but its output is not servable as-is:
//! extracted images are referenced by paths relative to wherever pandoc ran,
//! and Word's WMF/EMF metafiles do not display in any browser. This crate
//! orchestrates pandoc and Inkscape per request, keeps concurrent uploads
//! apart on disk, and rewrites the HTML so every image points at a stable
//! served URL.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (filename, bytes)
//!  │
//!  ├─ 1. Workspace  <uploads>/output_images/<millis>_<uuid>/
//!  ├─ 2. Persist    <uploads>/<id>_<filename>
//!  ├─ 3. Convert    pandoc -f docx -t html --extract-media=.
//!  ├─ 4. Normalize  inkscape per WMF/EMF → PNG, rewrite src, delete original
//!  ├─ 5. Read       <uploads>/<id>_<filename>.html
//!  ├─ 6. Rewrite    src="media/…" → src="/uploads/output_images/<id>/media/…"
//!  └─ 7. Cleanup    input + HTML removed; workspace kept for serving
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docx2html::{handle_upload, ConversionConfig, ConversionResult};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .uploads_root("uploads")
//!         .build()?;
//!     let bytes = std::fs::read("report.docx")?;
//!     match handle_upload("report.docx", &bytes, &config).await {
//!         ConversionResult::Converted(out) => println!("{}", out.html),
//!         ConversionResult::Failed { error } => eprintln!("{error}"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `docx2html` binary (clap + anyhow + tracing-subscriber) |
//! | `server` | on      | Axum upload endpoint and static media serving |
//!
//! ## External tools
//!
//! | Tool       | Used for                     | Override              |
//! |------------|------------------------------|-----------------------|
//! | `pandoc`   | docx → HTML + media          | `DOCX2HTML_PANDOC`    |
//! | `inkscape` | WMF/EMF → PNG (1.x CLI)      | `DOCX2HTML_INKSCAPE`  |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod observer;
pub mod output;
pub mod pipeline;
pub mod retention;
#[cfg(feature = "server")]
pub mod server;
pub mod tools;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use convert::{convert_file, convert_upload, handle_upload, handle_upload_sync};
pub use error::{ConvertError, MediaError};
pub use observer::{ConversionObserver, NoopObserver, Observer};
pub use output::{ConversionOutput, ConversionResult, ConvertedMedia, NormalizationReport};
pub use pipeline::rewrite::{LiteralRewriter, ReferenceRewriter};
pub use pipeline::workspace::{RequestId, Workspace};
pub use retention::{sweep_workspaces, SweepReport};
