//! Image reference rewriting inside the generated HTML.
//!
//! Two passes touch the HTML:
//!
//! 1. **Per-file** (driven by [`crate::pipeline::normalize`]): once a vector
//!    image is rasterised, `src="media/image3.emf"` becomes
//!    `src="media/image3.png"`. This pass edits the HTML file on disk.
//! 2. **Prefix** (driven by [`crate::convert`]): every relative
//!    `src="media/…"` becomes `src="/uploads/output_images/<id>/media/…"`,
//!    so a remote client can render the HTML without knowing the server's
//!    filesystem layout. This pass runs on the in-memory string.
//!
//! Both passes are literal substring replacements on quoted `src`
//! attributes, not HTML parsing. They rely on pandoc emitting each image as
//! `src="<relative path>"` with double quotes and no entity escaping in the
//! path. A different converter or an attribute-aware strategy can be swapped
//! in through [`ReferenceRewriter`] without touching the rest of the pipeline.
//!
//! Pandoc writes `media/x` or `./media/x` depending on version when run with
//! `--extract-media=.`; both spellings are recognised.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Relative path prefix the converter uses for extracted media.
pub const MEDIA_REFERENCE_PREFIX: &str = "media/";

/// Strategy for rewriting image references in generated HTML.
pub trait ReferenceRewriter: Send + Sync {
    /// Point every reference to `old_rel` at `new_rel` instead.
    ///
    /// Both paths are relative to the workspace, using `/` separators.
    fn rewrite_reference(&self, html: &str, old_rel: &str, new_rel: &str) -> String;

    /// Replace the converter's relative media prefix with `media_url`
    /// (which ends in `/`).
    fn rewrite_prefix(&self, html: &str, media_url: &str) -> String;
}

/// Quoted-attribute literal substring replacement.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralRewriter;

impl ReferenceRewriter for LiteralRewriter {
    fn rewrite_reference(&self, html: &str, old_rel: &str, new_rel: &str) -> String {
        let dotted = html.replace(
            &format!("src=\"./{old_rel}\""),
            &format!("src=\"./{new_rel}\""),
        );
        dotted.replace(&format!("src=\"{old_rel}\""), &format!("src=\"{new_rel}\""))
    }

    fn rewrite_prefix(&self, html: &str, media_url: &str) -> String {
        let target = format!("src=\"{media_url}{MEDIA_REFERENCE_PREFIX}");
        html.replace(&format!("src=\"./{MEDIA_REFERENCE_PREFIX}"), &target)
            .replace(&format!("src=\"{MEDIA_REFERENCE_PREFIX}"), &target)
    }
}

/// Rewrite one media reference in the request's HTML file on disk.
///
/// `html_path` is the converter's output for this request, known from the
/// input path; it is never searched for, so an upload that is itself named
/// `*.html` cannot be mistaken for it. Returns `Ok(false)` without touching
/// anything when the file does not exist. The file is replaced atomically
/// (temp file + rename), so a concurrent reader never sees a half-written
/// document.
pub async fn rewrite_reference_in_file(
    html_path: &Path,
    old_rel: &str,
    new_rel: &str,
    rewriter: Arc<dyn ReferenceRewriter>,
) -> std::io::Result<bool> {
    let html_path = html_path.to_path_buf();
    let old_rel = old_rel.to_string();
    let new_rel = new_rel.to_string();

    tokio::task::spawn_blocking(move || -> std::io::Result<bool> {
        let html = match std::fs::read_to_string(&html_path) {
            Ok(html) => html,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No HTML at {} yet; skipping reference update", html_path.display());
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        let updated = rewriter.rewrite_reference(&html, &old_rel, &new_rel);

        let dir = html_path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(updated.as_bytes())?;
        tmp.persist(&html_path).map_err(|e| e.error)?;

        debug!("Updated image reference: {} → {}", old_rel, new_rel);
        Ok(true)
    })
    .await
    .map_err(|e| std::io::Error::other(format!("rewrite task panicked: {e}")))?
}
