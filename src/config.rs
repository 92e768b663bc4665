//! Configuration types for document-to-HTML conversion.
//!
//! All pipeline behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. One config is shared (behind an `Arc`)
//! by every request the server handles; nothing in it is mutated per request.

use crate::error::ConvertError;
use crate::observer::{ConversionObserver, Observer};
use crate::pipeline::rewrite::{LiteralRewriter, ReferenceRewriter};
use crate::pipeline::workspace::OUTPUT_IMAGES_DIR;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for the upload → HTML pipeline.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use docx2html::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .uploads_root("/var/lib/docx2html")
///     .public_base_url("http://localhost:5000")
///     .rasterizer("/usr/bin/inkscape")
///     .build()
///     .unwrap();
/// assert!(config.media_url("1_abc").starts_with("http://localhost:5000/uploads/"));
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Shared uploads area. Default: `uploads`.
    ///
    /// Transient input and HTML files live directly in it; workspaces live
    /// under `<uploads_root>/output_images/<id>/`.
    pub uploads_root: PathBuf,

    /// URL path under which the uploads area is served. Default: `/uploads`.
    ///
    /// Must start with `/`. The HTTP server mounts the workspaces at
    /// `<public_prefix>/output_images`, and the prefix rewrite emits the same
    /// path, so the two can never drift apart.
    pub public_prefix: String,

    /// Optional origin prepended to rewritten image URLs, e.g.
    /// `http://localhost:5000`. Default: none (root-relative URLs).
    pub public_base_url: Option<String>,

    /// Document converter executable. Default: `pandoc`.
    pub converter: PathBuf,

    /// Source format passed to the converter's `-f`. Default: `docx`.
    pub source_format: String,

    /// Vector rasteriser executable. Default: `inkscape`.
    pub rasterizer: PathBuf,

    /// Raster format (and file extension) produced by the rasteriser. Default: `png`.
    pub raster_format: String,

    /// Extensions (lowercase, without dot) treated as vector media. Default: `wmf`, `emf`.
    pub vector_extensions: Vec<String>,

    /// Largest accepted upload in bytes (HTTP server only). Default: 50 MiB.
    pub max_upload_bytes: usize,

    /// Workspaces older than this are removed by the retention sweep.
    /// Default: none (workspaces are kept forever).
    pub workspace_max_age_secs: Option<u64>,

    /// Event sink for per-request lifecycle events.
    pub observer: Option<Observer>,

    /// HTML reference rewriting strategy. Default: [`LiteralRewriter`].
    pub rewriter: Arc<dyn ReferenceRewriter>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            uploads_root: PathBuf::from("uploads"),
            public_prefix: "/uploads".to_string(),
            public_base_url: None,
            converter: PathBuf::from("pandoc"),
            source_format: "docx".to_string(),
            rasterizer: PathBuf::from("inkscape"),
            raster_format: "png".to_string(),
            vector_extensions: vec!["wmf".to_string(), "emf".to_string()],
            max_upload_bytes: 50 * 1024 * 1024,
            workspace_max_age_secs: None,
            observer: None,
            rewriter: Arc::new(LiteralRewriter),
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("uploads_root", &self.uploads_root)
            .field("public_prefix", &self.public_prefix)
            .field("public_base_url", &self.public_base_url)
            .field("converter", &self.converter)
            .field("source_format", &self.source_format)
            .field("rasterizer", &self.rasterizer)
            .field("raster_format", &self.raster_format)
            .field("vector_extensions", &self.vector_extensions)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("workspace_max_age_secs", &self.workspace_max_age_secs)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn ConversionObserver>"))
            .finish_non_exhaustive()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Root directory holding every request workspace.
    pub fn workspaces_root(&self) -> PathBuf {
        self.uploads_root.join(OUTPUT_IMAGES_DIR)
    }

    /// URL path at which workspaces are served, e.g. `/uploads/output_images`.
    pub fn media_route(&self) -> String {
        format!(
            "{}/{}",
            self.public_prefix.trim_end_matches('/'),
            OUTPUT_IMAGES_DIR
        )
    }

    /// Absolute URL prefix for one workspace's media, ending in `/`.
    ///
    /// `[base_url]<public_prefix>/output_images/<workspace_id>/`
    pub fn media_url(&self, workspace_id: &str) -> String {
        let base = self
            .public_base_url
            .as_deref()
            .map(|b| b.trim_end_matches('/'))
            .unwrap_or("");
        format!("{}{}/{}/", base, self.media_route(), workspace_id)
    }

    /// Whether `ext` (any case, no dot) names a vector media format.
    pub fn is_vector_extension(&self, ext: &str) -> bool {
        self.vector_extensions
            .iter()
            .any(|v| v.eq_ignore_ascii_case(ext))
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl fmt::Debug for ConversionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ConversionConfigBuilder {
    pub fn uploads_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.uploads_root = root.into();
        self
    }

    pub fn public_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.public_prefix = prefix.into();
        self
    }

    pub fn public_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.public_base_url = Some(url.into());
        self
    }

    pub fn converter(mut self, program: impl Into<PathBuf>) -> Self {
        self.config.converter = program.into();
        self
    }

    pub fn source_format(mut self, format: impl Into<String>) -> Self {
        self.config.source_format = format.into();
        self
    }

    pub fn rasterizer(mut self, program: impl Into<PathBuf>) -> Self {
        self.config.rasterizer = program.into();
        self
    }

    pub fn raster_format(mut self, format: impl Into<String>) -> Self {
        self.config.raster_format = format.into().to_ascii_lowercase();
        self
    }

    pub fn vector_extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.vector_extensions = exts
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn workspace_max_age_secs(mut self, secs: u64) -> Self {
        self.config.workspace_max_age_secs = Some(secs);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn ConversionObserver>) -> Self {
        self.config.observer = Some(observer);
        self
    }

    pub fn rewriter(mut self, rewriter: Arc<dyn ReferenceRewriter>) -> Self {
        self.config.rewriter = rewriter;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConvertError> {
        let c = &self.config;
        if !c.public_prefix.starts_with('/') {
            return Err(ConvertError::InvalidConfig(format!(
                "public prefix must start with '/', got '{}'",
                c.public_prefix
            )));
        }
        if let Some(ref base) = c.public_base_url {
            if !(base.starts_with("http://") || base.starts_with("https://")) {
                return Err(ConvertError::InvalidConfig(format!(
                    "public base URL must be http(s), got '{base}'"
                )));
            }
        }
        if c.source_format.trim().is_empty() {
            return Err(ConvertError::InvalidConfig(
                "source format must not be empty".into(),
            ));
        }
        if c.raster_format.trim().is_empty() {
            return Err(ConvertError::InvalidConfig(
                "raster format must not be empty".into(),
            ));
        }
        if c.vector_extensions.iter().any(|e| e.is_empty()) {
            return Err(ConvertError::InvalidConfig(
                "vector extensions must not be empty strings".into(),
            ));
        }
        if c.is_vector_extension(&c.raster_format) {
            return Err(ConvertError::InvalidConfig(format!(
                "raster format '{}' is also listed as a vector extension",
                c.raster_format
            )));
        }
        if c.max_upload_bytes == 0 {
            return Err(ConvertError::InvalidConfig(
                "max upload size must be ≥ 1 byte".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_served_layout() {
        let c = ConversionConfig::default();
        assert_eq!(c.media_route(), "/uploads/output_images");
        assert_eq!(c.media_url("17_ab"), "/uploads/output_images/17_ab/");
        assert_eq!(c.workspaces_root(), PathBuf::from("uploads/output_images"));
    }

    #[test]
    fn base_url_is_prepended_once() {
        let c = ConversionConfig::builder()
            .public_base_url("http://localhost:5000/")
            .public_prefix("/files/")
            .build()
            .unwrap();
        assert_eq!(
            c.media_url("1_x"),
            "http://localhost:5000/files/output_images/1_x/"
        );
    }

    #[test]
    fn vector_extensions_are_normalised() {
        let c = ConversionConfig::builder()
            .vector_extensions([".WMF", "Emf", "svg"])
            .build()
            .unwrap();
        assert!(c.is_vector_extension("wmf"));
        assert!(c.is_vector_extension("EMF"));
        assert!(c.is_vector_extension("svg"));
        assert!(!c.is_vector_extension("png"));
    }

    #[test]
    fn rejects_relative_prefix() {
        let err = ConversionConfig::builder()
            .public_prefix("uploads")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConvertError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_non_http_base_url() {
        assert!(ConversionConfig::builder()
            .public_base_url("ftp://example.com")
            .build()
            .is_err());
    }

    #[test]
    fn rejects_raster_format_listed_as_vector() {
        let err = ConversionConfig::builder()
            .vector_extensions(["wmf", "png"])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("png"));
    }

    #[test]
    fn rejects_zero_upload_limit() {
        assert!(ConversionConfig::builder().max_upload_bytes(0).build().is_err());
    }
}
