//! CLI binary for docx2html.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use docx2html::{
    convert_file, sweep_workspaces, tools, ConversionConfig, ConversionObserver, ConversionResult,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: a spinner while pandoc runs, one line per rasterised
/// or skipped image.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ConversionObserver for CliObserver {
    fn on_request_start(&self, _request_id: &str, filename: &str, size: usize) {
        self.bar.set_message(format!("{filename} ({size} bytes)"));
    }

    fn on_media_discovered(&self, _request_id: &str, count: usize) {
        if count > 0 {
            self.bar.set_prefix("Rasterising");
            self.bar.set_message(format!("{count} vector image(s)"));
        }
    }

    fn on_media_converted(&self, _request_id: &str, from: &Path, to: &Path) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            from.display(),
            dim(&format!("→ {}", to.display()))
        ));
    }

    fn on_media_failed(&self, _request_id: &str, file: &Path, error: &str) {
        // Truncate very long diagnostics to keep output tidy.
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {}  {}", red("✗"), file.display(), red(&msg)));
    }

    fn on_request_complete(&self, _request_id: &str, _error: Option<&str>) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a document, HTML on stdout
  docx2html convert report.docx

  # Same, as the JSON the upload endpoint returns
  docx2html convert --json report.docx

  # Run the upload server on port 5000
  docx2html serve --port 5000 --base-url http://localhost:5000

  # Delete workspaces older than a day
  docx2html sweep --max-age 86400

  # Verify pandoc and inkscape are installed
  docx2html check

ENVIRONMENT VARIABLES:
  DOCX2HTML_UPLOADS      Uploads area (default: uploads)
  DOCX2HTML_PANDOC       pandoc executable
  DOCX2HTML_INKSCAPE     inkscape executable
  DOCX2HTML_PREFIX       URL path the uploads area is served under
  DOCX2HTML_BASE_URL     Origin prepended to image URLs
  RUST_LOG               Overrides --verbose / --quiet log filtering
"#;

/// Convert Word documents to servable HTML via pandoc and inkscape.
#[derive(Parser, Debug)]
#[command(
    name = "docx2html",
    version,
    about = "Convert Word documents to servable HTML via pandoc and inkscape",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    config: ConfigArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCX2HTML_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCX2HTML_QUIET")]
    quiet: bool,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// Uploads area holding transient files and output_images/.
    #[arg(long, global = true, env = "DOCX2HTML_UPLOADS", default_value = "uploads")]
    uploads_dir: PathBuf,

    /// pandoc executable.
    #[arg(long, global = true, env = "DOCX2HTML_PANDOC", default_value = "pandoc")]
    pandoc: PathBuf,

    /// inkscape executable.
    #[arg(long, global = true, env = "DOCX2HTML_INKSCAPE", default_value = "inkscape")]
    inkscape: PathBuf,

    /// Source format handed to pandoc's -f.
    #[arg(long, global = true, env = "DOCX2HTML_FROM", default_value = "docx")]
    from: String,

    /// URL path the uploads area is served under.
    #[arg(long, global = true, env = "DOCX2HTML_PREFIX", default_value = "/uploads")]
    public_prefix: String,

    /// Origin prepended to rewritten image URLs (e.g. http://localhost:5000).
    #[arg(long, global = true, env = "DOCX2HTML_BASE_URL")]
    base_url: Option<String>,

    /// Vector extensions to rasterise (comma separated).
    #[arg(long, global = true, env = "DOCX2HTML_VECTOR_EXTS", value_delimiter = ',', default_values = ["wmf", "emf"])]
    vector_exts: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert one document from disk.
    Convert {
        /// Path to the document.
        input: PathBuf,

        /// Write HTML to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the {html, folder} / {error} JSON instead of raw HTML.
        #[arg(long)]
        json: bool,
    },

    /// Run the HTTP upload server.
    Serve {
        /// Address to bind.
        #[arg(long, env = "DOCX2HTML_HOST", default_value = "0.0.0.0")]
        host: std::net::IpAddr,

        /// Port to bind.
        #[arg(short, long, env = "DOCX2HTML_PORT", default_value_t = 5000)]
        port: u16,

        /// Largest accepted upload in MiB.
        #[arg(long, env = "DOCX2HTML_MAX_UPLOAD_MB", default_value_t = 50)]
        max_upload_mb: usize,

        /// Periodically delete workspaces older than this many seconds.
        #[arg(long, env = "DOCX2HTML_RETENTION_SECS")]
        retention_secs: Option<u64>,
    },

    /// Delete workspaces older than --max-age seconds.
    Sweep {
        #[arg(long, env = "DOCX2HTML_RETENTION_SECS")]
        max_age: u64,
    },

    /// Check that pandoc and inkscape can be launched.
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers progress for `convert`; keep library INFO logs for
    // the long-running server where there is no spinner.
    let is_convert = matches!(cli.command, Command::Convert { .. });
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || is_convert {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Convert {
            ref input,
            ref output,
            json,
        } => {
            let show_progress = !cli.quiet && !cli.verbose && !json;
            let mut builder = config_builder(&cli.config);
            if show_progress {
                builder = builder.observer(CliObserver::new() as Arc<dyn ConversionObserver>);
            }
            let config = builder.build().context("Invalid configuration")?;
            run_convert(&config, input, output.as_deref(), json, cli.quiet).await
        }

        Command::Serve {
            host,
            port,
            max_upload_mb,
            retention_secs,
        } => {
            let mut builder = config_builder(&cli.config)
                .max_upload_bytes(max_upload_mb.saturating_mul(1024 * 1024));
            if let Some(secs) = retention_secs {
                builder = builder.workspace_max_age_secs(secs);
            }
            let config = builder.build().context("Invalid configuration")?;
            run_server(config, std::net::SocketAddr::new(host, port)).await
        }

        Command::Sweep { max_age } => {
            let config = config_builder(&cli.config)
                .build()
                .context("Invalid configuration")?;
            let report = sweep_workspaces(&config.workspaces_root(), Duration::from_secs(max_age))
                .await
                .context("Retention sweep failed")?;
            if !cli.quiet {
                eprintln!(
                    "{} removed {} workspace(s), kept {}",
                    green("✔"),
                    bold(&report.removed.len().to_string()),
                    report.kept
                );
                for err in &report.errors {
                    eprintln!("  {} {}", red("✗"), err);
                }
            }
            Ok(())
        }

        Command::Check => {
            let config = config_builder(&cli.config)
                .build()
                .context("Invalid configuration")?;
            let statuses = tools::check_tools(&config).await;
            let mut all_ok = true;
            for s in &statuses {
                match (&s.version, &s.error) {
                    (Some(v), _) => println!("{} {:<10} {}  {}", green("✓"), s.role, bold(&s.program), dim(v)),
                    (None, err) => {
                        all_ok = false;
                        println!(
                            "{} {:<10} {}  {}",
                            red("✗"),
                            s.role,
                            bold(&s.program),
                            red(err.as_deref().unwrap_or("unavailable"))
                        );
                    }
                }
            }
            if !all_ok {
                anyhow::bail!("one or more external tools are unavailable");
            }
            Ok(())
        }
    }
}

#[cfg(feature = "server")]
async fn run_server(config: ConversionConfig, addr: std::net::SocketAddr) -> Result<()> {
    docx2html::server::serve(config, addr)
        .await
        .context("Server failed")
}

#[cfg(not(feature = "server"))]
async fn run_server(_config: ConversionConfig, _addr: std::net::SocketAddr) -> Result<()> {
    anyhow::bail!("this build of docx2html was compiled without the `server` feature")
}

/// Map shared CLI args to a `ConversionConfigBuilder`.
fn config_builder(args: &ConfigArgs) -> docx2html::ConversionConfigBuilder {
    let mut builder = ConversionConfig::builder()
        .uploads_root(&args.uploads_dir)
        .converter(&args.pandoc)
        .rasterizer(&args.inkscape)
        .source_format(&args.from)
        .public_prefix(&args.public_prefix)
        .vector_extensions(&args.vector_exts);
    if let Some(ref base) = args.base_url {
        builder = builder.public_base_url(base);
    }
    builder
}

async fn run_convert(
    config: &ConversionConfig,
    input: &Path,
    output: Option<&Path>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let result = match convert_file(input, config).await {
        Ok(out) => ConversionResult::Converted(out),
        Err(e) if json => ConversionResult::Failed {
            error: e.to_string(),
        },
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to convert {}", input.display()))
        }
    };

    let body = if json {
        serde_json::to_string_pretty(&result).context("Failed to serialise result")?
    } else {
        match result.output() {
            Some(out) => out.html.clone(),
            None => String::new(),
        }
    };

    match output {
        Some(path) => tokio::fs::write(path, &body)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(body.as_bytes())
                .context("Failed to write to stdout")?;
            if !body.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }

    if let (false, Some(out)) = (quiet, result.output()) {
        eprintln!(
            "{}  {} image(s) rasterised, {} left as-is  {}ms  →  {}",
            if out.media.is_clean() { green("✔") } else { cyan("⚠") },
            out.media.converted.len(),
            out.media.failed.len(),
            out.duration_ms,
            bold(&out.folder),
        );
    }

    match result {
        ConversionResult::Failed { error } => anyhow::bail!(error),
        ConversionResult::Converted(_) => Ok(()),
    }
}
