//! CLI binary for edgequake-kb.
//!
//! A thin shim over the library crate: with no arguments it starts the
//! interactive menu, with `--input` or `--batch` it converts once and exits.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_kb::generate::effective_model;
use edgequake_kb::output::{self, SavePolicy};
use edgequake_kb::retry::AutoRetry;
use edgequake_kb::{
    convert_single, resolve_text_generator, run_batch, summary, BatchProgressCallback,
    DoclingClient, Generator, KbConfig, MenuSystem, NoopProgressCallback, ProgressCallback,
    RetryAdapter, TerminalPrompter,
};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io;
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar with one log line per finished item. Items finish out
/// of order; the bar only counts them.
///
/// The bar stays hidden until a batch starts, so it never draws over the
/// interactive menu.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: ProgressBar::hidden(),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} items  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.reset();
        self.bar.set_draw_target(ProgressDrawTarget::stderr());
        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize, valid: usize, invalid: usize) {
        self.activate_bar(valid);
        self.bar.println(format!(
            "{} {}  {}",
            cyan("◆"),
            bold(&format!("Converting {valid} of {total} inputs…")),
            dim(&format!("{invalid} rejected during validation")),
        ));
    }

    fn on_item_complete(&self, _done: usize, _total: usize, input: &str, output: &Path) {
        self.bar.println(format!(
            "  {} {}  →  {}",
            green("✓"),
            input,
            dim(&output.display().to_string()),
        ));
        self.bar.inc(1);
    }

    fn on_item_error(&self, _done: usize, _total: usize, input: &str, error: &str) {
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar
            .println(format!("  {} {}  {}", red("✗"), input, red(&msg)));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, successful: usize, failed: usize) {
        self.bar.finish_and_clear();
        let total = successful + failed;

        if failed == 0 {
            eprintln!(
                "{} {} inputs converted successfully",
                green("✔"),
                bold(&successful.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} inputs converted  ({} failed)",
                if successful == 0 { red("✘") } else { cyan("⚠") },
                bold(&successful.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Interactive menu
  edgequake-kb

  # Convert one web page
  edgequake-kb --input https://example.com

  # Convert a local document into ./docs
  edgequake-kb --input report.pdf --output-dir docs

  # Batch from CSV, 8 workers, then build toc.md and knowledge_base.md
  edgequake-kb --batch inputs.csv --workers 8 --generate

  # JSON result for scripting
  edgequake-kb --batch inputs.csv --json > result.json

BATCH INPUT:
  Every non-empty cell of every row is one URL or file path. Duplicates are
  converted once. Header rows are not skipped.

CONVERSION SERVICE:
  Documents are converted by docling-serve (POST /v1/convert/source).
  Start one locally with:  docker run -p 5001:5001 quay.io/docling-project/docling-serve

ENVIRONMENT VARIABLES:
  KB_DOCLING_URL          Conversion service base URL
  KB_OUTPUT_DIR           Output directory
  GEMINI_API_KEY          Google Gemini API key (default generation model)
  OPENAI_API_KEY          OpenAI API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Log filter (overrides --verbose / --quiet)
"#;

/// Convert URLs and documents to Markdown and build LLM-ready knowledge bases.
#[derive(Parser, Debug)]
#[command(
    name = "edgequake-kb",
    version,
    about = "Convert URLs and documents to Markdown and build LLM-ready knowledge bases",
    long_about = "Convert web pages, PDF, DOC and DOCX files to Markdown through a docling-serve \
instance, singly or in concurrent batches, then generate a table of contents and a knowledge \
base from the results with any edgequake-llm provider. Run without arguments for the \
interactive menu.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Convert a single URL or PDF/DOC/DOCX file, then exit.
    #[arg(short, long, conflicts_with = "batch")]
    input: Option<String>,

    /// Convert every input listed in a CSV file, then exit.
    #[arg(short, long)]
    batch: Option<PathBuf>,

    /// Directory for converted Markdown files.
    #[arg(short, long, env = "KB_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Retries after the first failed conversion attempt.
    #[arg(long, env = "KB_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Base backoff delay in milliseconds (doubles after each failure).
    #[arg(long, env = "KB_RETRY_DELAY_MS", default_value_t = 1000)]
    retry_delay_ms: u64,

    /// Concurrent conversions in batch mode.
    #[arg(short, long, env = "KB_WORKERS", default_value_t = 5)]
    workers: usize,

    /// docling-serve base URL.
    #[arg(long, env = "KB_DOCLING_URL", default_value = "http://localhost:5001")]
    docling_url: String,

    /// Per-request conversion timeout in seconds.
    #[arg(long, env = "KB_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// Probe URL inputs with a HEAD request before converting.
    #[arg(long, env = "KB_CHECK_URLS")]
    check_urls: bool,

    /// LLM model for generation steps (e.g. gemini/gemini-2.5-pro-preview-03-25).
    #[arg(long, env = "KB_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "KB_PROVIDER")]
    provider: Option<String>,

    /// Lines of generated content previewed before saving (interactive).
    #[arg(long, env = "KB_PREVIEW_LINES", default_value_t = 50)]
    preview_lines: usize,

    /// After a non-interactive run, generate toc.md and knowledge_base.md.
    #[arg(long, env = "KB_GENERATE")]
    generate: bool,

    /// Output the structured result as JSON.
    #[arg(long, env = "KB_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "KB_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "KB_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "KB_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let interactive = cli.input.is_none() && cli.batch.is_none();

    // ── Logging setup ────────────────────────────────────────────────────
    // The menu and the progress bar own the terminal; keep library logs
    // down to warnings unless asked.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else if interactive || show_progress {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build collaborators ──────────────────────────────────────────────
    let config = build_config(&cli)?;
    let client = DoclingClient::new(&config.converter_url, config.converter_timeout())
        .context("Failed to create conversion service client")?;
    let adapter = RetryAdapter::from_config(Arc::new(client), &config);
    let generator = resolve_text_generator(&config)
        .map(|g| Generator::new(g, effective_model(&config)));

    let progress: ProgressCallback = if show_progress {
        CliProgressCallback::new() as Arc<dyn BatchProgressCallback>
    } else {
        Arc::new(NoopProgressCallback)
    };

    // ── Interactive mode ─────────────────────────────────────────────────
    if interactive {
        let mut menu = MenuSystem::new(TerminalPrompter::stdio(), config, adapter)
            .with_progress(progress);
        if let Some(g) = generator {
            menu = menu.with_generator(g);
        }
        let code = menu.run().await;
        std::process::exit(code);
    }

    // ── Single item ──────────────────────────────────────────────────────
    let succeeded = if let Some(ref input) = cli.input {
        if !cli.quiet && !cli.json {
            eprintln!("{} {}", cyan("◆"), bold(&format!("Converting {input}…")));
        }
        let outcome =
            convert_single(input, &config.output_dir, &adapter, &config, &mut AutoRetry).await;

        if cli.json {
            let json =
                serde_json::to_string_pretty(&outcome).context("Failed to serialise outcome")?;
            println!("{json}");
        } else if !cli.quiet {
            let mark = if outcome.success { green("✔") } else { red("✘") };
            eprintln!("{mark} {}", summary::outcome_summary(&outcome).replace('\n', "\n   "));
        }
        outcome.success
    }
    // ── Batch ────────────────────────────────────────────────────────────
    else if let Some(ref csv) = cli.batch {
        let (ok, result) =
            run_batch(csv, &config.output_dir, &adapter, &config, progress.as_ref()).await;

        if cli.json {
            let json =
                serde_json::to_string_pretty(&result).context("Failed to serialise batch result")?;
            println!("{json}");
        } else if !cli.quiet {
            println!("{}", summary::batch_summary(&result));
        }
        ok
    } else {
        false
    };

    // ── Optional generation ──────────────────────────────────────────────
    if cli.generate && succeeded {
        match generator {
            Some(ref g) => generate_all(g, &config.output_dir, cli.quiet).await?,
            None => eprintln!(
                "{} {}",
                cyan("⚠"),
                "No LLM provider configured; skipping generation"
            ),
        }
    }

    std::process::exit(if succeeded { 0 } else { 1 });
}

/// Map CLI args to `KbConfig`.
fn build_config(cli: &Cli) -> Result<KbConfig> {
    let mut builder = KbConfig::builder()
        .max_retries(cli.max_retries)
        .retry_delay_ms(cli.retry_delay_ms)
        .max_workers(cli.workers)
        .converter_url(cli.docling_url.clone())
        .converter_timeout_secs(cli.timeout)
        .check_connectivity(cli.check_urls)
        .output_dir(cli.output_dir.clone())
        .preview_lines(cli.preview_lines);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }

    builder.build().context("Invalid configuration")
}

/// Generate and save the TOC and knowledge base without prompting. Existing
/// files are kept; new ones get the next free `_N` name.
async fn generate_all(generator: &Generator, dir: &Path, quiet: bool) -> Result<()> {
    let steps = [("toc", "table of contents"), ("knowledge_base", "knowledge base")];
    for (stem, label) in steps {
        if !quiet {
            eprintln!("{} {}", cyan("◆"), bold(&format!("Generating {label}…")));
        }
        let content = if stem == "toc" {
            generator.generate_toc(dir).await
        } else {
            generator.generate_kb(dir).await
        };
        let Some(content) = content else {
            eprintln!("{} Failed to generate the {label}; skipping", cyan("⚠"));
            continue;
        };

        let path = output::next_available_path(dir, stem, "md");
        let saved = output::save_document(&path, &content, SavePolicy::Overwrite)
            .await
            .with_context(|| format!("Failed to save {label}"))?;
        if let (Some(p), false) = (saved, quiet) {
            eprintln!("{} {}  →  {}", green("✔"), label, bold(&p.display().to_string()));
        }
    }
    Ok(())
}
