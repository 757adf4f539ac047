//! CLI binary for course-extract.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, runs the batch and prints or exports the table.

use anyhow::{Context, Result};
use clap::Parser;
use course_extract::table::{page_bounds, DEFAULT_PAGE_SIZE, PAGE_SIZE_OPTIONS};
use course_extract::{
    collect_images, CourseRecord, ExtractionConfig, ExtractionProgressCallback, Extractor, Field,
    ProgressCallback, ResultTable, Session,
};
use console::Term;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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

/// Terminal progress callback: a live bar plus one log line per image.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start time of the image currently in flight.
    started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self) -> f64 {
        self.started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting course details from {total} images…"))
        ));
    }

    fn on_image_start(&self, _index: usize, _total: usize, name: &str) {
        if let Ok(mut s) = self.started.lock() {
            *s = Some(Instant::now());
        }
        self.bar.set_message(name.to_string());
    }

    fn on_image_complete(&self, index: usize, total: usize, record: &CourseRecord) {
        let elapsed = self.elapsed_secs();
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<32}  {}  {}",
            green("✓"),
            index,
            total,
            record.source_file,
            dim(&format!("{}/7 fields", record.fields.filled())),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_image_error(&self, index: usize, total: usize, name: &str, error: &str) {
        let elapsed = self.elapsed_secs();
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 80 {
            let cut: String = error.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<32}  {}  {}",
            red("✗"),
            index,
            total,
            name,
            red(&msg),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let failed = total.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} images extracted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} images extracted  ({} with empty rows)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract every PNG/JPEG in a folder into extracted_courses.csv
  course-extract ads/

  # A few files, results printed and written to a custom path
  course-extract flyer1.jpg flyer2.png -o courses.csv

  # Second page of 5 images from a folder, no pacing
  course-extract ads/ --page 2 --page-size 5 --pace-ms 0

  # JSON instead of CSV
  course-extract ads/ --json -o courses.json

  # Use another vision provider through edgequake-llm
  course-extract --provider openai --model gpt-4.1-mini ads/

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY              Gemini API key (used when --api-key is absent)
  COURSE_EXTRACT_MODEL        Model ID (default gemini-1.5-flash)
  COURSE_EXTRACT_PROVIDER     edgequake-llm provider name; omit for Gemini
  COURSE_EXTRACT_OUTPUT       Export path
  COURSE_EXTRACT_PACE_MS      Delay between images in milliseconds
  RUST_LOG                    Override log filter (e.g. course_extract=debug)

Other providers read their own keys (OPENAI_API_KEY, ANTHROPIC_API_KEY, …)
from the environment.
"#;

/// Extract course details from advertisement images using a Vision LLM.
#[derive(Parser, Debug)]
#[command(
    name = "course-extract",
    version,
    about = "Extract course details from advertisement images using a Vision LLM",
    long_about = "Send each course advertisement image to a vision model and collect the \
course name, duration, start date, class days, fee, fee type and outline into one table. \
Every image produces exactly one row; images the model cannot read produce an empty row.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Image files (PNG/JPEG) or directories containing them.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// API key for the Gemini client. Prompted for when omitted on a terminal.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Vision model ID.
    #[arg(long, env = "COURSE_EXTRACT_MODEL", default_value = course_extract::config::DEFAULT_MODEL)]
    model: String,

    /// edgequake-llm provider: openai, anthropic, ollama, … (default: built-in Gemini).
    #[arg(long, env = "COURSE_EXTRACT_PROVIDER")]
    provider: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "COURSE_EXTRACT_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens per image.
    #[arg(long, env = "COURSE_EXTRACT_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// Per-image model call timeout in seconds.
    #[arg(long, env = "COURSE_EXTRACT_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Delay between images in milliseconds (0 disables).
    #[arg(long, env = "COURSE_EXTRACT_PACE_MS", default_value_t = 3000)]
    pace_ms: u64,

    /// Always call the model, even for images already seen in this run.
    #[arg(long)]
    no_cache: bool,

    /// Path to a text file containing a custom extraction prompt.
    #[arg(long, env = "COURSE_EXTRACT_PROMPT")]
    prompt_file: Option<PathBuf>,

    /// Only process this page of the input list (1-based).
    #[arg(long)]
    page: Option<usize>,

    /// Images per page when --page is given.
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, value_parser = parse_page_size)]
    page_size: usize,

    /// Export path.
    #[arg(short, long, env = "COURSE_EXTRACT_OUTPUT", default_value = "extracted_courses.csv")]
    output: PathBuf,

    /// Export JSON instead of CSV.
    #[arg(long, env = "COURSE_EXTRACT_JSON")]
    json: bool,

    /// Do not print the per-image record blocks.
    #[arg(long)]
    no_print: bool,

    /// Disable progress bar.
    #[arg(long, env = "COURSE_EXTRACT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "COURSE_EXTRACT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "COURSE_EXTRACT_QUIET")]
    quiet: bool,
}

fn parse_page_size(s: &str) -> Result<usize, String> {
    let n: usize = s.parse().map_err(|e| format!("{e}"))?;
    if PAGE_SIZE_OPTIONS.contains(&n) {
        Ok(n)
    } else {
        Err(format!("page size must be one of {:?}", PAGE_SIZE_OPTIONS))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar covers what INFO logs would say.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
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

    // ── Session ──────────────────────────────────────────────────────────
    let uses_gemini = cli
        .provider
        .as_deref()
        .map_or(true, |p| p.eq_ignore_ascii_case("gemini"));
    let secret = match cli.api_key.clone() {
        Some(key) => Some(key),
        None if uses_gemini => prompt_for_key()?,
        // Other providers read their own key from the environment; the
        // session credential is never sent.
        None => Some("env".to_string()),
    };
    let session = Arc::new(
        Session::from_optional(secret)
            .context("An API key is required: pass --api-key or set GEMINI_API_KEY")?,
    );

    // ── Inputs ───────────────────────────────────────────────────────────
    let all = collect_images(&cli.inputs).context("Failed to list input images")?;
    let sources = match cli.page {
        Some(page) => {
            let bounds = page_bounds(all.len(), page, cli.page_size);
            all[bounds].to_vec()
        }
        None => all,
    };
    if sources.is_empty() {
        anyhow::bail!("No PNG or JPEG images found in the given inputs");
    }

    // ── Build config and run ─────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;
    let extractor = Extractor::new(session, config).context("Failed to set up the model")?;

    let started = Instant::now();
    let mut table = ResultTable::new();
    let outcomes = extractor.extract_into(&sources, &mut table).await;

    if !cli.quiet && !cli.no_print {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        for record in &table {
            write_record_block(&mut handle, record).context("Failed to write to stdout")?;
        }
    }

    // ── Export ───────────────────────────────────────────────────────────
    let exported = if cli.json {
        table.write_json(&cli.output).await
    } else {
        table.write_csv(&cli.output).await
    };
    exported.context("Export failed")?;

    if !cli.quiet {
        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        let cached = outcomes.iter().filter(|o| o.from_cache).count();
        let tokens_in: usize = outcomes.iter().map(|o| o.input_tokens).sum();
        let tokens_out: usize = outcomes.iter().map(|o| o.output_tokens).sum();
        eprintln!(
            "{}  {}/{} images  {}ms  →  {}",
            if failed == 0 { green("✔") } else { cyan("⚠") },
            outcomes.len() - failed,
            outcomes.len(),
            started.elapsed().as_millis(),
            bold(&cli.output.display().to_string()),
        );
        eprintln!(
            "   {} tokens in  /  {} tokens out  /  {} cached",
            dim(&tokens_in.to_string()),
            dim(&tokens_out.to_string()),
            dim(&cached.to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .model(cli.model.clone())
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .api_timeout_secs(cli.api_timeout)
        .pace_ms(cli.pace_ms)
        .cache_results(!cli.no_cache);

    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }

    if let Some(ref path) = cli.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Ask for the key on an interactive terminal, without echoing it.
/// `None` when stdin is piped.
fn prompt_for_key() -> Result<Option<String>> {
    if !io::stdin().is_terminal() {
        return Ok(None);
    }
    let term = Term::stderr();
    term.write_str("Gemini API key: ")
        .context("Failed to write to terminal")?;
    let key = term.read_secure_line().context("Failed to read API key")?;
    Ok(clean_key(&key))
}

/// Typed keys often carry a stray space or newline; blank means no key.
fn clean_key(raw: &str) -> Option<String> {
    let key = raw.trim();
    (!key.is_empty()).then(|| key.to_string())
}

/// One labelled block per record, `null` shown as a dash.
fn write_record_block(out: &mut impl Write, record: &CourseRecord) -> io::Result<()> {
    writeln!(out, "{}", bold(&record.source_file))?;
    for field in Field::ALL {
        let value = record.get(field).unwrap_or("-");
        writeln!(out, "  {:<26} {}", format!("{}:", field.key()), value)?;
    }
    writeln!(out)
}
