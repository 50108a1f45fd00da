//! CLI binary for paper2speech.
//!
//! A thin shim over the library crate: maps CLI flags to
//! `ConversionConfig`, runs the text-only pipeline (structure analysis +
//! narration assembly), and prints results. Speech synthesis itself needs
//! an injected backend, so the binary stops at the narration stream —
//! which is also the most useful artifact for debugging what a backend
//! would be asked to speak.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use paper2speech::{
    inspect, narrate, Checkpoint, ConversionConfig, ConversionObserver, Observer,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress observer using indicatif ────────────────────────────────────

/// Terminal observer: renders pipeline checkpoints as a 0–100 progress
/// bar, matching the progress values a job record would show.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        bar.set_prefix("Narrating");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ConversionObserver for CliObserver {
    fn on_checkpoint(&self, checkpoint: Checkpoint) {
        self.bar.set_position(u64::from(checkpoint.progress()));
        let msg = match checkpoint {
            Checkpoint::StructureAnalyzed => "structure analyzed",
            Checkpoint::MetadataComposed => "metadata composed",
            Checkpoint::EquationsVerbalized => "equations verbalized",
            Checkpoint::TablesSummarized => "tables summarized",
            Checkpoint::SectionsAppended => "sections appended",
            Checkpoint::AudioSynthesized => "audio synthesized",
            Checkpoint::EvaluationFinished => "evaluation finished",
        };
        self.bar.set_message(msg);
    }

    fn on_extract_warning(&self, page: usize, stage: &str, detail: &str) {
        self.bar.println(format!(
            "  {} page {}: {} degraded — {}",
            dim("⚠"),
            page + 1,
            stage,
            detail
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Narrate a paper to stdout
  paper2speech paper.pdf

  # Narrate to a file
  paper2speech paper.pdf -o narration.txt

  # From a URL
  paper2speech https://arxiv.org/pdf/1706.03762 -o attention.txt

  # Structural model as JSON (sections, equations, tables, figures)
  paper2speech --inspect-only --json paper.pdf

  # Skip the title/author preamble
  paper2speech --no-metadata paper.pdf

SETUP:
  pdfium is loaded from the system library path; set
  PDFIUM_LIB_PATH=/path/to/libpdfium to use a specific copy.
"#;

/// Convert research papers into speakable narration text.
#[derive(Parser, Debug)]
#[command(
    name = "paper2speech",
    version,
    about = "Convert research papers into speakable narration text",
    long_about = "Build a structural model of a research paper (sections, equations, tables, \
figures), verbalize the non-prose elements, and emit the ordered narration stream a \
speech-synthesis backend would be asked to speak.",
    arg_required_else_help = true,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write narration text to this file instead of stdout.
    #[arg(short, long, env = "PAPER2SPEECH_OUTPUT")]
    output: Option<PathBuf>,

    /// Skip the title/author metadata segments.
    #[arg(long)]
    no_metadata: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PAPER2SPEECH_PASSWORD")]
    password: Option<String>,

    /// Print the structural model only, no narration.
    #[arg(long)]
    inspect_only: bool,

    /// Output structured JSON instead of plain text.
    #[arg(long)]
    json: bool,

    /// Disable the progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, default_value_t = 120)]
    download_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar provides the user-facing feedback; suppress INFO
    // logs while it is active unless the user asked for verbosity.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let model = inspect(&cli.input)
            .await
            .context("Failed to analyze document")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&model).context("Failed to serialize model")?
            );
        } else {
            println!("File:       {}", cli.input);
            if let Some(ref t) = model.metadata.title {
                println!("Title:      {}", t);
            }
            if !model.metadata.authors.is_empty() {
                println!("Authors:    {}", model.metadata.authors.join(", "));
            }
            println!("Pages:      {}", model.page_count);
            println!("Sections:   {}", model.sections.len());
            for section in &model.sections {
                println!("  p{:>3}  {}", section.page + 1, section.name);
            }
            println!("Equations:  {}", model.equations.len());
            println!("Tables:     {}", model.tables.len());
            println!("Figures:    {}", model.figures.len());
            if !model.warnings.is_empty() {
                println!("Warnings:   {}", model.warnings.len());
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let observer = if show_progress {
        Some(CliObserver::new())
    } else {
        None
    };

    let mut builder = ConversionConfig::builder()
        .include_metadata(!cli.no_metadata)
        .download_timeout_secs(cli.download_timeout);
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref obs) = observer {
        builder = builder.observer(Arc::clone(obs) as Observer);
    }
    let config = builder.build().context("Invalid configuration")?;

    // ── Run the text-only pipeline ───────────────────────────────────────
    let output = narrate(&cli.input, &config)
        .await
        .context("Narration failed")?;

    if let Some(ref obs) = observer {
        obs.finish();
    }

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialize output")?
        );
    } else if let Some(ref output_path) = cli.output {
        tokio::fs::write(output_path, &output.narration)
            .await
            .with_context(|| format!("Failed to write {}", output_path.display()))?;
        if !cli.quiet {
            eprintln!(
                "{}  {} segments, {} chars  →  {}",
                green("✔"),
                output.segments.len(),
                output.stats.narration_chars,
                bold(&output_path.display().to_string()),
            );
        }
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.narration.as_bytes())
            .context("Failed to write to stdout")?;
        handle.write_all(b"\n").ok();
    }

    if !cli.quiet && !cli.json {
        eprintln!(
            "   {}",
            dim(&format!(
                "{} sections  {} equations  {} tables  {} figures  —  {}ms",
                output.stats.section_count,
                output.stats.equation_count,
                output.stats.table_count,
                output.stats.figure_count,
                output.stats.extract_duration_ms,
            ))
        );
    }

    Ok(())
}
