//! # paper2speech
//!
//! Convert research papers into narrated audio.
//!
//! ## Why this crate?
//!
//! Reading a paper aloud is not the same as reading its text layer aloud.
//! Equations come out as symbol soup, tables as cell-by-cell noise, and
//! section structure disappears entirely. This crate builds a structural
//! model of the paper first — metadata, sections, equations, tables,
//! figures — converts each non-prose element into natural language, and
//! only then hands an ordered narration stream to a speech-synthesis
//! backend.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     resolve local file, URL, or byte buffer
//!  ├─ 2. Read      text layer + layout blocks via pdfium (spawn_blocking)
//!  ├─ 3. Extract   structural model: sections, equations, tables, figures
//!  ├─ 4. Convert   equations → spoken math, tables → narrative summaries
//!  ├─ 5. Assemble  deterministic segment order → narration → chunks
//!  ├─ 6. Speak     concurrent chunk synthesis, order-restored concat
//!  └─ 7. Score     optional quality evaluation (external oracle)
//! ```
//!
//! Speech synthesis and quality evaluation are **collaborators**: external
//! systems behind the [`SpeechSynthesizer`] and [`QualityEvaluator`]
//! traits, injected through [`ConversionConfig`]. This crate never ships
//! an implementation of either.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paper2speech::{convert, ConversionConfig};
//! # use paper2speech::{SpeechSynthesizer, VoiceConfig, CollaboratorError};
//! # use std::sync::Arc;
//! # struct MySynth;
//! # #[async_trait::async_trait]
//! # impl SpeechSynthesizer for MySynth {
//! #     async fn synthesize(&self, _t: &str, _v: &VoiceConfig)
//! #         -> Result<Vec<u8>, CollaboratorError> { Ok(vec![]) }
//! # }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .synthesizer(Arc::new(MySynth))
//!         .include_metadata(true)
//!         .build()?;
//!     let output = convert("paper.pdf", &config).await?;
//!     std::fs::write("paper.mp3", &output.audio)?;
//!     eprintln!("{} equations, {} tables narrated",
//!         output.stats.equation_count,
//!         output.stats.table_count);
//!     Ok(())
//! }
//! ```
//!
//! Text-only output (no synthesizer needed):
//!
//! ```rust,no_run
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let narration = paper2speech::narrate("paper.pdf", &Default::default()).await?;
//! println!("{}", narration.narration);
//! # Ok(())
//! # }
//! ```
//!
//! ## Background jobs
//!
//! For service embedding, [`jobs::JobStore`] tracks one [`jobs::Job`]
//! record per request — status, monotonic progress, terminal
//! result/error — while [`jobs::submit`] drives the conversion on a
//! background task. The store is plain injected state: create one at
//! process start, share it with your transport layer, drop it at
//! shutdown.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `paper2speech` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod jobs;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod synthesis;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, EvaluationFailurePolicy, VoiceConfig};
pub use convert::{
    convert, convert_document, convert_from_bytes, convert_to_file, inspect, inspect_metadata,
    narrate, narrate_document,
};
pub use error::Paper2SpeechError;
pub use model::{
    Document, Equation, Figure, Metadata, Page, Section, SegmentKind, StructuralModel, Table,
    TabularData, TextSegment,
};
pub use output::{
    AudioBuffer, ConversionOutput, ConversionStats, EvaluationMetrics, JobResult, NarrationOutput,
};
pub use pipeline::equations::verbalize;
pub use pipeline::tables::{parse_table, summarize, TableSummary};
pub use progress::{Checkpoint, ConversionObserver, NoopObserver, Observer};
pub use synthesis::{CollaboratorError, QualityEvaluator, SpeechSynthesizer};
