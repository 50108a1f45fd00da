//! Pipeline stages for paper-to-narration conversion.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different document backend) without
//! touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ read ──▶ extract ──▶ {equations, tables} ──▶ assemble
//! (path/URL/  (pdfium   (structural  (per-element        (segments,
//!  bytes)      text+     model)       verbalization)      narration,
//!              layout)                                    chunks)
//! ```
//!
//! 1. [`input`]     — canonicalise a path, URL, or byte buffer to a local file
//! 2. [`read`]      — load page text and layout blocks; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`extract`]   — one forward pass building the structural model,
//!    with per-page/per-extractor failure isolation
//! 4. [`equations`] — math markup → spoken language (two tiers + fallback)
//! 5. [`tables`]    — tabular parse + statistics/narrative/insights
//! 6. [`assemble`]  — deterministic segment composition and fixed-size
//!    chunking for the synthesis collaborator
//!
//! Chunk synthesis itself lives in [`crate::synthesis`] — it talks to an
//! external collaborator, not to document content, so it sits outside the
//! decomposition pipeline.

pub mod assemble;
pub mod equations;
pub mod extract;
pub mod input;
pub mod read;
pub mod tables;
