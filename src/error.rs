//! Error types for the paper2speech library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Paper2SpeechError`] — **Fatal**: the conversion cannot proceed at
//!   all (bad input file, corrupt document, no synthesizer configured, a
//!   collaborator refusing every retry). Returned as `Err` from the
//!   top-level `convert*`/`narrate` functions and recorded on the job
//!   record when a background job fails.
//!
//! * [`crate::model::ExtractWarning`] — **Non-fatal**: one extractor
//!   degraded on one page (a malformed equation span, a table region that
//!   refused to parse). Stored inside
//!   [`crate::model::StructuralModel::warnings`] so callers can inspect
//!   partial extraction rather than losing the whole paper to one bad
//!   page.
//!
//! The separation keeps the job state machine honest: only conditions that
//! make the remaining pipeline meaningless ever reach `failed`.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the paper2speech library.
///
/// Per-page extraction degradations are not errors; they surface as
/// [`crate::model::ExtractWarning`] entries on the structural model.
#[derive(Debug, Error)]
pub enum Paper2SpeechError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("file is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Document errors ───────────────────────────────────────────────────
    /// Header/trailer/xref is corrupt and the document cannot be opened.
    #[error("document '{path}' is corrupt or unreadable: {detail}")]
    CorruptDocument { path: PathBuf, detail: String },

    /// Document requires a password but none was provided.
    #[error("document '{path}' is encrypted and requires a password")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("wrong password for document '{path}'")]
    WrongPassword { path: PathBuf },

    // ── Collaborator errors ───────────────────────────────────────────────
    /// Synthesis was requested but no synthesizer is configured.
    #[error("no speech synthesizer configured\nInject one via ConversionConfig::builder().synthesizer(..), or use narrate() for text-only output.")]
    SynthesizerNotConfigured,

    /// A narration chunk failed synthesis after all retries.
    #[error("speech synthesis failed on chunk {chunk} after {retries} retries: {detail}")]
    SynthesisFailed {
        chunk: usize,
        retries: u32,
        detail: String,
    },

    /// Quality evaluation failed and the configured policy escalates it.
    #[error("quality evaluation failed: {detail}")]
    EvaluationFailed { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesis_failed_display() {
        let e = Paper2SpeechError::SynthesisFailed {
            chunk: 4,
            retries: 3,
            detail: "backend unavailable".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("chunk 4"), "got: {msg}");
        assert!(msg.contains("3 retries"), "got: {msg}");
    }

    #[test]
    fn not_a_pdf_display_includes_magic() {
        let e = Paper2SpeechError::NotAPdf {
            path: PathBuf::from("notes.txt"),
            magic: *b"Hell",
        };
        assert!(e.to_string().contains("notes.txt"));
    }

    #[test]
    fn invalid_config_display() {
        let e = Paper2SpeechError::InvalidConfig("chunk_size must be ≥ 1".into());
        assert!(e.to_string().contains("chunk_size"));
    }

    #[test]
    fn evaluation_failed_display() {
        let e = Paper2SpeechError::EvaluationFailed {
            detail: "scoring service 503".into(),
        };
        assert!(e.to_string().contains("503"));
    }
}
