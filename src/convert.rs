//! Eager (full-document) conversion entry points.
//!
//! Within one conversion all steps are strictly sequential — structure
//! extraction, per-element verbalization, assembly, chunked synthesis,
//! optional evaluation — with the single exception of chunk-level
//! synthesis calls, which are embarrassingly parallel and issued
//! concurrently while the final concatenation order is restored to chunk
//! order. Background job bookkeeping lives in [`crate::jobs`]; these
//! functions are what its driver (and the CLI) call.

use crate::config::ConversionConfig;
use crate::error::Paper2SpeechError;
use crate::model::{Document, Metadata, StructuralModel};
use crate::output::{ConversionOutput, ConversionStats, NarrationOutput};
use crate::pipeline::{assemble, extract, input, read};
use crate::progress::Checkpoint;
use crate::synthesis;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Convert a paper (local path or URL) to narrated audio.
///
/// This is the primary entry point for the library. Requires a
/// synthesizer in the config; use [`narrate`] for text-only output.
///
/// # Errors
/// Returns `Err(Paper2SpeechError)` only for fatal errors: unreadable or
/// non-PDF input, no synthesizer configured, a chunk failing synthesis
/// after all retries, or (per policy) a failed evaluation. Per-page
/// extraction problems degrade into `model.warnings` instead.
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Paper2SpeechError> {
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let document = read::read_document(resolved.path(), config.password.as_deref()).await?;
    // `resolved` lives until here so downloaded temp inputs survive the read.
    drop(resolved);

    convert_document(&document, config).await
}

/// Convert in-memory PDF bytes to narrated audio.
///
/// The bytes are staged to a managed temp file that is removed when this
/// call returns on every path, success or failure.
pub async fn convert_from_bytes(
    bytes: &[u8],
    config: &ConversionConfig,
) -> Result<ConversionOutput, Paper2SpeechError> {
    let resolved = input::resolve_bytes(bytes)?;
    let document = read::read_document(resolved.path(), config.password.as_deref()).await?;
    drop(resolved);

    convert_document(&document, config).await
}

/// Convert an already-read document to narrated audio.
///
/// The document-level core: everything after input resolution. Useful
/// directly when the caller already holds a [`Document`].
pub async fn convert_document(
    document: &Document,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Paper2SpeechError> {
    let total_start = Instant::now();

    // Fail before doing any work when synthesis can never happen.
    let synthesizer = config
        .synthesizer
        .clone()
        .ok_or(Paper2SpeechError::SynthesizerNotConfigured)?;

    // ── Steps 1–2: structure extraction + narrative assembly ────────────
    let narration_output = narrate_document(document, config);
    let NarrationOutput {
        narration,
        segments,
        model,
        mut stats,
    } = narration_output;

    // ── Step 3: chunk + synthesize ──────────────────────────────────────
    let chunks = assemble::chunk_narration(&narration, config.chunk_size);
    stats.chunk_count = chunks.len();
    info!(
        "Narration: {} chars in {} chunks of ≤{} chars",
        stats.narration_chars,
        chunks.len(),
        config.chunk_size
    );

    let synthesis_start = Instant::now();
    let audio = synthesis::synthesize_chunks(&synthesizer, &chunks, config).await?;
    stats.synthesis_duration_ms = synthesis_start.elapsed().as_millis() as u64;
    notify(config, Checkpoint::AudioSynthesized);

    // ── Step 4: optional evaluation ─────────────────────────────────────
    let evaluation = if config.run_evaluation {
        match &config.evaluator {
            Some(evaluator) => {
                synthesis::run_evaluation(
                    evaluator,
                    &document.full_text(),
                    &narration,
                    Some(&audio),
                    config.evaluation_failure_policy,
                )
                .await?
            }
            None => {
                warn!("Evaluation requested but no evaluator configured; skipping");
                None
            }
        }
    } else {
        None
    };
    notify(config, Checkpoint::EvaluationFinished);

    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Conversion complete: {} audio bytes, {}ms total",
        audio.len(),
        stats.total_duration_ms
    );

    Ok(ConversionOutput {
        narration,
        segments,
        model,
        audio,
        evaluation,
        stats,
    })
}

/// Run extraction and narrative assembly without any collaborator —
/// the text-only pipeline.
pub async fn narrate(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<NarrationOutput, Paper2SpeechError> {
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let document = read::read_document(resolved.path(), config.password.as_deref()).await?;
    drop(resolved);

    Ok(narrate_document(&document, config))
}

/// Document-level narration: analyze + compose + join. Infallible —
/// extraction absorbs its own failures into warnings.
pub fn narrate_document(document: &Document, config: &ConversionConfig) -> NarrationOutput {
    let extract_start = Instant::now();
    let model = extract::analyze(document);
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
    notify(config, Checkpoint::StructureAnalyzed);

    for warning in &model.warnings {
        if let Some(observer) = &config.observer {
            observer.on_extract_warning(warning.page, &warning.stage, &warning.detail);
        }
    }

    let segments =
        assemble::compose_segments(&model, config.include_metadata, config.observer.as_ref());
    let narration = assemble::join_segments(&segments);

    let mut stats = ConversionStats {
        extract_duration_ms,
        narration_chars: narration.chars().count(),
        ..Default::default()
    };
    stats.count_model(&model);

    NarrationOutput {
        narration,
        segments,
        model,
        stats,
    }
}

/// Convert a paper and write the audio artifact directly to a file.
///
/// Uses atomic write (temp name + rename) to prevent partial files.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, Paper2SpeechError> {
    let output = convert(input_str, config).await?;
    let path = output_path.as_ref();

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Paper2SpeechError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, &output.audio)
        .await
        .map_err(|e| Paper2SpeechError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Paper2SpeechError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(output.stats)
}

/// Analyze a paper's structure without narration or collaborators.
///
/// No synthesizer or evaluator required.
pub async fn inspect(input_str: impl AsRef<str>) -> Result<StructuralModel, Paper2SpeechError> {
    let config = ConversionConfig::default();
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let document = read::read_document(resolved.path(), None).await?;
    drop(resolved);

    Ok(extract::analyze(&document))
}

/// Derive just the document metadata (title, authors, raw tags).
pub async fn inspect_metadata(
    input_str: impl AsRef<str>,
) -> Result<Metadata, Paper2SpeechError> {
    Ok(inspect(input_str).await?.metadata)
}

fn notify(config: &ConversionConfig, checkpoint: Checkpoint) {
    if let Some(observer) = &config.observer {
        observer.on_checkpoint(checkpoint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Page;
    use std::collections::HashMap;

    fn simple_document() -> Document {
        Document {
            raw_metadata: HashMap::new(),
            pages: vec![Page {
                index: 0,
                text: "Abstract\nWe study $a=b$ in detail.\n".into(),
                blocks: vec![],
            }],
        }
    }

    #[test]
    fn narrate_document_is_deterministic() {
        let config = ConversionConfig::default();
        let doc = simple_document();
        let a = narrate_document(&doc, &config);
        let b = narrate_document(&doc, &config);
        assert_eq!(a.narration, b.narration);
        assert!(a.narration.contains("a equals b"), "got: {}", a.narration);
        assert!(a.narration.contains("Section: Abstract"), "got: {}", a.narration);
    }

    #[tokio::test]
    async fn convert_without_synthesizer_fails_fast() {
        let config = ConversionConfig::default();
        let err = convert_document(&simple_document(), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, Paper2SpeechError::SynthesizerNotConfigured));
    }

    #[test]
    fn stats_reflect_model_counts() {
        let config = ConversionConfig::default();
        let output = narrate_document(&simple_document(), &config);
        assert_eq!(output.stats.total_pages, 1);
        assert_eq!(output.stats.section_count, 1);
        assert_eq!(output.stats.equation_count, 1);
        assert_eq!(output.stats.table_count, 0);
        assert!(output.stats.narration_chars > 0);
    }
}
