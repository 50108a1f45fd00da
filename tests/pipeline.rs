//! End-to-end integration tests over in-memory documents.
//!
//! These exercise the whole pipeline — structure extraction, element
//! verbalization, narrative assembly, chunked synthesis, evaluation, and
//! the background job state machine — with mock collaborators standing in
//! for the external synthesis/evaluation systems. No PDF backend is
//! involved: documents are constructed directly, which is exactly the
//! seam the read stage produces.

use async_trait::async_trait;
use paper2speech::jobs::{submit, Job, JobSource, JobStatus, JobStore};
use paper2speech::{
    convert_document, narrate_document, Checkpoint, CollaboratorError, ConversionConfig,
    Document, EvaluationFailurePolicy, EvaluationMetrics, QualityEvaluator, SegmentKind,
    SpeechSynthesizer, VoiceConfig,
};
use paper2speech::model::{BlockKind, LayoutBlock, Page, Region};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Test fixtures ────────────────────────────────────────────────────────────

fn text_block(text: &str, x: f32, y: f32) -> LayoutBlock {
    LayoutBlock {
        kind: BlockKind::Text,
        text: text.to_string(),
        region: Region {
            x,
            y,
            width: 40.0,
            height: 10.0,
        },
        font_size: 9.0,
    }
}

/// A two-page paper: one equation and one section header on page one, a
/// two-column numeric table (rows [[1,2],[3,6],[5,10]]) on page two.
fn two_page_paper() -> Document {
    let page_one = Page {
        index: 0,
        text: "The identity $E = m + c$ is discussed below.\n## Methodology\n".into(),
        blocks: vec![],
    };

    let mut page_two = Page {
        index: 1,
        text: String::new(),
        blocks: vec![],
    };
    let rows = [["x", "y"], ["1", "2"], ["3", "6"], ["5", "10"]];
    for (r, cells) in rows.iter().enumerate() {
        for (c, cell) in cells.iter().enumerate() {
            page_two
                .blocks
                .push(text_block(cell, 60.0 + c as f32 * 120.0, 90.0 + r as f32 * 16.0));
        }
    }

    Document {
        raw_metadata: HashMap::new(),
        pages: vec![page_one, page_two],
    }
}

/// Records every synthesized chunk and returns one recognisable byte per
/// chunk index.
struct RecordingSynth {
    chunks: Mutex<Vec<String>>,
}

impl RecordingSynth {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            chunks: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for RecordingSynth {
    async fn synthesize(
        &self,
        text: &str,
        _voice: &VoiceConfig,
    ) -> Result<Vec<u8>, CollaboratorError> {
        let idx = {
            let mut chunks = self.chunks.lock().unwrap();
            chunks.push(text.to_string());
            chunks.len() - 1
        };
        Ok(vec![idx as u8; 4])
    }
}

struct BrokenSynth;

#[async_trait]
impl SpeechSynthesizer for BrokenSynth {
    async fn synthesize(
        &self,
        _text: &str,
        _voice: &VoiceConfig,
    ) -> Result<Vec<u8>, CollaboratorError> {
        Err(CollaboratorError::new("tts backend unreachable"))
    }
}

struct ScoringEvaluator {
    calls: AtomicUsize,
}

#[async_trait]
impl QualityEvaluator for ScoringEvaluator {
    async fn evaluate(
        &self,
        original: &str,
        generated: &str,
        audio: Option<&[u8]>,
    ) -> Result<EvaluationMetrics, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut metrics = EvaluationMetrics::new();
        metrics.insert("original_chars".into(), original.len() as f64);
        metrics.insert("generated_chars".into(), generated.len() as f64);
        metrics.insert("audio_bytes".into(), audio.map_or(0, <[u8]>::len) as f64);
        Ok(metrics)
    }
}

struct BrokenEvaluator;

#[async_trait]
impl QualityEvaluator for BrokenEvaluator {
    async fn evaluate(
        &self,
        _original: &str,
        _generated: &str,
        _audio: Option<&[u8]>,
    ) -> Result<EvaluationMetrics, CollaboratorError> {
        Err(CollaboratorError::new("scoring oracle down"))
    }
}

/// Poll the store until the job leaves `processing` (bounded wait).
async fn wait_terminal(store: &JobStore, id: &paper2speech::jobs::JobId) -> Job {
    for _ in 0..500 {
        let job = store.snapshot(id).expect("job must exist");
        if job.status.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job never reached a terminal state");
}

// ── Narration order ──────────────────────────────────────────────────────────

#[test]
fn narration_orders_equation_then_table_then_section() {
    let config = ConversionConfig::builder()
        .include_metadata(false)
        .build()
        .unwrap();
    let output = narrate_document(&two_page_paper(), &config);

    let kinds: Vec<SegmentKind> = output.segments.iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![SegmentKind::Equation, SegmentKind::Table, SegmentKind::Section]
    );

    let eq_pos = output.narration.find("E equals m plus c").expect("equation spoken");
    let table_pos = output
        .narration
        .find("strong positive correlation")
        .expect("correlation insight present");
    let section_pos = output
        .narration
        .find("Section: Methodology")
        .expect("section spoken");
    assert!(eq_pos < table_pos && table_pos < section_pos);
}

#[test]
fn narration_is_reproducible_across_runs() {
    let config = ConversionConfig::default();
    let doc = two_page_paper();
    let a = narrate_document(&doc, &config);
    let b = narrate_document(&doc, &config);
    assert_eq!(a.narration, b.narration);
    assert_eq!(a.segments, b.segments);
}

// ── Full conversion with mock collaborators ──────────────────────────────────

#[tokio::test]
async fn conversion_chunks_narration_and_concatenates_in_order() {
    let synth = RecordingSynth::new();
    let config = ConversionConfig::builder()
        .include_metadata(false)
        .chunk_size(40)
        .synthesizer(Arc::clone(&synth) as Arc<dyn SpeechSynthesizer>)
        .build()
        .unwrap();

    let output = convert_document(&two_page_paper(), &config).await.unwrap();

    // Chunks re-join into the narration exactly.
    let chunks = synth.chunks.lock().unwrap();
    assert_eq!(chunks.concat(), output.narration);
    assert!(chunks.len() > 1, "expected multiple chunks");
    assert!(chunks
        .iter()
        .take(chunks.len() - 1)
        .all(|c| c.chars().count() == 40));

    // Audio is one buffer per chunk, concatenated.
    assert_eq!(output.audio.len(), chunks.len() * 4);
    assert_eq!(output.stats.chunk_count, chunks.len());
}

#[tokio::test]
async fn evaluation_metrics_attached_when_requested() {
    let evaluator = Arc::new(ScoringEvaluator {
        calls: AtomicUsize::new(0),
    });
    let config = ConversionConfig::builder()
        .synthesizer(RecordingSynth::new() as Arc<dyn SpeechSynthesizer>)
        .evaluator(Arc::clone(&evaluator) as Arc<dyn QualityEvaluator>)
        .run_evaluation(true)
        .build()
        .unwrap();

    let output = convert_document(&two_page_paper(), &config).await.unwrap();
    let metrics = output.evaluation.expect("metrics present");
    assert_eq!(evaluator.calls.load(Ordering::SeqCst), 1);
    assert!(metrics["generated_chars"] > 0.0);
    assert!(metrics["audio_bytes"] > 0.0);
}

#[tokio::test]
async fn broken_evaluator_omits_metrics_by_default() {
    let config = ConversionConfig::builder()
        .synthesizer(RecordingSynth::new() as Arc<dyn SpeechSynthesizer>)
        .evaluator(Arc::new(BrokenEvaluator) as Arc<dyn QualityEvaluator>)
        .run_evaluation(true)
        .build()
        .unwrap();

    let output = convert_document(&two_page_paper(), &config).await.unwrap();
    assert!(output.evaluation.is_none());
    assert!(!output.audio.is_empty());
}

#[tokio::test]
async fn broken_evaluator_fails_job_under_strict_policy() {
    let config = ConversionConfig::builder()
        .synthesizer(RecordingSynth::new() as Arc<dyn SpeechSynthesizer>)
        .evaluator(Arc::new(BrokenEvaluator) as Arc<dyn QualityEvaluator>)
        .run_evaluation(true)
        .evaluation_failure_policy(EvaluationFailurePolicy::FailJob)
        .build()
        .unwrap();

    let err = convert_document(&two_page_paper(), &config)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("evaluation failed"), "got: {err}");
}

// ── Background jobs ──────────────────────────────────────────────────────────

#[tokio::test]
async fn successful_job_reaches_completed_at_100() {
    let store = Arc::new(JobStore::new());
    let config = ConversionConfig::builder()
        .synthesizer(RecordingSynth::new() as Arc<dyn SpeechSynthesizer>)
        .build()
        .unwrap();

    let id = submit(&store, JobSource::Document(two_page_paper()), config).unwrap();
    let job = wait_terminal(&store, &id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    assert!(job.finished_at.is_some());
    let result = job.result.expect("completed jobs carry a result");
    assert!(result.audio_bytes > 0);
    assert_eq!(result.stats.equation_count, 1);
    assert_eq!(result.stats.table_count, 1);
}

#[tokio::test]
async fn configured_output_dir_receives_audio_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JobStore::new());
    let config = ConversionConfig::builder()
        .synthesizer(RecordingSynth::new() as Arc<dyn SpeechSynthesizer>)
        .audio_output_dir(dir.path())
        .build()
        .unwrap();

    let id = submit(&store, JobSource::Document(two_page_paper()), config).unwrap();
    let job = wait_terminal(&store, &id).await;

    assert_eq!(job.status, JobStatus::Completed);
    let result = job.result.unwrap();
    let path = result.audio_path.expect("artifact path recorded");
    let written = std::fs::read(&path).unwrap();
    assert_eq!(written.len(), result.audio_bytes);
}

#[tokio::test]
async fn synthesis_failure_freezes_progress_at_last_checkpoint() {
    let store = Arc::new(JobStore::new());
    let config = ConversionConfig::builder()
        .synthesizer(Arc::new(BrokenSynth) as Arc<dyn SpeechSynthesizer>)
        .max_retries(0)
        .build()
        .unwrap();

    let id = submit(&store, JobSource::Document(two_page_paper()), config).unwrap();
    let job = wait_terminal(&store, &id).await;

    assert_eq!(job.status, JobStatus::Failed);
    // Narration composed (sections appended), audio never synthesized:
    // progress is neither reset to 0 nor advanced to completion.
    assert_eq!(job.progress, Checkpoint::SectionsAppended.progress());
    assert!(job.result.is_none());
    let error = job.error.expect("failed jobs carry an error");
    assert!(error.contains("tts backend unreachable"), "got: {error}");
}

#[tokio::test]
async fn concurrent_jobs_do_not_share_state() {
    let store = Arc::new(JobStore::new());

    let ok_config = ConversionConfig::builder()
        .synthesizer(RecordingSynth::new() as Arc<dyn SpeechSynthesizer>)
        .build()
        .unwrap();
    let bad_config = ConversionConfig::builder()
        .synthesizer(Arc::new(BrokenSynth) as Arc<dyn SpeechSynthesizer>)
        .max_retries(0)
        .build()
        .unwrap();

    let ok_id = submit(&store, JobSource::Document(two_page_paper()), ok_config).unwrap();
    let bad_id = submit(&store, JobSource::Document(two_page_paper()), bad_config).unwrap();

    let ok_job = wait_terminal(&store, &ok_id).await;
    let bad_job = wait_terminal(&store, &bad_id).await;

    assert_eq!(ok_job.status, JobStatus::Completed);
    assert_eq!(bad_job.status, JobStatus::Failed);
}
