//! Collaborator contracts and the chunked synthesis driver.
//!
//! Speech synthesis and quality evaluation are external systems consumed
//! behind narrow trait contracts — this crate never implements either.
//! Callers inject implementations via
//! [`crate::config::ConversionConfigBuilder::synthesizer`] /
//! [`crate::config::ConversionConfigBuilder::evaluator`].
//!
//! ## Retry Strategy
//!
//! Synthesis backends fail transiently under load just like any remote
//! API. Exponential backoff (`retry_backoff_ms * 2^attempt`) avoids
//! thundering-herd: with 500 ms base and 3 retries the wait sequence is
//! 500 ms → 1 s → 2 s per chunk. A chunk that fails every retry is fatal
//! to the conversion — unlike extraction, there is no meaningful
//! "partial audio" to degrade to.

use crate::config::{ConversionConfig, EvaluationFailurePolicy, VoiceConfig};
use crate::error::Paper2SpeechError;
use crate::output::{AudioBuffer, EvaluationMetrics};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Error returned by a collaborator implementation.
///
/// Opaque to this crate; the message is carried into the job error
/// description verbatim.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct CollaboratorError(pub String);

impl CollaboratorError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Speech-synthesis collaborator: text chunk + voice → audio buffer.
///
/// Assumed to be a pure function of its inputs for ordering purposes —
/// the driver may call it concurrently for different chunks.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        voice: &VoiceConfig,
    ) -> Result<AudioBuffer, CollaboratorError>;
}

/// Quality-evaluation collaborator: original + generated text (+ optional
/// audio) → metrics mapping. A pure scoring oracle.
#[async_trait]
pub trait QualityEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        original_text: &str,
        generated_text: &str,
        audio: Option<&[u8]>,
    ) -> Result<EvaluationMetrics, CollaboratorError>;
}

/// Synthesize all narration chunks and concatenate the buffers in chunk
/// order.
///
/// Chunks are submitted concurrently (`config.concurrency` in flight) and
/// may complete in any order; the final concatenation is restored to the
/// original chunk order before returning. Any chunk exhausting its
/// retries fails the whole conversion.
pub async fn synthesize_chunks(
    synthesizer: &Arc<dyn SpeechSynthesizer>,
    chunks: &[String],
    config: &ConversionConfig,
) -> Result<AudioBuffer, Paper2SpeechError> {
    let mut results: Vec<(usize, Result<AudioBuffer, Paper2SpeechError>)> =
        stream::iter(chunks.iter().cloned().enumerate().map(|(idx, chunk)| {
            let synthesizer = Arc::clone(synthesizer);
            let voice = config.voice.clone();
            let max_retries = config.max_retries;
            let backoff_ms = config.retry_backoff_ms;
            async move {
                let result =
                    synthesize_one(&synthesizer, idx, &chunk, &voice, max_retries, backoff_ms)
                        .await;
                (idx, result)
            }
        }))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;

    // Restore original chunk order regardless of completion order.
    results.sort_by_key(|(idx, _)| *idx);

    let mut audio = AudioBuffer::new();
    for (_, result) in results {
        audio.extend_from_slice(&result?);
    }
    Ok(audio)
}

/// Synthesize one chunk with retry/backoff.
async fn synthesize_one(
    synthesizer: &Arc<dyn SpeechSynthesizer>,
    idx: usize,
    text: &str,
    voice: &VoiceConfig,
    max_retries: u32,
    backoff_ms: u64,
) -> Result<AudioBuffer, Paper2SpeechError> {
    let mut last_err: Option<String> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let backoff = backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "Chunk {}: retry {}/{} after {}ms",
                idx, attempt, max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match synthesizer.synthesize(text, voice).await {
            Ok(buffer) => {
                debug!("Chunk {}: {} chars → {} audio bytes", idx, text.len(), buffer.len());
                return Ok(buffer);
            }
            Err(e) => {
                warn!("Chunk {}: attempt {} failed — {}", idx, attempt + 1, e);
                last_err = Some(e.to_string());
            }
        }
    }

    Err(Paper2SpeechError::SynthesisFailed {
        chunk: idx,
        retries: max_retries,
        detail: last_err.unwrap_or_else(|| "unknown error".to_string()),
    })
}

/// Run the evaluation collaborator, honouring the configured failure
/// policy.
///
/// Returns `Ok(Some(metrics))` on success, `Ok(None)` when the call
/// failed under [`EvaluationFailurePolicy::OmitMetrics`], and `Err` when
/// it failed under [`EvaluationFailurePolicy::FailJob`].
pub async fn run_evaluation(
    evaluator: &Arc<dyn QualityEvaluator>,
    original_text: &str,
    generated_text: &str,
    audio: Option<&[u8]>,
    policy: EvaluationFailurePolicy,
) -> Result<Option<EvaluationMetrics>, Paper2SpeechError> {
    match evaluator.evaluate(original_text, generated_text, audio).await {
        Ok(metrics) => Ok(Some(metrics)),
        Err(e) => match policy {
            EvaluationFailurePolicy::OmitMetrics => {
                warn!("Evaluation failed, omitting metrics: {}", e);
                Ok(None)
            }
            EvaluationFailurePolicy::FailJob => Err(Paper2SpeechError::EvaluationFailed {
                detail: e.to_string(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Echoes each chunk's first byte, completing later chunks first so
    /// the order-restoration path is actually exercised.
    struct ReversedLatency;

    #[async_trait]
    impl SpeechSynthesizer for ReversedLatency {
        async fn synthesize(
            &self,
            text: &str,
            _voice: &VoiceConfig,
        ) -> Result<AudioBuffer, CollaboratorError> {
            let tag = text.as_bytes()[0];
            // Chunk "a.." sleeps longest, "d.." shortest.
            let delay = 40u64.saturating_sub(u64::from(tag - b'a') * 10);
            sleep(Duration::from_millis(delay)).await;
            Ok(vec![tag])
        }
    }

    struct AlwaysFails {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SpeechSynthesizer for AlwaysFails {
        async fn synthesize(
            &self,
            _text: &str,
            _voice: &VoiceConfig,
        ) -> Result<AudioBuffer, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CollaboratorError::new("backend down"))
        }
    }

    struct FailingEvaluator;

    #[async_trait]
    impl QualityEvaluator for FailingEvaluator {
        async fn evaluate(
            &self,
            _original: &str,
            _generated: &str,
            _audio: Option<&[u8]>,
        ) -> Result<EvaluationMetrics, CollaboratorError> {
            Err(CollaboratorError::new("scoring service 503"))
        }
    }

    fn fast_config() -> ConversionConfig {
        ConversionConfig::builder()
            .concurrency(4)
            .max_retries(1)
            .retry_backoff_ms(1)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn concatenation_restores_chunk_order() {
        let synth: Arc<dyn SpeechSynthesizer> = Arc::new(ReversedLatency);
        let chunks = vec![
            "a-chunk".to_string(),
            "b-chunk".to_string(),
            "c-chunk".to_string(),
            "d-chunk".to_string(),
        ];
        let audio = synthesize_chunks(&synth, &chunks, &fast_config())
            .await
            .unwrap();
        assert_eq!(audio, vec![b'a', b'b', b'c', b'd']);
    }

    #[tokio::test]
    async fn exhausted_retries_fail_with_chunk_index() {
        let synth: Arc<dyn SpeechSynthesizer> = Arc::new(AlwaysFails {
            calls: AtomicUsize::new(0),
        });
        let chunks = vec!["only".to_string()];
        let err = synthesize_chunks(&synth, &chunks, &fast_config())
            .await
            .unwrap_err();
        match err {
            Paper2SpeechError::SynthesisFailed { chunk, retries, .. } => {
                assert_eq!(chunk, 0);
                assert_eq!(retries, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn evaluation_failure_omits_metrics_by_default() {
        let evaluator: Arc<dyn QualityEvaluator> = Arc::new(FailingEvaluator);
        let result = run_evaluation(
            &evaluator,
            "orig",
            "gen",
            None,
            EvaluationFailurePolicy::OmitMetrics,
        )
        .await
        .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn evaluation_failure_can_fail_job() {
        let evaluator: Arc<dyn QualityEvaluator> = Arc::new(FailingEvaluator);
        let err = run_evaluation(
            &evaluator,
            "orig",
            "gen",
            None,
            EvaluationFailurePolicy::FailJob,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Paper2SpeechError::EvaluationFailed { .. }));
    }
}
