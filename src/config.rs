//! Configuration types for paper-to-audio conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`],
//! built via its [`ConversionConfigBuilder`]. Keeping every knob in one
//! struct makes it trivial to share configs across jobs, log them, and
//! diff two runs to understand why their narrations differ.

use crate::error::Paper2SpeechError;
use crate::progress::Observer;
use crate::synthesis::{QualityEvaluator, SpeechSynthesizer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for one conversion.
///
/// Built via [`ConversionConfig::builder()`] or
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use paper2speech::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .include_metadata(true)
///     .chunk_size(2000)
///     .concurrency(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Prepend title/author segments to the narration. Default: true.
    pub include_metadata: bool,

    /// Run the quality-evaluation collaborator after synthesis. Default: false.
    ///
    /// Requires an `evaluator`; ignored (with a warning) when none is
    /// configured.
    pub run_evaluation: bool,

    /// What a failed evaluation call does to the job. Default: omit metrics.
    pub evaluation_failure_policy: EvaluationFailurePolicy,

    /// Voice configuration forwarded opaquely to the synthesizer.
    pub voice: VoiceConfig,

    /// Narration chunk size in characters. Must be ≥ 1. Default: 4000.
    ///
    /// The narration string is split into fixed-size contiguous character
    /// chunks and each chunk is synthesized independently. Boundaries may
    /// fall mid-word; that is accepted behaviour, not a defect.
    pub chunk_size: usize,

    /// Number of concurrent synthesis calls. Default: 4.
    ///
    /// Synthesis backends are network-bound; issuing several chunk calls
    /// at once cuts wall-clock time while the final concatenation order
    /// is restored to chunk order regardless of completion order.
    pub concurrency: usize,

    /// Maximum retry attempts for one transient collaborator failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    ///
    /// Doubles after each attempt: 500 ms → 1 s → 2 s.
    pub retry_backoff_ms: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Directory background jobs write their audio artifact into
    /// (`<job-id>.audio`, atomic write). When unset, the artifact exists
    /// only on the in-memory [`crate::output::ConversionOutput`].
    pub audio_output_dir: Option<PathBuf>,

    /// Speech-synthesis collaborator. Required for `convert*`; not needed
    /// for `narrate`/`inspect`.
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,

    /// Quality-evaluation collaborator. Consulted only when
    /// `run_evaluation` is set.
    pub evaluator: Option<Arc<dyn QualityEvaluator>>,

    /// Checkpoint observer (job progress integration point).
    pub observer: Option<Observer>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            include_metadata: true,
            run_evaluation: false,
            evaluation_failure_policy: EvaluationFailurePolicy::default(),
            voice: VoiceConfig::default(),
            chunk_size: 4000,
            concurrency: 4,
            max_retries: 3,
            retry_backoff_ms: 500,
            password: None,
            download_timeout_secs: 120,
            audio_output_dir: None,
            synthesizer: None,
            evaluator: None,
            observer: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("include_metadata", &self.include_metadata)
            .field("run_evaluation", &self.run_evaluation)
            .field(
                "evaluation_failure_policy",
                &self.evaluation_failure_policy,
            )
            .field("voice", &self.voice)
            .field("chunk_size", &self.chunk_size)
            .field("concurrency", &self.concurrency)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field(
                "synthesizer",
                &self.synthesizer.as_ref().map(|_| "<dyn SpeechSynthesizer>"),
            )
            .field(
                "evaluator",
                &self.evaluator.as_ref().map(|_| "<dyn QualityEvaluator>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn include_metadata(mut self, v: bool) -> Self {
        self.config.include_metadata = v;
        self
    }

    pub fn run_evaluation(mut self, v: bool) -> Self {
        self.config.run_evaluation = v;
        self
    }

    pub fn evaluation_failure_policy(mut self, policy: EvaluationFailurePolicy) -> Self {
        self.config.evaluation_failure_policy = policy;
        self
    }

    pub fn voice(mut self, voice: VoiceConfig) -> Self {
        self.config.voice = voice;
        self
    }

    pub fn chunk_size(mut self, n: usize) -> Self {
        self.config.chunk_size = n;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn audio_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.audio_output_dir = Some(dir.into());
        self
    }

    pub fn synthesizer(mut self, s: Arc<dyn SpeechSynthesizer>) -> Self {
        self.config.synthesizer = Some(s);
        self
    }

    pub fn evaluator(mut self, e: Arc<dyn QualityEvaluator>) -> Self {
        self.config.evaluator = Some(e);
        self
    }

    pub fn observer(mut self, o: Observer) -> Self {
        self.config.observer = Some(o);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Paper2SpeechError> {
        let c = &self.config;
        if c.chunk_size == 0 {
            return Err(Paper2SpeechError::InvalidConfig(
                "chunk_size must be ≥ 1".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(Paper2SpeechError::InvalidConfig(
                "concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// What a failed quality-evaluation call does to the job.
///
/// The source behaviour was inconsistent here, so the choice is an
/// explicit flag rather than a guess: by default a broken scoring oracle
/// costs you metrics, not the audio you already paid to synthesize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationFailurePolicy {
    /// Complete the job with metrics omitted. (default)
    #[default]
    OmitMetrics,
    /// Fail the whole job.
    FailJob,
}

/// Voice configuration forwarded to the synthesis collaborator.
///
/// `name`/`speed` cover the common cases; everything else rides in the
/// opaque `extra` map, which this crate never interprets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Backend-specific voice identifier.
    pub name: String,
    /// Speaking-rate multiplier; 1.0 is the backend default.
    pub speed: f32,
    /// Opaque backend-specific settings.
    #[serde(default)]
    pub extra: HashMap<String, String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            speed: 1.0,
            extra: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_build() {
        let config = ConversionConfig::builder().build().unwrap();
        assert!(config.include_metadata);
        assert!(!config.run_evaluation);
        assert_eq!(config.chunk_size, 4000);
        assert_eq!(
            config.evaluation_failure_policy,
            EvaluationFailurePolicy::OmitMetrics
        );
    }

    #[test]
    fn builder_rejects_zero_chunk_size() {
        let err = ConversionConfig::builder().chunk_size(0).build();
        assert!(matches!(err, Err(Paper2SpeechError::InvalidConfig(_))));
    }

    #[test]
    fn concurrency_clamped_to_at_least_one() {
        let config = ConversionConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn voice_config_serialises_with_extra() {
        let mut voice = VoiceConfig::default();
        voice.extra.insert("pitch".into(), "+2st".into());
        let json = serde_json::to_string(&voice).unwrap();
        assert!(json.contains("pitch"));
        let back: VoiceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, voice);
    }
}
