//! Checkpoint-observer trait for job progress events.
//!
//! Inject an [`Arc<dyn ConversionObserver>`] via
//! [`crate::config::ConversionConfigBuilder::observer`] to receive an
//! event at each fixed pipeline checkpoint.
//!
//! # Why an observer instead of letting the pipeline write job records?
//!
//! The pipeline stays ignorant of job bookkeeping: the background job
//! driver installs an observer that writes progress into the
//! [`crate::jobs::JobStore`], the CLI installs one that advances a
//! progress bar, and library callers who don't care install nothing.
//! The trait is `Send + Sync` so an observer works when chunk synthesis
//! runs concurrently.

use std::sync::Arc;

/// Fixed pipeline checkpoints, in the order they are reached.
///
/// Each checkpoint carries the job progress value written when it is
/// passed. Values are spaced so progress is strictly increasing along the
/// happy path and a failed job's last progress tells you which stage it
/// died in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Checkpoint {
    /// Structure analysis finished; the structural model exists.
    StructureAnalyzed,
    /// Metadata segments composed (or skipped when not requested).
    MetadataComposed,
    /// Every equation has been verbalized into a segment.
    EquationsVerbalized,
    /// Every table has been summarized into a segment.
    TablesSummarized,
    /// Section segments appended; the narration string is complete.
    SectionsAppended,
    /// All chunks synthesized and concatenated into the audio artifact.
    AudioSynthesized,
    /// Quality evaluation finished (or was skipped / omitted per policy).
    EvaluationFinished,
}

impl Checkpoint {
    /// Progress value in [0, 100] written when this checkpoint is passed.
    pub fn progress(self) -> u8 {
        match self {
            Checkpoint::StructureAnalyzed => 20,
            Checkpoint::MetadataComposed => 30,
            Checkpoint::EquationsVerbalized => 45,
            Checkpoint::TablesSummarized => 60,
            Checkpoint::SectionsAppended => 70,
            Checkpoint::AudioSynthesized => 90,
            Checkpoint::EvaluationFinished => 95,
        }
    }
}

/// Called by the pipeline as it passes each checkpoint.
///
/// All methods have default no-op implementations so callers only
/// override what they care about.
pub trait ConversionObserver: Send + Sync {
    /// Called once when a checkpoint is passed, in checkpoint order.
    fn on_checkpoint(&self, checkpoint: Checkpoint) {
        let _ = checkpoint;
    }

    /// Called when an extractor degrades on a page (non-fatal).
    fn on_extract_warning(&self, page: usize, stage: &str, detail: &str) {
        let _ = (page, stage, detail);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopObserver;

impl ConversionObserver for NoopObserver {}

/// Convenience alias matching the type stored in
/// [`crate::config::ConversionConfig`].
pub type Observer = Arc<dyn ConversionObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording {
        seen: Mutex<Vec<Checkpoint>>,
    }

    impl ConversionObserver for Recording {
        fn on_checkpoint(&self, checkpoint: Checkpoint) {
            self.seen.lock().unwrap().push(checkpoint);
        }
    }

    #[test]
    fn checkpoint_progress_is_strictly_increasing() {
        let all = [
            Checkpoint::StructureAnalyzed,
            Checkpoint::MetadataComposed,
            Checkpoint::EquationsVerbalized,
            Checkpoint::TablesSummarized,
            Checkpoint::SectionsAppended,
            Checkpoint::AudioSynthesized,
            Checkpoint::EvaluationFinished,
        ];
        for pair in all.windows(2) {
            assert!(
                pair[0].progress() < pair[1].progress(),
                "{:?} must come before {:?}",
                pair[0],
                pair[1]
            );
        }
        assert!(all.last().unwrap().progress() < 100);
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let obs = NoopObserver;
        obs.on_checkpoint(Checkpoint::StructureAnalyzed);
        obs.on_extract_warning(0, "tables", "no grid found");
    }

    #[test]
    fn recording_observer_receives_events_in_order() {
        let obs = Recording {
            seen: Mutex::new(Vec::new()),
        };
        obs.on_checkpoint(Checkpoint::StructureAnalyzed);
        obs.on_checkpoint(Checkpoint::AudioSynthesized);
        let seen = obs.seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![Checkpoint::StructureAnalyzed, Checkpoint::AudioSynthesized]
        );
    }
}
