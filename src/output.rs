//! Output types: narration, audio, metrics, and per-run statistics.

use crate::model::{StructuralModel, TextSegment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw audio bytes returned by the synthesis collaborator.
///
/// The container format is whatever the backend produces; this crate only
/// concatenates buffers in chunk order.
pub type AudioBuffer = Vec<u8>;

/// Quality metrics returned by the evaluation collaborator.
///
/// A `BTreeMap` keeps serialised output deterministic.
pub type EvaluationMetrics = BTreeMap<String, f64>;

/// Result of the text-only pipeline: extraction + narrative assembly,
/// no collaborators involved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationOutput {
    /// The assembled narration string (all segments, single-space joined).
    pub narration: String,
    /// Ordered segments the narration was joined from.
    pub segments: Vec<TextSegment>,
    /// The structural model the narration was assembled from.
    pub model: StructuralModel,
    pub stats: ConversionStats,
}

/// Result of a full conversion including synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    pub narration: String,
    pub segments: Vec<TextSegment>,
    pub model: StructuralModel,
    /// Concatenated audio, chunk order.
    pub audio: AudioBuffer,
    /// Present only when evaluation ran and succeeded.
    pub evaluation: Option<EvaluationMetrics>,
    pub stats: ConversionStats,
}

/// The success payload attached to a completed job record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    /// Where the audio artifact was written, when the job was configured
    /// with an output directory.
    pub audio_path: Option<std::path::PathBuf>,
    /// Byte length of the audio artifact.
    pub audio_bytes: usize,
    pub evaluation: Option<EvaluationMetrics>,
    pub stats: ConversionStats,
}

impl From<&ConversionOutput> for JobResult {
    fn from(output: &ConversionOutput) -> Self {
        Self {
            audio_path: None,
            audio_bytes: output.audio.len(),
            evaluation: output.evaluation.clone(),
            stats: output.stats.clone(),
        }
    }
}

/// Aggregate statistics for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    pub total_pages: usize,
    pub section_count: usize,
    pub equation_count: usize,
    pub table_count: usize,
    pub figure_count: usize,
    /// Extraction degradations recorded on the model.
    pub warning_count: usize,
    /// Character length of the assembled narration.
    pub narration_chars: usize,
    /// Number of fixed-size chunks submitted for synthesis.
    pub chunk_count: usize,
    pub extract_duration_ms: u64,
    pub synthesis_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl ConversionStats {
    /// Fill the element counters from a structural model.
    pub(crate) fn count_model(&mut self, model: &StructuralModel) {
        self.total_pages = model.page_count;
        self.section_count = model.sections.len();
        self.equation_count = model.equations.len();
        self.table_count = model.tables.len();
        self.figure_count = model.figures.len();
        self.warning_count = model.warnings.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_result_from_output() {
        let output = ConversionOutput {
            narration: "hello".into(),
            segments: vec![],
            model: StructuralModel::default(),
            audio: vec![0u8; 128],
            evaluation: None,
            stats: ConversionStats::default(),
        };
        let result = JobResult::from(&output);
        assert_eq!(result.audio_bytes, 128);
        assert!(result.evaluation.is_none());
    }
}
