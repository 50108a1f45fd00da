//! Narrative assembly: structural model → ordered text segments →
//! narration string → fixed-size chunks.
//!
//! Assembly order is fixed and reproducible: metadata (when requested and
//! present), then equations, tables, and sections, each in extraction
//! order. Two runs over the same structural model produce byte-identical
//! narration.

use crate::model::{SegmentKind, StructuralModel, TextSegment};
use crate::pipeline::{equations, tables};
use crate::progress::{Checkpoint, Observer};
use tracing::debug;

/// Fixed spoken labels prefixed to each segment kind.
const EQUATION_LABEL: &str = "Equation:";
const TABLE_LABEL: &str = "Table:";
const SECTION_LABEL: &str = "Section:";

/// Compose the ordered segment sequence for a structural model.
///
/// Deterministic given the same model and `include_metadata` flag. The
/// observer (when present) is notified as each composition stage
/// completes.
pub fn compose_segments(
    model: &StructuralModel,
    include_metadata: bool,
    observer: Option<&Observer>,
) -> Vec<TextSegment> {
    let mut segments = Vec::new();

    // (1) metadata — title then joined author list, only if requested
    // and present.
    if include_metadata {
        if let Some(title) = model.metadata.title.as_deref() {
            segments.push(TextSegment::new(
                SegmentKind::Metadata,
                format!("Title: {}.", title.trim_end_matches('.')),
            ));
        }
        if !model.metadata.authors.is_empty() {
            segments.push(TextSegment::new(
                SegmentKind::Metadata,
                format!("Authors: {}.", model.metadata.authors.join(", ")),
            ));
        }
    }
    notify(observer, Checkpoint::MetadataComposed);

    // (2) equations, extraction order.
    for equation in &model.equations {
        let spoken = equations::verbalize(&equation.markup);
        segments.push(TextSegment::new(
            SegmentKind::Equation,
            format!("{} {}.", EQUATION_LABEL, spoken.trim_end_matches('.')),
        ));
    }
    notify(observer, Checkpoint::EquationsVerbalized);

    // (3) tables, extraction order. A region that refuses to parse gets a
    // page-reference placeholder instead of a summary.
    for table in &model.tables {
        let text = match tables::parse_table(&table.raw_text) {
            Ok(tabular) => {
                let summary = tables::summarize(&tabular);
                let mut text = summary.narrative;
                for insight in &summary.insights {
                    text.push(' ');
                    text.push_str(insight);
                }
                text
            }
            Err(e) => {
                debug!("Table on page {} not summarizable: {}", table.page + 1, e);
                format!("A table appears on page {}.", table.page + 1)
            }
        };
        segments.push(TextSegment::new(
            SegmentKind::Table,
            format!("{} {}", TABLE_LABEL, text),
        ));
    }
    notify(observer, Checkpoint::TablesSummarized);

    // (4) sections, extraction order.
    for section in &model.sections {
        segments.push(TextSegment::new(
            SegmentKind::Section,
            format!("{} {}.", SECTION_LABEL, section.name),
        ));
    }
    notify(observer, Checkpoint::SectionsAppended);

    segments
}

/// Join segments into the narration string, single-space separated.
pub fn join_segments(segments: &[TextSegment]) -> String {
    segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split the narration into fixed-size contiguous character chunks,
/// preserving order.
///
/// Boundaries may fall mid-word; that is accepted behaviour inherited
/// from the fixed-size contract, not a defect. Splitting counts
/// characters, not bytes, so multi-byte text never lands on an invalid
/// boundary.
pub fn chunk_narration(narration: &str, chunk_size: usize) -> Vec<String> {
    debug_assert!(chunk_size > 0, "chunk_size validated at config build");
    let mut chunks = Vec::new();
    let mut current = String::with_capacity(chunk_size.min(narration.len()));
    let mut count = 0;

    for c in narration.chars() {
        current.push(c);
        count += 1;
        if count == chunk_size {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn notify(observer: Option<&Observer>, checkpoint: Checkpoint) {
    if let Some(obs) = observer {
        obs.on_checkpoint(checkpoint);
    }
}
