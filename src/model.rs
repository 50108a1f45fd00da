//! Data model for the decomposition pipeline.
//!
//! Two families of types live here:
//!
//! * The **read-stage model** ([`Document`], [`Page`], [`LayoutBlock`]) —
//!   what the pdfium reader produces. A `Document` is read once at job
//!   start and dropped as soon as extraction has run; nothing downstream
//!   holds onto page text or layout geometry.
//!
//! * The **structural model** ([`StructuralModel`] and its element types)
//!   — the sole output of the structure extractor and the sole input to
//!   narrative assembly. Element ordering inside the model is extraction
//!   order and is what makes narration output deterministic.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Read-stage model ─────────────────────────────────────────────────────

/// A paginated document as produced by the read stage.
#[derive(Debug, Clone)]
pub struct Document {
    /// Raw source-format metadata (PDF info dictionary tags, verbatim).
    pub raw_metadata: HashMap<String, String>,
    /// Pages in document order.
    pub pages: Vec<Page>,
}

impl Document {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Concatenated text of all pages, page order, double-newline joined.
    ///
    /// Used as the "original text" side of the quality-evaluation contract.
    pub fn full_text(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// One page of a [`Document`].
#[derive(Debug, Clone)]
pub struct Page {
    /// 0-based page index.
    pub index: usize,
    /// Full text content of the page, reading order.
    pub text: String,
    /// Typed layout regions in reading order.
    pub blocks: Vec<LayoutBlock>,
}

/// Kind of a layout region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Text,
    Image,
}

/// A typed region on a page.
///
/// Geometry uses top-left-origin page points so "lower on the page" means
/// larger `y` — the reader converts from PDF bottom-origin coordinates.
#[derive(Debug, Clone)]
pub struct LayoutBlock {
    pub kind: BlockKind,
    /// Text content; empty for image blocks.
    pub text: String,
    pub region: Region,
    /// Font size in points; 0.0 for image blocks.
    pub font_size: f32,
}

/// Axis-aligned bounding region in page points, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Region {
    pub fn contains(&self, other: &Region) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x + other.width <= self.x + self.width
            && other.y + other.height <= self.y + self.height
    }

    /// Smallest region covering both `self` and `other`.
    pub fn union(&self, other: &Region) -> Region {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = (self.x + self.width).max(other.x + other.width);
        let bottom = (self.y + self.height).max(other.y + other.height);
        Region {
            x,
            y,
            width: right - x,
            height: bottom - y,
        }
    }
}

// ── Structural model ─────────────────────────────────────────────────────

/// Document metadata derived once per document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub title: Option<String>,
    /// Author names in document order; may be empty.
    pub authors: Vec<String>,
    /// Raw source-format metadata, opaque key/value.
    pub raw: HashMap<String, String>,
}

/// A recognised section header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    /// 0-based page the header was (last) seen on.
    pub page: usize,
    /// 0-based line index within that page's text.
    pub line: usize,
}

/// A mathematical markup span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equation {
    /// Inner markup with delimiters stripped.
    pub markup: String,
    /// 0-based page index.
    pub page: usize,
    /// Byte span of the full delimited match within the page text.
    /// Valid for the page text at extraction time.
    pub span: (usize, usize),
}

/// A candidate table region with its re-extracted text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Text confined to the candidate region, one line per detected row,
    /// cells tab-separated.
    pub raw_text: String,
    pub region: Region,
    /// 0-based page index.
    pub page: usize,
}

/// A figure caption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Figure {
    /// Figure number as printed — may be non-numeric ("3a", "A.1").
    pub number: String,
    pub caption: String,
    /// 0-based page index.
    pub page: usize,
}

/// A non-fatal extraction degradation.
///
/// One extractor failing on one page never aborts the pass; it records a
/// warning here instead (the fatal/non-fatal split described in
/// [`crate::error`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractWarning {
    /// 0-based page index the degradation occurred on.
    pub page: usize,
    /// Which extractor degraded ("sections", "equations", "tables",
    /// "figures").
    pub stage: String,
    pub detail: String,
}

/// The normalised representation of a document's structure.
///
/// Sole output of [`crate::pipeline::extract::analyze`], sole input to
/// [`crate::pipeline::assemble`]. All element vectors are in extraction
/// order (page order, then in-page order).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuralModel {
    pub metadata: Metadata,
    pub sections: Vec<Section>,
    pub equations: Vec<Equation>,
    pub tables: Vec<Table>,
    pub figures: Vec<Figure>,
    /// Non-fatal per-page/per-extractor degradations.
    pub warnings: Vec<ExtractWarning>,
    /// Page count of the source document.
    pub page_count: usize,
}

// ── Narration model ──────────────────────────────────────────────────────

/// Source tag of a narration segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Metadata,
    Equation,
    Table,
    Section,
}

/// An ordered, immutable chunk of speakable text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSegment {
    pub kind: SegmentKind,
    pub text: String,
}

impl TextSegment {
    pub fn new(kind: SegmentKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

// ── Tabular values ───────────────────────────────────────────────────────

/// One parsed table cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(_) => None,
        }
    }
}

/// A parsed tabular value: named columns, ordered rows.
///
/// Only produced by [`crate::pipeline::tables::parse_table`]; a [`Table`]
/// whose raw text does not parse never becomes one of these and degrades
/// to a placeholder summary instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularData {
    pub columns: Vec<String>,
    /// Each row has exactly `columns.len()` cells.
    pub rows: Vec<Vec<CellValue>>,
}

impl TabularData {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Cells of column `idx`, row order.
    pub fn column(&self, idx: usize) -> impl Iterator<Item = &CellValue> {
        self.rows.iter().filter_map(move |r| r.get(idx))
    }

    /// Numeric values of column `idx`, or `None` if any cell is
    /// non-numeric (the column is then categorical).
    pub fn numeric_column(&self, idx: usize) -> Option<Vec<f64>> {
        let mut values = Vec::with_capacity(self.rows.len());
        for cell in self.column(idx) {
            values.push(cell.as_number()?);
        }
        Some(values)
    }
}
