//! Document structure extraction: one forward pass over pages producing
//! the structural model.
//!
//! Each per-page extractor call is isolated — a failure in one extractor
//! on one page degrades to "no elements from that page", records an
//! [`ExtractWarning`], and never aborts the pass. The page loop is the
//! only place that policy lives; the scanners themselves are pure
//! functions over one page.

use crate::model::{
    BlockKind, Document, Equation, ExtractWarning, Figure, LayoutBlock, Metadata, Page, Region,
    Section, StructuralModel, Table,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Vertical tolerance (page points) for grouping blocks into one row.
const ROW_TOLERANCE: f32 = 5.0;

/// Horizontal tolerance (page points) for column alignment across rows.
const COLUMN_TOLERANCE: f32 = 15.0;

/// Canonical section names recognised case-sensitively as whole lines.
const CANONICAL_SECTIONS: &[&str] = &[
    "Abstract",
    "Introduction",
    "Methodology",
    "Results",
    "Discussion",
    "Conclusion",
    "References",
];

/// Produce a structural model from a document in a single forward pass.
///
/// Per-page/per-extractor failures are absorbed into
/// [`StructuralModel::warnings`]; this function itself never fails —
/// unreadable input is rejected upstream by the read stage.
pub fn analyze(document: &Document) -> StructuralModel {
    let mut model = StructuralModel {
        page_count: document.page_count(),
        ..Default::default()
    };
    let mut section_index: HashMap<String, usize> = HashMap::new();

    for page in &document.pages {
        match scan_sections(&page.text) {
            Ok(found) => {
                for (name, line) in found {
                    // Repeats overwrite the recorded location in place;
                    // uniqueness is by exact string.
                    match section_index.get(&name) {
                        Some(&idx) => {
                            model.sections[idx].page = page.index;
                            model.sections[idx].line = line;
                        }
                        None => {
                            section_index.insert(name.clone(), model.sections.len());
                            model.sections.push(Section {
                                name,
                                page: page.index,
                                line,
                            });
                        }
                    }
                }
            }
            Err(detail) => record_warning(&mut model, page.index, "sections", detail),
        }

        match scan_equations(page) {
            Ok(mut found) => model.equations.append(&mut found),
            Err(detail) => record_warning(&mut model, page.index, "equations", detail),
        }

        match scan_tables(page) {
            Ok(mut found) => model.tables.append(&mut found),
            Err(detail) => record_warning(&mut model, page.index, "tables", detail),
        }

        match scan_figures(page) {
            Ok(mut found) => model.figures.append(&mut found),
            Err(detail) => record_warning(&mut model, page.index, "figures", detail),
        }
    }

    model.metadata = extract_metadata(document);

    debug!(
        "Analysis complete: {} sections, {} equations, {} tables, {} figures, {} warnings",
        model.sections.len(),
        model.equations.len(),
        model.tables.len(),
        model.figures.len(),
        model.warnings.len()
    );

    model
}

fn record_warning(model: &mut StructuralModel, page: usize, stage: &'static str, detail: String) {
    warn!("Page {}: {} extraction degraded: {}", page + 1, stage, detail);
    model.warnings.push(ExtractWarning {
        page,
        stage: stage.to_string(),
        detail,
    });
}

// ── Sections ─────────────────────────────────────────────────────────────

static MD_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,3}\s+(\S.*)$").unwrap());

/// Scan page text lines for section headers.
///
/// Recognisers in fixed order, first match wins per line: markdown-style
/// heading markers, all-uppercase lines, canonical whole-line names.
fn scan_sections(text: &str) -> Result<Vec<(String, usize)>, String> {
    let mut found = Vec::new();
    for (line_idx, line) in text.lines().enumerate() {
        if let Some(name) = recognize_section(line) {
            found.push((name, line_idx));
        }
    }
    Ok(found)
}

fn recognize_section(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(caps) = MD_HEADING.captures(trimmed) {
        return Some(caps[1].trim().to_string());
    }

    if is_all_uppercase_heading(trimmed) {
        return Some(trimmed.to_string());
    }

    if CANONICAL_SECTIONS.contains(&trimmed) {
        return Some(trimmed.to_string());
    }

    None
}

/// All-uppercase heading: short line whose every alphabetic character is
/// uppercase, with at least one alphabetic character.
fn is_all_uppercase_heading(line: &str) -> bool {
    if line.len() < 4 || line.len() > 80 {
        return false;
    }
    let mut has_alpha = false;
    for c in line.chars() {
        if c.is_alphabetic() {
            has_alpha = true;
            if !c.is_uppercase() {
                return false;
            }
        }
    }
    has_alpha
}

// ── Equations ────────────────────────────────────────────────────────────

/// The four markup-span patterns, in fixed scan order.
static EQUATION_PATTERNS: Lazy<[Regex; 4]> = Lazy::new(|| {
    [
        Regex::new(r"(?s)\$\$(.+?)\$\$").unwrap(),
        Regex::new(r"\$([^$]+?)\$").unwrap(),
        Regex::new(r"(?s)\\\[(.+?)\\\]").unwrap(),
        Regex::new(r"(?s)\\\((.+?)\\\)").unwrap(),
    ]
});

/// Collect all non-overlapping matches of all four patterns.
///
/// Duplicates across pattern types (a `$$…$$` span re-matched by the
/// single-dollar pattern) are kept on purpose: each counted occurrence
/// becomes one equation.
fn scan_equations(page: &Page) -> Result<Vec<Equation>, String> {
    let mut equations = Vec::new();
    for pattern in EQUATION_PATTERNS.iter() {
        for caps in pattern.captures_iter(&page.text) {
            let whole = caps.get(0).ok_or_else(|| "missing match group".to_string())?;
            let inner = caps.get(1).ok_or_else(|| "missing capture group".to_string())?;
            equations.push(Equation {
                markup: inner.as_str().trim().to_string(),
                page: page.index,
                span: (whole.start(), whole.end()),
            });
        }
    }
    Ok(equations)
}

// ── Tables ───────────────────────────────────────────────────────────────

/// Identify grid-like candidate regions from layout blocks and re-extract
/// the text confined to each.
///
/// Best-effort classifier: rows are blocks grouped by vertical tolerance;
/// a run of two or more consecutive rows with the same column count (≥ 2)
/// and aligned column positions is a candidate. Misclassified regions are
/// harmless — the summarizer degrades to a placeholder on parse failure.
fn scan_tables(page: &Page) -> Result<Vec<Table>, String> {
    let mut blocks: Vec<&LayoutBlock> = page
        .blocks
        .iter()
        .filter(|b| b.kind == BlockKind::Text && !b.text.trim().is_empty())
        .collect();

    if blocks
        .iter()
        .any(|b| !b.region.x.is_finite() || !b.region.y.is_finite())
    {
        return Err("layout geometry contains non-finite coordinates".to_string());
    }

    blocks.sort_by(|a, b| {
        a.region
            .y
            .partial_cmp(&b.region.y)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                a.region
                    .x
                    .partial_cmp(&b.region.x)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });

    // Group into rows by y tolerance.
    let mut rows: Vec<Vec<&LayoutBlock>> = Vec::new();
    for block in blocks {
        let same_row = rows
            .last()
            .is_some_and(|row| (block.region.y - row[0].region.y).abs() <= ROW_TOLERANCE);
        if same_row {
            if let Some(row) = rows.last_mut() {
                row.push(block);
            }
        } else {
            rows.push(vec![block]);
        }
    }
    for row in &mut rows {
        row.sort_by(|a, b| {
            a.region
                .x
                .partial_cmp(&b.region.x)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    // Find runs of consecutive rows forming an aligned grid.
    let mut tables = Vec::new();
    let mut run_start = 0;
    let mut i = 0;
    while i < rows.len() {
        let extends_run = i > run_start && rows_align(&rows[i - 1], &rows[i]);
        if !extends_run {
            if i - run_start >= 2 && rows[run_start].len() >= 2 {
                tables.push(build_table(page.index, &rows[run_start..i]));
            }
            run_start = i;
        }
        i += 1;
    }
    if rows.len() - run_start >= 2 && rows[run_start].len() >= 2 {
        tables.push(build_table(page.index, &rows[run_start..]));
    }

    Ok(tables)
}

/// Two rows align when they have the same column count (≥ 2) and each
/// column starts within tolerance of its counterpart.
fn rows_align(a: &[&LayoutBlock], b: &[&LayoutBlock]) -> bool {
    if a.len() != b.len() || a.len() < 2 {
        return false;
    }
    a.iter()
        .zip(b)
        .all(|(x, y)| (x.region.x - y.region.x).abs() <= COLUMN_TOLERANCE)
}

/// Re-extract the text confined to a candidate region: one line per row,
/// cells tab-separated, and the union bounding region.
fn build_table(page: usize, rows: &[Vec<&LayoutBlock>]) -> Table {
    let mut region = rows[0][0].region;
    let mut lines = Vec::with_capacity(rows.len());
    for row in rows {
        for block in row {
            region = region.union(&block.region);
        }
        let cells: Vec<&str> = row.iter().map(|b| b.text.trim()).collect();
        lines.push(cells.join("\t"));
    }
    Table {
        raw_text: lines.join("\n"),
        region,
        page,
    }
}

// ── Figures ──────────────────────────────────────────────────────────────

static FIGURE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:Figure|Fig\.)\s*(\d+[A-Za-z]?)\s*[:.\u{2013}-]\s*").unwrap());

static WHITESPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Scan page text for figure captions: a `Figure`/`Fig.` marker followed
/// by a numeral and separator, caption running to the next marker or end
/// of page.
fn scan_figures(page: &Page) -> Result<Vec<Figure>, String> {
    let markers: Vec<(usize, usize, String)> = FIGURE_MARKER
        .captures_iter(&page.text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some((whole.start(), whole.end(), caps[1].to_string()))
        })
        .collect();

    let mut figures = Vec::with_capacity(markers.len());
    for (i, (_, caption_start, number)) in markers.iter().enumerate() {
        let caption_end = markers
            .get(i + 1)
            .map(|(next_start, _, _)| *next_start)
            .unwrap_or(page.text.len());
        let caption = WHITESPACE_RUNS
            .replace_all(page.text[*caption_start..caption_end].trim(), " ")
            .to_string();
        figures.push(Figure {
            number: number.clone(),
            caption,
            page: page.index,
        });
    }
    Ok(figures)
}

// ── Metadata ─────────────────────────────────────────────────────────────

/// Derive title and authors from the first page; raw source metadata is
/// carried through verbatim. Absent values stay empty — never an error.
fn extract_metadata(document: &Document) -> Metadata {
    let mut metadata = Metadata {
        raw: document.raw_metadata.clone(),
        ..Default::default()
    };

    if let Some(first) = document.pages.first() {
        if let Some((title, title_block)) = extract_title(first) {
            metadata.authors = extract_authors(first, title_block);
            metadata.title = Some(title);
        }
    }

    // Fall back to the source-format title tag when the layout heuristic
    // finds nothing.
    if metadata.title.is_none() {
        metadata.title = document
            .raw_metadata
            .get("Title")
            .filter(|t| !t.trim().is_empty())
            .map(|t| t.trim().to_string());
    }

    metadata
}

/// Title heuristic: the largest-font text block on the first page.
/// Ties keep the first block in reading order.
fn extract_title(page: &Page) -> Option<(String, usize)> {
    let mut best: Option<(usize, &LayoutBlock)> = None;
    for (idx, block) in page.blocks.iter().enumerate() {
        if block.kind != BlockKind::Text || block.text.trim().is_empty() || block.font_size <= 0.0
        {
            continue;
        }
        match best {
            Some((_, current)) if block.font_size <= current.font_size => {}
            _ => best = Some((idx, block)),
        }
    }
    best.map(|(idx, block)| {
        let title = WHITESPACE_RUNS
            .replace_all(block.text.trim(), " ")
            .to_string();
        (title, idx)
    })
}

/// Author heuristic: the first post-title block that reads like a
/// separator-joined name list.
fn extract_authors(page: &Page, title_block: usize) -> Vec<String> {
    for block in page.blocks.iter().skip(title_block + 1).take(5) {
        if block.kind != BlockKind::Text {
            continue;
        }
        let names = split_author_names(&block.text);
        if !names.is_empty() {
            return names;
        }
    }
    Vec::new()
}

fn split_author_names(text: &str) -> Vec<String> {
    let normalized = WHITESPACE_RUNS.replace_all(text.trim(), " ").to_string();
    let candidates: Vec<String> = normalized
        .replace(" and ", ",")
        .split([',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let all_plausible = !candidates.is_empty()
        && candidates.iter().all(|name| {
            let words = name.split_whitespace().count();
            (1..=5).contains(&words)
                && name.len() < 60
                && !name.chars().any(|c| c.is_ascii_digit())
                && name.chars().next().is_some_and(|c| c.is_uppercase())
        });

    // A single token with no separators is more likely a subtitle than an
    // author list.
    if all_plausible && (candidates.len() >= 2 || text.contains(',')) {
        candidates
    } else {
        Vec::new()
    }
}
