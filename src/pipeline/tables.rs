//! Table parsing and summarization: tabular value → statistics,
//! narrative, and insights.
//!
//! The raw text of a candidate table region becomes a
//! [`TabularData`] only through [`parse_table`], which may fail on
//! malformed delimiters — region detection upstream is a best-effort
//! classifier and hands us non-tabular text routinely. Parse failure is
//! non-fatal by contract: the caller downgrades to
//! [`fallback_summary`], never to an error.

use crate::model::{CellValue, TabularData};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The raw region text did not parse into a tabular value.
#[derive(Debug, Clone, Error)]
pub enum TableParseError {
    #[error("region has no content lines")]
    Empty,
    #[error("region has fewer than two columns")]
    TooFewColumns,
    #[error("region has a header but no data rows")]
    NoDataRows,
    #[error("row {row} has {got} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        got: usize,
        expected: usize,
    },
}

/// Per-column descriptive statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnStatistics {
    Numeric {
        name: String,
        mean: f64,
        median: f64,
        min: f64,
        max: f64,
        std_dev: f64,
    },
    Categorical {
        name: String,
        distinct: usize,
        most_frequent: String,
    },
}

/// Summary bundle for one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSummary {
    pub row_count: usize,
    pub column_count: usize,
    /// One entry per column in column order. Columns whose statistics are
    /// undefined (zero data rows) are omitted entirely, never zero-filled.
    pub statistics: Vec<ColumnStatistics>,
    pub narrative: String,
    /// Correlation insights in fixed column-pair order.
    pub insights: Vec<String>,
}

/// Parse a candidate region's text into a tabular value.
///
/// Delimiter detection, most to least structured: `|` cells, tab cells,
/// runs of two or more spaces. The first line is the header.
pub fn parse_table(raw: &str) -> Result<TabularData, TableParseError> {
    let lines: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !is_rule_line(l))
        .collect();

    if lines.is_empty() {
        return Err(TableParseError::Empty);
    }

    let split = pick_splitter(&lines);

    let columns: Vec<String> = split(lines[0]);
    if columns.len() < 2 {
        return Err(TableParseError::TooFewColumns);
    }
    if lines.len() < 2 {
        return Err(TableParseError::NoDataRows);
    }

    let mut rows = Vec::with_capacity(lines.len() - 1);
    for (i, line) in lines[1..].iter().enumerate() {
        let cells = split(line);
        if cells.len() != columns.len() {
            return Err(TableParseError::RaggedRow {
                row: i + 1,
                got: cells.len(),
                expected: columns.len(),
            });
        }
        rows.push(cells.into_iter().map(parse_cell).collect());
    }

    Ok(TabularData { columns, rows })
}

/// Markdown-style separator rows (`|---|---|`) carry no data.
fn is_rule_line(line: &str) -> bool {
    !line.is_empty() && line.chars().all(|c| matches!(c, '-' | '|' | ':' | '+' | ' '))
}

/// Choose the cell splitter that fits the region's lines.
fn pick_splitter(lines: &[&str]) -> fn(&str) -> Vec<String> {
    let pipes = lines.iter().filter(|l| l.contains('|')).count();
    if pipes * 2 >= lines.len() {
        return split_pipes;
    }
    let tabs = lines.iter().filter(|l| l.contains('\t')).count();
    if tabs * 2 >= lines.len() {
        return split_tabs;
    }
    split_spaces
}

fn split_pipes(line: &str) -> Vec<String> {
    line.trim_matches('|')
        .split('|')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

fn split_tabs(line: &str) -> Vec<String> {
    line.split('\t')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

fn split_spaces(line: &str) -> Vec<String> {
    line.split("  ")
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// A cell is numeric when it parses as `f64` after stripping thousands
/// separators and a trailing percent sign.
fn parse_cell(cell: String) -> CellValue {
    let cleaned = cell.trim().trim_end_matches('%').replace(',', "");
    match cleaned.parse::<f64>() {
        Ok(n) => CellValue::Number(n),
        Err(_) => CellValue::Text(cell),
    }
}

/// Summarize a tabular value: per-column statistics, a narrative, and
/// correlation insights.
///
/// Total over its input — no tabular value makes this fail.
pub fn summarize(table: &TabularData) -> TableSummary {
    let row_count = table.row_count();
    let column_count = table.column_count();

    let mut statistics = Vec::with_capacity(column_count);
    let mut numeric_columns: Vec<(usize, Vec<f64>)> = Vec::new();

    for (idx, name) in table.columns.iter().enumerate() {
        match table.numeric_column(idx) {
            Some(values) if !values.is_empty() => {
                let stats = numeric_statistics(name, &values);
                statistics.push(stats);
                numeric_columns.push((idx, values));
            }
            Some(_) => {
                // Zero data rows: statistics undefined, omitted.
            }
            None => {
                if let Some(stats) = categorical_statistics(table, idx, name) {
                    statistics.push(stats);
                }
            }
        }
    }

    let narrative = build_narrative(row_count, column_count, &statistics);
    let insights = correlation_insights(table, &numeric_columns);

    TableSummary {
        row_count,
        column_count,
        statistics,
        narrative,
        insights,
    }
}

/// Minimal summary for a region that refused to parse (or a summarize
/// step that degraded): counts and a generic sentence only.
pub fn fallback_summary(row_count: usize, column_count: usize) -> TableSummary {
    TableSummary {
        row_count,
        column_count,
        statistics: Vec::new(),
        narrative: format!(
            "A table with {} rows and {} columns whose contents could not be summarized.",
            row_count, column_count
        ),
        insights: Vec::new(),
    }
}

fn numeric_statistics(name: &str, values: &[f64]) -> ColumnStatistics {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };

    let min = sorted[0];
    let max = sorted[sorted.len() - 1];

    // Sample standard deviation; a single observation has no spread.
    let std_dev = if values.len() > 1 {
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        var.sqrt()
    } else {
        0.0
    };

    ColumnStatistics::Numeric {
        name: name.to_string(),
        mean,
        median,
        min,
        max,
        std_dev,
    }
}

fn categorical_statistics(
    table: &TabularData,
    idx: usize,
    name: &str,
) -> Option<ColumnStatistics> {
    if table.rows.is_empty() {
        return None;
    }

    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for (order, cell) in table.column(idx).enumerate() {
        let key = match cell {
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => n.to_string(),
        };
        let entry = counts.entry(key).or_insert((0, order));
        entry.0 += 1;
    }

    // Ties broken by first-encountered order.
    let most_frequent = counts
        .iter()
        .max_by(|a, b| {
            a.1 .0
                .cmp(&b.1 .0)
                .then_with(|| b.1 .1.cmp(&a.1 .1))
        })
        .map(|(value, _)| value.clone())?;

    Some(ColumnStatistics::Categorical {
        name: name.to_string(),
        distinct: counts.len(),
        most_frequent,
    })
}

/// One sentence of counts, then one sentence per column in column order,
/// single-space joined.
fn build_narrative(
    row_count: usize,
    column_count: usize,
    statistics: &[ColumnStatistics],
) -> String {
    let mut sentences = Vec::with_capacity(statistics.len() + 1);
    sentences.push(format!(
        "The table contains {} rows and {} columns.",
        row_count, column_count
    ));

    for stats in statistics {
        match stats {
            ColumnStatistics::Numeric {
                name,
                mean,
                min,
                max,
                ..
            } => {
                sentences.push(format!(
                    "{} ranges from {:.2} to {:.2} with a mean of {:.2}.",
                    name, min, max, mean
                ));
            }
            ColumnStatistics::Categorical {
                name,
                distinct,
                most_frequent,
            } => {
                sentences.push(format!(
                    "{} has {} distinct values, most frequently {}.",
                    name, distinct, most_frequent
                ));
            }
        }
    }

    sentences.join(" ")
}

/// Pearson correlation over every unordered pair of numeric columns, in
/// column order; |r| > 0.7 produces one insight sentence.
fn correlation_insights(
    table: &TabularData,
    numeric_columns: &[(usize, Vec<f64>)],
) -> Vec<String> {
    let mut insights = Vec::new();

    for (i, (col_a, values_a)) in numeric_columns.iter().enumerate() {
        for (col_b, values_b) in numeric_columns.iter().skip(i + 1) {
            let Some(r) = pearson(values_a, values_b) else {
                continue;
            };
            if r.abs() > 0.7 {
                let direction = if r > 0.0 { "positive" } else { "negative" };
                insights.push(format!(
                    "{} and {} show a strong {} correlation ({:.2}).",
                    table.columns[*col_a], table.columns[*col_b], direction, r
                ));
            }
        }
    }

    insights
}

/// Pearson correlation coefficient; `None` when undefined (length
/// mismatch, fewer than two observations, or zero variance).
fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric_table() -> TabularData {
        parse_table("x\ty\n1\t2\n3\t6\n5\t10").unwrap()
    }

    #[test]
    fn parse_pipe_table() {
        let t = parse_table("| name | score |\n|---|---|\n| a | 1 |\n| b | 2 |").unwrap();
        assert_eq!(t.columns, vec!["name", "score"]);
        assert_eq!(t.row_count(), 2);
        assert_eq!(t.rows[0][1], CellValue::Number(1.0));
    }

    #[test]
    fn parse_space_aligned_table() {
        let t = parse_table("model  accuracy\nbert   0.81\ngpt    0.89").unwrap();
        assert_eq!(t.column_count(), 2);
        assert_eq!(t.rows[1][0], CellValue::Text("gpt".into()));
    }

    #[test]
    fn parse_rejects_prose() {
        assert!(parse_table("This paragraph is not a table at all.").is_err());
    }

    #[test]
    fn parse_rejects_ragged_rows() {
        let err = parse_table("a\tb\n1\t2\t3").unwrap_err();
        assert!(matches!(err, TableParseError::RaggedRow { .. }));
    }

    #[test]
    fn numeric_statistics_are_correct() {
        let summary = summarize(&numeric_table());
        match &summary.statistics[0] {
            ColumnStatistics::Numeric {
                mean,
                median,
                min,
                max,
                std_dev,
                ..
            } => {
                assert_eq!(*mean, 3.0);
                assert_eq!(*median, 3.0);
                assert_eq!(*min, 1.0);
                assert_eq!(*max, 5.0);
                assert!((std_dev - 2.0).abs() < 1e-9);
            }
            other => panic!("expected numeric stats, got {other:?}"),
        }
    }

    #[test]
    fn perfectly_correlated_pair_yields_insight() {
        let summary = summarize(&numeric_table());
        assert_eq!(summary.insights.len(), 1);
        let insight = &summary.insights[0];
        assert!(insight.contains('x') && insight.contains('y'), "got: {insight}");
        assert!(insight.contains("positive"), "got: {insight}");
        assert!(insight.contains("1.00"), "got: {insight}");
    }

    #[test]
    fn no_numeric_columns_means_no_numeric_stats_and_no_insights() {
        let t = parse_table("fruit\tcolor\napple\tred\npear\tgreen\nplum\tred").unwrap();
        let summary = summarize(&t);
        assert!(summary
            .statistics
            .iter()
            .all(|s| matches!(s, ColumnStatistics::Categorical { .. })));
        assert!(summary.insights.is_empty());
    }

    #[test]
    fn categorical_tie_broken_by_first_encountered() {
        let t = parse_table("tag\tn\nred\t1\nblue\t2\nred\t3\nblue\t4").unwrap();
        let summary = summarize(&t);
        let tag_stats = summary
            .statistics
            .iter()
            .find(|s| matches!(s, ColumnStatistics::Categorical { name, .. } if name == "tag"))
            .unwrap();
        match tag_stats {
            ColumnStatistics::Categorical {
                distinct,
                most_frequent,
                ..
            } => {
                assert_eq!(*distinct, 2);
                assert_eq!(most_frequent, "red");
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn negative_correlation_reported() {
        let t = parse_table("a\tb\n1\t10\n2\t8\n3\t6\n4\t4").unwrap();
        let summary = summarize(&t);
        assert_eq!(summary.insights.len(), 1);
        assert!(summary.insights[0].contains("negative"));
    }

    #[test]
    fn narrative_mentions_counts_and_columns_in_order() {
        let summary = summarize(&numeric_table());
        assert!(summary.narrative.starts_with("The table contains 3 rows and 2 columns."));
        let x_pos = summary.narrative.find("x ranges").unwrap();
        let y_pos = summary.narrative.find("y ranges").unwrap();
        assert!(x_pos < y_pos);
    }

    #[test]
    fn fallback_summary_has_counts_only() {
        let summary = fallback_summary(7, 3);
        assert_eq!(summary.row_count, 7);
        assert!(summary.statistics.is_empty());
        assert!(summary.insights.is_empty());
        assert!(summary.narrative.contains("7 rows"));
    }

    #[test]
    fn constant_column_produces_no_insight() {
        let t = parse_table("a\tb\n1\t5\n2\t5\n3\t5").unwrap();
        let summary = summarize(&t);
        assert!(summary.insights.is_empty());
    }
}
