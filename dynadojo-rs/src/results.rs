//! Result rows and tables.
//!
//! Every single-size evaluation appends one [`ResultRow`]. Rows from the
//! search engine additionally carry a [`SearchAnnotation`] with the cell's
//! answer and the search parameters that produced it. Cells build their own
//! [`ResultTable`]; the challenge concatenates them in cell order once every
//! cell has finished.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::search::SearchOutcome;
use crate::timing::Duration;

/// Search parameters and outcome attached to every row of a search cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchAnnotation {
    /// The cell's answer.
    pub n_target: SearchOutcome,
    /// Error the search aimed for.
    pub target_error: f64,
    /// First size probed.
    pub n_start: usize,
    /// Smoothing half-width.
    pub n_window: usize,
    /// Bracket width at which the search stopped.
    pub n_precision: usize,
    /// Largest size the search could probe.
    pub n_max: usize,
    /// Seed of the cell's system.
    pub system_seed: Option<u64>,
    /// Seed of every model built in the cell.
    pub model_seed: Option<u64>,
}

/// One evaluated training-set size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    /// Repetition index.
    pub rep: usize,
    /// Monotonic run identifier (sweep driver only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<u64>,
    /// True state dimension.
    pub latent_dim: usize,
    /// Observed state dimension.
    pub embed_dim: usize,
    /// Training trajectory length.
    pub timesteps: usize,
    /// Training-set size.
    pub n: usize,
    /// In-distribution test error.
    pub error: f64,
    /// Out-of-distribution test error, when measured.
    pub ood_error: Option<f64>,
    /// Total control cost spent during closed-loop training.
    pub cost: f64,
    /// Wall-clock time of the run.
    pub duration: Duration,
    /// Present on rows produced by the search engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchAnnotation>,
}

impl ResultRow {
    /// The error a search over this row would act on.
    #[must_use]
    pub fn decision_error(&self) -> f64 {
        self.ood_error.unwrap_or(self.error)
    }
}

/// Distinct answer of one search cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchTarget {
    /// Repetition index.
    pub rep: usize,
    /// True state dimension.
    pub latent_dim: usize,
    /// Observed state dimension.
    pub embed_dim: usize,
    /// The cell's answer.
    pub n_target: SearchOutcome,
    /// Seed of the cell's system.
    pub system_seed: Option<u64>,
    /// Seed of the cell's models.
    pub model_seed: Option<u64>,
}

/// Append-only collection of result rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    rows: Vec<ResultRow>,
}

impl ResultTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a row.
    pub fn push(&mut self, row: ResultRow) {
        self.rows.push(row);
    }

    /// Appends every row of `other`.
    pub fn extend(&mut self, other: Self) {
        self.rows.extend(other.rows);
    }

    /// Concatenates tables in iteration order.
    #[must_use]
    pub fn concat(tables: impl IntoIterator<Item = Self>) -> Self {
        let mut out = Self::new();
        for table in tables {
            out.extend(table);
        }
        out
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows in insertion order.
    #[must_use]
    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    /// Iterates over the rows.
    pub fn iter(&self) -> std::slice::Iter<'_, ResultRow> {
        self.rows.iter()
    }

    /// Attaches `annotation` to every row.
    pub fn annotate(&mut self, annotation: SearchAnnotation) {
        for row in &mut self.rows {
            row.search = Some(annotation);
        }
    }

    /// Rows of one `(rep, latent_dim)` cell.
    pub fn cell(&self, rep: usize, latent_dim: usize) -> impl Iterator<Item = &ResultRow> {
        self.rows
            .iter()
            .filter(move |r| r.rep == rep && r.latent_dim == latent_dim)
    }

    /// One record per search cell, in first-seen order.
    #[must_use]
    pub fn search_targets(&self) -> Vec<SearchTarget> {
        let mut seen = BTreeSet::new();
        let mut targets = Vec::new();
        for row in &self.rows {
            let Some(search) = row.search else { continue };
            if seen.insert((row.rep, row.latent_dim, row.embed_dim)) {
                targets.push(SearchTarget {
                    rep: row.rep,
                    latent_dim: row.latent_dim,
                    embed_dim: row.embed_dim,
                    n_target: search.n_target,
                    system_seed: search.system_seed,
                    model_seed: search.model_seed,
                });
            }
        }
        targets
    }

    /// Exports the table to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a table previously written by [`ResultTable::to_json`].
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Returns a console-friendly summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let cells: BTreeSet<_> = self
            .rows
            .iter()
            .map(|r| (r.rep, r.latent_dim, r.embed_dim))
            .collect();
        let best = self
            .rows
            .iter()
            .map(ResultRow::decision_error)
            .fold(f64::INFINITY, f64::min);
        let total_cost: f64 = self.rows.iter().map(|r| r.cost).sum();
        let total_time: Duration = self.rows.iter().map(|r| r.duration).sum();

        let mut out = format!(
            "Evaluation Summary:\n\
             ├─ Rows: {}\n\
             ├─ Cells: {}\n\
             ├─ Best Error: {:.4}\n\
             ├─ Total Control Cost: {:.4}\n\
             └─ Training Time: {:.2}s",
            self.rows.len(),
            cells.len(),
            best,
            total_cost,
            total_time.as_secs_f64(),
        );
        let targets = self.search_targets();
        if !targets.is_empty() {
            out.push_str("\nSearch Targets:");
            for t in &targets {
                out.push_str(&format!(
                    "\n  rep={} L={} E={} n_target={}",
                    t.rep, t.latent_dim, t.embed_dim, t.n_target
                ));
            }
        }
        out
    }
}

impl IntoIterator for ResultTable {
    type Item = ResultRow;
    type IntoIter = std::vec::IntoIter<ResultRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultTable {
    type Item = &'a ResultRow;
    type IntoIter = std::slice::Iter<'a, ResultRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl FromIterator<ResultRow> for ResultTable {
    fn from_iter<I: IntoIterator<Item = ResultRow>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}
