//! Score-frequency tables and midpoint-rule percentiles.

use crate::analyzers::types::{Category, GradedRecord, Section};
use serde::Serialize;
use std::collections::BTreeMap;

/// Which students and which mark a frequency table is built over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Scope {
    /// Total marks of every graded student.
    Total,
    /// Total marks within one ranked category.
    Category(Category),
    /// One section's marks within one ranked category.
    CategorySection(Category, Section),
}

impl Scope {
    /// The nine scopes used by student reports.
    pub fn all() -> Vec<Scope> {
        let mut scopes = vec![Scope::Total];
        for category in Category::RANKED {
            scopes.push(Scope::Category(category));
            scopes.extend(Section::ALL.map(|s| Scope::CategorySection(category, s)));
        }
        scopes
    }

    /// The mark this scope reads from `record`, if the record belongs to it.
    fn score_of(self, record: &GradedRecord) -> Option<i32> {
        match self {
            Scope::Total => Some(record.total_marks),
            Scope::Category(c) if record.category == c => Some(record.total_marks),
            Scope::CategorySection(c, s) if record.category == c => Some(record.section_marks(s)),
            _ => None,
        }
    }

    /// Stable key used when tables are serialized.
    pub fn key(self) -> String {
        let cat = |c: Category| match c {
            Category::Category1 => "category1",
            Category::Category2 => "category2",
            Category::Unclassified => "unclassified",
        };
        match self {
            Scope::Total => "total".to_string(),
            Scope::Category(c) => cat(c).to_string(),
            Scope::CategorySection(c, s) => format!("{}Section{}", cat(c), s.number()),
        }
    }
}

/// Histogram of score → number of students with exactly that score.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FrequencyTable {
    counts: BTreeMap<i32, usize>,
}

impl FrequencyTable {
    /// One pass over `records`. Unprocessed records are skipped.
    pub fn build<'a>(records: impl IntoIterator<Item = &'a GradedRecord>, scope: Scope) -> Self {
        let mut table = Self::default();
        for record in records {
            if !record.is_graded() {
                continue;
            }
            if let Some(score) = scope.score_of(record) {
                table.insert(score);
            }
        }
        table
    }

    pub fn insert(&mut self, score: i32) {
        *self.counts.entry(score).or_default() += 1;
    }

    pub fn count_at(&self, score: i32) -> usize {
        self.counts.get(&score).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn max_score(&self) -> Option<i32> {
        self.counts.keys().next_back().copied()
    }

    /// `((below + at / 2) / total) * 100`, where `below` counts students
    /// strictly under `score` and `at` those exactly on it. A score missing
    /// from the table has `at = 0`. An empty table yields 0.
    pub fn percentile(&self, score: i32) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let below: usize = self.counts.range(..score).map(|(_, n)| *n).sum();
        let at = self.count_at(score);
        ((below as f64 + at as f64 / 2.0) / total as f64) * 100.0
    }
}

/// All nine frequency tables for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FrequencySet {
    tables: BTreeMap<String, FrequencyTable>,
}

impl FrequencySet {
    pub fn build(records: &[GradedRecord]) -> Self {
        let tables = Scope::all()
            .into_iter()
            .map(|scope| (scope.key(), FrequencyTable::build(records, scope)))
            .collect();
        Self { tables }
    }

    pub fn table(&self, scope: Scope) -> Option<&FrequencyTable> {
        self.tables.get(&scope.key())
    }

    pub fn percentile(&self, scope: Scope, score: i32) -> f64 {
        self.table(scope).map(|t| t.percentile(score)).unwrap_or(0.0)
    }
}
