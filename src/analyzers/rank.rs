//! Per-metric descending ranking of institutions.
//!
//! Every metric is ranked in its own pass over the aggregates in input order,
//! so a rank computed for one metric never leaks into another.

use crate::analyzers::types::{Category, InstitutionAggregate, RankEntry, Section};
use crate::config::TiePolicy;
use serde::Serialize;
use std::cmp::Ordering;

/// The twelve rankable averages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    Overall,
    Section(Section),
    Category(Category),
    CategorySection(Category, Section),
}

impl Metric {
    /// All metrics, in report column order.
    pub fn all() -> Vec<Metric> {
        let mut metrics = vec![Metric::Overall];
        metrics.extend(Section::ALL.map(Metric::Section));
        for category in Category::RANKED {
            metrics.push(Metric::Category(category));
            metrics.extend(Section::ALL.map(|s| Metric::CategorySection(category, s)));
        }
        metrics
    }

    /// Whether the metric is scoped to a category.
    pub fn is_categorized(self) -> bool {
        matches!(self, Metric::Category(_) | Metric::CategorySection(..))
    }

    pub fn value(self, aggregate: &InstitutionAggregate) -> f64 {
        match self {
            Metric::Overall => aggregate.average(None),
            Metric::Section(s) => aggregate.section_average(None, s),
            Metric::Category(c) => aggregate.average(Some(c)),
            Metric::CategorySection(c, s) => aggregate.section_average(Some(c), s),
        }
    }
}

/// Ranks `aggregates` by one metric, highest value first.
///
/// The result is in rank order. Sorting is stable, so with
/// [`TiePolicy::InputOrder`] equal values keep their input order and ranks are
/// exactly `1..=N`. With [`TiePolicy::Competition`] equal values share the
/// best rank and the next distinct value skips ahead (1-2-2-4).
///
/// Every pass starts from the canonical institution order of `aggregates`, so
/// ties keep that order regardless of how earlier metrics were ranked.
pub fn rank_by(
    aggregates: &[InstitutionAggregate],
    metric: Metric,
    policy: TiePolicy,
) -> Vec<RankEntry> {
    let mut scored: Vec<(&str, f64)> = aggregates
        .iter()
        .map(|a| (a.institution.as_str(), metric.value(a)))
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    let mut entries: Vec<RankEntry> = Vec::with_capacity(scored.len());
    for (position, (institution, value)) in scored.into_iter().enumerate() {
        let rank = match (policy, entries.last()) {
            (TiePolicy::Competition, Some(prev)) if prev.value == value => prev.rank,
            _ => position + 1,
        };
        entries.push(RankEntry {
            institution: institution.to_string(),
            metric,
            value,
            rank,
        });
    }

    entries
}

/// Runs one independent pass per metric.
pub fn rank_all(
    aggregates: &[InstitutionAggregate],
    metrics: &[Metric],
    policy: TiePolicy,
) -> Vec<RankEntry> {
    metrics
        .iter()
        .flat_map(|m| rank_by(aggregates, *m, policy))
        .collect()
}
