//! Per-institution accumulation of graded records.

use crate::analyzers::institution::InstitutionDirectory;
use crate::analyzers::types::{Category, GradedRecord, GroupTotals, InstitutionAggregate, Section};
use crate::analyzers::utility::average;

/// Sums one institution's graded records, overall and per ranked category.
///
/// Unclassified records count toward the overall totals only. Unprocessed
/// records count with zero marks.
pub fn aggregate_institution<'a>(
    institution: &str,
    records: impl IntoIterator<Item = &'a GradedRecord>,
) -> InstitutionAggregate {
    let mut aggregate = InstitutionAggregate {
        institution: institution.to_string(),
        overall: GroupTotals::default(),
        per_category: [GroupTotals::default(); 2],
    };

    for record in records {
        aggregate.overall.add(record);
        if let Some(slot) = record.category.slot() {
            aggregate.per_category[slot].add(record);
        }
    }

    aggregate
}

/// Builds one aggregate per canonical institution from pre-grouped records.
///
/// `buckets[i]` holds the records of `directory.name(i)`; institutions with no
/// records still get a zero aggregate.
pub fn aggregate_all(
    directory: &InstitutionDirectory,
    buckets: &[Vec<GradedRecord>],
) -> Vec<InstitutionAggregate> {
    (0..directory.len())
        .map(|i| {
            let records = buckets.get(i).map(Vec::as_slice).unwrap_or(&[]);
            aggregate_institution(directory.name(i), records)
        })
        .collect()
}

impl InstitutionAggregate {
    fn totals(&self, category: Option<Category>) -> &GroupTotals {
        match category.and_then(Category::slot) {
            Some(slot) => &self.per_category[slot],
            None => &self.overall,
        }
    }

    /// Average total marks, overall (`None`) or within a ranked category.
    pub fn average(&self, category: Option<Category>) -> f64 {
        let t = self.totals(category);
        average(t.sum, t.count)
    }

    /// Average marks in one section, overall (`None`) or within a ranked category.
    pub fn section_average(&self, category: Option<Category>, section: Section) -> f64 {
        let t = self.totals(category);
        average(t.section_sums[section.index()], t.count)
    }

    pub fn student_count(&self) -> usize {
        self.overall.count
    }
}
