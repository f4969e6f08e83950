//! Assembles ranked standings and per-student reports from engine output.

use crate::analyzers::grade::percentage;
use crate::analyzers::percentile::{FrequencySet, Scope};
use crate::analyzers::rank::Metric;
use crate::analyzers::types::{
    Category, GradedRecord, InstitutionAggregate, InstitutionStanding, RankEntry, Section,
    StudentReport,
};
use crate::config::MarkingScheme;
use std::collections::HashMap;

/// Averages for one institution; ranks are filled in by [`apply_ranks`].
pub fn standing(aggregate: &InstitutionAggregate, include_categories: bool) -> InstitutionStanding {
    let cat = |c: Category| include_categories.then(|| aggregate.average(Some(c)));
    let cat_section =
        |c: Category, s: Section| include_categories.then(|| aggregate.section_average(Some(c), s));

    InstitutionStanding {
        school: aggregate.institution.clone(),
        student_count: aggregate.student_count(),
        average_marks: aggregate.average(None),
        section1_average: aggregate.section_average(None, Section::One),
        section2_average: aggregate.section_average(None, Section::Two),
        section3_average: aggregate.section_average(None, Section::Three),
        category1_average: cat(Category::Category1),
        category1_section1_average: cat_section(Category::Category1, Section::One),
        category1_section2_average: cat_section(Category::Category1, Section::Two),
        category1_section3_average: cat_section(Category::Category1, Section::Three),
        category2_average: cat(Category::Category2),
        category2_section1_average: cat_section(Category::Category2, Section::One),
        category2_section2_average: cat_section(Category::Category2, Section::Two),
        category2_section3_average: cat_section(Category::Category2, Section::Three),
        ..Default::default()
    }
}

fn set_rank(row: &mut InstitutionStanding, metric: Metric, rank: usize) {
    use Category::{Category1, Category2};
    use Section::{One, Three, Two};

    match metric {
        Metric::Overall => row.rank = rank,
        Metric::Section(One) => row.section1_rank = rank,
        Metric::Section(Two) => row.section2_rank = rank,
        Metric::Section(Three) => row.section3_rank = rank,
        Metric::Category(Category1) => row.category1_rank = Some(rank),
        Metric::Category(Category2) => row.category2_rank = Some(rank),
        Metric::CategorySection(Category1, One) => row.category1_section1_rank = Some(rank),
        Metric::CategorySection(Category1, Two) => row.category1_section2_rank = Some(rank),
        Metric::CategorySection(Category1, Three) => row.category1_section3_rank = Some(rank),
        Metric::CategorySection(Category2, One) => row.category2_section1_rank = Some(rank),
        Metric::CategorySection(Category2, Two) => row.category2_section2_rank = Some(rank),
        Metric::CategorySection(Category2, Three) => row.category2_section3_rank = Some(rank),
        Metric::Category(Category::Unclassified)
        | Metric::CategorySection(Category::Unclassified, _) => {}
    }
}

/// Merges per-metric rank entries into the rows, keyed by institution.
pub fn apply_ranks(rows: &mut [InstitutionStanding], entries: &[RankEntry]) {
    let index: HashMap<String, usize> = rows
        .iter()
        .enumerate()
        .map(|(i, r)| (r.school.clone(), i))
        .collect();

    for entry in entries {
        if let Some(&i) = index.get(&entry.institution) {
            set_rank(&mut rows[i], entry.metric, entry.rank);
        }
    }
}

/// Marks, percentage and percentiles of one graded student.
///
/// Percentiles are taken within the student's category; unclassified students
/// get the overall total percentile and no section percentiles.
pub fn student_report(
    record: &GradedRecord,
    frequencies: &FrequencySet,
    scheme: &MarkingScheme,
) -> StudentReport {
    let ranked = record.category.slot().is_some();
    let total_scope = if ranked {
        Scope::Category(record.category)
    } else {
        Scope::Total
    };
    let section = |s: Section| {
        ranked.then(|| {
            frequencies.percentile(
                Scope::CategorySection(record.category, s),
                record.section_marks(s),
            )
        })
    };

    StudentReport {
        username: record.username.clone(),
        student_name: record.student_name.clone(),
        school: record.institution.clone(),
        category: record.category,
        status: record.status,
        total_marks: record.total_marks,
        section1_marks: record.section1_marks,
        section2_marks: record.section2_marks,
        section3_marks: record.section3_marks,
        percentage: percentage(record.total_marks, scheme),
        total_percentile: frequencies.percentile(total_scope, record.total_marks),
        section1_percentile: section(Section::One),
        section2_percentile: section(Section::Two),
        section3_percentile: section(Section::Three),
    }
}
