//! Data types shared by the grading, aggregation and ranking pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Number of questions in every exam set.
pub const QUESTION_COUNT: u32 = 25;

/// Contiguous, disjoint question ranges making up the three sections.
pub const SECTIONS: [(u32, u32); 3] = [(1, 10), (11, 20), (21, 25)];

/// One of the three exam sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Section {
    One,
    Two,
    Three,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::One, Section::Two, Section::Three];

    /// Returns the section a question number belongs to, if any.
    pub fn of(question: u32) -> Option<Section> {
        Self::ALL.into_iter().find(|s| {
            let (lo, hi) = SECTIONS[s.index()];
            (lo..=hi).contains(&question)
        })
    }

    pub fn index(self) -> usize {
        match self {
            Section::One => 0,
            Section::Two => 1,
            Section::Three => 2,
        }
    }

    pub fn number(self) -> usize {
        self.index() + 1
    }
}

/// Competition bracket derived from the exam-set id prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Category 1", alias = "category1")]
    Category1,
    #[serde(rename = "Category 2", alias = "category2")]
    Category2,
    #[serde(rename = "Unclassified", alias = "unclassified")]
    Unclassified,
}

impl Category {
    /// The two ranked categories, in report order.
    pub const RANKED: [Category; 2] = [Category::Category1, Category::Category2];

    /// Slot of a ranked category in per-category arrays. `None` for unclassified.
    pub fn slot(self) -> Option<usize> {
        match self {
            Category::Category1 => Some(0),
            Category::Category2 => Some(1),
            Category::Unclassified => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Category::Category1 => "Category 1",
            Category::Category2 => "Category 2",
            Category::Unclassified => "Unclassified",
        };
        f.write_str(label)
    }
}

/// Canonical correct answers for one exam set.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AnswerKey {
    #[serde(rename = "setId")]
    pub set_id: String,
    #[serde(rename = "answers")]
    pub questions: BTreeMap<u32, String>,
}

impl AnswerKey {
    /// Question numbers that fall outside every section.
    pub fn stray_questions(&self) -> Vec<u32> {
        self.questions
            .keys()
            .copied()
            .filter(|q| Section::of(*q).is_none())
            .collect()
    }
}

/// One student's recorded answers for one exam set.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub student_id: String,
    pub institution: String,
    pub set_id: String,
    pub answers: BTreeMap<u32, String>,
}

/// One line of the roster as handed over by the roster store.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RosterEntry {
    pub username: String,
    #[serde(rename = "student")]
    pub student_name: String,
    #[serde(rename = "school")]
    pub institution: String,
    #[serde(rename = "setid")]
    pub set_id: String,
    #[serde(rename = "timeLeft")]
    pub time_left: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradeStatus {
    Graded,
    Unprocessed,
}

/// A submission scored against its answer key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedRecord {
    pub username: String,
    pub student_name: String,
    pub institution: String,
    pub category: Category,
    pub total_marks: i32,
    pub section1_marks: i32,
    pub section2_marks: i32,
    pub section3_marks: i32,
    pub status: GradeStatus,
}

impl GradedRecord {
    pub fn section_marks(&self, section: Section) -> i32 {
        match section {
            Section::One => self.section1_marks,
            Section::Two => self.section2_marks,
            Section::Three => self.section3_marks,
        }
    }

    pub fn is_graded(&self) -> bool {
        self.status == GradeStatus::Graded
    }
}

/// Running count and sums for one group of students.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupTotals {
    pub count: usize,
    pub sum: i64,
    pub section_sums: [i64; 3],
}

impl GroupTotals {
    pub fn add(&mut self, record: &GradedRecord) {
        self.count += 1;
        self.sum += i64::from(record.total_marks);
        for section in Section::ALL {
            self.section_sums[section.index()] += i64::from(record.section_marks(section));
        }
    }
}

/// Per-institution totals, overall and split by ranked category.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionAggregate {
    pub institution: String,
    pub overall: GroupTotals,
    pub per_category: [GroupTotals; 2],
}

/// One institution's rank for one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankEntry {
    pub institution: String,
    pub metric: crate::analyzers::rank::Metric,
    pub value: f64,
    pub rank: usize,
}

/// Issued certificate for one eligible student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRecord {
    pub holder_name: String,
    pub certificate_id: String,
    #[serde(rename = "school")]
    pub institution: String,
    pub issue_date: String,
    pub status: String,
    pub category: Category,
}

/// One row of the institution ranking report. Field names are part of the
/// downstream contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionStanding {
    pub school: String,
    pub student_count: usize,
    pub average_marks: f64,
    pub section1_average: f64,
    pub section2_average: f64,
    pub section3_average: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category1_average: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category1_section1_average: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category1_section2_average: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category1_section3_average: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category2_average: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category2_section1_average: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category2_section2_average: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category2_section3_average: Option<f64>,
    pub rank: usize,
    pub section1_rank: usize,
    pub section2_rank: usize,
    pub section3_rank: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category1_rank: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category2_rank: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category1_section1_rank: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category1_section2_rank: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category1_section3_rank: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category2_section1_rank: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category2_section2_rank: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category2_section3_rank: Option<usize>,
}

/// Complete result of one ranking request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub results: Vec<InstitutionStanding>,
    pub total_students_checked: usize,
    pub unprocessed_users: Vec<String>,
    pub unmatched_users: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificates: Option<Vec<CertificateRecord>>,
}

/// Marks, percentage and percentiles for one student.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReport {
    pub username: String,
    pub student_name: String,
    pub school: String,
    pub category: Category,
    pub status: GradeStatus,
    pub total_marks: i32,
    pub section1_marks: i32,
    pub section2_marks: i32,
    pub section3_marks: i32,
    pub percentage: f64,
    pub total_percentile: f64,
    pub section1_percentile: Option<f64>,
    pub section2_percentile: Option<f64>,
    pub section3_percentile: Option<f64>,
}

/// Detail report for a single institution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionReport {
    pub school: String,
    pub students: Vec<StudentReport>,
    pub unprocessed_users: Vec<String>,
}
