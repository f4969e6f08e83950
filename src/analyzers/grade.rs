//! Scores a single submission against its answer key.

use crate::analyzers::types::{
    AnswerKey, Category, GradeStatus, GradedRecord, QUESTION_COUNT, RosterEntry, Section,
    Submission,
};
use crate::config::MarkingScheme;

/// Marks for a single question.
///
/// | Answer                          | Marks               |
/// |---------------------------------|---------------------|
/// | missing, empty or whitespace    | 0                   |
/// | equal to key (trimmed, no case) | `scheme.correct`    |
/// | anything else                   | `scheme.incorrect`  |
pub fn question_marks(answer: Option<&str>, correct: &str, scheme: &MarkingScheme) -> i32 {
    let given = match answer.map(str::trim) {
        Some(a) if !a.is_empty() => a,
        _ => return 0,
    };

    if given.to_lowercase() == correct.trim().to_lowercase() {
        scheme.correct
    } else {
        scheme.incorrect
    }
}

/// Grades one roster entry.
///
/// A missing submission or answer key yields a zero-mark record with
/// [`GradeStatus::Unprocessed`]; this never fails.
pub fn grade(
    entry: &RosterEntry,
    institution: &str,
    category: Category,
    submission: Option<&Submission>,
    key: Option<&AnswerKey>,
    scheme: &MarkingScheme,
) -> GradedRecord {
    let mut record = GradedRecord {
        username: entry.username.clone(),
        student_name: entry.student_name.clone(),
        institution: institution.to_string(),
        category,
        total_marks: 0,
        section1_marks: 0,
        section2_marks: 0,
        section3_marks: 0,
        status: GradeStatus::Unprocessed,
    };

    let (Some(submission), Some(key)) = (submission, key) else {
        return record;
    };

    let mut sections = [0i32; 3];
    for (question, correct) in &key.questions {
        let Some(section) = Section::of(*question) else {
            continue;
        };
        let answer = submission.answers.get(question).map(String::as_str);
        sections[section.index()] += question_marks(answer, correct, scheme);
    }

    record.section1_marks = sections[0];
    record.section2_marks = sections[1];
    record.section3_marks = sections[2];
    record.total_marks = sections.iter().sum();
    record.status = GradeStatus::Graded;
    record
}

/// Highest achievable total under `scheme`.
pub fn max_marks(scheme: &MarkingScheme) -> i32 {
    QUESTION_COUNT as i32 * scheme.correct
}

/// Total marks as a percentage of the maximum, rounded to two decimals.
pub fn percentage(total_marks: i32, scheme: &MarkingScheme) -> f64 {
    let max = max_marks(scheme);
    if max == 0 {
        return 0.0;
    }
    let pct = f64::from(total_marks) / f64::from(max) * 100.0;
    (pct * 100.0).round() / 100.0
}
