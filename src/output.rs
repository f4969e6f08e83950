//! Output formatting and persistence for reports and graded records.
//!
//! Supports JSON to stdout or a file, and CSV append.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::analyzers::types::GradedRecord;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Prints a report as pretty JSON on stdout.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Writes a report as pretty JSON to `path`, creating parent directories.
pub fn write_json(path: &str, value: &impl Serialize) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let body = serde_json::to_vec_pretty(value)?;
    std::fs::write(path, &body).with_context(|| format!("writing {path}"))?;
    info!(path, bytes = body.len(), "Report written");
    Ok(())
}

/// Appends graded records as rows to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_records(path: &str, records: &[GradedRecord]) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = records.len(), "Appending CSV records");

    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("opening {path}"))?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::types::{Category, GradeStatus};
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    fn record(username: &str) -> GradedRecord {
        GradedRecord {
            username: username.into(),
            student_name: "Asha Rao".into(),
            institution: "APS Mhow".into(),
            category: Category::Category2,
            total_marks: 7,
            section1_marks: 8,
            section2_marks: -1,
            section3_marks: 0,
            status: GradeStatus::Graded,
        }
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&record("NAVYUG1")).unwrap();
    }

    #[test]
    fn test_write_json_creates_parent_dirs() {
        let dir = temp_path("exam_rater_test_json");
        let _ = fs::remove_dir_all(&dir);
        let path = format!("{dir}/nested/report.json");

        write_json(&path, &record("NAVYUG1")).unwrap();

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["totalMarks"], 7);
        assert_eq!(value["category"], "Category 2");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_append_records_writes_header_once() {
        let path = temp_path("exam_rater_test_header.csv");
        let _ = fs::remove_file(&path);

        append_records(&path, &[record("NAVYUG1")]).unwrap();
        append_records(&path, &[record("NAVYUG2"), record("NAVYUG3")]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        let header_count = lines.iter().filter(|l| l.contains("totalMarks")).count();
        assert_eq!(header_count, 1);
        assert!(lines[3].starts_with("NAVYUG3,"));

        fs::remove_file(&path).unwrap();
    }
}
