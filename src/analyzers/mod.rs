//! Exam grading, aggregation and ranking.
//!
//! Grades each roster entry against its answer key, tags it with a category,
//! sums marks per institution, ranks institutions on twelve metrics and builds
//! percentile tables and certificate ids from the same grouped roster.

pub mod aggregate;
pub mod analyzer;
pub mod category;
pub mod certificate;
pub mod grade;
pub mod institution;
pub mod percentile;
pub mod rank;
pub mod report;
pub mod types;
pub mod utility;
