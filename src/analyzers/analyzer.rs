//! Request-scoped rating pipeline.
//!
//! One roster read, one grouping pass over the roster, then one answer lookup
//! and one key lookup per student. Every engine is fed from the institution
//! buckets built by that single pass. Nothing is cached between requests.

use crate::analyzers::aggregate::aggregate_all;
use crate::analyzers::category::CategoryClassifier;
use crate::analyzers::certificate::CertificateIdGenerator;
use crate::analyzers::grade::grade;
use crate::analyzers::institution::{InstitutionDirectory, same_institution};
use crate::analyzers::percentile::FrequencySet;
use crate::analyzers::rank::{Metric, rank_all};
use crate::analyzers::report::{apply_ranks, standing, student_report};
use crate::analyzers::types::{
    BatchReport, CertificateRecord, GradedRecord, InstitutionReport, RosterEntry, StudentReport,
    Submission,
};
use crate::config::RaterConfig;
use crate::error::RaterResult;
use crate::services::{AnswerKeyStore, RosterStore};
use tracing::{debug, info, warn};

/// Roster entries bucketed by canonical institution.
#[derive(Debug, Clone, Default)]
pub struct RosterGroups {
    /// `buckets[i]` belongs to `directory.name(i)`.
    pub buckets: Vec<Vec<RosterEntry>>,
    /// Entries whose institution matches no canonical name.
    pub unmatched: Vec<RosterEntry>,
}

/// Graded records bucketed the same way as [`RosterGroups`].
#[derive(Debug, Clone, Default)]
pub struct GradedRoster {
    /// The roster grouping the records were graded from.
    pub roster: RosterGroups,
    pub buckets: Vec<Vec<GradedRecord>>,
    pub unmatched: Vec<GradedRecord>,
    pub unprocessed_users: Vec<String>,
    pub total_students_checked: usize,
}

impl GradedRoster {
    /// Every graded record, matched institutions first.
    pub fn records(&self) -> impl Iterator<Item = &GradedRecord> {
        self.buckets.iter().flatten().chain(self.unmatched.iter())
    }

    pub fn unmatched_users(&self) -> Vec<String> {
        self.unmatched.iter().map(|r| r.username.clone()).collect()
    }
}

/// The engine set built from one immutable configuration.
pub struct Rater {
    config: RaterConfig,
    directory: InstitutionDirectory,
    classifier: CategoryClassifier,
}

impl Rater {
    pub fn new(config: RaterConfig) -> Self {
        let directory = InstitutionDirectory::new(&config.institutions);
        let classifier = CategoryClassifier::new(&config.categories);
        Self {
            config,
            directory,
            classifier,
        }
    }

    pub fn config(&self) -> &RaterConfig {
        &self.config
    }

    pub fn directory(&self) -> &InstitutionDirectory {
        &self.directory
    }

    /// Single O(N) pass assigning each roster entry to its institution.
    pub fn group_roster(&self, roster: Vec<RosterEntry>) -> RosterGroups {
        let mut groups = RosterGroups {
            buckets: vec![Vec::new(); self.directory.len()],
            unmatched: Vec::new(),
        };
        for entry in roster {
            match self.directory.position(&entry.institution) {
                Some(i) => groups.buckets[i].push(entry),
                None => {
                    warn!(
                        username = %entry.username,
                        institution = %entry.institution,
                        "Roster entry matches no canonical institution"
                    );
                    groups.unmatched.push(entry);
                }
            }
        }
        groups
    }

    async fn grade_entry<R, K>(
        &self,
        entry: &RosterEntry,
        institution: &str,
        roster: &R,
        keys: &K,
    ) -> RaterResult<GradedRecord>
    where
        R: RosterStore + ?Sized,
        K: AnswerKeyStore + ?Sized,
    {
        let category = self.classifier.classify(&entry.set_id);
        let submission = roster
            .get_answers(&entry.username)
            .await?
            .map(|answers| Submission {
                student_id: entry.username.clone(),
                institution: institution.to_string(),
                set_id: entry.set_id.clone(),
                answers,
            });
        let key = keys.get_key(&entry.set_id).await?;

        if submission.is_none() {
            debug!(username = %entry.username, "No answers recorded");
        } else if key.is_none() {
            debug!(username = %entry.username, set_id = %entry.set_id, "No answer key for set");
        }

        Ok(grade(
            entry,
            institution,
            category,
            submission.as_ref(),
            key.as_ref(),
            &self.config.marking,
        ))
    }

    /// Reads the roster once and grades every student.
    ///
    /// Lookup misses become unprocessed records; any store error aborts.
    #[tracing::instrument(skip_all)]
    pub async fn grade_roster<R, K>(&self, roster: &R, keys: &K) -> RaterResult<GradedRoster>
    where
        R: RosterStore + ?Sized,
        K: AnswerKeyStore + ?Sized,
    {
        let students = roster.list_students().await?;
        let total = students.len();
        let groups = self.group_roster(students);
        let mut graded = GradedRoster {
            buckets: Vec::with_capacity(groups.buckets.len()),
            ..Default::default()
        };

        for (i, entries) in groups.buckets.iter().enumerate() {
            let institution = self.directory.name(i);
            let mut bucket = Vec::with_capacity(entries.len());
            for entry in entries {
                bucket.push(self.grade_entry(entry, institution, roster, keys).await?);
            }
            debug!(institution, students = bucket.len(), "Institution graded");
            graded.buckets.push(bucket);
        }
        for entry in &groups.unmatched {
            let record = self
                .grade_entry(entry, &entry.institution, roster, keys)
                .await?;
            graded.unmatched.push(record);
        }
        graded.roster = groups;

        graded.unprocessed_users = graded
            .records()
            .filter(|r| !r.is_graded())
            .map(|r| r.username.clone())
            .collect();
        graded.total_students_checked = graded
            .buckets
            .iter()
            .flatten()
            .filter(|r| r.is_graded())
            .count();

        info!(
            students = total,
            graded = graded.total_students_checked,
            unprocessed = graded.unprocessed_users.len(),
            unmatched = graded.unmatched.len(),
            "Roster graded"
        );
        Ok(graded)
    }

    fn certificates_from(&self, groups: &RosterGroups) -> Vec<CertificateRecord> {
        let generator = CertificateIdGenerator::new(
            &self.config.credentials,
            &self.config.certificates,
            &self.classifier,
        );
        generator.issue_all(&self.directory, &groups.buckets)
    }

    /// Full ranking report: averages, twelve independent rank passes,
    /// unprocessed users and, when enabled, certificates.
    #[tracing::instrument(skip_all)]
    pub async fn rank_report<R, K>(&self, roster: &R, keys: &K) -> RaterResult<BatchReport>
    where
        R: RosterStore + ?Sized,
        K: AnswerKeyStore + ?Sized,
    {
        let graded = self.grade_roster(roster, keys).await?;
        let aggregates = aggregate_all(&self.directory, &graded.buckets);

        let features = self.config.features;
        let metrics: Vec<Metric> = Metric::all()
            .into_iter()
            .filter(|m| features.include_categories || !m.is_categorized())
            .collect();
        let entries = rank_all(&aggregates, &metrics, self.config.ranking.tie_policy);

        let mut results: Vec<_> = aggregates
            .iter()
            .map(|a| standing(a, features.include_categories))
            .collect();
        apply_ranks(&mut results, &entries);

        let certificates = features
            .include_certificates
            .then(|| self.certificates_from(&graded.roster));

        info!(
            institutions = results.len(),
            metrics = metrics.len(),
            certificates = certificates.as_ref().map(Vec::len),
            "Ranking report built"
        );

        let unmatched_users = graded.unmatched_users();
        Ok(BatchReport {
            results,
            total_students_checked: graded.total_students_checked,
            unprocessed_users: graded.unprocessed_users,
            unmatched_users,
            certificates,
        })
    }

    /// Frequency tables over every graded student.
    pub async fn frequencies<R, K>(&self, roster: &R, keys: &K) -> RaterResult<FrequencySet>
    where
        R: RosterStore + ?Sized,
        K: AnswerKeyStore + ?Sized,
    {
        let graded = self.grade_roster(roster, keys).await?;
        let records: Vec<GradedRecord> = graded.records().cloned().collect();
        Ok(FrequencySet::build(&records))
    }

    /// Student reports for one institution, percentiles taken against every
    /// graded student. `None` if the name matches no canonical institution.
    #[tracing::instrument(skip(self, roster, keys))]
    pub async fn institution_report<R, K>(
        &self,
        institution: &str,
        roster: &R,
        keys: &K,
    ) -> RaterResult<Option<InstitutionReport>>
    where
        R: RosterStore + ?Sized,
        K: AnswerKeyStore + ?Sized,
    {
        let Some(position) = self.directory.position(institution) else {
            warn!("Institution not in canonical list");
            return Ok(None);
        };

        let graded = self.grade_roster(roster, keys).await?;
        let records: Vec<GradedRecord> = graded.records().cloned().collect();
        let frequencies = FrequencySet::build(&records);

        let bucket = &graded.buckets[position];
        let mut students: Vec<StudentReport> = bucket
            .iter()
            .map(|r| student_report(r, &frequencies, &self.config.marking))
            .collect();
        students.sort_by(|a, b| {
            a.category
                .cmp(&b.category)
                .then_with(|| b.total_marks.cmp(&a.total_marks))
        });

        Ok(Some(InstitutionReport {
            school: self.directory.name(position).to_string(),
            students,
            unprocessed_users: bucket
                .iter()
                .filter(|r| !r.is_graded())
                .map(|r| r.username.clone())
                .collect(),
        }))
    }

    /// Report for one student by username.
    pub async fn student_report<R, K>(
        &self,
        username: &str,
        roster: &R,
        keys: &K,
    ) -> RaterResult<Option<StudentReport>>
    where
        R: RosterStore + ?Sized,
        K: AnswerKeyStore + ?Sized,
    {
        let graded = self.grade_roster(roster, keys).await?;
        let records: Vec<GradedRecord> = graded.records().cloned().collect();
        let frequencies = FrequencySet::build(&records);

        Ok(records
            .iter()
            .find(|r| r.username == username)
            .map(|r| student_report(r, &frequencies, &self.config.marking)))
    }

    /// Certificates for every canonical institution. Needs only the roster.
    #[tracing::instrument(skip_all)]
    pub async fn certificates<R>(&self, roster: &R) -> RaterResult<Vec<CertificateRecord>>
    where
        R: RosterStore + ?Sized,
    {
        let groups = self.group_roster(roster.list_students().await?);
        let records = self.certificates_from(&groups);
        info!(certificates = records.len(), "Certificates issued");
        Ok(records)
    }

    /// Graded records for export, optionally limited to one institution.
    pub async fn graded_records<R, K>(
        &self,
        institution: Option<&str>,
        roster: &R,
        keys: &K,
    ) -> RaterResult<Vec<GradedRecord>>
    where
        R: RosterStore + ?Sized,
        K: AnswerKeyStore + ?Sized,
    {
        let graded = self.grade_roster(roster, keys).await?;
        Ok(graded
            .records()
            .filter(|r| institution.is_none_or(|name| same_institution(&r.institution, name)))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::types::{AnswerKey, Category, GradeStatus};
    use crate::error::RaterError;
    use crate::services::{AnswerSheet, MemoryStore};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn entry(username: &str, name: &str, school: &str, set_id: &str) -> RosterEntry {
        RosterEntry {
            username: username.into(),
            student_name: name.into(),
            institution: school.into(),
            set_id: set_id.into(),
            time_left: Some(300),
        }
    }

    fn key(set_id: &str) -> AnswerKey {
        AnswerKey {
            set_id: set_id.into(),
            questions: (1..=25).map(|q| (q, "b".to_string())).collect(),
        }
    }

    fn sheet(username: &str, answers: &[(u32, &str)]) -> AnswerSheet {
        AnswerSheet {
            username: username.into(),
            answers: answers.iter().map(|(q, a)| (*q, a.to_string())).collect(),
        }
    }

    fn config() -> RaterConfig {
        RaterConfig::with_institutions(["Institution X", "Institution Y"])
    }

    struct DownStore;

    #[async_trait::async_trait]
    impl RosterStore for DownStore {
        async fn list_students(&self) -> RaterResult<Vec<RosterEntry>> {
            Err(RaterError::DataSource("connection refused".into()))
        }

        async fn get_answers(&self, _: &str) -> RaterResult<Option<BTreeMap<u32, String>>> {
            Err(RaterError::DataSource("connection refused".into()))
        }
    }

    struct CountingStore {
        inner: MemoryStore,
        roster_reads: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl RosterStore for CountingStore {
        async fn list_students(&self) -> RaterResult<Vec<RosterEntry>> {
            self.roster_reads.fetch_add(1, Ordering::SeqCst);
            self.inner.list_students().await
        }

        async fn get_answers(&self, username: &str) -> RaterResult<Option<BTreeMap<u32, String>>> {
            self.inner.get_answers(username).await
        }
    }

    #[tokio::test]
    async fn test_rank_report_reads_roster_once() {
        let store = CountingStore {
            inner: MemoryStore::new(
                vec![
                    entry("a", "Asha", "Institution X", "670001"),
                    entry("b", "Bela", "Institution Y", "890001"),
                ],
                vec![sheet("a", &[(1, "b")])],
                vec![key("670001")],
            ),
            roster_reads: AtomicUsize::new(0),
        };
        let report = Rater::new(config())
            .rank_report(&store, &store.inner)
            .await
            .unwrap();

        assert_eq!(store.roster_reads.load(Ordering::SeqCst), 1);
        assert_eq!(report.certificates.as_ref().map(Vec::len), Some(2));
        assert_eq!(report.unprocessed_users, vec!["b"]);
    }

    #[tokio::test]
    async fn test_scenario_b_section_average() {
        let store = MemoryStore::new(
            vec![
                entry("A", "Student A", "Institution X", "670001"),
                entry("B", "Student B", "institution x", "670001"),
            ],
            vec![sheet("A", &[(1, "B")]), sheet("B", &[(1, "")])],
            vec![key("670001")],
        );
        let rater = Rater::new(config());
        let report = rater.rank_report(&store, &store).await.unwrap();

        let x = &report.results[0];
        assert_eq!(x.school, "Institution X");
        assert_eq!(x.student_count, 2);
        assert_eq!(x.section1_average, 2.0);
        assert_eq!(x.category1_section1_average, Some(2.0));
        assert_eq!(report.total_students_checked, 2);
        assert!(report.unprocessed_users.is_empty());
    }

    #[tokio::test]
    async fn test_scenario_a_unclassified_only_in_overall() {
        let store = MemoryStore::new(
            vec![
                entry("c1", "One", "Institution X", "670001"),
                entry("c2", "Two", "Institution X", "890002"),
                entry("u", "Three", "Institution X", "120003"),
            ],
            vec![
                sheet("c1", &[(1, "b")]),
                sheet("c2", &[(1, "b"), (2, "b")]),
                sheet("u", &[(1, "b"), (2, "b"), (3, "b")]),
            ],
            vec![key("670001"), key("890002"), key("120003")],
        );
        let rater = Rater::new(config());
        let report = rater.rank_report(&store, &store).await.unwrap();
        let x = &report.results[0];

        assert_eq!(x.average_marks, (4.0 + 8.0 + 12.0) / 3.0);
        assert_eq!(x.category1_average, Some(4.0));
        assert_eq!(x.category2_average, Some(8.0));
    }

    #[tokio::test]
    async fn test_missing_data_is_unprocessed_not_fatal() {
        let store = MemoryStore::new(
            vec![
                entry("no-sheet", "Asha", "Institution X", "670001"),
                entry("no-key", "Bela", "Institution Y", "679999"),
                entry("ok", "Chitra", "Institution Y", "670001"),
            ],
            vec![sheet("no-key", &[(1, "b")]), sheet("ok", &[(1, "b")])],
            vec![key("670001")],
        );
        let rater = Rater::new(config());
        let report = rater.rank_report(&store, &store).await.unwrap();

        assert_eq!(report.unprocessed_users, vec!["no-sheet", "no-key"]);
        assert_eq!(report.total_students_checked, 1);
        assert_eq!(report.results[0].student_count, 1);
        assert_eq!(report.results[0].average_marks, 0.0);
        assert_eq!(report.results[1].average_marks, 2.0);
    }

    #[tokio::test]
    async fn test_data_source_failure_aborts_batch() {
        let keys = MemoryStore::default();
        let rater = Rater::new(config());
        let err = rater.rank_report(&DownStore, &keys).await.unwrap_err();
        assert!(err.is_fatal_source());
    }

    #[tokio::test]
    async fn test_unmatched_students_listed_and_excluded() {
        let store = MemoryStore::new(
            vec![entry("stray", "Dev", "Unknown Academy", "670001")],
            vec![sheet("stray", &[(1, "b")])],
            vec![key("670001")],
        );
        let rater = Rater::new(config());
        let report = rater.rank_report(&store, &store).await.unwrap();

        assert_eq!(report.unmatched_users, vec!["stray"]);
        assert!(report.results.iter().all(|r| r.student_count == 0));
        assert_eq!(report.certificates.as_ref().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn test_feature_flags_trim_report() {
        let store = MemoryStore::new(
            vec![entry("a", "Asha", "Institution X", "670001")],
            vec![sheet("a", &[(1, "b")])],
            vec![key("670001")],
        );
        let mut cfg = config();
        cfg.features.include_categories = false;
        cfg.features.include_certificates = false;
        let report = Rater::new(cfg).rank_report(&store, &store).await.unwrap();

        assert!(report.certificates.is_none());
        assert_eq!(report.results[0].category1_rank, None);
        assert_eq!(report.results[0].rank, 1);
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("certificates").is_none());
        assert!(json["results"][0].get("category1Average").is_none());
    }

    #[tokio::test]
    async fn test_reports_are_idempotent() {
        let store = MemoryStore::new(
            vec![
                entry("a", "Asha", "Institution X", "670001"),
                entry("b", "Bela", "Institution Y", "890001"),
            ],
            vec![sheet("a", &[(1, "b"), (2, "c")]), sheet("b", &[(3, "b")])],
            vec![key("670001"), key("890001")],
        );
        let rater = Rater::new(config());

        let first = rater.rank_report(&store, &store).await.unwrap();
        let second = rater.rank_report(&store, &store).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            rater.frequencies(&store, &store).await.unwrap(),
            rater.frequencies(&store, &store).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_institution_and_student_reports() {
        let store = MemoryStore::new(
            vec![
                entry("a", "Asha", "Institution X", "670001"),
                entry("b", "Bela", "Institution X", "670001"),
                entry("c", "Chitra", "Institution Y", "670001"),
            ],
            vec![
                sheet("a", &[(1, "b"), (2, "b")]),
                sheet("b", &[(1, "b")]),
                sheet("c", &[(1, "x")]),
            ],
            vec![key("670001")],
        );
        let rater = Rater::new(config());

        let report = rater
            .institution_report("institution x", &store, &store)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.school, "Institution X");
        assert_eq!(report.students.len(), 2);
        assert_eq!(report.students[0].username, "a");
        assert_eq!(report.students[0].category, Category::Category1);
        // Category 1 totals: -1, 4, 8
        assert!((report.students[0].total_percentile - 250.0 / 3.0).abs() < 1e-9);

        let student = rater.student_report("c", &store, &store).await.unwrap().unwrap();
        assert_eq!(student.total_marks, -1);
        assert_eq!(student.status, GradeStatus::Graded);

        assert!(
            rater
                .institution_report("Nowhere", &store, &store)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_certificates_use_grouped_roster() {
        let mut cfg = config();
        cfg.credentials = vec![crate::config::Credential {
            username: "NAVYUG55".into(),
            institution: "Institution Y".into(),
            password: String::new(),
        }];
        let mut absent = entry("z", "Zoya", "Institution Y", "890001");
        absent.time_left = Some(2400);
        let store = MemoryStore::new(
            vec![
                entry("b", "Bela", "Institution Y", "890001"),
                absent,
                entry("a", "Asha", "Institution Y", "670001"),
            ],
            vec![],
            vec![],
        );
        let certs = Rater::new(cfg).certificates(&store).await.unwrap();

        let ids: Vec<(&str, &str)> = certs
            .iter()
            .map(|c| (c.holder_name.as_str(), c.certificate_id.as_str()))
            .collect();
        assert_eq!(ids, vec![("Asha", "551"), ("Bela", "552")]);
    }

    #[tokio::test]
    async fn test_graded_records_filter() {
        let store = MemoryStore::new(
            vec![
                entry("a", "Asha", "Institution X", "670001"),
                entry("b", "Bela", "Institution Y", "670001"),
            ],
            vec![sheet("a", &[(1, "b")])],
            vec![key("670001")],
        );
        let rater = Rater::new(config());

        let all = rater.graded_records(None, &store, &store).await.unwrap();
        let only_y = rater
            .graded_records(Some("INSTITUTION Y"), &store, &store)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(only_y.len(), 1);
        assert_eq!(only_y[0].status, GradeStatus::Unprocessed);
    }
}
