//! Deterministic certificate ids for students who sat the exam.

use crate::analyzers::category::CategoryClassifier;
use crate::analyzers::institution::{InstitutionDirectory, normalize};
use crate::analyzers::types::{CertificateRecord, RosterEntry};
use crate::analyzers::utility::push_digit_runs;
use crate::config::{CertificateSettings, Credential};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, warn};

pub const VERIFIED: &str = "verified";

/// Digit seed per normalized institution name, built in one pass over the
/// credential table. Digits are concatenated in credential-table order.
pub fn digit_seeds(credentials: &[Credential]) -> HashMap<String, String> {
    let mut seeds: HashMap<String, String> = HashMap::new();
    for credential in credentials {
        let seed = seeds.entry(normalize(&credential.institution)).or_default();
        push_digit_runs(&credential.username, seed);
    }
    seeds
}

/// Whether a roster entry may receive a certificate.
pub fn is_eligible(entry: &RosterEntry, excluded_time_left: Option<i64>) -> bool {
    match (excluded_time_left, entry.time_left) {
        (Some(excluded), Some(left)) => left != excluded,
        _ => true,
    }
}

fn by_display_name(a: &&RosterEntry, b: &&RosterEntry) -> Ordering {
    a.student_name
        .to_lowercase()
        .cmp(&b.student_name.to_lowercase())
        .then_with(|| a.student_name.cmp(&b.student_name))
        .then_with(|| a.username.cmp(&b.username))
}

pub struct CertificateIdGenerator<'a> {
    seeds: HashMap<String, String>,
    settings: &'a CertificateSettings,
    classifier: &'a CategoryClassifier,
}

impl<'a> CertificateIdGenerator<'a> {
    pub fn new(
        credentials: &[Credential],
        settings: &'a CertificateSettings,
        classifier: &'a CategoryClassifier,
    ) -> Self {
        Self {
            seeds: digit_seeds(credentials),
            settings,
            classifier,
        }
    }

    pub fn seed(&self, institution: &str) -> &str {
        self.seeds
            .get(&normalize(institution))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Issues certificates for one institution's roster entries.
    ///
    /// Eligible entries are sorted by display name; the i-th (1-based) gets
    /// `seed + i` as its id.
    pub fn issue(&self, institution: &str, entries: &[RosterEntry]) -> Vec<CertificateRecord> {
        let mut eligible: Vec<&RosterEntry> = entries
            .iter()
            .filter(|e| is_eligible(e, self.settings.excluded_time_left))
            .collect();
        eligible.sort_by(by_display_name);

        let seed = self.seed(institution);
        if seed.is_empty() && !eligible.is_empty() {
            warn!(institution, "No credential digits for institution; ids are bare positions");
        }
        debug!(
            institution,
            eligible = eligible.len(),
            skipped = entries.len() - eligible.len(),
            "Issuing certificates"
        );

        eligible
            .into_iter()
            .enumerate()
            .map(|(i, entry)| CertificateRecord {
                holder_name: entry.student_name.clone(),
                certificate_id: format!("{}{}", seed, i + 1),
                institution: institution.to_string(),
                issue_date: self.settings.issue_date.clone(),
                status: VERIFIED.to_string(),
                category: self.classifier.classify(&entry.set_id),
            })
            .collect()
    }

    /// Issues certificates for every canonical institution, `buckets[i]`
    /// holding the roster entries of `directory.name(i)`.
    pub fn issue_all(
        &self,
        directory: &InstitutionDirectory,
        buckets: &[Vec<RosterEntry>],
    ) -> Vec<CertificateRecord> {
        let mut records = Vec::new();
        for (i, entries) in buckets.iter().enumerate().take(directory.len()) {
            records.extend(self.issue(directory.name(i), entries));
        }

        let mut seen: HashMap<&str, &str> = HashMap::new();
        for record in &records {
            if let Some(first) = seen.insert(&record.certificate_id, &record.institution) {
                warn!(
                    certificate_id = %record.certificate_id,
                    first_institution = first,
                    institution = %record.institution,
                    "Duplicate certificate id"
                );
            }
        }

        records
    }
}

/// Certificate snapshot as persisted and served for verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSnapshot {
    pub success: bool,
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub data: Vec<CertificateRecord>,
}

/// Lookup of issued certificates by id.
#[derive(Debug, Clone, Default)]
pub struct CertificateLedger {
    records: Vec<CertificateRecord>,
    index: HashMap<String, usize>,
}

impl CertificateLedger {
    pub fn new(records: Vec<CertificateRecord>) -> Self {
        let mut index = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            index.entry(record.certificate_id.trim().to_string()).or_insert(i);
        }
        Self { records, index }
    }

    pub fn from_snapshot_json(bytes: &[u8]) -> serde_json::Result<Self> {
        let snapshot: CertificateSnapshot = serde_json::from_slice(bytes)?;
        Ok(Self::new(snapshot.data))
    }

    /// Returns the certificate with this number, if it was issued.
    pub fn find(&self, certificate_id: &str) -> Option<&CertificateRecord> {
        self.index
            .get(certificate_id.trim())
            .map(|&i| &self.records[i])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::types::Category;
    use crate::config::RaterConfig;

    fn entry(username: &str, name: &str, set_id: &str, time_left: i64) -> RosterEntry {
        RosterEntry {
            username: username.into(),
            student_name: name.into(),
            institution: "Navyug School".into(),
            set_id: set_id.into(),
            time_left: Some(time_left),
        }
    }

    fn credential(username: &str, institution: &str) -> Credential {
        Credential {
            username: username.into(),
            institution: institution.into(),
            password: String::new(),
        }
    }

    #[test]
    fn test_seed_and_ids_follow_sorted_names() {
        let config = RaterConfig::with_institutions(["Navyug School"]);
        let classifier = CategoryClassifier::new(&config.categories);
        let credentials = vec![
            credential("NAVYUG123", "Navyug School"),
            credential("NAVYUG999", "Other School"),
            credential("NAVYUG456", "navyug school"),
        ];
        let generator = CertificateIdGenerator::new(&credentials, &config.certificates, &classifier);

        let entries = vec![
            entry("u2", "Bob", "890001", 100),
            entry("u1", "Alice", "670001", 0),
        ];
        let certs = generator.issue("Navyug School", &entries);

        assert_eq!(generator.seed("Navyug School"), "123456");
        assert_eq!(certs.len(), 2);
        assert_eq!(certs[0].holder_name, "Alice");
        assert_eq!(certs[0].certificate_id, "1234561");
        assert_eq!(certs[0].category, Category::Category1);
        assert_eq!(certs[1].holder_name, "Bob");
        assert_eq!(certs[1].certificate_id, "1234562");
        assert_eq!(certs[1].category, Category::Category2);
        assert_eq!(certs[1].status, "verified");
        assert_eq!(certs[1].issue_date, "23 January 2025");
    }

    #[test]
    fn test_sentinel_excludes_non_attempts() {
        let config = RaterConfig::with_institutions(["Navyug School"]);
        let classifier = CategoryClassifier::new(&config.categories);
        let credentials = vec![credential("NAVYUG7", "Navyug School")];
        let generator = CertificateIdGenerator::new(&credentials, &config.certificates, &classifier);

        let entries = vec![
            entry("u1", "Asha", "670001", 2400),
            entry("u2", "Bela", "670001", 15),
        ];
        let certs = generator.issue("Navyug School", &entries);

        assert_eq!(certs.len(), 1);
        assert_eq!(certs[0].holder_name, "Bela");
        assert_eq!(certs[0].certificate_id, "71");
    }

    #[test]
    fn test_eligibility_without_sentinel() {
        let e = entry("u1", "Asha", "670001", 2400);
        assert!(!is_eligible(&e, Some(2400)));
        assert!(is_eligible(&e, None));
        let mut missing = e.clone();
        missing.time_left = None;
        assert!(is_eligible(&missing, Some(2400)));
    }

    #[test]
    fn test_case_insensitive_name_order() {
        let config = RaterConfig::with_institutions(["Navyug School"]);
        let classifier = CategoryClassifier::new(&config.categories);
        let generator = CertificateIdGenerator::new(&[], &config.certificates, &classifier);

        let entries = vec![
            entry("u1", "charu", "670001", 0),
            entry("u2", "Bina", "670001", 0),
            entry("u3", "aman", "670001", 0),
        ];
        let names: Vec<String> = generator
            .issue("Navyug School", &entries)
            .into_iter()
            .map(|c| c.holder_name)
            .collect();
        assert_eq!(names, vec!["aman", "Bina", "charu"]);
    }

    #[test]
    fn test_ledger_lookup() {
        let record = CertificateRecord {
            holder_name: "Alice".into(),
            certificate_id: "1234561".into(),
            institution: "Navyug School".into(),
            issue_date: "23 January 2025".into(),
            status: VERIFIED.into(),
            category: Category::Category1,
        };
        let ledger = CertificateLedger::new(vec![record.clone()]);

        assert_eq!(ledger.find(" 1234561 "), Some(&record));
        assert_eq!(ledger.find("1234562"), None);
    }

    #[test]
    fn test_ledger_from_snapshot() {
        let json = r#"{
            "success": true,
            "generatedAt": "2025-01-23T10:00:00Z",
            "data": [{
                "holderName": "Bob",
                "certificateId": "981",
                "school": "APS Mhow",
                "issueDate": "23 January 2025",
                "status": "verified",
                "category": "Category 2"
            }]
        }"#;
        let ledger = CertificateLedger::from_snapshot_json(json.as_bytes()).unwrap();

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.find("981").unwrap().institution, "APS Mhow");
    }
}
