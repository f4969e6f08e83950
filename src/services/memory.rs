//! In-memory roster and answer-key store, loaded from CSV/JSON sources.

use super::store::{AnswerKeyStore, AnswerSheet, RosterStore};
use crate::analyzers::types::{AnswerKey, RosterEntry};
use crate::error::{RaterError, RaterResult};
use crate::fetch::{HttpClient, read_source};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    roster: Vec<RosterEntry>,
    answers: HashMap<String, BTreeMap<u32, String>>,
    keys: HashMap<String, AnswerKey>,
}

/// Answer document as exported upstream; blank answers may be `null`.
#[derive(Deserialize)]
struct RawSheet {
    username: String,
    #[serde(default)]
    answers: Option<BTreeMap<u32, Option<String>>>,
}

impl MemoryStore {
    pub fn new(roster: Vec<RosterEntry>, sheets: Vec<AnswerSheet>, keys: Vec<AnswerKey>) -> Self {
        let mut store = Self {
            roster,
            answers: HashMap::with_capacity(sheets.len()),
            keys: HashMap::with_capacity(keys.len()),
        };
        for sheet in sheets {
            if store.answers.insert(sheet.username.clone(), sheet.answers).is_some() {
                warn!(username = %sheet.username, "Duplicate answer sheet; keeping the last one");
            }
        }
        for key in keys {
            let stray = key.stray_questions();
            if !stray.is_empty() {
                warn!(set_id = %key.set_id, ?stray, "Answer key has questions outside every section");
            }
            store.keys.insert(key.set_id.trim().to_string(), key);
        }
        store
    }

    /// Loads the roster CSV, answers JSON and keys JSON from paths or URLs.
    ///
    /// Any unreadable or malformed source is a configuration error.
    #[tracing::instrument(skip(client))]
    pub async fn load<C: HttpClient>(
        client: &C,
        roster: &str,
        answers: &str,
        keys: &str,
    ) -> RaterResult<Self> {
        let roster_bytes = read_source(client, roster).await?;
        let answer_bytes = read_source(client, answers).await?;
        let key_bytes = read_source(client, keys).await?;

        let roster = parse_roster(&roster_bytes)
            .map_err(|e| RaterError::Configuration(format!("roster {roster}: {e}")))?;
        let sheets = parse_answers(&answer_bytes)
            .map_err(|e| RaterError::Configuration(format!("answers {answers}: {e}")))?;
        let keys: Vec<AnswerKey> = serde_json::from_slice(&key_bytes)
            .map_err(|e| RaterError::Configuration(format!("keys {keys}: {e}")))?;

        info!(
            students = roster.len(),
            sheets = sheets.len(),
            keys = keys.len(),
            "Data sources loaded"
        );
        Ok(Self::new(roster, sheets, keys))
    }
}

/// Parses a roster CSV with `username,student,school,setid,timeLeft` headers.
pub fn parse_roster(bytes: &[u8]) -> RaterResult<Vec<RosterEntry>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let entry: RosterEntry = result?;
        rows.push(entry);
    }
    Ok(rows)
}

/// Parses `[{ "username": .., "answers": { "1": "a", .. } }]`.
pub fn parse_answers(bytes: &[u8]) -> RaterResult<Vec<AnswerSheet>> {
    let raw: Vec<RawSheet> = serde_json::from_slice(bytes)?;
    Ok(raw
        .into_iter()
        .filter_map(|sheet| {
            let answers = sheet.answers?;
            Some(AnswerSheet {
                username: sheet.username,
                answers: answers
                    .into_iter()
                    .map(|(q, a)| (q, a.unwrap_or_default()))
                    .collect(),
            })
        })
        .collect())
}

#[async_trait::async_trait]
impl RosterStore for MemoryStore {
    async fn list_students(&self) -> RaterResult<Vec<RosterEntry>> {
        Ok(self.roster.clone())
    }

    async fn get_answers(&self, username: &str) -> RaterResult<Option<BTreeMap<u32, String>>> {
        Ok(self.answers.get(username).cloned())
    }
}

#[async_trait::async_trait]
impl AnswerKeyStore for MemoryStore {
    async fn get_key(&self, set_id: &str) -> RaterResult<Option<AnswerKey>> {
        Ok(self.keys.get(set_id.trim()).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROSTER: &str = "username,student,school,setid,timeLeft\n\
        NAVYUG1,Asha Rao,\"Army Public School, Pune\",670001,120\n\
        NAVYUG2,Bilal Khan,APS Mhow, 890002 ,\n";

    #[test]
    fn test_parse_roster() {
        let rows = parse_roster(ROSTER.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].institution, "Army Public School, Pune");
        assert_eq!(rows[0].time_left, Some(120));
        assert_eq!(rows[1].set_id, "890002");
        assert_eq!(rows[1].time_left, None);
    }

    #[test]
    fn test_parse_roster_rejects_bad_time_left() {
        let csv = "username,student,school,setid,timeLeft\nNAVYUG1,Asha,APS Mhow,670001,soon\n";
        assert!(parse_roster(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_parse_answers_maps_null_to_blank_and_skips_missing() {
        let json = r#"[
            { "username": "NAVYUG1", "answers": { "1": "a", "2": null } },
            { "username": "NAVYUG2" }
        ]"#;
        let sheets = parse_answers(json.as_bytes()).unwrap();

        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].answers[&1], "a");
        assert_eq!(sheets[0].answers[&2], "");
    }

    #[tokio::test]
    async fn test_store_lookups() {
        let roster = parse_roster(ROSTER.as_bytes()).unwrap();
        let sheets = vec![AnswerSheet {
            username: "NAVYUG1".into(),
            answers: [(1, "a".to_string())].into(),
        }];
        let keys = vec![AnswerKey {
            set_id: "670001".into(),
            questions: [(1, "a".to_string())].into(),
        }];
        let store = MemoryStore::new(roster, sheets, keys);

        assert_eq!(store.list_students().await.unwrap().len(), 2);
        assert!(store.get_answers("NAVYUG1").await.unwrap().is_some());
        assert!(store.get_answers("NAVYUG2").await.unwrap().is_none());
        assert!(store.get_key(" 670001").await.unwrap().is_some());
        assert!(store.get_key("890002").await.unwrap().is_none());
    }
}
