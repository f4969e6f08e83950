//! Traits for the roster and answer-key data sources.

use crate::analyzers::types::{AnswerKey, RosterEntry};
use crate::error::RaterResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A student's recorded answers as stored upstream.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AnswerSheet {
    pub username: String,
    pub answers: BTreeMap<u32, String>,
}

/// Source of the student roster and recorded answers.
///
/// `Ok(None)` is a lookup miss and is recovered by the caller. `Err` means the
/// source itself is unusable and aborts the batch.
#[async_trait::async_trait]
pub trait RosterStore: Send + Sync {
    async fn list_students(&self) -> RaterResult<Vec<RosterEntry>>;

    async fn get_answers(&self, username: &str) -> RaterResult<Option<BTreeMap<u32, String>>>;
}

/// Source of answer keys by exam-set id.
#[async_trait::async_trait]
pub trait AnswerKeyStore: Send + Sync {
    async fn get_key(&self, set_id: &str) -> RaterResult<Option<AnswerKey>>;
}
