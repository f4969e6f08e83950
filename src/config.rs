//! Engine configuration.
//!
//! Everything that used to be a hard-coded table (institution list, credential
//! roster, category prefixes, marking constants) is loaded once into a
//! [`RaterConfig`] and passed explicitly to each engine.
//!
//! Stored as JSON on disk:
//! ```json
//! {
//!   "institutions": ["APS Jammu Cantt", "Army Public School, Pune"],
//!   "categories": [
//!     { "prefix": "67", "category": "category1" },
//!     { "prefix": "89", "category": "category2" }
//!   ],
//!   "credentials": [
//!     { "username": "NAVYUG41100178", "schoolName": "Army Public School Pune", "password": "..." }
//!   ],
//!   "certificates": { "issueDate": "23 January 2025", "excludedTimeLeft": 2400 },
//!   "ranking": { "tiePolicy": "input_order" },
//!   "features": { "includeCategories": true, "includeCertificates": true }
//! }
//! ```

use crate::analyzers::types::Category;
use crate::error::{RaterError, RaterResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RaterConfig {
    /// Canonical institution names, in report order.
    pub institutions: Vec<String>,

    /// Ordered setId prefix table; the first matching prefix wins.
    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryPrefix>,

    #[serde(default)]
    pub marking: MarkingScheme,

    /// Static credential table, only used to seed certificate ids.
    #[serde(default)]
    pub credentials: Vec<Credential>,

    #[serde(default)]
    pub certificates: CertificateSettings,

    #[serde(default)]
    pub ranking: RankingSettings,

    #[serde(default)]
    pub features: Features,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CategoryPrefix {
    pub prefix: String,
    pub category: Category,
}

fn default_categories() -> Vec<CategoryPrefix> {
    vec![
        CategoryPrefix {
            prefix: "67".to_string(),
            category: Category::Category1,
        },
        CategoryPrefix {
            prefix: "89".to_string(),
            category: Category::Category2,
        },
    ]
}

/// Marks awarded per question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MarkingScheme {
    pub correct: i32,
    pub incorrect: i32,
}

impl Default for MarkingScheme {
    fn default() -> Self {
        Self {
            correct: 4,
            incorrect: -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub username: String,
    #[serde(alias = "schoolName")]
    pub institution: String,
    #[serde(default, skip_serializing)]
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CertificateSettings {
    /// Fixed issue date printed on every certificate.
    pub issue_date: String,
    /// Roster `timeLeft` value meaning "did not attempt".
    pub excluded_time_left: Option<i64>,
}

impl Default for CertificateSettings {
    fn default() -> Self {
        Self {
            issue_date: "23 January 2025".to_string(),
            excluded_time_left: Some(2400),
        }
    }
}

/// How equal metric values are ranked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TiePolicy {
    /// Ties keep their input order; ranks are always 1..=N.
    #[default]
    InputOrder,
    /// Standard competition ranking (1-2-2-4).
    Competition,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RankingSettings {
    #[serde(default)]
    pub tie_policy: TiePolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Features {
    #[serde(default = "enabled")]
    pub include_categories: bool,
    #[serde(default = "enabled")]
    pub include_certificates: bool,
}

fn enabled() -> bool {
    true
}

impl Default for Features {
    fn default() -> Self {
        Self {
            include_categories: true,
            include_certificates: true,
        }
    }
}

impl RaterConfig {
    /// Builds a configuration with defaults for everything but the institution list.
    pub fn with_institutions<I, S>(institutions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            institutions: institutions.into_iter().map(Into::into).collect(),
            categories: default_categories(),
            marking: MarkingScheme::default(),
            credentials: Vec::new(),
            certificates: CertificateSettings::default(),
            ranking: RankingSettings::default(),
            features: Features::default(),
        }
    }

    /// Loads the config from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> RaterResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RaterError::Configuration(format!("cannot read config {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> RaterResult<Self> {
        let config: RaterConfig = serde_json::from_str(content)
            .map_err(|e| RaterError::Configuration(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> RaterResult<()> {
        if self.categories.iter().any(|c| c.prefix.is_empty()) {
            return Err(RaterError::Configuration(
                "category prefixes must not be empty".to_string(),
            ));
        }
        if self.marking.correct <= 0 {
            return Err(RaterError::Configuration(format!(
                "marking.correct must be positive, got {}",
                self.marking.correct
            )));
        }
        Ok(())
    }
}
