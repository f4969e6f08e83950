//! Maps exam-set ids to competition categories.

use crate::analyzers::types::Category;
use crate::config::CategoryPrefix;

/// Literal prefix classifier over an ordered prefix table.
#[derive(Debug, Clone)]
pub struct CategoryClassifier {
    prefixes: Vec<CategoryPrefix>,
}

impl CategoryClassifier {
    pub fn new(prefixes: &[CategoryPrefix]) -> Self {
        Self {
            prefixes: prefixes.to_vec(),
        }
    }

    /// First matching prefix wins; no match means [`Category::Unclassified`].
    pub fn classify(&self, set_id: &str) -> Category {
        self.prefixes
            .iter()
            .find(|p| set_id.trim().starts_with(p.prefix.as_str()))
            .map(|p| p.category)
            .unwrap_or(Category::Unclassified)
    }
}
