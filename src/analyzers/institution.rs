//! Institution name normalization and the canonical institution directory.

use std::collections::HashMap;
use tracing::warn;

/// Lower-cases, drops everything but ASCII letters, digits and whitespace,
/// then trims.
///
/// `"Army Public School, Pune"` and `"army public school pune"` both become
/// `"army public school pune"`.
pub fn normalize(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Two names denote the same institution iff their normalized forms match.
pub fn same_institution(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// The canonical institution list, indexed by normalized name.
#[derive(Debug, Clone)]
pub struct InstitutionDirectory {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl InstitutionDirectory {
    pub fn new<S: AsRef<str>>(canonical: &[S]) -> Self {
        let mut names = Vec::with_capacity(canonical.len());
        let mut index = HashMap::with_capacity(canonical.len());

        for name in canonical {
            let name = name.as_ref();
            let key = normalize(name);
            if let Some(&existing) = index.get(&key) {
                warn!(
                    institution = name,
                    kept = %names[existing],
                    "Duplicate canonical institution ignored"
                );
                continue;
            }
            index.insert(key, names.len());
            names.push(name.to_string());
        }

        Self { names, index }
    }

    /// Position of `raw` in the canonical list, if it names a known institution.
    pub fn position(&self, raw: &str) -> Option<usize> {
        self.index.get(&normalize(raw)).copied()
    }

    pub fn name(&self, position: usize) -> &str {
        &self.names[position]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
