//! Upstream data collaborators.
//!
//! [`RosterStore`] lists students and their recorded answers.
//! [`AnswerKeyStore`] resolves an exam-set id into its answer key.
//! [`MemoryStore`] implements both over data loaded up front.

mod memory;
mod store;

pub use memory::MemoryStore;
pub use store::{AnswerKeyStore, AnswerSheet, RosterStore};
