//! Common definitions that are shared between different parts of the compiler.

// Use sorted sets and maps for consistent, test-stable output order.
pub use std::collections::{BTreeMap as Map, BTreeSet as Set};

/// Identifiers, interned so that copies are cheap and comparisons are pointer
/// comparisons.
pub type Id = internment::Intern<String>;

/// Build an [`Id`] from anything that can be turned into a `String`.
pub fn id(s: impl Into<String>) -> Id {
    internment::Intern::new(s.into())
}
