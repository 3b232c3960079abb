//! Replica-annotated device identifiers
//!
//! A time-sliced device is advertised once per replica. Each replica ID is the
//! base device ID followed by `::` and the replica number, e.g. `GPU-0::3`.

use std::collections::HashSet;
use std::fmt;

const SEPARATOR: &str = "::";

/// A device ID that may carry a replica annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnnotatedId<'a>(&'a str);

impl<'a> AnnotatedId<'a> {
    /// Wrap an existing device ID
    pub fn new(id: &'a str) -> Self {
        Self(id)
    }

    /// Build the annotated ID for one replica of a device
    pub fn with_replica(id: &str, replica: usize) -> String {
        format!("{}{}{}", id, SEPARATOR, replica)
    }

    /// Whether the ID carries a replica annotation
    pub fn has_annotation(&self) -> bool {
        self.0.contains(SEPARATOR)
    }

    /// Split into base ID and replica number.
    ///
    /// IDs without an annotation (or with a non-numeric one) report replica 0.
    pub fn split(&self) -> (&'a str, usize) {
        match self.0.split_once(SEPARATOR) {
            Some((id, replica)) => (id, replica.parse().unwrap_or(0)),
            None => (self.0, 0),
        }
    }

    /// Base device ID with the annotation stripped
    pub fn id(&self) -> &'a str {
        self.split().0
    }

    /// The raw ID as given
    pub fn as_str(&self) -> &'a str {
        self.0
    }
}

impl<'a> From<&'a str> for AnnotatedId<'a> {
    fn from(id: &'a str) -> Self {
        Self(id)
    }
}

impl fmt::Display for AnnotatedId<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A list of possibly annotated device IDs
#[derive(Debug, Clone, Copy)]
pub struct AnnotatedIds<'a>(&'a [String]);

impl<'a> AnnotatedIds<'a> {
    pub fn new(ids: &'a [String]) -> Self {
        Self(ids)
    }

    /// Whether any ID in the list carries a replica annotation
    pub fn any_has_annotation(&self) -> bool {
        self.0
            .iter()
            .any(|id| AnnotatedId::new(id).has_annotation())
    }

    /// Base IDs, in first-seen order, without duplicates
    pub fn ids(&self) -> Vec<&'a str> {
        let mut seen = HashSet::new();
        self.0
            .iter()
            .map(|id| AnnotatedId::new(id).id())
            .filter(|id| seen.insert(*id))
            .collect()
    }
}
