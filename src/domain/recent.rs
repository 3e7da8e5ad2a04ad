//! Bounded recent-search list.

use serde::{Deserialize, Serialize};

/// Most-recent-first list of search terms.
///
/// Never exceeds its cap and never holds two terms that differ only in
/// case. Recording an existing term moves it to the front, keeping the
/// casing of the newest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentSearches {
    entries: Vec<String>,
    cap: usize,
}

impl RecentSearches {
    /// Creates an empty list holding at most `cap` terms.
    #[must_use]
    pub const fn new(cap: usize) -> Self {
        Self {
            entries: Vec::new(),
            cap,
        }
    }

    /// Rebuilds a list from persisted entries, re-applying the invariants.
    #[must_use]
    pub fn from_entries(entries: Vec<String>, cap: usize) -> Self {
        let mut recent = Self::new(cap);
        // Oldest first so the persisted head ends up at the front.
        for entry in entries.into_iter().rev() {
            recent.record(&entry);
        }
        recent
    }

    /// Records a term. Empty or whitespace-only terms are ignored.
    ///
    /// Returns `true` if the list changed.
    pub fn record(&mut self, term: &str) -> bool {
        let term = term.trim();
        if term.is_empty() || self.cap == 0 {
            return false;
        }
        if self.entries.first().is_some_and(|first| first == term) {
            return false;
        }
        let lowered = term.to_lowercase();
        self.entries.retain(|e| e.to_lowercase() != lowered);
        self.entries.insert(0, term.to_string());
        self.entries.truncate(self.cap);
        true
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries, most recent first.
    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Maximum number of entries.
    #[must_use]
    pub const fn cap(&self) -> usize {
        self.cap
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no term has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn most_recent_first() {
        let mut recent = RecentSearches::new(5);
        recent.record("apes");
        recent.record("punks");
        assert_eq!(recent.entries(), ["punks", "apes"]);
    }

    #[test]
    fn never_exceeds_cap() {
        let mut recent = RecentSearches::new(5);
        for term in ["a", "b", "c", "d", "e", "f", "g"] {
            recent.record(term);
            assert!(recent.len() <= 5);
        }
        assert_eq!(recent.entries(), ["g", "f", "e", "d", "c"]);
    }

    #[test]
    fn deduplicates_case_insensitively() {
        let mut recent = RecentSearches::new(5);
        recent.record("Cosmic");
        recent.record("punks");
        assert!(recent.record("COSMIC"));
        assert_eq!(recent.entries(), ["COSMIC", "punks"]);
    }

    #[test]
    fn ignores_blank_terms_and_repeats() {
        let mut recent = RecentSearches::new(5);
        assert!(!recent.record("   "));
        assert!(recent.record(" cosmic "));
        assert!(!recent.record("cosmic"));
        assert_eq!(recent.entries(), ["cosmic"]);
    }

    #[test]
    fn from_entries_repairs_invalid_input() {
        let recent = RecentSearches::from_entries(
            vec![
                "a".to_string(),
                "A".to_string(),
                "b".to_string(),
                String::new(),
                "c".to_string(),
            ],
            2,
        );
        assert_eq!(recent.entries(), ["a", "b"]);
    }
}
