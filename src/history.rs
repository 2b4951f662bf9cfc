//! Recently used search queries, most recent first.

use anyhow::{Context, Result};
use tracing::warn;

use crate::db::{Namespace, SharedDatabase};
use crate::search;

pub const NAMESPACE: &str = "search_history";
pub const QUERIES_KEY: &str = "search_queries";
pub const DEFAULT_LIMIT: usize = 10;

#[derive(Clone)]
pub struct SearchHistory {
    prefs: Namespace,
    limit: usize,
}

impl SearchHistory {
    pub fn new(db: SharedDatabase, limit: usize) -> Self {
        Self {
            prefs: Namespace::new(db, NAMESPACE),
            limit: limit.max(1),
        }
    }

    /// Move `query` to the front, dropping the oldest entries beyond the limit.
    /// Blank queries are ignored.
    pub fn add(&self, query: &str) -> Result<()> {
        if search::is_blank(query) {
            return Ok(());
        }
        let mut entries = self.get_all();
        entries.retain(|entry| entry != query);
        entries.insert(0, query.to_string());
        entries.truncate(self.limit);
        self.store(&entries)
    }

    /// Stored entries; an unreadable or corrupt value reads as empty.
    pub fn get_all(&self) -> Vec<String> {
        let raw = match self.prefs.get_string(QUERIES_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!("failed to read search history: {err:#}");
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("discarding corrupt search history: {err}");
                Vec::new()
            }
        }
    }

    pub fn remove(&self, query: &str) -> Result<()> {
        let mut entries = self.get_all();
        let Some(pos) = entries.iter().position(|entry| entry == query) else {
            return Ok(());
        };
        entries.remove(pos);
        self.store(&entries)
    }

    pub fn clear(&self) -> Result<()> {
        self.prefs.remove(QUERIES_KEY)
    }

    fn store(&self, entries: &[String]) -> Result<()> {
        let json = serde_json::to_string(entries).context("failed to encode search history")?;
        self.prefs.put_string(QUERIES_KEY, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{shared, Database};

    fn history() -> SearchHistory {
        SearchHistory::new(shared(Database::open_in_memory().unwrap()), DEFAULT_LIMIT)
    }

    #[test]
    fn empty_by_default() {
        assert!(history().get_all().is_empty());
    }

    #[test]
    fn re_adding_moves_to_front_without_duplicates() {
        let h = history();
        h.add("x").unwrap();
        h.add("x").unwrap();
        assert_eq!(h.get_all(), vec!["x"]);

        h.add("y").unwrap();
        h.add("x").unwrap();
        assert_eq!(h.get_all(), vec!["x", "y"]);
    }

    #[test]
    fn keeps_ten_most_recent() {
        let h = history();
        for i in 0..11 {
            h.add(&format!("q{i}")).unwrap();
        }
        let entries = h.get_all();
        assert_eq!(entries.len(), 10);
        assert_eq!(entries.first().map(String::as_str), Some("q10"));
        assert_eq!(entries.last().map(String::as_str), Some("q1"));
        assert!(!entries.contains(&"q0".to_string()));
    }

    #[test]
    fn blank_queries_are_not_recorded() {
        let h = history();
        h.add("").unwrap();
        h.add("   ").unwrap();
        assert!(h.get_all().is_empty());
    }

    #[test]
    fn remove_missing_entry_is_noop() {
        let h = history();
        h.remove("nothing").unwrap();
        assert!(h.get_all().is_empty());

        h.add("a").unwrap();
        h.remove("b").unwrap();
        assert_eq!(h.get_all(), vec!["a"]);
        h.remove("a").unwrap();
        assert!(h.get_all().is_empty());
    }

    #[test]
    fn clear_drops_everything() {
        let h = history();
        h.add("a").unwrap();
        h.add("b").unwrap();
        h.clear().unwrap();
        assert!(h.get_all().is_empty());
    }

    #[test]
    fn corrupt_value_reads_as_empty() {
        let db = shared(Database::open_in_memory().unwrap());
        Namespace::new(db.clone(), NAMESPACE)
            .put_string(QUERIES_KEY, "{not json")
            .unwrap();
        let h = SearchHistory::new(db, DEFAULT_LIMIT);
        assert!(h.get_all().is_empty());
        h.add("fresh").unwrap();
        assert_eq!(h.get_all(), vec!["fresh"]);
    }

    #[test]
    fn stored_as_json_array_under_single_key() {
        let db = shared(Database::open_in_memory().unwrap());
        let h = SearchHistory::new(db.clone(), DEFAULT_LIMIT);
        h.add("ada").unwrap();
        h.add("grace").unwrap();
        let raw = Namespace::new(db, NAMESPACE)
            .get_string(QUERIES_KEY)
            .unwrap()
            .unwrap();
        assert_eq!(raw, r#"["grace","ada"]"#);
    }
}
