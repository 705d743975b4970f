//! Per-search bookkeeping: visited set, predecessors, lookup spellings.

use std::collections::{HashMap, HashSet};

/// Canonical, case-insensitive form of a page title.
pub fn normalize(title: &str) -> String {
    title.to_lowercase()
}

/// A page queued for lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRef {
    /// Normalized identifier.
    pub key: String,
    /// Spelling passed to the link source.
    pub title: String,
}

/// Working state owned by one search driver. Never shared with workers.
#[derive(Debug, Default)]
pub struct SearchState {
    visited: HashSet<String>,
    prev: HashMap<String, String>,
}

impl SearchState {
    /// Start a search rooted at `start`, returning the root's page reference.
    pub fn new(start: &str) -> (Self, PageRef) {
        let key = normalize(start);
        let mut state = Self::default();
        state.visited.insert(key.clone());
        (
            state,
            PageRef {
                key,
                title: start.to_string(),
            },
        )
    }

    pub fn is_visited(&self, key: &str) -> bool {
        self.visited.contains(key)
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Record an edge `parent -> title`. Returns the new page if `title` was unseen.
    pub fn visit(&mut self, parent: &str, title: &str) -> Option<PageRef> {
        let key = normalize(title);
        if !self.visited.insert(key.clone()) {
            return None;
        }
        self.prev.insert(key.clone(), parent.to_string());
        Some(PageRef {
            key,
            title: title.to_string(),
        })
    }

    /// Walk predecessors back from `target` and return the path root-first.
    pub fn path_to(&self, target: &str) -> Vec<String> {
        if !self.visited.contains(target) {
            return Vec::new();
        }

        let mut path = vec![target.to_string()];
        let mut current = target;
        while let Some(parent) = self.prev.get(current) {
            path.push(parent.clone());
            current = parent;
        }
        path.reverse();
        path
    }
}
