//! Last known status of every monitored site.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::checker::CheckResult;

/// In-memory map of site URL to its most recent [`CheckResult`].
#[derive(Debug, Default)]
pub struct StatusStore {
    results: RwLock<HashMap<String, CheckResult>>,
}

impl StatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `result`, returning the one it replaces.
    pub fn record(&self, result: CheckResult) -> Option<CheckResult> {
        self.results.write().insert(result.url.clone(), result)
    }

    pub fn get(&self, url: &str) -> Option<CheckResult> {
        self.results.read().get(url).cloned()
    }

    /// All stored results, ordered by URL.
    pub fn snapshot(&self) -> Vec<CheckResult> {
        let mut results: Vec<CheckResult> = self.results.read().values().cloned().collect();
        results.sort_by(|a, b| a.url.cmp(&b.url));
        results
    }

    pub fn len(&self) -> usize {
        self.results.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.read().is_empty()
    }
}
