use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::models::match_result::{MatchResult, SortDirection, SortSpec};

#[derive(Debug, Default)]
struct StoreInner {
    /// Key -> position in `results`
    index: HashMap<String, usize>,
    /// Insertion order, used as the sort tie-break
    results: Vec<MatchResult>,
}

/// First match per `SYMBOL-timeframe` key, kept for the life of the process.
#[derive(Debug, Default)]
pub struct ResultStore {
    inner: RwLock<StoreInner>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the key was absent and the result stored. Check and insert
    /// happen under one write lock, so concurrent callers cannot both win.
    pub async fn insert_if_absent(&self, key: String, result: MatchResult) -> bool {
        let mut inner = self.inner.write().await;
        if inner.index.contains_key(&key) {
            return false;
        }

        let position = inner.results.len();
        inner.results.push(result);
        inner.index.insert(key, position);
        true
    }

    pub async fn get(&self, key: &str) -> Option<MatchResult> {
        let inner = self.inner.read().await;
        inner
            .index
            .get(key)
            .map(|&position| inner.results[position].clone())
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.results.len()
    }

    /// Sorted copy of every stored result. Equal keys keep insertion order.
    pub async fn snapshot(&self, sort: SortSpec) -> Vec<MatchResult> {
        let mut results = self.inner.read().await.results.clone();
        results.sort_by(|a, b| {
            let ordering = a.compare_by(b, sort.column);
            match sort.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
        results
    }
}
