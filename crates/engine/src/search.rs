//! Search Ranker boundary.
//!
//! A malformed query is the caller's mistake, not a failure of the
//! memory: it comes back as an empty result set with `error` set.

use mnemo_core::error::{Result, StoreError};
use mnemo_core::store::{SearchHit, SearchQuery};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::MemoryEngine;

/// The response to one search call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub query: String,
    pub results: Vec<SearchHit>,
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchOutcome {
    fn hits(query: String, results: Vec<SearchHit>) -> Self {
        Self {
            query,
            count: results.len(),
            results,
            error: None,
        }
    }

    fn rejected(query: String, error: String) -> Self {
        Self {
            query,
            results: vec![],
            count: 0,
            error: Some(error),
        }
    }
}

impl MemoryEngine {
    /// Ranked relevance search, most relevant first.
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchOutcome> {
        match self.store.search(query).await {
            Ok(results) => Ok(SearchOutcome::hits(query.text.clone(), results)),
            Err(StoreError::QuerySyntax(reason)) => {
                warn!(query = %query.text, %reason, "Search query rejected");
                Ok(SearchOutcome::rejected(
                    query.text.clone(),
                    format!("Invalid search query: {reason}"),
                ))
            }
            Err(e) => Err(e.into()),
        }
    }
}
