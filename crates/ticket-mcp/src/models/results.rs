//! Deep-Research tool result shapes.
//!
//! `search` and `fetch` return these fixed structures regardless of what the
//! backend sends. `url` serializes as an explicit `null` when absent, and an
//! all-empty metadata map collapses to `null` rather than `{}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One `search` result row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub id: String,
    pub title: String,
    pub text: String,
    pub url: Option<String>,
}

/// `search` tool output: `{"results": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults {
    pub results: Vec<SearchResultItem>,
}

impl SearchResults {
    /// The empty result set returned for any backend or parse failure.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

/// `fetch` tool output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResult {
    pub id: String,
    pub title: String,
    pub text: String,
    pub url: Option<String>,
    pub metadata: Option<BTreeMap<String, String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_item_serializes_null_url() {
        let item = SearchResultItem {
            id: "T1".to_string(),
            title: "Login error".to_string(),
            text: "Cannot log in".to_string(),
            url: None,
        };
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(
            value,
            json!({"id": "T1", "title": "Login error", "text": "Cannot log in", "url": null})
        );
    }

    #[test]
    fn test_empty_search_results() {
        let value = serde_json::to_value(SearchResults::empty()).unwrap();
        assert_eq!(value, json!({"results": []}));
    }

    #[test]
    fn test_fetch_result_null_metadata() {
        let result = FetchResult {
            id: "T2".to_string(),
            title: "Slow search".to_string(),
            text: "Description: Takes minutes".to_string(),
            url: None,
            metadata: None,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["metadata"], json!(null));
        assert_eq!(value["url"], json!(null));
    }
}
