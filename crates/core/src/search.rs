//! SearchProvider trait: the abstraction over document search indexes.
//!
//! A search provider takes a free-text query and yields ranked documents.
//! Results arrive on a channel so a consumer can stop after the first few
//! and the provider never fetches the rest.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// Fields requested from the index on every query.
pub const DEFAULT_SELECT: [&str; 4] = ["content", "people", "locations", "metadata_storage_name"];

/// Default language hint for semantic ranking.
pub const DEFAULT_QUERY_LANGUAGE: &str = "en-us";

/// How the query text is interpreted. Serializes to the index's wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Semantic,
}

/// How captions and answers are drawn from matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Extraction {
    Extractive,
}

/// A single search query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub search_text: String,
    pub query_type: QueryType,
    pub query_language: String,
    pub semantic_configuration: String,
    pub select: Vec<String>,
    pub query_caption: Extraction,
    pub query_answer: Extraction,
    pub include_total_count: bool,
}

impl SearchRequest {
    /// A semantic query with extractive captions/answers and a total count.
    pub fn semantic(
        search_text: impl Into<String>,
        semantic_configuration: impl Into<String>,
    ) -> Self {
        Self {
            search_text: search_text.into(),
            query_type: QueryType::Semantic,
            query_language: DEFAULT_QUERY_LANGUAGE.into(),
            semantic_configuration: semantic_configuration.into(),
            select: DEFAULT_SELECT.iter().map(|s| s.to_string()).collect(),
            query_caption: Extraction::Extractive,
            query_answer: Extraction::Extractive,
            include_total_count: true,
        }
    }

    pub fn with_query_language(mut self, language: impl Into<String>) -> Self {
        self.query_language = language.into();
        self
    }

    /// The select list as the comma-separated form indexes expect.
    pub fn select_clause(&self) -> String {
        self.select.join(",")
    }
}

/// A ranked document returned by a search provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchDocument {
    /// Document body text
    #[serde(default)]
    pub content: Option<String>,

    /// Storage name of the source file; used as the document identifier
    #[serde(default)]
    pub metadata_storage_name: Option<String>,

    #[serde(default)]
    pub people: Vec<String>,

    #[serde(default)]
    pub locations: Vec<String>,

    /// Relevance score from the index
    #[serde(default)]
    pub score: Option<f64>,

    /// Semantic reranker score, when semantic ranking ran
    #[serde(default)]
    pub reranker_score: Option<f64>,

    /// Extractive captions
    #[serde(default)]
    pub captions: Vec<String>,
}

/// Ranked results, best first. Dropping the receiver stops the provider.
pub type SearchResults =
    tokio::sync::mpsc::Receiver<std::result::Result<SearchDocument, SearchError>>;

/// The core SearchProvider trait.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// A human-readable name for this provider (e.g., "azure-search").
    fn name(&self) -> &str;

    /// Run a query. Request-level failures (auth, bad index) are returned
    /// directly; failures while paging arrive as `Err` items on the channel.
    async fn search(
        &self,
        request: SearchRequest,
    ) -> std::result::Result<SearchResults, SearchError>;
}
