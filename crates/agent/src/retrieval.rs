//! Retrieval adapter.
//!
//! Turns a user question into a handful of system messages carrying the
//! best-ranked documents from the search index.

use std::sync::Arc;

use groundchat_core::error::SearchError;
use groundchat_core::message::Message;
use groundchat_core::search::{SearchDocument, SearchProvider, SearchRequest};
use tracing::debug;

/// Documents consumed per question.
pub const DEFAULT_LIMIT: usize = 3;

/// A retrieved document, ready to be injected into the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedDocument {
    /// Source file name in the index.
    pub id: String,
    /// Body text with line breaks flattened to spaces.
    pub body: String,
}

impl RetrievedDocument {
    pub fn from_search(doc: SearchDocument) -> Result<Self, SearchError> {
        let id = doc.metadata_storage_name.ok_or_else(|| {
            SearchError::MalformedDocument("missing metadata_storage_name".into())
        })?;
        let content = doc
            .content
            .ok_or_else(|| SearchError::MalformedDocument(format!("{id} has no content")))?;

        Ok(Self {
            id,
            body: normalize_body(&content),
        })
    }

    /// `"{id}\n{body}"` as a system message.
    pub fn into_message(self) -> Message {
        Message::system(format!("{}\n{}", self.id, self.body))
    }
}

fn normalize_body(content: &str) -> String {
    content.replace('\n', " ")
}

/// Take at most `limit` documents from a search, best first.
///
/// The result stream is dropped as soon as `limit` items have been read, so
/// the provider stops fetching further pages.
pub async fn retrieve(
    provider: &dyn SearchProvider,
    request: SearchRequest,
    limit: usize,
) -> Result<Vec<RetrievedDocument>, SearchError> {
    if limit == 0 {
        return Ok(Vec::new());
    }

    let mut results = provider.search(request).await?;
    let mut docs = Vec::with_capacity(limit);

    while docs.len() < limit {
        match results.recv().await {
            Some(item) => docs.push(RetrievedDocument::from_search(item?)?),
            None => break,
        }
    }
    drop(results);

    debug!(provider = provider.name(), count = docs.len(), "Documents retrieved");
    Ok(docs)
}

/// A search provider bound to the settings every question shares.
#[derive(Clone)]
pub struct Retriever {
    provider: Arc<dyn SearchProvider>,
    semantic_configuration: String,
    query_language: String,
    limit: usize,
}

impl Retriever {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        semantic_configuration: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            semantic_configuration: semantic_configuration.into(),
            query_language: groundchat_core::search::DEFAULT_QUERY_LANGUAGE.into(),
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_query_language(mut self, language: impl Into<String>) -> Self {
        self.query_language = language.into();
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run a semantic query for `query` and return the top documents.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedDocument>, SearchError> {
        let request = SearchRequest::semantic(query, self.semantic_configuration.clone())
            .with_query_language(self.query_language.clone());
        retrieve(self.provider.as_ref(), request, self.limit).await
    }
}
