//! Shared test helpers for controller and retrieval tests.

use std::sync::Mutex;

use groundchat_core::error::{ProviderError, SearchError};
use groundchat_core::message::Message;
use groundchat_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use groundchat_core::search::{SearchDocument, SearchProvider, SearchRequest, SearchResults};

/// A mock provider that returns a sequence of scripted results.
///
/// Every request is recorded. Panics if more calls are made than results
/// provided.
pub struct ScriptedProvider {
    responses: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    delay: Option<std::time::Duration>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn replies(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(make_text_response(t))).collect())
    }

    pub fn failing(err: ProviderError) -> Self {
        Self::new(vec![Err(err)])
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            panic!("ScriptedProvider: no more responses");
        }
        responses.remove(0)
    }
}

/// Create a simple text response.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "scripted".into(),
    }
}

/// A search index that serves a fixed document list on every query.
pub struct ScriptedSearch {
    docs: Vec<SearchDocument>,
    error: Option<SearchError>,
    requests: Mutex<Vec<SearchRequest>>,
}

impl ScriptedSearch {
    pub fn with_docs(docs: impl IntoIterator<Item = SearchDocument>) -> Self {
        Self {
            docs: docs.into_iter().collect(),
            error: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: SearchError) -> Self {
        Self {
            docs: Vec::new(),
            error: Some(err),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SearchProvider for ScriptedSearch {
    fn name(&self) -> &str {
        "scripted-search"
    }

    async fn search(&self, request: SearchRequest) -> Result<SearchResults, SearchError> {
        self.requests.lock().unwrap().push(request);
        if let Some(err) = &self.error {
            return Err(err.clone());
        }

        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let docs = self.docs.clone();
        tokio::spawn(async move {
            for doc in docs {
                if tx.send(Ok(doc)).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}

/// A well-formed search hit.
pub fn doc(name: &str, content: &str) -> SearchDocument {
    SearchDocument {
        content: Some(content.into()),
        metadata_storage_name: Some(name.into()),
        ..Default::default()
    }
}
