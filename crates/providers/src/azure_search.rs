//! Azure Cognitive Search provider.
//!
//! Queries `POST {endpoint}/indexes/{index}/docs/search` with the `api-key`
//! header. Results are paged with `top`/`skip`: the first page is fetched
//! before `search` returns, so request-level failures surface directly;
//! later pages are fetched on a background task only as the consumer reads
//! past the end of the current page. Dropping the receiver stops the task
//! before it requests another page.

use std::time::Duration;

use async_trait::async_trait;
use groundchat_core::error::SearchError;
use groundchat_core::search::{SearchDocument, SearchRequest, SearchResults};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Search REST API version; carries semantic configuration, query
/// language, captions and answers.
pub const DEFAULT_API_VERSION: &str = "2023-07-01-Preview";

/// Documents requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// An Azure Cognitive Search index client.
pub struct AzureSearchProvider {
    endpoint: String,
    index_name: String,
    api_key: String,
    page_size: usize,
    client: reqwest::Client,
}

impl AzureSearchProvider {
    /// Create a client for `https://{service_name}.search.windows.net`.
    pub fn new(
        service_name: &str,
        index_name: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            endpoint: format!("https://{service_name}.search.windows.net"),
            index_name: index_name.into(),
            api_key: api_key.into(),
            page_size: DEFAULT_PAGE_SIZE,
            client,
        })
    }

    /// Point the client at a different endpoint (private link, emulator).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn search_url(&self) -> String {
        format!(
            "{}/indexes/{}/docs/search?api-version={}",
            self.endpoint, self.index_name, DEFAULT_API_VERSION
        )
    }

    /// Build the JSON body for one page of a query.
    fn request_body(request: &SearchRequest, skip: usize, top: usize) -> serde_json::Value {
        serde_json::json!({
            "search": request.search_text,
            "queryType": request.query_type,
            "queryLanguage": request.query_language,
            "semanticConfiguration": request.semantic_configuration,
            "captions": request.query_caption,
            "answers": request.query_answer,
            "select": request.select_clause(),
            "count": request.include_total_count,
            "top": top,
            "skip": skip,
        })
    }
}

/// The pieces of a client needed to fetch pages from a background task.
#[derive(Clone)]
struct PageFetcher {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl PageFetcher {
    async fn fetch(&self, body: &serde_json::Value) -> Result<ApiSearchPage, SearchError> {
        let response = self
            .client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Timeout(e.to_string())
                } else {
                    SearchError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 401 || status == 403 {
            return Err(SearchError::AuthenticationFailed(
                "Invalid admin key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Search service returned error");
            return Err(SearchError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        response.json().await.map_err(|e| SearchError::ApiError {
            status_code: 200,
            message: format!("Failed to parse search response: {e}"),
        })
    }
}

#[async_trait]
impl groundchat_core::SearchProvider for AzureSearchProvider {
    fn name(&self) -> &str {
        "azure-search"
    }

    async fn search(&self, request: SearchRequest) -> Result<SearchResults, SearchError> {
        let page_size = self.page_size;
        let fetcher = PageFetcher {
            client: self.client.clone(),
            url: self.search_url(),
            api_key: self.api_key.clone(),
        };

        debug!(index = %self.index_name, query = %request.search_text, "Sending search request");
        let first = fetcher
            .fetch(&Self::request_body(&request, 0, page_size))
            .await?;

        let total = first.count;
        if let Some(total) = total {
            debug!(total, "Search matched documents");
        }
        if let Some(answer) = first.answers.as_ref().and_then(|a| a.first()) {
            trace!(answer = %answer.text, "Search extracted an answer");
        }

        // Capacity 1 keeps the task at most one document ahead of the reader.
        let (tx, rx) = mpsc::channel(1);

        tokio::spawn(async move {
            let mut page = first;
            let mut skip = 0usize;

            loop {
                let returned = page.value.len();
                for doc in page.value {
                    if tx.send(Ok(doc.into_document())).await.is_err() {
                        return; // reader dropped
                    }
                }

                skip += returned;
                let exhausted = returned < page_size || total.is_some_and(|t| skip as u64 >= t);
                if exhausted || tx.is_closed() {
                    return;
                }

                trace!(skip, "Fetching next search page");
                match fetcher
                    .fetch(&Self::request_body(&request, skip, page_size))
                    .await
                {
                    Ok(next) => page = next,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}

// --- Search REST API types (internal) ---

#[derive(Debug, Deserialize)]
struct ApiSearchPage {
    #[serde(rename = "@odata.count", default)]
    count: Option<u64>,
    #[serde(rename = "@search.answers", default)]
    answers: Option<Vec<ApiAnswer>>,
    #[serde(default)]
    value: Vec<ApiDocument>,
}

#[derive(Debug, Deserialize)]
struct ApiAnswer {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiCaption {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiDocument {
    #[serde(rename = "@search.score", default)]
    score: Option<f64>,
    #[serde(rename = "@search.rerankerScore", default)]
    reranker_score: Option<f64>,
    #[serde(rename = "@search.captions", default)]
    captions: Option<Vec<ApiCaption>>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    metadata_storage_name: Option<String>,
    #[serde(default)]
    people: Option<Vec<String>>,
    #[serde(default)]
    locations: Option<Vec<String>>,
}

impl ApiDocument {
    fn into_document(self) -> SearchDocument {
        SearchDocument {
            content: self.content,
            metadata_storage_name: self.metadata_storage_name,
            people: self.people.unwrap_or_default(),
            locations: self.locations.unwrap_or_default(),
            score: self.score,
            reranker_score: self.reranker_score,
            captions: self
                .captions
                .unwrap_or_default()
                .into_iter()
                .map(|c| c.text)
                .collect(),
        }
    }
}
