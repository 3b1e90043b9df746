//! Backend implementations for GroundChat.
//!
//! - [`AzureOpenAiProvider`] implements `groundchat_core::Provider`
//!   against an Azure OpenAI chat-completions deployment.
//! - [`AzureSearchProvider`] implements `groundchat_core::SearchProvider`
//!   against an Azure Cognitive Search index.
//!
//! [`build_from_credentials`] wires both from resolved configuration.

pub mod azure_openai;
pub mod azure_search;

pub use azure_openai::AzureOpenAiProvider;
pub use azure_search::AzureSearchProvider;

use std::sync::Arc;
use std::time::Duration;

use groundchat_config::Credentials;
use groundchat_core::{Provider, SearchProvider};

/// HTTP timeout applied when the configuration does not set one.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// Build the completion and search backends from resolved credentials.
pub fn build_from_credentials(
    credentials: &Credentials,
    timeout: Option<Duration>,
) -> groundchat_core::Result<(Arc<dyn Provider>, Arc<dyn SearchProvider>)> {
    let timeout = timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT);

    let completion = AzureOpenAiProvider::new(
        &credentials.completion_api_base,
        &credentials.completion_api_key,
        &credentials.completion_api_version,
        timeout,
    )?;

    let search = AzureSearchProvider::new(
        &credentials.search_service,
        &credentials.index_name,
        &credentials.search_admin_key,
        timeout,
    )?;

    Ok((Arc::new(completion), Arc::new(search)))
}
