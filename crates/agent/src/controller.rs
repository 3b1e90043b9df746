//! Conversation controller: runs one retrieval turn at a time.
//!
//! The controller owns the session's [`Conversation`]. A turn budgets the
//! conversation, pulls supporting documents, adds the closing instruction
//! and the question, then asks the completion provider for exactly one
//! reply. Failures are returned to the caller; whatever was appended before
//! the failing step stays in the conversation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use groundchat_config::AppConfig;
use groundchat_core::error::{ProviderError, SearchError};
use groundchat_core::message::{Conversation, Message};
use groundchat_core::provider::{Provider, ProviderRequest, Usage};
use groundchat_core::search::SearchProvider;
use tracing::{debug, info, warn};

use crate::context::{estimate, prune_with_report};
use crate::retrieval::{DEFAULT_LIMIT, Retriever};

/// Instruction appended after the retrieved documents on every turn.
pub const DEFAULT_CLOSING_INSTRUCTION: &str = "Only answer questions based on the transcripts above. \
You may infer answers from the transcript but be clear that there is no direct answer. \
If the answer is not found in the transcript at all, answer 'I don't know'. \
If you need to reference a transcript refer to it by its filename";

/// Tunables for the turn pipeline.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Completion deployment name.
    pub engine: String,
    /// Model identifier used for token estimation.
    pub token_model: String,
    /// Estimates above this trigger a prune.
    pub prune_threshold: usize,
    /// System messages removed per prune.
    pub prune_max_remove: usize,
    pub retrieval_limit: usize,
    pub closing_instruction: String,
    pub temperature: Option<f32>,
    /// Upper bound on each search and completion call.
    pub call_timeout: Option<Duration>,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            engine: "gpt-35-turbo".into(),
            token_model: "gpt-3.5-turbo-0613".into(),
            prune_threshold: 10_000,
            prune_max_remove: 4,
            retrieval_limit: DEFAULT_LIMIT,
            closing_instruction: DEFAULT_CLOSING_INSTRUCTION.into(),
            temperature: None,
            call_timeout: None,
        }
    }
}

impl ControllerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            engine: config.completion.engine.clone(),
            token_model: config.context.token_model.clone(),
            prune_threshold: config.context.prune_threshold,
            prune_max_remove: config.context.prune_max_remove,
            retrieval_limit: config.search.top_k,
            closing_instruction: config.session.closing_instruction.clone(),
            temperature: config.completion.temperature,
            call_timeout: config.context.call_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Whether a turn is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    InProgress,
}

/// What a completed turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The assistant reply, already appended to the conversation.
    pub reply: Message,
    /// Identifiers of the documents injected this turn.
    pub sources: Vec<String>,
    /// Token estimate taken before any pruning.
    pub tokens_before: usize,
    /// System messages dropped this turn.
    pub pruned: usize,
    pub usage: Option<Usage>,
}

/// A controller behind an async mutex, for surfaces that share it.
pub type SharedController = Arc<tokio::sync::Mutex<ConversationController>>;

pub struct ConversationController {
    provider: Arc<dyn Provider>,
    retriever: Retriever,
    settings: ControllerSettings,
    conversation: Conversation,
    state: TurnState,
}

impl ConversationController {
    pub fn new(
        provider: Arc<dyn Provider>,
        retriever: Retriever,
        conversation: Conversation,
        settings: ControllerSettings,
    ) -> Self {
        let retriever = retriever.with_limit(settings.retrieval_limit);
        Self {
            provider,
            retriever,
            settings,
            conversation,
            state: TurnState::Idle,
        }
    }

    /// A controller with a freshly seeded conversation.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        search: Arc<dyn SearchProvider>,
    ) -> Self {
        let retriever = Retriever::new(search, config.search.semantic_configuration.clone())
            .with_query_language(config.search.query_language.clone());
        let conversation = Conversation::seeded(
            config.session.system_prompt.clone(),
            config.session.greeting.clone(),
        );
        Self::new(
            provider,
            retriever,
            conversation,
            ControllerSettings::from_config(config),
        )
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// The messages a user should see, in order.
    pub fn transcript(&self) -> Vec<&Message> {
        self.conversation.visible().collect()
    }

    pub fn into_shared(self) -> SharedController {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    /// Run one full turn for `input`.
    pub async fn handle_turn(&mut self, input: &str) -> groundchat_core::Result<TurnOutcome> {
        self.state = TurnState::InProgress;
        let result = self.run_turn(input).await;
        self.state = TurnState::Idle;

        if let Err(e) = &result {
            warn!(error = %e, messages = self.conversation.len(), "Turn failed");
        }
        result
    }

    async fn run_turn(&mut self, input: &str) -> groundchat_core::Result<TurnOutcome> {
        let model = self.settings.token_model.as_str();
        let tokens_before = estimate(self.conversation.messages(), model)?;
        let mut pruned = 0;

        if tokens_before > self.settings.prune_threshold {
            warn!(
                tokens = tokens_before,
                threshold = self.settings.prune_threshold,
                "Conversation exceeds token threshold; pruning system messages"
            );
            let outcome =
                prune_with_report(self.conversation.messages(), self.settings.prune_max_remove);
            pruned = outcome.removed;
            self.conversation.replace_messages(outcome.messages);
            debug!(
                removed = pruned,
                tokens = estimate(self.conversation.messages(), model)?,
                "Conversation pruned"
            );
        } else {
            debug!(tokens = tokens_before, "Token estimate");
        }

        let docs = bounded(
            self.settings.call_timeout,
            self.retriever.retrieve(input),
            SearchError::Timeout,
        )
        .await?;

        let mut sources = Vec::with_capacity(docs.len());
        for doc in docs {
            sources.push(doc.id.clone());
            self.conversation.push(doc.into_message());
        }

        self.conversation
            .push(Message::system(self.settings.closing_instruction.clone()));
        self.conversation.push(Message::user(input));

        let mut request = ProviderRequest::new(
            self.settings.engine.clone(),
            self.conversation.messages().to_vec(),
        );
        request.temperature = self.settings.temperature;

        info!(
            provider = self.provider.name(),
            engine = %self.settings.engine,
            messages = request.messages.len(),
            sources = sources.len(),
            "Requesting completion"
        );

        let response = bounded(
            self.settings.call_timeout,
            self.provider.complete(request),
            ProviderError::Timeout,
        )
        .await?;

        let reply = response.message;
        self.conversation.push(reply.clone());

        info!(
            reply_len = reply.content.len(),
            messages = self.conversation.len(),
            "Turn complete"
        );

        Ok(TurnOutcome {
            reply,
            sources,
            tokens_before,
            pruned,
            usage: response.usage,
        })
    }
}

/// Await `fut`, failing with `on_timeout` if `limit` elapses first.
async fn bounded<T, E>(
    limit: Option<Duration>,
    fut: impl Future<Output = Result<T, E>>,
    on_timeout: impl FnOnce(String) -> E,
) -> Result<T, E> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .unwrap_or_else(|_| {
                Err(on_timeout(format!(
                    "no response within {}s",
                    limit.as_secs_f32()
                )))
            }),
        None => fut.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedProvider, ScriptedSearch, doc};
    use groundchat_core::Error;
    use groundchat_core::message::Role;

    fn seeded() -> Conversation {
        Conversation::seeded(
            "You are an AI assistant that helps people find information.",
            "Do you have a question about any of the transcripts in the database?",
        )
    }

    fn controller(
        provider: Arc<ScriptedProvider>,
        search: Arc<ScriptedSearch>,
        conversation: Conversation,
        settings: ControllerSettings,
    ) -> ConversationController {
        ConversationController::new(
            provider,
            Retriever::new(search, "semantictestconfig"),
            conversation,
            settings,
        )
    }

    fn three_docs() -> Arc<ScriptedSearch> {
        Arc::new(ScriptedSearch::with_docs([
            doc("a.txt", "Founded in\n1998."),
            doc("b.txt", "Second"),
            doc("c.txt", "Third"),
            doc("d.txt", "Never read"),
        ]))
    }

    #[tokio::test]
    async fn below_threshold_turn_appends_six_messages() {
        let provider = Arc::new(ScriptedProvider::replies(&["It was founded in 1998 (a.txt)."]));
        let mut ctl = controller(
            provider.clone(),
            three_docs(),
            seeded(),
            ControllerSettings::default(),
        );

        let outcome = ctl.handle_turn("What year was X founded?").await.unwrap();

        let msgs = ctl.conversation().messages();
        assert_eq!(msgs.len(), 8);
        assert_eq!(provider.call_count(), 1);
        assert_eq!(outcome.pruned, 0);
        assert_eq!(outcome.sources, vec!["a.txt", "b.txt", "c.txt"]);
        assert_eq!(outcome.reply.content, "It was founded in 1998 (a.txt).");

        assert_eq!(msgs[2].content, "a.txt\nFounded in 1998.");
        assert_eq!(msgs[5].role, Role::System);
        assert_eq!(msgs[5].content, DEFAULT_CLOSING_INSTRUCTION);
        assert_eq!(msgs[6], Message::user("What year was X founded?"));
        assert_eq!(msgs[7].role, Role::Assistant);
        assert_eq!(ctl.state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn request_carries_engine_and_full_conversation() {
        let provider = Arc::new(ScriptedProvider::replies(&["ok"]));
        let mut ctl = controller(
            provider.clone(),
            three_docs(),
            seeded(),
            ControllerSettings::default(),
        );
        ctl.handle_turn("q").await.unwrap();

        let requests = provider.requests();
        assert_eq!(requests[0].engine, "gpt-35-turbo");
        assert_eq!(requests[0].messages, ctl.conversation().messages()[..7].to_vec());
    }

    #[tokio::test]
    async fn above_threshold_prunes_before_retrieval() {
        let mut conversation = seeded();
        let long = "word ".repeat(3000);
        for i in 0..6 {
            conversation.push(Message::system(format!("old-{i}.txt\n{long}")));
        }
        assert!(estimate(conversation.messages(), "gpt-3.5-turbo-0613").unwrap() > 10_000);

        let provider = Arc::new(ScriptedProvider::replies(&["answer"]));
        let mut ctl = controller(
            provider,
            three_docs(),
            conversation,
            ControllerSettings::default(),
        );
        let outcome = ctl.handle_turn("q").await.unwrap();

        assert_eq!(outcome.pruned, 4);
        assert!(outcome.tokens_before > 10_000);

        let msgs = ctl.conversation().messages();
        assert_eq!(msgs[0].content, "You are an AI assistant that helps people find information.");
        let old: Vec<&str> = msgs
            .iter()
            .filter(|m| m.content.starts_with("old-"))
            .map(|m| &m.content[..9])
            .collect();
        assert_eq!(old, vec!["old-4.txt", "old-5.txt"]);
        // anchor + greeting + 2 old + 3 docs + instruction + question + reply
        assert_eq!(msgs.len(), 10);
    }

    #[tokio::test]
    async fn estimate_equal_to_threshold_does_not_prune() {
        let mut conversation = seeded();
        conversation.push(Message::system("old.txt\nstale context"));
        let before = estimate(conversation.messages(), "gpt-3.5-turbo-0613").unwrap();

        let at_limit = ControllerSettings {
            prune_threshold: before,
            ..Default::default()
        };
        let provider = Arc::new(ScriptedProvider::replies(&["answer"]));
        let mut ctl = controller(provider, three_docs(), conversation.clone(), at_limit);
        let outcome = ctl.handle_turn("q").await.unwrap();
        assert_eq!(outcome.tokens_before, before);
        assert_eq!(outcome.pruned, 0);
        assert!(ctl.conversation().messages().iter().any(|m| m.content.starts_with("old.txt")));

        let one_over = ControllerSettings {
            prune_threshold: before - 1,
            ..Default::default()
        };
        let provider = Arc::new(ScriptedProvider::replies(&["answer"]));
        let mut ctl = controller(provider, three_docs(), conversation, one_over);
        let outcome = ctl.handle_turn("q").await.unwrap();
        assert_eq!(outcome.tokens_before, before);
        assert_eq!(outcome.pruned, 1);
        assert!(!ctl.conversation().messages().iter().any(|m| m.content.starts_with("old.txt")));
    }

    #[tokio::test]
    async fn search_failure_keeps_state_and_returns_to_idle() {
        let provider = Arc::new(ScriptedProvider::replies(&[]));
        let search = Arc::new(ScriptedSearch::failing(SearchError::Network("refused".into())));
        let mut ctl = controller(provider.clone(), search, seeded(), ControllerSettings::default());

        let err = ctl.handle_turn("q").await.unwrap_err();
        assert!(matches!(err, Error::Search(SearchError::Network(_))));
        assert_eq!(ctl.conversation().len(), 2);
        assert_eq!(provider.call_count(), 0);
        assert_eq!(ctl.state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn completion_failure_keeps_appended_context() {
        let provider = Arc::new(ScriptedProvider::failing(ProviderError::RateLimited {
            retry_after_secs: 5,
        }));
        let mut ctl = controller(provider, three_docs(), seeded(), ControllerSettings::default());

        let err = ctl.handle_turn("q").await.unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::RateLimited { .. })));

        let msgs = ctl.conversation().messages();
        assert_eq!(msgs.len(), 7);
        assert_eq!(msgs[6], Message::user("q"));
        assert_eq!(ctl.state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn unsupported_token_model_fails_turn() {
        let provider = Arc::new(ScriptedProvider::replies(&[]));
        let settings = ControllerSettings {
            token_model: "gpt-35-turbo".into(),
            ..Default::default()
        };
        let mut ctl = controller(provider, three_docs(), seeded(), settings);

        let err = ctl.handle_turn("q").await.unwrap_err();
        assert!(matches!(err, Error::Context(_)));
        assert_eq!(ctl.conversation().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_completion_times_out() {
        let provider =
            Arc::new(ScriptedProvider::replies(&["late"]).with_delay(Duration::from_secs(60)));
        let settings = ControllerSettings {
            call_timeout: Some(Duration::from_secs(5)),
            ..Default::default()
        };
        let mut ctl = controller(provider, three_docs(), seeded(), settings);

        let err = ctl.handle_turn("q").await.unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::Timeout(_))));
        assert_eq!(ctl.conversation().len(), 7);
    }

    #[tokio::test]
    async fn transcript_hides_system_messages() {
        let provider = Arc::new(ScriptedProvider::replies(&["reply"]));
        let mut ctl = controller(provider, three_docs(), seeded(), ControllerSettings::default());
        ctl.handle_turn("question").await.unwrap();

        let roles: Vec<Role> = ctl.transcript().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::Assistant, Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn shared_controller_runs_turns_in_sequence() {
        let provider = Arc::new(ScriptedProvider::replies(&["one", "two"]));
        let shared = controller(
            provider.clone(),
            three_docs(),
            seeded(),
            ControllerSettings::default(),
        )
        .into_shared();

        for q in ["first", "second"] {
            shared.lock().await.handle_turn(q).await.unwrap();
        }
        assert_eq!(shared.lock().await.conversation().len(), 14);
        assert_eq!(provider.call_count(), 2);
    }

    #[test]
    fn settings_follow_config() {
        let mut config = AppConfig::default();
        config.completion.engine = "my-deployment".into();
        config.context.call_timeout_secs = Some(30);
        let settings = ControllerSettings::from_config(&config);
        assert_eq!(settings.engine, "my-deployment");
        assert_eq!(settings.prune_threshold, 10_000);
        assert_eq!(settings.prune_max_remove, 4);
        assert_eq!(settings.retrieval_limit, 3);
        assert_eq!(settings.call_timeout, Some(Duration::from_secs(30)));
    }
}
