//! Token estimation for chat-formatted message lists.
//!
//! Counts what a chat model bills for a request: a fixed overhead per
//! message, the sub-word tokens of every text field, a per-name adjustment,
//! and three tokens that prime the reply. Sub-word counts come from the
//! model's BPE encoding via `tiktoken-rs`.
//!
//! Overheads depend on the model. Identifiers are resolved to a
//! [`ModelProfile`] by exact match first, then by an ordered list of
//! [`FamilyRule`]s that map an unpinned family name onto a pinned snapshot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use groundchat_core::error::ContextError;
use groundchat_core::message::{Message, MessageField};
use tiktoken_rs::CoreBPE;
use tiktoken_rs::tokenizer::{Tokenizer, get_tokenizer};
use tracing::warn;

/// Every reply is primed with `<|start|>assistant<|message|>`.
pub const REPLY_PRIMING_TOKENS: i64 = 3;

/// Encoding used when a model identifier has no known tokenizer.
pub const FALLBACK_TOKENIZER: Tokenizer = Tokenizer::Cl100kBase;

/// Per-message accounting overheads for a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelProfile {
    pub tokens_per_message: i64,
    /// Negative when a name replaces the role token.
    pub tokens_per_name: i64,
}

const CHATML: ModelProfile = ModelProfile {
    tokens_per_message: 3,
    tokens_per_name: 1,
};

// <|start|>{role/name}\n{content}<|end|>\n; a name omits the role
const LEGACY_CHATML: ModelProfile = ModelProfile {
    tokens_per_message: 4,
    tokens_per_name: -1,
};

const KNOWN_MODELS: &[(&str, ModelProfile)] = &[
    ("gpt-3.5-turbo-0613", CHATML),
    ("gpt-3.5-turbo-16k-0613", CHATML),
    ("gpt-4-0314", CHATML),
    ("gpt-4-32k-0314", CHATML),
    ("gpt-4-0613", CHATML),
    ("gpt-4-32k-0613", CHATML),
    ("gpt-3.5-turbo-0301", LEGACY_CHATML),
];

/// Maps any identifier containing `family` onto the pinned `canonical` one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilyRule {
    pub family: &'static str,
    pub canonical: &'static str,
}

impl FamilyRule {
    pub fn matches(&self, model: &str) -> bool {
        model.contains(self.family)
    }
}

/// Checked in order; the first match wins.
pub const FAMILY_RULES: &[FamilyRule] = &[
    FamilyRule {
        family: "gpt-3.5-turbo",
        canonical: "gpt-3.5-turbo-0613",
    },
    FamilyRule {
        family: "gpt-4",
        canonical: "gpt-4-0613",
    },
];

/// The identifier counting is performed as, and its profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModel {
    pub model: String,
    pub profile: ModelProfile,
}

fn exact_profile(model: &str) -> Option<ModelProfile> {
    KNOWN_MODELS
        .iter()
        .find(|(id, _)| *id == model)
        .map(|(_, profile)| *profile)
}

/// Resolve a model identifier to the profile used for counting.
///
/// A family match warns, because unpinned models may change their
/// accounting over time; counting then proceeds exactly as for the
/// canonical snapshot, tokenizer included.
pub fn resolve_profile(model: &str) -> Result<ResolvedModel, ContextError> {
    if let Some(profile) = exact_profile(model) {
        return Ok(ResolvedModel {
            model: model.to_string(),
            profile,
        });
    }

    let unsupported = || ContextError::UnsupportedModel {
        model: model.to_string(),
    };

    let rule = FAMILY_RULES
        .iter()
        .find(|rule| rule.matches(model))
        .ok_or_else(unsupported)?;

    warn!(
        model,
        assumed = rule.canonical,
        "{} may update over time; counting tokens as {}",
        rule.family,
        rule.canonical
    );

    let profile = exact_profile(rule.canonical).ok_or_else(unsupported)?;
    Ok(ResolvedModel {
        model: rule.canonical.to_string(),
        profile,
    })
}

/// Counts tokens for message lists, caching loaded encodings.
#[derive(Default)]
pub struct TokenEstimator {
    encodings: Mutex<HashMap<String, Arc<CoreBPE>>>,
}

impl TokenEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The BPE encoding for a model, falling back to `cl100k_base`.
    fn encoding_for(&self, model: &str) -> Result<Arc<CoreBPE>, ContextError> {
        let tokenizer = get_tokenizer(model).unwrap_or_else(|| {
            warn!(model, "No tokenizer for model; using cl100k_base encoding");
            FALLBACK_TOKENIZER
        });
        let key = format!("{tokenizer:?}");

        let mut encodings = self.encodings.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(bpe) = encodings.get(&key) {
            return Ok(bpe.clone());
        }

        let bpe = tiktoken_rs::get_bpe_from_tokenizer(tokenizer).map_err(|e| {
            ContextError::Tokenizer {
                name: key.clone(),
                reason: e.to_string(),
            }
        })?;
        let bpe = Arc::new(bpe);
        encodings.insert(key, bpe.clone());
        Ok(bpe)
    }

    /// Sub-word token count of a single text under a model's encoding.
    pub fn count_text(&self, text: &str, model: &str) -> Result<usize, ContextError> {
        let bpe = self.encoding_for(model)?;
        Ok(bpe.encode_ordinary(text).len())
    }

    /// Estimate the prompt tokens a model bills for `messages`.
    pub fn estimate(&self, messages: &[Message], model: &str) -> Result<usize, ContextError> {
        let resolved = resolve_profile(model)?;
        self.estimate_resolved(messages, &resolved)
    }

    /// Estimate for a model already passed through [`resolve_profile`].
    pub fn estimate_resolved(
        &self,
        messages: &[Message],
        resolved: &ResolvedModel,
    ) -> Result<usize, ContextError> {
        let bpe = self.encoding_for(&resolved.model)?;
        let profile = resolved.profile;

        let mut total: i64 = 0;
        for message in messages {
            total += profile.tokens_per_message;
            for field in message.fields() {
                total += bpe.encode_ordinary(field.text()).len() as i64;
                if let MessageField::Name(_) = field {
                    total += profile.tokens_per_name;
                }
            }
        }
        total += REPLY_PRIMING_TOKENS;

        Ok(total.max(0) as usize)
    }
}

/// Process-wide estimator, so encodings are loaded once.
pub fn shared() -> &'static TokenEstimator {
    static ESTIMATOR: OnceLock<TokenEstimator> = OnceLock::new();
    ESTIMATOR.get_or_init(TokenEstimator::new)
}

/// Estimate tokens for `messages` under `model` using the shared estimator.
pub fn estimate(messages: &[Message], model: &str) -> Result<usize, ContextError> {
    shared().estimate(messages, model)
}

/// Resolve `model` once and estimate, returning the resolution alongside.
pub fn estimate_with_resolution(
    messages: &[Message],
    model: &str,
) -> Result<(ResolvedModel, usize), ContextError> {
    let resolved = resolve_profile(model)?;
    let total = shared().estimate_resolved(messages, &resolved)?;
    Ok((resolved, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Message> {
        vec![
            Message::system("You are an AI assistant that helps people find information."),
            Message::assistant(
                "Do you have a question about any of the transcripts in the database?",
            ),
            Message::user("What year was the company founded?"),
        ]
    }

    fn count(text: &str) -> usize {
        shared().count_text(text, "gpt-3.5-turbo-0613").unwrap()
    }

    #[test]
    fn pinned_models_resolve_exactly() {
        for id in [
            "gpt-3.5-turbo-0613",
            "gpt-3.5-turbo-16k-0613",
            "gpt-4-0314",
            "gpt-4-32k-0314",
            "gpt-4-0613",
            "gpt-4-32k-0613",
        ] {
            let resolved = resolve_profile(id).unwrap();
            assert_eq!(resolved.model, id);
            assert_eq!(resolved.profile, CHATML);
        }
    }

    #[test]
    fn legacy_snapshot_has_its_own_overheads() {
        let resolved = resolve_profile("gpt-3.5-turbo-0301").unwrap();
        assert_eq!(resolved.profile.tokens_per_message, 4);
        assert_eq!(resolved.profile.tokens_per_name, -1);
    }

    #[test]
    fn family_rules_are_ordered_turbo_first() {
        assert_eq!(FAMILY_RULES[0].family, "gpt-3.5-turbo");
        assert_eq!(FAMILY_RULES[1].family, "gpt-4");
        assert!(FAMILY_RULES[1].matches("gpt-4-unknown-variant"));
        assert!(!FAMILY_RULES[0].matches("gpt-4-unknown-variant"));
    }

    #[test]
    fn unpinned_models_resolve_to_canonical_snapshot() {
        assert_eq!(resolve_profile("gpt-3.5-turbo").unwrap().model, "gpt-3.5-turbo-0613");
        assert_eq!(resolve_profile("gpt-3.5-turbo-1106").unwrap().model, "gpt-3.5-turbo-0613");
        assert_eq!(resolve_profile("gpt-4").unwrap().model, "gpt-4-0613");
        assert_eq!(resolve_profile("gpt-4-unknown-variant").unwrap().model, "gpt-4-0613");
    }

    #[test]
    fn unknown_model_is_unsupported() {
        let err = resolve_profile("text-davinci-003").unwrap_err();
        assert!(matches!(
            err,
            ContextError::UnsupportedModel { ref model } if model == "text-davinci-003"
        ));

        // Azure deployment names are not model identifiers
        assert!(resolve_profile("gpt-35-turbo").is_err());
        assert!(estimate(&sample(), "llama-3").is_err());
    }

    #[test]
    fn empty_conversation_costs_reply_priming_only() {
        assert_eq!(estimate(&[], "gpt-4-0613").unwrap(), 3);
    }

    #[test]
    fn estimate_is_deterministic() {
        let msgs = sample();
        let first = estimate(&msgs, "gpt-3.5-turbo-0613").unwrap();
        for _ in 0..5 {
            assert_eq!(estimate(&msgs, "gpt-3.5-turbo-0613").unwrap(), first);
        }
        let other = TokenEstimator::new();
        assert_eq!(other.estimate(&msgs, "gpt-3.5-turbo-0613").unwrap(), first);
    }

    #[test]
    fn family_fallback_matches_canonical_count() {
        let msgs = sample();
        assert_eq!(
            estimate(&msgs, "gpt-4-unknown-variant").unwrap(),
            estimate(&msgs, "gpt-4-0613").unwrap()
        );
        assert_eq!(
            estimate(&msgs, "gpt-3.5-turbo").unwrap(),
            estimate(&msgs, "gpt-3.5-turbo-0613").unwrap()
        );
    }

    #[test]
    fn resolution_is_returned_with_the_count() {
        let msgs = sample();
        let (resolved, total) = estimate_with_resolution(&msgs, "gpt-4").unwrap();
        assert_eq!(resolved.model, "gpt-4-0613");
        assert_eq!(total, estimate(&msgs, "gpt-4-0613").unwrap());
        assert!(estimate_with_resolution(&msgs, "claude-2").is_err());
    }

    #[test]
    fn estimate_sums_overheads_and_content() {
        let msgs = sample();
        let expected: usize = msgs.iter().map(|m| 3 + count(&m.content)).sum::<usize>() + 3;
        assert_eq!(estimate(&msgs, "gpt-3.5-turbo-0613").unwrap(), expected);
    }

    #[test]
    fn name_field_adds_its_tokens_plus_adjustment() {
        let plain = [Message::user("hi")];
        let named = [Message::user("hi").with_name("alice")];
        let with = estimate(&named, "gpt-4-0613").unwrap();
        let without = estimate(&plain, "gpt-4-0613").unwrap();
        assert_eq!(with - without, count("alice") + 1);
    }

    #[test]
    fn legacy_snapshot_name_replaces_role_token() {
        let msg = [Message::user("hi").with_name("alice")];
        let contribution = 4 + count("hi") + count("alice") - 1;
        assert_eq!(
            estimate(&msg, "gpt-3.5-turbo-0301").unwrap(),
            contribution + 3
        );
    }

    #[test]
    fn count_text_uses_subword_units() {
        assert_eq!(count(""), 0);
        assert_eq!(count("hello world"), 2);
    }

    #[test]
    fn unknown_tokenizer_falls_back_to_cl100k() {
        let est = TokenEstimator::new();
        let fallback = est.count_text("transcripts", "no-such-model").unwrap();
        assert_eq!(fallback, count("transcripts"));
    }
}
