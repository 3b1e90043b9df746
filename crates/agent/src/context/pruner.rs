//! System-message pruning.
//!
//! Retrieved documents and per-turn instructions pile up as system
//! messages. When the conversation grows too large, the oldest of them are
//! dropped, a bounded number per pass. The first system message is the
//! session's anchor instruction and always survives; user and assistant
//! messages are never removed.

use groundchat_core::message::Message;

/// Removal budget when the caller has no preference.
pub const DEFAULT_MAX_REMOVE: usize = 3;

/// The rebuilt message list and how many messages were dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneOutcome {
    pub messages: Vec<Message>,
    pub removed: usize,
}

/// Drop up to `max_remove` non-anchor system messages, oldest first.
pub fn prune(messages: &[Message], max_remove: usize) -> Vec<Message> {
    prune_with_report(messages, max_remove).messages
}

/// Like [`prune`], also reporting the number of removed messages.
pub fn prune_with_report(messages: &[Message], max_remove: usize) -> PruneOutcome {
    let mut kept = Vec::with_capacity(messages.len());
    let mut anchor_seen = false;
    let mut removed = 0;

    for message in messages {
        if message.is_system() {
            if !anchor_seen {
                anchor_seen = true;
            } else if removed < max_remove {
                removed += 1;
                continue;
            }
        }
        kept.push(message.clone());
    }

    PruneOutcome {
        messages: kept,
        removed,
    }
}
