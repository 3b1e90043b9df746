//! The retrieval chat loop at the heart of GroundChat.
//!
//! Every user question runs one **turn**:
//!
//! 1. **Budget**: estimate tokens; prune old system messages if over threshold
//! 2. **Retrieve** the top documents for the question and append them
//! 3. **Instruct**: append the closing instruction, then the question
//! 4. **Complete**: send the whole conversation to the provider
//! 5. **Reply**: append the answer and hand it to the chat surface
//!
//! Turns never overlap: the controller takes `&mut self` for the whole cycle.

pub mod context;
pub mod controller;
pub mod retrieval;

pub use context::{
    FamilyRule, ModelProfile, PruneOutcome, ResolvedModel, TokenEstimator, estimate,
    estimate_with_resolution, prune, prune_with_report, resolve_profile,
};
pub use controller::{
    ControllerSettings, ConversationController, SharedController, TurnOutcome, TurnState,
};
pub use retrieval::{RetrievedDocument, Retriever, retrieve};

#[cfg(test)]
pub(crate) mod test_helpers;
