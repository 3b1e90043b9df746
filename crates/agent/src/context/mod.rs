//! Context-window management.
//!
//! Two pieces keep a conversation under the model's budget:
//!
//! | Piece | Role |
//! |-------|------|
//! | [`token`] | Counts tokens the way the target model bills them |
//! | [`pruner`] | Drops non-anchor system messages when the count runs high |
//!
//! The anchor (first system message) is never pruned, and user and
//! assistant turns are never touched.

pub mod pruner;
pub mod token;

pub use pruner::{DEFAULT_MAX_REMOVE, PruneOutcome, prune, prune_with_report};
pub use token::{
    FamilyRule, ModelProfile, ResolvedModel, TokenEstimator, estimate, estimate_with_resolution,
    resolve_profile,
};
