//! # GroundChat Core
//!
//! Domain types, traits, and error definitions for the GroundChat
//! retrieval-augmented chat front-end. This crate has no HTTP or runtime
//! dependencies of its own; it defines the model every other crate
//! implements against.
//!
//! ## Design Philosophy
//!
//! Each external collaborator is a trait here:
//! - [`Provider`]: text completion over an ordered message list
//! - [`SearchProvider`]: ranked document search
//! - [`Channel`]: the chat surface a user types into
//!
//! Implementations live in their own crates, so the conversation logic can
//! be exercised against scripted stand-ins.

pub mod channel;
pub mod error;
pub mod message;
pub mod provider;
pub mod search;

// Re-export key types at crate root for ergonomics
pub use channel::{Channel, ChannelId, ChannelMessage};
pub use error::{Error, Result};
pub use message::{Conversation, ConversationId, Message, MessageField, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use search::{SearchDocument, SearchProvider, SearchRequest, SearchResults};
