//! # SecondBrain Core
//!
//! Domain types, traits, and error definitions for the SecondBrain knowledge
//! assistant. This crate has **no framework dependencies**; it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem that talks to the outside world is a trait here:
//! - [`KnowledgeStore`] for the user's stored, normalized content
//! - [`Provider`] for the language-model backend
//!
//! Implementations live in their respective crates, and all crates depend
//! inward on core.

pub mod error;
pub mod knowledge;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use error::{ProviderError, StoreError};
pub use knowledge::{
    ExcerptQuery, ItemStatus, KnowledgeExcerpt, KnowledgeItem, KnowledgeStore, Modality,
    NewKnowledgeItem,
};
pub use message::{ConversationTurn, Role, latest_user_turn};
pub use provider::{ByteStream, Provider, ProviderRequest, ProviderResponse};
