//! Conversation history
//!
//! Messages are kept per user identity and persisted as a JSON array after
//! every append, so a reload can replay the conversation.

pub mod message;
pub mod store;

pub use message::{ConversationLog, Message, Role};
pub use store::ConversationStore;
