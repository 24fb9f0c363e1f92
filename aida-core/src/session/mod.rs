//! Backend session lifecycle
//!
//! One session per user identity. Session ids are persisted so a restarted
//! client can resume after the backend confirms the session is still active.

pub mod manager;
pub mod types;

pub use manager::SessionManager;
pub use types::{Credentials, SessionId, SessionState, TurnReply};
