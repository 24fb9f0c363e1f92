//! Core types and traits for the AIDA chat client
//!
//! This crate provides the session manager, the conversation store, the
//! remote bridge trait and the widget controller used by the other AIDA
//! crates.

pub mod bridge;
pub mod config;
pub mod conversation;
pub mod error;
pub mod identity;
pub mod logging;
pub mod render;
pub mod session;
pub mod storage;
pub mod utils;
pub mod widget;

pub use error::{Error, Result};
pub use identity::UserIdentity;
