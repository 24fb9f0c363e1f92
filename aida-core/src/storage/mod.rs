//! Durable local key-value storage
//!
//! Every persisted entry is a JSON string stored under a key made of a fixed
//! prefix, the entry kind and the user identity. Entries are independent:
//! nothing here offers atomicity across keys.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::identity::UserIdentity;
use std::fmt;

/// Prefix shared by every key the client writes
pub const KEY_PREFIX: &str = "aida";

/// Synchronous key-value storage scoped to the client process
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any
    fn get(&self, key: &str) -> crate::Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> crate::Result<()>;

    /// Remove `key`. Removing a missing key succeeds.
    fn remove(&self, key: &str) -> crate::Result<()>;
}

/// The kinds of entries stored per identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Settings,
    SessionId,
    History,
}

impl EntryKind {
    fn as_str(self) -> &'static str {
        match self {
            EntryKind::Settings => "settings",
            EntryKind::SessionId => "session_id",
            EntryKind::History => "history",
        }
    }
}

/// A namespaced storage key: `aida:{kind}:{identity}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn new(kind: EntryKind, identity: &UserIdentity) -> Self {
        Self(format!("{}:{}:{}", KEY_PREFIX, kind.as_str(), identity))
    }

    pub fn settings(identity: &UserIdentity) -> Self {
        Self::new(EntryKind::Settings, identity)
    }

    pub fn session_id(identity: &UserIdentity) -> Self {
        Self::new(EntryKind::SessionId, identity)
    }

    pub fn history(identity: &UserIdentity) -> Self {
        Self::new(EntryKind::History, identity)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
