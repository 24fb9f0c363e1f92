//! Per-identity conversation store

use super::message::{ConversationLog, Message};
use crate::identity::UserIdentity;
use crate::storage::{KeyValueStore, StorageKey};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Keeps one [`ConversationLog`] per identity in memory and mirrors every
/// change to durable storage.
///
/// Storage is best effort: a failed write is logged and the in-memory log
/// stays authoritative for the rest of the process.
pub struct ConversationStore {
    storage: Arc<dyn KeyValueStore>,
    logs: Mutex<HashMap<UserIdentity, ConversationLog>>,
}

impl ConversationStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            logs: Mutex::new(HashMap::new()),
        }
    }

    /// Append a message and persist the whole updated log
    pub fn append(&self, identity: &UserIdentity, message: Message) {
        let serialized = {
            let mut logs = self.logs.lock();
            let log = logs
                .entry(identity.clone())
                .or_insert_with(|| self.read_persisted(identity));
            log.push(message);
            serde_json::to_string(log)
        };

        let key = StorageKey::history(identity);
        let result = serialized
            .map_err(crate::Error::from)
            .and_then(|raw| self.storage.set(key.as_str(), &raw));
        if let Err(e) = result {
            warn!(identity = %identity, error = %e, "Failed to persist conversation log");
        }
    }

    /// The log for `identity`: from memory if already loaded, otherwise
    /// from storage. Missing or unreadable data yields an empty log.
    pub fn load(&self, identity: &UserIdentity) -> ConversationLog {
        let mut logs = self.logs.lock();
        logs.entry(identity.clone())
            .or_insert_with(|| self.read_persisted(identity))
            .clone()
    }

    /// Empty the log in memory and in storage
    pub fn clear(&self, identity: &UserIdentity) {
        self.logs
            .lock()
            .insert(identity.clone(), ConversationLog::new());

        let key = StorageKey::history(identity);
        if let Err(e) = self.storage.remove(key.as_str()) {
            warn!(identity = %identity, error = %e, "Failed to remove stored conversation log");
        }
    }

    fn read_persisted(&self, identity: &UserIdentity) -> ConversationLog {
        let key = StorageKey::history(identity);
        match self.storage.get(key.as_str()) {
            Ok(Some(raw)) => match serde_json::from_str::<ConversationLog>(&raw) {
                Ok(log) => {
                    debug!(identity = %identity, messages = log.len(), "Loaded conversation log");
                    log
                }
                Err(e) => {
                    warn!(identity = %identity, error = %e, "Discarding unreadable conversation log");
                    ConversationLog::new()
                }
            },
            Ok(None) => ConversationLog::new(),
            Err(e) => {
                warn!(identity = %identity, error = %e, "Failed to read conversation log");
                ConversationLog::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;
    use crate::storage::{FileStore, MemoryStore};
    use tempfile::TempDir;

    struct FailingWrites {
        inner: MemoryStore,
    }

    impl KeyValueStore for FailingWrites {
        fn get(&self, key: &str) -> crate::Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, _key: &str, _value: &str) -> crate::Result<()> {
            Err(crate::Error::Storage("quota exceeded".into()))
        }

        fn remove(&self, _key: &str) -> crate::Result<()> {
            Err(crate::Error::Storage("quota exceeded".into()))
        }
    }

    fn identity(token: &str) -> UserIdentity {
        UserIdentity::from_token(token)
    }

    #[test]
    fn test_append_then_load_survives_reload() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let id = identity("U1");

        let store = ConversationStore::new(storage.clone());
        store.append(&id, Message::user("Hello"));
        let reply = Message::assistant("Hi! How can I help?");
        store.append(&id, reply.clone());

        let reloaded = ConversationStore::new(storage);
        let log = reloaded.load(&id);
        assert_eq!(log.len(), 2);
        assert_eq!(log.last(), Some(&reply));
    }

    #[test]
    fn test_file_backed_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let id = identity("942a46");
        let message = Message::user("List overdue sales orders");

        ConversationStore::new(Arc::new(FileStore::new(temp_dir.path())))
            .append(&id, message.clone());

        let log = ConversationStore::new(Arc::new(FileStore::new(temp_dir.path()))).load(&id);
        assert_eq!(log.last(), Some(&message));
    }

    #[test]
    fn test_corrupt_history_loads_empty() {
        let storage = Arc::new(MemoryStore::new());
        let id = identity("U2");
        storage
            .set(StorageKey::history(&id).as_str(), "{not a log")
            .unwrap();

        let store = ConversationStore::new(storage);
        assert!(store.load(&id).is_empty());
    }

    #[test]
    fn test_append_after_corrupt_history_starts_fresh() {
        let storage = Arc::new(MemoryStore::new());
        let id = identity("U2");
        storage
            .set(StorageKey::history(&id).as_str(), "[{\"role\": 42}]")
            .unwrap();

        let store = ConversationStore::new(storage.clone());
        store.append(&id, Message::user("Hello again"));

        let log = ConversationStore::new(storage).load(&id);
        assert_eq!(log.len(), 1);
        assert_eq!(log.messages()[0].text, "Hello again");
    }

    #[test]
    fn test_clear_empties_memory_and_storage() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let id = identity("U1");

        let store = ConversationStore::new(storage.clone());
        store.append(&id, Message::user("Hello"));
        store.clear(&id);

        assert!(store.load(&id).is_empty());
        assert!(ConversationStore::new(storage).load(&id).is_empty());
    }

    #[test]
    fn test_clear_never_written_identity() {
        let store = ConversationStore::new(Arc::new(MemoryStore::new()));
        let id = identity("ghost");

        store.clear(&id);
        store.clear(&id);
        assert!(store.load(&id).is_empty());
    }

    #[test]
    fn test_failed_write_keeps_in_memory_log() {
        let store = ConversationStore::new(Arc::new(FailingWrites {
            inner: MemoryStore::new(),
        }));
        let id = identity("U3");

        store.append(&id, Message::user("Hello"));
        store.append(&id, Message::assistant("Hi"));

        let log = store.load(&id);
        assert_eq!(log.len(), 2);
        assert_eq!(log.messages()[1].role, Role::Assistant);
    }

    #[test]
    fn test_identities_do_not_share_logs() {
        let store = ConversationStore::new(Arc::new(MemoryStore::new()));
        store.append(&identity("a"), Message::user("from a"));

        assert!(store.load(&identity("b")).is_empty());
        assert_eq!(store.load(&identity("a")).len(), 1);
    }
}
