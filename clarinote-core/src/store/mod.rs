//! Keyed persistence for everything the app remembers.
//!
//! A [`StoreBackend`] holds raw JSON text per key. [`Store`] layers typed
//! access on top: reads never fail (absent, unreadable or malformed values
//! fall back to the type's default) and every successful write notifies the
//! subscribers of that key.

use crate::{AppSettings, CoreError, Deck, Session, Subject};
use parking_lot::{Mutex, RwLock};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub mod memory;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreKey {
    Subjects,
    Sessions,
    Decks,
    Settings,
    AiQuestionsCount,
    SessionNotes,
}

impl StoreKey {
    pub const ALL: [StoreKey; 6] = [
        StoreKey::Subjects,
        StoreKey::Sessions,
        StoreKey::Decks,
        StoreKey::Settings,
        StoreKey::AiQuestionsCount,
        StoreKey::SessionNotes,
    ];

    /// Name the value is persisted under.
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::Subjects => "studybot-subjects",
            StoreKey::Sessions => "studybot-sessions",
            StoreKey::Decks => "studybot-decks",
            StoreKey::Settings => "studybot-settings",
            StoreKey::AiQuestionsCount => "studybot-ai-questions-count",
            StoreKey::SessionNotes => "studybot-session-notes",
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw text storage. Writes must be durable when they return `Ok`.
pub trait StoreBackend: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, CoreError>;
    fn write(&self, key: &str, value: &str) -> Result<(), CoreError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(StoreKey) + Send + Sync>;

struct Subscriber {
    id: SubscriptionId,
    key: StoreKey,
    callback: Callback,
}

struct Inner {
    backend: Box<dyn StoreBackend>,
    // Serializes read-modify-write sequences from `update`.
    write_lock: Mutex<()>,
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
}

/// Shared handle to the app's persistent state. Cloning is cheap; all clones
/// see the same backend and subscriber list.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

impl Store {
    pub fn new(backend: impl StoreBackend + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend: Box::new(backend),
                write_lock: Mutex::new(()),
                subscribers: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(memory::MemoryBackend::new())
    }

    pub fn get<T: DeserializeOwned + Default>(&self, key: StoreKey) -> T {
        let raw = match self.inner.backend.read(key.as_str()) {
            Ok(Some(raw)) => raw,
            Ok(None) => return T::default(),
            Err(e) => {
                tracing::warn!(%key, error = %e, "store read failed, using default");
                return T::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(%key, error = %e, "stored value is corrupt, using default");
                T::default()
            }
        }
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: StoreKey, value: &T) -> Result<(), CoreError> {
        {
            let _guard = self.inner.write_lock.lock();
            self.write_raw(key, value)?;
        }
        self.notify(key);
        Ok(())
    }

    /// Read-modify-write under the store's write lock.
    pub fn update<T, R>(&self, key: StoreKey, f: impl FnOnce(&mut T) -> R) -> Result<R, CoreError>
    where
        T: Serialize + DeserializeOwned + Default,
    {
        let out = {
            let _guard = self.inner.write_lock.lock();
            let mut value: T = self.get(key);
            let out = f(&mut value);
            self.write_raw(key, &value)?;
            out
        };
        self.notify(key);
        Ok(out)
    }

    fn write_raw<T: Serialize + ?Sized>(&self, key: StoreKey, value: &T) -> Result<(), CoreError> {
        let text = serde_json::to_string(value).map_err(|e| CoreError::Storage(e.to_string()))?;
        self.inner.backend.write(key.as_str(), &text)
    }

    pub fn subscribe(
        &self,
        key: StoreKey,
        callback: impl Fn(StoreKey) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.subscribers.write().push(Subscriber {
            id,
            key,
            callback: Arc::new(callback),
        });
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.inner.subscribers.write();
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }

    fn notify(&self, key: StoreKey) {
        // Collect first so callbacks may subscribe or write without deadlocking.
        let callbacks: Vec<Callback> = self
            .inner
            .subscribers
            .read()
            .iter()
            .filter(|s| s.key == key)
            .map(|s| s.callback.clone())
            .collect();
        for cb in callbacks {
            cb(key);
        }
    }

    // Typed accessors

    pub fn subjects(&self) -> Vec<Subject> {
        self.get(StoreKey::Subjects)
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.get(StoreKey::Sessions)
    }

    pub fn decks(&self) -> Vec<Deck> {
        self.get(StoreKey::Decks)
    }

    pub fn settings(&self) -> AppSettings {
        self.get(StoreKey::Settings)
    }

    pub fn ai_questions_count(&self) -> u64 {
        self.get(StoreKey::AiQuestionsCount)
    }

    pub fn session_notes(&self) -> String {
        self.get(StoreKey::SessionNotes)
    }

    pub fn append_session(&self, session: Session) -> Result<(), CoreError> {
        self.update(StoreKey::Sessions, |v: &mut Vec<Session>| v.push(session))
    }
}
