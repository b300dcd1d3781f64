//! Named, typed values mirrored to the key-value store.
//!
//! A [`PersistedValue`] hydrates from storage once, then writes through on
//! every mutation. In-process observers subscribe to a `watch` channel and see
//! each committed value as soon as the write returns.

use crate::db::{KeyValueStore, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

pub struct PersistedValue<T> {
    key: String,
    backend: Arc<dyn KeyValueStore>,
    tx: watch::Sender<T>,
    // Serialises read-modify-write cycles so the last writer wins cleanly.
    write_lock: Mutex<()>,
}

impl<T> PersistedValue<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    /// Loads `key` from `backend`, falling back to `default` when nothing is
    /// stored or the stored payload no longer matches `T`.
    pub fn new(backend: Arc<dyn KeyValueStore>, key: impl Into<String>, default: T) -> Self {
        let key = key.into();
        let value = hydrate(backend.as_ref(), &key).unwrap_or(default);
        let (tx, _) = watch::channel(value);
        Self {
            key,
            backend,
            tx,
            write_lock: Mutex::new(()),
        }
    }

    pub fn read(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Runs `f` against the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.tx.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    pub fn write(&self, value: T) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        self.persist(&value)?;
        self.tx.send_replace(value);
        Ok(())
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, StoreError> {
        self.try_update(|value| Ok::<_, StoreError>(f(value)))
    }

    /// Read-modify-write. When `f` fails nothing is persisted or published.
    pub fn try_update<R, E>(&self, f: impl FnOnce(&mut T) -> Result<R, E>) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut next = self.tx.borrow().clone();
        let out = f(&mut next)?;
        self.persist(&next)?;
        self.tx.send_replace(next);
        Ok(out)
    }

    fn persist(&self, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)?;
        self.backend.set(&self.key, &raw)
    }
}

fn hydrate<T: DeserializeOwned>(backend: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match backend.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(key, error = %e, "failed to load persisted value, using default");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, error = %e, "discarding undecodable persisted value");
            None
        }
    }
}
