// Key-value persistence used by the course core. Backends implement
// `KeyValueStore`; `Persistence` adds the degrade-to-memory policy on top.

mod database;
mod memory;

pub use database::DatabaseStore;
pub use memory::MemoryStore;

use std::{
    str::FromStr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use serde::{Serialize, de::DeserializeOwned};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("malformed value under {key}: {reason}")]
    Malformed { key: String, reason: String },
}

impl From<sea_orm::DbErr> for StorageError {
    fn from(err: sea_orm::DbErr) -> Self {
        StorageError::Unavailable(err.to_string())
    }
}

#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Result of reading and decoding a persisted value.
#[derive(Debug)]
pub enum Stored<T> {
    Absent,
    Present(T),
    Malformed(StorageError),
}

impl<T> Stored<T> {
    #[cfg(test)]
    pub fn present(self) -> Option<T> {
        match self {
            Stored::Present(value) => Some(value),
            _ => None,
        }
    }
}

/// Shared handle over a backend. The first backend failure switches it to
/// memory-only mode for the rest of the process: reads return nothing and
/// writes are dropped.
pub struct Persistence {
    backend: Arc<dyn KeyValueStore>,
    available: AtomicBool,
}

impl Persistence {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            available: AtomicBool::new(true),
        }
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    fn degrade(&self, op: &'static str, key: &str, err: &StorageError) {
        if self.available.swap(false, Ordering::Relaxed) {
            tracing::warn!(op, key, error = %err, "storage unavailable, continuing in memory only");
        }
    }

    #[tracing::instrument(level = "trace", skip(self))]
    pub async fn read(&self, key: &str) -> Option<String> {
        if !self.is_available() {
            return None;
        }
        match self.backend.get(key).await {
            Ok(value) => value,
            Err(e) => {
                self.degrade("get", key, &e);
                None
            }
        }
    }

    #[tracing::instrument(level = "trace", skip(self, value))]
    pub async fn write(&self, key: &str, value: &str) {
        if !self.is_available() {
            return;
        }
        if let Err(e) = self.backend.set(key, value).await {
            self.degrade("set", key, &e);
        }
    }

    #[tracing::instrument(level = "trace", skip(self))]
    pub async fn delete(&self, key: &str) {
        if !self.is_available() {
            return;
        }
        if let Err(e) = self.backend.remove(key).await {
            self.degrade("remove", key, &e);
        }
    }

    pub async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Stored<T> {
        let Some(raw) = self.read(key).await else {
            return Stored::Absent;
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Stored::Present(value),
            Err(e) => Stored::Malformed(StorageError::Malformed {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    pub async fn write_json<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.write(key, &raw).await,
            Err(e) => tracing::warn!(key, error = %e, "failed to encode value, not persisted"),
        }
    }

    /// Reads a plain decimal value such as a lesson number or epoch millis.
    pub async fn read_parsed<T>(&self, key: &str) -> Stored<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let Some(raw) = self.read(key).await else {
            return Stored::Absent;
        };
        match raw.trim().parse() {
            Ok(value) => Stored::Present(value),
            Err(e) => Stored::Malformed(StorageError::Malformed {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
impl Persistence {
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::default()))
    }
}


#[cfg(test)]
mod tests {
    use super::{testing::BrokenStore, *};

    #[tokio::test]
    async fn first_failure_switches_to_memory_only() {
        let persistence = Persistence::new(Arc::new(BrokenStore));
        assert!(persistence.is_available());

        assert_eq!(persistence.read("course-progress").await, None);
        assert!(!persistence.is_available());

        // further calls are silently dropped
        persistence.write("current_lesson", "3").await;
        persistence.delete("current_lesson").await;
        assert!(!persistence.is_available());
    }

    #[tokio::test]
    async fn undecodable_json_is_reported_as_malformed() {
        let persistence = Persistence::in_memory();
        persistence.write("course-progress", "{not json").await;

        let stored: Stored<serde_json::Value> = persistence.read_json("course-progress").await;
        assert!(matches!(stored, Stored::Malformed(StorageError::Malformed { .. })));
        assert!(persistence.is_available());
    }

    #[tokio::test]
    async fn decimal_values_round_trip() {
        let persistence = Persistence::in_memory();
        persistence.write("current_lesson", "5").await;

        assert_eq!(persistence.read_parsed::<u32>("current_lesson").await.present(), Some(5));
        assert!(matches!(
            persistence.read_parsed::<u32>("missing").await,
            Stored::Absent
        ));
    }
}
