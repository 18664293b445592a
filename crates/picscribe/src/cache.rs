//! Durable idempotency ledger of already-processed images.
//!
//! Every record is mirrored in an in-memory index loaded at open, so
//! lookups from concurrent workers only take a read lock and never wait on
//! SQLite. Stores write through to the database first and update the index
//! only once the row is committed.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use chrono::Utc;
use log::{debug, info};

use crate::db::completion_repo::{self, CompletionRow};
use crate::db::{Database, DatabaseError, DATABASE_FILE};

/// What the cache remembers about a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheMarker {
    /// The image already carried a description when it was first seen.
    AlreadyDescribed,
    /// The description this tool generated and wrote.
    Description(String),
}

impl CacheMarker {
    fn from_column(description: Option<String>) -> Self {
        match description {
            Some(text) => CacheMarker::Description(text),
            None => CacheMarker::AlreadyDescribed,
        }
    }

    fn into_column(self) -> Option<String> {
        match self {
            CacheMarker::AlreadyDescribed => None,
            CacheMarker::Description(text) => Some(text),
        }
    }
}

pub struct CompletionCache {
    db: Database,
    index: RwLock<HashMap<String, CacheMarker>>,
    model: Option<String>,
}

impl CompletionCache {
    /// Opens the cache stored under `cache_dir`, creating it if needed.
    pub fn open(cache_dir: &Path) -> Result<Self, DatabaseError> {
        let db = Database::open(&cache_dir.join(DATABASE_FILE))?;
        Self::from_database(db)
    }

    /// Opens a throwaway cache, used by tests.
    pub fn in_memory() -> Result<Self, DatabaseError> {
        Self::from_database(Database::open_in_memory()?)
    }

    pub fn from_database(db: Database) -> Result<Self, DatabaseError> {
        let index: HashMap<String, CacheMarker> = completion_repo::find_all(&db)?
            .into_iter()
            .map(|row| (row.path, CacheMarker::from_column(row.description)))
            .collect();

        info!("Completion cache holds {} entries", index.len());

        Ok(Self {
            db,
            index: RwLock::new(index),
            model: None,
        })
    }

    /// Records `model` alongside every description stored from now on.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn lookup(&self, path: &Path) -> Option<CacheMarker> {
        let key = cache_key(path);
        self.index.read().ok()?.get(&key).cloned()
    }

    /// Stores `marker` for `path`, overwriting any previous entry.
    pub fn store(&self, path: &Path, marker: CacheMarker) -> Result<(), DatabaseError> {
        let key = cache_key(path);
        let model = match marker {
            CacheMarker::Description(_) => self.model.clone(),
            CacheMarker::AlreadyDescribed => None,
        };

        completion_repo::upsert(
            &self.db,
            &CompletionRow {
                path: key.clone(),
                description: marker.clone().into_column(),
                model,
                recorded_at: Utc::now().to_rfc3339(),
            },
        )?;

        self.index
            .write()
            .map_err(|_| DatabaseError::LockPoisoned)?
            .insert(key, marker);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.index.read().map(|i| i.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flushes pending writes and releases the database.
    pub fn close(self) -> Result<(), DatabaseError> {
        self.db.checkpoint()?;
        debug!("Completion cache closed");
        Ok(())
    }
}

fn cache_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
