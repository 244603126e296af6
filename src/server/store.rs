//! Task storage traits and implementations.
//!
//! Defines the interface for persisting and retrieving [`Task`] objects.
//! The default provider is in-process and non-persistent; durable
//! replacements drop in behind the trait.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::types::Task;

/// Key→Task mapping with optional time-to-live.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Saves or updates a task, optionally bounding its lifetime.
    async fn save(&self, task: &Task, ttl: Option<Duration>) -> Result<()>;

    /// Retrieves a task by ID. Expired entries read as absent.
    async fn get(&self, task_id: &str) -> Result<Option<Task>>;

    /// Deletes a task by ID, returning whether it was present.
    async fn delete(&self, task_id: &str) -> Result<bool>;

    /// Lists all live task IDs.
    async fn task_ids(&self) -> Result<Vec<String>>;
}

#[derive(Debug, Clone)]
struct StoredTask {
    task: Task,
    expires_at: Option<Instant>,
}

impl StoredTask {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// In-memory implementation of [`TaskStore`].
///
/// `get` on an expired key returns absent and purges the entry;
/// enumeration purges expired entries first.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<String, StoredTask>>,
}

impl InMemoryTaskStore {
    /// Creates a new in-memory task store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn purge_expired(&self) {
        let mut tasks = self.tasks.write().await;
        tasks.retain(|_, stored| !stored.is_expired());
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn save(&self, task: &Task, ttl: Option<Duration>) -> Result<()> {
        let stored = StoredTask {
            task: task.clone(),
            expires_at: ttl.map(|d| Instant::now() + d),
        };
        self.tasks.write().await.insert(task.id.clone(), stored);
        debug!(task_id = %task.id, state = ?task.status.state, "Task saved");
        Ok(())
    }

    async fn get(&self, task_id: &str) -> Result<Option<Task>> {
        {
            let tasks = self.tasks.read().await;
            match tasks.get(task_id) {
                Some(stored) if !stored.is_expired() => return Ok(Some(stored.task.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // Entry exists but has expired: purge it.
        self.tasks.write().await.remove(task_id);
        Ok(None)
    }

    async fn delete(&self, task_id: &str) -> Result<bool> {
        let removed = self.tasks.write().await.remove(task_id);
        Ok(removed.is_some_and(|stored| !stored.is_expired()))
    }

    async fn task_ids(&self) -> Result<Vec<String>> {
        self.purge_expired().await;
        let tasks = self.tasks.read().await;
        Ok(tasks.keys().cloned().collect())
    }
}
