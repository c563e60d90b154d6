// crates/server/src/registry.rs
//! Per-project `EventStore` registry. Each project gets its own ring
//! (capacity = `bufferSize`) sharing the one project-partitioned
//! `PersistentLog` handle — the log's `project` column is the partition,
//! so there is no need for one database file per project.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use runtimescope_core::{EventStore, PersistentLog};

pub struct ProjectRegistry {
    log: Arc<dyn PersistentLog>,
    buffer_size: usize,
    stores: RwLock<HashMap<String, Arc<EventStore>>>,
}

impl ProjectRegistry {
    pub fn new(log: Arc<dyn PersistentLog>, buffer_size: usize) -> Self {
        Self {
            log,
            buffer_size,
            stores: RwLock::new(HashMap::new()),
        }
    }

    pub fn persistent_log(&self) -> Arc<dyn PersistentLog> {
        self.log.clone()
    }

    /// Returns the project's `EventStore`, creating it (with a fresh ring
    /// of `bufferSize` capacity wired to the shared persistent log) if this
    /// is the first session seen for that project.
    pub fn get_or_create(&self, project: &str) -> Arc<EventStore> {
        if let Some(store) = self.stores.read().expect("registry poisoned").get(project) {
            return store.clone();
        }

        let mut stores = self.stores.write().expect("registry poisoned");
        stores
            .entry(project.to_string())
            .or_insert_with(|| Arc::new(EventStore::new(self.buffer_size, project).with_persistent_log(self.log.clone())))
            .clone()
    }

    pub fn get(&self, project: &str) -> Option<Arc<EventStore>> {
        self.stores.read().expect("registry poisoned").get(project).cloned()
    }

    pub fn projects(&self) -> Vec<String> {
        self.stores.read().expect("registry poisoned").keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runtimescope_db::Database;

    async fn log() -> Arc<dyn PersistentLog> {
        Arc::new(Database::new_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn get_or_create_returns_same_store_for_same_project() {
        let registry = ProjectRegistry::new(log().await, 100);
        let a = registry.get_or_create("demo");
        let b = registry.get_or_create("demo");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn distinct_projects_get_distinct_stores() {
        let registry = ProjectRegistry::new(log().await, 100);
        let a = registry.get_or_create("demo-a");
        let b = registry.get_or_create("demo-b");
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.projects().len(), 2);
    }

    #[tokio::test]
    async fn unknown_project_returns_none() {
        let registry = ProjectRegistry::new(log().await, 100);
        assert!(registry.get("missing").is_none());
    }
}
