// src/store.rs

//! Collaborator interfaces to persistence and the import pipeline.
//!
//! The engine never depends on persistence details: activities are written
//! through [`ActivityStore`] keyed by the `(source, external_id)` composite,
//! and processed documents are handed to [`ImportPipeline`] which returns an
//! opaque import-session identifier. In-memory implementations back tests
//! and local runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::models::DiscoveredActivity;

/// Opaque create/read/update store for canonical activities.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Insert or overwrite by `(source, external_id)`; returns the key.
    async fn upsert(&self, activity: DiscoveredActivity) -> Result<String>;

    /// Read one activity back by its composite key parts.
    async fn get(&self, source: &str, external_id: &str) -> Result<Option<DiscoveredActivity>>;

    /// All stored activities, unordered.
    async fn list(&self) -> Result<Vec<DiscoveredActivity>>;
}

/// Hand-off point for processed curriculum documents.
#[async_trait]
pub trait ImportPipeline: Send + Sync {
    /// Begin an import session; returns its identifier.
    async fn start_import(
        &self,
        user_id: &str,
        grade: Option<u8>,
        subject: Option<&str>,
        source_format: &str,
        title: Option<&str>,
        metadata: Option<Value>,
    ) -> Result<String>;
}

/// In-memory activity store.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, DiscoveredActivity>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn upsert(&self, activity: DiscoveredActivity) -> Result<String> {
        let key = activity.composite_key();
        self.entries
            .lock()
            .expect("store lock poisoned")
            .insert(key.clone(), activity);
        Ok(key)
    }

    async fn get(&self, source: &str, external_id: &str) -> Result<Option<DiscoveredActivity>> {
        let key = format!("{source}:{external_id}");
        Ok(self
            .entries
            .lock()
            .expect("store lock poisoned")
            .get(&key)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<DiscoveredActivity>> {
        Ok(self
            .entries
            .lock()
            .expect("store lock poisoned")
            .values()
            .cloned()
            .collect())
    }
}

/// In-memory import pipeline issuing sequential session ids.
#[derive(Default)]
pub struct MemoryImporter {
    counter: AtomicU64,
    sessions: Mutex<Vec<String>>,
}

impl MemoryImporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of all sessions started so far.
    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.lock().expect("import lock poisoned").clone()
    }
}

#[async_trait]
impl ImportPipeline for MemoryImporter {
    async fn start_import(
        &self,
        user_id: &str,
        _grade: Option<u8>,
        _subject: Option<&str>,
        source_format: &str,
        _title: Option<&str>,
        _metadata: Option<Value>,
    ) -> Result<String> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("import-{n}");
        log::info!("Import session {id} started by {user_id} ({source_format})");
        self.sessions
            .lock()
            .expect("import lock poisoned")
            .push(id.clone());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::ActivityDraft;

    fn activity(source: &str, id: &str, title: &str) -> DiscoveredActivity {
        let mut draft = ActivityDraft::new(source, id, format!("https://x/{id}"), title);
        draft.subject_text = Some("math".to_string());
        draft.into_activity()
    }

    #[tokio::test]
    async fn upsert_overwrites_same_composite_key() {
        let store = MemoryStore::new();
        store.upsert(activity("s", "1", "Old title")).await.unwrap();
        store.upsert(activity("s", "1", "New title")).await.unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "New title");

        let got = store.get("s", "1").await.unwrap().unwrap();
        assert_eq!(got.title, "New title");
    }

    #[tokio::test]
    async fn distinct_sources_do_not_collide() {
        let store = MemoryStore::new();
        store.upsert(activity("a", "1", "From A")).await.unwrap();
        store.upsert(activity("b", "1", "From B")).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn importer_issues_sequential_ids() {
        let importer = MemoryImporter::new();
        let a = importer
            .start_import("teacher-1", Some(3), Some("math"), "pdf", None, None)
            .await
            .unwrap();
        let b = importer
            .start_import("teacher-1", None, None, "docx", Some("Guide"), None)
            .await
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(importer.session_ids(), vec![a, b]);
    }
}
