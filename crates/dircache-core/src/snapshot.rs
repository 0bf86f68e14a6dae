//! Directory snapshot session
//!
//! Serves a JSON dump of a directory (types, field templates, objects and
//! queued server messages) through the same session traits as a live
//! server. Backs the CLI and the test suites.

use crate::error::{CoreError, RemoteError};
use crate::listing::cmp_ignore_case;
use crate::session::{AsyncPort, DirectorySession};
use async_trait::async_trait;
use dashmap::DashMap;
use dircache_types::{
    AsyncMessage, FieldDescriptor, ObjectHandle, ObjectQuery, TypeDescriptor, TypeId,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Serialized form of a directory dump
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectorySnapshot {
    #[serde(default)]
    pub types: Vec<TypeDescriptor>,

    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,

    #[serde(default)]
    pub objects: Vec<ObjectHandle>,

    /// Server-push messages replayed by the async port
    #[serde(default)]
    pub messages: Vec<AsyncMessage>,
}

impl DirectorySnapshot {
    /// Load a snapshot from a JSON file
    pub async fn load(path: &Path) -> Result<Self, CoreError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CoreError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                CoreError::FileRead {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;

        serde_json::from_str(&content).map_err(|e| CoreError::JsonParse {
            path: path.to_path_buf(),
            message: e.to_string(),
            source: e,
        })
    }
}

/// [`DirectorySession`] over an in-memory snapshot
///
/// Counts remote calls so callers can check what was served from cache.
pub struct SnapshotSession {
    snapshot: DirectorySnapshot,
    type_list_calls: AtomicUsize,
    template_calls: DashMap<TypeId, usize>,
    query_calls: AtomicUsize,
    port: Arc<SnapshotPort>,
}

impl SnapshotSession {
    pub fn new(snapshot: DirectorySnapshot) -> Self {
        let port = Arc::new(SnapshotPort::new(snapshot.messages.clone()));
        Self {
            snapshot,
            type_list_calls: AtomicUsize::new(0),
            template_calls: DashMap::new(),
            query_calls: AtomicUsize::new(0),
            port,
        }
    }

    pub async fn from_file(path: &Path) -> Result<Self, CoreError> {
        let snapshot = DirectorySnapshot::load(path).await?;
        debug!(
            path = %path.display(),
            types = snapshot.types.len(),
            objects = snapshot.objects.len(),
            "Snapshot loaded"
        );
        Ok(Self::new(snapshot))
    }

    pub fn snapshot(&self) -> &DirectorySnapshot {
        &self.snapshot
    }

    pub fn type_list_calls(&self) -> usize {
        self.type_list_calls.load(Ordering::SeqCst)
    }

    pub fn template_calls(&self, type_id: TypeId) -> usize {
        self.template_calls.get(&type_id).map(|r| *r).unwrap_or(0)
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectorySession for SnapshotSession {
    async fn type_list(&self) -> Result<Vec<TypeDescriptor>, RemoteError> {
        self.type_list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot.types.clone())
    }

    async fn field_templates(&self, type_id: TypeId) -> Result<Vec<FieldDescriptor>, RemoteError> {
        *self.template_calls.entry(type_id).or_insert(0) += 1;

        if !self.snapshot.types.iter().any(|t| t.id == type_id) {
            return Err(RemoteError::new(format!("no such type: {}", type_id)));
        }

        Ok(self
            .snapshot
            .fields
            .iter()
            .filter(|field| field.type_id == type_id)
            .cloned()
            .collect())
    }

    async fn query_objects(&self, query: &ObjectQuery) -> Result<Vec<ObjectHandle>, RemoteError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);

        let mut handles: Vec<_> = self
            .snapshot
            .objects
            .iter()
            .filter(|handle| handle.type_id() == query.type_id)
            .filter(|handle| !query.editable_only || handle.editable)
            .cloned()
            .collect();
        handles.sort_by(|a, b| cmp_ignore_case(&a.label, &b.label));
        Ok(handles)
    }

    fn async_port(&self) -> Option<Arc<dyn AsyncPort>> {
        Some(Arc::clone(&self.port) as Arc<dyn AsyncPort>)
    }
}

/// Replays queued messages, then reports the channel closed
pub struct SnapshotPort {
    queue: Mutex<VecDeque<AsyncMessage>>,
}

impl SnapshotPort {
    pub fn new(messages: impl IntoIterator<Item = AsyncMessage>) -> Self {
        Self {
            queue: Mutex::new(messages.into_iter().collect()),
        }
    }
}

#[async_trait]
impl AsyncPort for SnapshotPort {
    async fn next_message(&self) -> Result<Option<AsyncMessage>, RemoteError> {
        Ok(self.queue.lock().pop_front())
    }
}
