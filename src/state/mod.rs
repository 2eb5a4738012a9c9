mod types;

pub use types::*;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use renderforged_common::{Error, RenderId, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Registry change published to event stream subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum RenderEvent {
    RenderCreated {
        #[serde(flatten)]
        job: RenderJob,
    },
    RenderProgress {
        id: RenderId,
        progress: u8,
    },
    RenderCompleted {
        id: RenderId,
        download_url: String,
    },
    RenderFailed {
        id: RenderId,
        error: String,
    },
    RenderDeleted {
        id: RenderId,
    },
}

/// Keyed storage for render jobs.
///
/// Every operation is atomic per id; implementations must not need a global
/// lock for operations on different ids.
pub trait JobStore: Send + Sync {
    /// Insert a new job. Fails with `Conflict` if the id already exists.
    fn insert(&self, job: RenderJob) -> Result<()>;

    /// Merge a patch into the stored job and return the result.
    fn update(&self, id: &RenderId, patch: JobPatch) -> Result<RenderJob>;

    fn get(&self, id: &RenderId) -> Option<RenderJob>;

    fn list(&self) -> Vec<RenderJob>;

    fn remove(&self, id: &RenderId) -> Option<RenderJob>;
}

/// Process-lifetime [`JobStore`] backed by a sharded concurrent map.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: DashMap<RenderId, RenderJob>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for MemoryJobStore {
    fn insert(&self, job: RenderJob) -> Result<()> {
        match self.jobs.entry(job.id.clone()) {
            Entry::Occupied(_) => Err(Error::Conflict(format!("render {} already exists", job.id))),
            Entry::Vacant(slot) => {
                slot.insert(job);
                Ok(())
            }
        }
    }

    fn update(&self, id: &RenderId, patch: JobPatch) -> Result<RenderJob> {
        let mut job = self
            .jobs
            .get_mut(id)
            .ok_or_else(|| Error::not_found("render", id))?;
        job.apply(patch)?;
        Ok(job.clone())
    }

    fn get(&self, id: &RenderId) -> Option<RenderJob> {
        self.jobs.get(id).map(|job| job.clone())
    }

    fn list(&self) -> Vec<RenderJob> {
        self.jobs.iter().map(|entry| entry.value().clone()).collect()
    }

    fn remove(&self, id: &RenderId) -> Option<RenderJob> {
        self.jobs.remove(id).map(|(_, job)| job)
    }
}

/// Render job registry: the store plus artifact cleanup and event fan-out.
pub struct RenderRegistry {
    store: Arc<dyn JobStore>,
    output_dir: PathBuf,
    container: String,
    event_tx: broadcast::Sender<RenderEvent>,
}

impl RenderRegistry {
    pub fn new(store: Arc<dyn JobStore>, output_dir: PathBuf, container: String) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(256);

        Arc::new(Self {
            store,
            output_dir,
            container,
            event_tx,
        })
    }

    /// Registry over a fresh [`MemoryJobStore`].
    pub fn in_memory(output_dir: PathBuf, container: String) -> Arc<Self> {
        Self::new(Arc::new(MemoryJobStore::new()), output_dir, container)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RenderEvent> {
        self.event_tx.subscribe()
    }

    fn broadcast(&self, event: RenderEvent) {
        if self.event_tx.send(event).is_err() {
            tracing::trace!("No subscribers for render event");
        }
    }

    /// Where the artifact of a job lives.
    pub fn artifact_path(&self, id: &RenderId) -> PathBuf {
        self.output_dir.join(format!("{}.{}", id, self.container))
    }

    pub fn create(&self, job: RenderJob) -> Result<RenderJob> {
        self.store.insert(job.clone())?;
        tracing::debug!(render_id = %job.id, "Render job created");
        self.broadcast(RenderEvent::RenderCreated { job: job.clone() });
        Ok(job)
    }

    pub fn update(&self, id: &RenderId, patch: JobPatch) -> Result<RenderJob> {
        let job = self.store.update(id, patch)?;

        let event = match job.status {
            RenderStatus::Rendering => RenderEvent::RenderProgress {
                id: job.id.clone(),
                progress: job.progress,
            },
            RenderStatus::Completed => RenderEvent::RenderCompleted {
                id: job.id.clone(),
                download_url: job.download_url.clone().unwrap_or_default(),
            },
            RenderStatus::Failed => RenderEvent::RenderFailed {
                id: job.id.clone(),
                error: job.error.clone().unwrap_or_default(),
            },
        };
        self.broadcast(event);

        Ok(job)
    }

    pub fn get(&self, id: &RenderId) -> Result<RenderJob> {
        self.store.get(id).ok_or_else(|| Error::not_found("render", id))
    }

    /// All jobs, newest first.
    pub fn list(&self) -> Vec<RenderJob> {
        let mut jobs = self.store.list();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Remove a job and its artifact.
    ///
    /// A missing artifact is not an error. Deleting does not stop an
    /// in-flight render; its later updates fail with `NotFound`.
    pub async fn delete(&self, id: &RenderId) -> Result<RenderJob> {
        if self.store.get(id).is_none() {
            return Err(Error::not_found("render", id));
        }

        let artifact = self.artifact_path(id);
        match tokio::fs::remove_file(&artifact).await {
            Ok(()) => tracing::debug!(render_id = %id, "Removed artifact {:?}", artifact),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let job = self
            .store
            .remove(id)
            .ok_or_else(|| Error::not_found("render", id))?;
        self.broadcast(RenderEvent::RenderDeleted { id: id.clone() });
        Ok(job)
    }
}
