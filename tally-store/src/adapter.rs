use async_trait::async_trait;
use tally_core::{Task, TaskPatch};
use tokio::sync::watch;
use uuid::Uuid;

use crate::errors::StoreResult;

/// Uniform contract over the two storage media. The engine never learns
/// which medium it is talking to; the variant is chosen at composition time.
#[async_trait]
pub trait TaskStore: Send + Sync + 'static {
    /// The current durable set, in insertion order. Empty if nothing has
    /// been saved yet.
    async fn load(&self) -> StoreResult<Vec<Task>>;

    /// Persists a new task. The id is assigned by the caller.
    async fn create(&self, task: Task) -> StoreResult<()>;

    /// Applies `patch` to the task with `id`. An absent id is a no-op.
    async fn update(&self, id: Uuid, patch: TaskPatch) -> StoreResult<()>;

    /// Removes the task with `id`. An absent id is a no-op.
    async fn delete(&self, id: Uuid) -> StoreResult<()>;

    /// Live change feed for this store's namespace, if the medium has one.
    /// Media without a feed return `None` and callers reload after writes.
    fn subscribe(&self) -> Option<ChangeSubscription>;
}

/// Handle over a live change feed. Every delivered value is the full current
/// set for the subscribed namespace, including echoes of this client's own
/// writes. Dropping the handle is the unsubscribe.
pub struct ChangeSubscription {
    rx: watch::Receiver<Vec<Task>>,
}

impl ChangeSubscription {
    pub(crate) fn new(rx: watch::Receiver<Vec<Task>>) -> Self {
        Self { rx }
    }

    /// Waits for the next snapshot. `None` once the namespace's feed is gone.
    pub async fn next(&mut self) -> Option<Vec<Task>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// The latest snapshot, without waiting.
    pub fn current(&self) -> Vec<Task> {
        self.rx.borrow().clone()
    }
}
