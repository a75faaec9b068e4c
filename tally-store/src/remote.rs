use std::sync::Arc;

use async_trait::async_trait;
use tally_core::{Task, TaskPatch};
use uuid::Uuid;

use crate::adapter::{ChangeSubscription, TaskStore};
use crate::errors::StoreResult;
use crate::hub::{DocumentHub, Namespace};

/// Adapter binding one hub namespace behind the [`TaskStore`] contract.
/// Mutations go straight to the hub; the in-memory view upstream refreshes
/// from the subscription echo, not from the call's return.
pub struct RemoteStore {
    hub: Arc<DocumentHub>,
    namespace: Namespace,
}

impl RemoteStore {
    pub fn bind(hub: Arc<DocumentHub>, namespace: Namespace) -> Self {
        Self { hub, namespace }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }
}

#[async_trait]
impl TaskStore for RemoteStore {
    async fn load(&self) -> StoreResult<Vec<Task>> {
        Ok(self.hub.snapshot(self.namespace))
    }

    async fn create(&self, task: Task) -> StoreResult<()> {
        self.hub.insert(self.namespace, task);
        Ok(())
    }

    async fn update(&self, id: Uuid, patch: TaskPatch) -> StoreResult<()> {
        self.hub.apply(self.namespace, id, &patch);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.hub.remove(self.namespace, id);
        Ok(())
    }

    fn subscribe(&self) -> Option<ChangeSubscription> {
        Some(ChangeSubscription::new(self.hub.watch(self.namespace)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writes_echo_through_the_subscription() {
        let hub = Arc::new(DocumentHub::new());
        let store = RemoteStore::bind(hub.clone(), Namespace::Shared);
        let mut sub = store.subscribe().expect("remote stores are live");

        store.create(Task::new("Buy milk", None)).await.unwrap();
        let snapshot = sub.next().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        let id = snapshot[0].id;

        store.update(id, TaskPatch::completion(true)).await.unwrap();
        let snapshot = sub.next().await.unwrap();
        assert!(snapshot[0].completed);

        store.delete(id).await.unwrap();
        let snapshot = sub.next().await.unwrap();
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn test_load_reads_the_bound_namespace_only() {
        let hub = Arc::new(DocumentHub::new());
        let mine = RemoteStore::bind(hub.clone(), Namespace::User(Uuid::new_v4()));
        let theirs = RemoteStore::bind(hub.clone(), Namespace::User(Uuid::new_v4()));

        mine.create(Task::new("mine", None)).await.unwrap();

        assert_eq!(mine.load().await.unwrap().len(), 1);
        assert!(theirs.load().await.unwrap().is_empty());
    }
}
