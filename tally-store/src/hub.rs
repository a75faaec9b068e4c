use dashmap::DashMap;
use tally_core::{Task, TaskPatch};
use tokio::sync::watch;
use uuid::Uuid;

/// Which partition of the hub a store binds to. A deployment uses exactly
/// one shape: per-user collections or a single shared collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Tasks scoped to one authenticated user.
    User(Uuid),
    /// One flat collection shared by every client of the deployment.
    Shared,
}

struct Collection {
    tasks: Vec<Task>,
    feed: watch::Sender<Vec<Task>>,
}

impl Collection {
    fn new() -> Self {
        let (feed, _) = watch::channel(Vec::new());
        Self {
            tasks: Vec::new(),
            feed,
        }
    }

    fn publish(&self) {
        self.feed.send_replace(self.tasks.clone());
    }
}

/// In-process document store: namespaced collections of task documents with
/// a live full-snapshot feed per namespace. This is the reference
/// implementation of the external document-store collaborator; anything
/// honoring the same contract can stand in for it.
pub struct DocumentHub {
    namespaces: DashMap<Namespace, Collection>,
}

impl DocumentHub {
    pub fn new() -> Self {
        Self {
            namespaces: DashMap::new(),
        }
    }

    fn with_collection<R>(&self, ns: Namespace, f: impl FnOnce(&mut Collection) -> R) -> R {
        let mut entry = self.namespaces.entry(ns).or_insert_with(Collection::new);
        f(entry.value_mut())
    }

    /// Current contents of a namespace, in insertion order.
    pub fn snapshot(&self, ns: Namespace) -> Vec<Task> {
        self.namespaces
            .get(&ns)
            .map(|c| c.tasks.clone())
            .unwrap_or_default()
    }

    pub fn insert(&self, ns: Namespace, task: Task) {
        self.with_collection(ns, |collection| {
            tracing::debug!(namespace = ?ns, id = %task.id, "document created");
            collection.tasks.push(task);
            collection.publish();
        });
    }

    /// Patches a document in place. Absent ids change nothing and publish
    /// nothing.
    pub fn apply(&self, ns: Namespace, id: Uuid, patch: &TaskPatch) {
        self.with_collection(ns, |collection| {
            match collection.tasks.iter_mut().find(|t| t.id == id) {
                Some(task) => {
                    patch.apply_to(task);
                    collection.publish();
                }
                None => {
                    tracing::debug!(namespace = ?ns, %id, "update for unknown document ignored");
                }
            }
        });
    }

    pub fn remove(&self, ns: Namespace, id: Uuid) {
        self.with_collection(ns, |collection| {
            let before = collection.tasks.len();
            collection.tasks.retain(|t| t.id != id);
            if collection.tasks.len() != before {
                collection.publish();
            }
        });
    }

    /// Registers an observer on the namespace's feed. The returned receiver
    /// treats the current contents as already seen; only subsequent changes
    /// wake it.
    pub fn watch(&self, ns: Namespace) -> watch::Receiver<Vec<Task>> {
        self.with_collection(ns, |collection| collection.feed.subscribe())
    }

    /// How many observers the namespace currently has. Zero for namespaces
    /// nobody has touched.
    pub fn subscriber_count(&self, ns: Namespace) -> usize {
        self.namespaces
            .get(&ns)
            .map(|c| c.feed.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for DocumentHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(title: &str) -> Task {
        Task::new(title, None)
    }

    #[test]
    fn test_empty_namespace_snapshots_empty() {
        let hub = DocumentHub::new();
        assert!(hub.snapshot(Namespace::Shared).is_empty());
    }

    #[test]
    fn test_insert_preserves_order() {
        let hub = DocumentHub::new();
        let ns = Namespace::Shared;
        hub.insert(ns, task("first"));
        hub.insert(ns, task("second"));

        let titles: Vec<_> = hub.snapshot(ns).into_iter().map(|t| t.title).collect();
        assert_eq!(titles, ["first", "second"]);
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let hub = DocumentHub::new();
        let alice = Namespace::User(Uuid::new_v4());
        let bob = Namespace::User(Uuid::new_v4());

        hub.insert(alice, task("alice's task"));

        assert_eq!(hub.snapshot(alice).len(), 1);
        assert!(hub.snapshot(bob).is_empty());
        assert!(hub.snapshot(Namespace::Shared).is_empty());
    }

    #[tokio::test]
    async fn test_watch_delivers_full_snapshot_on_change() {
        let hub = DocumentHub::new();
        let ns = Namespace::Shared;
        let mut rx = hub.watch(ns);

        hub.insert(ns, task("a"));
        hub.insert(ns, task("b"));

        rx.changed().await.unwrap();
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.len(), 2);
    }

    #[tokio::test]
    async fn test_update_of_unknown_id_publishes_nothing() {
        let hub = DocumentHub::new();
        let ns = Namespace::Shared;
        hub.insert(ns, task("only"));

        let mut rx = hub.watch(ns);
        hub.apply(ns, Uuid::new_v4(), &TaskPatch::completion(true));
        assert!(!rx.has_changed().unwrap());

        hub.remove(ns, Uuid::new_v4());
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_subscriber_count_tracks_drops() {
        let hub = DocumentHub::new();
        let ns = Namespace::Shared;
        assert_eq!(hub.subscriber_count(ns), 0);

        let rx = hub.watch(ns);
        assert_eq!(hub.subscriber_count(ns), 1);

        drop(rx);
        assert_eq!(hub.subscriber_count(ns), 0);
    }
}
