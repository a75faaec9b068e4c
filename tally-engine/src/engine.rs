use std::sync::{Arc, Weak};

use chrono::NaiveDate;
use tally_core::{EditCursor, SortOrder, Task, TaskPatch};
use tally_store::{StoreResult, TaskStore};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Transient input fields backing the add/edit form. Cleared on successful
/// submit and on detach.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub title: String,
    pub due: Option<NaiveDate>,
}

struct Binding<S> {
    store: Arc<S>,
    /// Present when the store has a live feed; the engine then waits for the
    /// echoed snapshot instead of reloading after each write.
    listener: Option<JoinHandle<()>>,
}

impl<S> Binding<S> {
    fn is_live(&self) -> bool {
        self.listener.is_some()
    }
}

struct EngineState<S> {
    binding: Option<Binding<S>>,
    tasks: Vec<Task>,
    cursor: EditCursor,
    draft: Draft,
}

/// The task-list state machine: one in-memory set, an edit cursor, and a
/// store binding that keeps the set synchronized with the durable copy.
///
/// All operations serialize through one lock held across the whole
/// read-mutate-write span, so interleaved callers cannot lose updates. A
/// failed store write is logged and leaves the in-memory set at its
/// last-known-good value; nothing is retried automatically.
pub struct TaskEngine<S: TaskStore> {
    state: Arc<Mutex<EngineState<S>>>,
}

impl<S: TaskStore> Clone for TaskEngine<S> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<S: TaskStore> Default for TaskEngine<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: TaskStore> TaskEngine<S> {
    /// A detached engine: empty visible set, no writes possible.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState {
                binding: None,
                tasks: Vec::new(),
                cursor: EditCursor::Create,
                draft: Draft::default(),
            })),
        }
    }

    /// Binds a store, releasing any previous binding first. Loads the
    /// initial snapshot and, for live stores, spawns a listener that
    /// overwrites the in-memory set with every delivered snapshot: the
    /// delivered set is authoritative, never merged.
    pub async fn attach(&self, store: S) -> StoreResult<()> {
        self.detach().await;

        let store = Arc::new(store);
        let initial = store.load().await?;

        let mut state = self.state.lock().await;
        let listener = store.subscribe().map(|mut feed| {
            let shared: Weak<Mutex<EngineState<S>>> = Arc::downgrade(&self.state);
            tokio::spawn(async move {
                while let Some(snapshot) = feed.next().await {
                    let Some(state) = shared.upgrade() else { break };
                    let mut state = state.lock().await;
                    state.tasks = snapshot;
                }
                tracing::debug!("change feed listener stopped");
            })
        });
        state.tasks = initial;
        state.binding = Some(Binding { store, listener });
        Ok(())
    }

    /// Clears the visible set, the draft, and the cursor, and releases the
    /// change subscription. The listener is aborted and awaited so the
    /// previous namespace's feed is free before this returns.
    pub async fn detach(&self) {
        let binding = {
            let mut state = self.state.lock().await;
            state.tasks.clear();
            state.cursor = EditCursor::Create;
            state.draft = Draft::default();
            state.binding.take()
        };

        if let Some(binding) = binding {
            if let Some(listener) = binding.listener {
                listener.abort();
                let _ = listener.await;
            }
            tracing::debug!("store detached, visible set cleared");
        }
    }

    pub async fn is_attached(&self) -> bool {
        self.state.lock().await.binding.is_some()
    }

    /// Creates a task, or rewrites the one under edit. Empty titles are
    /// ignored without an error. A successful submit clears the draft; a
    /// successful edit also returns the cursor to create mode.
    pub async fn submit(&self, title: &str, due: Option<NaiveDate>) -> StoreResult<()> {
        let title = title.trim();
        if title.is_empty() {
            return Ok(());
        }

        let mut state = self.state.lock().await;
        let Some((store, live)) = state
            .binding
            .as_ref()
            .map(|b| (Arc::clone(&b.store), b.is_live()))
        else {
            tracing::warn!("submit with no store attached; ignoring");
            return Ok(());
        };

        match state.cursor {
            EditCursor::Editing(id) => {
                if let Err(e) = store.update(id, TaskPatch::edit(title, due)).await {
                    tracing::warn!(%id, error = %e, "task update failed; keeping previous state");
                    return Err(e);
                }
                state.cursor = EditCursor::Create;
            }
            EditCursor::Create => {
                let task = Task::new(title, due);
                tracing::debug!(id = %task.id, "creating task");
                if let Err(e) = store.create(task).await {
                    tracing::warn!(error = %e, "task create failed; keeping previous state");
                    return Err(e);
                }
            }
        }

        state.draft = Draft::default();
        if !live {
            state.tasks = store.load().await?;
        }
        Ok(())
    }

    /// Deletes the task with `id`. An absent id is a no-op, not a failure.
    pub async fn remove(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let Some((store, live)) = state
            .binding
            .as_ref()
            .map(|b| (Arc::clone(&b.store), b.is_live()))
        else {
            return Ok(());
        };
        if !state.tasks.iter().any(|t| t.id == id) {
            return Ok(());
        }

        if let Err(e) = store.delete(id).await {
            tracing::warn!(%id, error = %e, "task delete failed; keeping previous state");
            return Err(e);
        }

        // Removing the task under edit ends the edit.
        if state.cursor == EditCursor::Editing(id) {
            state.cursor = EditCursor::Create;
            state.draft = Draft::default();
        }
        if !live {
            state.tasks = store.load().await?;
        }
        Ok(())
    }

    /// Flips `completed` on the task with `id`. An absent id is a no-op.
    pub async fn toggle_completion(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let Some((store, live)) = state
            .binding
            .as_ref()
            .map(|b| (Arc::clone(&b.store), b.is_live()))
        else {
            return Ok(());
        };
        let Some(completed) = state.tasks.iter().find(|t| t.id == id).map(|t| t.completed)
        else {
            return Ok(());
        };

        if let Err(e) = store.update(id, TaskPatch::completion(!completed)).await {
            tracing::warn!(%id, error = %e, "task toggle failed; keeping previous state");
            return Err(e);
        }
        if !live {
            state.tasks = store.load().await?;
        }
        Ok(())
    }

    /// Loads the task's title and date into the draft and switches to
    /// update mode. Silently does nothing for an absent id.
    pub async fn begin_edit(&self, id: Uuid) {
        let mut state = self.state.lock().await;
        let found = state
            .tasks
            .iter()
            .find(|t| t.id == id)
            .map(|t| (t.title.clone(), t.due));
        if let Some((title, due)) = found {
            state.draft = Draft { title, due };
            state.cursor = EditCursor::Editing(id);
        }
    }

    /// Derived, read-only projection: title filter first, then the selected
    /// ordering. Never touches the stored tasks.
    pub async fn view(&self, search: &str, sort: SortOrder) -> Vec<Task> {
        let state = self.state.lock().await;
        let mut tasks: Vec<Task> = state
            .tasks
            .iter()
            .filter(|t| t.matches_search(search))
            .cloned()
            .collect();

        match sort {
            SortOrder::DueDate => tasks.sort_by_key(Task::due_sort_key),
            // Stable sort on the flag is the stable partition: incomplete
            // (false) first, relative order kept within each group.
            SortOrder::Completion => tasks.sort_by_key(|t| t.completed),
        }
        tasks
    }

    /// Count over the full set, not the filtered view.
    pub async fn total_count(&self) -> usize {
        self.state.lock().await.tasks.len()
    }

    /// Completed count over the full set, not the filtered view.
    pub async fn completed_count(&self) -> usize {
        self.state
            .lock()
            .await
            .tasks
            .iter()
            .filter(|t| t.completed)
            .count()
    }

    pub async fn cursor(&self) -> EditCursor {
        self.state.lock().await.cursor
    }

    pub async fn draft(&self) -> Draft {
        self.state.lock().await.draft.clone()
    }
}
