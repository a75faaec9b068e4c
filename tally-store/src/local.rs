use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tally_core::{Task, TaskPatch};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::adapter::{ChangeSubscription, TaskStore};
use crate::errors::StoreResult;

/// The single string-keyed slot holding the serialized task sequence.
const SLOT_KEY: &str = "tasks";

/// Local key/value store: the whole ordered task set lives serialized in one
/// slot and every write overwrites it (last writer wins, no merge). The
/// fine-grained contract methods are read-modify-write cycles serialized by
/// an internal lock so interleaved callers cannot lose updates.
#[derive(Clone)]
pub struct LocalStore {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
}

impl LocalStore {
    pub async fn new(database_url: &str) -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn read_slot(&self) -> StoreResult<Vec<Task>> {
        let row = sqlx::query("SELECT value FROM slots WHERE key = ?1")
            .bind(SLOT_KEY)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let value: String = row.get("value");
                Ok(serde_json::from_str(&value)?)
            }
            None => Ok(Vec::new()),
        }
    }

    async fn write_slot(&self, tasks: &[Task]) -> StoreResult<()> {
        let value = serde_json::to_string(tasks)?;

        sqlx::query(
            r#"
            INSERT INTO slots (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(SLOT_KEY)
        .bind(value)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl TaskStore for LocalStore {
    async fn load(&self) -> StoreResult<Vec<Task>> {
        self.read_slot().await
    }

    async fn create(&self, task: Task) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut tasks = self.read_slot().await?;
        tasks.push(task);
        self.write_slot(&tasks).await
    }

    async fn update(&self, id: Uuid, patch: TaskPatch) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut tasks = self.read_slot().await?;
        match tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                patch.apply_to(task);
                self.write_slot(&tasks).await
            }
            None => Ok(()),
        }
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut tasks = self.read_slot().await?;
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == before {
            return Ok(());
        }
        self.write_slot(&tasks).await
    }

    fn subscribe(&self) -> Option<ChangeSubscription> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Unique shared-cache in-memory database per test so pooled
    /// connections all see the same data.
    async fn setup() -> LocalStore {
        let url = format!("file:slot_{}?mode=memory&cache=shared", Uuid::new_v4());
        let store = LocalStore::new(&url).await.unwrap();
        store.run_migrations().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_missing_slot_loads_empty() {
        let store = setup().await;
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_then_load_preserves_order() {
        let store = setup().await;
        store.create(Task::new("first", None)).await.unwrap();
        store.create(Task::new("second", None)).await.unwrap();

        let titles: Vec<_> = store
            .load()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, ["first", "second"]);
    }

    #[tokio::test]
    async fn test_update_rewrites_in_place() {
        let store = setup().await;
        let task = Task::new("draft", None);
        let id = task.id;
        store.create(task).await.unwrap();

        store
            .update(id, TaskPatch::edit("final", None))
            .await
            .unwrap();

        let tasks = store.load().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, id);
        assert_eq!(tasks[0].title, "final");
    }

    #[tokio::test]
    async fn test_absent_ids_are_no_ops() {
        let store = setup().await;
        store.create(Task::new("keeper", None)).await.unwrap();

        store
            .update(Uuid::new_v4(), TaskPatch::completion(true))
            .await
            .unwrap();
        store.delete(Uuid::new_v4()).await.unwrap();

        let tasks = store.load().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(!tasks[0].completed);
    }

    #[tokio::test]
    async fn test_interleaved_writers_lose_nothing() {
        let store = setup().await;
        let a = store.clone();
        let b = store.clone();

        let (ra, rb) = tokio::join!(
            a.create(Task::new("from a", None)),
            b.create(Task::new("from b", None)),
        );
        ra.unwrap();
        rb.unwrap();

        assert_eq!(store.load().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_no_live_feed() {
        let store = setup().await;
        assert!(store.subscribe().is_none());
    }
}
