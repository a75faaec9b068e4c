use std::sync::Arc;
use std::time::Duration;

use tally::{parse_due_date, App, DocumentHub, LocalStore, SortOrder};
use tokio::time::sleep;
use uuid::Uuid;

#[tokio::test]
async fn test_offline_composition_through_the_facade() {
    let url = format!("file:facade_{}?mode=memory&cache=shared", Uuid::new_v4());
    let store = LocalStore::new(&url).await.unwrap();
    store.run_migrations().await.unwrap();

    let mut app = App::offline("home", "s3cret", store);
    app.session.set_username("home").await;
    app.session.set_password("s3cret").await;
    app.session.sign_in().await.unwrap();
    sleep(Duration::from_millis(80)).await;

    app.engine
        .submit("Water plants", parse_due_date("2024-03-01"))
        .await
        .unwrap();

    let tasks = app.engine.view("plants", SortOrder::DueDate).await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].due, parse_due_date("2024-03-01"));

    app.shutdown().await;
}

#[tokio::test]
async fn test_per_user_composition_through_the_facade() {
    let hub = Arc::new(DocumentHub::new());
    let mut app = App::per_user(hub.clone());

    app.session.set_username("alice").await;
    app.session.set_password("wonderland").await;
    app.session.sign_up().await.unwrap();
    sleep(Duration::from_millis(80)).await;

    app.engine.submit("Synced task", None).await.unwrap();
    sleep(Duration::from_millis(80)).await;
    assert_eq!(app.engine.total_count().await, 1);

    app.shutdown().await;
}
