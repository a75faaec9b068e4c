//! Tally - a personal task list with pluggable storage
//!
//! This crate provides a unified API over the tally components.
//!
//! # Example
//!
//! ```ignore
//! use tally::{App, LocalStore};
//!
//! let store = LocalStore::new("sqlite://tally.db?mode=rwc").await?;
//! store.run_migrations().await?;
//! let app = App::offline("home", "s3cret", store);
//! app.session.sign_in().await?;
//! app.engine.submit("Buy milk", None).await?;
//! ```

// Re-export engine types
pub use tally_engine::{App, Draft, IdentityProvider, LocalAuth, SessionBinding, TaskEngine, UserDirectory};

// Re-export storage types
pub use tally_store::{
    ChangeSubscription, DocumentHub, LocalStore, Namespace, RemoteStore, StoreError, StoreResult,
    TaskStore,
};

// Re-export core types that applications need
pub use tally_core::errors::AuthError;
pub use tally_core::identity::Identity;
pub use tally_core::models::{parse_due_date, EditCursor, SortOrder, Task, TaskPatch};
