pub mod adapter;
pub mod errors;
pub mod hub;
pub mod local;
pub mod remote;

pub use adapter::{ChangeSubscription, TaskStore};
pub use errors::{StoreError, StoreResult};
pub use hub::{DocumentHub, Namespace};
pub use local::LocalStore;
pub use remote::RemoteStore;
