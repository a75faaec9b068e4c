use std::sync::Arc;

use tally_core::Identity;
use tally_store::{DocumentHub, LocalStore, Namespace, RemoteStore, TaskStore};
use tokio::task::JoinHandle;

use crate::auth::{IdentityProvider, LocalAuth, SessionBinding, UserDirectory};
use crate::engine::TaskEngine;

/// Composition root. Owns the process-scoped state (session binding, task
/// engine, identity watcher) and rebinds the engine's store whenever the
/// active identity changes. While nobody is signed in the engine stays
/// detached: empty visible set, no writes.
pub struct App<P: IdentityProvider, S: TaskStore> {
    pub session: SessionBinding<P>,
    pub engine: TaskEngine<S>,
    watcher: Option<JoinHandle<()>>,
}

impl<P: IdentityProvider, S: TaskStore> App<P, S> {
    pub fn new(
        provider: P,
        make_store: impl Fn(&Identity) -> S + Send + Sync + 'static,
    ) -> Self {
        let provider = Arc::new(provider);
        let session = SessionBinding::new(Arc::clone(&provider));
        let engine = TaskEngine::new();

        let watcher = {
            let engine = engine.clone();
            let mut identities = provider.watch_identity();
            tokio::spawn(async move {
                loop {
                    let current = identities.borrow_and_update().clone();
                    match current {
                        Some(identity) => {
                            tracing::info!(user = %identity.username, "identity active, binding task store");
                            let store = make_store(&identity);
                            if let Err(e) = engine.attach(store).await {
                                tracing::error!(error = %e, "failed to bind task store");
                            }
                        }
                        None => engine.detach().await,
                    }
                    if identities.changed().await.is_err() {
                        break;
                    }
                }
                tracing::debug!("identity watcher stopped");
            })
        };

        Self {
            session,
            engine,
            watcher: Some(watcher),
        }
    }

    /// Tears down the identity watcher and detaches the engine, releasing
    /// any live subscription before returning.
    pub async fn shutdown(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
            let _ = watcher.await;
        }
        self.engine.detach().await;
    }
}

impl<P: IdentityProvider, S: TaskStore> Drop for App<P, S> {
    fn drop(&mut self) {
        if let Some(watcher) = &self.watcher {
            watcher.abort();
        }
    }
}

impl App<LocalAuth, LocalStore> {
    /// Offline variant: fixed credentials, single local namespace.
    pub fn offline(
        username: impl Into<String>,
        password: impl Into<String>,
        store: LocalStore,
    ) -> Self {
        App::new(LocalAuth::new(username, password), move |_| store.clone())
    }
}

impl App<UserDirectory, RemoteStore> {
    /// Remote variant: directory auth, one hub collection per user.
    pub fn per_user(hub: Arc<DocumentHub>) -> Self {
        App::new(UserDirectory::new(), move |identity| {
            RemoteStore::bind(Arc::clone(&hub), Namespace::User(identity.user_id))
        })
    }

    /// Flat deployment: directory auth, one shared hub collection for every
    /// signed-in client.
    pub fn shared(hub: Arc<DocumentHub>) -> Self {
        App::new(UserDirectory::new(), move |_| {
            RemoteStore::bind(Arc::clone(&hub), Namespace::Shared)
        })
    }
}
