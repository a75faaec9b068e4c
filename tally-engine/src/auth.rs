use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tally_core::{AuthError, Identity};
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

/// Contract over the authentication collaborator. Any provider honoring it
/// (including a test stub) is acceptable; the engine only ever consumes the
/// identity stream.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    async fn sign_up(&self, username: &str, password: &str) -> Result<Identity, AuthError>;

    async fn sign_in(&self, username: &str, password: &str) -> Result<Identity, AuthError>;

    async fn sign_out(&self);

    /// Continuous observation of the active identity. `None` means signed
    /// out.
    fn watch_identity(&self) -> watch::Receiver<Option<Identity>>;
}

struct UserRecord {
    user_id: Uuid,
    password_hash: String,
}

/// In-process reference provider: a user table with argon2 password hashes.
/// Failure reasons stay generic; the specifics go to the log only.
pub struct UserDirectory {
    users: DashMap<String, UserRecord>,
    identity: watch::Sender<Option<Identity>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        let (identity, _) = watch::channel(None);
        Self {
            users: DashMap::new(),
            identity,
        }
    }

    fn hash_password(password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                tracing::error!(error = %e, "password hashing failed");
                AuthError::AccountCreation
            })?;
        Ok(hash.to_string())
    }

    fn verify_password(password: &str, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for UserDirectory {
    /// Registers the account and signs it straight in.
    async fn sign_up(&self, username: &str, password: &str) -> Result<Identity, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::AccountCreation);
        }

        let hash = Self::hash_password(password)?;
        let identity = match self.users.entry(username.to_string()) {
            Entry::Occupied(_) => {
                tracing::warn!(username, "sign-up for existing account rejected");
                return Err(AuthError::AccountExists);
            }
            Entry::Vacant(entry) => {
                let identity = Identity::new(username);
                entry.insert(UserRecord {
                    user_id: identity.user_id,
                    password_hash: hash,
                });
                identity
            }
        };

        tracing::info!(username, user_id = %identity.user_id, "account created");
        self.identity.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in(&self, username: &str, password: &str) -> Result<Identity, AuthError> {
        let username = username.trim();
        let identity = match self.users.get(username) {
            Some(record) if Self::verify_password(password, &record.password_hash) => Identity {
                user_id: record.user_id,
                username: username.to_string(),
            },
            _ => {
                // Unknown accounts and bad passwords get the same answer.
                tracing::warn!(username, "sign-in rejected");
                return Err(AuthError::InvalidCredentials);
            }
        };

        self.identity.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) {
        self.identity.send_replace(None);
    }

    fn watch_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }
}

/// Fixed-credential provider for the offline variant: one account, checked
/// synchronously, no external service. Kept as its own configuration rather
/// than folded into the directory.
pub struct LocalAuth {
    username: String,
    password: String,
    user_id: Uuid,
    identity: watch::Sender<Option<Identity>>,
}

impl LocalAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        let (identity, _) = watch::channel(None);
        Self {
            username: username.into(),
            password: password.into(),
            user_id: Uuid::new_v4(),
            identity,
        }
    }
}

#[async_trait]
impl IdentityProvider for LocalAuth {
    async fn sign_up(&self, _username: &str, _password: &str) -> Result<Identity, AuthError> {
        Err(AuthError::SignUpUnsupported)
    }

    async fn sign_in(&self, username: &str, password: &str) -> Result<Identity, AuthError> {
        if username.trim() != self.username || password != self.password {
            return Err(AuthError::InvalidCredentials);
        }
        let identity = Identity {
            user_id: self.user_id,
            username: self.username.clone(),
        };
        self.identity.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) {
        self.identity.send_replace(None);
    }

    fn watch_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }
}

/// Snapshot of the login form. The password only lives here between
/// `set_password` and the end of the next attempt; it is never persisted.
#[derive(Debug, Clone, Default)]
pub struct FormState {
    pub username: String,
    pub password: String,
    pub loading: bool,
    pub error: Option<String>,
}

/// Wraps a provider with the transient form state: credential fields, the
/// observable `loading` flag, and the last failure message. At most one
/// sign-up/sign-in runs at a time; attempts made while one is in flight are
/// rejected instead of queued.
pub struct SessionBinding<P: IdentityProvider> {
    provider: Arc<P>,
    form: Arc<Mutex<FormState>>,
}

impl<P: IdentityProvider> Clone for SessionBinding<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            form: Arc::clone(&self.form),
        }
    }
}

impl<P: IdentityProvider> SessionBinding<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            form: Arc::new(Mutex::new(FormState::default())),
        }
    }

    pub fn provider(&self) -> Arc<P> {
        Arc::clone(&self.provider)
    }

    pub fn watch_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.provider.watch_identity()
    }

    pub async fn set_username(&self, username: impl Into<String>) {
        self.form.lock().await.username = username.into();
    }

    pub async fn set_password(&self, password: impl Into<String>) {
        self.form.lock().await.password = password.into();
    }

    pub async fn form(&self) -> FormState {
        self.form.lock().await.clone()
    }

    pub async fn sign_up(&self) -> Result<Identity, AuthError> {
        let (username, password) = self.begin().await?;
        let outcome = self.provider.sign_up(&username, &password).await;
        self.finish(&outcome).await;
        outcome
    }

    pub async fn sign_in(&self) -> Result<Identity, AuthError> {
        let (username, password) = self.begin().await?;
        let outcome = self.provider.sign_in(&username, &password).await;
        self.finish(&outcome).await;
        outcome
    }

    pub async fn sign_out(&self) {
        self.provider.sign_out().await;
        *self.form.lock().await = FormState::default();
    }

    async fn begin(&self) -> Result<(String, String), AuthError> {
        let mut form = self.form.lock().await;
        if form.loading {
            return Err(AuthError::InFlight);
        }
        form.loading = true;
        form.error = None;
        Ok((form.username.clone(), form.password.clone()))
    }

    async fn finish(&self, outcome: &Result<Identity, AuthError>) {
        let mut form = self.form.lock().await;
        form.loading = false;
        form.password.clear();
        if let Err(e) = outcome {
            form.error = Some(e.to_string());
        }
    }
}
