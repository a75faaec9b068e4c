use thiserror::Error;

/// Authentication outcomes surfaced to the user. Messages are deliberately
/// generic; provider-internal detail goes to the log, not the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("an account with that name already exists")]
    AccountExists,

    #[error("account creation failed")]
    AccountCreation,

    #[error("sign-up is not available")]
    SignUpUnsupported,

    #[error("another request is already in flight")]
    InFlight,
}
