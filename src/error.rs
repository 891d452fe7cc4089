use crate::AccountId;

/// Boxed error from a store backend
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors reported by a [`CredentialStore`](crate::CredentialStore)
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store can't be reached or queried. Fatal for a migration run.
    #[error("credential store unavailable: {0}")]
    Unavailable(#[source] BoxError),

    /// The account vanished between the scan and the write
    #[error("no account with id {0}")]
    NotFound(AccountId),

    /// Writing a single credential failed
    #[error("failed to update credential of account {id}: {source}")]
    Write {
        /// Account whose credential could not be written
        id: AccountId,
        /// Backend error
        #[source]
        source: BoxError,
    },
}

impl StoreError {
    /// Whether the error ends the whole run rather than a single row
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Crate-wide error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// PBKDF2 hashing failed
    #[error("failed to hash credential: {0}")]
    Hash(#[from] password_hash::Error),

    /// Configuration is well-formed but unusable
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration could not be parsed
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Result alias defaulting to [`Error`]
pub type Result<T, E = Error> = core::result::Result<T, E>;
