use core::fmt;
use zeroize::Zeroizing;

use crate::{error::StoreError, prefilter::Prefilter};

pub mod sqlite;

#[cfg(test)]
pub(crate) mod memory;

/// Identifier of the account owning a credential
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountId(pub i64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A stored credential as read from the account table.
///
/// The value is kept as raw bytes. Legacy tables routinely hold credentials in
/// some 8-bit encoding, and those have to be rehashed byte for byte.
#[derive(Clone)]
pub struct CredentialRecord {
    /// Owning account
    pub id: AccountId,
    /// Credential column, `None` for `NULL`
    pub stored_value: Option<Zeroizing<Vec<u8>>>,
}

impl CredentialRecord {
    /// Record for `id` holding `stored_value`
    #[must_use]
    pub fn new(id: AccountId, stored_value: Option<Vec<u8>>) -> Self {
        Self {
            id,
            stored_value: stored_value.map(Zeroizing::new),
        }
    }

    /// Credential bytes, `None` for `NULL`
    #[must_use]
    pub fn stored_bytes(&self) -> Option<&[u8]> {
        self.stored_value.as_deref().map(Vec::as_slice)
    }

    /// Credential as string slice. `None` for `NULL` and for values that aren't UTF-8.
    #[must_use]
    pub fn stored_str(&self) -> Option<&str> {
        self.stored_bytes()
            .and_then(|bytes| core::str::from_utf8(bytes).ok())
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("id", &self.id)
            .field(
                "stored_value",
                &self.stored_value.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Account table holding the credentials to migrate
pub trait CredentialStore {
    /// Up to `limit` records admitted by `prefilter` with an id greater than
    /// `after`, ordered by id. Disabled and hidden accounts are included.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] if the query fails
    fn fetch_pending(
        &self,
        prefilter: &Prefilter,
        after: Option<AccountId>,
        limit: usize,
    ) -> Result<Vec<CredentialRecord>, StoreError>;

    /// Up to `limit` non-empty records rejected by `prefilter` with an id greater
    /// than `after`, ordered by id. Disabled and hidden accounts are included.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] if the query fails
    fn fetch_excluded(
        &self,
        prefilter: &Prefilter,
        after: Option<AccountId>,
        limit: usize,
    ) -> Result<Vec<CredentialRecord>, StoreError>;

    /// Number of records admitted by `prefilter`
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] if the query fails
    fn count_pending(&self, prefilter: &Prefilter) -> Result<u64, StoreError>;

    /// Replace the credential of account `id`
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] if the store went away, otherwise a per-row error
    fn update_credential(&self, id: AccountId, value: &str) -> Result<(), StoreError>;

    /// Line recorded in the query log for a write to `id`
    fn describe_update(&self, id: AccountId) -> String {
        format!("update credential of account {id}")
    }
}

impl<T> CredentialStore for &T
where
    T: CredentialStore + ?Sized,
{
    fn fetch_pending(
        &self,
        prefilter: &Prefilter,
        after: Option<AccountId>,
        limit: usize,
    ) -> Result<Vec<CredentialRecord>, StoreError> {
        (**self).fetch_pending(prefilter, after, limit)
    }

    fn fetch_excluded(
        &self,
        prefilter: &Prefilter,
        after: Option<AccountId>,
        limit: usize,
    ) -> Result<Vec<CredentialRecord>, StoreError> {
        (**self).fetch_excluded(prefilter, after, limit)
    }

    fn count_pending(&self, prefilter: &Prefilter) -> Result<u64, StoreError> {
        (**self).count_pending(prefilter)
    }

    fn update_credential(&self, id: AccountId, value: &str) -> Result<(), StoreError> {
        (**self).update_credential(id, value)
    }

    fn describe_update(&self, id: AccountId) -> String {
        (**self).describe_update(id)
    }
}
