use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, HashSet},
    io,
};

use crate::{
    error::StoreError,
    prefilter::Prefilter,
    store::{AccountId, CredentialRecord, CredentialStore},
};

#[derive(Clone, Debug)]
pub(crate) struct Account {
    pub password: Option<String>,
    pub disabled: bool,
}

impl Account {
    fn record(&self, id: AccountId) -> CredentialRecord {
        CredentialRecord::new(id, self.password.clone().map(String::into_bytes))
    }
}

/// In-memory account table with fault injection
#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    accounts: RefCell<BTreeMap<AccountId, Account>>,
    reject_writes: RefCell<HashSet<AccountId>>,
    // fail every call once this many updates went through
    unavailable_after: Cell<Option<usize>>,
    updates: Cell<usize>,
    fetches: Cell<usize>,
}

impl MemoryStore {
    pub fn with_accounts<'a>(accounts: impl IntoIterator<Item = (i64, Option<&'a str>, bool)>) -> Self {
        let store = Self::default();
        for (id, password, disabled) in accounts {
            store.accounts.borrow_mut().insert(
                AccountId(id),
                Account {
                    password: password.map(str::to_owned),
                    disabled,
                },
            );
        }
        store
    }

    pub fn password(&self, id: i64) -> Option<String> {
        self.accounts
            .borrow()
            .get(&AccountId(id))
            .and_then(|account| account.password.clone())
    }

    pub fn is_disabled(&self, id: i64) -> bool {
        self.accounts
            .borrow()
            .get(&AccountId(id))
            .is_some_and(|account| account.disabled)
    }

    pub fn snapshot(&self) -> BTreeMap<AccountId, Option<String>> {
        self.accounts
            .borrow()
            .iter()
            .map(|(&id, account)| (id, account.password.clone()))
            .collect()
    }

    pub fn reject_writes_for(&self, id: i64) {
        self.reject_writes.borrow_mut().insert(AccountId(id));
    }

    pub fn go_away_after(&self, updates: usize) {
        self.unavailable_after.set(Some(updates));
    }

    pub fn updates(&self) -> usize {
        self.updates.get()
    }

    pub fn fetches(&self) -> usize {
        self.fetches.get()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        match self.unavailable_after.get() {
            Some(limit) if self.updates.get() >= limit => Err(StoreError::Unavailable(Box::new(
                io::Error::new(io::ErrorKind::ConnectionReset, "connection lost"),
            ))),
            _ => Ok(()),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn fetch_pending(
        &self,
        prefilter: &Prefilter,
        after: Option<AccountId>,
        limit: usize,
    ) -> Result<Vec<CredentialRecord>, StoreError> {
        self.check_available()?;
        self.fetches.set(self.fetches.get() + 1);

        Ok(self
            .accounts
            .borrow()
            .iter()
            .filter(|(id, _)| after.map_or(true, |after| **id > after))
            .filter(|(_, account)| prefilter.admits(account.password.as_deref()))
            .take(limit)
            .map(|(&id, account)| account.record(id))
            .collect())
    }

    fn fetch_excluded(
        &self,
        prefilter: &Prefilter,
        after: Option<AccountId>,
        limit: usize,
    ) -> Result<Vec<CredentialRecord>, StoreError> {
        self.check_available()?;
        self.fetches.set(self.fetches.get() + 1);

        Ok(self
            .accounts
            .borrow()
            .iter()
            .filter(|(id, _)| after.map_or(true, |after| **id > after))
            .filter(|(_, account)| {
                account
                    .password
                    .as_deref()
                    .is_some_and(|password| !password.is_empty() && !prefilter.admits(Some(password)))
            })
            .take(limit)
            .map(|(&id, account)| account.record(id))
            .collect())
    }

    fn count_pending(&self, prefilter: &Prefilter) -> Result<u64, StoreError> {
        self.check_available()?;

        let count = self
            .accounts
            .borrow()
            .values()
            .filter(|account| prefilter.admits(account.password.as_deref()))
            .count();
        Ok(count as u64)
    }

    fn update_credential(&self, id: AccountId, value: &str) -> Result<(), StoreError> {
        self.check_available()?;

        if self.reject_writes.borrow().contains(&id) {
            return Err(StoreError::Write {
                id,
                source: Box::new(io::Error::new(io::ErrorKind::PermissionDenied, "row locked")),
            });
        }

        let mut accounts = self.accounts.borrow_mut();
        let account = accounts.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        account.password = Some(value.to_owned());
        self.updates.set(self.updates.get() + 1);
        Ok(())
    }
}
