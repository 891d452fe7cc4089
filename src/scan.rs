use std::collections::VecDeque;

use crate::{
    error::StoreError,
    prefilter::Prefilter,
    store::{AccountId, CredentialRecord, CredentialStore},
};

/// Default number of rows fetched per page
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Finds the rows whose credential may still need hashing
#[derive(Debug)]
pub struct MigrationScanner<S> {
    store: S,
    prefilter: Prefilter,
    batch_size: usize,
}

impl<S> MigrationScanner<S>
where
    S: CredentialStore,
{
    /// Scanner over `store` with the default prefilter
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            prefilter: Prefilter::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Use a different prefilter
    #[must_use]
    pub fn with_prefilter(mut self, prefilter: Prefilter) -> Self {
        self.prefilter = prefilter;
        self
    }

    /// Fetch `batch_size` rows per page. Zero is treated as one.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Store the scanner reads from
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Prefilter in use
    #[must_use]
    pub fn prefilter(&self) -> &Prefilter {
        &self.prefilter
    }

    /// Whether any row passes the prefilter
    ///
    /// # Errors
    ///
    /// Propagates the store's error
    pub fn has_pending_work(&self) -> Result<bool, StoreError> {
        Ok(self.store.count_pending(&self.prefilter)? > 0)
    }

    /// Lazily page through every row passing the prefilter, in id order.
    ///
    /// Paging is keyed on the last id seen, so rows rewritten while iterating
    /// are never yielded twice. Iteration ends after the first error.
    #[must_use]
    pub fn pending_rows(&self) -> PendingRows<'_, S> {
        self.rows(Selection::Admitted)
    }

    /// Lazily page through the non-empty rows the prefilter rejects, in id order.
    ///
    /// Some of them may only look like a hash, so the caller still has to run
    /// them through the detector.
    #[must_use]
    pub fn excluded_rows(&self) -> PendingRows<'_, S> {
        self.rows(Selection::Excluded)
    }

    fn rows(&self, selection: Selection) -> PendingRows<'_, S> {
        PendingRows {
            scanner: self,
            selection,
            buffer: VecDeque::new(),
            cursor: None,
            exhausted: false,
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Selection {
    Admitted,
    Excluded,
}

/// Iterator returned by [`MigrationScanner::pending_rows`] and
/// [`MigrationScanner::excluded_rows`]
#[derive(Debug)]
pub struct PendingRows<'a, S> {
    scanner: &'a MigrationScanner<S>,
    selection: Selection,
    buffer: VecDeque<CredentialRecord>,
    cursor: Option<AccountId>,
    exhausted: bool,
}

impl<S> PendingRows<'_, S>
where
    S: CredentialStore,
{
    fn fill(&mut self) -> Result<(), StoreError> {
        let MigrationScanner {
            store,
            prefilter,
            batch_size,
        } = self.scanner;

        let page = match self.selection {
            Selection::Admitted => store.fetch_pending(prefilter, self.cursor, *batch_size)?,
            Selection::Excluded => store.fetch_excluded(prefilter, self.cursor, *batch_size)?,
        };

        if page.len() < *batch_size {
            self.exhausted = true;
        }
        if let Some(last) = page.last() {
            self.cursor = Some(last.id);
        }

        self.buffer.extend(page);
        Ok(())
    }
}

impl<S> Iterator for PendingRows<'_, S>
where
    S: CredentialStore,
{
    type Item = Result<CredentialRecord, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(err) = self.fill() {
                self.exhausted = true;
                return Some(Err(err));
            }
        }

        self.buffer.pop_front().map(Ok)
    }
}
