#![doc = include_str!("../README.md")]
#![forbid(missing_docs, rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic)]

mod config;
mod detect;
mod error;
mod prefilter;
mod rehash;
mod runner;
mod scan;
mod store;

pub mod signature;

pub use crate::{
    config::MigrationConfig,
    detect::{HashDetector, Validator},
    error::{BoxError, Error, Result, StoreError},
    prefilter::{Exclusion, Prefilter},
    rehash::{DigestAlgorithm, RehashParams, Rehasher},
    runner::{Migration, MigrationReport, MigrationRunner, RowFailure, UpdateCheck, UpdateOutcome},
    scan::{MigrationScanner, PendingRows, DEFAULT_BATCH_SIZE},
    signature::HashSignature,
    store::{
        sqlite::{SqliteStore, TableSpec},
        AccountId, CredentialRecord, CredentialStore,
    },
};
