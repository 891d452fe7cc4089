use tracing::{debug, error, info, warn};

use crate::{
    config::MigrationConfig,
    detect::HashDetector,
    error::{Result, StoreError},
    rehash::Rehasher,
    scan::MigrationScanner,
    signature::HashSignature,
    store::{AccountId, CredentialRecord, CredentialStore},
};

/// Row whose new hash could not be written
#[derive(Debug)]
pub struct RowFailure {
    /// Account the write was meant for
    pub id: AccountId,
    /// What the store reported
    pub error: StoreError,
}

/// What a migration run did
#[derive(Debug, Default)]
pub struct MigrationReport {
    /// Rows that passed the prefilter
    pub scanned: usize,
    /// Rows whose credential was replaced
    pub rehashed: usize,
    /// `NULL` or empty credentials
    pub skipped_empty: usize,
    /// Rows that passed the prefilter but already were a known hash
    pub skipped_recognized: usize,
    /// Recognized hashes below target among the scanned rows. Only counted with
    /// `refresh_if_stale`.
    pub stale: usize,
    /// Rows rejected by the prefilter and confirmed as known hashes by the sweep
    pub swept: usize,
    /// Rows that could not be written
    pub failures: Vec<RowFailure>,
    /// One line per successful write
    pub query_log: Vec<String>,
}

impl MigrationReport {
    /// Number of rows changed
    #[must_use]
    pub fn rows_changed(&self) -> usize {
        self.rehashed
    }

    /// Whether every eligible row was written
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Answer to "does this migration need to run"
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateCheck {
    /// Migration has work to do
    pub needed: bool,
    /// Human readable explanation
    pub description: String,
}

/// Result of running a migration through [`Migration::perform_update`]
#[derive(Debug)]
pub struct UpdateOutcome {
    /// Run completed without a fatal error
    pub success: bool,
    /// Writes performed
    pub query_log: Vec<String>,
    /// Human readable summary
    pub message: String,
}

/// A one-time data migration, as driven by an upgrade wizard
pub trait Migration {
    /// Whether [`Migration::run`] would change anything
    ///
    /// # Errors
    ///
    /// The check could not be performed
    fn has_pending_work(&self) -> Result<bool>;

    /// Perform the migration
    ///
    /// # Errors
    ///
    /// The run had to be aborted
    fn run(&self) -> Result<MigrationReport>;

    /// [`Migration::has_pending_work`] with a description attached.
    /// A failed check reports the migration as needed.
    fn check_for_update(&self) -> UpdateCheck {
        match self.has_pending_work() {
            Ok(true) => UpdateCheck {
                needed: true,
                description: "Stored passwords found that are not hashed yet".into(),
            },
            Ok(false) => UpdateCheck {
                needed: false,
                description: "All stored passwords are hashed".into(),
            },
            Err(err) => UpdateCheck {
                needed: true,
                description: format!("Could not check stored passwords: {err}"),
            },
        }
    }

    /// [`Migration::run`] folded into a success flag, query log and message
    fn perform_update(&self) -> UpdateOutcome {
        match self.run() {
            Ok(report) => {
                let mut message = format!("Hashed {} stored passwords", report.rows_changed());
                if !report.is_clean() {
                    message.push_str(&format!(
                        ", {} could not be written and are still pending",
                        report.failures.len()
                    ));
                }

                UpdateOutcome {
                    success: true,
                    query_log: report.query_log,
                    message,
                }
            }
            Err(err) => UpdateOutcome {
                success: false,
                query_log: Vec::new(),
                message: format!("Password migration aborted: {err}"),
            },
        }
    }
}

/// How the detector sees a stored credential
enum Verdict<'a> {
    Empty,
    Recognized(HashSignature, &'a str),
    Unrecognized(&'a [u8]),
}

/// Rehashes every plaintext or unknown credential to PBKDF2
#[derive(Debug)]
pub struct MigrationRunner<S> {
    scanner: MigrationScanner<S>,
    detector: HashDetector,
    rehasher: Rehasher,
    refresh_if_stale: bool,
    sweep_excluded: bool,
}

impl<S> MigrationRunner<S>
where
    S: CredentialStore,
{
    /// Runner with default detector, rehasher and prefilter
    #[must_use]
    pub fn new(store: S) -> Self {
        Self::with_parts(MigrationScanner::new(store), HashDetector::new(), Rehasher::default())
    }

    /// Runner assembled from its parts
    #[must_use]
    pub fn with_parts(
        scanner: MigrationScanner<S>,
        detector: HashDetector,
        rehasher: Rehasher,
    ) -> Self {
        Self {
            scanner,
            detector,
            rehasher,
            refresh_if_stale: false,
            sweep_excluded: true,
        }
    }

    /// Runner set up from `config`
    ///
    /// # Errors
    ///
    /// The configuration doesn't validate
    pub fn from_config(store: S, config: &MigrationConfig) -> Result<Self> {
        config.validate()?;

        let scanner = MigrationScanner::new(store)
            .with_prefilter(config.prefilter())
            .with_batch_size(config.batch_size);

        Ok(Self::with_parts(scanner, HashDetector::new(), Rehasher::new(config.hash))
            .refresh_if_stale(config.refresh_if_stale)
            .sweep_excluded(config.sweep_excluded))
    }

    /// Count recognized hashes that fall short of the rehash target
    #[must_use]
    pub fn refresh_if_stale(mut self, enabled: bool) -> Self {
        self.refresh_if_stale = enabled;
        self
    }

    /// After the prefiltered pass, also walk the rows the prefilter rejected and
    /// rehash those the detector doesn't recognize either. On by default.
    ///
    /// Without it, plaintext that happens to start like a hash (`$1$hunter2`)
    /// is never migrated.
    #[must_use]
    pub fn sweep_excluded(mut self, enabled: bool) -> Self {
        self.sweep_excluded = enabled;
        self
    }

    /// Scanner feeding this runner
    #[must_use]
    pub fn scanner(&self) -> &MigrationScanner<S> {
        &self.scanner
    }

    fn judge<'a>(&self, row: &'a CredentialRecord) -> Verdict<'a> {
        let Some(bytes) = row.stored_bytes().filter(|bytes| !bytes.is_empty()) else {
            return Verdict::Empty;
        };

        // every known hash family is ASCII, anything else is a legacy encoding
        match core::str::from_utf8(bytes) {
            Ok(value) => match self.detector.classify(value) {
                HashSignature::Unrecognized => Verdict::Unrecognized(bytes),
                signature => Verdict::Recognized(signature, value),
            },
            Err(_) => Verdict::Unrecognized(bytes),
        }
    }

    fn needs_rehash(&self, row: &CredentialRecord) -> bool {
        matches!(self.judge(row), Verdict::Unrecognized(_))
    }

    fn process(&self, row: &CredentialRecord, report: &mut MigrationReport) -> Result<()> {
        match self.judge(row) {
            Verdict::Empty => {
                debug!(id = %row.id, "skipping empty credential");
                report.skipped_empty += 1;
            }
            Verdict::Recognized(signature, value) => {
                debug!(id = %row.id, %signature, "skipping hashed credential");
                report.skipped_recognized += 1;

                if self.refresh_if_stale && self.detector.needs_refresh(value, self.rehasher.params())
                {
                    info!(id = %row.id, %signature, "hash is below target, rehash on next login");
                    report.stale += 1;
                }
            }
            Verdict::Unrecognized(value) => self.rewrite(row.id, value, report)?,
        }

        Ok(())
    }

    fn sweep(&self, row: &CredentialRecord, report: &mut MigrationReport) -> Result<()> {
        match self.judge(row) {
            Verdict::Empty => {}
            Verdict::Recognized(signature, _) => {
                debug!(id = %row.id, %signature, "excluded credential is a hash");
                report.swept += 1;
            }
            Verdict::Unrecognized(value) => {
                info!(id = %row.id, "excluded credential only looks like a hash");
                self.rewrite(row.id, value, report)?;
            }
        }

        Ok(())
    }

    fn rewrite(&self, id: AccountId, value: &[u8], report: &mut MigrationReport) -> Result<()> {
        let hashed = self.rehasher.hash(value)?;
        let store = self.scanner.store();
        match store.update_credential(id, &hashed) {
            Ok(()) => {
                info!(%id, "rehashed credential");
                report.rehashed += 1;
                report.query_log.push(store.describe_update(id));
            }
            Err(err) if err.is_fatal() => return Err(err.into()),
            Err(err) => {
                warn!(%id, error = %err, "failed to store rehashed credential");
                report.failures.push(RowFailure { id, error: err });
            }
        }

        Ok(())
    }

    fn run_inner(&self, report: &mut MigrationReport) -> Result<()> {
        for row in self.scanner.pending_rows() {
            let row = row?;
            report.scanned += 1;
            self.process(&row, report)?;
        }

        if self.sweep_excluded {
            for row in self.scanner.excluded_rows() {
                self.sweep(&row?, report)?;
            }
        }
        Ok(())
    }
}

impl<S> Migration for MigrationRunner<S>
where
    S: CredentialStore,
{
    fn has_pending_work(&self) -> Result<bool> {
        if !self.sweep_excluded && !self.scanner.has_pending_work()? {
            return Ok(false);
        }

        for row in self.scanner.pending_rows() {
            if self.needs_rehash(&row?) {
                return Ok(true);
            }
        }
        if self.sweep_excluded {
            for row in self.scanner.excluded_rows() {
                if self.needs_rehash(&row?) {
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }

    fn run(&self) -> Result<MigrationReport> {
        let mut report = MigrationReport::default();

        if let Err(err) = self.run_inner(&mut report) {
            error!(
                error = %err,
                rehashed = report.rehashed,
                "password migration aborted"
            );
            return Err(err);
        }

        info!(
            scanned = report.scanned,
            rehashed = report.rehashed,
            skipped_empty = report.skipped_empty,
            skipped_recognized = report.skipped_recognized,
            stale = report.stale,
            swept = report.swept,
            failed = report.failures.len(),
            "password migration finished"
        );

        Ok(report)
    }
}
