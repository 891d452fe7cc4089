use serde::Deserialize;

use crate::{
    error::{Error, Result},
    prefilter::Prefilter,
    rehash::RehashParams,
    scan::DEFAULT_BATCH_SIZE,
    store::sqlite::TableSpec,
};

/// Settings of a migration run, usually read from TOML
///
/// ```toml
/// batch_size = 500
/// refresh_if_stale = false
/// sweep_excluded = true
/// exclude_prefixes = ["$2y$"]
///
/// [table]
/// name = "fe_users"
/// id_column = "uid"
/// password_column = "password"
///
/// [hash]
/// algorithm = "sha256"
/// rounds = 600000
/// output_length = 32
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct MigrationConfig {
    /// Where the credentials live
    pub table: TableSpec,
    /// PBKDF2 target
    pub hash: RehashParams,
    /// Rows fetched per page
    pub batch_size: usize,
    /// Count recognized but outdated hashes. They are never rewritten.
    pub refresh_if_stale: bool,
    /// Recheck the rows the prefilter rejects and rehash those that aren't a
    /// known hash after all
    pub sweep_excluded: bool,
    /// Prefixes excluded from the scan on top of the defaults
    pub exclude_prefixes: Vec<String>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            table: TableSpec::default(),
            hash: RehashParams::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            refresh_if_stale: false,
            sweep_excluded: true,
            exclude_prefixes: Vec::new(),
        }
    }
}

impl MigrationConfig {
    /// Parse and validate a TOML document
    ///
    /// # Errors
    ///
    /// Malformed TOML, unknown keys or values rejected by [`Self::validate`]
    pub fn from_toml(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde can't
    ///
    /// # Errors
    ///
    /// [`Error::Config`] describing the first problem
    pub fn validate(&self) -> Result<()> {
        self.table.validate()?;

        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }
        if self.hash.rounds == 0 {
            return Err(Error::Config("hash.rounds must be at least 1".into()));
        }
        if !(RehashParams::MIN_OUTPUT_LENGTH..=RehashParams::MAX_OUTPUT_LENGTH)
            .contains(&self.hash.output_length)
        {
            return Err(Error::Config(format!(
                "hash.output_length must be between {} and {}, got {}",
                RehashParams::MIN_OUTPUT_LENGTH,
                RehashParams::MAX_OUTPUT_LENGTH,
                self.hash.output_length
            )));
        }
        if self.exclude_prefixes.iter().any(String::is_empty) {
            return Err(Error::Config(
                "exclude_prefixes must not contain an empty prefix".into(),
            ));
        }

        Ok(())
    }

    /// Default prefilter extended by [`Self::exclude_prefixes`]
    #[must_use]
    pub fn prefilter(&self) -> Prefilter {
        self.exclude_prefixes
            .iter()
            .fold(Prefilter::default(), |prefilter, prefix| {
                prefilter.exclude_prefix(prefix.as_str())
            })
    }
}
