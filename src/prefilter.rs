/// One "not like" predicate of the candidate query
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Exclusion {
    /// Exclude values starting with the prefix (`NOT LIKE 'prefix%'`)
    Prefix(String),
    /// Exclude exactly this value (`NOT LIKE 'value'`)
    Exact(String),
}

impl Exclusion {
    /// Render as a `LIKE` pattern, escaped with `\`
    #[must_use]
    pub fn to_like_pattern(&self) -> String {
        match self {
            Self::Prefix(prefix) => format!("{}%", escape_like(prefix)),
            Self::Exact(value) => escape_like(value),
        }
    }

    fn matches(&self, value: &[u8]) -> bool {
        match self {
            Self::Prefix(prefix) => starts_with_ignore_ascii_case(value, prefix.as_bytes()),
            Self::Exact(exact) => value.eq_ignore_ascii_case(exact.as_bytes()),
        }
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// SQLite's LIKE folds ASCII case, so the in-memory check does as well
fn starts_with_ignore_ascii_case(value: &[u8], prefix: &[u8]) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Cheap candidate filter: a row is a candidate unless its credential matches
/// one of the exclusions.
///
/// Coarser than [`HashDetector`](crate::HashDetector), which stays the
/// authoritative check. Rows the prefilter rejects are only skipped for good
/// when the runner's sweep is switched off.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prefilter {
    exclusions: Vec<Exclusion>,
}

impl Default for Prefilter {
    fn default() -> Self {
        Self {
            exclusions: vec![
                Exclusion::Prefix("$argon2".into()),
                Exclusion::Prefix("$pbkdf2".into()),
                Exclusion::Prefix("$P$C".into()),
                Exclusion::Prefix("$1$".into()),
                Exclusion::Exact(String::new()),
            ],
        }
    }
}

impl Prefilter {
    /// Prefilter with exactly these exclusions
    #[must_use]
    pub fn new(exclusions: Vec<Exclusion>) -> Self {
        Self { exclusions }
    }

    /// Add another excluded prefix
    #[must_use]
    pub fn exclude_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.exclusions.push(Exclusion::Prefix(prefix.into()));
        self
    }

    /// Exclusions in query order
    #[must_use]
    pub fn exclusions(&self) -> &[Exclusion] {
        &self.exclusions
    }

    /// `LIKE` patterns in query order
    #[must_use]
    pub fn like_patterns(&self) -> Vec<String> {
        self.exclusions
            .iter()
            .map(Exclusion::to_like_pattern)
            .collect()
    }

    /// Whether a stored value passes the prefilter.
    ///
    /// `None` never does, the same way `NULL NOT LIKE ...` is never true.
    #[must_use]
    pub fn admits(&self, value: Option<&str>) -> bool {
        self.admits_bytes(value.map(str::as_bytes))
    }

    /// [`Self::admits`] for values that may not be UTF-8
    #[must_use]
    pub fn admits_bytes(&self, value: Option<&[u8]>) -> bool {
        value.is_some_and(|value| !self.exclusions.iter().any(|exclusion| exclusion.matches(value)))
    }
}
