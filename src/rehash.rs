use password_hash::{errors::InvalidValue, PasswordHasher, SaltString};
use pbkdf2::{Algorithm, Params, Pbkdf2};
use serde::Deserialize;

/// Digest underneath PBKDF2
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// HMAC-SHA-256
    #[default]
    Sha256,
    /// HMAC-SHA-512
    Sha512,
}

impl From<DigestAlgorithm> for Algorithm {
    fn from(value: DigestAlgorithm) -> Self {
        match value {
            DigestAlgorithm::Sha256 => Algorithm::Pbkdf2Sha256,
            DigestAlgorithm::Sha512 => Algorithm::Pbkdf2Sha512,
        }
    }
}

/// Target parameters of the rehash
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RehashParams {
    /// Digest algorithm
    pub algorithm: DigestAlgorithm,
    /// Iteration count
    pub rounds: u32,
    /// Length of the derived key in bytes
    pub output_length: usize,
}

impl Default for RehashParams {
    fn default() -> Self {
        Self {
            algorithm: DigestAlgorithm::default(),
            rounds: 600_000,
            output_length: 32,
        }
    }
}

impl RehashParams {
    /// Shortest derived key a PHC string can carry
    pub const MIN_OUTPUT_LENGTH: usize = 10;
    /// Longest derived key a PHC string can carry
    pub const MAX_OUTPUT_LENGTH: usize = 64;

    /// Check that hashes made with these parameters will be recognized afterwards
    ///
    /// # Errors
    ///
    /// Zero rounds or an output length outside
    /// [`MIN_OUTPUT_LENGTH`](Self::MIN_OUTPUT_LENGTH)..=[`MAX_OUTPUT_LENGTH`](Self::MAX_OUTPUT_LENGTH)
    pub fn validate(&self) -> password_hash::Result<()> {
        if self.rounds == 0 {
            return Err(password_hash::Error::ParamValueInvalid(InvalidValue::TooShort));
        }
        if self.output_length < Self::MIN_OUTPUT_LENGTH {
            return Err(password_hash::Error::OutputSize {
                provided: core::cmp::Ordering::Less,
                expected: Self::MIN_OUTPUT_LENGTH,
            });
        }
        if self.output_length > Self::MAX_OUTPUT_LENGTH {
            return Err(password_hash::Error::OutputSize {
                provided: core::cmp::Ordering::Greater,
                expected: Self::MAX_OUTPUT_LENGTH,
            });
        }
        Ok(())
    }
}

/// Turns an unrecognized credential into a PBKDF2 PHC string
#[derive(Clone, Debug, Default)]
pub struct Rehasher {
    params: RehashParams,
}

impl Rehasher {
    /// Rehasher producing hashes with the given parameters
    #[must_use]
    pub fn new(params: RehashParams) -> Self {
        Self { params }
    }

    /// Target parameters
    #[must_use]
    pub fn params(&self) -> &RehashParams {
        &self.params
    }

    /// Hash `value` with a fresh salt.
    ///
    /// The value is treated as opaque bytes, UTF-8 or not. Whatever it used to be,
    /// the result is a self-describing `$pbkdf2-sha...$i=...,l=...$salt$hash` string.
    ///
    /// # Errors
    ///
    /// The parameters don't pass [`RehashParams::validate`]
    pub fn hash(&self, value: &[u8]) -> password_hash::Result<String> {
        self.params.validate()?;

        let salt = SaltString::generate(rand::thread_rng());
        let algorithm = Algorithm::from(self.params.algorithm);
        let params = Params {
            rounds: self.params.rounds,
            output_length: self.params.output_length,
        };

        let hash = Pbkdf2.hash_password_customized(
            value,
            Some(algorithm.ident()),
            None,
            params,
            &salt,
        )?;

        Ok(hash.to_string())
    }
}
