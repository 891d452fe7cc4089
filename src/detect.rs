use crate::{
    rehash::RehashParams,
    signature::{self, HashSignature},
};

/// Structural check for one hash family
pub type Validator = fn(&str) -> bool;

/// Classifies stored credentials by their encoding, without knowing the plaintext
#[derive(Clone, Debug)]
pub struct HashDetector {
    validators: Vec<(HashSignature, Validator)>,
}

impl Default for HashDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl HashDetector {
    /// Detector for every family in [`HashSignature`]
    #[must_use]
    pub fn new() -> Self {
        Self {
            validators: vec![
                (HashSignature::Md5Salted, signature::is_md5_salted as Validator),
                (HashSignature::BlowfishSalted, signature::is_blowfish_salted as Validator),
                (HashSignature::PhpassSalted, signature::is_phpass_salted as Validator),
                (HashSignature::Pbkdf2, signature::is_pbkdf2 as Validator),
                (HashSignature::Argon2, signature::is_argon2 as Validator),
            ],
        }
    }

    /// Detector that only knows the given families
    #[must_use]
    pub fn with_validators(validators: Vec<(HashSignature, Validator)>) -> Self {
        Self { validators }
    }

    /// First family whose validator accepts `value`
    #[must_use]
    pub fn classify(&self, value: &str) -> HashSignature {
        self.validators
            .iter()
            .find(|(_, validate)| validate(value))
            .map_or(HashSignature::Unrecognized, |&(signature, _)| signature)
    }

    /// Whether `value` is already a hash and must not be hashed again
    #[must_use]
    pub fn is_recognized_hash(&self, value: &str) -> bool {
        self.classify(value).is_recognized()
    }

    /// Whether a recognized hash falls short of `target`.
    ///
    /// Legacy families are always stale. PBKDF2 is stale in its legacy modular
    /// form or below the target round count. Argon2 is never stale.
    #[must_use]
    pub fn needs_refresh(&self, value: &str, target: &RehashParams) -> bool {
        match self.classify(value) {
            family if family.is_legacy() => true,
            HashSignature::Pbkdf2 => {
                signature::legacy_pbkdf2_rounds(value).is_some()
                    || signature::pbkdf2_rounds(value).is_some_and(|rounds| rounds < target.rounds)
            }
            _ => false,
        }
    }
}
