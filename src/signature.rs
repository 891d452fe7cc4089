//! Structural validators for the stored-hash families this crate knows about.
//!
//! None of these verify a password. They only check whether a stored value
//! has the shape of a hash produced by the respective scheme.

use core::fmt;
use password_hash::{Encoding, PasswordHash};

/// Alphabet used by crypt(3) style encodings (MD5-crypt, PHPASS)
const CRYPT_ALPHABET: &[u8] = b"./0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

const PBKDF2_IDENTS: [&str; 4] = ["pbkdf2", "pbkdf2-sha1", "pbkdf2-sha256", "pbkdf2-sha512"];
const PBKDF2_LEGACY_PREFIX: &str = "$pbkdf2-sha256$";

/// Known encodings of a stored credential
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HashSignature {
    /// `$1$salt$hash`
    Md5Salted,
    /// `$2y$10$...`
    BlowfishSalted,
    /// `$P$...` / `$H$...`
    PhpassSalted,
    /// PBKDF2, either as PHC string or in the legacy modular form
    Pbkdf2,
    /// Argon2 PHC string
    Argon2,
    /// Anything else, plaintext included
    Unrecognized,
}

impl HashSignature {
    /// Whether the signature names an actual hash family
    #[must_use]
    pub fn is_recognized(self) -> bool {
        self != Self::Unrecognized
    }

    /// Families that should be replaced by PBKDF2 the next time the plaintext is known
    #[must_use]
    pub fn is_legacy(self) -> bool {
        matches!(
            self,
            Self::Md5Salted | Self::BlowfishSalted | Self::PhpassSalted
        )
    }
}

impl fmt::Display for HashSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Md5Salted => "md5-salted",
            Self::BlowfishSalted => "blowfish-salted",
            Self::PhpassSalted => "phpass-salted",
            Self::Pbkdf2 => "pbkdf2",
            Self::Argon2 => "argon2",
            Self::Unrecognized => "unrecognized",
        })
    }
}

fn is_crypt_str(value: &str) -> bool {
    value.bytes().all(|b| CRYPT_ALPHABET.contains(&b))
}

fn is_adapted_b64(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'/')
}

/// `$1$<salt up to 8>$<22 chars>`
#[must_use]
pub fn is_md5_salted(value: &str) -> bool {
    let Some(rest) = value.strip_prefix("$1$") else {
        return false;
    };
    let Some((salt, hash)) = rest.split_once('$') else {
        return false;
    };

    (1..=8).contains(&salt.len()) && is_crypt_str(salt) && hash.len() == 22 && is_crypt_str(hash)
}

/// `$2<variant>$<cost>$<22 chars salt><31 chars hash>`
#[must_use]
pub fn is_blowfish_salted(value: &str) -> bool {
    let mut parts = value.split('$');
    if parts.next() != Some("") {
        return false;
    }

    let (Some(variant), Some(cost), Some(content), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    if !matches!(variant, "2" | "2a" | "2b" | "2x" | "2y") {
        return false;
    }

    let cost_ok = cost.len() == 2
        && cost
            .parse::<u32>()
            .is_ok_and(|cost| (4..=31).contains(&cost));
    if !cost_ok || content.len() != 53 || !content.is_ascii() {
        return false;
    }

    let (salt, hash) = content.split_at(22);
    let mut raw_hash = [0; 23];
    is_crypt_str(salt)
        && Encoding::Bcrypt
            .decode(hash, &mut raw_hash)
            .is_ok_and(|decoded| decoded.len() == 23)
}

/// `$P$` or `$H$`, one count character, 8 salt characters, 22 hash characters
#[must_use]
pub fn is_phpass_salted(value: &str) -> bool {
    let Some(rest) = value
        .strip_prefix("$P$")
        .or_else(|| value.strip_prefix("$H$"))
    else {
        return false;
    };

    if rest.len() != 31 || !is_crypt_str(rest) {
        return false;
    }

    CRYPT_ALPHABET
        .iter()
        .position(|&c| c == rest.as_bytes()[0])
        .is_some_and(|count_log2| (7..=30).contains(&count_log2))
}

/// PBKDF2 as PHC string or as `$pbkdf2-sha256$<rounds>$<salt>$<hash>`
#[must_use]
pub fn is_pbkdf2(value: &str) -> bool {
    pbkdf2_rounds(value).is_some()
}

/// Round count of a PBKDF2 hash in either accepted form
#[must_use]
pub fn pbkdf2_rounds(value: &str) -> Option<u32> {
    if let Ok(hash) = PasswordHash::new(value) {
        if !PBKDF2_IDENTS.contains(&hash.algorithm.as_str())
            || hash.salt.is_none()
            || hash.hash.is_none()
        {
            return None;
        }

        return hash
            .params
            .get_decimal("i")
            .filter(|&rounds| rounds > 0);
    }

    legacy_pbkdf2_rounds(value)
}

/// Round count of a hash in the legacy `$pbkdf2-sha256$<rounds>$<salt>$<hash>` form
pub(crate) fn legacy_pbkdf2_rounds(value: &str) -> Option<u32> {
    let rest = value.strip_prefix(PBKDF2_LEGACY_PREFIX)?;
    let mut parts = rest.split('$');

    let (Some(rounds), Some(salt), Some(hash), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };

    if !rounds.bytes().all(|b| b.is_ascii_digit()) || !is_adapted_b64(salt) || !is_adapted_b64(hash)
    {
        return None;
    }

    rounds.parse::<u32>().ok().filter(|&rounds| rounds > 0)
}

/// Argon2 PHC string with parseable Argon2 parameters
#[must_use]
pub fn is_argon2(value: &str) -> bool {
    let Ok(hash) = PasswordHash::new(value) else {
        return false;
    };

    hash.algorithm.as_str().parse::<argon2::Algorithm>().is_ok()
        && hash.salt.is_some()
        && hash.hash.is_some()
        && argon2::Params::try_from(&hash).is_ok()
}
