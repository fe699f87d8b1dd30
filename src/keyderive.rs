//! Per-chunk key derivation
//!
//! Every chunk is encrypted under its own key, derived from the single
//! base secret, the chunk's 1-based index and a random per-chunk salt:
//!
//!   key = PBKDF2-HMAC-SHA256(secret || decimal(index), salt, 100000)
//!
//! Derivation is deterministic: the merger holds no key material and
//! must re-derive every chunk key from the secret plus the salt and
//! index recorded with the part.

use hmac::Hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::chunkcrypt::KEY_LEN;
use crate::error::{ErrorCategory, ErrorKind, PartboxError, Result};

/// Length of the per-chunk salt in bytes.
pub const SALT_LEN: usize = 16;

/// PBKDF2 iteration count. A deliberate, fixed CPU cost per chunk;
/// changing it breaks decryption of previously written parts.
const PBKDF2_ROUNDS: u32 = 100_000;

/// Derive the 32-byte chunk key for `(secret, index, salt)`.
///
/// Deterministic: identical inputs always produce the identical key.
/// The merger depends on this - it never sees the original key, only
/// the salt and index recorded alongside the ciphertext.
pub fn derive(secret: &[u8], index: u64, salt: &[u8]) -> Result<[u8; KEY_LEN]> {
    if secret.is_empty() {
        return Err(PartboxError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidParameter,
            "base secret must not be empty",
        ));
    }

    if salt.len() != SALT_LEN {
        return Err(PartboxError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidParameter,
            format!("salt must be exactly {} bytes, got {}", SALT_LEN, salt.len()),
        ));
    }

    if index == 0 {
        return Err(PartboxError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidParameter,
            "chunk index must be positive (indices are 1-based)",
        ));
    }

    let index_digits = index.to_string();
    let mut password = Zeroizing::new(Vec::with_capacity(secret.len() + index_digits.len()));
    password.extend_from_slice(secret);
    password.extend_from_slice(index_digits.as_bytes());

    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2::<Hmac<Sha256>>(&password, salt, PBKDF2_ROUNDS, &mut key).map_err(|e| {
        PartboxError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::KeyDerivation,
            format!("PBKDF2 key derivation failed: {}", e),
        )
    })?;

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_deterministic() {
        let salt = [0x42u8; SALT_LEN];

        let key1 = derive(b"base secret", 1, &salt).unwrap();
        let key2 = derive(b"base secret", 1, &salt).unwrap();
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_derive_different_indices() {
        let salt = [0x42u8; SALT_LEN];

        let key1 = derive(b"base secret", 1, &salt).unwrap();
        let key2 = derive(b"base secret", 2, &salt).unwrap();
        assert_ne!(key1, key2);
    }

    #[test]
    fn test_derive_different_salts() {
        let key1 = derive(b"base secret", 1, &[0x01u8; SALT_LEN]).unwrap();
        let key2 = derive(b"base secret", 1, &[0x02u8; SALT_LEN]).unwrap();
        assert_ne!(key1, key2);
    }

    #[test]
    fn test_derive_different_secrets() {
        let salt = [0x42u8; SALT_LEN];

        let key1 = derive(b"secret one", 1, &salt).unwrap();
        let key2 = derive(b"secret two", 1, &salt).unwrap();
        assert_ne!(key1, key2);
    }

    /// The index is appended as decimal text, so (secret "pw", index 12)
    /// and (secret "pw1", index 2) produce the same derivation password.
    /// This mirrors the on-disk contract and is accepted; the test pins
    /// the behavior so a change would be noticed.
    #[test]
    fn test_derive_index_is_decimal_suffix() {
        let salt = [0x42u8; SALT_LEN];

        let key1 = derive(b"pw", 12, &salt).unwrap();
        let key2 = derive(b"pw1", 2, &salt).unwrap();
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_derive_empty_secret_rejected() {
        let err = derive(b"", 1, &[0u8; SALT_LEN]).expect_err("expected invalid parameter");
        assert_eq!(err.kind, Some(ErrorKind::InvalidParameter));
    }

    #[test]
    fn test_derive_wrong_salt_length_rejected() {
        let err = derive(b"secret", 1, &[0u8; 8]).expect_err("expected invalid parameter");
        assert_eq!(err.kind, Some(ErrorKind::InvalidParameter));
    }

    #[test]
    fn test_derive_zero_index_rejected() {
        let err = derive(b"secret", 0, &[0u8; SALT_LEN]).expect_err("expected invalid parameter");
        assert_eq!(err.kind, Some(ErrorKind::InvalidParameter));
    }
}
