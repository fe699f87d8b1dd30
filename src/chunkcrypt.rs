//! Authenticated encryption of a single chunk
//!
//! One chunk in, one opaque token out, using NaCl secretbox
//! (XSalsa20Poly1305). The token layout is:
//!
//! - nonce: 24 bytes
//! - sealed box: variable length (includes 16-byte Poly1305 MAC)
//!
//! The token always extends to the end of its container, so no length
//! field is recorded. Callers must treat tokens as opaque bytes; the
//! only promise is that `decrypt` returns the exact plaintext that was
//! sealed, or fails closed with `AuthenticationFailed`.

use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::{Nonce, XSalsa20Poly1305};
use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::{ErrorCategory, ErrorKind, PartboxError, Result};

/// Length of nonce in bytes
pub const NONCE_LEN: usize = 24;

/// Length of the chunk key in bytes
pub const KEY_LEN: usize = 32;

/// Encrypt one chunk under `key` using a fresh random nonce.
///
/// Returns the token: nonce(24) + sealedbox(variable). The plaintext
/// length is preserved exactly through decryption, which is how a
/// shorter final chunk reconstructs the original file length.
pub fn encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    encrypt_with_nonce(key, plaintext, &nonce)
}

/// Encrypt one chunk under `key` using the provided nonce.
///
/// This function is ONLY for testing purposes to generate deterministic output.
/// NEVER use this in production - always use `encrypt()` which generates a random nonce.
pub fn encrypt_with_nonce(
    key: &[u8; KEY_LEN],
    plaintext: &[u8],
    nonce: &[u8; NONCE_LEN],
) -> Result<Vec<u8>> {
    let cipher = XSalsa20Poly1305::new(&(*key).into());

    let nonce_obj = Nonce::from(*nonce);
    let sealed_box = cipher.encrypt(&nonce_obj, plaintext).map_err(|e| {
        PartboxError::new(ErrorCategory::Internal, format!("encryption failed: {}", e))
    })?;

    let mut token = Vec::with_capacity(NONCE_LEN + sealed_box.len());
    token.extend_from_slice(nonce);
    token.extend_from_slice(&sealed_box);

    Ok(token)
}

/// Decrypt a token produced by [`encrypt`].
///
/// Fails closed: a truncated token, any flipped bit, or a wrong key all
/// yield `AuthenticationFailed` - never silently-wrong plaintext.
pub fn decrypt(key: &[u8; KEY_LEN], token: &[u8]) -> Result<Vec<u8>> {
    if token.len() < NONCE_LEN {
        return Err(PartboxError::with_kind(
            ErrorCategory::User,
            ErrorKind::AuthenticationFailed,
            "token truncated while reading nonce",
        ));
    }
    let (nonce_bytes, sealed_box) = token.split_at(NONCE_LEN);

    let nonce_arr: [u8; NONCE_LEN] = nonce_bytes.try_into().map_err(|_| {
        PartboxError::new(ErrorCategory::Internal, "failed to read token nonce")
    })?;

    let cipher = XSalsa20Poly1305::new(&(*key).into());
    let nonce_obj = Nonce::from(nonce_arr);
    let plaintext = cipher.decrypt(&nonce_obj, sealed_box).map_err(|_| {
        PartboxError::with_kind(
            ErrorCategory::User,
            ErrorKind::AuthenticationFailed,
            "corrupt token, tampered-with data, or wrong base secret",
        )
    })?;

    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(fill: u8) -> [u8; KEY_LEN] {
        [fill; KEY_LEN]
    }

    #[test]
    fn test_empty_plaintext() {
        let key = test_key(0x11);
        let plaintext = b"";

        let token = encrypt(&key, plaintext).unwrap();
        let decrypted = decrypt(&key, &token).unwrap();

        assert_eq!(plaintext, &decrypted[..]);
    }

    #[test]
    fn test_small_plaintext() {
        let key = test_key(0x11);
        let plaintext = b"hello";

        let token = encrypt(&key, plaintext).unwrap();
        let decrypted = decrypt(&key, &token).unwrap();

        assert_eq!(plaintext, &decrypted[..]);
    }

    #[test]
    fn test_length_preserved() {
        let key = test_key(0x11);

        for len in [0usize, 1, 499, 500, 1000] {
            let plaintext = vec![0xA5u8; len];
            let token = encrypt(&key, &plaintext).unwrap();
            let decrypted = decrypt(&key, &token).unwrap();
            assert_eq!(decrypted.len(), len);
            assert_eq!(decrypted, plaintext);
        }
    }

    #[test]
    fn test_deterministic_encryption() {
        let key = test_key(0x11);
        let plaintext = b"hello world";
        let nonce = [2u8; NONCE_LEN];

        let token1 = encrypt_with_nonce(&key, plaintext, &nonce).unwrap();
        let token2 = encrypt_with_nonce(&key, plaintext, &nonce).unwrap();

        // Same key/nonce produces identical tokens
        assert_eq!(token1, token2);

        let pt1 = decrypt(&key, &token1).unwrap();
        let pt2 = decrypt(&key, &token2).unwrap();
        assert_eq!(plaintext, &pt1[..]);
        assert_eq!(plaintext, &pt2[..]);
    }

    #[test]
    fn test_different_nonce_different_token() {
        let key = test_key(0x11);
        let plaintext = b"hello world";

        let token1 = encrypt_with_nonce(&key, plaintext, &[2u8; NONCE_LEN]).unwrap();
        let token2 = encrypt_with_nonce(&key, plaintext, &[3u8; NONCE_LEN]).unwrap();

        assert_ne!(token1, token2);

        assert_eq!(&decrypt(&key, &token1).unwrap()[..], plaintext);
        assert_eq!(&decrypt(&key, &token2).unwrap()[..], plaintext);
    }

    #[test]
    fn test_wrong_key() {
        let plaintext = b"secret data";

        let token = encrypt(&test_key(0x11), plaintext).unwrap();
        let err = decrypt(&test_key(0x22), &token).expect_err("expected authentication failure");

        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
    }

    #[test]
    fn test_every_bit_flip_detected_in_short_token() {
        let key = test_key(0x11);
        let token = encrypt(&key, b"x").unwrap();

        for byte in 0..token.len() {
            for bit in 0..8 {
                let mut tampered = token.clone();
                tampered[byte] ^= 1 << bit;
                let err = decrypt(&key, &tampered)
                    .expect_err("expected authentication failure after bit flip");
                assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
            }
        }
    }

    #[test]
    fn test_truncated_nonce() {
        let err = decrypt(&test_key(0x11), &[0u8; NONCE_LEN - 1])
            .expect_err("expected authentication failure");
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
    }

    #[test]
    fn test_truncated_sealed_box() {
        let key = test_key(0x11);
        let token = encrypt(&key, b"some plaintext").unwrap();

        // Cut into the MAC region
        let err =
            decrypt(&key, &token[..token.len() - 1]).expect_err("expected authentication failure");
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
    }

    #[test]
    fn test_empty_token() {
        let err = decrypt(&test_key(0x11), b"").expect_err("expected authentication failure");
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
    }

    #[test]
    fn test_all_byte_values() {
        let key = test_key(0x11);
        let plaintext: Vec<u8> = (0..=255).collect();

        let token = encrypt(&key, &plaintext).unwrap();
        let decrypted = decrypt(&key, &token).unwrap();

        assert_eq!(plaintext, decrypted);
    }

    #[test]
    fn test_large_plaintext() {
        let key = test_key(0x11);
        let plaintext = vec![0x42u8; 128 * 1024]; // 128KB

        let token = encrypt(&key, &plaintext).unwrap();
        let decrypted = decrypt(&key, &token).unwrap();

        assert_eq!(plaintext, decrypted);
    }
}
