//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Crypto Primitives binding — pure functions only, no I/O, no key
//! management. Everything above this module treats these as a fixed
//! contract: keyed MAC, AEAD cipher, constant-time comparison, and a CSPRNG.

use crate::codec::{NONCE_LEN, TAG_LEN};
use crate::error::StoreError;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Compute HMAC-SHA-256 over `msg` under `key`. Deterministic, no hidden
/// state.
pub fn hmac_sha256(key: &[u8], msg: &[u8]) -> [u8; 32] {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(msg);
    mac.finalize().into_bytes().into()
}

/// Constant-time buffer equality. Timing must not depend on the position of
/// the first differing byte.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

/// Fill `out` with cryptographically strong random bytes.
pub fn random_bytes(out: &mut [u8]) {
    rand::rngs::OsRng.fill_bytes(out);
}

/// AES-GCM encrypt `plaintext` under `key` and `nonce`. `key` must be 16 or
/// 32 bytes (AES-128-GCM or AES-256-GCM). Associated data is empty, matching
/// the sealed frame's interop contract.
///
/// Returns `(ciphertext, tag)` with `ciphertext.len() == plaintext.len()`
/// and `tag.len() == 16`.
pub fn aes_gcm_encrypt(
    key: &[u8],
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
) -> Result<(Vec<u8>, [u8; TAG_LEN]), StoreError> {
    let nonce = Nonce::from_slice(nonce);
    let mut sealed = match key.len() {
        16 => {
            let cipher = Aes128Gcm::new_from_slice(key)
                .map_err(|e| StoreError::KeyUnavailable(e.to_string()))?;
            cipher
                .encrypt(
                    nonce,
                    Payload {
                        msg: plaintext,
                        aad: &[],
                    },
                )
                .map_err(|_| StoreError::Malformed("AES-GCM encryption failed".into()))?
        }
        32 => {
            let cipher = Aes256Gcm::new_from_slice(key)
                .map_err(|e| StoreError::KeyUnavailable(e.to_string()))?;
            cipher
                .encrypt(
                    nonce,
                    Payload {
                        msg: plaintext,
                        aad: &[],
                    },
                )
                .map_err(|_| StoreError::Malformed("AES-GCM encryption failed".into()))?
        }
        other => {
            return Err(StoreError::KeyUnavailable(format!(
                "sealing key must be 16 or 32 bytes, got {other}"
            )))
        }
    };
    let tag_start = sealed.len() - TAG_LEN;
    let tag: [u8; TAG_LEN] = sealed[tag_start..].try_into().unwrap();
    sealed.truncate(tag_start);
    Ok((sealed, tag))
}

/// AES-GCM decrypt `ciphertext` under `key`, `nonce`, and `tag`. On
/// authentication failure returns [`StoreError::IntegritySealMismatch`] and
/// no plaintext bytes.
pub fn aes_gcm_decrypt(
    key: &[u8],
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
    tag: &[u8; TAG_LEN],
) -> Result<Vec<u8>, StoreError> {
    let nonce_arr = Nonce::from_slice(nonce);
    let mut combined = Vec::with_capacity(ciphertext.len() + TAG_LEN);
    combined.extend_from_slice(ciphertext);
    combined.extend_from_slice(tag);

    let payload = Payload {
        msg: &combined,
        aad: &[],
    };

    let result = match key.len() {
        16 => {
            let cipher = Aes128Gcm::new_from_slice(key)
                .map_err(|e| StoreError::KeyUnavailable(e.to_string()))?;
            cipher.decrypt(nonce_arr, payload)
        }
        32 => {
            let cipher = Aes256Gcm::new_from_slice(key)
                .map_err(|e| StoreError::KeyUnavailable(e.to_string()))?;
            cipher.decrypt(nonce_arr, payload)
        }
        other => {
            return Err(StoreError::KeyUnavailable(format!(
                "sealing key must be 16 or 32 bytes, got {other}"
            )))
        }
    };

    result.map_err(|_| StoreError::IntegritySealMismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_is_deterministic() {
        let key = [1u8; 32];
        let a = hmac_sha256(&key, b"message");
        let b = hmac_sha256(&key, b"message");
        assert_eq!(a, b);
    }

    #[test]
    fn hmac_differs_by_message() {
        let key = [1u8; 32];
        assert_ne!(hmac_sha256(&key, b"a"), hmac_sha256(&key, b"b"));
    }

    #[test]
    fn ct_eq_matches_equality() {
        assert!(ct_eq(b"abc", b"abc"));
        assert!(!ct_eq(b"abc", b"abd"));
        assert!(!ct_eq(b"abc", b"ab"));
    }

    #[test]
    fn aes_gcm_roundtrip_256() {
        let key = [7u8; 32];
        let nonce = [9u8; NONCE_LEN];
        let (ciphertext, tag) = aes_gcm_encrypt(&key, &nonce, b"secret payload").unwrap();
        let plaintext = aes_gcm_decrypt(&key, &nonce, &ciphertext, &tag).unwrap();
        assert_eq!(plaintext, b"secret payload");
    }

    #[test]
    fn aes_gcm_roundtrip_128() {
        let key = [7u8; 16];
        let nonce = [9u8; NONCE_LEN];
        let (ciphertext, tag) = aes_gcm_encrypt(&key, &nonce, b"short").unwrap();
        let plaintext = aes_gcm_decrypt(&key, &nonce, &ciphertext, &tag).unwrap();
        assert_eq!(plaintext, b"short");
    }

    #[test]
    fn aes_gcm_tamper_detected() {
        let key = [7u8; 32];
        let nonce = [9u8; NONCE_LEN];
        let (mut ciphertext, tag) = aes_gcm_encrypt(&key, &nonce, b"secret payload").unwrap();
        ciphertext[0] ^= 0xFF;
        let result = aes_gcm_decrypt(&key, &nonce, &ciphertext, &tag);
        assert!(matches!(result, Err(StoreError::IntegritySealMismatch)));
    }
}
