//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Platform Secret Store interface — three pure capabilities consumed by
//! the blob store and the nonce manager. This is a fixed trait boundary; a
//! production deployment backs it with a secure element or OS keyring, and
//! [`FileSecretStore`] is the file-backed stub used for tests and local
//! development.

use crate::codec::NONCE_LEN;
use crate::error::StoreError;
use crate::nonce::NonceSlotState;
use crate::secret::Secret;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Device-bound key material and the persistent nonce slot.
pub trait PlatformSecretStore: Send + Sync {
    /// The device-bound symmetric key used by Sealed mode.
    fn get_sealing_key(&self) -> Result<Secret<Vec<u8>>, StoreError>;

    /// The device-bound key used to compute the Authenticated-mode MAC.
    fn get_mac_key(&self) -> Result<Secret<Vec<u8>>, StoreError>;

    /// Read the current nonce slot state. Exclusive and durable.
    fn nonce_slot_read(&self) -> Result<NonceSlotState, StoreError>;

    /// Persist a new nonce slot state. Exclusive and durable.
    fn nonce_slot_write(&self, state: &NonceSlotState) -> Result<(), StoreError>;
}

/// File-backed [`PlatformSecretStore`] for tests and local development.
///
/// Keys are generated on first access and persisted under `dir` with
/// restrictive permissions; this is not a secure-element implementation —
/// it exists so the blob store has something to orchestrate without a real
/// platform binding.
pub struct FileSecretStore {
    dir: PathBuf,
}

const SEALING_KEY_FILE: &str = "sealing.key";
const MAC_KEY_FILE: &str = "mac.key";
const NONCE_SLOT_FILE: &str = "nonce.slot";

impl FileSecretStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn load_or_generate_key(&self, file_name: &str, len: usize) -> Result<Secret<Vec<u8>>, StoreError> {
        let path = self.dir.join(file_name);
        if let Ok(bytes) = fs::read(&path) {
            if bytes.len() == len {
                return Ok(Secret::new(bytes));
            }
        }

        let mut key = vec![0u8; len];
        crate::crypto::random_bytes(&mut key);
        write_restricted(&path, &key)?;
        debug!(file = file_name, "generated new device key");
        Ok(Secret::new(key))
    }
}

impl PlatformSecretStore for FileSecretStore {
    fn get_sealing_key(&self) -> Result<Secret<Vec<u8>>, StoreError> {
        self.load_or_generate_key(SEALING_KEY_FILE, 32)
    }

    fn get_mac_key(&self) -> Result<Secret<Vec<u8>>, StoreError> {
        self.load_or_generate_key(MAC_KEY_FILE, 32)
    }

    fn nonce_slot_read(&self) -> Result<NonceSlotState, StoreError> {
        let path = self.dir.join(NONCE_SLOT_FILE);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(NonceSlotState::Uninitialized)
            }
            Err(e) => return Err(e.into()),
        };

        if bytes.len() != 2 * NONCE_LEN + 1 {
            return Err(StoreError::Malformed(format!(
                "nonce slot file has {} bytes, expected {}",
                bytes.len(),
                2 * NONCE_LEN + 1
            )));
        }

        let base: [u8; NONCE_LEN] = bytes[..NONCE_LEN].try_into().unwrap();
        let counter: [u8; NONCE_LEN] = bytes[NONCE_LEN..2 * NONCE_LEN].try_into().unwrap();
        let exhausted = bytes[2 * NONCE_LEN] != 0;

        Ok(if exhausted {
            NonceSlotState::Exhausted { base, counter }
        } else {
            NonceSlotState::Active { base, counter }
        })
    }

    fn nonce_slot_write(&self, state: &NonceSlotState) -> Result<(), StoreError> {
        let (base, counter, exhausted) = match state {
            NonceSlotState::Uninitialized => {
                // Nothing durable to write yet; the first Active transition writes it.
                return Ok(());
            }
            NonceSlotState::Active { base, counter } => (*base, *counter, false),
            NonceSlotState::Exhausted { base, counter } => (*base, *counter, true),
        };

        let mut bytes = Vec::with_capacity(2 * NONCE_LEN + 1);
        bytes.extend_from_slice(&base);
        bytes.extend_from_slice(&counter);
        bytes.push(exhausted as u8);

        let path = self.dir.join(NONCE_SLOT_FILE);
        write_restricted(&path, &bytes)?;
        sync_dir(&self.dir)?;
        Ok(())
    }
}

/// Write `contents` to `path` via a temp file + rename + fsync, with
/// owner-only permissions on Unix. Crash-safe: a reader never observes a
/// partially-written file.
fn write_restricted(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let tmp_path = tmp_path_for(path);
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
    }

    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Append `.tmp` to the full file name so distinct files that share a stem
/// never collide on the same temp file.
fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Best-effort directory fsync so a rename is durable across crashes on
/// platforms that support it; a no-op failure here is not itself fatal.
fn sync_dir(dir: &Path) -> Result<(), StoreError> {
    if let Ok(dir_handle) = fs::File::open(dir) {
        let _ = dir_handle.sync_all();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn keys_are_generated_once_and_persist() {
        let dir = tempdir().unwrap();
        let pss = FileSecretStore::new(dir.path()).unwrap();
        let key1 = pss.get_sealing_key().unwrap();
        let key2 = pss.get_sealing_key().unwrap();
        assert_eq!(key1.expose_secret(), key2.expose_secret());
        assert_eq!(key1.expose_secret().len(), 32);
    }

    #[test]
    fn sealing_and_mac_keys_differ() {
        let dir = tempdir().unwrap();
        let pss = FileSecretStore::new(dir.path()).unwrap();
        assert_ne!(
            pss.get_sealing_key().unwrap().expose_secret(),
            pss.get_mac_key().unwrap().expose_secret()
        );
    }

    #[test]
    fn nonce_slot_roundtrip() {
        let dir = tempdir().unwrap();
        let pss = FileSecretStore::new(dir.path()).unwrap();
        assert_eq!(pss.nonce_slot_read().unwrap(), NonceSlotState::Uninitialized);

        let state = NonceSlotState::Active {
            base: [1; NONCE_LEN],
            counter: [2; NONCE_LEN],
        };
        pss.nonce_slot_write(&state).unwrap();
        assert_eq!(pss.nonce_slot_read().unwrap(), state);
    }
}
