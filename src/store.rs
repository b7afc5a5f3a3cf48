//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Blob Store — the public façade. Orchestrates the platform secret store,
//! crypto primitives, envelope codec, and nonce manager to implement
//! `size`, `read`, and `write` per mode.

use crate::blob_name::BlobName;
use crate::codec::{self, Header, Mode, NONCE_LEN, TAG_LEN};
use crate::config::StoreConfig;
use crate::crypto::{aes_gcm_decrypt, aes_gcm_encrypt, ct_eq, hmac_sha256};
use crate::error::StoreError;
use crate::nonce::NonceManager;
use crate::pss::{FileSecretStore, PlatformSecretStore};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{debug, instrument, warn};

/// The public façade over the blob storage layer.
///
/// A `BlobStore` owns no process-global state beyond the nonce manager's
/// internal lock; everything else is read from disk on each call, so
/// reads of distinct blob names may proceed concurrently.
pub struct BlobStore {
    config: StoreConfig,
    pss: Box<dyn PlatformSecretStore>,
    nonce_manager: NonceManager,
}

impl BlobStore {
    /// Construct a store backed by a caller-supplied [`PlatformSecretStore`].
    pub fn new(config: StoreConfig, pss: Box<dyn PlatformSecretStore>) -> Result<Self, StoreError> {
        fs::create_dir_all(config.root_dir())?;
        Ok(Self {
            config,
            pss,
            nonce_manager: NonceManager::new(),
        })
    }

    /// Construct a store backed by the file-backed [`FileSecretStore`] test
    /// stub, with its key material kept in `<root_dir>/.secrets`.
    pub fn with_file_secret_store(config: StoreConfig) -> Result<Self, StoreError> {
        let secrets_dir = config.root_dir().join(".secrets");
        let pss = FileSecretStore::new(secrets_dir)?;
        Self::new(config, Box::new(pss))
    }

    fn path_for(&self, name: &BlobName) -> std::path::PathBuf {
        name.resolve(self.config.root_dir())
    }

    /// `true` if a blob file exists under `name`, regardless of mode.
    pub fn exists(&self, name: &BlobName) -> bool {
        self.path_for(name).is_file()
    }

    /// Payload length if the file exists, `0` if it does not, `Error` on
    /// I/O failure or corruption (including a payload over the configured
    /// maximum).
    #[instrument(skip(self), fields(blob = %name))]
    pub fn size(&self, name: &BlobName, mode: Mode) -> Result<usize, StoreError> {
        let path = self.path_for(name);
        let frame_len = match fs::metadata(&path) {
            Ok(meta) => meta.len() as usize,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let payload_len = codec::size_of(mode, frame_len)?;
        if payload_len > self.config.max_blob_bytes() {
            return Err(StoreError::Malformed(format!(
                "stored payload of {payload_len} bytes exceeds max_blob_bytes {}",
                self.config.max_blob_bytes()
            )));
        }
        Ok(payload_len)
    }

    /// Read a blob into `out_buf`, returning the number of bytes written.
    /// Rejects `out_buf.len() < declared_payload_len`. On any
    /// authentication failure no plaintext bytes are delivered and any
    /// bytes already placed in `out_buf` are zeroized.
    #[instrument(skip(self, out_buf), fields(blob = %name))]
    pub fn read(&self, name: &BlobName, mode: Mode, out_buf: &mut [u8]) -> Result<usize, StoreError> {
        let path = self.path_for(name);
        let frame = fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound
            } else {
                StoreError::Io(e)
            }
        })?;

        let plaintext = match mode {
            Mode::Plain => frame,
            Mode::Authenticated => {
                let (header, payload) = codec::parse(mode, &frame)?;
                let Header::Authenticated { mac: stored_mac } = header else {
                    unreachable!()
                };
                let mac_key = self
                    .pss
                    .get_mac_key()
                    .map_err(|e| StoreError::KeyUnavailable(e.to_string()))?;
                let computed = hmac_sha256(mac_key.expose_secret(), payload);
                if !ct_eq(&computed, &stored_mac) {
                    warn!(blob = %name, "authenticated blob failed MAC verification");
                    zero(out_buf);
                    return Err(StoreError::IntegrityMacMismatch);
                }
                payload.to_vec()
            }
            Mode::Sealed => {
                let (header, ciphertext) = codec::parse(mode, &frame)?;
                let Header::Sealed { nonce, tag } = header else {
                    unreachable!()
                };
                let sealing_key = self
                    .pss
                    .get_sealing_key()
                    .map_err(|e| StoreError::KeyUnavailable(e.to_string()))?;
                match aes_gcm_decrypt(sealing_key.expose_secret(), &nonce, ciphertext, &tag) {
                    Ok(plaintext) => plaintext,
                    Err(e) => {
                        warn!(blob = %name, "sealed blob failed AEAD verification");
                        zero(out_buf);
                        return Err(e);
                    }
                }
            }
        };

        if out_buf.len() < plaintext.len() {
            return Err(StoreError::BufferTooSmall {
                needed: plaintext.len(),
                available: out_buf.len(),
            });
        }
        out_buf[..plaintext.len()].copy_from_slice(&plaintext);
        debug!(blob = %name, bytes = plaintext.len(), "blob read");
        Ok(plaintext.len())
    }

    /// Write `in_buf` as a blob under `name`, replacing any existing frame.
    /// Rejects `in_buf.len() == 0` and `in_buf.len() > max_blob_bytes`.
    #[instrument(skip(self, in_buf), fields(blob = %name, bytes = in_buf.len()))]
    pub fn write(&self, name: &BlobName, mode: Mode, in_buf: &[u8]) -> Result<usize, StoreError> {
        if in_buf.is_empty() {
            return Err(StoreError::InvalidArgument(
                "payload must not be empty".into(),
            ));
        }
        if in_buf.len() > self.config.max_blob_bytes() {
            return Err(StoreError::InvalidArgument(format!(
                "payload of {} bytes exceeds max_blob_bytes {}",
                in_buf.len(),
                self.config.max_blob_bytes()
            )));
        }

        let frame = match mode {
            Mode::Plain => in_buf.to_vec(),
            Mode::Authenticated => {
                let mac_key = self
                    .pss
                    .get_mac_key()
                    .map_err(|e| StoreError::KeyUnavailable(e.to_string()))?;
                let mac = hmac_sha256(mac_key.expose_secret(), in_buf);
                codec::build_authenticated(&mac, in_buf)
            }
            Mode::Sealed => {
                // Persist the advanced nonce before the frame file is written: a
                // crash here leaves the nonce consumed but unused, which is
                // acceptable and never re-usable.
                let nonce: [u8; NONCE_LEN] = self.nonce_manager.next_nonce(self.pss.as_ref(), in_buf.len())?;
                let sealing_key = self
                    .pss
                    .get_sealing_key()
                    .map_err(|e| StoreError::KeyUnavailable(e.to_string()))?;
                let (ciphertext, tag): (Vec<u8>, [u8; TAG_LEN]) =
                    aes_gcm_encrypt(sealing_key.expose_secret(), &nonce, in_buf)?;
                codec::build_sealed(&nonce, &tag, &ciphertext)
            }
        };

        write_frame(&self.path_for(name), &frame)?;
        debug!(blob = %name, bytes = in_buf.len(), "blob written");
        Ok(in_buf.len())
    }
}

fn zero(buf: &mut [u8]) {
    for b in buf.iter_mut() {
        *b = 0;
    }
}

/// Write `contents` to `path` via temp file + rename rather than a plain
/// overwrite, so a crash mid-write never leaves a partially written frame
/// visible under `path`.
fn write_frame(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = tmp_path_for(path);
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Append `.tmp` to the full file name so distinct blob names that share a
/// stem (e.g. `cred.a` and `cred.b`) never collide on the same temp file.
fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
