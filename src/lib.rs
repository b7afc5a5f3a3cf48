//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! # sdo-blobstore
//!
//! Secure blob storage layer for a device-onboarding stack (Intel SDO /
//! FIDO-DO family). A device persists long-lived credentials and protocol
//! state to local files; those files must survive untrusted filesystem
//! exposure under one of three caller-selected guarantees:
//!
//! - **Plain** — integrity depends on the filesystem only.
//! - **Authenticated** — HMAC-SHA-256 keyed MAC detects tampering.
//! - **Sealed** — AES-GCM authenticated encryption under a device-resident
//!   key, with a strictly non-repeating nonce.
//!
//! The onboarding protocol state machine, CLI, key-exchange, and network
//! transport are external collaborators and out of scope for this crate;
//! it only implements `size`/`read`/`write` over named blobs.
//!
//! ## Quick start
//!
//! ```
//! use sdo_blobstore::{BlobName, BlobStore, Mode, StoreConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dir = tempfile::tempdir()?;
//! let store = BlobStore::with_file_secret_store(StoreConfig::new(dir.path()))?;
//! let name = BlobName::new("device-credential")?;
//!
//! store.write(&name, Mode::Sealed, b"onboarding secret")?;
//!
//! let mut buf = [0u8; 64];
//! let n = store.read(&name, Mode::Sealed, &mut buf)?;
//! assert_eq!(&buf[..n], b"onboarding secret");
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`codec`] — Envelope Codec: the three on-disk frame layouts.
//! - [`crypto`] — Crypto Primitives binding: HMAC, AES-GCM, CSPRNG, ct_eq.
//! - [`nonce`] — Nonce Manager: sealed-mode nonce slot state machine.
//! - [`pss`] — Platform Secret Store trait and a file-backed test stub.
//! - [`store`] — Blob Store façade (`size`/`read`/`write`/`exists`).

pub mod blob_name;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod nonce;
pub mod pss;
pub mod secret;
pub mod store;

pub use blob_name::BlobName;
pub use codec::Mode;
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use nonce::{NonceManager, NonceSlotState};
pub use pss::{FileSecretStore, PlatformSecretStore};
pub use secret::Secret;
pub use store::BlobStore;
