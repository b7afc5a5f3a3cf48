//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Unified error type for blob store operations.

use thiserror::Error;

/// Errors returned by the blob store, the envelope codec, the nonce
/// manager, and the platform secret store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("blob not found")]
    NotFound,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("MAC verification failed")]
    IntegrityMacMismatch,

    #[error("AEAD tag verification failed")]
    IntegritySealMismatch,

    #[error("platform secret store refused to provide a key: {0}")]
    KeyUnavailable(String),

    #[error("sealed-mode nonce counter has permanently rolled over")]
    NonceRollover,

    #[error("read buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },
}

pub type Result<T> = std::result::Result<T, StoreError>;
