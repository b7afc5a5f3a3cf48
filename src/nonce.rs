//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Nonce Manager — delivers a fresh 12-byte nonce for each sealed
//! encryption such that across the device's lifetime no nonce is ever
//! reused with the sealing key.
//!
//! State machine per device: `Uninitialized -> Active -> Exhausted`. The
//! first sealed write draws a random base nonce; every later sealed write
//! advances the counter by the number of GCM blocks the payload consumes
//! (at least 2 once a single encryption could span more than 2^32 blocks,
//! to keep GCM's internal 32-bit block counter from ever overlapping
//! between two encryptions). Once a further advance would traverse the
//! full 2^96 cycle back to the base, the slot latches `Exhausted`
//! permanently: this is on-disk state, not process memory, so it survives
//! reboots.

use crate::codec::NONCE_LEN;
use crate::crypto::random_bytes;
use crate::error::StoreError;
use crate::pss::PlatformSecretStore;
use std::sync::Mutex;

const MASK96: u128 = (1u128 << 96) - 1;
const CYCLE: u128 = 1u128 << 96;

fn to_u128(bytes: &[u8; NONCE_LEN]) -> u128 {
    let mut buf = [0u8; 16];
    buf[4..].copy_from_slice(bytes);
    u128::from_be_bytes(buf)
}

fn from_u128(value: u128) -> [u8; NONCE_LEN] {
    let bytes = (value & MASK96).to_be_bytes();
    bytes[4..].try_into().unwrap()
}

/// Persistent state of the nonce slot, as read from / written to the
/// platform secret store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceSlotState {
    /// No sealed write has ever happened on this device.
    Uninitialized,
    /// `base` was fixed on first use; `counter` advances monotonically.
    Active {
        base: [u8; NONCE_LEN],
        counter: [u8; NONCE_LEN],
    },
    /// The counter has traversed the full cycle back to `base`. Terminal.
    Exhausted {
        base: [u8; NONCE_LEN],
        counter: [u8; NONCE_LEN],
    },
}

/// Serializes sealed-mode nonce advances: exactly one may be in flight at a
/// time, spanning `read slot -> compute counter' -> persist slot -> emit
/// nonce`.
pub struct NonceManager {
    lock: Mutex<()>,
}

impl Default for NonceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NonceManager {
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
        }
    }

    /// Produce the next nonce for a sealed write of `payload_len` bytes,
    /// persisting the advanced counter to `pss` before returning it.
    ///
    /// The persist-before-emit ordering is the correctness-critical
    /// property here: a crash between persisting the counter and writing
    /// the frame file must never allow that counter to be reused, so the
    /// nonce is considered consumed the moment this call returns `Ok`,
    /// regardless of whether the caller subsequently manages to write the
    /// frame.
    pub fn next_nonce(
        &self,
        pss: &dyn PlatformSecretStore,
        payload_len: usize,
    ) -> Result<[u8; NONCE_LEN], StoreError> {
        let _guard = self.lock.lock().expect("nonce slot mutex poisoned");

        match pss.nonce_slot_read()? {
            NonceSlotState::Exhausted { .. } => Err(StoreError::NonceRollover),
            NonceSlotState::Uninitialized => {
                let mut base = [0u8; NONCE_LEN];
                random_bytes(&mut base);
                let state = NonceSlotState::Active {
                    base,
                    counter: base,
                };
                pss.nonce_slot_write(&state)?;
                Ok(base)
            }
            NonceSlotState::Active { base, counter } => {
                let blocks = payload_len.div_ceil(16).max(1) as u128;
                let step = if blocks < (1u128 << 32) { 1u128 } else { 2u128 };

                let base_num = to_u128(&base);
                let counter_num = to_u128(&counter);
                let distance = counter_num.wrapping_sub(base_num) & MASK96;
                let new_distance = distance + step;

                if new_distance >= CYCLE {
                    pss.nonce_slot_write(&NonceSlotState::Exhausted { base, counter })?;
                    return Err(StoreError::NonceRollover);
                }

                let new_counter = from_u128(base_num + new_distance);
                pss.nonce_slot_write(&NonceSlotState::Active {
                    base,
                    counter: new_counter,
                })?;
                Ok(new_counter)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pss::FileSecretStore;
    use tempfile::tempdir;

    #[test]
    fn first_write_initializes_slot() {
        let dir = tempdir().unwrap();
        let pss = FileSecretStore::new(dir.path()).unwrap();
        let nm = NonceManager::new();

        let nonce = nm.next_nonce(&pss, 16).unwrap();
        match pss.nonce_slot_read().unwrap() {
            NonceSlotState::Active { base, counter } => {
                assert_eq!(base, nonce);
                assert_eq!(counter, nonce);
            }
            other => panic!("expected Active, got {other:?}"),
        }
    }

    #[test]
    fn second_write_advances_by_block_count() {
        let dir = tempdir().unwrap();
        let pss = FileSecretStore::new(dir.path()).unwrap();
        let nm = NonceManager::new();

        let first = nm.next_nonce(&pss, 16).unwrap(); // 1 block
        let second = nm.next_nonce(&pss, 32).unwrap(); // 2 blocks, still step 1
        assert_eq!(to_u128(&second), to_u128(&first) + 1);
    }

    #[test]
    fn rollover_fences_further_writes() {
        let dir = tempdir().unwrap();
        let pss = FileSecretStore::new(dir.path()).unwrap();
        let nm = NonceManager::new();

        let base = [0u8; NONCE_LEN];
        let mut counter = [0xFFu8; NONCE_LEN];
        counter[NONCE_LEN - 1] = 0xFE; // base=0, counter = FFF...FFE
        pss.nonce_slot_write(&NonceSlotState::Active { base, counter })
            .unwrap();

        let nonce = nm.next_nonce(&pss, 16).unwrap();
        assert_eq!(nonce, [0xFFu8; NONCE_LEN]);

        let result = nm.next_nonce(&pss, 16);
        assert!(matches!(result, Err(StoreError::NonceRollover)));
        assert!(matches!(
            pss.nonce_slot_read().unwrap(),
            NonceSlotState::Exhausted { .. }
        ));

        // Latched permanently.
        assert!(matches!(
            nm.next_nonce(&pss, 16),
            Err(StoreError::NonceRollover)
        ));
    }

    #[test]
    fn nonces_are_pairwise_distinct_across_many_writes() {
        let dir = tempdir().unwrap();
        let pss = FileSecretStore::new(dir.path()).unwrap();
        let nm = NonceManager::new();

        let mut seen = std::collections::HashSet::new();
        for _ in 0..64 {
            let nonce = nm.next_nonce(&pss, 16).unwrap();
            assert!(seen.insert(nonce), "nonce reused: {nonce:?}");
        }
    }
}
