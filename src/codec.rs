//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Envelope Codec — bijective encoding of `(Mode, payload)` to/from the
//! on-disk frame layouts. No I/O, no crypto: purely byte layout and length
//! arithmetic, so the three formats stay bit-exact for interop.
//!
//! ```text
//! Plain:          <payload bytes>
//! Authenticated:  <hmac:32> <len:u32 be> <payload:len>
//! Sealed:         <nonce:12> <tag:16> <len:u32 be> <ciphertext:len>
//! ```
//!
//! The MAC in Authenticated mode covers only `payload`, not the length
//! prefix, and the Sealed mode's GCM tag authenticates only the ciphertext.
//! Both are matched intentionally for interop with existing on-disk blobs
//! rather than hardened.

use crate::error::StoreError;

pub const MAC_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const LEN_PREFIX: usize = 4;

/// Storage mode selected by the caller per blob operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Integrity depends on the filesystem only.
    Plain,
    /// HMAC-SHA-256 keyed MAC over the payload.
    Authenticated,
    /// AES-GCM authenticated encryption under the device sealing key.
    Sealed,
}

impl Mode {
    /// Bytes of fixed-size header preceding the length-prefixed payload
    /// region, or `0` for Plain (which has no header at all).
    fn fixed_header_len(self) -> usize {
        match self {
            Mode::Plain => 0,
            Mode::Authenticated => MAC_LEN,
            Mode::Sealed => NONCE_LEN + TAG_LEN,
        }
    }
}

/// The header fields recovered from a parsed frame, mode-specific.
pub enum Header {
    Plain,
    Authenticated { mac: [u8; MAC_LEN] },
    Sealed {
        nonce: [u8; NONCE_LEN],
        tag: [u8; TAG_LEN],
    },
}

/// Assemble an Authenticated-mode frame: `mac ‖ len ‖ payload`.
pub fn build_authenticated(mac: &[u8; MAC_LEN], payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(MAC_LEN + LEN_PREFIX + payload.len());
    frame.extend_from_slice(mac);
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Assemble a Sealed-mode frame: `nonce ‖ tag ‖ len ‖ ciphertext`.
pub fn build_sealed(nonce: &[u8; NONCE_LEN], tag: &[u8; TAG_LEN], ciphertext: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(NONCE_LEN + TAG_LEN + LEN_PREFIX + ciphertext.len());
    frame.extend_from_slice(nonce);
    frame.extend_from_slice(tag);
    frame.extend_from_slice(&(ciphertext.len() as u32).to_be_bytes());
    frame.extend_from_slice(ciphertext);
    frame
}

/// Parse a frame into its header fields and payload slice.
///
/// Fails with [`StoreError::Malformed`] if the frame is shorter than the
/// fixed header plus length field, or if the declared length disagrees with
/// the remaining byte count.
pub fn parse(mode: Mode, bytes: &[u8]) -> Result<(Header, &[u8]), StoreError> {
    if mode == Mode::Plain {
        return Ok((Header::Plain, bytes));
    }

    let fixed = mode.fixed_header_len();
    if bytes.len() < fixed + LEN_PREFIX {
        return Err(StoreError::Malformed(format!(
            "frame of {} bytes is shorter than the {}-byte header",
            bytes.len(),
            fixed + LEN_PREFIX
        )));
    }

    let len_bytes = &bytes[fixed..fixed + LEN_PREFIX];
    let declared_len = u32::from_be_bytes(len_bytes.try_into().unwrap()) as usize;
    let payload = &bytes[fixed + LEN_PREFIX..];
    if payload.len() != declared_len {
        return Err(StoreError::Malformed(format!(
            "declared length {} does not match remaining {} bytes",
            declared_len,
            payload.len()
        )));
    }

    let header = match mode {
        Mode::Plain => unreachable!(),
        Mode::Authenticated => Header::Authenticated {
            mac: bytes[..MAC_LEN].try_into().unwrap(),
        },
        Mode::Sealed => Header::Sealed {
            nonce: bytes[..NONCE_LEN].try_into().unwrap(),
            tag: bytes[NONCE_LEN..NONCE_LEN + TAG_LEN].try_into().unwrap(),
        },
    };
    Ok((header, payload))
}

/// Recover the payload length a frame of `frame_total_len` bytes declares,
/// without reading the frame itself. Returns `0` for a non-existent file
/// (`frame_total_len == 0` is treated as "no file" by the caller before this
/// is invoked); returns [`StoreError::Malformed`] if the total length is
/// shorter than the mode's fixed overhead.
pub fn size_of(mode: Mode, frame_total_len: usize) -> Result<usize, StoreError> {
    match mode {
        Mode::Plain => Ok(frame_total_len),
        Mode::Authenticated | Mode::Sealed => {
            let overhead = mode.fixed_header_len() + LEN_PREFIX;
            if frame_total_len < overhead {
                return Err(StoreError::Malformed(format!(
                    "frame of {frame_total_len} bytes is shorter than the {overhead}-byte overhead"
                )));
            }
            Ok(frame_total_len - overhead)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_roundtrip() {
        let payload = b"hello";
        let (header, slice) = parse(Mode::Plain, payload).unwrap();
        assert!(matches!(header, Header::Plain));
        assert_eq!(slice, payload);
    }

    #[test]
    fn authenticated_roundtrip() {
        let mac = [0xAA; MAC_LEN];
        let frame = build_authenticated(&mac, b"payload");
        let (header, payload) = parse(Mode::Authenticated, &frame).unwrap();
        match header {
            Header::Authenticated { mac: parsed_mac } => assert_eq!(parsed_mac, mac),
            _ => panic!("wrong header"),
        }
        assert_eq!(payload, b"payload");
    }

    #[test]
    fn sealed_roundtrip() {
        let nonce = [1u8; NONCE_LEN];
        let tag = [2u8; TAG_LEN];
        let frame = build_sealed(&nonce, &tag, b"ciphertext");
        let (header, ct) = parse(Mode::Sealed, &frame).unwrap();
        match header {
            Header::Sealed {
                nonce: parsed_nonce,
                tag: parsed_tag,
            } => {
                assert_eq!(parsed_nonce, nonce);
                assert_eq!(parsed_tag, tag);
            }
            _ => panic!("wrong header"),
        }
        assert_eq!(ct, b"ciphertext");
    }

    #[test]
    fn truncated_frame_is_malformed() {
        let short = vec![0u8; MAC_LEN]; // missing length prefix and payload
        assert!(matches!(
            parse(Mode::Authenticated, &short),
            Err(StoreError::Malformed(_))
        ));
    }

    #[test]
    fn length_mismatch_is_malformed() {
        let mut frame = build_authenticated(&[0u8; MAC_LEN], b"payload");
        // Corrupt the declared length without touching the trailing payload bytes.
        let len_off = MAC_LEN;
        frame[len_off..len_off + LEN_PREFIX].copy_from_slice(&999u32.to_be_bytes());
        assert!(matches!(
            parse(Mode::Authenticated, &frame),
            Err(StoreError::Malformed(_))
        ));
    }

    #[test]
    fn size_of_absent_and_corrupt() {
        assert_eq!(size_of(Mode::Plain, 0).unwrap(), 0);
        assert_eq!(size_of(Mode::Authenticated, MAC_LEN + LEN_PREFIX + 10).unwrap(), 10);
        assert!(size_of(Mode::Authenticated, MAC_LEN).is_err());
    }
}
