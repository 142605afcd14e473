// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Unsigned LEB128 decoding for 32-bit quantities.

use crate::errors::{WasmError, WasmResult};

/// Shift at which the fifth (last legal) byte of a 32-bit varint starts.
const LAST_BYTE_SHIFT: u32 = 28;

/// Largest payload the fifth byte may carry.
const LAST_BYTE_MAX: u32 = 3;

/// Decodes an unsigned LEB128 value starting at `*pos`.
///
/// On success `*pos` points just past the terminating byte. On failure the
/// position is left wherever decoding stopped; callers abort the whole parse
/// in that case so the value is never observed.
///
/// # Errors
/// * `Malformed` if the input ends before a terminating byte
/// * `Malformed` if the value does not fit the accepted 32-bit range
pub fn parse_varint(bytes: &[u8], pos: &mut usize) -> WasmResult<u32> {
    let mut shift = 0u32;
    let mut total = 0u32;

    while let Some(&byte) = bytes.get(*pos) {
        *pos += 1;
        let value = u32::from(byte & 0x7f);
        if shift == LAST_BYTE_SHIFT && value > LAST_BYTE_MAX {
            return Err(WasmError::Malformed(format!(
                "varint overflow at offset {}",
                *pos - 1
            )));
        }
        total |= value << shift;
        if byte & 0x80 == 0 {
            return Ok(total);
        }
        shift += 7;
        if shift > LAST_BYTE_SHIFT {
            return Err(WasmError::Malformed(format!(
                "varint longer than 5 bytes at offset {}",
                *pos - 1
            )));
        }
    }

    Err(WasmError::Malformed(format!(
        "truncated varint at offset {}",
        *pos
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_byte_value() {
        let bytes = [0xAC, 0x02];
        let mut pos = 0;
        assert_eq!(parse_varint(&bytes, &mut pos).unwrap(), 300);
        assert_eq!(pos, 2);
    }

    #[test]
    fn test_single_byte_and_trailing_data() {
        let bytes = [0x05, 0xFF];
        let mut pos = 0;
        assert_eq!(parse_varint(&bytes, &mut pos).unwrap(), 5);
        assert_eq!(pos, 1);
    }

    #[test]
    fn test_decodes_from_offset() {
        let bytes = [0x00, 0x00, 0xAC, 0x02];
        let mut pos = 2;
        assert_eq!(parse_varint(&bytes, &mut pos).unwrap(), 300);
        assert_eq!(pos, 4);
    }

    #[test]
    fn test_five_byte_value_within_range() {
        let bytes = [0xFF, 0xFF, 0xFF, 0xFF, 0x03];
        let mut pos = 0;
        assert_eq!(parse_varint(&bytes, &mut pos).unwrap(), 0x3FFF_FFFF);
        assert_eq!(pos, 5);
    }

    #[test]
    fn test_fifth_byte_overflow() {
        for last in [0x04u8, 0x0F, 0x1F] {
            let bytes = [0xFF, 0xFF, 0xFF, 0xFF, last];
            let mut pos = 0;
            let result = parse_varint(&bytes, &mut pos);
            assert!(
                matches!(result, Err(WasmError::Malformed(ref msg)) if msg.contains("overflow")),
                "fifth byte {:#x} should overflow",
                last
            );
        }
    }

    #[test]
    fn test_too_many_continuation_bytes() {
        let bytes = [0x80, 0x80, 0x80, 0x80, 0x80, 0x00];
        let mut pos = 0;
        assert!(parse_varint(&bytes, &mut pos).is_err());
    }

    #[test]
    fn test_truncated_input() {
        let mut pos = 0;
        assert!(parse_varint(&[0x80, 0x80], &mut pos).is_err());

        let mut pos = 0;
        assert!(parse_varint(&[], &mut pos).is_err());
    }
}
