//! CRC-32 over the payload region of a frame.
//!
//! The boards use the reflected IEEE polynomial (0xEDB88320) with the
//! running value seeded at `0xFFFFFFFF`, zlib-style: the seed is inverted on
//! entry and the result inverted on exit. Only payload bytes are covered;
//! header and trailer never are.

use crc32fast::Hasher;

/// Seed passed to the CRC engine for every frame.
pub const CRC_SEED: u32 = 0xFFFF_FFFF;

/// Size of the little-endian CRC trailer that follows the payload.
pub const TRAILER_SIZE: usize = 4;

/// Compute the trailer value for a payload.
pub fn checksum(payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new_with_initial(CRC_SEED);
    hasher.update(payload);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_string_vector() {
        assert_eq!(checksum(b"123456789"), 0xD202_D277);
    }

    #[test]
    fn empty_payload_is_inverted_seed() {
        // Zero-length payloads (shutdown, version request) still carry a trailer.
        assert_eq!(checksum(&[]), 0xFFFF_FFFF);
    }

    #[test]
    fn zero_bytes_do_not_move_the_register() {
        assert_eq!(checksum(&[0u8; 4]), 0xFFFF_FFFF);
    }

    #[test]
    fn text_payload_vector() {
        let mut payload = [0u8; 32];
        payload[..10].copy_from_slice(b"Hello H2B!");
        assert_eq!(checksum(&payload), 0x5C3F_FACD);
    }

    #[test]
    fn single_byte_change_changes_checksum() {
        let payload = [0x5Au8; 64];
        let base = checksum(&payload);
        for idx in 0..payload.len() {
            let mut flipped = payload;
            flipped[idx] ^= 0x01;
            assert_ne!(checksum(&flipped), base, "byte {idx}");
        }
    }
}
