//! CRC-32 accumulator shared by every block transfer.
//!
//! Values match zlib's `crc32()`: reflected polynomial 0x04C11DB7, with the
//! running value pre- and post-inverted on every update, so the accumulator
//! starts at zero and can be folded one byte at a time.

use crc::{Crc, CRC_32_ISO_HDLC};

pub const CRC32_POLYNOMIAL: u32 = 0x04C1_1DB7;

static CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Fold a single byte into a running checksum
pub fn crc32(crc: u32, data: u8) -> u32 {
    update(crc, &[data])
}

/// Fold a slice into a running checksum
pub fn update(crc: u32, data: &[u8]) -> u32 {
    // The digest re-reflects its initial value, undo that so `crc` is resumed as-is
    let mut digest = CRC32.digest_with_initial((!crc).reverse_bits());
    digest.update(data);
    digest.finalize()
}

/// Checksum of a complete block
pub fn checksum(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}
