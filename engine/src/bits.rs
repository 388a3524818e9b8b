//! Bit and word primitives shared by the hash engines.
//!
//! All engines operate on fixed-width words loaded from, and stored to,
//! byte buffers in a specific byte order: MD5 is little-endian, the SHA-2
//! family and the CRC32 digest are big-endian.

#[inline(always)]
pub(crate) fn rotl32(x: u32, n: u32) -> u32 {
    x.rotate_left(n)
}

#[inline(always)]
pub(crate) fn rotr32(x: u32, n: u32) -> u32 {
    x.rotate_right(n)
}

#[inline(always)]
pub(crate) fn rotr64(x: u64, n: u32) -> u64 {
    x.rotate_right(n)
}

/// Load `N` little-endian 32-bit words from the start of `bytes`.
///
/// `bytes` must hold at least `4 * N` bytes.
#[inline]
pub(crate) fn load_u32_le<const N: usize>(bytes: &[u8]) -> [u32; N] {
    let mut words = [0u32; N];
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
        *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    words
}

/// Load `N` big-endian 32-bit words from the start of `bytes`.
#[inline]
pub(crate) fn load_u32_be<const N: usize>(bytes: &[u8]) -> [u32; N] {
    let mut words = [0u32; N];
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
        *word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    words
}

/// Load `N` big-endian 64-bit words from the start of `bytes`.
#[inline]
pub(crate) fn load_u64_be<const N: usize>(bytes: &[u8]) -> [u64; N] {
    let mut words = [0u64; N];
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(8)) {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(chunk);
        *word = u64::from_be_bytes(raw);
    }
    words
}

/// Store words little-endian into `out`, stopping when either side runs out.
pub(crate) fn store_u32_le(words: &[u32], out: &mut [u8]) {
    for (chunk, word) in out.chunks_mut(4).zip(words) {
        let bytes = word.to_le_bytes();
        chunk.copy_from_slice(&bytes[..chunk.len()]);
    }
}

/// Store words big-endian into `out`, stopping when either side runs out.
///
/// A short final chunk receives the leading bytes of its word, which is how
/// the truncated SHA-2 variants are produced.
pub(crate) fn store_u32_be(words: &[u32], out: &mut [u8]) {
    for (chunk, word) in out.chunks_mut(4).zip(words) {
        let bytes = word.to_be_bytes();
        chunk.copy_from_slice(&bytes[..chunk.len()]);
    }
}

/// 64-bit counterpart of [`store_u32_be`].
pub(crate) fn store_u64_be(words: &[u64], out: &mut [u8]) {
    for (chunk, word) in out.chunks_mut(8).zip(words) {
        let bytes = word.to_be_bytes();
        chunk.copy_from_slice(&bytes[..chunk.len()]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotations() {
        assert_eq!(rotl32(0x8000_0001, 1), 0x0000_0003);
        assert_eq!(rotr32(0x0000_0003, 1), 0x8000_0001);
        assert_eq!(rotr64(1, 1), 0x8000_0000_0000_0000);
    }

    #[test]
    fn test_load_byte_orders() {
        let bytes = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        assert_eq!(load_u32_le::<2>(&bytes), [0x04030201, 0x08070605]);
        assert_eq!(load_u32_be::<2>(&bytes), [0x01020304, 0x05060708]);
        assert_eq!(load_u64_be::<1>(&bytes), [0x0102030405060708]);
    }

    #[test]
    fn test_store_truncates_last_word() {
        let mut out = [0u8; 6];
        store_u32_be(&[0xAABBCCDD, 0x11223344], &mut out);
        assert_eq!(out, [0xAA, 0xBB, 0xCC, 0xDD, 0x11, 0x22]);

        let mut out = [0u8; 4];
        store_u32_le(&[0xAABBCCDD], &mut out);
        assert_eq!(out, [0xDD, 0xCC, 0xBB, 0xAA]);

        let mut out = [0u8; 12];
        store_u64_be(&[0x0102030405060708, 0x1112131415161718], &mut out);
        assert_eq!(&out[8..], &[0x11, 0x12, 0x13, 0x14]);
    }
}
