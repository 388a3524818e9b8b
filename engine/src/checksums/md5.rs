//! MD5 (RFC 1321).

use super::buffer::BlockBuffer;
use crate::bits::{load_u32_le, rotl32, store_u32_le};

pub(crate) const BLOCK_SIZE: usize = 64;
pub(crate) const DIGEST_LEN: usize = 16;

const INITIAL_STATE: [u32; 4] = [0x6745_2301, 0xefcd_ab89, 0x98ba_dcfe, 0x1032_5476];

/// Per-round additive constants, `floor(abs(sin(i + 1)) * 2^32)`.
const K: [u32; 64] = [
    0xd76aa478, 0xe8c7b756, 0x242070db, 0xc1bdceee,
    0xf57c0faf, 0x4787c62a, 0xa8304613, 0xfd469501,
    0x698098d8, 0x8b44f7af, 0xffff5bb1, 0x895cd7be,
    0x6b901122, 0xfd987193, 0xa679438e, 0x49b40821,
    0xf61e2562, 0xc040b340, 0x265e5a51, 0xe9b6c7aa,
    0xd62f105d, 0x02441453, 0xd8a1e681, 0xe7d3fbc8,
    0x21e1cde6, 0xc33707d6, 0xf4d50d87, 0x455a14ed,
    0xa9e3e905, 0xfcefa3f8, 0x676f02d9, 0x8d2a4c8a,
    0xfffa3942, 0x8771f681, 0x6d9d6122, 0xfde5380c,
    0xa4beea44, 0x4bdecfa9, 0xf6bb4b60, 0xbebfbc70,
    0x289b7ec6, 0xeaa127fa, 0xd4ef3085, 0x04881d05,
    0xd9d4d039, 0xe6db99e5, 0x1fa27cf8, 0xc4ac5665,
    0xf4292244, 0x432aff97, 0xab9423a7, 0xfc93a039,
    0x655b59c3, 0x8f0ccc92, 0xffeff47d, 0x85845dd1,
    0x6fa87e4f, 0xfe2ce6e0, 0xa3014314, 0x4e0811a1,
    0xf7537e82, 0xbd3af235, 0x2ad7d2bb, 0xeb86d391,
];

/// Left-rotate amounts, four per 16-round stage.
const SHIFTS: [[u32; 4]; 4] = [[7, 12, 17, 22], [5, 9, 14, 20], [4, 11, 16, 23], [6, 10, 15, 21]];

/// Streaming MD5 state.
#[derive(Clone)]
pub struct Md5 {
    state: [u32; 4],
    buffer: BlockBuffer<BLOCK_SIZE>,
    digest: Option<[u8; DIGEST_LEN]>,
}

impl Md5 {
    pub fn new() -> Self {
        Md5 {
            state: INITIAL_STATE,
            buffer: BlockBuffer::new(),
            digest: None,
        }
    }

    pub fn init(&mut self) {
        self.state = INITIAL_STATE;
        self.buffer.reset();
        self.digest = None;
    }

    pub fn update(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        if self.digest.is_some() {
            self.init();
        }
        self.buffer.feed(data, |block| compress(&mut self.state, block));
    }

    pub fn finalize(&mut self) -> [u8; DIGEST_LEN] {
        if let Some(digest) = self.digest {
            return digest;
        }

        let bit_len = self.buffer.total_len().wrapping_mul(8);
        self.buffer
            .pad(&bit_len.to_le_bytes(), |block| compress(&mut self.state, block));

        let mut digest = [0u8; DIGEST_LEN];
        store_u32_le(&self.state, &mut digest);
        self.digest = Some(digest);
        digest
    }

    pub fn total_len(&self) -> u64 {
        self.buffer.total_len()
    }
}

impl Default for Md5 {
    fn default() -> Self {
        Self::new()
    }
}

fn compress(state: &mut [u32; 4], block: &[u8]) {
    let m: [u32; 16] = load_u32_le(block);
    let [mut a, mut b, mut c, mut d] = *state;

    for i in 0..64 {
        let (f, g) = match i / 16 {
            0 => ((b & c) | (!b & d), i),
            1 => ((d & b) | (!d & c), (5 * i + 1) % 16),
            2 => (b ^ c ^ d, (3 * i + 5) % 16),
            _ => (c ^ (b | !d), (7 * i) % 16),
        };

        let rotated = rotl32(
            a.wrapping_add(f).wrapping_add(K[i]).wrapping_add(m[g]),
            SHIFTS[i / 16][i % 4],
        );
        a = d;
        d = c;
        c = b;
        b = b.wrapping_add(rotated);
    }

    state[0] = state[0].wrapping_add(a);
    state[1] = state[1].wrapping_add(b);
    state[2] = state[2].wrapping_add(c);
    state[3] = state[3].wrapping_add(d);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn md5_hex(data: &[u8]) -> String {
        let mut md5 = Md5::new();
        md5.update(data);
        hex::encode(md5.finalize())
    }

    #[test]
    fn test_rfc1321_vectors() {
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_hex(b"a"), "0cc175b9c0f1b6a831c399e269772661");
        assert_eq!(md5_hex(b"abc"), "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(md5_hex(b"message digest"), "f96b697d7cb7938d525a2f31aaf161d0");
        assert_eq!(
            md5_hex(b"12345678901234567890123456789012345678901234567890123456789012345678901234567890"),
            "57edf4a22be3c955ac49da2e2107b67a"
        );
    }

    #[test]
    fn test_padding_boundaries_match_reference() {
        // 55, 56 and 64 bytes straddle the one/two padding block boundary
        for len in [55usize, 56, 57, 63, 64, 65, 119, 120, 128] {
            let data = vec![b'x'; len];
            assert_eq!(
                md5_hex(&data),
                format!("{:x}", md5::compute(&data)),
                "length {}",
                len
            );
        }
    }
}
