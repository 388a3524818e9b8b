//! SHA-224 and SHA-256 (FIPS 180-4), sharing one 32-bit compression function.

use super::buffer::BlockBuffer;
use crate::bits::{load_u32_be, rotr32, store_u32_be};

pub(crate) const BLOCK_SIZE: usize = 64;

const K: [u32; 64] = [
    0x428a2f98, 0x71374491, 0xb5c0fbcf, 0xe9b5dba5,
    0x3956c25b, 0x59f111f1, 0x923f82a4, 0xab1c5ed5,
    0xd807aa98, 0x12835b01, 0x243185be, 0x550c7dc3,
    0x72be5d74, 0x80deb1fe, 0x9bdc06a7, 0xc19bf174,
    0xe49b69c1, 0xefbe4786, 0x0fc19dc6, 0x240ca1cc,
    0x2de92c6f, 0x4a7484aa, 0x5cb0a9dc, 0x76f988da,
    0x983e5152, 0xa831c66d, 0xb00327c8, 0xbf597fc7,
    0xc6e00bf3, 0xd5a79147, 0x06ca6351, 0x14292967,
    0x27b70a85, 0x2e1b2138, 0x4d2c6dfc, 0x53380d13,
    0x650a7354, 0x766a0abb, 0x81c2c92e, 0x92722c85,
    0xa2bfe8a1, 0xa81a664b, 0xc24b8b70, 0xc76c51a3,
    0xd192e819, 0xd6990624, 0xf40e3585, 0x106aa070,
    0x19a4c116, 0x1e376c08, 0x2748774c, 0x34b0bcb5,
    0x391c0cb3, 0x4ed8aa4a, 0x5b9cca4f, 0x682e6ff3,
    0x748f82ee, 0x78a5636f, 0x84c87814, 0x8cc70208,
    0x90befffa, 0xa4506ceb, 0xbef9a3f7, 0xc67178f2,
];

const SHA224_INITIAL: [u32; 8] = [
    0xc1059ed8, 0x367cd507, 0x3070dd17, 0xf70e5939,
    0xffc00b31, 0x68581511, 0x64f98fa7, 0xbefa4fa4,
];

const SHA256_INITIAL: [u32; 8] = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a,
    0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
];

/// Which member of the 32-bit SHA-2 family a [`Sha2_32`] computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sha2_32Variant {
    Sha224,
    Sha256,
}

impl Sha2_32Variant {
    fn initial_state(self) -> [u32; 8] {
        match self {
            Self::Sha224 => SHA224_INITIAL,
            Self::Sha256 => SHA256_INITIAL,
        }
    }

    pub(crate) fn digest_len(self) -> usize {
        match self {
            Self::Sha224 => 28,
            Self::Sha256 => 32,
        }
    }
}

/// Streaming SHA-224/SHA-256 state.
///
/// The full 32-byte state is always computed; SHA-224 emits its first 28 bytes.
#[derive(Clone)]
pub struct Sha2_32 {
    variant: Sha2_32Variant,
    state: [u32; 8],
    buffer: BlockBuffer<BLOCK_SIZE>,
    digest: Option<[u8; 32]>,
}

impl Sha2_32 {
    pub fn new(variant: Sha2_32Variant) -> Self {
        Sha2_32 {
            variant,
            state: variant.initial_state(),
            buffer: BlockBuffer::new(),
            digest: None,
        }
    }

    pub fn sha224() -> Self {
        Self::new(Sha2_32Variant::Sha224)
    }

    pub fn sha256() -> Self {
        Self::new(Sha2_32Variant::Sha256)
    }

    pub fn variant(&self) -> Sha2_32Variant {
        self.variant
    }

    pub fn init(&mut self) {
        self.state = self.variant.initial_state();
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

    /// Returns the digest, `variant.digest_len()` bytes long.
    pub fn finalize(&mut self) -> &[u8] {
        let len = self.variant.digest_len();
        let full = self.digest.get_or_insert_with(|| {
            let bit_len = self.buffer.total_len().wrapping_mul(8);
            self.buffer
                .pad(&bit_len.to_be_bytes(), |block| compress(&mut self.state, block));

            let mut full = [0u8; 32];
            store_u32_be(&self.state, &mut full);
            full
        });
        &full[..len]
    }

    pub fn total_len(&self) -> u64 {
        self.buffer.total_len()
    }
}

#[inline(always)]
fn big_sigma0(x: u32) -> u32 {
    rotr32(x, 2) ^ rotr32(x, 13) ^ rotr32(x, 22)
}

#[inline(always)]
fn big_sigma1(x: u32) -> u32 {
    rotr32(x, 6) ^ rotr32(x, 11) ^ rotr32(x, 25)
}

#[inline(always)]
fn small_sigma0(x: u32) -> u32 {
    rotr32(x, 7) ^ rotr32(x, 18) ^ (x >> 3)
}

#[inline(always)]
fn small_sigma1(x: u32) -> u32 {
    rotr32(x, 17) ^ rotr32(x, 19) ^ (x >> 10)
}

#[inline(always)]
fn ch(x: u32, y: u32, z: u32) -> u32 {
    (x & y) ^ (!x & z)
}

#[inline(always)]
fn maj(x: u32, y: u32, z: u32) -> u32 {
    (x & y) ^ (x & z) ^ (y & z)
}

fn compress(state: &mut [u32; 8], block: &[u8]) {
    let mut w = [0u32; 64];
    w[..16].copy_from_slice(&load_u32_be::<16>(block));
    for t in 16..64 {
        w[t] = small_sigma1(w[t - 2])
            .wrapping_add(w[t - 7])
            .wrapping_add(small_sigma0(w[t - 15]))
            .wrapping_add(w[t - 16]);
    }

    let [mut a, mut b, mut c, mut d, mut e, mut f, mut g, mut h] = *state;

    for t in 0..64 {
        let t1 = h
            .wrapping_add(big_sigma1(e))
            .wrapping_add(ch(e, f, g))
            .wrapping_add(K[t])
            .wrapping_add(w[t]);
        let t2 = big_sigma0(a).wrapping_add(maj(a, b, c));
        h = g;
        g = f;
        f = e;
        e = d.wrapping_add(t1);
        d = c;
        c = b;
        b = a;
        a = t1.wrapping_add(t2);
    }

    for (word, value) in state.iter_mut().zip([a, b, c, d, e, f, g, h]) {
        *word = word.wrapping_add(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::Digest as _;

    fn sha_hex(variant: Sha2_32Variant, data: &[u8]) -> String {
        let mut hasher = Sha2_32::new(variant);
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    #[test]
    fn test_sha256_vectors() {
        assert_eq!(
            sha_hex(Sha2_32Variant::Sha256, b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            sha_hex(Sha2_32Variant::Sha256, b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            sha_hex(
                Sha2_32Variant::Sha256,
                b"abcdbcdecdefdefgefghfghighijhijkijkljklmklmnlmnomnopnopq"
            ),
            "248d6a61d20638b8e5c026930c3e6039a33ce45964ff2167f6ecedd419db06c1"
        );
    }

    #[test]
    fn test_sha224_vectors() {
        assert_eq!(
            sha_hex(Sha2_32Variant::Sha224, b"abc"),
            "23097d223405d8228642a477bda255b32aadbce4bda0b3f7e36c9da7"
        );
        assert_eq!(
            sha_hex(Sha2_32Variant::Sha224, b""),
            "d14a028c2a3a2bc9476102bb288234c415a2b01f828ea62ac5b3e42f"
        );
    }

    #[test]
    fn test_matches_reference_across_padding_boundaries() {
        for len in [0usize, 1, 55, 56, 63, 64, 65, 127, 128, 1000] {
            let data: Vec<u8> = (0..len).map(|i| (i * 31 + 7) as u8).collect();
            assert_eq!(
                sha_hex(Sha2_32Variant::Sha256, &data),
                hex::encode(sha2::Sha256::digest(&data)),
                "sha256 length {}",
                len
            );
            assert_eq!(
                sha_hex(Sha2_32Variant::Sha224, &data),
                hex::encode(sha2::Sha224::digest(&data)),
                "sha224 length {}",
                len
            );
        }
    }

    #[test]
    fn test_truncated_variant_is_prefix_of_full_state() {
        let mut hasher = Sha2_32::sha224();
        hasher.update(b"the truncated digest is a prefix of the computed state");
        let digest = hasher.finalize().to_vec();
        assert_eq!(digest.len(), 28);
        let full = hasher.digest.expect("finalized");
        assert_eq!(&full[..28], &digest[..]);
    }
}
