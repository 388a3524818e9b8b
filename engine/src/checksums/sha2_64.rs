//! SHA-384 and SHA-512 (FIPS 180-4), sharing one 64-bit compression function.
//!
//! The 128-bit message length field only ever carries the low 64 bits of the
//! bit count; messages of 2^64 bits or more produce non-standard digests.

use super::buffer::BlockBuffer;
use crate::bits::{load_u64_be, rotr64, store_u64_be};

pub(crate) const BLOCK_SIZE: usize = 128;

const K: [u64; 80] = [
    0x428a2f98d728ae22, 0x7137449123ef65cd,
    0xb5c0fbcfec4d3b2f, 0xe9b5dba58189dbbc,
    0x3956c25bf348b538, 0x59f111f1b605d019,
    0x923f82a4af194f9b, 0xab1c5ed5da6d8118,
    0xd807aa98a3030242, 0x12835b0145706fbe,
    0x243185be4ee4b28c, 0x550c7dc3d5ffb4e2,
    0x72be5d74f27b896f, 0x80deb1fe3b1696b1,
    0x9bdc06a725c71235, 0xc19bf174cf692694,
    0xe49b69c19ef14ad2, 0xefbe4786384f25e3,
    0x0fc19dc68b8cd5b5, 0x240ca1cc77ac9c65,
    0x2de92c6f592b0275, 0x4a7484aa6ea6e483,
    0x5cb0a9dcbd41fbd4, 0x76f988da831153b5,
    0x983e5152ee66dfab, 0xa831c66d2db43210,
    0xb00327c898fb213f, 0xbf597fc7beef0ee4,
    0xc6e00bf33da88fc2, 0xd5a79147930aa725,
    0x06ca6351e003826f, 0x142929670a0e6e70,
    0x27b70a8546d22ffc, 0x2e1b21385c26c926,
    0x4d2c6dfc5ac42aed, 0x53380d139d95b3df,
    0x650a73548baf63de, 0x766a0abb3c77b2a8,
    0x81c2c92e47edaee6, 0x92722c851482353b,
    0xa2bfe8a14cf10364, 0xa81a664bbc423001,
    0xc24b8b70d0f89791, 0xc76c51a30654be30,
    0xd192e819d6ef5218, 0xd69906245565a910,
    0xf40e35855771202a, 0x106aa07032bbd1b8,
    0x19a4c116b8d2d0c8, 0x1e376c085141ab53,
    0x2748774cdf8eeb99, 0x34b0bcb5e19b48a8,
    0x391c0cb3c5c95a63, 0x4ed8aa4ae3418acb,
    0x5b9cca4f7763e373, 0x682e6ff3d6b2b8a3,
    0x748f82ee5defb2fc, 0x78a5636f43172f60,
    0x84c87814a1f0ab72, 0x8cc702081a6439ec,
    0x90befffa23631e28, 0xa4506cebde82bde9,
    0xbef9a3f7b2c67915, 0xc67178f2e372532b,
    0xca273eceea26619c, 0xd186b8c721c0c207,
    0xeada7dd6cde0eb1e, 0xf57d4f7fee6ed178,
    0x06f067aa72176fba, 0x0a637dc5a2c898a6,
    0x113f9804bef90dae, 0x1b710b35131c471b,
    0x28db77f523047d84, 0x32caab7b40c72493,
    0x3c9ebe0a15c9bebc, 0x431d67c49c100d4c,
    0x4cc5d4becb3e42b6, 0x597f299cfc657e2a,
    0x5fcb6fab3ad6faec, 0x6c44198c4a475817,
];

const SHA384_INITIAL: [u64; 8] = [
    0xcbbb9d5dc1059ed8, 0x629a292a367cd507,
    0x9159015a3070dd17, 0x152fecd8f70e5939,
    0x67332667ffc00b31, 0x8eb44a8768581511,
    0xdb0c2e0d64f98fa7, 0x47b5481dbefa4fa4,
];

const SHA512_INITIAL: [u64; 8] = [
    0x6a09e667f3bcc908, 0xbb67ae8584caa73b,
    0x3c6ef372fe94f82b, 0xa54ff53a5f1d36f1,
    0x510e527fade682d1, 0x9b05688c2b3e6c1f,
    0x1f83d9abfb41bd6b, 0x5be0cd19137e2179,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sha2_64Variant {
    Sha384,
    Sha512,
}

impl Sha2_64Variant {
    fn initial_state(self) -> [u64; 8] {
        match self {
            Self::Sha384 => SHA384_INITIAL,
            Self::Sha512 => SHA512_INITIAL,
        }
    }

    pub(crate) fn digest_len(self) -> usize {
        match self {
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }
}

/// Streaming SHA-384/SHA-512 state.
#[derive(Clone)]
pub struct Sha2_64 {
    variant: Sha2_64Variant,
    state: [u64; 8],
    buffer: BlockBuffer<BLOCK_SIZE>,
    digest: Option<[u8; 64]>,
}

impl Sha2_64 {
    pub fn new(variant: Sha2_64Variant) -> Self {
        Sha2_64 {
            variant,
            state: variant.initial_state(),
            buffer: BlockBuffer::new(),
            digest: None,
        }
    }

    pub fn sha384() -> Self {
        Self::new(Sha2_64Variant::Sha384)
    }

    pub fn sha512() -> Self {
        Self::new(Sha2_64Variant::Sha512)
    }

    pub fn variant(&self) -> Sha2_64Variant {
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
            // High 64 bits of the length field stay zero.
            let mut length_field = [0u8; 16];
            let bit_len = self.buffer.total_len().wrapping_mul(8);
            length_field[8..].copy_from_slice(&bit_len.to_be_bytes());
            self.buffer
                .pad(&length_field, |block| compress(&mut self.state, block));

            let mut full = [0u8; 64];
            store_u64_be(&self.state, &mut full);
            full
        });
        &full[..len]
    }

    pub fn total_len(&self) -> u64 {
        self.buffer.total_len()
    }
}

#[inline(always)]
fn big_sigma0(x: u64) -> u64 {
    rotr64(x, 28) ^ rotr64(x, 34) ^ rotr64(x, 39)
}

#[inline(always)]
fn big_sigma1(x: u64) -> u64 {
    rotr64(x, 14) ^ rotr64(x, 18) ^ rotr64(x, 41)
}

#[inline(always)]
fn small_sigma0(x: u64) -> u64 {
    rotr64(x, 1) ^ rotr64(x, 8) ^ (x >> 7)
}

#[inline(always)]
fn small_sigma1(x: u64) -> u64 {
    rotr64(x, 19) ^ rotr64(x, 61) ^ (x >> 6)
}

#[inline(always)]
fn ch(x: u64, y: u64, z: u64) -> u64 {
    (x & y) ^ (!x & z)
}

#[inline(always)]
fn maj(x: u64, y: u64, z: u64) -> u64 {
    (x & y) ^ (x & z) ^ (y & z)
}

fn compress(state: &mut [u64; 8], block: &[u8]) {
    let mut w = [0u64; 80];
    w[..16].copy_from_slice(&load_u64_be::<16>(block));
    for t in 16..80 {
        w[t] = small_sigma1(w[t - 2])
            .wrapping_add(w[t - 7])
            .wrapping_add(small_sigma0(w[t - 15]))
            .wrapping_add(w[t - 16]);
    }

    let [mut a, mut b, mut c, mut d, mut e, mut f, mut g, mut h] = *state;

    for t in 0..80 {
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

    fn sha_hex(variant: Sha2_64Variant, data: &[u8]) -> String {
        let mut hasher = Sha2_64::new(variant);
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    #[test]
    fn test_sha512_abc() {
        assert_eq!(
            sha_hex(Sha2_64Variant::Sha512, b"abc"),
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
             2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
        );
    }

    #[test]
    fn test_sha384_abc() {
        assert_eq!(
            sha_hex(Sha2_64Variant::Sha384, b"abc"),
            "cb00753f45a35e8bb5a03d699ac65007272c32ab0eded1631a8b605a43ff5bed\
             8086072ba1e7cc2358baeca134c825a7"
        );
    }

    #[test]
    fn test_matches_reference_across_padding_boundaries() {
        // 111/112 bytes is where the 16-byte length field stops fitting
        for len in [0usize, 1, 111, 112, 113, 127, 128, 129, 255, 256, 1000] {
            let data: Vec<u8> = (0..len).map(|i| (i * 13 + 3) as u8).collect();
            assert_eq!(
                sha_hex(Sha2_64Variant::Sha512, &data),
                hex::encode(sha2::Sha512::digest(&data)),
                "sha512 length {}",
                len
            );
            assert_eq!(
                sha_hex(Sha2_64Variant::Sha384, &data),
                hex::encode(sha2::Sha384::digest(&data)),
                "sha384 length {}",
                len
            );
        }
    }

    #[test]
    fn test_truncated_variant_is_prefix_of_full_state() {
        let mut hasher = Sha2_64::sha384();
        hasher.update(b"the truncated digest is a prefix of the computed state");
        let digest = hasher.finalize().to_vec();
        assert_eq!(digest.len(), 48);
        let full = hasher.digest.expect("finalized");
        assert_eq!(&full[..48], &digest[..]);
    }
}
