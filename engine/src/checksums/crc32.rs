//! CRC-32 (IEEE 802.3, reflected polynomial `0xEDB88320`), as used by SFV files.

const POLYNOMIAL: u32 = 0xEDB8_8320;
const INITIAL: u32 = 0xFFFF_FFFF;

static TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 == 1 {
                (crc >> 1) ^ POLYNOMIAL
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Streaming CRC-32 state.
///
/// CRC-32 has no block structure, so no bytes are ever left over between
/// updates and finalisation involves no padding.
#[derive(Clone)]
pub struct Crc32 {
    crc: u32,
    total_len: u64,
    digest: Option<[u8; 4]>,
}

impl Crc32 {
    pub fn new() -> Self {
        Crc32 {
            crc: INITIAL,
            total_len: 0,
            digest: None,
        }
    }

    pub fn init(&mut self) {
        *self = Self::new();
    }

    pub fn update(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        if self.digest.is_some() {
            self.init();
        }

        let mut crc = self.crc;
        for &byte in data {
            crc = TABLE[((crc ^ byte as u32) & 0xFF) as usize] ^ (crc >> 8);
        }
        self.crc = crc;
        self.total_len = self.total_len.wrapping_add(data.len() as u64);
    }

    /// Returns the big-endian representation of the finished CRC.
    pub fn finalize(&mut self) -> [u8; 4] {
        *self
            .digest
            .get_or_insert_with(|| (self.crc ^ INITIAL).to_be_bytes())
    }

    pub fn total_len(&self) -> u64 {
        self.total_len
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crc_hex(data: &[u8]) -> String {
        let mut crc = Crc32::new();
        crc.update(data);
        hex::encode(crc.finalize())
    }

    #[test]
    fn test_known_values() {
        assert_eq!(crc_hex(b""), "00000000");
        assert_eq!(crc_hex(b"123456789"), "cbf43926");
        assert_eq!(
            crc_hex(b"The quick brown fox jumps over the lazy dog"),
            "414fa339"
        );
    }

    #[test]
    fn test_table_entries() {
        assert_eq!(TABLE[0], 0);
        assert_eq!(TABLE[1], 0x7707_3096);
        assert_eq!(TABLE[255], 0x2D02_EF8D);
    }

    #[test]
    fn test_byte_at_a_time_matches_single_update() {
        let data = b"sumcheck streams files one chunk at a time";
        let mut crc = Crc32::new();
        for byte in data.iter() {
            crc.update(std::slice::from_ref(byte));
        }
        assert_eq!(hex::encode(crc.finalize()), crc_hex(data));
        assert_eq!(crc.total_len(), data.len() as u64);
    }
}
