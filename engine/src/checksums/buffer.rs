//! Block buffering shared by the Merkle–Damgård engines (MD5, SHA-2).

/// Holds the bytes of an incomplete block between `update` calls.
///
/// Invariant: `len < B` after every call returns.
#[derive(Clone)]
pub(crate) struct BlockBuffer<const B: usize> {
    buf: [u8; B],
    len: usize,
    total_len: u64,
}

impl<const B: usize> BlockBuffer<B> {
    pub(crate) const fn new() -> Self {
        BlockBuffer {
            buf: [0u8; B],
            len: 0,
            total_len: 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.len = 0;
        self.total_len = 0;
    }

    /// Total number of bytes fed since the last reset.
    pub(crate) fn total_len(&self) -> u64 {
        self.total_len
    }

    #[cfg(test)]
    pub(crate) fn leftover(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Append `data`, handing every completed block to `compress`.
    ///
    /// Blocks are passed as slices of exactly `B` bytes.
    pub(crate) fn feed(&mut self, mut data: &[u8], mut compress: impl FnMut(&[u8])) {
        self.total_len = self.total_len.wrapping_add(data.len() as u64);

        if self.len > 0 {
            let take = (B - self.len).min(data.len());
            self.buf[self.len..self.len + take].copy_from_slice(&data[..take]);
            self.len += take;
            data = &data[take..];

            if self.len < B {
                return;
            }
            compress(&self.buf);
            self.len = 0;
        }

        let mut blocks = data.chunks_exact(B);
        for block in &mut blocks {
            compress(block);
        }

        let rest = blocks.remainder();
        self.buf[..rest.len()].copy_from_slice(rest);
        self.len = rest.len();
    }

    /// Apply the final padding: a single `0x80` byte, zero fill, then
    /// `length_field` occupying the tail of the last block.
    ///
    /// When the leftover bytes plus the marker leave no room for the length
    /// field, two blocks are compressed.
    pub(crate) fn pad(&mut self, length_field: &[u8], mut compress: impl FnMut(&[u8])) {
        let tail = B - length_field.len();

        self.buf[self.len] = 0x80;
        self.buf[self.len + 1..].fill(0);

        if self.len + 1 > tail {
            compress(&self.buf);
            self.buf.fill(0);
        }

        self.buf[tail..].copy_from_slice(length_field);
        compress(&self.buf);
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_keeps_leftover_below_block_size() {
        let mut buffer = BlockBuffer::<8>::new();
        let mut blocks = Vec::new();

        buffer.feed(b"abc", |b| blocks.push(b.to_vec()));
        assert!(blocks.is_empty());
        assert_eq!(buffer.leftover(), b"abc");

        buffer.feed(b"defghijklmnopqrs", |b| blocks.push(b.to_vec()));
        assert_eq!(blocks, vec![b"abcdefgh".to_vec(), b"ijklmnop".to_vec()]);
        assert_eq!(buffer.leftover(), b"qrs");
        assert_eq!(buffer.total_len(), 19);
    }

    #[test]
    fn test_pad_spills_into_second_block() {
        let mut buffer = BlockBuffer::<8>::new();
        let mut blocks = Vec::new();

        // 6 leftover bytes + 0x80 leave no room for a 2-byte length field
        buffer.feed(b"abcdef", |_| {});
        buffer.pad(&[0xEE, 0xFF], |b| blocks.push(b.to_vec()));

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], b"abcdef\x80\x00".to_vec());
        assert_eq!(blocks[1], vec![0, 0, 0, 0, 0, 0, 0xEE, 0xFF]);
    }

    #[test]
    fn test_pad_fits_single_block() {
        let mut buffer = BlockBuffer::<8>::new();
        let mut blocks = Vec::new();

        buffer.feed(b"abcde", |_| {});
        buffer.pad(&[0xEE, 0xFF], |b| blocks.push(b.to_vec()));

        assert_eq!(blocks, vec![b"abcde\x80\xEE\xFF".to_vec()]);
    }
}
