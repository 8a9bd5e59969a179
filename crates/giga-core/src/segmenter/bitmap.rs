//! Block completion bitmap for resume.

/// One bit per flattened block index (LSB of byte 0 = block 0).
///
/// Serializes to/from bytes for the ledger BLOB. Only the first
/// `ceil(len/8)` bytes are significant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockBitmap {
    bytes: Vec<u8>,
    len: usize,
}

impl BlockBitmap {
    /// New bitmap with every one of `block_count` blocks missing.
    pub fn new(block_count: usize) -> Self {
        BlockBitmap {
            bytes: vec![0u8; block_count.div_ceil(8)],
            len: block_count,
        }
    }

    /// Deserialize from ledger bytes. Extra bytes are ignored; missing bytes read as 0.
    pub fn from_bytes(bytes: &[u8], block_count: usize) -> Self {
        let mut b = Self::new(block_count);
        let copy = bytes.len().min(b.bytes.len());
        b.bytes[..copy].copy_from_slice(&bytes[..copy]);
        if block_count % 8 != 0 {
            if let Some(last) = b.bytes.last_mut() {
                *last &= (1u8 << (block_count % 8)) - 1;
            }
        }
        b
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    /// Number of blocks tracked.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Mark block `index` as completed. Out-of-range indices are ignored.
    pub fn set_completed(&mut self, index: usize) {
        if index < self.len {
            self.bytes[index / 8] |= 1 << (index % 8);
        }
    }

    pub fn is_completed(&self, index: usize) -> bool {
        index < self.len && self.bytes[index / 8] & (1 << (index % 8)) != 0
    }

    pub fn completed_count(&self) -> usize {
        self.bytes.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// True if every tracked block is completed (vacuously true when empty).
    pub fn all_completed(&self) -> bool {
        self.completed_count() == self.len
    }

    /// Indices still missing, in ascending order.
    pub fn missing(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(move |&i| !self.is_completed(i))
    }
}
