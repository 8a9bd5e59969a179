//! Fixed-size block planning.

/// Default block size: 512 KiB.
pub const BLOCK_SIZE: u64 = 512 * 1024;

/// A byte range `[start, end)` of one source's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Start offset within the source (inclusive).
    pub start: u64,
    /// End offset within the source (exclusive).
    pub end: u64,
}

impl Block {
    /// Length of this block in bytes.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Inclusive last byte, as used in a `Range` header.
    pub fn last_byte(&self) -> u64 {
        self.end.saturating_sub(1)
    }
}

/// Number of `block_size` blocks needed to cover `total` bytes.
pub fn block_count(total: u64, block_size: u64) -> usize {
    if total == 0 || block_size == 0 {
        return 0;
    }
    total.div_ceil(block_size) as usize
}

/// Plans the blocks for one source.
///
/// Returns an empty list (single unbounded stream) when the length is unknown,
/// ranges are unsupported, only one thread is allowed, or the content is
/// smaller than a single block. Otherwise returns `ceil(total / block_size)`
/// blocks; only the last one may be shorter.
pub fn allocate_blocks(
    total: Option<u64>,
    supports_ranges: bool,
    thread_count: usize,
    block_size: u64,
) -> Vec<Block> {
    if !supports_ranges || thread_count <= 1 || block_size == 0 {
        return Vec::new();
    }
    let total = match total {
        Some(t) if t >= block_size => t,
        _ => return Vec::new(),
    };

    let count = block_count(total, block_size);
    let mut out = Vec::with_capacity(count);
    for i in 0..count as u64 {
        let start = i * block_size;
        out.push(Block {
            start,
            end: (start + block_size).min(total),
        });
    }
    out
}
