//! Block allocation and completion tracking.
//!
//! Splits one source's content into fixed-size blocks for parallel ranged
//! fetches, and keeps a completion bitmap over the mission's flattened block
//! indices so a resumed mission only claims what is still missing.

mod allocate;
mod bitmap;

pub use allocate::{allocate_blocks, block_count, Block, BLOCK_SIZE};
pub use bitmap::BlockBitmap;
