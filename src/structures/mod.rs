mod bitpacking;

pub use bitpacking::{bits_needed, PackedInts, PACK_BLOCK_SIZE};
