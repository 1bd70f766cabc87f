pub mod index;
pub mod xxhash;

pub use index::{build_checksum_index, ChecksumIndex, DuplicateGroup};
pub use xxhash::Digest;
