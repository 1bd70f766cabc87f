use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use twox_hash::xxh3;

/// 128-bit XXH3 content digest. Ordering is numeric, which is also the order
/// of the zero-padded hex rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest(u128);

impl Digest {
    pub fn from_bytes(data: &[u8]) -> Self {
        Digest(xxh3::hash128(data))
    }
}

impl From<u128> for Digest {
    fn from(value: u128) -> Self {
        Digest(value)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

pub fn hash_file(file: &Path) -> io::Result<Digest> {
    let data = read_full_file(file)?;
    Ok(Digest::from_bytes(&data))
}

pub fn read_full_file(file: &Path) -> io::Result<Vec<u8>> {
    let mut f = File::open(file)?;
    let mut buffer = Vec::new();
    f.read_to_end(&mut buffer)?;
    Ok(buffer)
}
