//! Merkle companion generation for large blobs.
//!
//! `rs_merkle` ships SHA-256/512 algorithms but not BLAKE3, so this
//! module supplies a thin [`rs_merkle::Hasher`] binding for it.

use std::io::Read;

use rs_merkle::{Hasher, MerkleTree};
use tracing::debug;

use super::error::WarehouseError;
use crate::types::Hash;

/// Below this size a blob gets no Merkle companion at all. Also the
/// floor fragment size [`calculate_fragment_size`] will never go below.
pub const MINIMUM_FRAGMENT_SIZE: u64 = 256 * 1024;

/// Above this many fragments, [`calculate_fragment_size`] doubles the
/// fragment size again, bounding Merkle tree depth for very large blobs.
const MAX_FRAGMENT_COUNT: u64 = 1024;

#[derive(Clone)]
pub struct Blake3Algorithm;

impl Hasher for Blake3Algorithm {
    type Hash = [u8; 32];

    fn hash(data: &[u8]) -> [u8; 32] {
        *blake3::hash(data).as_bytes()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleCompanion {
    pub root_hash: Hash,
    pub fragment_size: u64,
}

/// Chooses a fragment size for a blob of `file_size` bytes: the floor is
/// [`MINIMUM_FRAGMENT_SIZE`]; it doubles until the blob would produce no
/// more than [`MAX_FRAGMENT_COUNT`] fragments.
pub fn calculate_fragment_size(file_size: u64) -> u64 {
    let mut fragment_size = MINIMUM_FRAGMENT_SIZE;
    while file_size / fragment_size > MAX_FRAGMENT_COUNT {
        fragment_size *= 2;
    }
    fragment_size
}

/// Capability trait so Warehouse never hard-codes a specific Merkle
/// implementation; constructor-injected.
pub trait MerkleBackend: Send + Sync {
    fn calculate_fragment_size(&self, file_size: u64) -> u64;
    fn minimum_fragment_size(&self) -> u64;
    fn build(&self, reader: &mut dyn Read, fragment_size: u64) -> Result<MerkleCompanion, WarehouseError>;
}

pub struct RsMerkleBackend;

impl MerkleBackend for RsMerkleBackend {
    fn calculate_fragment_size(&self, file_size: u64) -> u64 {
        calculate_fragment_size(file_size)
    }

    fn minimum_fragment_size(&self) -> u64 {
        MINIMUM_FRAGMENT_SIZE
    }

    fn build(&self, reader: &mut dyn Read, fragment_size: u64) -> Result<MerkleCompanion, WarehouseError> {
        let mut leaves = Vec::new();
        let mut chunk = vec![0u8; fragment_size as usize];

        loop {
            let mut filled = 0usize;
            while filled < chunk.len() {
                let n = reader
                    .read(&mut chunk[filled..])
                    .map_err(WarehouseError::ErrorMerkleFile)?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            if filled == 0 {
                break;
            }
            leaves.push(Blake3Algorithm::hash(&chunk[..filled]));
            if filled < chunk.len() {
                break;
            }
        }

        if leaves.is_empty() {
            return Err(WarehouseError::ErrorCreateMerkle(
                "cannot build a merkle tree over zero fragments".to_string(),
            ));
        }

        let tree = MerkleTree::<Blake3Algorithm>::from_leaves(&leaves);
        let root = tree.root().ok_or_else(|| {
            WarehouseError::ErrorCreateMerkle("merkle tree produced no root".to_string())
        })?;

        debug!(fragments = leaves.len(), fragment_size, "built merkle companion");

        Ok(MerkleCompanion {
            root_hash: Hash(root),
            fragment_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn fragment_size_grows_with_file_size() {
        assert_eq!(calculate_fragment_size(1024), MINIMUM_FRAGMENT_SIZE);
        let huge = MINIMUM_FRAGMENT_SIZE * (MAX_FRAGMENT_COUNT + 1);
        assert!(calculate_fragment_size(huge) > MINIMUM_FRAGMENT_SIZE);
    }

    #[test]
    fn build_merkle_tree_over_small_blob() {
        let backend = RsMerkleBackend;
        let data = vec![42u8; 4096];
        let mut cursor = Cursor::new(data);
        let companion = backend.build(&mut cursor, 1024).unwrap();
        assert_eq!(companion.fragment_size, 1024);
        assert_ne!(companion.root_hash, Hash::zero());
    }

    #[test]
    fn build_is_deterministic() {
        let backend = RsMerkleBackend;
        let data = vec![7u8; 5000];
        let a = backend.build(&mut Cursor::new(data.clone()), 2048).unwrap();
        let b = backend.build(&mut Cursor::new(data), 2048).unwrap();
        assert_eq!(a, b);
    }
}
