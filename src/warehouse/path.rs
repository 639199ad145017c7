//! Content-addressed path derivation: `<root>/<hex[0..4]>/<hex[4..8]>/<hex[8..]>`,
//! plus the `_Temp` staging sibling.

use std::path::{Path, PathBuf};

use crate::types::{Hash, HASH_LEN};

pub const TEMP_DIR_NAME: &str = "_Temp";

/// Full hex length of a hash (`HASH_LEN` bytes, two hex chars per byte).
const HEX_LEN: usize = HASH_LEN * 2;

pub fn hash_to_path(root: &Path, hash: &Hash) -> PathBuf {
    let hex = hex::encode(hash.as_bytes());
    root.join(&hex[0..4]).join(&hex[4..8]).join(&hex[8..])
}

pub fn temp_dir(root: &Path) -> PathBuf {
    root.join(TEMP_DIR_NAME)
}

/// Reassembles a hash from the two directory-level components and the
/// filename, validating each piece is the right length and valid hex,
/// per `IterateFiles`'s acceptance rule.
pub fn path_components_to_hash(level1: &str, level2: &str, filename: &str) -> Option<Hash> {
    if level1.len() != 4 || level2.len() != 8 - 4 {
        return None;
    }
    if filename.len() != HEX_LEN - 8 {
        return None;
    }
    let full_hex = format!("{level1}{level2}{filename}");
    if full_hex.len() != HEX_LEN || !full_hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let bytes = hex::decode(full_hex).ok()?;
    Hash::from_slice(&bytes)
}

pub fn merkle_companion_path(blob_path: &Path) -> PathBuf {
    let mut path = blob_path.as_os_str().to_owned();
    path.push(".merkle");
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_to_path_uses_two_level_sharding() {
        let hash = Hash::compute(b"content");
        let hex = hex::encode(hash.as_bytes());
        let root = PathBuf::from("/warehouse");
        let path = hash_to_path(&root, &hash);
        assert_eq!(
            path,
            root.join(&hex[0..4]).join(&hex[4..8]).join(&hex[8..])
        );
    }

    #[test]
    fn path_components_roundtrip_to_hash() {
        let hash = Hash::compute(b"content");
        let hex = hex::encode(hash.as_bytes());
        let reassembled =
            path_components_to_hash(&hex[0..4], &hex[4..8], &hex[8..]).unwrap();
        assert_eq!(reassembled, hash);
    }

    #[test]
    fn rejects_wrong_length_components() {
        assert!(path_components_to_hash("abc", "defg", &"0".repeat(56)).is_none());
    }
}
