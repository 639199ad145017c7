//! Component D: the cache of remote chains keyed by owner public key.

pub mod error;
pub mod header;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{info, instrument};

pub use error::{AssessStatus, MultiStoreError};
pub use header::{ChainHeader, ChainStats};

use crate::codec::{decode_all, decode_block, DecodedRecord};
use crate::kv::KvStore;
use crate::types::{PublicKey, PUBLIC_KEY_LEN};

const HEADER_KEY_LEN: usize = PUBLIC_KEY_LEN;
const BLOCK_KEY_LEN: usize = PUBLIC_KEY_LEN + 8 + 8;

fn header_key(owner: &PublicKey) -> [u8; HEADER_KEY_LEN] {
    *owner.as_bytes()
}

fn block_key(owner: &PublicKey, version: u64, number: u64) -> [u8; BLOCK_KEY_LEN] {
    let mut key = [0u8; BLOCK_KEY_LEN];
    key[0..PUBLIC_KEY_LEN].copy_from_slice(owner.as_bytes());
    key[PUBLIC_KEY_LEN..PUBLIC_KEY_LEN + 8].copy_from_slice(&version.to_le_bytes());
    key[PUBLIC_KEY_LEN + 8..].copy_from_slice(&number.to_le_bytes());
    key
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Notified when a cached chain's statistics move or a chain is deleted:
/// a one-way edge in place of a back-reference into whatever owns the
/// search index.
pub trait MultiStoreObserver: Send + Sync {
    fn on_statistics_update(&self, header: &ChainHeader, prev_stats: &ChainStats);
    fn on_chain_delete(&self, owner: &PublicKey);
}

pub struct NullMultiStoreObserver;
impl MultiStoreObserver for NullMultiStoreObserver {
    fn on_statistics_update(&self, _header: &ChainHeader, _prev_stats: &ChainStats) {}
    fn on_chain_delete(&self, _owner: &PublicKey) {}
}

pub struct MultiStore {
    store: Arc<dyn KvStore>,
    observer: Arc<dyn MultiStoreObserver>,
}

impl MultiStore {
    pub fn open(store: Arc<dyn KvStore>) -> Self {
        Self::with_observer(store, Arc::new(NullMultiStoreObserver))
    }

    pub fn with_observer(store: Arc<dyn KvStore>, observer: Arc<dyn MultiStoreObserver>) -> Self {
        Self { store, observer }
    }

    pub fn read_chain_header(&self, owner: &PublicKey) -> Result<Option<ChainHeader>, MultiStoreError> {
        match self.store.get(&header_key(owner))? {
            None => Ok(None),
            Some(raw) => Ok(Some(ChainHeader::decode(*owner, &raw)?)),
        }
    }

    pub fn write_chain_header(&self, header: &ChainHeader) -> Result<(), MultiStoreError> {
        self.store
            .set(&header_key(&header.owner_public_key), &header.encode())?;
        Ok(())
    }

    pub fn new_chain_header(&self, owner: PublicKey, version: u64, height: u64) -> Result<ChainHeader, MultiStoreError> {
        let header = ChainHeader::new(owner, version, height, now_unix());
        self.write_chain_header(&header)?;
        Ok(header)
    }

    pub fn read_block(&self, owner: &PublicKey, version: u64, number: u64) -> Result<Option<Vec<u8>>, MultiStoreError> {
        Ok(self.store.get(&block_key(owner, version, number))?)
    }

    pub fn write_block(&self, owner: &PublicKey, version: u64, number: u64, raw: &[u8]) -> Result<(), MultiStoreError> {
        self.store.set(&block_key(owner, version, number), raw)?;
        Ok(())
    }

    /// Compares a locally cached header against a remote peer's claimed
    /// `(version, height)`.
    pub fn assess_header(&self, owner: &PublicKey, remote_version: u64, remote_height: u64) -> Result<AssessStatus, MultiStoreError> {
        let Some(local) = self.read_chain_header(owner)? else {
            return Ok(AssessStatus::HeaderNA);
        };
        if local.version > remote_version || (local.version == remote_version && local.height > remote_height) {
            return Ok(AssessStatus::InvalidRemote);
        }
        if remote_version > local.version {
            return Ok(AssessStatus::NewVersion);
        }
        if remote_height > local.height {
            return Ok(AssessStatus::NewBlocks);
        }
        Ok(AssessStatus::Equal)
    }

    /// Ingests one remote block: refuses if this exact
    /// `(owner, version, number)` is already stored. Decoding failure is
    /// tolerated unless `fail_if_invalid`; successful decode drives
    /// `stats` via every `File` record found.
    #[instrument(skip(self, raw))]
    pub fn ingest_block(
        &self,
        mut header: ChainHeader,
        number: u64,
        raw: &[u8],
        fail_if_invalid: bool,
    ) -> Result<ChainHeader, MultiStoreError> {
        if self.read_block(&header.owner_public_key, header.version, number)?.is_some() {
            return Err(MultiStoreError::AlreadyExists);
        }

        let decoded = decode_block(raw).ok();
        if fail_if_invalid && decoded.is_none() {
            return Err(MultiStoreError::CorruptHeader("block failed to decode".into()));
        }

        self.write_block(&header.owner_public_key, header.version, number, raw)?;
        header.block_numbers.push(number);
        header.date_last_ingested = now_unix();

        if let Some(block) = decoded {
            if let Ok(decoded_all) = decode_all(&block) {
                let prev_stats = header.stats.clone();
                for record in &decoded_all.records {
                    if let DecodedRecord::File(file) = record {
                        header.stats.count_files += 1;
                        header.stats.sum_file_sizes += file.file.size;
                    }
                }
                if header.stats != prev_stats {
                    self.observer.on_statistics_update(&header, &prev_stats);
                }
            }
        }

        self.write_chain_header(&header)?;
        info!(owner = %header.owner_public_key, block = number, "ingested remote block");
        Ok(header)
    }

    #[instrument(skip(self))]
    pub fn delete_chain(&self, header: &ChainHeader) -> Result<(), MultiStoreError> {
        for number in &header.block_numbers {
            self.store
                .delete(&block_key(&header.owner_public_key, header.version, *number))?;
        }
        self.store.delete(&header_key(&header.owner_public_key))?;
        self.observer.on_chain_delete(&header.owner_public_key);
        Ok(())
    }

    /// Scans the underlying store, routing entries by key length (33 =
    /// chain header) and yielding the decoded header to `callback`.
    pub fn iterate_chains(&self, mut callback: impl FnMut(&ChainHeader) -> bool) -> Result<(), MultiStoreError> {
        let mut headers = Vec::new();
        self.store.iterate(&mut |key, value| {
            if key.len() == HEADER_KEY_LEN {
                if let Some(owner) = PublicKey::from_slice(key) {
                    if let Ok(header) = ChainHeader::decode(owner, value) {
                        headers.push(header);
                    }
                }
            }
        })?;

        for header in &headers {
            if !callback(header) {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{PersonalChain, PersonalChainConfig};
    use crate::codec::{DatedFileRecord, FileRecord, Tag, TagType};
    use crate::kv::mem::InMemoryKvStore;
    use crate::types::Hash;

    fn owner_key() -> PublicKey {
        crate::crypto::public_key_from_secret(&[11u8; 32]).unwrap()
    }

    fn build_block_with_one_file(size: u64) -> Vec<u8> {
        let personal_store: Arc<dyn KvStore> = Arc::new(InMemoryKvStore::new());
        let chain = PersonalChain::open(personal_store.clone(), [11u8; 32], PersonalChainConfig::default()).unwrap();
        chain
            .add_files(&[DatedFileRecord {
                file: FileRecord {
                    hash: Hash::compute(b"remote content"),
                    id: [1u8; 16],
                    merkle_root: Hash::zero(),
                    fragment_size: 0,
                    file_type: 1,
                    file_format: 0,
                    size,
                    tags: vec![Tag::new(TagType::Name, b"remote.bin".to_vec())],
                },
                date: 5_000,
            }])
            .unwrap();

        personal_store.get(&0u64.to_le_bytes()).unwrap().unwrap()
    }

    #[test]
    fn ingest_block_updates_statistics() {
        let store: Arc<dyn KvStore> = Arc::new(InMemoryKvStore::new());
        let multi = MultiStore::open(store);
        let owner = owner_key();
        let header = multi.new_chain_header(owner, 0, 1).unwrap();

        let raw = build_block_with_one_file(4096);
        let header = multi.ingest_block(header, 0, &raw, true).unwrap();

        assert_eq!(header.stats.count_files, 1);
        assert_eq!(header.stats.sum_file_sizes, 4096);
        assert_eq!(header.block_numbers, vec![0]);
    }

    #[test]
    fn ingest_same_block_twice_fails_already_exists() {
        let store: Arc<dyn KvStore> = Arc::new(InMemoryKvStore::new());
        let multi = MultiStore::open(store);
        let owner = owner_key();
        let header = multi.new_chain_header(owner, 0, 1).unwrap();

        let raw = build_block_with_one_file(4096);
        let header = multi.ingest_block(header.clone(), 0, &raw, true).unwrap();

        let err = multi.ingest_block(header.clone(), 0, &raw, true).unwrap_err();
        assert!(matches!(err, MultiStoreError::AlreadyExists));
        assert_eq!(header.stats.count_files, 1);
    }

    #[test]
    fn assess_header_detects_new_version_and_invalid_remote() {
        let store: Arc<dyn KvStore> = Arc::new(InMemoryKvStore::new());
        let multi = MultiStore::open(store);
        let owner = owner_key();
        assert_eq!(multi.assess_header(&owner, 0, 0).unwrap(), AssessStatus::HeaderNA);

        multi.new_chain_header(owner, 2, 5).unwrap();

        assert_eq!(multi.assess_header(&owner, 3, 0).unwrap(), AssessStatus::NewVersion);
        assert_eq!(multi.assess_header(&owner, 2, 1).unwrap(), AssessStatus::InvalidRemote);
        assert_eq!(multi.assess_header(&owner, 2, 5).unwrap(), AssessStatus::Equal);
    }

    #[test]
    fn delete_chain_removes_header_and_blocks() {
        let store: Arc<dyn KvStore> = Arc::new(InMemoryKvStore::new());
        let multi = MultiStore::open(store);
        let owner = owner_key();
        let header = multi.new_chain_header(owner, 0, 1).unwrap();
        let raw = build_block_with_one_file(10);
        let header = multi.ingest_block(header, 0, &raw, true).unwrap();

        multi.delete_chain(&header).unwrap();
        assert!(multi.read_chain_header(&owner).unwrap().is_none());
        assert!(multi.read_block(&owner, header.version, 0).unwrap().is_none());
    }
}
