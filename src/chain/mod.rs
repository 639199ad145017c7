//! Component C: the owner-signed personal chain.

pub mod error;
pub mod header;
pub mod refactor;

use std::sync::{Arc, Mutex};

use tracing::{info, instrument};

pub use error::ChainError;
pub use header::ChainHeader;
pub use refactor::RecordAction;

use crate::codec::{
    decode_all, decode_block, encode_block, encode_file_records, encode_profile_records,
    BlockRecordRaw, DatedFileRecord, DecodedBlock, ProfileEntry, ProfileField, RecordType,
};
use crate::collaborators::{Indexer, NullIndexer};
use crate::crypto;
use crate::kv::KvStore;
use crate::types::{Hash, PublicKey};

use header::HEADER_KEY;

/// Builds the `u64 LE` key a block is stored under.
fn block_key(number: u64) -> [u8; 8] {
    number.to_le_bytes()
}

#[derive(Clone, Debug)]
pub struct PersonalChainConfig {
    /// Approximate ceiling, in bytes, on a block composed by
    /// `ProfileWrite` before it is split across multiple blocks:
    /// ~64 KB minus message overhead.
    pub target_block_size: usize,
}

impl Default for PersonalChainConfig {
    fn default() -> Self {
        Self { target_block_size: 64 * 1024 - 256 }
    }
}

pub struct PersonalChain {
    store: Arc<dyn KvStore>,
    secret_key: [u8; 32],
    owner_public_key: PublicKey,
    indexer: Arc<dyn Indexer>,
    /// Serializes `Append`, refactor, `DeleteChain`, and canonical header
    /// reads against each other. `Read`/`Iterate` of individual
    /// already-stored blocks may proceed without it.
    write_lock: Mutex<()>,
    config: PersonalChainConfig,
}

impl PersonalChain {
    pub fn open(
        store: Arc<dyn KvStore>,
        secret_key: [u8; 32],
        config: PersonalChainConfig,
    ) -> Result<Self, ChainError> {
        Self::open_with_indexer(store, secret_key, config, Arc::new(NullIndexer))
    }

    pub fn open_with_indexer(
        store: Arc<dyn KvStore>,
        secret_key: [u8; 32],
        config: PersonalChainConfig,
        indexer: Arc<dyn Indexer>,
    ) -> Result<Self, ChainError> {
        let owner_public_key =
            crypto::public_key_from_secret(&secret_key).map_err(|e| ChainError::Crypto(e.to_string()))?;

        match store.get(HEADER_KEY)? {
            None => {
                let header = ChainHeader::sign(0, 0, &secret_key)?;
                store.set(HEADER_KEY, &header.encode())?;
            }
            Some(existing) => {
                let (_, existing_owner) = ChainHeader::decode(&existing)?;
                if existing_owner != owner_public_key {
                    return Err(ChainError::PublicKeyMismatch);
                }
            }
        }

        Ok(Self {
            store,
            secret_key,
            owner_public_key,
            indexer,
            write_lock: Mutex::new(()),
            config,
        })
    }

    pub fn owner_public_key(&self) -> PublicKey {
        self.owner_public_key
    }

    fn read_header(&self) -> Result<ChainHeader, ChainError> {
        let raw = self.store.get(HEADER_KEY)?.ok_or(ChainError::DataNotFound)?;
        let (header, _) = ChainHeader::decode(&raw)?;
        Ok(header)
    }

    pub fn chain_header(&self) -> Result<ChainHeader, ChainError> {
        let _guard = self.write_lock.lock().unwrap();
        self.read_header()
    }

    /// Appends a pre-assembled batch of raw records as a single new
    /// block. No-op (returns the current header unchanged) for an empty
    /// batch.
    #[instrument(skip(self, records))]
    pub fn append(&self, records: Vec<BlockRecordRaw>) -> Result<ChainHeader, ChainError> {
        if records.is_empty() {
            return self.chain_header();
        }

        let _guard = self.write_lock.lock().unwrap();
        let header = self.read_header()?;
        let height = header.height;

        let prev_hash = if height > 0 {
            let prev_raw = self
                .store
                .get(&block_key(height - 1))?
                .ok_or(ChainError::BlockNotFound)?;
            Hash::compute(&prev_raw)
        } else {
            Hash::zero()
        };

        let encoded = encode_block(prev_hash, header.version, height, &records, &self.secret_key)?;
        self.store.set(&block_key(height), &encoded)?;

        let new_header = ChainHeader::sign(height + 1, header.version, &self.secret_key)?;
        self.store.set(HEADER_KEY, &new_header.encode())?;

        self.indexer
            .index_new_block(&self.owner_public_key, header.version, height, &encoded);

        info!(block = height, "appended block");
        Ok(new_header)
    }

    pub fn add_files(&self, files: &[DatedFileRecord]) -> Result<ChainHeader, ChainError> {
        self.append(encode_file_records(files)?)
    }

    /// Not atomic across the delete and the append. A future revision
    /// should close this gap with a single refactor-with-replace
    /// operation.
    pub fn replace_files(
        &self,
        delete_ids: &[[u8; 16]],
        add_files: &[DatedFileRecord],
    ) -> Result<ChainHeader, ChainError> {
        self.delete_files(delete_ids)?;
        self.add_files(add_files)
    }

    /// Deletes every file whose id is in `ids` via the refactor-on-delete
    /// protocol.
    pub fn delete_files(&self, ids: &[[u8; 16]]) -> Result<ChainHeader, ChainError> {
        let _guard = self.write_lock.lock().unwrap();
        let header = self.read_header()?;

        let new_header = refactor::iterate_delete_record(
            self.store.as_ref(),
            &self.secret_key,
            &header,
            |file| {
                if ids.contains(&file.file.id) {
                    RecordAction::Delete
                } else {
                    RecordAction::Keep
                }
            },
            |_other| RecordAction::Keep,
        )?;

        if new_header.version != header.version {
            self.indexer.unindex_chain(&self.owner_public_key);
        }
        Ok(new_header)
    }

    pub fn read(&self, n: u64) -> Result<DecodedBlock, ChainError> {
        let header = self.read_header()?;
        if n >= header.height {
            return Err(ChainError::BlockNotFound);
        }
        let raw = self.store.get(&block_key(n))?.ok_or(ChainError::BlockNotFound)?;
        let block = decode_block(&raw)?;
        Ok(decode_all(&block)?)
    }

    /// Sequentially decodes every block `0..height`, invoking `f`. The
    /// first error `f` returns aborts iteration and is propagated.
    pub fn iterate(&self, mut f: impl FnMut(&DecodedBlock) -> Result<(), ChainError>) -> Result<(), ChainError> {
        let header = self.read_header()?;
        for n in 0..header.height {
            let raw = self.store.get(&block_key(n))?.ok_or(ChainError::BlockNotFound)?;
            let block = decode_block(&raw)?;
            let decoded = decode_all(&block)?;
            f(&decoded)?;
        }
        Ok(())
    }

    fn collect_profile_entries(&self) -> Result<Vec<ProfileEntry>, ChainError> {
        let mut latest: Vec<ProfileEntry> = Vec::new();
        self.iterate(|decoded| {
            for record in &decoded.records {
                if let crate::codec::DecodedRecord::Profile(entry) = record {
                    match latest.iter_mut().find(|e| e.field == entry.field) {
                        Some(existing) if entry.date >= existing.date => *existing = entry.clone(),
                        Some(_) => {}
                        None => latest.push(entry.clone()),
                    }
                }
            }
            Ok(())
        })?;
        Ok(latest)
    }

    /// Scans every block collecting the latest value per field; returns
    /// the most recent entry for `field`, if any.
    pub fn profile_read_field(&self, field: ProfileField) -> Result<Option<ProfileEntry>, ChainError> {
        Ok(self.collect_profile_entries()?.into_iter().find(|e| e.field == field))
    }

    pub fn profile_list(&self) -> Result<Vec<ProfileEntry>, ChainError> {
        self.collect_profile_entries()
    }

    /// Appends `entries`, splitting across multiple blocks whenever a
    /// prospective block's encoded profile payload would exceed
    /// `target_block_size`.
    pub fn profile_write(&self, entries: &[ProfileEntry]) -> Result<ChainHeader, ChainError> {
        if entries.is_empty() {
            return self.chain_header();
        }

        let mut last_header = self.chain_header()?;
        let mut batch: Vec<ProfileEntry> = Vec::new();
        let mut batch_size = 0usize;

        for entry in entries {
            let entry_size = 2 + entry.data.len();
            if !batch.is_empty() && batch_size + entry_size > self.config.target_block_size {
                last_header = self.append(encode_profile_records(&batch)?)?;
                batch.clear();
                batch_size = 0;
            }
            batch_size += entry_size;
            batch.push(entry.clone());
        }
        if !batch.is_empty() {
            last_header = self.append(encode_profile_records(&batch)?)?;
        }
        Ok(last_header)
    }

    /// Removes every occurrence of `field` across the chain's lifetime
    /// via the refactor-on-delete protocol.
    pub fn profile_delete(&self, field: ProfileField) -> Result<ChainHeader, ChainError> {
        let _guard = self.write_lock.lock().unwrap();
        let header = self.read_header()?;

        refactor::iterate_delete_record(
            self.store.as_ref(),
            &self.secret_key,
            &header,
            |_file| RecordAction::Keep,
            |other| {
                if other.r#type == RecordType::Profile as u8
                    && other.payload.len() >= 2
                    && u16::from_le_bytes(other.payload[0..2].try_into().unwrap()) == field as u16
                {
                    RecordAction::Delete
                } else {
                    RecordAction::Keep
                }
            },
        )
    }

    /// Deletes every block key and bumps the version so peers observe
    /// the chain was reset.
    #[instrument(skip(self))]
    pub fn delete_chain(&self) -> Result<ChainHeader, ChainError> {
        let _guard = self.write_lock.lock().unwrap();
        let header = self.read_header()?;

        for n in 0..header.height {
            self.store.delete(&block_key(n))?;
        }

        let new_header = ChainHeader::sign(0, header.version + 1, &self.secret_key)?;
        self.store.set(HEADER_KEY, &new_header.encode())?;
        self.indexer.unindex_chain(&self.owner_public_key);
        Ok(new_header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{FileRecord, Tag, TagType};
    use crate::kv::mem::InMemoryKvStore;

    fn chain(secret_key: [u8; 32]) -> PersonalChain {
        PersonalChain::open(Arc::new(InMemoryKvStore::new()), secret_key, PersonalChainConfig::default())
            .unwrap()
    }

    fn sample_file(id: u8, name: &str) -> DatedFileRecord {
        DatedFileRecord {
            file: FileRecord {
                hash: Hash::compute(name.as_bytes()),
                id: [id; 16],
                merkle_root: Hash::zero(),
                fragment_size: 0,
                file_type: 1,
                file_format: 0,
                size: name.len() as u64,
                tags: vec![Tag::new(TagType::Name, name.as_bytes().to_vec())],
            },
            date: 1000 + id as i64,
        }
    }

    #[test]
    fn append_then_read_single_file() {
        let chain = chain([1u8; 32]);
        let header = chain.add_files(&[sample_file(1, "hi.txt")]).unwrap();
        assert_eq!(header.height, 1);

        let decoded = chain.read(0).unwrap();
        let crate::codec::DecodedRecord::File(file) = &decoded.records[0] else {
            panic!("expected a file record");
        };
        assert_eq!(file.file.id, [1u8; 16]);
    }

    #[test]
    fn append_of_empty_records_is_noop() {
        let chain = chain([2u8; 32]);
        chain.add_files(&[sample_file(1, "a")]).unwrap();
        let before = chain.chain_header().unwrap();
        let after = chain.append(Vec::new()).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn reopen_with_wrong_key_fails_public_key_mismatch() {
        let store: Arc<dyn KvStore> = Arc::new(InMemoryKvStore::new());
        {
            let chain_a =
                PersonalChain::open(store.clone(), [3u8; 32], PersonalChainConfig::default()).unwrap();
            chain_a.add_files(&[sample_file(1, "a")]).unwrap();
        }
        let err =
            PersonalChain::open(store, [4u8; 32], PersonalChainConfig::default()).unwrap_err();
        assert!(matches!(err, ChainError::PublicKeyMismatch));
    }

    #[test]
    fn refactor_on_delete_preserves_tail_and_bumps_version() {
        let chain = chain([5u8; 32]);
        chain.add_files(&[sample_file(0, "f0")]).unwrap();
        chain.add_files(&[sample_file(1, "f1")]).unwrap();
        chain.add_files(&[sample_file(2, "f2")]).unwrap();

        let before = chain.chain_header().unwrap();
        let after = chain.delete_files(&[[1u8; 16]]).unwrap();

        assert_eq!(after.height, 2);
        assert_eq!(after.version, before.version + 1);

        let block0 = chain.read(0).unwrap();
        let block1 = chain.read(1).unwrap();
        let id_of = |b: &DecodedBlock| match &b.records[0] {
            crate::codec::DecodedRecord::File(f) => f.file.id,
            _ => panic!("expected file"),
        };
        assert_eq!(id_of(&block0), [0u8; 16]);
        assert_eq!(id_of(&block1), [2u8; 16]);
        assert!(matches!(chain.read(2).unwrap_err(), ChainError::BlockNotFound));
    }

    #[test]
    fn delete_chain_resets_height_and_bumps_version() {
        let chain = chain([6u8; 32]);
        chain.add_files(&[sample_file(0, "f0")]).unwrap();
        let before = chain.chain_header().unwrap();

        let after = chain.delete_chain().unwrap();
        assert_eq!(after.height, 0);
        assert_eq!(after.version, before.version + 1);
    }

    #[test]
    fn profile_write_then_read_field_roundtrips() {
        let chain = chain([7u8; 32]);
        chain
            .profile_write(&[ProfileEntry { field: ProfileField::Name, data: b"Alice".to_vec(), date: 10 }])
            .unwrap();
        let entry = chain.profile_read_field(ProfileField::Name).unwrap().unwrap();
        assert_eq!(entry.data, b"Alice");
    }

    #[test]
    fn profile_write_last_write_wins() {
        let chain = chain([8u8; 32]);
        chain
            .profile_write(&[ProfileEntry { field: ProfileField::Name, data: b"Alice".to_vec(), date: 10 }])
            .unwrap();
        chain
            .profile_write(&[ProfileEntry { field: ProfileField::Name, data: b"Bob".to_vec(), date: 20 }])
            .unwrap();
        let entry = chain.profile_read_field(ProfileField::Name).unwrap().unwrap();
        assert_eq!(entry.data, b"Bob");
    }
}
