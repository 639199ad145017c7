//! `IterateDeleteRecord`: the record-level refactor-on-delete protocol,
//! the hardest routine in PersonalChain. Re-derives every block from the
//! first one actually touched onward: new version, new block numbers,
//! re-signed, re-chained previous-hashes.

use crate::codec::{
    decode_block, encode_block, encode_file_records, BlockRecordRaw, DatedFileRecord, RecordType,
};
use crate::kv::KvStore;
use crate::types::Hash;

use super::error::ChainError;
use super::header::ChainHeader;
use super::block_key;

/// What a refactor callback decides for one record.
pub enum RecordAction<T> {
    Keep,
    Delete,
    Replace(T),
    /// Aborts the entire refactor; the chain is left completely unchanged.
    Corrupt,
}

/// Runs the refactor-on-delete protocol over every block
/// `0..header.height`, driving `file_callback` across each decoded file
/// record and `other_callback` across every remaining raw record that is
/// neither a file nor a (purely internal) tag-data record.
///
/// Holds no lock itself. Callers (`PersonalChain`) are expected to
/// serialize this against `Append`/`IterateDeleteRecord`/`DeleteChain`
/// with their own mutex.
pub fn iterate_delete_record(
    store: &dyn KvStore,
    secret_key: &[u8; 32],
    header: &ChainHeader,
    mut file_callback: impl FnMut(&DatedFileRecord) -> RecordAction<DatedFileRecord>,
    mut other_callback: impl FnMut(&BlockRecordRaw) -> RecordAction<BlockRecordRaw>,
) -> Result<ChainHeader, ChainError> {
    let old_height = header.height;
    let new_version = header.version + 1;

    // Stage 1: decide per-block survival/change without touching storage.
    struct StagedBlock {
        records: Vec<BlockRecordRaw>,
        changed: bool,
    }

    let mut staged: Vec<StagedBlock> = Vec::with_capacity(old_height as usize);

    for number in 0..old_height {
        let raw = store
            .get(&block_key(number))?
            .ok_or(ChainError::BlockNotFound)?;
        let block = decode_block(&raw)?;

        let files = crate::codec::decode_file_records(&block.records)?;
        let mut surviving_files = Vec::with_capacity(files.len());
        let mut changed = false;

        for file in &files {
            match file_callback(file) {
                RecordAction::Keep => surviving_files.push(file.clone()),
                RecordAction::Delete => changed = true,
                RecordAction::Replace(new_file) => {
                    surviving_files.push(new_file);
                    changed = true;
                }
                RecordAction::Corrupt => {
                    return Err(ChainError::CorruptBlockRecord(format!(
                        "file callback rejected a record in block {number}"
                    )))
                }
            }
        }

        let mut surviving_other = Vec::new();
        for raw_record in &block.records {
            if raw_record.r#type == RecordType::File as u8
                || raw_record.r#type == RecordType::TagData as u8
            {
                continue;
            }
            match other_callback(raw_record) {
                RecordAction::Keep => surviving_other.push(raw_record.clone()),
                RecordAction::Delete => changed = true,
                RecordAction::Replace(replacement) => {
                    surviving_other.push(replacement);
                    changed = true;
                }
                RecordAction::Corrupt => {
                    return Err(ChainError::CorruptBlockRecord(format!(
                        "record callback rejected a record in block {number}"
                    )))
                }
            }
        }

        let mut new_records = encode_file_records(&surviving_files)?;
        new_records.extend(surviving_other);

        staged.push(StagedBlock { records: new_records, changed });
    }

    let first_changed = staged.iter().position(|b| b.changed || b.records.is_empty());

    let Some(first_changed) = first_changed else {
        // Nothing actually changed: leave the chain untouched.
        return Ok(header.clone());
    };

    // Stage 2: re-encode every block from `first_changed` on, dropping
    // any that became empty, renumbering consecutively.
    let mut prev_hash = if first_changed == 0 {
        Hash::zero()
    } else {
        let raw = store
            .get(&block_key(first_changed as u64 - 1))?
            .ok_or(ChainError::BlockNotFound)?;
        Hash::compute(&raw)
    };

    let mut new_number = first_changed as u64;
    let mut rewritten: Vec<(u64, Vec<u8>)> = Vec::new();

    for block in &staged[first_changed..] {
        if block.records.is_empty() {
            // Block vanished entirely; does not occupy a new slot.
            continue;
        }
        let encoded = encode_block(prev_hash, new_version, new_number, &block.records, secret_key)?;
        prev_hash = Hash::compute(&encoded);
        rewritten.push((new_number, encoded));
        new_number += 1;
    }

    let new_height = new_number;

    for (number, encoded) in &rewritten {
        store.set(&block_key(*number), encoded)?;
    }

    for orphan in new_height..old_height {
        store.delete(&block_key(orphan))?;
    }

    let new_header = ChainHeader::sign(new_height, new_version, secret_key)?;
    store.set(super::header::HEADER_KEY, &new_header.encode())?;

    Ok(new_header)
}
