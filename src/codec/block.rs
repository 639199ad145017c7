//! The signed binary block format:
//!
//! ```text
//! 0    65   signature
//! 65   32   previous-block hash
//! 97   8    blockchain version
//! 105  8    block number
//! 113  4    total encoded size
//! 117  2    record count
//! 119  …    record stream
//! ```
//!
//! Each field's byte range is named explicitly rather than derived
//! through a serde/bincode layer, since the wire format here is fixed
//! rather than left to a serializer's discretion.

use crate::crypto;
use crate::types::{Hash, NodeId, PublicKey, Signature, HASH_LEN, SIGNATURE_LEN};

use super::error::CodecError;
use super::record::{decode_records, encode_records, BlockRecordRaw};

const OFF_SIGNATURE: (usize, usize) = (0, 65);
const OFF_PREV_HASH: (usize, usize) = (65, 97);
const OFF_VERSION: (usize, usize) = (97, 105);
const OFF_NUMBER: (usize, usize) = (105, 113);
const OFF_SIZE: (usize, usize) = (113, 117);
const OFF_RECORD_COUNT: (usize, usize) = (117, 119);
const RECORD_STREAM_START: usize = 119;

/// Minimum length of any validly encoded block (header with zero records).
pub const MIN_BLOCK_LEN: usize = RECORD_STREAM_START;

/// A decoded block: the owner key and node id are derived from the
/// signature rather than stored redundantly inside the payload, so the
/// recovered key is checked against the claimed owner rather than trusted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub owner_public_key: PublicKey,
    pub node_id: NodeId,
    pub prev_block_hash: Hash,
    pub version: u64,
    pub number: u64,
    pub records: Vec<BlockRecordRaw>,
}

/// Encodes `records` into a signed block at `(version, number)`, chained
/// after `prev_block_hash` (zero for block 0). Signs
/// `BLAKE3(body[65..])` with `secret_key` and writes the resulting
/// signature at offset 0.
pub fn encode_block(
    prev_block_hash: Hash,
    version: u64,
    number: u64,
    records: &[BlockRecordRaw],
    secret_key: &[u8; 32],
) -> Result<Vec<u8>, CodecError> {
    if records.is_empty() {
        return Err(CodecError::EmptyRecords);
    }
    if records.len() > u16::MAX as usize {
        return Err(CodecError::RecordOverflow);
    }

    let record_stream = encode_records(records)?;
    let total_len = RECORD_STREAM_START + record_stream.len();
    if total_len > u32::MAX as usize {
        return Err(CodecError::RecordOverflow);
    }

    let mut buf = vec![0u8; total_len];
    buf[OFF_PREV_HASH.0..OFF_PREV_HASH.1].copy_from_slice(prev_block_hash.as_bytes());
    buf[OFF_VERSION.0..OFF_VERSION.1].copy_from_slice(&version.to_le_bytes());
    buf[OFF_NUMBER.0..OFF_NUMBER.1].copy_from_slice(&number.to_le_bytes());
    buf[OFF_SIZE.0..OFF_SIZE.1].copy_from_slice(&(total_len as u32).to_le_bytes());
    buf[OFF_RECORD_COUNT.0..OFF_RECORD_COUNT.1]
        .copy_from_slice(&(records.len() as u16).to_le_bytes());
    buf[RECORD_STREAM_START..].copy_from_slice(&record_stream);

    let digest = Hash::compute(&buf[OFF_SIGNATURE.1..]);
    let signature =
        crypto::sign_compact(secret_key, &digest).map_err(|_| CodecError::InvalidSignature)?;
    buf[OFF_SIGNATURE.0..OFF_SIGNATURE.1].copy_from_slice(signature.as_bytes());

    Ok(buf)
}

/// Decodes and authenticates a block: recovers the owner public key from
/// the signature, derives the node id, validates the declared size, and
/// parses the record stream with bounds checks throughout.
pub fn decode_block(buf: &[u8]) -> Result<Block, CodecError> {
    if buf.len() < MIN_BLOCK_LEN {
        return Err(CodecError::ShortBuffer);
    }

    let declared_size =
        u32::from_le_bytes(buf[OFF_SIZE.0..OFF_SIZE.1].try_into().unwrap()) as usize;
    if declared_size != buf.len() {
        return Err(CodecError::SizeMismatch);
    }

    let signature = Signature::from_slice(&buf[OFF_SIGNATURE.0..OFF_SIGNATURE.1])
        .ok_or(CodecError::ShortBuffer)?;
    let digest = Hash::compute(&buf[OFF_SIGNATURE.1..]);
    let owner_public_key =
        crypto::recover_public_key(&signature, &digest).map_err(|_| CodecError::InvalidSignature)?;
    let node_id = NodeId::from_public_key(&owner_public_key);

    let prev_block_hash = Hash::from_slice(&buf[OFF_PREV_HASH.0..OFF_PREV_HASH.1])
        .ok_or(CodecError::ShortBuffer)?;
    let version = u64::from_le_bytes(buf[OFF_VERSION.0..OFF_VERSION.1].try_into().unwrap());
    let number = u64::from_le_bytes(buf[OFF_NUMBER.0..OFF_NUMBER.1].try_into().unwrap());
    let record_count =
        u16::from_le_bytes(buf[OFF_RECORD_COUNT.0..OFF_RECORD_COUNT.1].try_into().unwrap());

    let records = decode_records(&buf[RECORD_STREAM_START..], record_count)?;

    Ok(Block {
        owner_public_key,
        node_id,
        prev_block_hash,
        version,
        number,
        records,
    })
}

const _: () = assert!(HASH_LEN == 32);
const _: () = assert!(SIGNATURE_LEN == 65);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::record::RecordType;

    fn fixed_secret(byte: u8) -> [u8; 32] {
        [byte; 32]
    }

    #[test]
    fn encode_then_decode_roundtrips_modulo_node_id() {
        let sk = fixed_secret(7);
        let records = vec![BlockRecordRaw::new(2, 123, b"payload".to_vec())];

        let encoded = encode_block(Hash::zero(), 0, 0, &records, &sk).unwrap();
        let decoded = decode_block(&encoded).unwrap();

        assert_eq!(decoded.version, 0);
        assert_eq!(decoded.number, 0);
        assert_eq!(decoded.records, records);
        assert_eq!(
            decoded.node_id,
            NodeId::from_public_key(&decoded.owner_public_key)
        );
    }

    #[test]
    fn decode_rejects_tampered_size_field() {
        let sk = fixed_secret(1);
        let records = vec![BlockRecordRaw::new(RecordType::File as u8, 1, vec![0u8; 10])];
        let mut encoded = encode_block(Hash::zero(), 0, 0, &records, &sk).unwrap();
        encoded[113] ^= 0xFF;
        assert_eq!(decode_block(&encoded).unwrap_err(), CodecError::SizeMismatch);
    }

    #[test]
    fn decode_rejects_short_buffer() {
        assert_eq!(decode_block(&[0u8; 10]).unwrap_err(), CodecError::ShortBuffer);
    }

    #[test]
    fn encode_rejects_empty_records() {
        let sk = fixed_secret(1);
        assert_eq!(
            encode_block(Hash::zero(), 0, 0, &[], &sk).unwrap_err(),
            CodecError::EmptyRecords
        );
    }

    #[test]
    fn chained_block_prev_hash_matches_encoded_predecessor() {
        let sk = fixed_secret(3);
        let records0 = vec![BlockRecordRaw::new(2, 1, b"a".to_vec())];
        let block0 = encode_block(Hash::zero(), 0, 0, &records0, &sk).unwrap();
        let prev_hash = Hash::compute(&block0);

        let records1 = vec![BlockRecordRaw::new(2, 2, b"b".to_vec())];
        let block1 = encode_block(prev_hash, 0, 1, &records1, &sk).unwrap();
        let decoded1 = decode_block(&block1).unwrap();

        assert_eq!(decoded1.prev_block_hash, prev_hash);
    }
}
