//! `DecodeAll`: the tagged-union view over a block's records that
//! callers outside the codec actually want.

use super::block::Block;
use super::error::CodecError;
use super::file_record::{decode_file_records, DatedFileRecord};
use super::profile_record::{decode_one_profile_record, ProfileEntry};
use super::record::RecordType;
use crate::types::{NodeId, PublicKey};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodedRecord {
    File(DatedFileRecord),
    Profile(ProfileEntry),
    Certificate { date: i64, raw: Vec<u8> },
    ContentRating { date: i64, raw: Vec<u8> },
    ContentReport { date: i64, raw: Vec<u8> },
    /// A record type not in the recognized set, preserved opaquely for
    /// forward compatibility rather than dropped.
    Unknown { r#type: u8, date: i64, raw: Vec<u8> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedBlock {
    pub owner_public_key: PublicKey,
    pub node_id: NodeId,
    pub version: u64,
    pub number: u64,
    pub records: Vec<DecodedRecord>,
}

impl PartialEq for DatedFileRecord {
    fn eq(&self, other: &Self) -> bool {
        self.date == other.date && self.file == other.file
    }
}
impl Eq for DatedFileRecord {}

/// Produces the decoded view of every record in `block`: file records
/// with references resolved, profile entries, and pass-through payloads
/// for certificate/rating/report records. `TagData` raw records are
/// internal plumbing for file-record compression and are never surfaced
/// here.
pub fn decode_all(block: &Block) -> Result<DecodedBlock, CodecError> {
    let files = decode_file_records(&block.records)?;

    let mut file_iter = files.into_iter();
    let mut records = Vec::with_capacity(block.records.len());

    for raw in &block.records {
        match RecordType::from_u8(raw.r#type) {
            Some(RecordType::TagData) => continue,
            Some(RecordType::File) => {
                if let Some(file) = file_iter.next() {
                    records.push(DecodedRecord::File(file));
                }
            }
            Some(RecordType::Profile) => match decode_one_profile_record(raw)? {
                Some(entry) => records.push(DecodedRecord::Profile(entry)),
                None => records.push(DecodedRecord::Unknown {
                    r#type: raw.r#type,
                    date: raw.date,
                    raw: raw.payload.clone(),
                }),
            },
            Some(RecordType::Certificate) => records.push(DecodedRecord::Certificate {
                date: raw.date,
                raw: raw.payload.clone(),
            }),
            Some(RecordType::ContentRating) => records.push(DecodedRecord::ContentRating {
                date: raw.date,
                raw: raw.payload.clone(),
            }),
            Some(RecordType::ContentReport) => records.push(DecodedRecord::ContentReport {
                date: raw.date,
                raw: raw.payload.clone(),
            }),
            None => records.push(DecodedRecord::Unknown {
                r#type: raw.r#type,
                date: raw.date,
                raw: raw.payload.clone(),
            }),
        }
    }

    Ok(DecodedBlock {
        owner_public_key: block.owner_public_key,
        node_id: block.node_id,
        version: block.version,
        number: block.number,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::block::{decode_block, encode_block};
    use crate::codec::file_record::{encode_file_records, FileRecord, Tag, TagType};
    use crate::codec::record::BlockRecordRaw;
    use crate::types::Hash;

    #[test]
    fn decode_all_yields_file_and_profile_and_skips_tag_data() {
        let sk = [9u8; 32];
        let file = FileRecord {
            hash: Hash::compute(b"content"),
            id: [1u8; 16],
            merkle_root: Hash::zero(),
            fragment_size: 0,
            file_type: 1,
            file_format: 0,
            size: 7,
            tags: vec![Tag::new(TagType::Name, b"hi.txt".to_vec())],
        };
        let dated = super::super::file_record::DatedFileRecord { file, date: 1000 };
        let mut records = encode_file_records(&[dated]).unwrap();

        let mut profile_payload = Vec::new();
        profile_payload.extend_from_slice(&0u16.to_le_bytes());
        profile_payload.extend_from_slice(b"Alice");
        records.push(BlockRecordRaw::new(0, 500, profile_payload));

        let encoded = encode_block(Hash::zero(), 0, 0, &records, &sk).unwrap();
        let block = decode_block(&encoded).unwrap();
        let decoded = decode_all(&block).unwrap();

        let file_count = decoded
            .records
            .iter()
            .filter(|r| matches!(r, DecodedRecord::File(_)))
            .count();
        let profile_count = decoded
            .records
            .iter()
            .filter(|r| matches!(r, DecodedRecord::Profile(_)))
            .count();
        assert_eq!(file_count, 1);
        assert_eq!(profile_count, 1);
    }

    #[test]
    fn unrecognized_profile_field_does_not_misalign_following_records() {
        let sk = [9u8; 32];

        let mut unrecognized_payload = Vec::new();
        unrecognized_payload.extend_from_slice(&99u16.to_le_bytes());
        unrecognized_payload.extend_from_slice(b"ignored");

        let mut recognized_payload = Vec::new();
        recognized_payload.extend_from_slice(&1u16.to_le_bytes());
        recognized_payload.extend_from_slice(b"a@example.com");

        let records = vec![
            BlockRecordRaw::new(0, 100, unrecognized_payload),
            BlockRecordRaw::new(0, 200, recognized_payload),
        ];

        let encoded = encode_block(Hash::zero(), 0, 0, &records, &sk).unwrap();
        let block = decode_block(&encoded).unwrap();
        let decoded = decode_all(&block).unwrap();

        assert_eq!(decoded.records.len(), 2);
        assert!(matches!(decoded.records[0], DecodedRecord::Unknown { .. }));
        match &decoded.records[1] {
            DecodedRecord::Profile(entry) => {
                assert_eq!(entry.field, super::super::profile_record::ProfileField::Email);
                assert_eq!(entry.data, b"a@example.com");
            }
            other => panic!("expected a recognized profile entry, got {other:?}"),
        }
    }
}
