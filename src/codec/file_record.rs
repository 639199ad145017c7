//! File records: the Type=File raw record payload, its tag list, and the
//! tag-data reference compression pass across a whole block's worth of
//! file records.

use std::collections::HashMap;

use super::error::CodecError;
use super::record::{BlockRecordRaw, RecordType};
use crate::types::{Hash, HASH_LEN};

/// Byte length of a file record's fixed-width header (everything before
/// the tag sequence).
pub const FILE_HEADER_LEN: usize = 32 + 16 + 32 + 8 + 1 + 2 + 8 + 2;

/// A tag's semantic type. The wire representation is a `u16`; the top
/// bit is reserved to flag "payload is a tag-data reference" and is
/// never part of this enum's value space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TagType {
    Name = 0,
    Folder = 1,
    Description = 2,
    DateShared = 3,
    DateCreated = 4,
    SharedByCount = 5,
    SharedByGeoIp = 6,
}

impl TagType {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(TagType::Name),
            1 => Some(TagType::Folder),
            2 => Some(TagType::Description),
            3 => Some(TagType::DateShared),
            4 => Some(TagType::DateCreated),
            5 => Some(TagType::SharedByCount),
            6 => Some(TagType::SharedByGeoIp),
            _ => None,
        }
    }

    /// Virtual tags are synthesized on decode or injected by API layers;
    /// they must never be written back out on encode.
    pub fn is_virtual(self) -> bool {
        matches!(
            self,
            TagType::DateShared | TagType::SharedByCount | TagType::SharedByGeoIp
        )
    }
}

/// Reference bit (top bit of the 16-bit wire tag type).
const TAG_REFERENCE_BIT: u16 = 0x8000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub tag_type: u16,
    pub payload: Vec<u8>,
}

impl Tag {
    pub fn new(tag_type: TagType, payload: Vec<u8>) -> Self {
        Self { tag_type: tag_type as u16, payload }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRecord {
    pub hash: Hash,
    pub id: [u8; 16],
    pub merkle_root: Hash,
    pub fragment_size: u64,
    pub file_type: u8,
    pub file_format: u16,
    pub size: u64,
    pub tags: Vec<Tag>,
}

/// A file to be appended, alongside the date that will become its
/// enclosing raw record's `date` (and thus its synthesized `DateShared`
/// virtual tag on decode).
#[derive(Clone, Debug)]
pub struct DatedFileRecord {
    pub file: FileRecord,
    pub date: i64,
}

fn smallest_signed_width(distance: i64) -> (usize, Vec<u8>) {
    if let Ok(v) = i16::try_from(distance) {
        (2, v.to_le_bytes().to_vec())
    } else if let Ok(v) = i32::try_from(distance) {
        (4, v.to_le_bytes().to_vec())
    } else {
        (8, distance.to_le_bytes().to_vec())
    }
}

fn encode_fixed_header(file: &FileRecord, tag_count: u16, out: &mut Vec<u8>) {
    out.extend_from_slice(file.hash.as_bytes());
    out.extend_from_slice(&file.id);
    out.extend_from_slice(file.merkle_root.as_bytes());
    out.extend_from_slice(&file.fragment_size.to_le_bytes());
    out.push(file.file_type);
    out.extend_from_slice(&file.file_format.to_le_bytes());
    out.extend_from_slice(&file.size.to_le_bytes());
    out.extend_from_slice(&tag_count.to_le_bytes());
}

/// Encodes a batch of files into the block's raw record stream,
/// performing the tag-data reference compression pass: any non-virtual
/// tag payload longer than 4 bytes that recurs (byte-for-byte) across
/// two or more tags in this batch is hoisted into a single `TagData` raw
/// record, emitted first. Every occurrence, not only the ones after the
/// first, becomes a reference tag, since the two-pass design decides
/// hoisting globally before any file record is emitted.
pub fn encode_file_records(files: &[DatedFileRecord]) -> Result<Vec<BlockRecordRaw>, CodecError> {
    // Pass 1: count occurrences of every non-virtual tag payload long
    // enough to be worth hoisting, and remember where each was first seen.
    let mut occurrence_count: HashMap<Vec<u8>, usize> = HashMap::new();
    let mut first_seen_file: HashMap<Vec<u8>, usize> = HashMap::new();

    for (file_index, dated) in files.iter().enumerate() {
        for tag in &dated.file.tags {
            let Some(tag_type) = TagType::from_u16(tag.tag_type) else {
                continue;
            };
            if tag_type.is_virtual() || tag.payload.len() <= 4 {
                continue;
            }
            *occurrence_count.entry(tag.payload.clone()).or_insert(0) += 1;
            first_seen_file.entry(tag.payload.clone()).or_insert(file_index);
        }
    }

    // Stable hoist order: first-seen-file, then first-seen-within-file.
    let mut hoisted: Vec<Vec<u8>> = occurrence_count
        .iter()
        .filter(|(_, &count)| count >= 2)
        .map(|(payload, _)| payload.clone())
        .collect();
    hoisted.sort_by_key(|payload| {
        let file_index = first_seen_file[payload];
        let within_file = files[file_index]
            .file
            .tags
            .iter()
            .position(|t| t.payload == *payload)
            .unwrap_or(0);
        (file_index, within_file)
    });

    let tag_data_index_of: HashMap<&[u8], usize> = hoisted
        .iter()
        .enumerate()
        .map(|(index, payload)| (payload.as_slice(), index))
        .collect();

    let mut out = Vec::with_capacity(hoisted.len() + files.len());

    // TagData records occupy indices [0, hoisted.len()).
    for payload in &hoisted {
        let file_index = first_seen_file[payload];
        out.push(BlockRecordRaw::new(
            RecordType::TagData as u8,
            files[file_index].date,
            payload.clone(),
        ));
    }

    // File records occupy indices [hoisted.len(), hoisted.len() + files.len()).
    for (offset, dated) in files.iter().enumerate() {
        let file_output_index = hoisted.len() + offset;
        let mut tag_count: u16 = 0;
        let mut tag_bytes = Vec::new();

        for tag in &dated.file.tags {
            let Some(tag_type) = TagType::from_u16(tag.tag_type) else {
                // Unknown future tag types still serialize literally;
                // only the well-known virtual set is stripped.
                encode_literal_tag(tag.tag_type, &tag.payload, &mut tag_bytes)?;
                tag_count += 1;
                continue;
            };
            if tag_type.is_virtual() {
                continue;
            }

            if let Some(&tag_data_index) = tag_data_index_of.get(tag.payload.as_slice()) {
                let distance = tag_data_index as i64 - file_output_index as i64;
                let (width, bytes) = smallest_signed_width(distance);
                let _ = width;
                encode_reference_tag(tag.tag_type, &bytes, &mut tag_bytes)?;
            } else {
                encode_literal_tag(tag.tag_type, &tag.payload, &mut tag_bytes)?;
            }
            tag_count += 1;
        }

        let mut payload = Vec::with_capacity(FILE_HEADER_LEN + tag_bytes.len());
        encode_fixed_header(&dated.file, tag_count, &mut payload);
        payload.extend_from_slice(&tag_bytes);

        out.push(BlockRecordRaw::new(
            RecordType::File as u8,
            dated.date,
            payload,
        ));
    }

    Ok(out)
}

fn encode_literal_tag(tag_type: u16, payload: &[u8], out: &mut Vec<u8>) -> Result<(), CodecError> {
    if payload.len() > u32::MAX as usize {
        return Err(CodecError::RecordOverflow);
    }
    out.extend_from_slice(&tag_type.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    Ok(())
}

fn encode_reference_tag(tag_type: u16, distance_bytes: &[u8], out: &mut Vec<u8>) -> Result<(), CodecError> {
    let wire_type = tag_type | TAG_REFERENCE_BIT;
    out.extend_from_slice(&wire_type.to_le_bytes());
    out.extend_from_slice(&(distance_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(distance_bytes);
    Ok(())
}

/// Decodes every `File` raw record in `raw_records`, resolving tag-data
/// references against the full record list and synthesizing the virtual
/// `DateShared` tag from each file's enclosing record date.
pub fn decode_file_records(raw_records: &[BlockRecordRaw]) -> Result<Vec<DatedFileRecord>, CodecError> {
    let mut out = Vec::new();

    for (index, record) in raw_records.iter().enumerate() {
        if record.r#type != RecordType::File as u8 {
            continue;
        }
        let file = decode_one_file_record(record, index, raw_records)?;
        out.push(DatedFileRecord { file, date: record.date });
    }

    Ok(out)
}

fn decode_one_file_record(
    record: &BlockRecordRaw,
    record_index: usize,
    raw_records: &[BlockRecordRaw],
) -> Result<FileRecord, CodecError> {
    let buf = &record.payload;
    if buf.len() < FILE_HEADER_LEN {
        return Err(CodecError::ShortBuffer);
    }

    let hash = Hash::from_slice(&buf[0..32]).ok_or(CodecError::ShortBuffer)?;
    let mut id = [0u8; 16];
    id.copy_from_slice(&buf[32..48]);
    let merkle_root = Hash::from_slice(&buf[48..80]).ok_or(CodecError::ShortBuffer)?;
    let fragment_size = u64::from_le_bytes(buf[80..88].try_into().unwrap());
    let file_type = buf[88];
    let file_format = u16::from_le_bytes(buf[89..91].try_into().unwrap());
    let size = u64::from_le_bytes(buf[91..99].try_into().unwrap());
    let tag_count = u16::from_le_bytes(buf[99..101].try_into().unwrap());

    let mut tags = Vec::with_capacity(tag_count as usize);
    let mut cursor = FILE_HEADER_LEN;

    for _ in 0..tag_count {
        if buf.len() < cursor + 6 {
            return Err(CodecError::ShortBuffer);
        }
        let wire_type = u16::from_le_bytes(buf[cursor..cursor + 2].try_into().unwrap());
        let payload_size =
            u32::from_le_bytes(buf[cursor + 2..cursor + 6].try_into().unwrap()) as usize;
        let payload_start = cursor + 6;
        let payload_end = payload_start
            .checked_add(payload_size)
            .ok_or(CodecError::RecordOverflow)?;
        if buf.len() < payload_end {
            return Err(CodecError::ShortBuffer);
        }
        let raw_payload = &buf[payload_start..payload_end];
        let is_reference = wire_type & TAG_REFERENCE_BIT != 0;
        let tag_type = wire_type & !TAG_REFERENCE_BIT;

        let payload = if is_reference {
            let distance = match raw_payload.len() {
                2 => i16::from_le_bytes(raw_payload.try_into().unwrap()) as i64,
                4 => i32::from_le_bytes(raw_payload.try_into().unwrap()) as i64,
                8 => i64::from_le_bytes(raw_payload.try_into().unwrap()),
                _ => return Err(CodecError::TagReferenceOutOfBounds),
            };
            let target = record_index as i64 + distance;
            if target < 0 || target as usize >= raw_records.len() {
                return Err(CodecError::TagReferenceOutOfBounds);
            }
            let target_record = &raw_records[target as usize];
            if target_record.r#type != RecordType::TagData as u8 {
                return Err(CodecError::TagReferenceWrongType);
            }
            target_record.payload.clone()
        } else {
            raw_payload.to_vec()
        };

        tags.push(Tag { tag_type, payload });
        cursor = payload_end;
    }

    // Synthesize the virtual DateShared tag from the enclosing record's date.
    tags.push(Tag::new(TagType::DateShared, record.date.to_le_bytes().to_vec()));

    Ok(FileRecord {
        hash,
        id,
        merkle_root,
        fragment_size,
        file_type,
        file_format,
        size,
        tags,
    })
}

/// Minimum possible byte length of an encoded file payload (fixed header,
/// zero tags).
pub const MIN_FILE_RECORD_LEN: usize = FILE_HEADER_LEN;
const _: () = assert!(MIN_FILE_RECORD_LEN == 101);
const _: () = assert!(HASH_LEN == 32);

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_file(byte: u8, folder: &[u8]) -> FileRecord {
        FileRecord {
            hash: Hash::compute(&[byte]),
            id: [byte; 16],
            merkle_root: Hash::zero(),
            fragment_size: 0,
            file_type: 1,
            file_format: 0,
            size: 5,
            tags: vec![
                Tag::new(TagType::Name, format!("file-{byte}").into_bytes()),
                Tag::new(TagType::Folder, folder.to_vec()),
            ],
        }
    }

    #[test]
    fn round_trips_without_duplicate_tags() {
        let files = vec![DatedFileRecord { file: dummy_file(1, b"short"), date: 1000 }];
        let raw = encode_file_records(&files).unwrap();
        let decoded = decode_file_records(&raw).unwrap();

        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].file.hash, files[0].file.hash);
        assert!(decoded[0]
            .file
            .tags
            .iter()
            .any(|t| t.tag_type == TagType::DateShared as u16));
    }

    #[test]
    fn duplicated_folder_tag_hoisted_to_single_tag_data_record() {
        let folder = b"documents/sub folder".to_vec(); // > 4 bytes
        let files = vec![
            DatedFileRecord { file: dummy_file(1, &folder), date: 1000 },
            DatedFileRecord { file: dummy_file(2, &folder), date: 2000 },
        ];

        let raw = encode_file_records(&files).unwrap();
        let tag_data_count = raw
            .iter()
            .filter(|r| r.r#type == RecordType::TagData as u8)
            .count();
        assert_eq!(tag_data_count, 1);

        let decoded = decode_file_records(&raw).unwrap();
        assert_eq!(decoded.len(), 2);
        for dated in &decoded {
            let folder_tag = dated
                .file
                .tags
                .iter()
                .find(|t| t.tag_type == TagType::Folder as u16)
                .unwrap();
            assert_eq!(folder_tag.payload, folder);
        }
    }

    #[test]
    fn short_non_duplicated_tag_stays_literal() {
        let files = vec![
            DatedFileRecord { file: dummy_file(1, b"abcd"), date: 1000 },
            DatedFileRecord { file: dummy_file(2, b"abcd"), date: 1000 },
        ];
        // "abcd" is exactly 4 bytes, at the ">4 bytes" hoist threshold
        // boundary, so it must never be hoisted even though it repeats.
        let raw = encode_file_records(&files).unwrap();
        let tag_data_count = raw
            .iter()
            .filter(|r| r.r#type == RecordType::TagData as u8)
            .count();
        assert_eq!(tag_data_count, 0);
    }
}
