//! Profile records: `u16 field | data`, one raw record per field,
//! last-write-wins across the chain's lifetime.

use super::error::CodecError;
use super::record::{BlockRecordRaw, RecordType};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ProfileField {
    Name = 0,
    Email = 1,
    Website = 2,
    Twitter = 3,
    YouTube = 4,
    Address = 5,
    Picture = 6,
}

impl ProfileField {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(ProfileField::Name),
            1 => Some(ProfileField::Email),
            2 => Some(ProfileField::Website),
            3 => Some(ProfileField::Twitter),
            4 => Some(ProfileField::YouTube),
            5 => Some(ProfileField::Address),
            6 => Some(ProfileField::Picture),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileEntry {
    pub field: ProfileField,
    pub data: Vec<u8>,
    pub date: i64,
}

/// Encodes profile entries as one `Profile`-type raw record per entry.
pub fn encode_profile_records(entries: &[ProfileEntry]) -> Result<Vec<BlockRecordRaw>, CodecError> {
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.data.len() > u32::MAX as usize {
            return Err(CodecError::RecordOverflow);
        }
        let mut payload = Vec::with_capacity(2 + entry.data.len());
        payload.extend_from_slice(&(entry.field as u16).to_le_bytes());
        payload.extend_from_slice(&entry.data);
        out.push(BlockRecordRaw::new(RecordType::Profile as u8, entry.date, payload));
    }
    Ok(out)
}

/// Decodes a single `Profile`-type raw record, returning `None` when its
/// field id is not in the recognized set (future fields are not
/// meaningful without a richer profile schema to place them in; callers
/// operating purely at the raw-record level still see them via
/// [`crate::codec::decoded::decode_all`]'s `Unknown` variant). `record`
/// must already be known to be of type `Profile`.
pub(crate) fn decode_one_profile_record(
    record: &BlockRecordRaw,
) -> Result<Option<ProfileEntry>, CodecError> {
    if record.payload.len() < 2 {
        return Err(CodecError::ShortBuffer);
    }
    let field_id = u16::from_le_bytes(record.payload[0..2].try_into().unwrap());
    let Some(field) = ProfileField::from_u16(field_id) else {
        return Ok(None);
    };
    Ok(Some(ProfileEntry {
        field,
        data: record.payload[2..].to_vec(),
        date: record.date,
    }))
}

/// Decodes every `Profile`-type raw record in `raw_records`, skipping
/// records whose field id is not recognized.
pub fn decode_profile_records(raw_records: &[BlockRecordRaw]) -> Result<Vec<ProfileEntry>, CodecError> {
    let mut out = Vec::new();
    for record in raw_records {
        if record.r#type != RecordType::Profile as u8 {
            continue;
        }
        if let Some(entry) = decode_one_profile_record(record)? {
            out.push(entry);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrips() {
        let entries = vec![
            ProfileEntry { field: ProfileField::Name, data: b"Alice".to_vec(), date: 10 },
            ProfileEntry { field: ProfileField::Email, data: b"a@example.com".to_vec(), date: 20 },
        ];
        let raw = encode_profile_records(&entries).unwrap();
        let decoded = decode_profile_records(&raw).unwrap();
        assert_eq!(decoded, entries);
    }

    #[test]
    fn unrecognized_field_is_skipped_not_erroring() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&99u16.to_le_bytes());
        payload.extend_from_slice(b"ignored");
        let raw = vec![BlockRecordRaw::new(RecordType::Profile as u8, 5, payload)];
        let decoded = decode_profile_records(&raw).unwrap();
        assert!(decoded.is_empty());
    }
}
