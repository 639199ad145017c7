//! Raw block records: the `u8 type | i64 date | u32 payload-size |
//! payload` header shared by every record kind before its payload is
//! interpreted.

use super::error::CodecError;

/// Byte length of a raw record's fixed header (`type` + `date` +
/// `payload-size`).
pub const RAW_HEADER_LEN: usize = 13;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    Profile = 0,
    TagData = 1,
    File = 2,
    Certificate = 4,
    ContentRating = 5,
    ContentReport = 6,
}

impl RecordType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(RecordType::Profile),
            1 => Some(RecordType::TagData),
            2 => Some(RecordType::File),
            4 => Some(RecordType::Certificate),
            5 => Some(RecordType::ContentRating),
            6 => Some(RecordType::ContentReport),
            _ => None,
        }
    }
}

/// An opaque block record: the unit actually persisted in a block's
/// record stream, before any type-specific payload parsing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockRecordRaw {
    pub r#type: u8,
    /// Creation date in Unix seconds, preserved verbatim across refactors.
    pub date: i64,
    pub payload: Vec<u8>,
}

impl BlockRecordRaw {
    pub fn new(r#type: u8, date: i64, payload: Vec<u8>) -> Self {
        Self { r#type, date, payload }
    }

    fn encoded_len(&self) -> usize {
        RAW_HEADER_LEN + self.payload.len()
    }
}

/// Encodes `records` into the record stream following offset 119 of a
/// block. Does not include the record count prefix; callers write that
/// separately into the block header.
pub fn encode_records(records: &[BlockRecordRaw]) -> Result<Vec<u8>, CodecError> {
    if records.len() > u16::MAX as usize {
        return Err(CodecError::RecordOverflow);
    }
    let total_len: usize = records.iter().map(BlockRecordRaw::encoded_len).sum();
    let mut buf = Vec::with_capacity(total_len);

    for record in records {
        if record.payload.len() > u32::MAX as usize {
            return Err(CodecError::RecordOverflow);
        }
        buf.push(record.r#type);
        buf.extend_from_slice(&record.date.to_le_bytes());
        buf.extend_from_slice(&(record.payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&record.payload);
    }
    Ok(buf)
}

/// Parses exactly `count` raw records out of `buf`, enforcing bounds at
/// every step. Type `3` is rejected as reserved/invalid; any other
/// unrecognized type is carried through opaquely (future record kinds).
pub fn decode_records(buf: &[u8], count: u16) -> Result<Vec<BlockRecordRaw>, CodecError> {
    let mut records = Vec::with_capacity(count as usize);
    let mut cursor = 0usize;

    for _ in 0..count {
        if buf.len() < cursor + RAW_HEADER_LEN {
            return Err(CodecError::ShortBuffer);
        }
        let r#type = buf[cursor];
        if r#type == 3 {
            return Err(CodecError::UnknownFormat);
        }
        let date = i64::from_le_bytes(buf[cursor + 1..cursor + 9].try_into().unwrap());
        let payload_size =
            u32::from_le_bytes(buf[cursor + 9..cursor + 13].try_into().unwrap()) as usize;
        let payload_start = cursor + RAW_HEADER_LEN;
        let payload_end = payload_start
            .checked_add(payload_size)
            .ok_or(CodecError::RecordOverflow)?;
        if buf.len() < payload_end {
            return Err(CodecError::ShortBuffer);
        }
        let payload = buf[payload_start..payload_end].to_vec();
        records.push(BlockRecordRaw { r#type, date, payload });
        cursor = payload_end;
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_roundtrips() {
        let records = vec![
            BlockRecordRaw::new(0, 100, b"profile-payload".to_vec()),
            BlockRecordRaw::new(2, 200, b"file-payload".to_vec()),
        ];
        let encoded = encode_records(&records).unwrap();
        let decoded = decode_records(&encoded, records.len() as u16).unwrap();
        assert_eq!(decoded, records);
    }

    #[test]
    fn decode_rejects_reserved_type_three() {
        let mut buf = Vec::new();
        buf.push(3u8);
        buf.extend_from_slice(&0i64.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        let err = decode_records(&buf, 1).unwrap_err();
        assert_eq!(err, CodecError::UnknownFormat);
    }

    #[test]
    fn decode_rejects_truncated_payload() {
        let mut buf = Vec::new();
        buf.push(2u8);
        buf.extend_from_slice(&0i64.to_le_bytes());
        buf.extend_from_slice(&10u32.to_le_bytes());
        buf.extend_from_slice(b"short"); // declares 10 bytes, has 5
        let err = decode_records(&buf, 1).unwrap_err();
        assert_eq!(err, CodecError::ShortBuffer);
    }
}
