//! Component A: the signed binary block format, block/record encoding
//! and decoding, and tag-data reference compression.

pub mod block;
pub mod decoded;
pub mod error;
pub mod file_record;
pub mod profile_record;
pub mod record;

pub use block::{decode_block, encode_block, Block};
pub use decoded::{decode_all, DecodedBlock, DecodedRecord};
pub use error::CodecError;
pub use file_record::{decode_file_records, encode_file_records, DatedFileRecord, FileRecord, Tag, TagType};
pub use profile_record::{decode_profile_records, encode_profile_records, ProfileEntry, ProfileField};
pub use record::{decode_records, encode_records, BlockRecordRaw, RecordType};
