//! The per-chain header MultiStore persists alongside cached blocks:
//!
//! ```text
//! 0   8   version
//! 8   8   height
//! 16  8   stored-block count
//! 24  8   date first ingested (unix)
//! 32  8   date last ingested  (unix)
//! 40  8   stats.countFiles
//! 48  8   stats.sumFileSizes
//! 56  …   stored block numbers (u64 each, count from offset 16)
//! ```

use crate::types::PublicKey;

use super::error::MultiStoreError;

const FIXED_LEN: usize = 56;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChainStats {
    pub count_files: u64,
    pub sum_file_sizes: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainHeader {
    pub owner_public_key: PublicKey,
    pub version: u64,
    pub height: u64,
    pub date_first_ingested: i64,
    pub date_last_ingested: i64,
    pub stats: ChainStats,
    /// Explicit ordered list of block numbers currently stored; the
    /// cache may be sparse.
    pub block_numbers: Vec<u64>,
}

impl ChainHeader {
    /// Seeds a freshly observed chain: `now == first == last`.
    pub fn new(owner_public_key: PublicKey, version: u64, height: u64, now: i64) -> Self {
        Self {
            owner_public_key,
            version,
            height,
            date_first_ingested: now,
            date_last_ingested: now,
            stats: ChainStats::default(),
            block_numbers: Vec::new(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FIXED_LEN + self.block_numbers.len() * 8);
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&self.height.to_le_bytes());
        buf.extend_from_slice(&(self.block_numbers.len() as u64).to_le_bytes());
        buf.extend_from_slice(&self.date_first_ingested.to_le_bytes());
        buf.extend_from_slice(&self.date_last_ingested.to_le_bytes());
        buf.extend_from_slice(&self.stats.count_files.to_le_bytes());
        buf.extend_from_slice(&self.stats.sum_file_sizes.to_le_bytes());
        for number in &self.block_numbers {
            buf.extend_from_slice(&number.to_le_bytes());
        }
        buf
    }

    pub fn decode(owner_public_key: PublicKey, buf: &[u8]) -> Result<Self, MultiStoreError> {
        if buf.len() < FIXED_LEN {
            return Err(MultiStoreError::CorruptHeader("buffer shorter than fixed header".into()));
        }
        let version = u64::from_le_bytes(buf[0..8].try_into().unwrap());
        let height = u64::from_le_bytes(buf[8..16].try_into().unwrap());
        let stored_count = u64::from_le_bytes(buf[16..24].try_into().unwrap()) as usize;
        let date_first_ingested = i64::from_le_bytes(buf[24..32].try_into().unwrap());
        let date_last_ingested = i64::from_le_bytes(buf[32..40].try_into().unwrap());
        let count_files = u64::from_le_bytes(buf[40..48].try_into().unwrap());
        let sum_file_sizes = u64::from_le_bytes(buf[48..56].try_into().unwrap());

        let expected_len = FIXED_LEN + stored_count * 8;
        if buf.len() != expected_len {
            return Err(MultiStoreError::CorruptHeader(format!(
                "declared {stored_count} block numbers but buffer has {} bytes",
                buf.len()
            )));
        }
        let mut block_numbers = Vec::with_capacity(stored_count);
        for i in 0..stored_count {
            let start = FIXED_LEN + i * 8;
            block_numbers.push(u64::from_le_bytes(buf[start..start + 8].try_into().unwrap()));
        }

        Ok(Self {
            owner_public_key,
            version,
            height,
            date_first_ingested,
            date_last_ingested,
            stats: ChainStats { count_files, sum_file_sizes },
            block_numbers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PUBLIC_KEY_LEN;

    #[test]
    fn encode_decode_roundtrips_including_block_numbers() {
        let owner = PublicKey([9u8; PUBLIC_KEY_LEN]);
        let mut header = ChainHeader::new(owner, 1, 3, 1_000);
        header.block_numbers = vec![0, 1, 2];
        header.stats = ChainStats { count_files: 2, sum_file_sizes: 4096 };

        let encoded = header.encode();
        let decoded = ChainHeader::decode(owner, &encoded).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn decode_rejects_mismatched_block_number_count() {
        let owner = PublicKey([1u8; PUBLIC_KEY_LEN]);
        let mut header = ChainHeader::new(owner, 0, 0, 0);
        header.block_numbers = vec![0, 1];
        let mut encoded = header.encode();
        encoded.truncate(encoded.len() - 4); // corrupt trailing block number
        assert!(ChainHeader::decode(owner, &encoded).is_err());
    }
}
