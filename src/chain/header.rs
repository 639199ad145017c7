//! The 83-byte persisted chain header:
//! `u64 height | u64 version | u16 format | 65-byte compact signature`,
//! signed over its own leading 18-byte prefix.

use crate::crypto;
use crate::types::{Hash, PublicKey, Signature, SIGNATURE_LEN};

use super::error::ChainError;

/// Constant key under which the chain header is stored. Chosen longer
/// than 8 bytes so it can never collide with a `u64 LE` block-number key.
pub const HEADER_KEY: &[u8] = b"header blockchain";

const SIGNED_PREFIX_LEN: usize = 18;
pub const HEADER_LEN: usize = SIGNED_PREFIX_LEN + SIGNATURE_LEN;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainHeader {
    pub height: u64,
    pub version: u64,
    pub format: u16,
    pub signature: Signature,
}

impl ChainHeader {
    /// Builds and signs a fresh header for `(height, version)` with
    /// `format = 0`.
    pub fn sign(height: u64, version: u64, secret_key: &[u8; 32]) -> Result<Self, ChainError> {
        let prefix = Self::signed_prefix(height, version, 0);
        let digest = Hash::compute(&prefix);
        let signature = crypto::sign_compact(secret_key, &digest)
            .map_err(|e| ChainError::Crypto(e.to_string()))?;
        Ok(Self { height, version, format: 0, signature })
    }

    fn signed_prefix(height: u64, version: u64, format: u16) -> [u8; SIGNED_PREFIX_LEN] {
        let mut buf = [0u8; SIGNED_PREFIX_LEN];
        buf[0..8].copy_from_slice(&height.to_le_bytes());
        buf[8..16].copy_from_slice(&version.to_le_bytes());
        buf[16..18].copy_from_slice(&format.to_le_bytes());
        buf
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN);
        buf.extend_from_slice(&Self::signed_prefix(self.height, self.version, self.format));
        buf.extend_from_slice(self.signature.as_bytes());
        buf
    }

    /// Decodes a header and recovers its owner public key, verifying the
    /// signature over `BLAKE3(header[0..18])` yields the owner.
    pub fn decode(buf: &[u8]) -> Result<(Self, PublicKey), ChainError> {
        if buf.len() != HEADER_LEN {
            return Err(ChainError::CorruptBlockRecord(format!(
                "chain header has {} bytes, expected {HEADER_LEN}",
                buf.len()
            )));
        }
        let height = u64::from_le_bytes(buf[0..8].try_into().unwrap());
        let version = u64::from_le_bytes(buf[8..16].try_into().unwrap());
        let format = u16::from_le_bytes(buf[16..18].try_into().unwrap());
        let signature = Signature::from_slice(&buf[18..HEADER_LEN])
            .ok_or_else(|| ChainError::CorruptBlockRecord("truncated header signature".into()))?;

        let digest = Hash::compute(&buf[0..SIGNED_PREFIX_LEN]);
        let owner_public_key = crypto::recover_public_key(&signature, &digest)
            .map_err(|e| ChainError::Crypto(e.to_string()))?;

        Ok((Self { height, version, format, signature }, owner_public_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrips_and_recovers_owner() {
        let sk = [5u8; 32];
        let owner = crypto::public_key_from_secret(&sk).unwrap();
        let header = ChainHeader::sign(3, 1, &sk).unwrap();
        let encoded = header.encode();
        assert_eq!(encoded.len(), HEADER_LEN);

        let (decoded, recovered_owner) = ChainHeader::decode(&encoded).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(recovered_owner, owner);
    }

    #[test]
    fn decode_rejects_wrong_length() {
        assert!(ChainHeader::decode(&[0u8; 10]).is_err());
    }
}
