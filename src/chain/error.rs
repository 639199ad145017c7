use std::fmt;

use crate::codec::CodecError;
use crate::kv::KvError;

/// PersonalChain status/error codes.
#[derive(Debug)]
pub enum ChainError {
    BlockNotFound,
    CorruptBlock(CodecError),
    CorruptBlockRecord(String),
    DataNotFound,
    NotInWarehouse,
    PublicKeyMismatch,
    Store(KvError),
    Crypto(String),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::BlockNotFound => write!(f, "block not found at expected number"),
            ChainError::CorruptBlock(e) => write!(f, "block failed to decode: {e}"),
            ChainError::CorruptBlockRecord(msg) => write!(f, "record-level corruption: {msg}"),
            ChainError::DataNotFound => write!(f, "requested data not present in chain"),
            ChainError::NotInWarehouse => write!(f, "referenced blob not present in warehouse"),
            ChainError::PublicKeyMismatch => {
                write!(f, "chain header's owner public key does not match the caller's key")
            }
            ChainError::Store(e) => write!(f, "key-value store error: {e}"),
            ChainError::Crypto(msg) => write!(f, "cryptographic operation failed: {msg}"),
        }
    }
}

impl std::error::Error for ChainError {}

impl From<KvError> for ChainError {
    fn from(e: KvError) -> Self {
        ChainError::Store(e)
    }
}

impl From<CodecError> for ChainError {
    fn from(e: CodecError) -> Self {
        ChainError::CorruptBlock(e)
    }
}
