use std::fmt;

use crate::kv::KvError;

/// Status codes `AssessHeader` returns when comparing a locally cached
/// chain header against a remote peer's claimed `(version, height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssessStatus {
    /// No header is cached locally for this owner yet.
    HeaderNA,
    /// Local and remote agree; nothing to do.
    Equal,
    /// The local cache has stored a version/height beyond what the
    /// remote now reports. May indicate replay or regression; the
    /// caller should refuse to trust the remote.
    InvalidRemote,
    /// Remote reports a newer version than the local cache holds.
    NewVersion,
    /// Same version, but remote reports more blocks than locally cached.
    NewBlocks,
}

#[derive(Debug)]
pub enum MultiStoreError {
    ErrorReadHeader(KvError),
    Store(KvError),
    AlreadyExists,
    CorruptHeader(String),
}

impl fmt::Display for MultiStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MultiStoreError::ErrorReadHeader(e) => write!(f, "failed to read chain header: {e}"),
            MultiStoreError::Store(e) => write!(f, "key-value store error: {e}"),
            MultiStoreError::AlreadyExists => {
                write!(f, "block already stored at this (owner, version, number)")
            }
            MultiStoreError::CorruptHeader(msg) => write!(f, "corrupt chain header: {msg}"),
        }
    }
}

impl std::error::Error for MultiStoreError {}

impl From<KvError> for MultiStoreError {
    fn from(e: KvError) -> Self {
        MultiStoreError::Store(e)
    }
}
