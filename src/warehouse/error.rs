use std::fmt;

/// Warehouse status/error codes.
#[derive(Debug)]
pub enum WarehouseError {
    ErrorCreateTemp(std::io::Error),
    ErrorWriteTemp(std::io::Error),
    ErrorCloseTemp(std::io::Error),
    ErrorRenameTemp(std::io::Error),
    ErrorCreatePath(std::io::Error),
    ErrorOpenFile(std::io::Error),
    InvalidHash,
    FileNotFound,
    ErrorDeleteFile(std::io::Error),
    ErrorReadFile(std::io::Error),
    ErrorSeekFile(std::io::Error),
    ErrorTargetExists,
    ErrorCreateTarget(std::io::Error),
    ErrorCreateMerkle(String),
    ErrorMerkleFile(std::io::Error),
}

impl fmt::Display for WarehouseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarehouseError::ErrorCreateTemp(e) => write!(f, "failed to create temp file: {e}"),
            WarehouseError::ErrorWriteTemp(e) => write!(f, "failed to write temp file: {e}"),
            WarehouseError::ErrorCloseTemp(e) => write!(f, "failed to close temp file: {e}"),
            WarehouseError::ErrorRenameTemp(e) => write!(f, "failed to rename temp into place: {e}"),
            WarehouseError::ErrorCreatePath(e) => write!(f, "failed to create blob directory: {e}"),
            WarehouseError::ErrorOpenFile(e) => write!(f, "failed to open blob file: {e}"),
            WarehouseError::InvalidHash => write!(f, "hash is not 32 bytes"),
            WarehouseError::FileNotFound => write!(f, "no blob stored for this hash"),
            WarehouseError::ErrorDeleteFile(e) => write!(f, "failed to delete blob file: {e}"),
            WarehouseError::ErrorReadFile(e) => write!(f, "failed to read blob file: {e}"),
            WarehouseError::ErrorSeekFile(e) => write!(f, "failed to seek blob file: {e}"),
            WarehouseError::ErrorTargetExists => write!(f, "read-to-disk target already exists"),
            WarehouseError::ErrorCreateTarget(e) => write!(f, "failed to create read-to-disk target: {e}"),
            WarehouseError::ErrorCreateMerkle(e) => write!(f, "failed to build merkle companion: {e}"),
            WarehouseError::ErrorMerkleFile(e) => write!(f, "failed to read/write merkle companion file: {e}"),
        }
    }
}

impl std::error::Error for WarehouseError {}
