//! Component B: the content-addressed, deduplicating blob store.

pub mod error;
pub mod merkle;
pub mod path;

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

pub use error::WarehouseError;
pub use merkle::{calculate_fragment_size, Blake3Algorithm, MerkleBackend, MerkleCompanion, RsMerkleBackend, MINIMUM_FRAGMENT_SIZE};

use crate::types::{Hash, HASH_LEN};

/// Transient "file in use" opens are retried this many times...
const OPEN_RETRY_ATTEMPTS: u32 = 3;
/// ...waiting this long between attempts.
const OPEN_RETRY_DELAY: Duration = Duration::from_millis(400);

/// Notified when a blob is deleted so derived (e.g. search) indexes can
/// drop anything keyed on its hash. Deliberately narrower than the full
/// [`crate::collaborators::Indexer`] trait: Warehouse should know only
/// this one-way edge, not the whole indexing surface.
pub trait DerivedIndexDropper: Send + Sync {
    fn drop_derived_index(&self, hash: &Hash);
}

pub struct NullDerivedIndexDropper;
impl DerivedIndexDropper for NullDerivedIndexDropper {
    fn drop_derived_index(&self, _hash: &Hash) {}
}

#[derive(Clone, Debug)]
pub struct WarehouseConfig {
    pub root_path: PathBuf,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self { root_path: PathBuf::from("./data/warehouse") }
    }
}

pub struct Warehouse {
    root: PathBuf,
    merkle: Box<dyn MerkleBackend>,
    index_dropper: Box<dyn DerivedIndexDropper>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOutcome {
    pub bytes_transferred: u64,
}

impl Warehouse {
    pub fn open(cfg: &WarehouseConfig) -> Result<Self, WarehouseError> {
        Self::with_collaborators(cfg, Box::new(RsMerkleBackend), Box::new(NullDerivedIndexDropper))
    }

    pub fn with_collaborators(
        cfg: &WarehouseConfig,
        merkle: Box<dyn MerkleBackend>,
        index_dropper: Box<dyn DerivedIndexDropper>,
    ) -> Result<Self, WarehouseError> {
        fs::create_dir_all(&cfg.root_path).map_err(WarehouseError::ErrorCreatePath)?;
        fs::create_dir_all(path::temp_dir(&cfg.root_path)).map_err(WarehouseError::ErrorCreatePath)?;
        Ok(Self {
            root: cfg.root_path.clone(),
            merkle,
            index_dropper,
        })
    }

    fn blob_path(&self, hash: &Hash) -> PathBuf {
        path::hash_to_path(&self.root, hash)
    }

    /// Streams `reader` through a tee that writes to a fresh temp file
    /// and a BLAKE3 hasher simultaneously; on success, renames the temp
    /// file into its content-addressed destination (or discards it if
    /// the destination already exists, the dedup path).
    #[instrument(skip(self, reader))]
    pub fn create_file(&self, reader: &mut dyn Read) -> Result<Hash, WarehouseError> {
        let temp_dir = path::temp_dir(&self.root);
        let temp_name = format!("{:x}", uuid::Uuid::new_v4().as_u128());
        let temp_path = temp_dir.join(&temp_name);

        let mut temp_file =
            File::create(&temp_path).map_err(WarehouseError::ErrorCreateTemp)?;
        let mut hasher = blake3::Hasher::new();
        let mut buf = [0u8; 64 * 1024];
        let mut total_size: u64 = 0;

        loop {
            let n = reader.read(&mut buf).map_err(WarehouseError::ErrorWriteTemp)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            temp_file
                .write_all(&buf[..n])
                .map_err(WarehouseError::ErrorWriteTemp)?;
            total_size += n as u64;
        }
        temp_file.sync_all().map_err(WarehouseError::ErrorCloseTemp)?;
        drop(temp_file);

        let hash = Hash(*hasher.finalize().as_bytes());
        let dest = self.blob_path(&hash);

        if dest.exists() {
            let _ = fs::remove_file(&temp_path);
            debug!(hash = %hash, "blob already present, discarding duplicate write");
            return Ok(hash);
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(WarehouseError::ErrorCreatePath)?;
        }

        match fs::rename(&temp_path, &dest) {
            Ok(()) => {}
            Err(e) if dest.exists() => {
                // Lost a race with a concurrent writer of identical content.
                let _ = fs::remove_file(&temp_path);
                debug!(hash = %hash, error = %e, "rename lost race, existing blob wins");
            }
            Err(e) => return Err(WarehouseError::ErrorRenameTemp(e)),
        }

        if total_size > self.merkle.minimum_fragment_size() {
            self.write_merkle_companion(&dest, total_size)?;
        }

        info!(hash = %hash, size = total_size, "stored new blob");
        Ok(hash)
    }

    pub fn create_file_from_path(&self, source: &Path) -> Result<Hash, WarehouseError> {
        let mut file = File::open(source).map_err(WarehouseError::ErrorOpenFile)?;
        self.create_file(&mut file)
    }

    fn write_merkle_companion(&self, blob_path: &Path, size: u64) -> Result<(), WarehouseError> {
        let fragment_size = self.merkle.calculate_fragment_size(size);
        let mut blob = File::open(blob_path).map_err(WarehouseError::ErrorOpenFile)?;
        let companion = self.merkle.build(&mut blob, fragment_size)?;

        let companion_path = path::merkle_companion_path(blob_path);
        let mut out = File::create(&companion_path).map_err(WarehouseError::ErrorMerkleFile)?;
        out.write_all(companion.root_hash.as_bytes())
            .map_err(WarehouseError::ErrorMerkleFile)?;
        out.write_all(&companion.fragment_size.to_le_bytes())
            .map_err(WarehouseError::ErrorMerkleFile)?;
        Ok(())
    }

    pub fn read_merkle_companion(&self, hash: &Hash) -> Result<Option<MerkleCompanion>, WarehouseError> {
        let companion_path = path::merkle_companion_path(&self.blob_path(hash));
        if !companion_path.exists() {
            return Ok(None);
        }
        let mut buf = Vec::new();
        File::open(&companion_path)
            .map_err(WarehouseError::ErrorMerkleFile)?
            .read_to_end(&mut buf)
            .map_err(WarehouseError::ErrorMerkleFile)?;
        if buf.len() != HASH_LEN + 8 {
            return Err(WarehouseError::ErrorMerkleFile(io::Error::new(
                io::ErrorKind::InvalidData,
                "corrupt merkle companion file",
            )));
        }
        let root_hash = Hash::from_slice(&buf[..HASH_LEN]).unwrap();
        let fragment_size = u64::from_le_bytes(buf[HASH_LEN..].try_into().unwrap());
        Ok(Some(MerkleCompanion { root_hash, fragment_size }))
    }

    fn open_with_retry(&self, path: &Path) -> Result<File, WarehouseError> {
        let mut last_err = None;
        for attempt in 0..OPEN_RETRY_ATTEMPTS {
            match File::open(path) {
                Ok(file) => return Ok(file),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(WarehouseError::FileNotFound);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "transient error opening blob, retrying");
                    last_err = Some(e);
                    if attempt + 1 < OPEN_RETRY_ATTEMPTS {
                        thread::sleep(OPEN_RETRY_DELAY);
                    }
                }
            }
        }
        Err(WarehouseError::ErrorOpenFile(last_err.unwrap()))
    }

    /// Reads at most `limit` bytes (0 = to EOF) starting at `offset`
    /// from the blob identified by `hash`, writing them into `writer`.
    #[instrument(skip(self, writer))]
    pub fn read_file(
        &self,
        hash: &Hash,
        offset: u64,
        limit: u64,
        writer: &mut dyn Write,
    ) -> Result<ReadOutcome, WarehouseError> {
        let path = self.blob_path(hash);
        let mut file = self.open_with_retry(&path)?;

        if offset > 0 {
            file.seek(SeekFrom::Start(offset))
                .map_err(WarehouseError::ErrorSeekFile)?;
        }

        let mut buf = [0u8; 64 * 1024];
        let mut remaining = if limit == 0 { u64::MAX } else { limit };
        let mut transferred = 0u64;

        while remaining > 0 {
            let want = remaining.min(buf.len() as u64) as usize;
            let n = file
                .read(&mut buf[..want])
                .map_err(WarehouseError::ErrorReadFile)?;
            if n == 0 {
                break;
            }
            writer
                .write_all(&buf[..n])
                .map_err(WarehouseError::ErrorReadFile)?;
            transferred += n as u64;
            remaining = remaining.saturating_sub(n as u64);
        }

        Ok(ReadOutcome { bytes_transferred: transferred })
    }

    pub fn read_file_to_disk(
        &self,
        hash: &Hash,
        offset: u64,
        limit: u64,
        target_path: &Path,
    ) -> Result<ReadOutcome, WarehouseError> {
        if target_path.exists() {
            return Err(WarehouseError::ErrorTargetExists);
        }
        let mut target =
            File::create(target_path).map_err(WarehouseError::ErrorCreateTarget)?;
        self.read_file(hash, offset, limit, &mut target)
    }

    #[instrument(skip(self))]
    pub fn delete_file(&self, hash: &Hash) -> Result<(), WarehouseError> {
        let path = self.blob_path(hash);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(WarehouseError::FileNotFound),
            Err(e) => return Err(WarehouseError::ErrorDeleteFile(e)),
        }
        let _ = fs::remove_file(path::merkle_companion_path(&path));
        self.index_dropper.drop_derived_index(hash);
        info!(hash = %hash, "deleted blob");
        Ok(())
    }

    /// Walks the two-level sharded directory tree, yielding `(hash, size)`
    /// for every recognized blob. `callback` returning `false` stops
    /// iteration early.
    pub fn iterate_files(
        &self,
        mut callback: impl FnMut(Hash, u64) -> bool,
    ) -> Result<(), WarehouseError> {
        let level1_entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(WarehouseError::ErrorOpenFile(e)),
        };

        for level1 in level1_entries {
            let level1 = level1.map_err(WarehouseError::ErrorOpenFile)?;
            let level1_name = level1.file_name().to_string_lossy().into_owned();
            if level1_name == path::TEMP_DIR_NAME || level1_name.len() != 4 {
                continue;
            }
            let level2_entries = match fs::read_dir(level1.path()) {
                Ok(e) => e,
                Err(_) => continue,
            };
            for level2 in level2_entries {
                let level2 = level2.map_err(WarehouseError::ErrorOpenFile)?;
                let level2_name = level2.file_name().to_string_lossy().into_owned();
                if level2_name.len() != 4 {
                    continue;
                }
                let file_entries = match fs::read_dir(level2.path()) {
                    Ok(e) => e,
                    Err(_) => continue,
                };
                for entry in file_entries {
                    let entry = entry.map_err(WarehouseError::ErrorOpenFile)?;
                    let filename = entry.file_name().to_string_lossy().into_owned();
                    if filename.ends_with(".merkle") {
                        continue;
                    }
                    let Some(hash) = path::path_components_to_hash(&level1_name, &level2_name, &filename) else {
                        continue;
                    };
                    let size = entry
                        .metadata()
                        .map_err(WarehouseError::ErrorOpenFile)?
                        .len();
                    if !callback(hash, size) {
                        return Ok(());
                    }
                }
            }
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn delete_warehouse(&self) -> Result<(), WarehouseError> {
        let mut hashes = Vec::new();
        self.iterate_files(|hash, _size| {
            hashes.push(hash);
            true
        })?;
        for hash in hashes {
            self.delete_file(&hash)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn warehouse(dir: &TempDir) -> Warehouse {
        Warehouse::open(&WarehouseConfig { root_path: dir.path().to_path_buf() }).unwrap()
    }

    #[test]
    fn create_then_read_roundtrips_content() {
        let dir = TempDir::new().unwrap();
        let wh = warehouse(&dir);

        let hash = wh.create_file(&mut Cursor::new(b"hello".to_vec())).unwrap();
        assert_eq!(hash, Hash::compute(b"hello"));

        let mut out = Vec::new();
        let outcome = wh.read_file(&hash, 0, 0, &mut out).unwrap();
        assert_eq!(out, b"hello");
        assert_eq!(outcome.bytes_transferred, 5);
    }

    #[test]
    fn create_file_twice_deduplicates() {
        let dir = TempDir::new().unwrap();
        let wh = warehouse(&dir);

        let hash1 = wh.create_file(&mut Cursor::new(b"same content".to_vec())).unwrap();
        let hash2 = wh.create_file(&mut Cursor::new(b"same content".to_vec())).unwrap();
        assert_eq!(hash1, hash2);

        let mut count = 0;
        wh.iterate_files(|_, _| {
            count += 1;
            true
        })
        .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn ranged_read_respects_offset_and_limit() {
        let dir = TempDir::new().unwrap();
        let wh = warehouse(&dir);
        let hash = wh.create_file(&mut Cursor::new(b"0123456789".to_vec())).unwrap();

        let mut out = Vec::new();
        wh.read_file(&hash, 3, 4, &mut out).unwrap();
        assert_eq!(out, b"3456");
    }

    #[test]
    fn delete_then_read_not_found() {
        let dir = TempDir::new().unwrap();
        let wh = warehouse(&dir);
        let hash = wh.create_file(&mut Cursor::new(b"bye".to_vec())).unwrap();

        wh.delete_file(&hash).unwrap();
        let mut out = Vec::new();
        let err = wh.read_file(&hash, 0, 0, &mut out).unwrap_err();
        assert!(matches!(err, WarehouseError::FileNotFound));
    }

    #[test]
    fn large_blob_gets_merkle_companion() {
        let dir = TempDir::new().unwrap();
        let wh = warehouse(&dir);
        let data = vec![1u8; (MINIMUM_FRAGMENT_SIZE as usize) + 10];
        let hash = wh.create_file(&mut Cursor::new(data)).unwrap();

        let companion = wh.read_merkle_companion(&hash).unwrap();
        assert!(companion.is_some());
    }

    #[test]
    fn small_blob_gets_no_merkle_companion() {
        let dir = TempDir::new().unwrap();
        let wh = warehouse(&dir);
        let hash = wh.create_file(&mut Cursor::new(b"tiny".to_vec())).unwrap();

        let companion = wh.read_merkle_companion(&hash).unwrap();
        assert!(companion.is_none());
    }

    #[test]
    fn read_file_to_disk_fails_if_target_exists() {
        let dir = TempDir::new().unwrap();
        let wh = warehouse(&dir);
        let hash = wh.create_file(&mut Cursor::new(b"content".to_vec())).unwrap();

        let target = dir.path().join("existing.bin");
        fs::write(&target, b"placeholder").unwrap();

        let err = wh.read_file_to_disk(&hash, 0, 0, &target).unwrap_err();
        assert!(matches!(err, WarehouseError::ErrorTargetExists));
    }
}
