//! RocksDB-backed [`KvStore`].
//!
//! Uses a single default column family: callers (PersonalChain and
//! MultiStore) disambiguate key schemas by key length/prefix rather
//! than by column family.

use rocksdb::{Options, DB};
use tracing::{debug, instrument};

use super::{KvError, KvStore};

#[derive(Clone, Debug)]
pub struct RocksDbConfig {
    pub path: String,
    pub create_if_missing: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "./data".to_string(),
            create_if_missing: true,
        }
    }
}

pub struct RocksDbKvStore {
    db: DB,
}

impl RocksDbKvStore {
    #[instrument(skip(cfg), fields(path = %cfg.path))]
    pub fn open(cfg: &RocksDbConfig) -> Result<Self, KvError> {
        let mut opts = Options::default();
        opts.create_if_missing(cfg.create_if_missing);
        let db = DB::open(&opts, &cfg.path).map_err(|e| KvError::Backend(e.to_string()))?;
        debug!("opened rocksdb key-value store");
        Ok(Self { db })
    }
}

impl KvStore for RocksDbKvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        self.db
            .get(key)
            .map_err(|e| KvError::Backend(e.to_string()))
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        self.db
            .put(key, value)
            .map_err(|e| KvError::Backend(e.to_string()))
    }

    fn delete(&self, key: &[u8]) -> Result<(), KvError> {
        self.db
            .delete(key)
            .map_err(|e| KvError::Backend(e.to_string()))
    }

    fn iterate(&self, visit: &mut dyn FnMut(&[u8], &[u8])) -> Result<(), KvError> {
        let iter = self.db.iterator(rocksdb::IteratorMode::Start);
        for item in iter {
            let (k, v) = item.map_err(|e| KvError::Backend(e.to_string()))?;
            visit(&k, &v);
        }
        Ok(())
    }
}
