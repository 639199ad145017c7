//! Local data plane for a peer-to-peer file-sharing node.
//!
//! This crate provides the pieces that live entirely on one machine:
//!
//! - the signed binary block format and record codec (`codec`),
//! - a content-addressed, deduplicating blob store (`warehouse`),
//! - an owner-signed append-only personal chain (`chain`),
//! - a cache of remote chains keyed by owner (`multistore`),
//! - an asynchronous, filterable, paginated search job (`search`),
//!
//! plus the capability interfaces (`collaborators`, `kv`) that let a
//! higher-level node wire these pieces to a real database, indexer,
//! peer directory, and file-transfer layer without this crate knowing
//! about any of them concretely.

pub mod chain;
pub mod codec;
pub mod collaborators;
pub mod config;
pub mod crypto;
pub mod kv;
pub mod multistore;
pub mod search;
pub mod types;
pub mod warehouse;

pub use config::NodeConfig;

pub use chain::{ChainError, PersonalChain, PersonalChainConfig};
pub use multistore::{MultiStore, MultiStoreError};
pub use search::{SearchFilter, SearchJob, SearchRegistry};
pub use warehouse::{Warehouse, WarehouseConfig, WarehouseError};

pub use types::{Hash, NodeId, PublicKey, Signature};

/// The in-memory [`kv::KvStore`] backend, suitable for tests and
/// ephemeral nodes.
pub type EphemeralKvStore = kv::mem::InMemoryKvStore;
/// The persistent [`kv::KvStore`] backend backing real nodes.
pub type DefaultKvStore = kv::rocksdb_store::RocksDbKvStore;
/// The default Merkle companion backend.
pub type DefaultMerkleBackend = warehouse::RsMerkleBackend;
