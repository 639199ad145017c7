//! Capability interfaces for collaborating subsystems that exist outside
//! this crate (DHT/peer discovery, wire-level file transfer, GeoIP, the
//! search indexer). Defined as traits, injected at construction, never
//! behind global state.
//!
//! Each trait has a trivial "accept everything, answer nothing" stand-in
//! for exercising the core against these interfaces in tests without a
//! real backing system.

use crate::types::{Hash, NodeId, PublicKey};

/// A single externally-observed search hit, as the indexer reports it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexHit {
    pub owner_public_key: PublicKey,
    pub version: u64,
    pub block_number: u64,
    pub file_id: [u8; 16],
}

/// External full-text/metadata indexer. `IndexNewBlock`/`UnindexChain`
/// notify the indexer of chain mutations; `Search`/
/// `SearchNodeIDBasedOnHash` are read paths a query layer would call.
pub trait Indexer: Send + Sync {
    fn index_new_block(&self, owner_public_key: &PublicKey, version: u64, block_number: u64, raw: &[u8]);
    fn unindex_chain(&self, owner_public_key: &PublicKey);
    fn search(&self, term: &str) -> Vec<IndexHit>;
    fn search_node_id_based_on_hash(&self, hash: &Hash) -> Vec<NodeId>;
}

/// No-op indexer: accepts every mutation notification, answers every
/// query with no results. Used as the default collaborator in tests.
pub struct NullIndexer;

impl Indexer for NullIndexer {
    fn index_new_block(&self, _owner_public_key: &PublicKey, _version: u64, _block_number: u64, _raw: &[u8]) {}
    fn unindex_chain(&self, _owner_public_key: &PublicKey) {}
    fn search(&self, _term: &str) -> Vec<IndexHit> {
        Vec::new()
    }
    fn search_node_id_based_on_hash(&self, _hash: &Hash) -> Vec<NodeId> {
        Vec::new()
    }
}

/// DHT / peer-list collaborator. A *valid* node id is exactly
/// [`crate::types::HASH_LEN`] (32) bytes.
pub trait PeerDirectory: Send + Sync {
    fn find_node(&self, node_id: &NodeId, timeout_ms: u64) -> Option<PublicKey>;
    fn peerlist_get(&self) -> Vec<PublicKey>;
    fn peerlist_lookup(&self, public_key: &PublicKey) -> bool;
    fn read_block(&self, public_key: &PublicKey, version: u64, block_number: u64) -> Option<Vec<u8>>;
}

pub struct NullPeerDirectory;

impl PeerDirectory for NullPeerDirectory {
    fn find_node(&self, _node_id: &NodeId, _timeout_ms: u64) -> Option<PublicKey> {
        None
    }
    fn peerlist_get(&self) -> Vec<PublicKey> {
        Vec::new()
    }
    fn peerlist_lookup(&self, _public_key: &PublicKey) -> bool {
        false
    }
    fn read_block(&self, _public_key: &PublicKey, _version: u64, _block_number: u64) -> Option<Vec<u8>> {
        None
    }
}

/// Wire-level file transfer collaborator (UDT or similar).
pub trait FileTransfer: Send + Sync {
    fn file_transfer_request_udt(&self, hash: &Hash, offset: u64, limit: u64) -> Option<Vec<u8>>;
    fn file_transfer_read_header(&self, connection_id: u64) -> Option<(u64, u64)>;
}

pub struct NullFileTransfer;

impl FileTransfer for NullFileTransfer {
    fn file_transfer_request_udt(&self, _hash: &Hash, _offset: u64, _limit: u64) -> Option<Vec<u8>> {
        None
    }
    fn file_transfer_read_header(&self, _connection_id: u64) -> Option<(u64, u64)> {
        None
    }
}

/// IP geolocation collaborator.
pub trait GeoIpLookup: Send + Sync {
    /// Returns `(latitude, longitude)` if the lookup succeeded.
    fn lookup(&self, ip: &str) -> Option<(f64, f64)>;
}

pub struct NullGeoIpLookup;

impl GeoIpLookup for NullGeoIpLookup {
    fn lookup(&self, _ip: &str) -> Option<(f64, f64)> {
        None
    }
}
