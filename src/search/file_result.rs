//! A single search result, as a worker reports it into a job's pool.

use crate::types::{Hash, NodeId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchFile {
    pub hash: Hash,
    pub node_id: NodeId,
    pub id: [u8; 16],
    pub file_type: u8,
    pub file_format: u16,
    pub size: u64,
    /// Date the owning record was shared, used for date filtering/sort
    /// and as the relevance-sort fallback key.
    pub date: i64,
    pub name: String,
    pub folder: String,
    /// Virtual `SharedByCount` tag value; missing counts as 0.
    pub shared_by_count: u64,
}

impl SearchFile {
    /// The key `AddResult` dedups on.
    pub fn dedup_key(&self) -> (Hash, NodeId) {
        (self.hash, self.node_id)
    }
}
