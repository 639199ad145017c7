//! Plain configuration structs for every component, with sensible
//! defaults. Loading these from a file, environment, or CLI flags is an
//! external collaborator's job; this module only defines the shape, a
//! plain `Default`-backed struct per subsystem rather than a loader
//! baked in.

use std::path::PathBuf;
use std::time::Duration;

use crate::chain::PersonalChainConfig;
use crate::warehouse::WarehouseConfig;

#[derive(Clone, Debug)]
pub struct MultiStoreConfig {
    pub store_path: PathBuf,
}

impl Default for MultiStoreConfig {
    fn default() -> Self {
        Self { store_path: PathBuf::from("./data/multistore") }
    }
}

#[derive(Clone, Debug)]
pub struct SearchConfig {
    pub default_timeout: Duration,
    pub default_max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { default_timeout: Duration::from_secs(30), default_max_results: 10_000 }
    }
}

#[derive(Clone, Debug, Default)]
pub struct NodeConfig {
    pub warehouse: WarehouseConfig,
    pub personal_chain: PersonalChainConfig,
    pub multi_store: MultiStoreConfig,
    pub search: SearchConfig,
}
