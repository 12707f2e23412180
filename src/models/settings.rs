//! Cluster-wide mutable settings that are not per-source — currently just
//! the hash key list, which the rehash operation (§4.7) rewrites in place.

use serde::{Deserialize, Serialize};

use super::stream::HashKeyList;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalSettings {
    pub hash_key_list: HashKeyList,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            hash_key_list: HashKeyList::default(),
        }
    }
}
