//! Serialize a keyed map as a sequence of `[key, value]` pairs.
//!
//! JSON object keys are always strings, so a map keyed by [`crate::NodeId`]
//! would come back with integer keys turned into text. Writing pairs keeps
//! the key's own representation intact.
//!
//! ```ignore
//! #[serde(with = "pam_core::serde_pairs")]
//! communities: BTreeMap<K, usize>,
//! ```

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub fn serialize<K, V, S>(map: &BTreeMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
where
    K: Serialize,
    V: Serialize,
    S: Serializer,
{
    serializer.collect_seq(map.iter())
}

pub fn deserialize<'de, K, V, D>(deserializer: D) -> Result<BTreeMap<K, V>, D::Error>
where
    K: DeserializeOwned + Ord,
    V: DeserializeOwned,
    D: Deserializer<'de>,
{
    let pairs: Vec<(K, V)> = Vec::deserialize(deserializer)?;
    Ok(pairs.into_iter().collect())
}
