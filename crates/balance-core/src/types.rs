//! Shared types used across balancegrid crates.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::quantity::{QuantityError, to_base_units};

/// Resource name, e.g. `cpu`, `memory`, or an extended resource such as
/// `example.com/gpu`.
pub type ResourceName = String;

/// Per-resource quantities in base units (milli-cores, bytes, counts).
///
/// Keys iterate in sorted order. An absent key means zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceVector(BTreeMap<ResourceName, u64>);

impl ResourceVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quantity for `name`; zero when the key is absent.
    pub fn get(&self, name: &str) -> u64 {
        self.0.get(name).copied().unwrap_or(0)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<ResourceName>, quantity: u64) {
        self.0.insert(name.into(), quantity);
    }

    /// Add `quantity` to the existing value for `name` (saturating).
    pub fn add(&mut self, name: &str, quantity: u64) {
        let entry = self.0.entry(name.to_string()).or_insert(0);
        *entry = entry.saturating_add(quantity);
    }

    /// Element-wise sum of two vectors (saturating).
    pub fn merged(&self, other: &ResourceVector) -> ResourceVector {
        let mut out = self.clone();
        for (name, quantity) in other.iter() {
            out.add(name, quantity);
        }
        out
    }

    /// Element-wise `self - other`, floored at zero. Keys only in `other`
    /// are not added.
    pub fn saturating_sub(&self, other: &ResourceVector) -> ResourceVector {
        self.0
            .iter()
            .map(|(name, quantity)| (name.clone(), quantity.saturating_sub(other.get(name))))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(ResourceName, u64)> for ResourceVector {
    fn from_iter<I: IntoIterator<Item = (ResourceName, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[(&str, u64); N]> for ResourceVector {
    fn from(entries: [(&str, u64); N]) -> Self {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }
}

/// Raw manifest quantities keyed by resource name (`"500m"`, `"1Gi"`).
pub type ResourceList = BTreeMap<ResourceName, String>;

/// Parse every entry of a [`ResourceList`] into base units.
pub fn parse_resource_list(
    list: &ResourceList,
    milli_resources: &[String],
) -> Result<ResourceVector, QuantityError> {
    list.iter()
        .map(|(name, raw)| Ok((name.clone(), to_base_units(name, raw, milli_resources)?)))
        .collect()
}

// ── Pod ───────────────────────────────────────────────────────────

/// A pod awaiting placement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pod {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub containers: Vec<Container>,
}

/// A container inside a pod; only resource requests matter for placement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Container {
    pub name: String,
    #[serde(default)]
    pub requests: ResourceList,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl Pod {
    /// `{namespace}/{name}`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

// ── Node ──────────────────────────────────────────────────────────

/// Node status as published by the cluster API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeStatus {
    pub name: String,
    /// Raw hardware capacity.
    #[serde(default)]
    pub capacity: ResourceList,
    /// Capacity left for pods after system reservations.
    #[serde(default)]
    pub allocatable: ResourceList,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}
