//! Per-cycle state shared between plugin stages.
//!
//! A [`CycleState`] lives for one scheduling cycle of one pod. The host
//! forks it per node so that a write made while evaluating one node is
//! never visible while evaluating another.
//!
//! Keys are typed constants ([`StateKey`]) carrying a name and a version.
//! A write returns a [`StateHandle`] bound to the cycle that produced it;
//! reads go through the handle, so a reader can only ask for the type the
//! writer stored, and a handle from another cycle or an older key version
//! reads as a miss.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use tokio::sync::watch;

use crate::error::{PluginError, PluginResult};

/// A value that can be stored in [`CycleState`].
///
/// Implemented for every `Clone + Send + Sync + 'static` type; forking
/// the state deep-clones each value through [`StateData::clone_data`].
pub trait StateData: Any + Send + Sync {
    fn clone_data(&self) -> Box<dyn StateData>;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Clone + Send + Sync> StateData for T {
    fn clone_data(&self) -> Box<dyn StateData> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Typed, versioned key for a [`CycleState`] entry.
pub struct StateKey<T> {
    name: &'static str,
    version: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> StateKey<T> {
    pub const fn new(name: &'static str, version: u32) -> Self {
        Self {
            name,
            version,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }
}

impl<T> Clone for StateKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for StateKey<T> {}

impl<T> fmt::Debug for StateKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@v{}", self.name, self.version)
    }
}

/// Proof that a value of type `T` was written in a given cycle.
pub struct StateHandle<T> {
    key: StateKey<T>,
    cycle_id: u64,
}

impl<T> StateHandle<T> {
    pub fn key(&self) -> StateKey<T> {
        self.key
    }

    pub fn cycle_id(&self) -> u64 {
        self.cycle_id
    }
}

impl<T> Clone for StateHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for StateHandle<T> {}

impl<T> fmt::Debug for StateHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#cycle{}", self.key, self.cycle_id)
    }
}

struct Entry {
    version: u32,
    value: Box<dyn StateData>,
}

/// Write-once key/value state for one scheduling cycle.
pub struct CycleState {
    cycle_id: u64,
    entries: HashMap<&'static str, Entry>,
}

impl CycleState {
    pub fn new(cycle_id: u64) -> Self {
        Self {
            cycle_id,
            entries: HashMap::new(),
        }
    }

    pub fn cycle_id(&self) -> u64 {
        self.cycle_id
    }

    /// Deep copy for a per-node evaluation.
    pub fn fork(&self) -> Self {
        let entries = self
            .entries
            .iter()
            .map(|(name, entry)| {
                (
                    *name,
                    Entry {
                        version: entry.version,
                        value: entry.value.clone_data(),
                    },
                )
            })
            .collect();
        Self {
            cycle_id: self.cycle_id,
            entries,
        }
    }

    /// Store `value` under `key`. Each key may be written once per cycle.
    pub fn write<T: StateData>(
        &mut self,
        key: &StateKey<T>,
        value: T,
    ) -> PluginResult<StateHandle<T>> {
        if self.entries.contains_key(key.name) {
            return Err(PluginError::StateConflict { key: key.name });
        }
        self.entries.insert(
            key.name,
            Entry {
                version: key.version,
                value: Box::new(value),
            },
        );
        Ok(StateHandle {
            key: *key,
            cycle_id: self.cycle_id,
        })
    }

    /// Read the value a handle points at.
    ///
    /// Misses when the entry is absent, was written under another key
    /// version, or the handle was issued by a different cycle.
    pub fn read<T: StateData>(&self, handle: &StateHandle<T>) -> PluginResult<&T> {
        let miss = || PluginError::StateMiss {
            key: handle.key.name,
        };
        if handle.cycle_id != self.cycle_id {
            return Err(miss());
        }
        let entry = self.entries.get(handle.key.name).ok_or_else(miss)?;
        if entry.version != handle.key.version {
            return Err(miss());
        }
        entry.value.as_any().downcast_ref::<T>().ok_or_else(miss)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&&str> = self.entries.keys().collect();
        keys.sort();
        f.debug_struct("CycleState")
            .field("cycle_id", &self.cycle_id)
            .field("keys", &keys)
            .finish()
    }
}

/// Cycle identity and cancellation signal passed to every stage.
#[derive(Debug, Clone)]
pub struct CycleContext {
    cycle_id: u64,
    cancel: watch::Receiver<bool>,
}

impl CycleContext {
    pub fn new(cycle_id: u64, cancel: watch::Receiver<bool>) -> Self {
        Self { cycle_id, cancel }
    }

    /// A context that is never cancelled.
    pub fn detached(cycle_id: u64) -> Self {
        let (_tx, rx) = watch::channel(false);
        Self::new(cycle_id, rx)
    }

    pub fn cycle_id(&self) -> u64 {
        self.cycle_id
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Resolves once the cycle is cancelled. Never resolves if the
    /// cancelling side has gone away without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
