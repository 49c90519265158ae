//! Observable volume identity.
//!
//! Holds what the rest of the app needs to know about the active volume
//! (its id and the selected secondary dimensions) and notifies listeners
//! only when that actually changes.

use std::collections::BTreeMap;

use serde::Serialize;

use super::adapter::VolumeMeta;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VolumeSnapshot {
    pub volume_id: Option<String>,
    /// Selected value per dimension
    pub dimensions: BTreeMap<String, String>,
    /// Allowed values per dimension
    pub available: BTreeMap<String, Vec<String>>,
}

impl VolumeSnapshot {
    /// Fresh snapshot for a newly installed volume: every dimension starts
    /// at its first declared value.
    pub fn for_volume(volume_id: &str, meta: &VolumeMeta) -> Self {
        let dimensions = meta
            .dimensions
            .iter()
            .filter_map(|(name, values)| Some((name.clone(), values.first()?.clone())))
            .collect();
        Self {
            volume_id: Some(volume_id.to_string()),
            dimensions,
            available: meta.dimensions.clone(),
        }
    }

    pub fn dimension(&self, name: &str) -> Option<&str> {
        self.dimensions.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreSubscription(u64);

type StoreListener = Box<dyn FnMut(&VolumeSnapshot)>;

#[derive(Default)]
pub struct VolumeStore {
    state: VolumeSnapshot,
    listeners: Vec<(StoreSubscription, StoreListener)>,
    next_subscription: u64,
}

impl VolumeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> &VolumeSnapshot {
        &self.state
    }

    pub fn volume_id(&self) -> Option<&str> {
        self.state.volume_id.as_deref()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&VolumeSnapshot) + 'static) -> StoreSubscription {
        self.next_subscription += 1;
        let id = StoreSubscription(self.next_subscription);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: StoreSubscription) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    /// Replace the whole snapshot. Returns whether anything changed.
    pub fn publish(&mut self, next: VolumeSnapshot) -> bool {
        if next == self.state {
            return false;
        }
        self.state = next;
        for (_, listener) in self.listeners.iter_mut() {
            listener(&self.state);
        }
        true
    }

    /// Change one dimension's selected value.
    pub fn set_dimension(&mut self, name: &str, value: &str) -> bool {
        let mut next = self.state.clone();
        next.dimensions.insert(name.to_string(), value.to_string());
        self.publish(next)
    }
}
