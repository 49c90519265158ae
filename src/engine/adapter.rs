//! Volume adapter contract.
//!
//! An adapter turns one data source into a normalized hierarchy in three
//! awaited steps: `load_manifest` → `validate` → `normalize`. The bridge
//! runs them strictly in that order and installs nothing unless all
//! three succeed.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::session::VolumeSession;
use crate::error::ManifestError;
use crate::item::{Item, Link};

/// Outcome of schema validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub ok: bool,
    pub errors: Vec<String>,
}

impl Validation {
    pub fn passed() -> Self {
        Self {
            ok: true,
            errors: Vec::new(),
        }
    }

    /// Ok exactly when no errors were collected.
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            ok: errors.is_empty(),
            errors,
        }
    }
}

/// Volume-level metadata derived during normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMeta {
    #[serde(default)]
    pub volume_id: Option<String>,
    /// Secondary dimensions (language, edition, ...) and their allowed
    /// values. The first value is the default.
    #[serde(default)]
    pub dimensions: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedVolume {
    pub items: Vec<Item>,
    pub links: Vec<Link>,
    pub meta: VolumeMeta,
}

/// Where a deep-link token points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeepLinkTarget {
    pub focus_id: String,
}

/// Optional features an adapter supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdapterCapabilities {
    pub deep_links: bool,
    pub dimensions: bool,
}

/// Adapter trait - every volume source implements this.
///
/// Futures are not `Send`: the engine is single-threaded and adapters may
/// hold `Rc`/`RefCell` state.
#[async_trait(?Send)]
pub trait VolumeAdapter {
    /// Registry key for this volume
    fn volume_id(&self) -> &str;

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities::default()
    }

    /// Fetch the raw manifest. No deadline is applied here.
    async fn load_manifest(&self) -> Result<Value, ManifestError>;

    async fn validate(&self, raw: &Value) -> Validation;

    async fn normalize(&self, raw: Value) -> Result<NormalizedVolume, ManifestError>;

    /// Map an opaque token to a focus target. `None` means unresolvable.
    fn resolve_deep_link(&self, _token: &str) -> Option<DeepLinkTarget> {
        None
    }

    /// Children shown in the pyramid for `parent_id`.
    fn children(&self, session: &VolumeSession, parent_id: &str) -> Vec<Item> {
        session.children_of(Some(parent_id))
    }
}

/// Adapters by volume id.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Rc<dyn VolumeAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own volume id, replacing any previous one.
    pub fn register(&mut self, adapter: Rc<dyn VolumeAdapter>) -> Option<Rc<dyn VolumeAdapter>> {
        let id = adapter.volume_id().to_string();
        self.adapters.insert(id, adapter)
    }

    pub fn with(mut self, adapter: Rc<dyn VolumeAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, volume_id: &str) -> Option<Rc<dyn VolumeAdapter>> {
        self.adapters.get(volume_id).cloned()
    }

    pub fn contains(&self, volume_id: &str) -> bool {
        self.adapters.contains_key(volume_id)
    }

    /// Sorted, for stable listings.
    pub fn volume_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.adapters.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("volumes", &self.volume_ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    #[async_trait(?Send)]
    impl VolumeAdapter for Fixed {
        fn volume_id(&self) -> &str {
            self.0
        }

        async fn load_manifest(&self) -> Result<Value, ManifestError> {
            Ok(Value::Null)
        }

        async fn validate(&self, _raw: &Value) -> Validation {
            Validation::passed()
        }

        async fn normalize(&self, _raw: Value) -> Result<NormalizedVolume, ManifestError> {
            Ok(NormalizedVolume::default())
        }
    }

    #[test]
    fn test_validation_from_errors() {
        assert!(Validation::from_errors(Vec::new()).ok);
        let failed = Validation::from_errors(vec!["bad".into()]);
        assert!(!failed.ok);
        assert_eq!(failed.errors, vec!["bad".to_string()]);
    }

    #[test]
    fn test_registry_lookup_and_replace() {
        let mut registry = AdapterRegistry::new().with(Rc::new(Fixed("b"))).with(Rc::new(Fixed("a")));
        assert_eq!(registry.volume_ids(), vec!["a", "b"]);
        assert!(registry.get("a").is_some());
        assert!(registry.get("zzz").is_none());
        assert!(registry.register(Rc::new(Fixed("a"))).is_some());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_default_capabilities_and_deep_link() {
        let adapter = Fixed("a");
        assert!(!adapter.capabilities().deep_links);
        assert!(adapter.resolve_deep_link("item:x").is_none());
    }
}
