//! One loaded volume: normalized data plus the lookup indexes built over it.
//!
//! A session is immutable once built. Switching volumes replaces the whole
//! session; a failed switch never touches the current one.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use super::adapter::{NormalizedVolume, VolumeAdapter, VolumeMeta};
use crate::item::{Item, Link};

pub struct VolumeSession {
    adapter: Rc<dyn VolumeAdapter>,
    volume_id: String,
    normalized: NormalizedVolume,
    /// id → position in `normalized.items`
    index: HashMap<String, usize>,
    /// parent id (None = root level) → child positions, in input order
    children: HashMap<Option<String>, Vec<usize>>,
    /// child id → resolved parent id
    parent: HashMap<String, String>,
}

impl VolumeSession {
    /// Index a normalized volume. Fails with every problem found when ids
    /// repeat, a link names an unknown item or parents form a cycle.
    pub fn build(
        adapter: Rc<dyn VolumeAdapter>,
        normalized: NormalizedVolume,
    ) -> Result<Self, Vec<String>> {
        let mut errors = Vec::new();
        let mut index = HashMap::with_capacity(normalized.items.len());
        for (pos, item) in normalized.items.iter().enumerate() {
            if index.insert(item.id.clone(), pos).is_some() {
                errors.push(format!("duplicate item id '{}'", item.id));
            }
        }

        let mut parents: HashMap<&str, &str> = HashMap::new();
        for Link { from, to } in &normalized.links {
            if !index.contains_key(from) {
                errors.push(format!("link source '{from}' is not an item"));
            } else if !index.contains_key(to) {
                errors.push(format!("link target '{to}' is not an item"));
            } else {
                parents.insert(to.as_str(), from.as_str());
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        // parent_id wins; links fill in items that carry no parent
        let mut children: HashMap<Option<String>, Vec<usize>> = HashMap::new();
        let mut parent_of = HashMap::new();
        for (pos, item) in normalized.items.iter().enumerate() {
            let parent = item
                .parent_id
                .clone()
                .or_else(|| parents.get(item.id.as_str()).map(|p| p.to_string()))
                .filter(|p| index.contains_key(p));
            if let Some(p) = &parent {
                parent_of.insert(item.id.clone(), p.clone());
            }
            children.entry(parent).or_default().push(pos);
        }

        // every item must reach the root level
        for item in &normalized.items {
            let mut cursor = parent_of.get(&item.id);
            let mut steps = 0;
            while let Some(parent) = cursor {
                if *parent == item.id {
                    errors.push(format!("item '{}' is its own ancestor", item.id));
                    break;
                }
                steps += 1;
                if steps > parent_of.len() {
                    break;
                }
                cursor = parent_of.get(parent);
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        let volume_id = normalized
            .meta
            .volume_id
            .clone()
            .unwrap_or_else(|| adapter.volume_id().to_string());

        Ok(Self {
            adapter,
            volume_id,
            normalized,
            index,
            children,
            parent: parent_of,
        })
    }

    pub fn adapter(&self) -> &Rc<dyn VolumeAdapter> {
        &self.adapter
    }

    /// Registry key of the adapter that produced this session.
    pub fn adapter_id(&self) -> &str {
        self.adapter.volume_id()
    }

    /// Derived volume id: the manifest's own id, else the adapter's.
    pub fn volume_id(&self) -> &str {
        &self.volume_id
    }

    pub fn meta(&self) -> &VolumeMeta {
        &self.normalized.meta
    }

    pub fn items(&self) -> &[Item] {
        &self.normalized.items
    }

    pub fn links(&self) -> &[Link] {
        &self.normalized.links
    }

    pub fn len(&self) -> usize {
        self.normalized.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.items.is_empty()
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.index.get(id).map(|&pos| &self.normalized.items[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Resolved parent of `id`, if it has one.
    pub fn parent_of(&self, id: &str) -> Option<&Item> {
        self.parent.get(id).and_then(|p| self.item(p))
    }

    /// Children of `parent`, or the root level for `None`.
    pub fn children_of(&self, parent: Option<&str>) -> Vec<Item> {
        let key = parent.map(str::to_string);
        self.children
            .get(&key)
            .map(|positions| {
                positions
                    .iter()
                    .map(|&pos| self.normalized.items[pos].clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_children(&self, id: &str) -> bool {
        self.children
            .get(&Some(id.to_string()))
            .is_some_and(|kids| !kids.is_empty())
    }

    /// Ancestor ids from the root down to the parent of `id`.
    pub fn ancestors(&self, id: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = self.parent_of(id).map(|p| p.id.clone());
        while let Some(parent) = cursor {
            if !seen.insert(parent.clone()) {
                break;
            }
            cursor = self.parent_of(&parent).map(|p| p.id.clone());
            chain.push(parent);
        }
        chain.reverse();
        chain
    }
}
