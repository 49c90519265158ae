//! Generic hierarchy model shared by the ring, the pyramid and the bridge.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A sibling node in one level of the hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Unique within its volume
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Angular rank on the ring. May be sparse or negative.
    #[serde(default)]
    pub order: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Domain metadata the engine carries but never interprets
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl Item {
    pub fn new(id: impl Into<String>, order: i64) -> Self {
        Self {
            id: id.into(),
            name: None,
            order,
            parent_id: None,
            meta: Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Display label: the name when present, otherwise the id.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// One position in a sibling list.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Item(Item),
    /// Reserves angular space between groups without a visible node.
    Gap,
}

impl Slot {
    pub fn item(&self) -> Option<&Item> {
        match self {
            Slot::Item(item) => Some(item),
            Slot::Gap => None,
        }
    }

    pub fn is_gap(&self) -> bool {
        matches!(self, Slot::Gap)
    }
}

impl From<Item> for Slot {
    fn from(item: Item) -> Self {
        Slot::Item(item)
    }
}

/// Parent → child edge produced by an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub from: String,
    pub to: String,
}

/// Sort siblings by order and insert a gap wherever consecutive orders skip a rank.
pub fn build_sibling_slots(mut items: Vec<Item>) -> Vec<Slot> {
    items.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));

    let mut slots = Vec::with_capacity(items.len());
    let mut prev_order: Option<i64> = None;
    for item in items {
        if let Some(prev) = prev_order {
            if item.order > prev.saturating_add(1) {
                slots.push(Slot::Gap);
            }
        }
        prev_order = Some(item.order);
        slots.push(Slot::Item(item));
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_falls_back_to_id() {
        let bare = Item::new("gen", 0);
        assert_eq!(bare.label(), "gen");
        let named = Item::new("gen", 0).with_name("Genesis");
        assert_eq!(named.label(), "Genesis");
    }

    #[test]
    fn test_sibling_slots_sorted_with_gaps() {
        let items = vec![
            Item::new("c", 5),
            Item::new("a", 0),
            Item::new("b", 1),
            Item::new("d", 6),
        ];
        let slots = build_sibling_slots(items);
        let ids: Vec<Option<&str>> = slots
            .iter()
            .map(|s| s.item().map(|i| i.id.as_str()))
            .collect();
        assert_eq!(ids, vec![Some("a"), Some("b"), None, Some("c"), Some("d")]);
    }

    #[test]
    fn test_sibling_slots_dense_orders_have_no_gaps() {
        let items = (0..4).map(|i| Item::new(format!("n{i}"), i)).collect();
        let slots = build_sibling_slots(items);
        assert!(slots.iter().all(|s| !s.is_gap()));
    }
}
