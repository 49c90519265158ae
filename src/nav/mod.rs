//! Navigation state: an observable cursor over one sibling list.
//!
//! The cursor never rests on a gap. `set_items` always emits `Reset`;
//! successful selection changes emit `Select`.

use crate::item::{Item, Slot};

#[derive(Debug, Clone, PartialEq)]
pub enum NavEvent {
    /// The list was replaced.
    Reset { index: usize, len: usize },
    /// The cursor moved within the current list.
    Select { from: usize, to: usize, item: Item },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&NavEvent)>;

pub struct NavigationState {
    slots: Vec<Slot>,
    current: usize,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl NavigationState {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            current: 0,
            listeners: Vec::new(),
            next_subscription: 1,
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&NavEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_item(&self) -> Option<&Item> {
        self.slots.get(self.current).and_then(Slot::item)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.item().is_some_and(|i| i.id == id))
    }

    /// Replace the list. The selection is clamped into range and moved off
    /// gaps; `Reset` is emitted unconditionally.
    pub fn set_items(&mut self, slots: Vec<Slot>, selected: usize) {
        self.slots = slots;
        let clamped = selected.min(self.slots.len().saturating_sub(1));
        self.current = self.nearest_item(clamped).unwrap_or(0);
        let event = NavEvent::Reset {
            index: self.current,
            len: self.slots.len(),
        };
        self.emit(&event);
    }

    /// Move the cursor to `index`. Out of range, unchanged, or gap → no-op.
    pub fn select_index(&mut self, index: usize) -> bool {
        if index == self.current {
            return false;
        }
        let Some(item) = self.slots.get(index).and_then(Slot::item).cloned() else {
            return false;
        };
        let from = self.current;
        self.current = index;
        self.emit(&NavEvent::Select {
            from,
            to: index,
            item,
        });
        true
    }

    /// Step by `delta`, wrapping around the ends. Gaps are skipped in the
    /// direction of travel.
    pub fn select_offset(&mut self, delta: i64) -> bool {
        let len = self.slots.len();
        if len == 0 || delta == 0 {
            return false;
        }
        let step = delta.signum();
        let mut target = self.wrap_index(self.current as i64 + delta);
        for _ in 0..len {
            if !self.slots[target].is_gap() {
                return self.select_index(target);
            }
            target = self.wrap_index(target as i64 + step);
        }
        false
    }

    /// Normalise any integer into `[0, len)`. Empty lists map to 0.
    pub fn wrap_index(&self, index: i64) -> usize {
        let len = self.slots.len() as i64;
        if len == 0 {
            return 0;
        }
        index.rem_euclid(len) as usize
    }

    /// Nearest non-gap slot to `index`, preferring the later one on ties.
    fn nearest_item(&self, index: usize) -> Option<usize> {
        let len = self.slots.len();
        (0..len).find_map(|distance| {
            let after = index + distance;
            if after < len && !self.slots[after].is_gap() {
                return Some(after);
            }
            let before = index.checked_sub(distance)?;
            (!self.slots[before].is_gap()).then_some(before)
        })
    }

    fn emit(&mut self, event: &NavEvent) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(event);
        }
    }
}

impl Default for NavigationState {
    fn default() -> Self {
        Self::new()
    }
}
