//! Store/navigation bridge: Adapter → Validate → Normalize → Install
//!
//! Owns the active `VolumeSession`, the `NavigationState` over the current
//! sibling level and the observable `VolumeStore`. All methods take `&self`
//! so several switch requests can be in flight as concurrent futures on one
//! thread.
//!
//! Switch serialization: one switch runs at a time. While it runs, at most
//! one request waits; a newer request cancels the waiting one. The running
//! switch is never aborted.
//!
//! An attached ring choreographer is re-bounded on every list change.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;
use std::time::Instant;

use futures::channel::oneshot;

use super::adapter::{AdapterRegistry, DeepLinkTarget, Validation, VolumeAdapter};
use super::session::VolumeSession;
use super::store::{StoreSubscription, VolumeSnapshot, VolumeStore};
use crate::error::BridgeError;
use crate::item::{build_sibling_slots, Item, Slot};
use crate::nav::NavigationState;
use crate::render::animator::RotationChoreographer;
use crate::render::placement::{rotation_bounds, rotation_for_order};
use crate::telemetry::{elapsed_ms, ManifestPhase, TelemetryEvent, TelemetrySink};

/// How a `switch_volume` call ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    Completed { volume_id: String },
    /// Superseded while queued by a newer request. Not an error.
    Cancelled { volume_id: String },
}

impl SwitchOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

enum Ticket {
    /// The slot itself travels with the wake-up. If the waiter is dropped
    /// before it runs, the slot drops with the channel and is passed on.
    Proceed(SwitchSlot),
    Cancelled,
}

struct QueuedSwitch {
    volume_id: String,
    wake: oneshot::Sender<Ticket>,
}

#[derive(Default)]
struct SwitchQueue {
    busy: bool,
    queued: Option<QueuedSwitch>,
}

/// Ownership of the switch slot. Dropping it hands the slot to the waiting
/// request, or marks the queue idle when nobody is waiting.
struct SwitchSlot {
    queue: Rc<RefCell<SwitchQueue>>,
}

impl Drop for SwitchSlot {
    fn drop(&mut self) {
        let next = {
            let mut queue = self.queue.borrow_mut();
            match queue.queued.take() {
                Some(next) => next,
                None => {
                    queue.busy = false;
                    return;
                }
            }
        };
        log::debug!("Handing switch slot to '{}'", next.volume_id);
        // A dead receiver returns the ticket; dropping it releases the slot
        // again with the queue already emptied.
        let _ = next.wake.send(Ticket::Proceed(SwitchSlot {
            queue: self.queue.clone(),
        }));
    }
}

enum Claim {
    Run(SwitchSlot),
    Wait(oneshot::Receiver<Ticket>),
}

/// A choreographer kept in step with the navigation list.
struct RingBinding {
    choreo: RotationChoreographer,
    spacing: f32,
}

pub struct NavigationBridge {
    registry: AdapterRegistry,
    session: RefCell<Option<VolumeSession>>,
    nav: RefCell<NavigationState>,
    store: RefCell<VolumeStore>,
    /// Parent whose children form the current level; `None` = roots
    level: RefCell<Option<String>>,
    switches: Rc<RefCell<SwitchQueue>>,
    ring: RefCell<Option<RingBinding>>,
    telemetry: Option<Rc<dyn TelemetrySink>>,
}

impl NavigationBridge {
    pub fn new(registry: AdapterRegistry) -> Self {
        Self {
            registry,
            session: RefCell::new(None),
            nav: RefCell::new(NavigationState::new()),
            store: RefCell::new(VolumeStore::new()),
            level: RefCell::new(None),
            switches: Rc::new(RefCell::new(SwitchQueue::default())),
            ring: RefCell::new(None),
            telemetry: None,
        }
    }

    /// Set the telemetry sink (shared reference).
    pub fn with_telemetry(mut self, sink: Rc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(sink);
        self
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    // ── Accessors ───────────────────────────────────────────────

    /// Published volume id; unchanged by failed or cancelled switches.
    pub fn volume_id(&self) -> Option<String> {
        self.store.borrow().volume_id().map(str::to_string)
    }

    /// Registry key of the loaded adapter.
    pub fn active_adapter(&self) -> Option<String> {
        self.session
            .borrow()
            .as_ref()
            .map(|s| s.adapter_id().to_string())
    }

    pub fn snapshot(&self) -> VolumeSnapshot {
        self.store.borrow().snapshot().clone()
    }

    /// Borrow the navigation state. Do not hold the borrow across calls back
    /// into the bridge.
    pub fn nav(&self) -> Ref<'_, NavigationState> {
        self.nav.borrow()
    }

    pub fn nav_mut(&self) -> RefMut<'_, NavigationState> {
        self.nav.borrow_mut()
    }

    pub fn session(&self) -> Ref<'_, Option<VolumeSession>> {
        self.session.borrow()
    }

    pub fn subscribe_store(
        &self,
        listener: impl FnMut(&VolumeSnapshot) + 'static,
    ) -> StoreSubscription {
        self.store.borrow_mut().subscribe(listener)
    }

    /// Slots of the current level, gaps included.
    pub fn slots(&self) -> Vec<Slot> {
        self.nav.borrow().slots().to_vec()
    }

    /// Items of the current level, gaps dropped.
    pub fn items(&self) -> Vec<Item> {
        self.nav
            .borrow()
            .slots()
            .iter()
            .filter_map(Slot::item)
            .cloned()
            .collect()
    }

    pub fn current_item(&self) -> Option<Item> {
        self.nav.borrow().current_item().cloned()
    }

    /// Parent of the current level, `None` at the root.
    pub fn level(&self) -> Option<String> {
        self.level.borrow().clone()
    }

    // ── Ring binding ────────────────────────────────────────────

    /// Keep `choreo` in step with the navigation list. Every list change
    /// stops its momentum, replaces its bounds and puts the selection on the
    /// magnifier.
    pub fn attach_ring(&self, choreo: RotationChoreographer, spacing: f32) {
        *self.ring.borrow_mut() = Some(RingBinding { choreo, spacing });
        self.sync_ring();
    }

    /// Node spacing changed (viewport resize); bounds follow.
    pub fn set_ring_spacing(&self, spacing: f32) {
        if let Some(ring) = self.ring.borrow_mut().as_mut() {
            ring.spacing = spacing;
        }
        self.sync_ring();
    }

    fn sync_ring(&self) {
        let Some((choreo, spacing)) = self
            .ring
            .borrow()
            .as_ref()
            .map(|r| (r.choreo.clone(), r.spacing))
        else {
            return;
        };
        let ((min, max), target) = {
            let nav = self.nav.borrow();
            let target = nav
                .current_item()
                .map(|i| rotation_for_order(i.order, spacing))
                .unwrap_or(0.0);
            (rotation_bounds(nav.slots(), spacing), target)
        };
        choreo.stop_momentum();
        choreo.set_bounds(min, max);
        choreo.jump_to(target);
        log::trace!("ring bounds [{min}, {max}] rotation {target}");
    }

    /// Replace the visible list. Every list change goes through here.
    fn show_level(&self, level: Option<String>, slots: Vec<Slot>, index: usize) {
        *self.level.borrow_mut() = level;
        self.nav.borrow_mut().set_items(slots, index);
        self.sync_ring();
    }

    // ── Volume switching ────────────────────────────────────────

    /// Load `volume_id` and make it the active volume.
    ///
    /// Returns `Cancelled` when a newer request replaced this one while it
    /// was waiting. On error the previous volume stays fully in place.
    pub async fn switch_volume(&self, volume_id: &str) -> Result<SwitchOutcome, BridgeError> {
        self.switch_with(volume_id, None).await
    }

    /// Serialized switch. With `focus`, the staged volume must contain that
    /// item or nothing is installed; on success it is focused in the same
    /// step as the install.
    async fn switch_with(
        &self,
        volume_id: &str,
        focus: Option<&str>,
    ) -> Result<SwitchOutcome, BridgeError> {
        let adapter = self
            .registry
            .get(volume_id)
            .ok_or_else(|| BridgeError::UnknownVolume(volume_id.to_string()))?;

        let _slot = match self.claim_slot(volume_id) {
            Claim::Run(slot) => slot,
            Claim::Wait(rx) => {
                self.emit(TelemetryEvent::VolumeSwitchQueued {
                    volume: volume_id.to_string(),
                });
                match rx.await {
                    Ok(Ticket::Proceed(slot)) => slot,
                    Ok(Ticket::Cancelled) | Err(oneshot::Canceled) => {
                        log::debug!("Switch to '{volume_id}' superseded");
                        self.emit(TelemetryEvent::VolumeSwitchCancelled {
                            volume: volume_id.to_string(),
                        });
                        return Ok(SwitchOutcome::Cancelled {
                            volume_id: volume_id.to_string(),
                        });
                    }
                }
            }
        };
        self.emit(TelemetryEvent::VolumeSwitchStart {
            volume: volume_id.to_string(),
        });

        match self.load_volume(adapter, focus).await {
            Ok(published) => {
                log::info!("Switched to volume '{published}'");
                self.emit(TelemetryEvent::VolumeSwitchComplete {
                    volume: volume_id.to_string(),
                });
                Ok(SwitchOutcome::Completed {
                    volume_id: published,
                })
            }
            Err(e) => {
                self.emit(TelemetryEvent::VolumeSwitchError {
                    volume: volume_id.to_string(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Take the idle slot, or queue behind the running switch and cancel
    /// whichever request was waiting before.
    fn claim_slot(&self, volume_id: &str) -> Claim {
        let mut queue = self.switches.borrow_mut();
        if !queue.busy {
            queue.busy = true;
            return Claim::Run(SwitchSlot {
                queue: self.switches.clone(),
            });
        }
        let (wake, rx) = oneshot::channel();
        let replaced = queue.queued.replace(QueuedSwitch {
            volume_id: volume_id.to_string(),
            wake,
        });
        if let Some(prev) = replaced {
            let _ = prev.wake.send(Ticket::Cancelled);
        }
        Claim::Wait(rx)
    }

    async fn load_volume(
        &self,
        adapter: Rc<dyn VolumeAdapter>,
        focus: Option<&str>,
    ) -> Result<String, BridgeError> {
        let volume = adapter.volume_id().to_string();
        self.emit(TelemetryEvent::VolumeLoadStart {
            volume: volume.clone(),
        });

        let session = match self.run_pipeline(adapter).await {
            Ok(session) => session,
            Err(e) => {
                log::warn!("Volume '{volume}' failed to load: {e}");
                self.emit(TelemetryEvent::VolumeLoadError {
                    volume,
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                });
                return Err(e);
            }
        };
        if let Some(id) = focus {
            if !session.contains(id) {
                log::debug!("Volume '{volume}' has no item '{id}'; not installing");
                return Err(BridgeError::UnknownItem(id.to_string()));
            }
        }

        let items = session.len();
        let published = self.install(session, focus);
        self.emit(TelemetryEvent::VolumeLoadSuccess { volume, items });
        Ok(published)
    }

    /// Load → validate → normalize → index. Touches no bridge state.
    async fn run_pipeline(&self, adapter: Rc<dyn VolumeAdapter>) -> Result<VolumeSession, BridgeError> {
        let volume = adapter.volume_id().to_string();

        let start = Instant::now();
        let raw = adapter
            .load_manifest()
            .await
            .map_err(|source| BridgeError::ManifestLoad {
                volume: volume.clone(),
                source,
            })?;
        self.perf(&volume, ManifestPhase::Load, start);

        let start = Instant::now();
        let Validation { ok, mut errors } = adapter.validate(&raw).await;
        self.perf(&volume, ManifestPhase::Validate, start);
        if !ok {
            if errors.is_empty() {
                errors.push("manifest rejected by adapter".to_string());
            }
            return Err(BridgeError::ManifestValidation { volume, errors });
        }

        let start = Instant::now();
        let normalized = adapter
            .normalize(raw)
            .await
            .map_err(|source| BridgeError::ManifestLoad {
                volume: volume.clone(),
                source,
            })?;
        self.perf(&volume, ManifestPhase::Normalize, start);

        VolumeSession::build(adapter, normalized)
            .map_err(|errors| BridgeError::ManifestValidation { volume, errors })
    }

    /// Swap in a fully built session. Nothing here can fail.
    fn install(&self, session: VolumeSession, focus: Option<&str>) -> String {
        let published = session.volume_id().to_string();
        let snapshot = VolumeSnapshot::for_volume(&published, session.meta());
        let (level, slots, index) = match focus {
            Some(id) => siblings_of(&session, id),
            None => (None, build_sibling_slots(session.children_of(None)), 0),
        };

        *self.session.borrow_mut() = Some(session);
        self.show_level(level, slots, index);
        self.store.borrow_mut().publish(snapshot);
        published
    }

    // ── Hierarchy ───────────────────────────────────────────────

    /// Show the siblings of `id` with `id` selected.
    pub fn focus(&self, id: &str) -> Result<(), BridgeError> {
        let (level, slots, index) = {
            let session = self.session.borrow();
            let session = session.as_ref().ok_or(BridgeError::NoVolume)?;
            if !session.contains(id) {
                return Err(BridgeError::UnknownItem(id.to_string()));
            }
            siblings_of(session, id)
        };
        self.show_level(level, slots, index);
        log::debug!("Focused '{id}'");
        Ok(())
    }

    /// Make the current item's children the active level. Returns false
    /// when the selection has no children.
    pub fn descend(&self) -> Result<bool, BridgeError> {
        let current = self.current_item().ok_or(BridgeError::NoVolume)?;
        let slots = {
            let session = self.session.borrow();
            let session = session.as_ref().ok_or(BridgeError::NoVolume)?;
            build_sibling_slots(session.adapter().children(session, &current.id))
        };
        if slots.is_empty() {
            return Ok(false);
        }
        self.show_level(Some(current.id), slots, 0);
        Ok(true)
    }

    /// Return to the parent level with the parent selected. Returns false at
    /// the root.
    pub fn ascend(&self) -> Result<bool, BridgeError> {
        if self.session.borrow().is_none() {
            return Err(BridgeError::NoVolume);
        }
        let Some(parent) = self.level() else {
            return Ok(false);
        };
        self.focus(&parent)?;
        Ok(true)
    }

    /// Children of the current selection, for the pyramid.
    pub fn children_of_selection(&self) -> Vec<Item> {
        let Some(current) = self.current_item() else {
            return Vec::new();
        };
        let session = self.session.borrow();
        match session.as_ref() {
            Some(session) => session.adapter().children(session, &current.id),
            None => Vec::new(),
        }
    }

    // ── Dimensions ──────────────────────────────────────────────

    /// Select `value` for a secondary dimension declared by the volume.
    pub fn set_dimension(&self, name: &str, value: &str) -> Result<(), BridgeError> {
        {
            let session = self.session.borrow();
            let session = session.as_ref().ok_or(BridgeError::NoVolume)?;
            let allowed = session
                .meta()
                .dimensions
                .get(name)
                .is_some_and(|values| values.iter().any(|v| v == value));
            if !allowed {
                return Err(BridgeError::UnknownDimension {
                    name: name.to_string(),
                    value: value.to_string(),
                });
            }
        }
        self.store.borrow_mut().set_dimension(name, value);
        Ok(())
    }

    // ── Deep links ──────────────────────────────────────────────

    /// Resolve `token` against `volume` (or the active volume) and focus the
    /// target. A target in another volume is switched to only when the
    /// loaded volume actually holds the item.
    pub async fn resolve_deep_link(
        &self,
        token: &str,
        volume: Option<&str>,
    ) -> Result<DeepLinkTarget, BridgeError> {
        self.emit(TelemetryEvent::DeepLinkStart {
            token: token.to_string(),
            volume: volume.map(str::to_string),
        });

        let result = self.follow_deep_link(token, volume).await;
        match &result {
            Ok((volume, target)) => self.emit(TelemetryEvent::DeepLinkSuccess {
                token: token.to_string(),
                volume: volume.clone(),
                focus_id: target.focus_id.clone(),
            }),
            Err(e) => {
                log::warn!("Deep link '{token}' failed: {e}");
                self.emit(TelemetryEvent::DeepLinkError {
                    token: token.to_string(),
                    message: e.to_string(),
                });
            }
        }
        result.map(|(_, target)| target)
    }

    async fn follow_deep_link(
        &self,
        token: &str,
        volume: Option<&str>,
    ) -> Result<(String, DeepLinkTarget), BridgeError> {
        let active = self.active_adapter();
        let target_volume = match (volume, active.as_deref()) {
            (Some(v), _) => v.to_string(),
            (None, Some(a)) => a.to_string(),
            (None, None) => return Err(BridgeError::NoVolume),
        };
        let adapter = self
            .registry
            .get(&target_volume)
            .ok_or_else(|| BridgeError::UnknownVolume(target_volume.clone()))?;

        let unresolved = |reason: &str| BridgeError::DeepLinkResolution {
            token: token.to_string(),
            reason: reason.to_string(),
        };
        if !adapter.capabilities().deep_links {
            return Err(unresolved("volume does not support deep links"));
        }
        let target = adapter
            .resolve_deep_link(token)
            .ok_or_else(|| unresolved("token not recognised"))?;

        let not_in_volume = |e: BridgeError| match e {
            BridgeError::UnknownItem(id) => unresolved(&format!("item '{id}' not in volume")),
            other => other,
        };
        if active.as_deref() == Some(target_volume.as_str()) {
            self.focus(&target.focus_id).map_err(not_in_volume)?;
        } else if self
            .switch_with(&target_volume, Some(&target.focus_id))
            .await
            .map_err(not_in_volume)?
            .is_cancelled()
        {
            return Err(unresolved("superseded by a newer volume switch"));
        }
        Ok((target_volume, target))
    }

    // ── Telemetry ───────────────────────────────────────────────

    fn emit(&self, event: TelemetryEvent) {
        if let Some(sink) = &self.telemetry {
            sink.emit(&event);
        }
    }

    fn perf(&self, volume: &str, phase: ManifestPhase, start: Instant) {
        self.emit(TelemetryEvent::PerfManifest {
            volume: volume.to_string(),
            phase,
            duration_ms: elapsed_ms(start),
        });
    }
}

/// Level, sibling slots and slot index that show `id` selected.
fn siblings_of(session: &VolumeSession, id: &str) -> (Option<String>, Vec<Slot>, usize) {
    let parent = session.parent_of(id).map(|p| p.id.clone());
    let slots = build_sibling_slots(session.children_of(parent.as_deref()));
    let index = slots
        .iter()
        .position(|s| s.item().is_some_and(|i| i.id == id))
        .unwrap_or(0);
    (parent, slots, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::adapter::{AdapterCapabilities, NormalizedVolume, VolumeMeta};
    use crate::error::ManifestError;
    use crate::telemetry::MemorySink;
    use async_trait::async_trait;
    use futures::executor::block_on;
    use crate::render::scheduler::ManualFrameScheduler;
    use crate::render::RotationPhase;
    use futures::future::FutureExt;
    use futures::task::noop_waker;
    use serde_json::Value;
    use std::collections::BTreeMap;
    use std::future::Future;
    use std::task::{Context, Poll};

    struct TestAdapter {
        id: &'static str,
        items: Vec<Item>,
        valid: bool,
        load_fails: bool,
        gate: RefCell<Option<oneshot::Receiver<()>>>,
        dimensions: BTreeMap<String, Vec<String>>,
    }

    impl TestAdapter {
        fn new(id: &'static str, items: Vec<Item>) -> Self {
            Self {
                id,
                items,
                valid: true,
                load_fails: false,
                gate: RefCell::new(None),
                dimensions: BTreeMap::new(),
            }
        }

        fn invalid(mut self) -> Self {
            self.valid = false;
            self
        }

        fn unreadable(mut self) -> Self {
            self.load_fails = true;
            self
        }

        fn gated(self, gate: oneshot::Receiver<()>) -> Self {
            *self.gate.borrow_mut() = Some(gate);
            self
        }
    }

    #[async_trait(?Send)]
    impl VolumeAdapter for TestAdapter {
        fn volume_id(&self) -> &str {
            self.id
        }

        fn capabilities(&self) -> AdapterCapabilities {
            AdapterCapabilities {
                deep_links: true,
                dimensions: !self.dimensions.is_empty(),
            }
        }

        async fn load_manifest(&self) -> Result<Value, ManifestError> {
            let gate = self.gate.borrow_mut().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            if self.load_fails {
                return Err(ManifestError::Other("manifest unreachable".into()));
            }
            Ok(Value::Null)
        }

        async fn validate(&self, _raw: &Value) -> Validation {
            if self.valid {
                Validation::passed()
            } else {
                Validation::from_errors(vec!["items must be an array".into()])
            }
        }

        async fn normalize(&self, _raw: Value) -> Result<NormalizedVolume, ManifestError> {
            Ok(NormalizedVolume {
                items: self.items.clone(),
                links: Vec::new(),
                meta: VolumeMeta {
                    volume_id: None,
                    dimensions: self.dimensions.clone(),
                },
            })
        }

        fn resolve_deep_link(&self, token: &str) -> Option<DeepLinkTarget> {
            token.strip_prefix("item:").map(|id| DeepLinkTarget {
                focus_id: id.to_string(),
            })
        }
    }

    fn flat(prefix: &str, n: i64) -> Vec<Item> {
        (0..n).map(|i| Item::new(format!("{prefix}{i}"), i)).collect()
    }

    fn bible() -> Vec<Item> {
        vec![
            Item::new("ot", 0),
            Item::new("nt", 1),
            Item::new("gen", 0).with_parent("ot"),
            Item::new("exo", 1).with_parent("ot"),
            Item::new("lev", 2).with_parent("ot"),
            Item::new("mat", 0).with_parent("nt"),
        ]
    }

    fn assert_bounds(choreo: &RotationChoreographer, min: f32, max: f32) {
        let (lo, hi) = choreo.bounds();
        assert!((lo - min).abs() < 1e-5, "min {lo} != {min}");
        assert!((hi - max).abs() < 1e-5, "max {hi} != {max}");
    }

    fn ids(items: &[Item]) -> Vec<String> {
        items.iter().map(|i| i.id.clone()).collect()
    }

    #[test]
    fn test_switch_installs_roots() {
        let registry = AdapterRegistry::new().with(Rc::new(TestAdapter::new("bible", bible())));
        let bridge = NavigationBridge::new(registry);
        let outcome = block_on(bridge.switch_volume("bible")).unwrap();
        assert_eq!(
            outcome,
            SwitchOutcome::Completed {
                volume_id: "bible".into()
            }
        );
        assert_eq!(bridge.volume_id().as_deref(), Some("bible"));
        assert_eq!(ids(&bridge.items()), vec!["ot", "nt"]);
        assert_eq!(bridge.current_item().map(|i| i.id), Some("ot".into()));
    }

    #[test]
    fn test_latest_pending_switch_wins() {
        let (open, gate) = oneshot::channel::<()>();
        let registry = AdapterRegistry::new()
            .with(Rc::new(TestAdapter::new("a", flat("a", 3)).gated(gate)))
            .with(Rc::new(TestAdapter::new("b", flat("b", 3))))
            .with(Rc::new(TestAdapter::new("c", flat("c", 3))));
        let sink = Rc::new(MemorySink::new());
        let bridge = NavigationBridge::new(registry).with_telemetry(sink.clone());

        let (a, b, c, ()) = block_on(async {
            futures::join!(
                bridge.switch_volume("a"),
                bridge.switch_volume("b"),
                bridge.switch_volume("c"),
                async {
                    let _ = open.send(());
                }
            )
        });

        assert_eq!(a.unwrap(), SwitchOutcome::Completed { volume_id: "a".into() });
        assert!(b.unwrap().is_cancelled());
        assert_eq!(c.unwrap(), SwitchOutcome::Completed { volume_id: "c".into() });
        assert_eq!(bridge.volume_id().as_deref(), Some("c"));
        assert_eq!(ids(&bridge.items()), vec!["c0", "c1", "c2"]);

        let names = sink.names();
        assert_eq!(names.iter().filter(|n| **n == "volume-switch:queued").count(), 2);
        assert_eq!(names.iter().filter(|n| **n == "volume-switch:cancelled").count(), 1);
        assert_eq!(names.iter().filter(|n| **n == "volume-switch:complete").count(), 2);

        // slot released: a fresh switch runs immediately
        let again = block_on(bridge.switch_volume("b")).unwrap();
        assert!(!again.is_cancelled());
    }

    #[test]
    fn test_failed_validation_keeps_previous_volume() {
        let registry = AdapterRegistry::new()
            .with(Rc::new(TestAdapter::new("good", flat("g", 4))))
            .with(Rc::new(TestAdapter::new("bad", flat("x", 2)).invalid()));
        let sink = Rc::new(MemorySink::new());
        let bridge = NavigationBridge::new(registry).with_telemetry(sink.clone());
        block_on(bridge.switch_volume("good")).unwrap();
        bridge.nav_mut().select_index(2);

        let err = block_on(bridge.switch_volume("bad")).unwrap_err();
        assert!(matches!(err, BridgeError::ManifestValidation { .. }));
        assert!(err.to_string().contains("validation failed"));
        assert!(err.to_string().contains("items must be an array"));

        assert_eq!(bridge.volume_id().as_deref(), Some("good"));
        assert_eq!(ids(&bridge.items()), vec!["g0", "g1", "g2", "g3"]);
        assert_eq!(bridge.nav().current_index(), 2);
        assert!(sink.names().contains(&"volume-load:error"));
        assert!(sink.names().contains(&"volume-switch:error"));
    }

    #[test]
    fn test_duplicate_ids_fail_validation() {
        let mut items = flat("d", 2);
        items.push(Item::new("d0", 5));
        let registry = AdapterRegistry::new().with(Rc::new(TestAdapter::new("dup", items)));
        let bridge = NavigationBridge::new(registry);
        let err = block_on(bridge.switch_volume("dup")).unwrap_err();
        assert_eq!(err.kind(), "manifest-validation");
        assert!(bridge.volume_id().is_none());
    }

    #[test]
    fn test_unknown_volume() {
        let bridge = NavigationBridge::new(AdapterRegistry::new());
        let err = block_on(bridge.switch_volume("nope")).unwrap_err();
        assert!(matches!(err, BridgeError::UnknownVolume(_)));
    }

    #[test]
    fn test_manifest_perf_phases_in_order() {
        let registry = AdapterRegistry::new().with(Rc::new(TestAdapter::new("bible", bible())));
        let sink = Rc::new(MemorySink::new());
        let bridge = NavigationBridge::new(registry).with_telemetry(sink.clone());
        block_on(bridge.switch_volume("bible")).unwrap();
        let phases: Vec<ManifestPhase> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                TelemetryEvent::PerfManifest { phase, .. } => Some(phase),
                _ => None,
            })
            .collect();
        assert_eq!(
            phases,
            vec![ManifestPhase::Load, ManifestPhase::Validate, ManifestPhase::Normalize]
        );
    }

    #[test]
    fn test_descend_ascend_and_children() {
        let registry = AdapterRegistry::new().with(Rc::new(TestAdapter::new("bible", bible())));
        let bridge = NavigationBridge::new(registry);
        block_on(bridge.switch_volume("bible")).unwrap();

        assert_eq!(ids(&bridge.children_of_selection()), vec!["gen", "exo", "lev"]);
        assert!(bridge.descend().unwrap());
        assert_eq!(bridge.level().as_deref(), Some("ot"));
        assert_eq!(ids(&bridge.items()), vec!["gen", "exo", "lev"]);
        assert!(!bridge.descend().unwrap());

        assert!(bridge.ascend().unwrap());
        assert_eq!(bridge.level(), None);
        assert_eq!(bridge.current_item().map(|i| i.id), Some("ot".into()));
        assert!(!bridge.ascend().unwrap());
    }

    #[test]
    fn test_focus_selects_within_siblings() {
        let registry = AdapterRegistry::new().with(Rc::new(TestAdapter::new("bible", bible())));
        let bridge = NavigationBridge::new(registry);
        assert!(matches!(bridge.focus("gen"), Err(BridgeError::NoVolume)));
        block_on(bridge.switch_volume("bible")).unwrap();

        bridge.focus("lev").unwrap();
        assert_eq!(bridge.current_item().map(|i| i.id), Some("lev".into()));
        assert_eq!(bridge.nav().current_index(), 2);
        assert!(matches!(bridge.focus("zzz"), Err(BridgeError::UnknownItem(_))));
    }

    #[test]
    fn test_deep_link_switches_volume_and_focuses() {
        let registry = AdapterRegistry::new()
            .with(Rc::new(TestAdapter::new("bible", bible())))
            .with(Rc::new(TestAdapter::new("cat", flat("c", 5))));
        let sink = Rc::new(MemorySink::new());
        let bridge = NavigationBridge::new(registry).with_telemetry(sink.clone());
        block_on(bridge.switch_volume("bible")).unwrap();

        let target = block_on(bridge.resolve_deep_link("item:c3", Some("cat"))).unwrap();
        assert_eq!(target.focus_id, "c3");
        assert_eq!(bridge.volume_id().as_deref(), Some("cat"));
        assert_eq!(bridge.current_item().map(|i| i.id), Some("c3".into()));
        assert!(sink.names().contains(&"deep-link:success"));
    }

    #[test]
    fn test_unresolvable_deep_link_changes_nothing() {
        let registry = AdapterRegistry::new()
            .with(Rc::new(TestAdapter::new("bible", bible())))
            .with(Rc::new(TestAdapter::new("cat", flat("c", 5))));
        let sink = Rc::new(MemorySink::new());
        let bridge = NavigationBridge::new(registry).with_telemetry(sink.clone());
        block_on(bridge.switch_volume("bible")).unwrap();
        bridge.nav_mut().select_index(1);

        let err = block_on(bridge.resolve_deep_link("garbage", Some("cat"))).unwrap_err();
        assert_eq!(err.kind(), "deep-link-resolution");
        assert_eq!(bridge.volume_id().as_deref(), Some("bible"));
        assert_eq!(bridge.nav().current_index(), 1);
        assert!(sink.names().contains(&"deep-link:error"));

        let err = block_on(bridge.resolve_deep_link("item:nope", None)).unwrap_err();
        assert_eq!(err.kind(), "deep-link-resolution");
        assert_eq!(bridge.nav().current_index(), 1);
    }

    #[test]
    fn test_dimensions_publish_defaults_and_updates() {
        let mut adapter = TestAdapter::new("bible", bible());
        adapter
            .dimensions
            .insert("language".into(), vec!["en".into(), "ru".into()]);
        let bridge = NavigationBridge::new(AdapterRegistry::new().with(Rc::new(adapter)));
        let seen = Rc::new(RefCell::new(0));
        let s = seen.clone();
        bridge.subscribe_store(move |_| *s.borrow_mut() += 1);

        block_on(bridge.switch_volume("bible")).unwrap();
        assert_eq!(bridge.snapshot().dimension("language"), Some("en"));
        bridge.set_dimension("language", "ru").unwrap();
        assert_eq!(bridge.snapshot().dimension("language"), Some("ru"));
        assert!(matches!(
            bridge.set_dimension("language", "xx"),
            Err(BridgeError::UnknownDimension { .. })
        ));
        assert_eq!(*seen.borrow(), 2);
    }

    #[test]
    fn test_dropped_waiter_after_hand_off_releases_slot() {
        let (open, gate) = oneshot::channel::<()>();
        let registry = AdapterRegistry::new()
            .with(Rc::new(TestAdapter::new("a", flat("a", 3)).gated(gate)))
            .with(Rc::new(TestAdapter::new("b", flat("b", 3))))
            .with(Rc::new(TestAdapter::new("c", flat("c", 3))));
        let bridge = NavigationBridge::new(registry);
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let mut a = Box::pin(bridge.switch_volume("a"));
        let mut c = Box::pin(bridge.switch_volume("c"));
        assert!(a.as_mut().poll(&mut cx).is_pending());
        assert!(c.as_mut().poll(&mut cx).is_pending());

        open.send(()).unwrap();
        match a.as_mut().poll(&mut cx) {
            Poll::Ready(Ok(outcome)) => assert_eq!(outcome, SwitchOutcome::Completed { volume_id: "a".into() }),
            other => panic!("Expected switch to a to complete, got {:?}", other),
        }
        // c now holds the slot but never runs
        drop(a);
        drop(c);

        let again = bridge.switch_volume("b").now_or_never();
        assert!(matches!(again, Some(Ok(SwitchOutcome::Completed { .. }))));
        assert_eq!(bridge.volume_id().as_deref(), Some("b"));
    }

    #[test]
    fn test_dropped_waiter_before_hand_off_releases_slot() {
        let (open, gate) = oneshot::channel::<()>();
        let registry = AdapterRegistry::new()
            .with(Rc::new(TestAdapter::new("a", flat("a", 3)).gated(gate)))
            .with(Rc::new(TestAdapter::new("b", flat("b", 3))))
            .with(Rc::new(TestAdapter::new("c", flat("c", 3))));
        let bridge = NavigationBridge::new(registry);
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let mut a = Box::pin(bridge.switch_volume("a"));
        let mut c = Box::pin(bridge.switch_volume("c"));
        assert!(a.as_mut().poll(&mut cx).is_pending());
        assert!(c.as_mut().poll(&mut cx).is_pending());
        drop(c);

        open.send(()).unwrap();
        assert!(matches!(a.as_mut().poll(&mut cx), Poll::Ready(Ok(_))));
        drop(a);

        let again = bridge.switch_volume("b").now_or_never();
        assert!(matches!(again, Some(Ok(SwitchOutcome::Completed { .. }))));
    }

    #[test]
    fn test_failed_load_keeps_previous_volume() {
        let registry = AdapterRegistry::new()
            .with(Rc::new(TestAdapter::new("good", flat("g", 4))))
            .with(Rc::new(TestAdapter::new("gone", flat("x", 2)).unreadable()));
        let sink = Rc::new(MemorySink::new());
        let bridge = NavigationBridge::new(registry).with_telemetry(sink.clone());
        block_on(bridge.switch_volume("good")).unwrap();
        bridge.nav_mut().select_index(3);

        let err = block_on(bridge.switch_volume("gone")).unwrap_err();
        assert_eq!(err.kind(), "manifest-load");
        assert!(err.to_string().contains("manifest unreachable"));

        assert_eq!(bridge.volume_id().as_deref(), Some("good"));
        assert_eq!(bridge.active_adapter().as_deref(), Some("good"));
        assert_eq!(ids(&bridge.items()), vec!["g0", "g1", "g2", "g3"]);
        assert_eq!(bridge.nav().current_index(), 3);
        assert!(sink.names().contains(&"volume-load:error"));
    }

    #[test]
    fn test_failing_switch_still_hands_slot_to_waiter() {
        let (open, gate) = oneshot::channel::<()>();
        let registry = AdapterRegistry::new()
            .with(Rc::new(TestAdapter::new("gone", flat("x", 2)).unreadable().gated(gate)))
            .with(Rc::new(TestAdapter::new("c", flat("c", 3))));
        let bridge = NavigationBridge::new(registry);

        let (gone, c, ()) = block_on(async {
            futures::join!(
                bridge.switch_volume("gone"),
                bridge.switch_volume("c"),
                async {
                    let _ = open.send(());
                }
            )
        });

        assert_eq!(gone.unwrap_err().kind(), "manifest-load");
        assert_eq!(c.unwrap(), SwitchOutcome::Completed { volume_id: "c".into() });
        assert_eq!(bridge.volume_id().as_deref(), Some("c"));
    }

    #[test]
    fn test_cross_volume_deep_link_to_missing_item_changes_nothing() {
        let registry = AdapterRegistry::new()
            .with(Rc::new(TestAdapter::new("bible", bible())))
            .with(Rc::new(TestAdapter::new("cat", flat("c", 5))));
        let store_updates = Rc::new(RefCell::new(0));
        let bridge = NavigationBridge::new(registry);
        block_on(bridge.switch_volume("bible")).unwrap();
        bridge.focus("exo").unwrap();
        let u = store_updates.clone();
        bridge.subscribe_store(move |_| *u.borrow_mut() += 1);

        let err = block_on(bridge.resolve_deep_link("item:nope", Some("cat"))).unwrap_err();
        assert_eq!(err.kind(), "deep-link-resolution");
        assert!(err.to_string().contains("'nope' not in volume"));

        assert_eq!(bridge.volume_id().as_deref(), Some("bible"));
        assert_eq!(bridge.active_adapter().as_deref(), Some("bible"));
        assert_eq!(bridge.level().as_deref(), Some("ot"));
        assert_eq!(bridge.current_item().map(|i| i.id), Some("exo".into()));
        assert_eq!(*store_updates.borrow(), 0);

        // the slot was released: the same volume still loads
        let target = block_on(bridge.resolve_deep_link("item:c4", Some("cat"))).unwrap();
        assert_eq!(target.focus_id, "c4");
        assert_eq!(bridge.volume_id().as_deref(), Some("cat"));
    }

    #[test]
    fn test_list_change_rebinds_ring_mid_momentum() {
        let mut items = flat("r", 10);
        items.push(Item::new("k0", 0).with_parent("r5"));
        items.push(Item::new("k1", 1).with_parent("r5"));
        let registry = AdapterRegistry::new().with(Rc::new(TestAdapter::new("deep", items)));
        let bridge = NavigationBridge::new(registry);
        let sched = Rc::new(ManualFrameScheduler::new());
        let choreo = RotationChoreographer::new(sched.clone());
        bridge.attach_ring(choreo.clone(), 0.1);

        block_on(bridge.switch_volume("deep")).unwrap();
        assert_bounds(&choreo, 0.0, 0.9);
        bridge.focus("r5").unwrap();
        assert!((choreo.rotation() - 0.5).abs() < 1e-6);

        choreo.start_momentum(0.05);
        sched.step(16.0);
        assert_eq!(choreo.phase(), RotationPhase::Momentum);
        assert!(choreo.rotation() > 0.5);

        assert!(bridge.descend().unwrap());
        assert_bounds(&choreo, 0.0, 0.1);
        assert_eq!(choreo.phase(), RotationPhase::Idle);
        assert_eq!(choreo.velocity(), 0.0);
        assert_eq!(choreo.rotation(), 0.0);
        assert!(!choreo.has_pending_frame());
        assert_eq!(sched.pending_count(), 0);

        assert!(bridge.ascend().unwrap());
        assert_bounds(&choreo, 0.0, 0.9);
        assert!((choreo.rotation() - 0.5).abs() < 1e-6);

        bridge.set_ring_spacing(0.2);
        assert_bounds(&choreo, 0.0, 1.8);
        assert!((choreo.rotation() - 1.0).abs() < 1e-6);
    }
}
