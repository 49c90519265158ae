//! Rotation choreographer for a ring.
//!
//! Holds the ring's rotation offset and moves it in one of three ways:
//! - Drag: `rotate(delta)` applies an offset immediately
//! - Momentum: a frame loop integrates a velocity that decays every frame
//! - Snap: a linear tween toward a target rotation over a fixed duration
//!
//! Rotation is always clamped to `[min, max]`. A ring owns at most one
//! pending frame callback; starting any loop cancels the previous one.
//! Primary and secondary rings each get their own instance.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::config::RingConfig;
use crate::nav::NavigationState;
use crate::render::arc::Viewport;
use crate::render::placement::{nearest_to_magnifier, rotation_for_order};
use crate::render::scheduler::{FrameHandle, FrameScheduler};

/// Velocity multiplier applied every momentum frame.
pub const MOMENTUM_DECAY: f32 = 0.95;
/// Momentum ends below this speed (radians per frame).
pub const MOMENTUM_MIN_VELOCITY: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationPhase {
    Idle,
    Dragging,
    Momentum,
    Snapping,
}

#[derive(Debug, Clone, Copy)]
struct SnapTween {
    from: f32,
    to: f32,
    duration_ms: f64,
    start_ms: Option<f64>,
}

struct ChoreoInner {
    rotation: f32,
    min: f32,
    max: f32,
    velocity: f32,
    phase: RotationPhase,
    decay: f32,
    min_velocity: f32,
    snap: Option<SnapTween>,
    pending: Option<FrameHandle>,
    on_render: Option<Rc<dyn Fn(f32)>>,
}

impl ChoreoInner {
    fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

/// Cheap-to-clone handle; clones drive the same ring.
#[derive(Clone)]
pub struct RotationChoreographer {
    inner: Rc<RefCell<ChoreoInner>>,
    scheduler: Rc<dyn FrameScheduler>,
}

impl RotationChoreographer {
    pub fn new(scheduler: Rc<dyn FrameScheduler>) -> Self {
        let inner = ChoreoInner {
            rotation: 0.0,
            min: f32::NEG_INFINITY,
            max: f32::INFINITY,
            velocity: 0.0,
            phase: RotationPhase::Idle,
            decay: MOMENTUM_DECAY,
            min_velocity: MOMENTUM_MIN_VELOCITY,
            snap: None,
            pending: None,
            on_render: None,
        };
        Self {
            inner: Rc::new(RefCell::new(inner)),
            scheduler,
        }
    }

    pub fn from_config(scheduler: Rc<dyn FrameScheduler>, cfg: &RingConfig) -> Self {
        let choreo = Self::new(scheduler);
        {
            let mut inner = choreo.inner.borrow_mut();
            inner.decay = cfg.momentum_decay;
            inner.min_velocity = cfg.momentum_min_velocity;
        }
        choreo
    }

    /// Called with the new rotation after every change.
    pub fn set_render_callback(&self, callback: impl Fn(f32) + 'static) {
        self.inner.borrow_mut().on_render = Some(Rc::new(callback));
    }

    pub fn rotation(&self) -> f32 {
        self.inner.borrow().rotation
    }

    pub fn velocity(&self) -> f32 {
        self.inner.borrow().velocity
    }

    pub fn phase(&self) -> RotationPhase {
        self.inner.borrow().phase
    }

    pub fn bounds(&self) -> (f32, f32) {
        let inner = self.inner.borrow();
        (inner.min, inner.max)
    }

    pub fn has_pending_frame(&self) -> bool {
        self.inner.borrow().pending.is_some()
    }

    /// A new gesture starts: kill any momentum or snap still running.
    pub fn begin_drag(&self) {
        self.stop_momentum();
        self.inner.borrow_mut().phase = RotationPhase::Dragging;
    }

    pub fn end_drag(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.phase == RotationPhase::Dragging {
            inner.phase = RotationPhase::Idle;
        }
    }

    /// Immediate offset, clamped to bounds.
    pub fn rotate(&self, delta: f32) {
        let rotation = {
            let mut inner = self.inner.borrow_mut();
            inner.rotation = inner.clamp(inner.rotation + delta);
            inner.rotation
        };
        self.render(rotation);
    }

    /// Set rotation directly (no animation).
    pub fn jump_to(&self, target: f32) {
        self.stop_momentum();
        let rotation = {
            let mut inner = self.inner.borrow_mut();
            inner.rotation = inner.clamp(target);
            inner.rotation
        };
        self.render(rotation);
    }

    /// Start a decaying flick with initial velocity `v0` (radians/frame).
    pub fn start_momentum(&self, v0: f32) {
        self.stop_momentum();
        {
            let mut inner = self.inner.borrow_mut();
            if !v0.is_finite() || v0.abs() < inner.min_velocity {
                return;
            }
            inner.velocity = v0;
            inner.phase = RotationPhase::Momentum;
        }
        log::trace!("momentum start v0={v0}");
        Self::schedule(&self.inner, &self.scheduler);
    }

    /// Cancel any pending momentum or snap frame. Idempotent.
    pub fn stop_momentum(&self) {
        let pending = {
            let mut inner = self.inner.borrow_mut();
            inner.velocity = 0.0;
            inner.snap = None;
            if matches!(inner.phase, RotationPhase::Momentum | RotationPhase::Snapping) {
                inner.phase = RotationPhase::Idle;
            }
            inner.pending.take()
        };
        if let Some(handle) = pending {
            self.scheduler.cancel_frame(handle);
        }
    }

    /// Replace the reachable range and re-clamp the current rotation.
    pub fn set_bounds(&self, min: f32, max: f32) {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        let changed = {
            let mut inner = self.inner.borrow_mut();
            inner.min = lo;
            inner.max = hi;
            let clamped = inner.clamp(inner.rotation);
            let changed = clamped != inner.rotation;
            inner.rotation = clamped;
            if let Some(snap) = inner.snap.as_mut() {
                snap.to = snap.to.clamp(lo, hi);
            }
            changed.then_some(clamped)
        };
        if let Some(rotation) = changed {
            self.render(rotation);
        }
    }

    /// Tween to `target` over `duration_ms`, or jump when motion is reduced.
    pub fn animate_to(&self, target: f32, duration_ms: f64, reduced_motion: bool) {
        if reduced_motion || duration_ms <= 0.0 {
            self.jump_to(target);
            return;
        }
        self.stop_momentum();
        {
            let mut inner = self.inner.borrow_mut();
            let to = inner.clamp(target);
            inner.snap = Some(SnapTween {
                from: inner.rotation,
                to,
                duration_ms,
                start_ms: None,
            });
            inner.phase = RotationPhase::Snapping;
        }
        Self::schedule(&self.inner, &self.scheduler);
    }

    fn render(&self, rotation: f32) {
        let callback = self.inner.borrow().on_render.clone();
        if let Some(callback) = callback {
            callback(rotation);
        }
    }

    fn schedule(inner: &Rc<RefCell<ChoreoInner>>, scheduler: &Rc<dyn FrameScheduler>) {
        if let Some(old) = inner.borrow_mut().pending.take() {
            scheduler.cancel_frame(old);
        }
        let weak_inner: Weak<RefCell<ChoreoInner>> = Rc::downgrade(inner);
        let weak_sched: Weak<dyn FrameScheduler> = Rc::downgrade(scheduler);
        let handle = scheduler.request_frame(Box::new(move |now_ms| {
            if let (Some(inner), Some(sched)) = (weak_inner.upgrade(), weak_sched.upgrade()) {
                Self::on_frame(&inner, &sched, now_ms);
            }
        }));
        inner.borrow_mut().pending = Some(handle);
    }

    fn on_frame(inner_rc: &Rc<RefCell<ChoreoInner>>, scheduler: &Rc<dyn FrameScheduler>, now_ms: f64) {
        let (callback, rotation, again) = {
            let mut inner = inner_rc.borrow_mut();
            inner.pending = None;
            let again = match inner.phase {
                RotationPhase::Momentum => {
                    let next = inner.rotation + inner.velocity;
                    let clamped = inner.clamp(next);
                    inner.rotation = clamped;
                    inner.velocity *= inner.decay;
                    // pinned against a bound counts as settled
                    if clamped != next || inner.velocity.abs() < inner.min_velocity {
                        inner.velocity = 0.0;
                        inner.phase = RotationPhase::Idle;
                        log::trace!("momentum settled at {clamped}");
                        false
                    } else {
                        true
                    }
                }
                RotationPhase::Snapping => match inner.snap {
                    Some(mut tween) => {
                        let start = *tween.start_ms.get_or_insert(now_ms);
                        let t = ((now_ms - start) / tween.duration_ms).clamp(0.0, 1.0) as f32;
                        if t >= 1.0 {
                            inner.rotation = tween.to;
                            inner.snap = None;
                            inner.phase = RotationPhase::Idle;
                            false
                        } else {
                            inner.rotation = inner.clamp(tween.from + (tween.to - tween.from) * t);
                            inner.snap = Some(tween);
                            true
                        }
                    }
                    None => {
                        inner.phase = RotationPhase::Idle;
                        false
                    }
                },
                RotationPhase::Idle | RotationPhase::Dragging => return,
            };
            (inner.on_render.clone(), inner.rotation, again)
        };
        if again {
            Self::schedule(inner_rc, scheduler);
        }
        if let Some(callback) = callback {
            callback(rotation);
        }
    }
}

/// Snap the ring so the item nearest the magnifier lands exactly on it, and
/// make it the current selection. Returns the selected slot index.
pub fn snap_to_nearest(
    choreo: &RotationChoreographer,
    nav: &mut NavigationState,
    viewport: &Viewport,
    spacing: f32,
    cfg: &RingConfig,
) -> Option<usize> {
    let index = nearest_to_magnifier(nav.slots(), viewport, choreo.rotation(), spacing)?;
    snap_to_index(choreo, nav, index, spacing, cfg)
}

/// Snap a specific slot (e.g. a tapped node) onto the magnifier.
pub fn snap_to_index(
    choreo: &RotationChoreographer,
    nav: &mut NavigationState,
    index: usize,
    spacing: f32,
    cfg: &RingConfig,
) -> Option<usize> {
    let order = nav.slots().get(index)?.item()?.order;
    nav.select_index(index);
    choreo.animate_to(
        rotation_for_order(order, spacing),
        cfg.snap_duration_ms,
        cfg.reduced_motion,
    );
    Some(index)
}
