//! Ring Gesture Recognition
//!
//! Turns raw pointer events into ring gestures:
//! - Drag: pointer moves along the arc → angular rotation delta
//! - Fling: release while moving fast → momentum with an initial velocity
//! - Release: slow release after a drag → snap to nearest
//! - Tap: short touch, no significant movement → hit test + snap to node
//!
//! Timestamps come from the caller (milliseconds) so the recognizer stays
//! deterministic under test.

use crate::config::RingConfig;
use crate::nav::NavigationState;
use crate::render::animator::{snap_to_index, snap_to_nearest, RotationChoreographer};
use crate::render::arc::{arc_parameters, ArcParameters, Viewport};
use crate::render::placement::{hit_test, NodePosition};

/// Nominal frame length used to express velocity in radians per frame.
const FRAME_MS: f64 = 1000.0 / 60.0;
/// Only samples this recent contribute to release velocity.
const VELOCITY_WINDOW_MS: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct PointerSample {
    angle: f32,
    time_ms: f64,
}

/// Recognized ring gesture
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RingGesture {
    /// Drag began; running animations must stop
    DragStart,
    /// Angular delta to apply to rotation
    Drag { delta: f32 },
    /// Released with velocity in radians per frame
    Fling { velocity: f32 },
    /// Released without enough speed to fling
    Release,
    /// Short touch at a screen position
    Tap { x: f32, y: f32 },
    None,
}

/// Single-pointer gesture state machine for one ring.
pub struct RingGestureRecognizer {
    arc: ArcParameters,
    pointer: Option<u64>,
    start: Option<(f32, f32, f64)>,
    last: Option<PointerSample>,
    samples: Vec<PointerSample>,
    drag_distance: f32,
    is_dragging: bool,
    /// Movement below this many pixels still counts as a tap
    tap_slop: f32,
    /// Release speed (radians/frame) needed for a fling
    fling_threshold: f32,
}

impl RingGestureRecognizer {
    pub fn new(viewport: &Viewport) -> Self {
        Self {
            arc: arc_parameters(viewport),
            pointer: None,
            start: None,
            last: None,
            samples: Vec::with_capacity(8),
            drag_distance: 0.0,
            is_dragging: false,
            tap_slop: 10.0,
            fling_threshold: 0.004,
        }
    }

    pub fn set_viewport(&mut self, viewport: &Viewport) {
        self.arc = arc_parameters(viewport);
    }

    pub fn is_dragging(&self) -> bool {
        self.is_dragging
    }

    /// Process pointer down. A second pointer is ignored while one is active.
    pub fn touch_start(&mut self, x: f32, y: f32, id: u64, time_ms: f64) {
        if self.pointer.is_some() {
            return;
        }
        self.pointer = Some(id);
        self.start = Some((x, y, time_ms));
        self.last = Some(PointerSample {
            angle: self.arc.angle_of(x, y),
            time_ms,
        });
        self.samples.clear();
        self.drag_distance = 0.0;
        self.is_dragging = false;
    }

    /// Process pointer move. The first move past the tap slop yields
    /// `DragStart`; later moves yield `Drag`.
    pub fn touch_move(&mut self, x: f32, y: f32, id: u64, time_ms: f64) -> RingGesture {
        if self.pointer != Some(id) {
            return RingGesture::None;
        }
        let (Some((sx, sy, _)), Some(last)) = (self.start, self.last) else {
            return RingGesture::None;
        };
        self.drag_distance = self.drag_distance.max((x - sx).hypot(y - sy));
        if !self.is_dragging && self.drag_distance <= self.tap_slop {
            return RingGesture::None;
        }

        let angle = self.arc.angle_of(x, y);
        let delta = wrap_angle(angle - last.angle);
        let sample = PointerSample { angle, time_ms };
        self.last = Some(sample);
        self.samples.push(sample);
        self.samples
            .retain(|s| time_ms - s.time_ms <= VELOCITY_WINDOW_MS);

        if !self.is_dragging {
            self.is_dragging = true;
            // the slop distance is swallowed; rotation starts from here
            return RingGesture::DragStart;
        }
        RingGesture::Drag { delta }
    }

    /// Process pointer up.
    pub fn touch_end(&mut self, x: f32, y: f32, id: u64, time_ms: f64) -> RingGesture {
        if self.pointer != Some(id) {
            return RingGesture::None;
        }
        self.pointer = None;
        self.last = None;
        let was_dragging = std::mem::replace(&mut self.is_dragging, false);
        if self.start.take().is_none() {
            return RingGesture::None;
        }

        if !was_dragging {
            return RingGesture::Tap { x, y };
        }

        let velocity = self.release_velocity(time_ms);
        self.samples.clear();
        if velocity.abs() >= self.fling_threshold {
            RingGesture::Fling { velocity }
        } else {
            RingGesture::Release
        }
    }

    /// Pointer lost (e.g. the host cancelled the touch).
    pub fn touch_cancel(&mut self) -> RingGesture {
        let was_dragging = self.is_dragging;
        self.pointer = None;
        self.start = None;
        self.last = None;
        self.samples.clear();
        self.is_dragging = false;
        if was_dragging {
            RingGesture::Release
        } else {
            RingGesture::None
        }
    }

    fn release_velocity(&self, now_ms: f64) -> f32 {
        let recent: Vec<&PointerSample> = self
            .samples
            .iter()
            .filter(|s| now_ms - s.time_ms <= VELOCITY_WINDOW_MS)
            .collect();
        let (Some(first), Some(last)) = (recent.first(), recent.last()) else {
            return 0.0;
        };
        let dt = last.time_ms - first.time_ms;
        if dt <= 0.0 {
            return 0.0;
        }
        let swept: f32 = recent
            .windows(2)
            .map(|w| wrap_angle(w[1].angle - w[0].angle))
            .sum();
        (swept as f64 / dt * FRAME_MS) as f32
    }
}

/// Fold an angle difference into `(-π, π]`.
fn wrap_angle(delta: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    let wrapped = (delta + PI).rem_euclid(TAU) - PI;
    if wrapped == -PI {
        PI
    } else {
        wrapped
    }
}

/// Ring state a gesture acts upon.
pub struct GestureTarget<'a> {
    pub choreographer: &'a RotationChoreographer,
    pub nav: &'a mut NavigationState,
    pub positions: &'a [NodePosition],
    pub viewport: &'a Viewport,
    pub spacing: f32,
    pub config: &'a RingConfig,
}

/// Apply a gesture to the ring. Returns the newly selected slot index when
/// the gesture caused a snap.
pub fn apply_gesture(gesture: RingGesture, target: GestureTarget<'_>) -> Option<usize> {
    let GestureTarget {
        choreographer,
        nav,
        positions,
        viewport,
        spacing,
        config,
    } = target;
    match gesture {
        RingGesture::DragStart => {
            choreographer.begin_drag();
            None
        }
        RingGesture::Drag { delta } => {
            choreographer.rotate(delta);
            None
        }
        RingGesture::Fling { velocity } => {
            choreographer.end_drag();
            choreographer.start_momentum(velocity);
            None
        }
        RingGesture::Release => {
            choreographer.end_drag();
            snap_to_nearest(choreographer, nav, viewport, spacing, config)
        }
        RingGesture::Tap { x, y } => {
            let hit = hit_test(positions, x, y)?;
            log::debug!("Tapped node {}", hit.item.id);
            snap_to_index(choreographer, nav, hit.index, spacing, config)
        }
        RingGesture::None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{build_sibling_slots, Item};
    use crate::render::arc::{node_spacing, MAX_WINDOW_NODES};
    use crate::render::placement::{calculate_node_positions, rotation_bounds};
    use crate::render::scheduler::ManualFrameScheduler;
    use std::rc::Rc;

    fn viewport() -> Viewport {
        Viewport::new(400.0, 800.0)
    }

    #[test]
    fn test_tap_gesture() {
        let mut gr = RingGestureRecognizer::new(&viewport());
        gr.touch_start(200.0, 400.0, 1, 0.0);
        assert_eq!(gr.touch_move(203.0, 401.0, 1, 10.0), RingGesture::None);
        match gr.touch_end(203.0, 401.0, 1, 40.0) {
            RingGesture::Tap { x, y } => {
                assert!((x - 203.0).abs() < 1e-6);
                assert!((y - 401.0).abs() < 1e-6);
            }
            other => panic!("Expected Tap gesture, got {:?}", other),
        }
    }

    #[test]
    fn test_drag_delta_follows_arc_angle() {
        let vp = viewport();
        let arc = arc_parameters(&vp);
        let mut gr = RingGestureRecognizer::new(&vp);
        let (x0, y0) = arc.point_at(2.9);
        let (x1, y1) = arc.point_at(2.8);
        let (x2, y2) = arc.point_at(2.75);
        gr.touch_start(x0, y0, 1, 0.0);
        assert_eq!(gr.touch_move(x1, y1, 1, 16.0), RingGesture::DragStart);
        match gr.touch_move(x2, y2, 1, 32.0) {
            RingGesture::Drag { delta } => assert!((delta + 0.05).abs() < 1e-4),
            other => panic!("Expected Drag gesture, got {:?}", other),
        }
    }

    #[test]
    fn test_fast_release_flings() {
        let vp = viewport();
        let arc = arc_parameters(&vp);
        let mut gr = RingGestureRecognizer::new(&vp);
        let (x, y) = arc.point_at(2.9);
        gr.touch_start(x, y, 1, 0.0);
        for step in 1..=5 {
            let (x, y) = arc.point_at(2.9 - 0.05 * step as f32);
            gr.touch_move(x, y, 1, step as f64 * 16.0);
        }
        let (x, y) = arc.point_at(2.65);
        match gr.touch_end(x, y, 1, 80.0) {
            RingGesture::Fling { velocity } => assert!(velocity < -0.01),
            other => panic!("Expected Fling gesture, got {:?}", other),
        }
    }

    #[test]
    fn test_slow_release_snaps() {
        let vp = viewport();
        let arc = arc_parameters(&vp);
        let mut gr = RingGestureRecognizer::new(&vp);
        let (x, y) = arc.point_at(2.9);
        gr.touch_start(x, y, 1, 0.0);
        let (x, y) = arc.point_at(2.85);
        gr.touch_move(x, y, 1, 16.0);
        let (x, y) = arc.point_at(2.8499);
        gr.touch_move(x, y, 1, 500.0);
        assert_eq!(gr.touch_end(x, y, 1, 1_000.0), RingGesture::Release);
    }

    #[test]
    fn test_second_pointer_ignored() {
        let mut gr = RingGestureRecognizer::new(&viewport());
        gr.touch_start(100.0, 100.0, 1, 0.0);
        gr.touch_start(300.0, 300.0, 2, 5.0);
        assert_eq!(gr.touch_end(300.0, 300.0, 2, 10.0), RingGesture::None);
        assert!(matches!(
            gr.touch_end(100.0, 100.0, 1, 20.0),
            RingGesture::Tap { .. }
        ));
    }

    #[test]
    fn test_wrap_angle_range() {
        use std::f32::consts::PI;
        assert!((wrap_angle(2.0 * PI - 0.1) + 0.1).abs() < 1e-5);
        assert!((wrap_angle(-2.0 * PI + 0.1) - 0.1).abs() < 1e-5);
        assert!((wrap_angle(0.3) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_tap_on_node_snaps_selection() {
        let vp = viewport();
        let cfg = RingConfig {
            reduced_motion: true,
            ..RingConfig::default()
        };
        let spacing = node_spacing(&vp, cfg.node_spacing_fraction);
        let slots = build_sibling_slots((0..8).map(|i| Item::new(format!("n{i}"), i)).collect());
        let mut nav = NavigationState::new();
        nav.set_items(slots.clone(), 0);

        let sched = Rc::new(ManualFrameScheduler::new());
        let choreo = RotationChoreographer::new(sched);
        let (lo, hi) = rotation_bounds(&slots, spacing);
        choreo.set_bounds(lo, hi);

        let positions =
            calculate_node_positions(&slots, &vp, 0.0, 14.0, spacing, MAX_WINDOW_NODES);
        let node = positions.iter().find(|p| p.item.id == "n2").unwrap().clone();
        let selected = apply_gesture(
            RingGesture::Tap { x: node.x, y: node.y },
            GestureTarget {
                choreographer: &choreo,
                nav: &mut nav,
                positions: &positions,
                viewport: &vp,
                spacing,
                config: &cfg,
            },
        );
        assert_eq!(selected, Some(2));
        assert_eq!(nav.current_item().map(|i| i.id.as_str()), Some("n2"));
        assert!((choreo.rotation() - 2.0 * spacing).abs() < 1e-6);
    }
}
