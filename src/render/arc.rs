//! Viewport → arc model.
//!
//! The ring is an arc of a circle whose hub sits off-screen on the top edge,
//! to the right of the viewport. The hub and radius come from a closed form
//! chosen so the arc sweeps from the top-left corner toward the lower-right
//! corner for any aspect ratio.
//!
//! Angles are screen angles around the hub: `atan2(y - hub_y, x - hub_x)`
//! with y pointing down, so the visible window always lies in `[π/2, π]`.

use std::f32::consts::PI;

use serde::Serialize;

use crate::error::ContractViolation;

/// Default visible-node cap for the angular window.
pub const MAX_WINDOW_NODES: usize = 21;

/// Default arc distance between siblings, as a fraction of the short side.
pub const DEFAULT_NODE_SPACING_FRACTION: f32 = 0.11;

/// Tolerance used when testing an angle against the window bounds.
const WINDOW_EPSILON: f32 = 1e-5;

/// Host surface dimensions. Always finite and positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    width: f32,
    height: f32,
}

impl Viewport {
    pub fn try_new(width: f32, height: f32) -> Result<Self, ContractViolation> {
        if !width.is_finite() || !height.is_finite() {
            return Err(ContractViolation(format!(
                "viewport dimensions must be finite, got {width}x{height}"
            )));
        }
        if width <= 0.0 || height <= 0.0 {
            return Err(ContractViolation(format!(
                "viewport dimensions must be positive, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }

    /// Panics on non-finite or non-positive dimensions: that is a caller bug.
    pub fn new(width: f32, height: f32) -> Self {
        match Self::try_new(width, height) {
            Ok(v) => v,
            Err(e) => panic!("{e}"),
        }
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    /// Longer side.
    pub fn lsd(&self) -> f32 {
        self.width.max(self.height)
    }

    /// Shorter side.
    pub fn ssd(&self) -> f32 {
        self.width.min(self.height)
    }

    pub fn is_portrait(&self) -> bool {
        self.height >= self.width
    }
}

/// Hub and radius of the ring's circle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArcParameters {
    pub hub_x: f32,
    pub hub_y: f32,
    pub radius: f32,
}

impl ArcParameters {
    /// Point on the ring at `angle`.
    pub fn point_at(&self, angle: f32) -> (f32, f32) {
        self.point_at_radius(angle, self.radius)
    }

    /// Point at `angle` on a concentric circle of the given radius.
    pub fn point_at_radius(&self, angle: f32, radius: f32) -> (f32, f32) {
        (
            self.hub_x + radius * angle.cos(),
            self.hub_y + radius * angle.sin(),
        )
    }

    /// Screen angle of `(x, y)` as seen from the hub.
    pub fn angle_of(&self, x: f32, y: f32) -> f32 {
        (y - self.hub_y).atan2(x - self.hub_x)
    }
}

/// Visible fraction of the circle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AngularWindow {
    pub start_angle: f32,
    pub end_angle: f32,
    /// Pixel length of the visible arc
    pub arc_length: f32,
    pub max_nodes: usize,
}

impl AngularWindow {
    pub fn contains(&self, angle: f32) -> bool {
        angle >= self.start_angle - WINDOW_EPSILON && angle <= self.end_angle + WINDOW_EPSILON
    }

    pub fn span(&self) -> f32 {
        self.end_angle - self.start_angle
    }
}

/// Closed-form hub/radius for the viewport.
pub fn arc_parameters(viewport: &Viewport) -> ArcParameters {
    let lsd = viewport.lsd();
    let ssd = viewport.ssd();
    let two_lsd = 2.0 * lsd;
    ArcParameters {
        hub_x: two_lsd * two_lsd / (8.0 * ssd) + ssd * 0.5,
        hub_y: 0.0,
        radius: ssd * 0.5 + lsd * lsd / (2.0 * ssd),
    }
}

/// Angular delta between adjacent siblings.
///
/// Sibling arc distance is `spacing_fraction` of the short side, so node
/// density on screen is the same for every viewport size.
pub fn node_spacing(viewport: &Viewport, spacing_fraction: f32) -> f32 {
    let arc = arc_parameters(viewport);
    viewport.ssd() * spacing_fraction / arc.radius
}

/// Fixed anchor direction where the current selection renders: the hub's
/// view of the viewport centre. Independent of rotation.
pub fn magnifier_angle(viewport: &Viewport) -> f32 {
    let arc = arc_parameters(viewport);
    arc.angle_of(viewport.width() * 0.5, viewport.height() * 0.5)
}

/// Angle of `order` at zero rotation. Higher order → smaller angle, order 0
/// sits on the magnifier.
pub fn base_angle_for_order(order: i64, viewport: &Viewport, spacing: f32) -> f32 {
    magnifier_angle(viewport) - order as f32 * spacing
}

/// The visible window: from the lower-right corner direction to π.
pub fn angular_window(viewport: &Viewport, spacing: f32, node_cap: usize) -> AngularWindow {
    let arc = arc_parameters(viewport);
    let start_angle = arc.angle_of(viewport.width(), viewport.height());
    let end_angle = PI;
    let span = end_angle - start_angle;
    let fit = if spacing > 0.0 {
        (span / spacing).floor() as usize + 1
    } else {
        node_cap
    };
    AngularWindow {
        start_angle,
        end_angle,
        arc_length: span * arc.radius,
        max_nodes: fit.min(node_cap),
    }
}
