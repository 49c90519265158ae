//! Decorative pyramid geometry: fan lines from the magnifier and a golden
//! log spiral. None of it affects hit targets.

use std::f32::consts::{FRAC_PI_2, PI};

use serde::Serialize;

use super::arc::{arc_parameters, Viewport};
use super::pyramid::PyramidCapacity;

const GOLDEN_RATIO: f32 = 1.618_034;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn centered(cx: f32, cy: f32, half: f32) -> Self {
        Self {
            x: cx - half,
            y: cy - half,
            w: 2.0 * half,
            h: 2.0 * half,
        }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.w && y >= self.y && y <= self.y + self.h
    }
}

/// Ring circle ∩ viewport rectangle, minus an excluded box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsableRegion {
    pub center: (f32, f32),
    pub radius: f32,
    pub bounds: Rect,
    pub excluded: Option<Rect>,
}

impl UsableRegion {
    pub fn contains(&self, x: f32, y: f32) -> bool {
        let (cx, cy) = self.center;
        let inside_circle = (x - cx).hypot(y - cy) <= self.radius;
        let excluded = self.excluded.is_some_and(|r| r.contains(x, y));
        inside_circle && self.bounds.contains(x, y) && !excluded
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FanLine {
    pub angle: f32,
    pub start: (f32, f32),
    pub end: (f32, f32),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpiralPath {
    pub center: (f32, f32),
    pub a: f32,
    pub b: f32,
    pub points: Vec<(f32, f32)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpiralIntersection {
    pub fan_index: usize,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpiralDecoration {
    pub fan_lines: Vec<FanLine>,
    pub spiral: SpiralPath,
    pub intersections: Vec<SpiralIntersection>,
}

/// Cast a ray from `origin` at `angle` and keep its first contiguous run
/// inside `region`, sampled every `step` pixels up to `max_len`.
pub fn clip_ray(
    origin: (f32, f32),
    angle: f32,
    region: &UsableRegion,
    max_len: f32,
    step: f32,
) -> Option<FanLine> {
    let (dx, dy) = (angle.cos(), angle.sin());
    let step = step.max(0.25);
    let at = |t: f32| (origin.0 + dx * t, origin.1 + dy * t);

    let mut start = None;
    let mut end = None;
    let mut t = 0.0;
    while t <= max_len {
        let (x, y) = at(t);
        if region.contains(x, y) {
            if start.is_none() {
                start = Some((x, y));
            }
            end = Some((x, y));
        } else if start.is_some() {
            break;
        }
        t += step;
    }

    match (start, end) {
        (Some(start), Some(end)) if start != end => Some(FanLine { angle, start, end }),
        _ => None,
    }
}

/// `count` rays spread evenly from straight up to straight right.
pub fn fan_lines(
    origin: (f32, f32),
    count: usize,
    region: &UsableRegion,
    max_len: f32,
) -> Vec<FanLine> {
    if count == 0 {
        return Vec::new();
    }
    let step = if count > 1 {
        FRAC_PI_2 / (count - 1) as f32
    } else {
        0.0
    };
    (0..count)
        .filter_map(|i| {
            let angle = -FRAC_PI_2 + i as f32 * step;
            clip_ray(origin, angle, region, max_len, 1.0)
        })
        .collect()
}

/// Polyline of r = a·e^(bθ) from θ = 0 until r exceeds `max_radius`.
pub fn log_spiral(center: (f32, f32), a: f32, b: f32, max_radius: f32) -> SpiralPath {
    let mut points = Vec::new();
    if a > 0.0 && b > 0.0 {
        let dtheta = PI / 32.0;
        let mut theta: f32 = 0.0;
        loop {
            let r = a * (b * theta).exp();
            points.push((center.0 + r * theta.cos(), center.1 + r * theta.sin()));
            if r > max_radius {
                break;
            }
            theta += dtheta;
        }
    }
    SpiralPath {
        center,
        a,
        b,
        points,
    }
}

/// Intersection parameter along `p1→p2` with segment `q1→q2`, if any.
pub fn segment_intersection(
    p1: (f32, f32),
    p2: (f32, f32),
    q1: (f32, f32),
    q2: (f32, f32),
) -> Option<(f32, (f32, f32))> {
    let r = (p2.0 - p1.0, p2.1 - p1.1);
    let s = (q2.0 - q1.0, q2.1 - q1.1);
    let denom = r.0 * s.1 - r.1 * s.0;
    if denom.abs() < f32::EPSILON {
        return None;
    }
    let qp = (q1.0 - p1.0, q1.1 - p1.1);
    let t = (qp.0 * s.1 - qp.1 * s.0) / denom;
    let u = (qp.0 * r.1 - qp.1 * r.0) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some((t, (p1.0 + t * r.0, p1.1 + t * r.1)))
    } else {
        None
    }
}

/// Closest-to-start crossing of `line` with the spiral polyline.
pub fn first_intersection(line: &FanLine, spiral: &SpiralPath) -> Option<(f32, f32)> {
    spiral
        .points
        .windows(2)
        .filter_map(|w| segment_intersection(line.start, line.end, w[0], w[1]))
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, point)| point)
}

/// Full decoration for the pyramid area. The spiral is centred midway
/// between the magnifier point and the top-right corner.
pub fn spiral_decoration(
    viewport: &Viewport,
    capacity: &PyramidCapacity,
    fan_count: usize,
) -> SpiralDecoration {
    let ring = arc_parameters(viewport);
    let origin = ring.point_at(capacity.magnifier_angle);
    let region = UsableRegion {
        center: (ring.hub_x, ring.hub_y),
        radius: ring.radius,
        bounds: Rect {
            x: 0.0,
            y: 0.0,
            w: viewport.width(),
            h: viewport.height(),
        },
        excluded: Some(Rect::centered(origin.0, origin.1, capacity.node_radius * 1.5)),
    };
    let diagonal = viewport.width().hypot(viewport.height());
    let lines = fan_lines(origin, fan_count, &region, diagonal);

    let center = (
        (origin.0 + viewport.width()) * 0.5,
        origin.1 * 0.5,
    );
    let max_radius = (origin.0 - center.0).hypot(origin.1 - center.1);
    let b = GOLDEN_RATIO.ln() / FRAC_PI_2;
    let spiral = log_spiral(center, capacity.node_radius, b, max_radius);

    let intersections = lines
        .iter()
        .enumerate()
        .filter_map(|(fan_index, line)| {
            first_intersection(line, &spiral).map(|(x, y)| SpiralIntersection { fan_index, x, y })
        })
        .collect();

    SpiralDecoration {
        fan_lines: lines,
        spiral,
        intersections,
    }
}
