//! Child pyramid: the overflow area for the current selection's children.
//!
//! Three steps, all pure:
//! 1. `calculate_pyramid_capacity`: how many nodes fit on each concentric arc
//! 2. `sample_siblings`: order-preserving stride downsample to that capacity
//! 3. `place_pyramid_nodes`: spread the sample over the arcs, center-outward
//!
//! The arcs share the ring's hub and span from the magnifier angle to π,
//! clipped per arc to the part where a node stays on screen.

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

use super::arc::{arc_parameters, magnifier_angle, ArcParameters, Viewport};
use crate::item::Item;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PyramidArcSpec {
    pub name: String,
    /// Arc radius as a fraction of the ring radius
    pub radius_ratio: f32,
    /// Relative share of the sample this arc receives, on top of its capacity
    #[serde(default = "default_weight")]
    pub weight: f32,
}

fn default_weight() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PyramidOptions {
    /// Outermost first
    pub arcs: Vec<PyramidArcSpec>,
    /// Node radius as a fraction of the viewport's short side
    pub node_radius_fraction: f32,
    /// Minimum empty space between neighbouring nodes, fraction of the short side
    pub gap_fraction: f32,
    /// Minimum angle between neighbours on any arc (radians)
    pub min_angular_spacing: f32,
}

impl Default for PyramidOptions {
    fn default() -> Self {
        let arc = |name: &str, radius_ratio: f32| PyramidArcSpec {
            name: name.to_string(),
            radius_ratio,
            weight: 1.0,
        };
        Self {
            arcs: vec![arc("outer", 0.88), arc("middle", 0.76), arc("inner", 0.64)],
            node_radius_fraction: 0.03,
            gap_fraction: 0.01,
            min_angular_spacing: 0.035,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArcCapacity {
    pub name: String,
    pub radius_ratio: f32,
    pub weight: f32,
    /// Absolute arc radius in pixels
    pub radius: f32,
    /// First on-screen angle; the arc runs from here to π
    pub start_angle: f32,
    pub angular_range: f32,
    pub capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PyramidCapacity {
    pub arcs: Vec<ArcCapacity>,
    pub total: usize,
    /// From the magnifier angle to π, before per-arc clipping
    pub angular_range: f32,
    pub magnifier_angle: f32,
    pub node_radius: f32,
    pub gap: f32,
}

/// A placed child node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PyramidNode {
    pub id: String,
    pub label: String,
    pub x: f32,
    pub y: f32,
    pub r: f32,
    /// Name of the arc (or "grid")
    pub arc: String,
    pub angle: f32,
}

/// Node count an arc of `radius` can hold physically.
pub fn physical_capacity(radius: f32, angular_range: f32, node_radius: f32, gap: f32) -> usize {
    let arc_length = radius * angular_range;
    let pitch = 2.0 * node_radius + gap;
    if arc_length <= 0.0 {
        return 0;
    }
    (arc_length / pitch).floor() as usize
}

/// Per-arc capacity: the tighter of physical length and minimum angular spacing.
///
/// Panics on an empty arc list or a non-positive node radius.
pub fn calculate_pyramid_capacity(viewport: &Viewport, options: &PyramidOptions) -> PyramidCapacity {
    assert!(
        !options.arcs.is_empty(),
        "contract violation: pyramid needs at least one arc"
    );
    assert!(
        options.node_radius_fraction > 0.0 && options.node_radius_fraction.is_finite(),
        "contract violation: node radius must be positive"
    );

    let ring = arc_parameters(viewport);
    let magnifier = magnifier_angle(viewport);
    let angular_range = (PI - magnifier).max(0.0);
    let node_radius = viewport.ssd() * options.node_radius_fraction;
    let gap = viewport.ssd() * options.gap_fraction.max(0.0);

    let arcs: Vec<ArcCapacity> = options
        .arcs
        .iter()
        .map(|arc_spec| {
            let radius = ring.radius * arc_spec.radius_ratio;
            let start_angle = visible_start(viewport, &ring, radius, node_radius, magnifier);
            let range = PI - start_angle;
            let physical = physical_capacity(radius, range, node_radius, gap);
            let angular = if options.min_angular_spacing > 0.0 {
                (range / options.min_angular_spacing).floor() as usize
            } else {
                usize::MAX
            };
            ArcCapacity {
                name: arc_spec.name.clone(),
                radius_ratio: arc_spec.radius_ratio,
                weight: arc_spec.weight,
                radius,
                start_angle,
                angular_range: range,
                capacity: physical.min(angular),
            }
        })
        .collect();
    let total = arcs.iter().map(|a| a.capacity).sum();

    PyramidCapacity {
        arcs,
        total,
        angular_range,
        magnifier_angle: magnifier,
        node_radius,
        gap,
    }
}

/// First angle in `[from, π]` where a node on an arc of `radius` clears the
/// right and bottom edges. Both coordinates shrink monotonically toward π
/// because the hub never sits left of the viewport centre.
fn visible_start(
    viewport: &Viewport,
    ring: &ArcParameters,
    radius: f32,
    node_radius: f32,
    from: f32,
) -> f32 {
    if radius <= 0.0 {
        return PI;
    }
    let right = ((viewport.width() - node_radius - ring.hub_x) / radius)
        .clamp(-1.0, 1.0)
        .acos();
    let bottom = PI
        - ((viewport.height() - node_radius - ring.hub_y) / radius)
            .clamp(-1.0, 1.0)
            .asin();
    from.max(right).max(bottom).min(PI)
}

/// Deterministic order-preserving downsample.
///
/// Keeps `capacity` entries at indices `floor(i·(N−1)/(capacity−1))`, so the
/// first and last entries always survive. Lists that already fit are
/// returned unchanged.
pub fn sample_siblings<T: Clone>(list: &[T], capacity: usize) -> Vec<T> {
    let n = list.len();
    if n <= capacity {
        return list.to_vec();
    }
    match capacity {
        0 => Vec::new(),
        1 => vec![list[0].clone()],
        k => (0..k)
            .map(|i| list[i * (n - 1) / (k - 1)].clone())
            .collect(),
    }
}

/// Slot permutation that starts at the middle and alternates right, left.
pub fn center_outward_order(n: usize) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    let start = (n - 1) / 2;
    let mut order = Vec::with_capacity(n);
    order.push(start);
    for k in 1..n {
        if start + k < n {
            order.push(start + k);
        }
        if k <= start {
            order.push(start - k);
        }
        if order.len() == n {
            break;
        }
    }
    order
}

/// Split `count` across arcs in proportion to capacity × weight. The last
/// arc takes the rounding remainder up to its own capacity; any overflow
/// goes to earlier arcs with room.
pub fn distribute_across_arcs(count: usize, arcs: &[ArcCapacity]) -> Vec<usize> {
    let total: usize = arcs.iter().map(|a| a.capacity).sum();
    let count = count.min(total);
    let mut counts = vec![0usize; arcs.len()];
    if count == 0 {
        return counts;
    }

    let shares: Vec<f64> = arcs
        .iter()
        .map(|a| a.capacity as f64 * a.weight.max(0.0) as f64)
        .collect();
    let share_total: f64 = shares.iter().sum();
    let last = arcs.len() - 1;

    let mut assigned = 0;
    for i in 0..last {
        let want = if share_total > 0.0 {
            (count as f64 * shares[i] / share_total).floor() as usize
        } else {
            0
        };
        counts[i] = want.min(arcs[i].capacity).min(count - assigned);
        assigned += counts[i];
    }
    counts[last] = (count - assigned).min(arcs[last].capacity);
    assigned += counts[last];

    let mut leftover = count - assigned;
    for (i, arc) in arcs.iter().enumerate() {
        if leftover == 0 {
            break;
        }
        let room = arc.capacity - counts[i];
        let take = room.min(leftover);
        counts[i] += take;
        leftover -= take;
    }
    counts
}

/// Lay the sampled children onto the pyramid arcs.
pub fn place_pyramid_nodes(
    sampled: &[Item],
    viewport: &Viewport,
    capacity: &PyramidCapacity,
) -> Vec<PyramidNode> {
    let ring = arc_parameters(viewport);
    let fitted;
    let items: &[Item] = if sampled.len() > capacity.total {
        fitted = sample_siblings(sampled, capacity.total);
        &fitted
    } else {
        sampled
    };

    let counts = distribute_across_arcs(items.len(), &capacity.arcs);
    let mut nodes = Vec::with_capacity(items.len());
    let mut cursor = 0;

    for (arc, &count) in capacity.arcs.iter().zip(&counts) {
        if count == 0 {
            continue;
        }
        let chunk = &items[cursor..cursor + count];
        cursor += count;

        let step = arc.angular_range / count as f32;
        for (item, slot) in chunk.iter().zip(center_outward_order(count)) {
            let angle = arc.start_angle + (slot as f32 + 0.5) * step;
            let (x, y) = ring.point_at_radius(angle, arc.radius);
            nodes.push(PyramidNode {
                id: item.id.clone(),
                label: item.label().to_string(),
                x,
                y,
                r: capacity.node_radius,
                arc: arc.name.clone(),
                angle,
            });
        }
    }
    nodes
}

/// Grid alternative: rows of `columns` cells filling the region between the
/// magnifier and the top-right corner.
pub fn place_pyramid_grid(
    sampled: &[Item],
    viewport: &Viewport,
    capacity: &PyramidCapacity,
    columns: usize,
) -> Vec<PyramidNode> {
    let columns = columns.max(1);
    let items = sample_siblings(sampled, capacity.total);
    if items.is_empty() {
        return Vec::new();
    }

    let ring = arc_parameters(viewport);
    let (mag_x, mag_y) = ring.point_at(capacity.magnifier_angle);
    let pad = capacity.node_radius;
    let mut left = mag_x + 2.0 * pad;
    let right = viewport.width() - pad;
    let top = pad;
    let mut bottom = mag_y;
    if right <= left {
        left = pad;
    }
    if bottom <= top {
        bottom = viewport.height() - pad;
    }

    let rows = items.len().div_ceil(columns);
    let cell_w = (right - left) / columns as f32;
    let cell_h = (bottom - top) / rows as f32;
    let r = capacity.node_radius.min(cell_w * 0.5).min(cell_h * 0.5);

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let row = i / columns;
            let col = i % columns;
            let x = left + (col as f32 + 0.5) * cell_w;
            let y = top + (row as f32 + 0.5) * cell_h;
            PyramidNode {
                id: item.id.clone(),
                label: item.label().to_string(),
                x,
                y,
                r,
                arc: "grid".to_string(),
                angle: ring.angle_of(x, y),
            }
        })
        .collect()
}
