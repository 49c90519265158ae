//! Sibling list + rotation → screen coordinates, culled to the visible window.
//!
//! Recomputed from scratch every frame; the visible set is at most ~21 nodes.

use serde::Serialize;

use super::arc::{
    angular_window, arc_parameters, base_angle_for_order, magnifier_angle, Viewport,
};
use crate::item::{Item, Slot};

/// A visible ring node, ready for a drawing layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodePosition {
    pub item: Item,
    /// Index of the slot in the sibling list (gaps included)
    pub index: usize,
    pub angle: f32,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub label: String,
}

/// Place every item slot at `base_angle(order) + rotation` and keep the ones
/// inside the angular window. When more than the window's node budget
/// (`max_nodes`, capped by what fits) survive, the ones nearest the magnifier
/// win.
pub fn calculate_node_positions(
    slots: &[Slot],
    viewport: &Viewport,
    rotation: f32,
    node_radius: f32,
    spacing: f32,
    max_nodes: usize,
) -> Vec<NodePosition> {
    let arc = arc_parameters(viewport);
    let window = angular_window(viewport, spacing, max_nodes);

    let mut nodes: Vec<NodePosition> = slots
        .iter()
        .enumerate()
        .filter_map(|(index, slot)| {
            let item = slot.item()?;
            let angle = base_angle_for_order(item.order, viewport, spacing) + rotation;
            if !window.contains(angle) {
                return None;
            }
            let (x, y) = arc.point_at(angle);
            Some(NodePosition {
                item: item.clone(),
                index,
                angle,
                x,
                y,
                radius: node_radius,
                label: item.label().to_string(),
            })
        })
        .collect();

    if nodes.len() > window.max_nodes {
        let mag = magnifier_angle(viewport);
        nodes.sort_by(|a, b| (a.angle - mag).abs().total_cmp(&(b.angle - mag).abs()));
        nodes.truncate(window.max_nodes);
        nodes.sort_by_key(|n| n.index);
    }
    nodes
}

/// Rotation that puts `order` exactly on the magnifier.
pub fn rotation_for_order(order: i64, spacing: f32) -> f32 {
    order as f32 * spacing
}

/// Rotation range that keeps the first and last items reachable at the
/// magnifier. An empty list pins rotation to zero.
pub fn rotation_bounds(slots: &[Slot], spacing: f32) -> (f32, f32) {
    let mut orders = slots.iter().filter_map(|s| s.item()).map(|i| i.order);
    let Some(first) = orders.next() else {
        return (0.0, 0.0);
    };
    let (lo, hi) = orders.fold((first, first), |(lo, hi), o| (lo.min(o), hi.max(o)));
    (
        rotation_for_order(lo, spacing),
        rotation_for_order(hi, spacing),
    )
}

/// Slot index of the item whose rotated angle is closest to the magnifier.
pub fn nearest_to_magnifier(
    slots: &[Slot],
    viewport: &Viewport,
    rotation: f32,
    spacing: f32,
) -> Option<usize> {
    let mag = magnifier_angle(viewport);
    slots
        .iter()
        .enumerate()
        .filter_map(|(index, slot)| {
            let item = slot.item()?;
            let angle = base_angle_for_order(item.order, viewport, spacing) + rotation;
            Some((index, (angle - mag).abs()))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(index, _)| index)
}

/// Topmost node whose circle contains `(x, y)`.
pub fn hit_test(positions: &[NodePosition], x: f32, y: f32) -> Option<&NodePosition> {
    positions
        .iter()
        .filter(|p| {
            let dx = p.x - x;
            let dy = p.y - y;
            dx * dx + dy * dy <= p.radius * p.radius
        })
        .min_by(|a, b| {
            let da = (a.x - x).powi(2) + (a.y - y).powi(2);
            let db = (b.x - x).powi(2) + (b.y - y).powi(2);
            da.total_cmp(&db)
        })
}
