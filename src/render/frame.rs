//! Per-frame composition: everything a drawing layer needs for one frame.
//!
//! `RingRenderer` caches the viewport-derived geometry and rebuilds it on
//! `resize`. `compose` itself is pure apart from the `perf:render` report.

use std::rc::Rc;

use serde::Serialize;

use super::arc::{
    angular_window, arc_parameters, magnifier_angle, node_spacing, AngularWindow, ArcParameters,
    Viewport,
};
use super::placement::{calculate_node_positions, NodePosition};
use super::pyramid::{
    calculate_pyramid_capacity, place_pyramid_grid, place_pyramid_nodes, sample_siblings,
    PyramidCapacity, PyramidNode,
};
use super::spiral::{spiral_decoration, SpiralDecoration};
use crate::config::RingConfig;
use crate::item::{Item, Slot};
use crate::telemetry::{measure_render, TelemetrySink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PyramidLayout {
    Arcs,
    Grid { columns: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RingFrame {
    pub viewport: Viewport,
    pub arc: ArcParameters,
    pub window: AngularWindow,
    pub magnifier_angle: f32,
    pub rotation: f32,
    pub selected: Option<String>,
    pub nodes: Vec<NodePosition>,
    pub pyramid: Vec<PyramidNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoration: Option<SpiralDecoration>,
}

pub struct RingRenderer {
    config: RingConfig,
    viewport: Viewport,
    arc: ArcParameters,
    window: AngularWindow,
    spacing: f32,
    node_radius: f32,
    capacity: PyramidCapacity,
    layout: PyramidLayout,
    fan_lines: usize,
    telemetry: Option<Rc<dyn TelemetrySink>>,
}

impl RingRenderer {
    pub fn new(viewport: Viewport, config: RingConfig) -> Self {
        let spacing = node_spacing(&viewport, config.node_spacing_fraction);
        Self {
            arc: arc_parameters(&viewport),
            window: angular_window(&viewport, spacing, config.max_visible_nodes),
            node_radius: viewport.ssd() * config.node_radius_fraction,
            capacity: calculate_pyramid_capacity(&viewport, &config.pyramid),
            spacing,
            viewport,
            config,
            layout: PyramidLayout::Arcs,
            fan_lines: 0,
            telemetry: None,
        }
    }

    pub fn with_telemetry(mut self, sink: Rc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(sink);
        self
    }

    pub fn with_pyramid_layout(mut self, layout: PyramidLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Emit decorative fan lines and spiral geometry with each frame.
    /// Zero disables the decoration.
    pub fn with_decoration(mut self, fan_lines: usize) -> Self {
        self.fan_lines = fan_lines;
        self
    }

    /// Host surface changed size.
    pub fn resize(&mut self, viewport: Viewport) {
        if viewport == self.viewport {
            return;
        }
        log::debug!(
            "Ring resized to {}x{}",
            viewport.width(),
            viewport.height()
        );
        *self = Self {
            telemetry: self.telemetry.take(),
            layout: self.layout,
            fan_lines: self.fan_lines,
            ..Self::new(viewport, self.config.clone())
        };
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn config(&self) -> &RingConfig {
        &self.config
    }

    pub fn spacing(&self) -> f32 {
        self.spacing
    }

    pub fn node_radius(&self) -> f32 {
        self.node_radius
    }

    pub fn capacity(&self) -> &PyramidCapacity {
        &self.capacity
    }

    /// Build one frame from the current siblings, rotation and the
    /// selection's children.
    pub fn compose(
        &self,
        slots: &[Slot],
        selected: Option<&Item>,
        rotation: f32,
        children: &[Item],
    ) -> RingFrame {
        let sink = self.telemetry.as_deref();
        measure_render(sink, self.config.render_budget_ms, || {
            let nodes = calculate_node_positions(
                slots,
                &self.viewport,
                rotation,
                self.node_radius,
                self.spacing,
                self.window.max_nodes,
            );
            let sampled = sample_siblings(children, self.capacity.total);
            let pyramid = match self.layout {
                PyramidLayout::Arcs => place_pyramid_nodes(&sampled, &self.viewport, &self.capacity),
                PyramidLayout::Grid { columns } => {
                    place_pyramid_grid(&sampled, &self.viewport, &self.capacity, columns)
                }
            };
            let decoration = (self.fan_lines > 0 && !pyramid.is_empty())
                .then(|| spiral_decoration(&self.viewport, &self.capacity, self.fan_lines));

            RingFrame {
                viewport: self.viewport,
                arc: self.arc,
                window: self.window,
                magnifier_angle: magnifier_angle(&self.viewport),
                rotation,
                selected: selected.map(|i| i.id.clone()),
                nodes,
                pyramid,
                decoration,
            }
        })
    }
}
