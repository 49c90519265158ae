//! Telemetry boundary.
//!
//! The engine reports structured events to an optional sink:
//! - **volume-load / volume-switch / deep-link**: pipeline lifecycle
//! - **perf:manifest**: per-phase load timings
//! - **perf:render**: frame composition time against a budget
//!
//! Purely observational. Nothing in the engine reads telemetry back.

use std::cell::RefCell;
use std::time::Instant;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestPhase {
    Load,
    Validate,
    Normalize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum TelemetryEvent {
    #[serde(rename = "volume-load:start")]
    VolumeLoadStart { volume: String },
    #[serde(rename = "volume-load:success")]
    VolumeLoadSuccess { volume: String, items: usize },
    #[serde(rename = "volume-load:error")]
    VolumeLoadError {
        volume: String,
        kind: String,
        message: String,
    },

    #[serde(rename = "volume-switch:start")]
    VolumeSwitchStart { volume: String },
    #[serde(rename = "volume-switch:queued")]
    VolumeSwitchQueued { volume: String },
    #[serde(rename = "volume-switch:cancelled")]
    VolumeSwitchCancelled { volume: String },
    #[serde(rename = "volume-switch:complete")]
    VolumeSwitchComplete { volume: String },
    #[serde(rename = "volume-switch:error")]
    VolumeSwitchError { volume: String, message: String },

    #[serde(rename = "deep-link:start")]
    DeepLinkStart {
        token: String,
        volume: Option<String>,
    },
    #[serde(rename = "deep-link:success")]
    DeepLinkSuccess {
        token: String,
        volume: String,
        focus_id: String,
    },
    #[serde(rename = "deep-link:error")]
    DeepLinkError { token: String, message: String },

    #[serde(rename = "perf:manifest")]
    PerfManifest {
        volume: String,
        phase: ManifestPhase,
        duration_ms: f64,
    },
    #[serde(rename = "perf:render")]
    PerfRender {
        duration_ms: f64,
        budget_ms: f64,
        over_budget: bool,
    },
}

impl TelemetryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::VolumeLoadStart { .. } => "volume-load:start",
            Self::VolumeLoadSuccess { .. } => "volume-load:success",
            Self::VolumeLoadError { .. } => "volume-load:error",
            Self::VolumeSwitchStart { .. } => "volume-switch:start",
            Self::VolumeSwitchQueued { .. } => "volume-switch:queued",
            Self::VolumeSwitchCancelled { .. } => "volume-switch:cancelled",
            Self::VolumeSwitchComplete { .. } => "volume-switch:complete",
            Self::VolumeSwitchError { .. } => "volume-switch:error",
            Self::DeepLinkStart { .. } => "deep-link:start",
            Self::DeepLinkSuccess { .. } => "deep-link:success",
            Self::DeepLinkError { .. } => "deep-link:error",
            Self::PerfManifest { .. } => "perf:manifest",
            Self::PerfRender { .. } => "perf:render",
        }
    }
}

pub trait TelemetrySink {
    fn emit(&self, event: &TelemetryEvent);
}

/// Forwards events to the `log` facade as JSON.
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn emit(&self, event: &TelemetryEvent) {
        let payload = serde_json::to_string(event).unwrap_or_else(|_| event.name().to_string());
        match event {
            TelemetryEvent::VolumeLoadError { .. }
            | TelemetryEvent::VolumeSwitchError { .. }
            | TelemetryEvent::DeepLinkError { .. } => log::warn!("{payload}"),
            TelemetryEvent::PerfRender { over_budget: true, .. } => log::debug!("{payload}"),
            TelemetryEvent::PerfManifest { .. } | TelemetryEvent::PerfRender { .. } => {
                log::trace!("{payload}")
            }
            _ => log::info!("{payload}"),
        }
    }
}

/// Counters derived from a recorded event stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub loads_succeeded: u64,
    pub loads_failed: u64,
    pub switches_completed: u64,
    pub switches_cancelled: u64,
    pub deep_links_failed: u64,
    pub frames: u64,
    pub frames_over_budget: u64,
    pub mean_frame_ms: f64,
}

/// Keeps every event in memory. Headless runs and tests read it back.
#[derive(Default)]
pub struct MemorySink {
    events: RefCell<Vec<TelemetryEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.borrow().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.borrow().iter().map(TelemetryEvent::name).collect()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let mut snap = TelemetrySnapshot::default();
        let mut frame_total = 0.0;
        for event in self.events.borrow().iter() {
            match event {
                TelemetryEvent::VolumeLoadSuccess { .. } => snap.loads_succeeded += 1,
                TelemetryEvent::VolumeLoadError { .. } => snap.loads_failed += 1,
                TelemetryEvent::VolumeSwitchComplete { .. } => snap.switches_completed += 1,
                TelemetryEvent::VolumeSwitchCancelled { .. } => snap.switches_cancelled += 1,
                TelemetryEvent::DeepLinkError { .. } => snap.deep_links_failed += 1,
                TelemetryEvent::PerfRender {
                    duration_ms,
                    over_budget,
                    ..
                } => {
                    snap.frames += 1;
                    frame_total += duration_ms;
                    if *over_budget {
                        snap.frames_over_budget += 1;
                    }
                }
                _ => {}
            }
        }
        if snap.frames > 0 {
            snap.mean_frame_ms = frame_total / snap.frames as f64;
        }
        snap
    }
}

impl TelemetrySink for MemorySink {
    fn emit(&self, event: &TelemetryEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

/// Milliseconds elapsed since `start`.
pub fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Run `f`, then report its duration as `perf:render`.
pub fn measure_render<T>(
    sink: Option<&dyn TelemetrySink>,
    budget_ms: f64,
    f: impl FnOnce() -> T,
) -> T {
    let start = Instant::now();
    let out = f();
    if let Some(sink) = sink {
        let duration_ms = elapsed_ms(start);
        sink.emit(&TelemetryEvent::PerfRender {
            duration_ms,
            budget_ms,
            over_budget: duration_ms > budget_ms,
        });
    }
    out
}
