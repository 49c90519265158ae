//! Focus-ring navigator engine.
//!
//! Computes (never draws) a rotating ring of sibling nodes around a fixed
//! magnifier, the child pyramid for the current selection, and the volume
//! pipeline that feeds them.

pub mod adapters;
pub mod config;
pub mod engine;
pub mod error;
pub mod input;
pub mod item;
pub mod nav;
pub mod render;
pub mod telemetry;

pub use config::RingConfig;
pub use engine::{NavigationBridge, SwitchOutcome};
pub use error::{BridgeError, ConfigError, ContractViolation, ManifestError};
pub use item::{Item, Link, Slot};
pub use nav::{NavEvent, NavigationState};
pub use render::arc::Viewport;
