//! Volume engine: adapters feed sessions, the bridge installs them into
//! navigation and publishes volume identity.

pub mod adapter;
pub mod bridge;
pub mod session;
pub mod store;

pub use adapter::{
    AdapterCapabilities, AdapterRegistry, DeepLinkTarget, NormalizedVolume, Validation,
    VolumeAdapter, VolumeMeta,
};
pub use bridge::{NavigationBridge, SwitchOutcome};
pub use session::VolumeSession;
pub use store::{VolumeSnapshot, VolumeStore};
