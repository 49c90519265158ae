//! Ring geometry and motion.
//!
//! Pure layout (`arc`, `placement`, `pyramid`, `spiral`), the frame-driven
//! `animator`, and `frame`, which composes one drawable frame.

pub mod animator;
pub mod arc;
pub mod frame;
pub mod placement;
pub mod pyramid;
pub mod scheduler;
pub mod spiral;

pub use animator::{RotationChoreographer, RotationPhase};
pub use arc::{AngularWindow, ArcParameters, Viewport};
pub use frame::{PyramidLayout, RingFrame, RingRenderer};
pub use placement::NodePosition;
pub use pyramid::{PyramidCapacity, PyramidNode, PyramidOptions};
pub use scheduler::{FrameScheduler, ManualFrameScheduler};
