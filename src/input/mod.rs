//! Pointer input for the ring.
//!
//! Hosts feed raw pointer events into `RingGestureRecognizer` and hand the
//! resulting gestures to `apply_gesture`.

pub mod touch;

pub use touch::{apply_gesture, GestureTarget, RingGesture, RingGestureRecognizer};
