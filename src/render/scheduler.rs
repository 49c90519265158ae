//! Frame scheduling capability.
//!
//! Animation loops never talk to a platform frame clock directly; they get a
//! `FrameScheduler`. Hosts wire it to their vsync callback, headless code and
//! tests use `ManualFrameScheduler` and step frames by hand.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

/// Callback invoked with the frame timestamp in milliseconds.
pub type FrameCallback = Box<dyn FnOnce(f64) + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

pub trait FrameScheduler {
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle;

    /// Cancelling an unknown or already-fired handle is a no-op.
    fn cancel_frame(&self, handle: FrameHandle);
}

struct PendingFrame {
    handle: FrameHandle,
    callback: FrameCallback,
}

/// Deterministic scheduler driven by explicit `step` calls.
pub struct ManualFrameScheduler {
    pending: RefCell<VecDeque<PendingFrame>>,
    next_id: Cell<u64>,
    now_ms: Cell<f64>,
}

impl ManualFrameScheduler {
    pub fn new() -> Self {
        Self {
            pending: RefCell::new(VecDeque::new()),
            next_id: Cell::new(1),
            now_ms: Cell::new(0.0),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn now_ms(&self) -> f64 {
        self.now_ms.get()
    }

    /// Run every callback queued before this call at timestamp `now_ms`.
    /// Callbacks requested while stepping wait for the next step.
    pub fn step(&self, now_ms: f64) -> usize {
        self.now_ms.set(now_ms);
        let batch: Vec<PendingFrame> = self.pending.borrow_mut().drain(..).collect();
        let ran = batch.len();
        for frame in batch {
            (frame.callback)(now_ms);
        }
        ran
    }

    /// Step at `frame_ms` intervals until nothing is pending or `max_frames`
    /// have elapsed. Returns the number of frames stepped.
    pub fn run_until_idle(&self, frame_ms: f64, max_frames: usize) -> usize {
        let mut frames = 0;
        while self.pending_count() > 0 && frames < max_frames {
            let next = self.now_ms.get() + frame_ms;
            self.step(next);
            frames += 1;
        }
        frames
    }
}

impl Default for ManualFrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameScheduler for ManualFrameScheduler {
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle {
        let handle = FrameHandle(self.next_id.get());
        self.next_id.set(handle.0 + 1);
        self.pending
            .borrow_mut()
            .push_back(PendingFrame { handle, callback });
        handle
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        self.pending.borrow_mut().retain(|f| f.handle != handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_step_runs_queued_callbacks_once() {
        let sched = ManualFrameScheduler::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        sched.request_frame(Box::new(move |_| h.set(h.get() + 1)));
        assert_eq!(sched.step(16.0), 1);
        assert_eq!(sched.step(32.0), 0);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_cancel_removes_pending() {
        let sched = ManualFrameScheduler::new();
        let handle = sched.request_frame(Box::new(|_| panic!("cancelled frame ran")));
        sched.cancel_frame(handle);
        sched.cancel_frame(handle);
        assert_eq!(sched.pending_count(), 0);
        assert_eq!(sched.step(16.0), 0);
    }

    #[test]
    fn test_run_until_idle_stops_at_cap() {
        let sched = Rc::new(ManualFrameScheduler::new());
        fn again(s: Rc<ManualFrameScheduler>) {
            let next = s.clone();
            s.request_frame(Box::new(move |_| again(next)));
        }
        again(sched.clone());
        assert_eq!(sched.run_until_idle(16.0, 5), 5);
        assert_eq!(sched.pending_count(), 1);
        assert!((sched.now_ms() - 80.0).abs() < 1e-9);
    }
}
