//! Frame-pacing primitives.
//!
//! Two small pieces cooperate to let the CPU prepare frame N+1 while the GPU
//! still works on frame N:
//!
//! - [`FrameResourceRing`] rotates K slots of per-frame uniform state, so a
//!   slot being written is never a slot an unfinished frame is reading.
//! - [`InFlightGate`] bounds how many frames may be submitted but not yet
//!   completed, which is the sole backpressure mechanism on the producer.
//!
//! With gate capacity equal to the ring slot count, at most K frames overlap
//! and each holds a distinct slot, so no locking is needed around the ring.

mod gate;
mod ring;

pub use gate::InFlightGate;
pub use ring::{DEFAULT_UNIFORM_ALIGNMENT, FrameResourceRing, SlotHandle};
