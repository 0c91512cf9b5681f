//! Per-frame orchestration.
//!
//! [`FrameOrchestrator`] drives one frame through its state machine:
//!
//! ```text
//! Idle → GateAcquired → StateUpdated → Recording → Submitted → (async) Completed
//! ```
//!
//! The producer thread runs everything up to `Submitted`; `Completed` is the
//! suspension point — the GPU's completion signal releases the gate unit from
//! its own notification context, and no orchestrator code runs there beyond
//! that bookkeeping.
//!
//! The GPU-facing half of the loop sits behind [`FrameConsumer`]; the
//! production implementation is [`WgpuFrameConsumer`](crate::gpu::WgpuFrameConsumer),
//! tests substitute an in-memory consumer.

use std::time::Duration;

use log::{debug, error};

use crate::errors::Result;
use crate::pacing::{FrameResourceRing, InFlightGate, SlotHandle};
use crate::scene::SceneSource;
use crate::uniforms::FrameUniforms;

/// Callback run from the GPU completion context when a frame's work
/// finishes. Must only release the gate plus bookkeeping; it must not
/// re-enter frame recording.
pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

/// How the accumulate stage blends each frame's radiance estimate into the
/// persistent target.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum AccumulationPolicy {
    /// Plain running average: frame n contributes with weight 1/(n+1).
    /// Converges to the true mean; the default.
    #[default]
    RunningAverage,
    /// Exponential decay: every frame keeps `retain` of the history.
    /// Responds faster to change at the cost of persistent variance.
    ExponentialDecay {
        /// Fraction of the accumulated history kept per frame, in `[0, 1)`.
        retain: f32,
    },
}

impl AccumulationPolicy {
    /// Blend factor the accumulate stage applies on frame `frame_index`.
    #[must_use]
    pub fn blend_for(self, frame_index: u64) -> f32 {
        match self {
            AccumulationPolicy::RunningAverage => 1.0 / (frame_index + 1) as f32,
            AccumulationPolicy::ExponentialDecay { retain } => 1.0 - retain.clamp(0.0, 1.0),
        }
    }
}

/// Everything the consumer needs to record and submit one frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameSubmission {
    /// Ring slot all four stages of this frame bind.
    pub slot: SlotHandle,
    /// The slot's uniform content, already composed for this frame.
    pub uniforms: FrameUniforms,
    /// Monotonic index of this frame in the accumulation sequence.
    pub frame_index: u64,
}

/// Result of one successfully submitted frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Passes submitted and a present was enqueued.
    Presented,
    /// Passes submitted but no surface was available this frame. Transient;
    /// the accumulation target still updated.
    SkippedPresent,
}

/// GPU-facing half of the frame loop.
///
/// # Contract
///
/// - On `Ok`, `on_complete` has been attached to the submitted work and will
///   run exactly once when the consumer finishes it, regardless of how long
///   that takes.
/// - On `Err`, `on_complete` has not been and will never be invoked; the
///   caller reclaims the gate unit itself.
pub trait FrameConsumer {
    /// Records the four pass dispatches for `frame` and submits them,
    /// presenting afterwards if a surface is available.
    fn submit_frame(
        &mut self,
        frame: &FrameSubmission,
        on_complete: CompletionCallback,
    ) -> Result<FrameOutcome>;
}

/// Drives one frame per [`render_frame`](Self::render_frame) call, pacing
/// the producer against GPU completion.
pub struct FrameOrchestrator<C: FrameConsumer> {
    gate: InFlightGate,
    ring: FrameResourceRing,
    consumer: C,
    policy: AccumulationPolicy,
    acquire_timeout: Option<Duration>,
    extent: (u32, u32),
    frame_index: u64,
}

impl<C: FrameConsumer> FrameOrchestrator<C> {
    /// Creates an orchestrator over `consumer`. Gate capacity equals the
    /// ring's slot count, which is what guarantees no two in-flight frames
    /// alias a slot.
    #[must_use]
    pub fn new(consumer: C, ring: FrameResourceRing, extent: (u32, u32)) -> Self {
        let gate = InFlightGate::new(ring.slot_count());
        Self {
            gate,
            ring,
            consumer,
            policy: AccumulationPolicy::default(),
            acquire_timeout: None,
            extent,
            frame_index: 0,
        }
    }

    /// Sets the accumulation blending policy.
    #[must_use]
    pub fn with_policy(mut self, policy: AccumulationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Bounds the gate wait instead of blocking indefinitely. A timeout
    /// usually means the consumer stopped signaling completions.
    #[must_use]
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    /// The backpressure gate. Exposed for inspection; acquiring from it
    /// outside the frame loop will stall rendering.
    #[must_use]
    pub fn gate(&self) -> &InFlightGate {
        &self.gate
    }

    /// Frames successfully submitted since creation or the last
    /// [`reset_accumulation`](Self::reset_accumulation).
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Access to the wrapped consumer.
    pub fn consumer_mut(&mut self) -> &mut C {
        &mut self.consumer
    }

    /// Restarts the accumulation sequence. The next frame blends with
    /// factor 1.0 and therefore overwrites the target; call this when the
    /// camera or scene changes discontinuously.
    pub fn reset_accumulation(&mut self) {
        self.frame_index = 0;
    }

    /// Renders one frame: acquire a gate unit (blocking — this is the sole
    /// backpressure on the producer), rotate the resource ring, recompute
    /// uniforms from `scene`, then record and submit through the consumer.
    ///
    /// A present is enqueued only when the consumer has a surface this
    /// frame; an unavailable surface is reported as
    /// [`FrameOutcome::SkippedPresent`], not an error.
    ///
    /// # Errors
    ///
    /// [`RaypaceError::GateTimedOut`](crate::RaypaceError::GateTimedOut) when
    /// a configured timeout expires, or the consumer's submission error. In
    /// both cases the frame is dropped and the gate stays balanced: a failed
    /// submission triggers a compensating release so K failures can never
    /// deadlock the loop.
    pub fn render_frame(&mut self, scene: &dyn SceneSource) -> Result<FrameOutcome> {
        // Idle → GateAcquired
        match self.acquire_timeout {
            Some(timeout) => self.gate.acquire_timeout(timeout)?,
            None => self.gate.acquire(),
        }

        // GateAcquired → StateUpdated
        let slot = self.ring.acquire_next_slot();
        let uniforms = self.compose_uniforms(scene);
        *self.ring.uniforms_mut(&slot) = uniforms;

        // StateUpdated → Recording → Submitted
        let gate = self.gate.clone();
        let on_complete: CompletionCallback = Box::new(move || gate.release());
        let submission = FrameSubmission {
            slot,
            uniforms,
            frame_index: self.frame_index,
        };

        match self.consumer.submit_frame(&submission, on_complete) {
            Ok(outcome) => {
                if outcome == FrameOutcome::SkippedPresent {
                    debug!(
                        "frame {}: no presentable surface, skipping present",
                        self.frame_index
                    );
                }
                self.frame_index += 1;
                Ok(outcome)
            }
            Err(e) => {
                // The consumer never took ownership of the completion, so
                // reclaim the unit here or the gate leaks one capacity per
                // failed submission.
                self.gate.release();
                error!("frame {} submission failed: {e}", self.frame_index);
                Err(e)
            }
        }
    }

    fn compose_uniforms(&self, scene: &dyn SceneSource) -> FrameUniforms {
        let (width, height) = self.extent;
        let aspect = width as f32 / height.max(1) as f32;
        FrameUniforms {
            projection: scene.projection(aspect),
            model_view: scene.view() * scene.model(),
            width,
            height,
            frame_index: self.frame_index as u32,
            blend: self.policy.blend_for(self.frame_index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_average_weights_follow_one_over_n() {
        let policy = AccumulationPolicy::RunningAverage;
        assert!((policy.blend_for(0) - 1.0).abs() < f32::EPSILON);
        assert!((policy.blend_for(1) - 0.5).abs() < f32::EPSILON);
        assert!((policy.blend_for(3) - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn exponential_decay_blend_is_constant() {
        let policy = AccumulationPolicy::ExponentialDecay { retain: 0.9 };
        for frame in [0, 1, 100] {
            assert!((policy.blend_for(frame) - 0.1).abs() < 1e-6);
        }
    }

    #[test]
    fn decay_retain_is_clamped() {
        let policy = AccumulationPolicy::ExponentialDecay { retain: 1.5 };
        assert!(policy.blend_for(0).abs() < f32::EPSILON);
    }
}
