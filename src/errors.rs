//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! The main error type [`RaypaceError`] covers all failure modes including:
//! - GPU setup failures (adapter, device, pipeline construction)
//! - Per-frame submission failures
//! - Frame-pacing timeouts
//!
//! All public APIs return [`Result<T>`], an alias for
//! `std::result::Result<T, RaypaceError>`.

use thiserror::Error;

/// The main error type for the raypace crate.
///
/// Setup variants are fatal: the four compute stages are required for any
/// frame, so a missing pipeline aborts startup. Per-frame variants are
/// recoverable: the orchestrator drops the frame and continues.
#[derive(Error, Debug)]
pub enum RaypaceError {
    // ========================================================================
    // Fatal setup errors
    // ========================================================================
    /// Failed to request a compatible GPU adapter.
    #[error("Failed to request WGPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("Failed to create WGPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    /// A compute pipeline for one of the four stages could not be built.
    #[error("Compute pipeline unavailable for stage `{stage}`: {reason}")]
    PipelineUnavailable {
        /// Stage name (`ray`, `shade`, `shadow`, `accumulate`)
        stage: &'static str,
        /// Underlying validation or lookup failure
        reason: String,
    },

    /// The attached presentation surface is incompatible with the display
    /// target (format or size mismatch).
    #[error("Presentation surface unsupported: {0}")]
    SurfaceUnsupported(String),

    // ========================================================================
    // Per-frame errors
    // ========================================================================
    /// The consumer rejected a recorded command sequence. The frame is
    /// dropped; the in-flight gate unit has already been reclaimed.
    #[error("Command submission rejected: {0}")]
    SubmissionRejected(String),

    /// Waiting for an in-flight frame slot exceeded the configured timeout.
    /// Usually means the GPU stopped signaling completions (device loss).
    #[error("Timed out after {waited_ms} ms waiting for an in-flight frame slot")]
    GateTimedOut {
        /// How long the producer waited before giving up
        waited_ms: u64,
    },

    /// The GPU device was lost. Requires full pipeline reconstruction.
    #[error("GPU device lost: {0}")]
    DeviceLost(String),
}

/// Alias for `Result<T, RaypaceError>`.
pub type Result<T> = std::result::Result<T, RaypaceError>;
