#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod errors;
pub mod gpu;
pub mod graph;
pub mod orchestrator;
pub mod pacing;
pub mod scene;
pub mod uniforms;

pub use errors::{RaypaceError, Result};
pub use gpu::{GpuContext, WgpuFrameConsumer};
pub use graph::pipelines::{DISPLAY_FORMAT, PipelineProvider, ShaderModuleProvider, StageLayouts};
pub use graph::{PassDescriptor, PassGraph, PassStage, TraceResource};
pub use orchestrator::{
    AccumulationPolicy, CompletionCallback, FrameConsumer, FrameOrchestrator, FrameOutcome,
    FrameSubmission,
};
pub use pacing::{FrameResourceRing, InFlightGate, SlotHandle};
pub use scene::{SceneSource, TurntableScene};
pub use uniforms::FrameUniforms;
