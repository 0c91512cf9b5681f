//! The four-stage compute pass graph.
//!
//! Path tracing one frame is a fixed linear sequence: generate primary rays,
//! shade the hit points, test the shadow rays, then blend the surviving
//! radiance into the accumulation target. The stages are modeled as a small
//! tagged-variant list ([`PassStage`]) with declared per-stage reads and
//! writes ([`TraceResource`]), so the ordering invariant is data the tests
//! can check instead of a property buried in recording code.
//!
//! Ordering is expressed purely through the recorded command sequence: one
//! compute pass per stage, recorded back to back into a single encoder. A
//! later stage never begins reading a buffer before the earlier stage's
//! writes are visible.

pub mod pipelines;

use crate::errors::Result;
use crate::graph::pipelines::{PipelineProvider, StageLayouts};

/// Workgroup edge length of every stage's 2D dispatch grid.
pub const WORKGROUP_SIZE: u32 = 8;

/// One of the four fixed compute stages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PassStage {
    /// Generates one primary ray per pixel from the camera uniforms.
    Ray,
    /// Intersects rays with the scene and produces candidate radiance.
    Shade,
    /// Traces occlusion rays from the hit points.
    Shadow,
    /// Blends visible radiance into the persistent accumulation target.
    Accumulate,
}

impl PassStage {
    /// All stages in execution order.
    pub const ALL: [PassStage; 4] = [
        PassStage::Ray,
        PassStage::Shade,
        PassStage::Shadow,
        PassStage::Accumulate,
    ];

    /// Stage name used to look up the compiled pass object.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            PassStage::Ray => "ray",
            PassStage::Shade => "shade",
            PassStage::Shadow => "shadow",
            PassStage::Accumulate => "accumulate",
        }
    }

    /// Debug-group label for GPU captures.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            PassStage::Ray => "Ray Pass",
            PassStage::Shade => "Shade Pass",
            PassStage::Shadow => "Shadow Pass",
            PassStage::Accumulate => "Accumulate Pass",
        }
    }

    /// Stable index of this stage in [`PassStage::ALL`].
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            PassStage::Ray => 0,
            PassStage::Shade => 1,
            PassStage::Shadow => 2,
            PassStage::Accumulate => 3,
        }
    }

    /// Resources this stage reads.
    #[must_use]
    pub fn inputs(self) -> &'static [TraceResource] {
        match self {
            PassStage::Ray => &[TraceResource::FrameUniforms],
            PassStage::Shade => &[TraceResource::FrameUniforms, TraceResource::PrimaryRays],
            PassStage::Shadow => &[TraceResource::Intersections],
            PassStage::Accumulate => &[
                TraceResource::FrameUniforms,
                TraceResource::CandidateRadiance,
                TraceResource::VisibilityMask,
            ],
        }
    }

    /// Resources this stage writes.
    #[must_use]
    pub fn outputs(self) -> &'static [TraceResource] {
        match self {
            PassStage::Ray => &[TraceResource::PrimaryRays],
            PassStage::Shade => &[
                TraceResource::Intersections,
                TraceResource::CandidateRadiance,
            ],
            PassStage::Shadow => &[TraceResource::VisibilityMask],
            PassStage::Accumulate => &[TraceResource::AccumulationTarget],
        }
    }
}

/// Buffers and targets handed between stages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceResource {
    /// Per-frame camera/transform uniforms (a ring slot).
    FrameUniforms,
    /// Origin + direction per pixel, produced by the ray stage.
    PrimaryRays,
    /// Hit position, normal and distance per pixel.
    Intersections,
    /// Unoccluded radiance estimate per pixel.
    CandidateRadiance,
    /// Shadow-ray visibility factor per pixel.
    VisibilityMask,
    /// Persistent image buffer integrating radiance across frames.
    AccumulationTarget,
}

/// One stage plus its compiled, ready-to-dispatch pipeline. Immutable after
/// construction.
pub struct PassDescriptor {
    /// Which of the four stages this is.
    pub stage: PassStage,
    /// Pipeline built once at startup and reused every frame.
    pub pipeline: wgpu::ComputePipeline,
}

/// Per-frame GPU bindings consumed while recording the graph.
///
/// Implemented by [`TraceBuffers`](crate::gpu::TraceBuffers); kept as a trait
/// so the graph does not care where the bind groups live.
pub trait PassBindings {
    /// Bind group holding the uniform ring buffer (dynamic offset).
    fn uniform_bind_group(&self) -> &wgpu::BindGroup;
    /// Bind group holding one stage's buffer bindings.
    fn stage_bind_group(&self, stage: PassStage) -> &wgpu::BindGroup;
    /// Output image size in pixels.
    fn extent(&self) -> (u32, u32);
}

/// The four compute stages in fixed execution order.
pub struct PassGraph {
    passes: [PassDescriptor; 4],
}

impl PassGraph {
    /// Builds the four pipelines through the pipeline-construction
    /// collaborator. Invoked once at startup; any failure is fatal.
    pub fn new(
        device: &wgpu::Device,
        provider: &dyn PipelineProvider,
        layouts: &StageLayouts,
    ) -> Result<Self> {
        let mut built = Vec::with_capacity(PassStage::ALL.len());
        for stage in PassStage::ALL {
            let pipeline =
                provider.compute_pipeline(device, stage, layouts.pipeline_layout(stage))?;
            built.push(PassDescriptor { stage, pipeline });
        }
        let passes: [PassDescriptor; 4] = built
            .try_into()
            .unwrap_or_else(|_| unreachable!("built exactly four passes"));

        debug_assert!(order_satisfies_dependencies(
            &passes.each_ref().map(|p| p.stage)
        ));
        Ok(Self { passes })
    }

    /// The stage sequence this graph records.
    #[must_use]
    pub fn order(&self) -> [PassStage; 4] {
        self.passes.each_ref().map(|p| p.stage)
    }

    /// Descriptor for one stage.
    #[must_use]
    pub fn pass(&self, stage: PassStage) -> &PassDescriptor {
        &self.passes[stage.index()]
    }

    /// Records all four dispatches in order into `encoder`.
    ///
    /// Every stage binds the same uniform ring slot via `uniform_offset`; a
    /// frame never mixes slots. Each stage dispatches one 2D grid covering
    /// the output image.
    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        bindings: &dyn PassBindings,
        uniform_offset: u32,
    ) {
        let (width, height) = bindings.extent();
        let groups_x = width.div_ceil(WORKGROUP_SIZE);
        let groups_y = height.div_ceil(WORKGROUP_SIZE);

        for desc in &self.passes {
            encoder.push_debug_group(desc.stage.label());
            {
                let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some(desc.stage.label()),
                    timestamp_writes: None,
                });
                cpass.set_pipeline(&desc.pipeline);
                cpass.set_bind_group(0, bindings.uniform_bind_group(), &[uniform_offset]);
                cpass.set_bind_group(1, bindings.stage_bind_group(desc.stage), &[]);
                cpass.dispatch_workgroups(groups_x, groups_y, 1);
            }
            encoder.pop_debug_group();
        }
    }
}

/// True when every stage's inputs are the frame uniforms or an output of an
/// earlier stage in `order`.
#[must_use]
pub fn order_satisfies_dependencies(order: &[PassStage]) -> bool {
    let mut produced = vec![TraceResource::FrameUniforms];
    for stage in order {
        if !stage.inputs().iter().all(|input| produced.contains(input)) {
            return false;
        }
        produced.extend_from_slice(stage.outputs());
    }
    true
}
