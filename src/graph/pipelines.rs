//! Pipeline-construction boundary.
//!
//! Pipeline compilation from shader source is an external collaborator: the
//! graph only asks "give me a compiled pass object for stage X". The
//! [`PipelineProvider`] trait is that boundary; [`ShaderModuleProvider`] is
//! the stock implementation that resolves each stage to an entry point in a
//! caller-supplied shader module.
//!
//! # Binding contract
//!
//! Every stage kernel sees two bind groups:
//!
//! | group | binding | resource |
//! |-------|---------|----------|
//! | 0     | 0       | `FrameUniforms` (uniform, dynamic offset) |
//! | 1     | 0..     | stage buffers, see [`StageLayouts`] |
//!
//! Group 1 per stage:
//! - **ray**: 0 = primary rays (write)
//! - **shade**: 0 = primary rays (read), 1 = intersections (write),
//!   2 = candidate radiance (write)
//! - **shadow**: 0 = intersections (read), 1 = visibility mask (write)
//! - **accumulate**: 0 = candidate radiance (read), 1 = visibility mask
//!   (read), 2 = accumulation buffer (read/write), 3 = display texture
//!   (write-only storage, rgba16float)

use crate::errors::{RaypaceError, Result};
use crate::graph::PassStage;
use crate::uniforms::FrameUniforms;

/// Storage texel format of the display target written by the accumulate
/// stage. Presentation surfaces must be configured to match.
pub const DISPLAY_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// External collaborator that turns a stage name into a compiled,
/// ready-to-dispatch pipeline. Invoked once per stage at startup; failure is
/// fatal to setup.
pub trait PipelineProvider {
    /// Builds the compute pipeline for `stage` against the crate's fixed
    /// bind-group contract (`layout`).
    fn compute_pipeline(
        &self,
        device: &wgpu::Device,
        stage: PassStage,
        layout: &wgpu::PipelineLayout,
    ) -> Result<wgpu::ComputePipeline>;
}

/// Bind-group and pipeline layouts shared by the four stages.
///
/// Built once at startup; [`TraceBuffers`](crate::gpu::TraceBuffers) creates
/// its bind groups against these same layouts.
pub struct StageLayouts {
    frame_uniforms: wgpu::BindGroupLayout,
    stage_resources: [wgpu::BindGroupLayout; 4],
    pipeline_layouts: [wgpu::PipelineLayout; 4],
}

impl StageLayouts {
    #[must_use]
    pub fn new(device: &wgpu::Device) -> Self {
        let frame_uniforms = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Uniforms Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<FrameUniforms>() as u64
                    ),
                },
                count: None,
            }],
        });

        let stage_resources = PassStage::ALL.map(|stage| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(stage.label()),
                entries: &stage_entries(stage),
            })
        });

        let pipeline_layouts = PassStage::ALL.map(|stage| {
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(stage.label()),
                bind_group_layouts: &[Some(&frame_uniforms), Some(&stage_resources[stage.index()])],
                immediate_size: 0,
            })
        });

        Self {
            frame_uniforms,
            stage_resources,
            pipeline_layouts,
        }
    }

    /// Group-0 layout (frame uniforms, dynamic offset).
    #[must_use]
    pub fn frame_uniforms(&self) -> &wgpu::BindGroupLayout {
        &self.frame_uniforms
    }

    /// Group-1 layout for one stage.
    #[must_use]
    pub fn stage_resources(&self, stage: PassStage) -> &wgpu::BindGroupLayout {
        &self.stage_resources[stage.index()]
    }

    /// Full pipeline layout for one stage.
    #[must_use]
    pub fn pipeline_layout(&self, stage: PassStage) -> &wgpu::PipelineLayout {
        &self.pipeline_layouts[stage.index()]
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn stage_entries(stage: PassStage) -> Vec<wgpu::BindGroupLayoutEntry> {
    match stage {
        PassStage::Ray => vec![storage_entry(0, false)],
        PassStage::Shade => vec![
            storage_entry(0, true),
            storage_entry(1, false),
            storage_entry(2, false),
        ],
        PassStage::Shadow => vec![storage_entry(0, true), storage_entry(1, false)],
        PassStage::Accumulate => vec![
            storage_entry(0, true),
            storage_entry(1, true),
            storage_entry(2, false),
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: DISPLAY_FORMAT,
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                count: None,
            },
        ],
    }
}

/// Builds the four stage pipelines from one shader module, resolving each
/// stage to the entry point `<stage>_kernel` (`ray_kernel`, `shade_kernel`,
/// `shadow_kernel`, `accumulate_kernel`).
pub struct ShaderModuleProvider {
    module: wgpu::ShaderModule,
}

impl ShaderModuleProvider {
    #[must_use]
    pub fn new(module: wgpu::ShaderModule) -> Self {
        Self { module }
    }

    /// Entry point name a stage resolves to.
    #[must_use]
    pub fn entry_point(stage: PassStage) -> &'static str {
        match stage {
            PassStage::Ray => "ray_kernel",
            PassStage::Shade => "shade_kernel",
            PassStage::Shadow => "shadow_kernel",
            PassStage::Accumulate => "accumulate_kernel",
        }
    }
}

impl PipelineProvider for ShaderModuleProvider {
    fn compute_pipeline(
        &self,
        device: &wgpu::Device,
        stage: PassStage,
        layout: &wgpu::PipelineLayout,
    ) -> Result<wgpu::ComputePipeline> {
        // A missing entry point or mismatched bindings surfaces as a
        // validation error; trap it here so setup fails with a diagnostic
        // instead of a deferred device error.
        let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(stage.label()),
            layout: Some(layout),
            module: &self.module,
            entry_point: Some(Self::entry_point(stage)),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        if let Some(error) = pollster::block_on(scope.pop()) {
            return Err(RaypaceError::PipelineUnavailable {
                stage: stage.name(),
                reason: error.to_string(),
            });
        }
        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_points_follow_stage_names() {
        for stage in PassStage::ALL {
            let entry = ShaderModuleProvider::entry_point(stage);
            assert!(entry.starts_with(stage.name()));
            assert!(entry.ends_with("_kernel"));
        }
    }

    #[test]
    fn stage_binding_counts_match_declared_resources() {
        // Group 1 binds every non-uniform input/output of the stage; the
        // accumulate stage adds the display texture on top.
        assert_eq!(stage_entries(PassStage::Ray).len(), 1);
        assert_eq!(stage_entries(PassStage::Shade).len(), 3);
        assert_eq!(stage_entries(PassStage::Shadow).len(), 2);
        assert_eq!(stage_entries(PassStage::Accumulate).len(), 4);
    }
}
