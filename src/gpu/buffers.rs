//! GPU-side storage for the pass graph.
//!
//! All inter-stage buffers are sized to the output image and created once at
//! startup; only the uniform ring buffer is written per frame. The
//! accumulation buffer persists across frames (it is the progressive
//! integration target); the display texture is rewritten every frame and
//! copied to the presentation surface.

use crate::graph::pipelines::{DISPLAY_FORMAT, StageLayouts};
use crate::graph::{PassBindings, PassStage};
use crate::pacing::{FrameResourceRing, SlotHandle};
use crate::uniforms::FrameUniforms;

/// Bytes per pixel of the primary-ray buffer (origin + min_t, direction + max_t).
const RAY_STRIDE: u64 = 32;
/// Bytes per pixel of the intersection buffer (position + distance, normal + primitive).
const INTERSECTION_STRIDE: u64 = 32;
/// Bytes per pixel of the candidate-radiance buffer (rgba).
const RADIANCE_STRIDE: u64 = 16;
/// Bytes per pixel of the visibility mask (one float).
const VISIBILITY_STRIDE: u64 = 4;
/// Bytes per pixel of the accumulation buffer (rgba).
const ACCUMULATION_STRIDE: u64 = 16;

/// The full set of GPU resources one frame's passes read and write.
pub struct TraceBuffers {
    width: u32,
    height: u32,

    uniform_ring: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    stage_bind_groups: [wgpu::BindGroup; 4],

    display: wgpu::Texture,
}

impl TraceBuffers {
    /// Allocates every buffer and builds the per-stage bind groups.
    ///
    /// `ring` supplies the slot count and aligned stride of the uniform ring
    /// buffer so the GPU-side layout mirrors the CPU-side slots exactly.
    #[must_use]
    pub fn new(
        device: &wgpu::Device,
        layouts: &StageLayouts,
        ring: &FrameResourceRing,
        width: u32,
        height: u32,
    ) -> Self {
        let pixels = u64::from(width) * u64::from(height);

        let uniform_ring = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniform Ring"),
            size: ring.buffer_size(),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let storage = |label: &str, stride: u64| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: pixels * stride,
                usage: wgpu::BufferUsages::STORAGE,
                mapped_at_creation: false,
            })
        };

        let rays = storage("Primary Ray Buffer", RAY_STRIDE);
        let intersections = storage("Intersection Buffer", INTERSECTION_STRIDE);
        let radiance = storage("Candidate Radiance Buffer", RADIANCE_STRIDE);
        let visibility = storage("Visibility Mask Buffer", VISIBILITY_STRIDE);
        let accumulation = storage("Accumulation Buffer", ACCUMULATION_STRIDE);

        let display = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Display Target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DISPLAY_FORMAT,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let display_view = display.create_view(&wgpu::TextureViewDescriptor::default());

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Uniforms BindGroup"),
            layout: layouts.frame_uniforms(),
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &uniform_ring,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<FrameUniforms>() as u64),
                }),
            }],
        });

        let stage_bind_groups = PassStage::ALL.map(|stage| {
            let entries: Vec<wgpu::BindGroupEntry> = match stage {
                PassStage::Ray => vec![buffer_entry(0, &rays)],
                PassStage::Shade => vec![
                    buffer_entry(0, &rays),
                    buffer_entry(1, &intersections),
                    buffer_entry(2, &radiance),
                ],
                PassStage::Shadow => {
                    vec![buffer_entry(0, &intersections), buffer_entry(1, &visibility)]
                }
                PassStage::Accumulate => vec![
                    buffer_entry(0, &radiance),
                    buffer_entry(1, &visibility),
                    buffer_entry(2, &accumulation),
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(&display_view),
                    },
                ],
            };
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(stage.label()),
                layout: layouts.stage_resources(stage),
                entries: &entries,
            })
        });

        Self {
            width,
            height,
            uniform_ring,
            uniform_bind_group,
            stage_bind_groups,
            display,
        }
    }

    /// Uploads one slot's uniform bytes at that slot's byte offset. This is
    /// the only place CPU-side slots and GPU byte offsets meet.
    pub fn upload_uniforms(
        &self,
        queue: &wgpu::Queue,
        slot: &SlotHandle,
        uniforms: &FrameUniforms,
    ) {
        queue.write_buffer(
            &self.uniform_ring,
            slot.byte_offset(),
            bytemuck::bytes_of(uniforms),
        );
    }

    /// The display texture the accumulate stage writes, for the present copy.
    #[must_use]
    pub fn display_texture(&self) -> &wgpu::Texture {
        &self.display
    }
}

fn buffer_entry(binding: u32, buffer: &wgpu::Buffer) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: buffer.as_entire_binding(),
    }
}

impl PassBindings for TraceBuffers {
    fn uniform_bind_group(&self) -> &wgpu::BindGroup {
        &self.uniform_bind_group
    }

    fn stage_bind_group(&self, stage: PassStage) -> &wgpu::BindGroup {
        &self.stage_bind_groups[stage.index()]
    }

    fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
