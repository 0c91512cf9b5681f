//! Concrete wgpu consumer.
//!
//! [`GpuContext`] brings up the adapter/device pair; [`WgpuFrameConsumer`]
//! implements [`FrameConsumer`] on top of it: per-frame uniform upload, pass
//! recording, completion-callback registration and presentation.

mod buffers;

pub use buffers::TraceBuffers;

use log::warn;

use crate::errors::{RaypaceError, Result};
use crate::graph::pipelines::{DISPLAY_FORMAT, PipelineProvider, StageLayouts};
use crate::graph::{PassBindings, PassGraph};
use crate::orchestrator::{CompletionCallback, FrameConsumer, FrameOutcome, FrameSubmission};
use crate::pacing::FrameResourceRing;

/// Core GPU handles: instance, adapter, device, queue.
pub struct GpuContext {
    /// The wgpu instance, kept so callers can create surfaces against it.
    pub instance: wgpu::Instance,
    /// The selected adapter.
    pub adapter: wgpu::Adapter,
    /// Device for resource creation.
    pub device: wgpu::Device,
    /// Queue for command submission.
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Requests a high-performance adapter and a default device.
    pub async fn new() -> Result<Self> {
        let instance = wgpu::Instance::default();

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| RaypaceError::AdapterRequestFailed(e.to_string()))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }

    /// Blocking variant of [`new`](Self::new) for synchronous startup paths.
    pub fn new_blocking() -> Result<Self> {
        pollster::block_on(Self::new())
    }

    /// The device's minimum uniform-buffer offset alignment, the value the
    /// resource ring should be constructed with.
    #[must_use]
    pub fn uniform_alignment(&self) -> u32 {
        self.device.limits().min_uniform_buffer_offset_alignment.max(1)
    }
}

struct SurfaceState {
    surface: wgpu::Surface<'static>,
}

/// The production [`FrameConsumer`]: records the four-stage graph against
/// [`TraceBuffers`] and submits to a wgpu queue.
pub struct WgpuFrameConsumer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    graph: PassGraph,
    buffers: TraceBuffers,
    surface: Option<SurfaceState>,
}

impl WgpuFrameConsumer {
    /// Builds the four pipelines through `provider` and allocates every
    /// inter-stage buffer for a `width` x `height` output image.
    ///
    /// # Errors
    ///
    /// Pipeline construction failure is fatal: without all four stages no
    /// frame can render.
    pub fn new(
        gpu: &GpuContext,
        provider: &dyn PipelineProvider,
        ring: &FrameResourceRing,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let layouts = StageLayouts::new(&gpu.device);
        let graph = PassGraph::new(&gpu.device, provider, &layouts)?;
        let buffers = TraceBuffers::new(&gpu.device, &layouts, ring, width, height);

        Ok(Self {
            device: gpu.device.clone(),
            queue: gpu.queue.clone(),
            graph,
            buffers,
            surface: None,
        })
    }

    /// Attaches a presentation surface. The surface must already be
    /// configured with [`DISPLAY_FORMAT`], `COPY_DST` usage and the same
    /// extent as the trace buffers, since presenting copies the display
    /// target into the surface texture.
    pub fn attach_surface(
        &mut self,
        surface: wgpu::Surface<'static>,
        config: &wgpu::SurfaceConfiguration,
    ) -> Result<()> {
        if config.format != DISPLAY_FORMAT {
            return Err(RaypaceError::SurfaceUnsupported(format!(
                "surface format {:?} does not match display format {DISPLAY_FORMAT:?}",
                config.format
            )));
        }
        if !config.usage.contains(wgpu::TextureUsages::COPY_DST) {
            return Err(RaypaceError::SurfaceUnsupported(
                "surface must be configured with COPY_DST usage".into(),
            ));
        }
        let (width, height) = self.buffers.extent();
        if (config.width, config.height) != (width, height) {
            return Err(RaypaceError::SurfaceUnsupported(format!(
                "surface is {}x{} but the trace buffers are {width}x{height}",
                config.width, config.height
            )));
        }
        self.surface = Some(SurfaceState { surface });
        Ok(())
    }

    /// Detaches the presentation surface; subsequent frames skip presenting.
    pub fn detach_surface(&mut self) {
        self.surface = None;
    }

    /// The buffers the graph records against.
    #[must_use]
    pub fn buffers(&self) -> &TraceBuffers {
        &self.buffers
    }

    /// Tries to acquire the current surface texture. Unavailability is
    /// transient (e.g. the surface is mid-reconfiguration) and only skips
    /// presentation for this frame.
    fn current_render_target(&self) -> Option<wgpu::SurfaceTexture> {
        let state = self.surface.as_ref()?;
        match state.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(texture) => Some(texture),
            wgpu::CurrentSurfaceTexture::Suboptimal(texture) => {
                // Still presentable; the owner of the surface is expected to
                // reconfigure it.
                warn!("surface texture is suboptimal, presenting anyway");
                Some(texture)
            }
            status => {
                warn!("no presentable surface this frame: {status:?}");
                None
            }
        }
    }
}

impl FrameConsumer for WgpuFrameConsumer {
    fn submit_frame(
        &mut self,
        frame: &FrameSubmission,
        on_complete: CompletionCallback,
    ) -> Result<FrameOutcome> {
        // Write this frame's slot; the ring discipline guarantees no
        // in-flight pass is reading it.
        self.buffers
            .upload_uniforms(&self.queue, &frame.slot, &frame.uniforms);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Trace Frame Encoder"),
            });

        self.graph
            .record(&mut encoder, &self.buffers, frame.slot.dynamic_offset());

        let render_target = self.current_render_target();
        if let Some(target) = &render_target {
            let (width, height) = self.buffers.extent();
            encoder.copy_texture_to_texture(
                self.buffers.display_texture().as_image_copy(),
                target.texture.as_image_copy(),
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        // Registered after submit: the callback attaches to the submission
        // above and fires when this frame's work completes, releasing this
        // frame's gate unit. Registering earlier would bind it to the
        // previous frame's submission.
        self.queue.on_submitted_work_done(on_complete);

        match render_target {
            Some(target) => {
                target.present();
                Ok(FrameOutcome::Presented)
            }
            None => Ok(FrameOutcome::SkippedPresent),
        }
    }
}
