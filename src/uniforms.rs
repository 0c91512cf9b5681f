//! Per-frame uniform data shared with the GPU.
//!
//! [`FrameUniforms`] is the plain-old-data block every compute stage reads.
//! One live copy exists per in-flight ring slot; the CPU overwrites a slot's
//! copy once per frame before recording, and the GPU treats it as read-only
//! for the duration of that frame's pass execution.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

/// Uniform state recomputed once per frame.
///
/// Layout matches the WGSL-side struct: two column-major `mat4x4<f32>`
/// followed by one 16-byte scalar block, no implicit padding.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    /// Camera projection matrix.
    pub projection: Mat4,
    /// Combined view * model matrix.
    pub model_view: Mat4,
    /// Output image width in pixels.
    pub width: u32,
    /// Output image height in pixels.
    pub height: u32,
    /// Index of this frame in the accumulation sequence. Drives the
    /// per-pixel random sequence and the running-average denominator.
    pub frame_index: u32,
    /// Blend factor applied by the accumulate stage:
    /// `accum = mix(accum, radiance, blend)`.
    pub blend: f32,
}

impl Default for FrameUniforms {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            model_view: Mat4::IDENTITY,
            width: 0,
            height: 0,
            frame_index: 0,
            blend: 1.0,
        }
    }
}

impl FrameUniforms {
    /// Byte stride of one ring slot: the struct size rounded up to the
    /// device's minimum uniform-buffer offset alignment.
    #[must_use]
    pub fn slot_stride(min_uniform_alignment: u32) -> u32 {
        align_to(
            std::mem::size_of::<Self>() as u32,
            min_uniform_alignment.max(1),
        )
    }
}

/// Rounds `value` up to the next multiple of `alignment`.
#[must_use]
pub fn align_to(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniforms_have_no_implicit_padding() {
        // 2 mat4 (128) + 4 scalars (16)
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 144);
    }

    #[test]
    fn slot_stride_rounds_up_to_alignment() {
        assert_eq!(FrameUniforms::slot_stride(256), 256);
        assert_eq!(FrameUniforms::slot_stride(64), 192);
        assert_eq!(FrameUniforms::slot_stride(1), 144);
        // zero alignment is clamped rather than dividing by zero
        assert_eq!(FrameUniforms::slot_stride(0), 144);
    }

    #[test]
    fn align_to_is_identity_on_multiples() {
        assert_eq!(align_to(512, 256), 512);
        assert_eq!(align_to(0, 256), 0);
        assert_eq!(align_to(1, 256), 256);
    }
}
