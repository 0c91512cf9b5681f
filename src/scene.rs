//! Scene/state collaborator.
//!
//! The orchestrator reads camera parameters and the object transform once
//! per frame, as plain matrices, and composes them into
//! [`FrameUniforms`](crate::FrameUniforms). [`TurntableScene`] is the stock
//! implementation: a single object spinning about the (1, 1, 0) axis in
//! front of a fixed camera.

use glam::{Mat4, Vec3};

/// Supplies raw camera/transform state. Read once per frame during the
/// orchestrator's state-update step.
pub trait SceneSource {
    /// Camera projection for the given aspect ratio.
    fn projection(&self, aspect: f32) -> Mat4;
    /// World-to-camera matrix.
    fn view(&self) -> Mat4;
    /// Object-to-world matrix.
    fn model(&self) -> Mat4;
}

/// A spinning-object scene: perspective camera pulled back along -Z,
/// object rotating about a fixed diagonal axis.
#[derive(Clone, Copy, Debug)]
pub struct TurntableScene {
    /// Current rotation angle in radians.
    pub rotation: f32,
    /// Radians of rotation per second of [`advance`](Self::advance).
    pub spin_rate: f32,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Distance from camera to the turntable center.
    pub camera_distance: f32,
}

impl Default for TurntableScene {
    fn default() -> Self {
        Self {
            rotation: 0.0,
            spin_rate: 0.5,
            fov_y: 65.0_f32.to_radians(),
            camera_distance: 8.0,
        }
    }
}

impl TurntableScene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the turntable by `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        self.rotation += self.spin_rate * dt;
    }
}

impl SceneSource for TurntableScene {
    fn projection(&self, aspect: f32) -> Mat4 {
        // wgpu clip space has depth 0..1; glam's perspective_rh targets it.
        Mat4::perspective_rh(self.fov_y, aspect, 0.1, 100.0)
    }

    fn view(&self) -> Mat4 {
        Mat4::from_translation(Vec3::new(0.0, 0.0, -self.camera_distance))
    }

    fn model(&self) -> Mat4 {
        Mat4::from_axis_angle(Vec3::new(1.0, 1.0, 0.0).normalize(), self.rotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_accumulates_rotation() {
        let mut scene = TurntableScene::new();
        scene.advance(2.0);
        assert!((scene.rotation - scene.spin_rate * 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn view_places_camera_behind_origin() {
        let scene = TurntableScene::new();
        let eye = scene.view().inverse().col(3).truncate();
        assert!((eye.z - scene.camera_distance).abs() < 1e-5);
    }

    #[test]
    fn model_rotation_preserves_axis() {
        let mut scene = TurntableScene::new();
        scene.rotation = 1.2;
        let axis = Vec3::new(1.0, 1.0, 0.0).normalize();
        let rotated = scene.model().transform_vector3(axis);
        assert!((rotated - axis).length() < 1e-5);
    }
}
