use glam::{Mat4, Vec3};

/// Orbit camera with the demo's fixed framing: the volume sits at the origin
/// and the eye circles it at a fixed distance.
#[derive(Debug, Clone, Copy)]
pub struct OrbitCamera {
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    /// Eye distance from the volume center.
    pub distance: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            fov_y: std::f32::consts::TAU / 5.0,
            near: 2.0,
            far: 7.0,
            distance: 4.0,
        }
    }
}

impl OrbitCamera {
    /// Inverse view-projection for the given rotation (radians) and aspect
    /// ratio. The raymarch shader unprojects clip-space positions with it.
    pub fn inverse_view_proj(&self, rotation: f32, aspect: f32) -> Mat4 {
        // sin²+cos² = 1, so the axis is already unit length.
        let axis = Vec3::new(rotation.sin(), rotation.cos(), 0.0);
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -self.distance))
            * Mat4::from_axis_angle(axis, 1.0);
        let proj = Mat4::perspective_rh(self.fov_y, aspect, self.near, self.far);
        (proj * view).inverse()
    }
}
