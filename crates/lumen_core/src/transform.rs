use flecs_ecs::macros::Component;
use glam::{Mat3, Mat4, Quat, Vec3};

#[derive(Component, Debug, Clone, Copy)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_xyz(x: f32, y: f32, z: f32) -> Self {
        Self {
            translation: Vec3::new(x, y, z),
            ..Default::default()
        }
    }

    /// Points the local -Z axis along `direction`.
    pub fn looking_to(mut self, direction: Vec3, up: Vec3) -> Self {
        self.rotation = rotation_looking_to(direction, up);
        self
    }

    /// Creates the Model Matrix (Local -> World)
    pub fn compute_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// World -> View. Camera looks down its local -Z.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.translation, self.translation + self.forward(), self.up())
    }

    // --- Directions (Useful for Movement) ---

    /// Returns the "Forward" direction (-Z) relative to current rotation
    pub fn forward(&self) -> Vec3 {
        self.rotation * -Vec3::Z
    }

    /// Returns the "Right" direction (+X) relative to current rotation
    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    /// Returns the "Up" direction (+Y) relative to current rotation
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }
}

pub fn rotation_looking_to(direction: Vec3, up: Vec3) -> Quat {
    let back = -direction.normalize();
    let right = up.cross(back).normalize();
    let up = back.cross(right);
    Quat::from_mat3(&Mat3::from_cols(right, up, back))
}
