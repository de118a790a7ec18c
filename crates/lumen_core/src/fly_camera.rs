use flecs_ecs::prelude::*;
use glam::Vec3;

use crate::{
    App, Input, KeyCode,
    camera::Camera,
    time::Time,
    transform::{Transform, rotation_looking_to},
    viewport::Viewport,
};

const MAX_PITCH_DEGREES: f32 = 89.0;
const SPEED_MULTIPLIER: f32 = 3.0;

/// Mouse-look + WASDQE camera controller. Angles are in degrees.
#[derive(Component, Debug, Clone)]
pub struct FlyCamera {
    pub yaw: f32,
    pub pitch: f32,
    /// World units per second.
    pub move_speed: f32,
    /// Degrees per pixel of mouse motion.
    pub sensitivity: f32,
}

impl Default for FlyCamera {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            move_speed: 4.0,
            sensitivity: 0.15,
        }
    }
}

impl FlyCamera {
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw += dx;
        self.pitch = (self.pitch - dy).clamp(-MAX_PITCH_DEGREES, MAX_PITCH_DEGREES);
    }

    pub fn front(&self) -> Vec3 {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize()
    }

    /// Returns (front, right, up).
    pub fn basis(&self) -> (Vec3, Vec3, Vec3) {
        let front = self.front();
        let right = front.cross(Vec3::Y).normalize();
        let up = right.cross(front).normalize();
        (front, right, up)
    }

    /// Applies one frame of input to the camera transform.
    pub fn update(&mut self, transform: &mut Transform, input: &Input, dt: f32) {
        if input.is_mouse_held() {
            let (dx, dy) = input.mouse_delta;
            self.rotate(dx * self.sensitivity, dy * self.sensitivity);
        }

        let (front, right, up) = self.basis();

        let bindings = [
            (KeyCode::KeyW, front),
            (KeyCode::KeyS, -front),
            (KeyCode::KeyA, -right),
            (KeyCode::KeyD, right),
            (KeyCode::KeyQ, -up),
            (KeyCode::KeyE, up),
        ];
        let move_dir = bindings
            .iter()
            .filter(|(key, _)| input.is_pressed(*key))
            .fold(Vec3::ZERO, |acc, (_, dir)| acc + *dir);

        let mut speed = self.move_speed * dt;
        if input.is_pressed(KeyCode::ShiftLeft) || input.is_pressed(KeyCode::ShiftRight) {
            speed *= SPEED_MULTIPLIER;
        }
        if input.is_pressed(KeyCode::AltLeft) || input.is_pressed(KeyCode::AltRight) {
            speed /= SPEED_MULTIPLIER;
        }

        if move_dir.length_squared() > 0.0 {
            transform.translation += move_dir.normalize() * speed;
        }

        transform.rotation = rotation_looking_to(front, Vec3::Y);
    }
}

pub fn register_fly_camera_systems(app: &mut App) {
    app.world
        .system_named::<(&mut Transform, &mut FlyCamera, &Time, &Input)>("fly camera")
        .kind(flecs::pipeline::OnUpdate)
        .each(|(transform, fly, time, input)| {
            fly.update(transform, input, time.delta_seconds());
        });

    app.world
        .system_named::<(&mut Camera, &Viewport)>("camera aspect")
        .kind(flecs::pipeline::OnUpdate)
        .each(|(camera, viewport)| {
            camera.aspect_ratio = viewport.aspect_ratio();
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_looks_down_positive_x() {
        let fly = FlyCamera::default();
        assert!((fly.front() - Vec3::X).length() < 1e-6);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut fly = FlyCamera::default();
        fly.rotate(0.0, -500.0);
        assert_eq!(fly.pitch, MAX_PITCH_DEGREES);
        fly.rotate(0.0, 1000.0);
        assert_eq!(fly.pitch, -MAX_PITCH_DEGREES);
    }

    #[test]
    fn forward_key_moves_along_front() {
        let mut fly = FlyCamera::default();
        let mut transform = Transform::from_xyz(-7.0, 2.0, 0.0);
        let mut input = Input::default();
        input.press(KeyCode::KeyW);

        fly.update(&mut transform, &input, 0.5);

        assert!((transform.translation - Vec3::new(-5.0, 2.0, 0.0)).length() < 1e-5);
        assert!((transform.forward() - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn shift_triples_and_alt_divides() {
        let mut fly = FlyCamera::default();
        let mut transform = Transform::default();
        let mut input = Input::default();
        input.press(KeyCode::KeyD);
        input.press(KeyCode::ShiftLeft);

        fly.update(&mut transform, &input, 1.0);
        assert!((transform.translation.length() - 12.0).abs() < 1e-4);

        input.press(KeyCode::AltLeft);
        let before = transform.translation;
        fly.update(&mut transform, &input, 1.0);
        assert!(((transform.translation - before).length() - 4.0).abs() < 1e-4);
    }

    #[test]
    fn mouse_only_rotates_while_held() {
        let mut fly = FlyCamera::default();
        let mut transform = Transform::default();
        let mut input = Input::default();
        input.accumulate_mouse(10.0, 0.0);

        fly.update(&mut transform, &input, 0.016);
        assert_eq!(fly.yaw, 0.0);

        input.mouse_button(true);
        fly.update(&mut transform, &input, 0.016);
        assert!((fly.yaw - 1.5).abs() < 1e-6);
    }
}
