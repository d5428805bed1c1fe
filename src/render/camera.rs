use glam::{Mat4, Vec3};
use std::f32::consts::{FRAC_PI_2, PI, TAU};

const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveCamera {
    pub position: Vec3,
    pub target: Vec3,
    /// Vertical field of view in degrees.
    pub fov_deg: f32,
    pub near: f32,
    pub far: f32,
}

impl PerspectiveCamera {
    pub fn view_matrix(&self) -> Mat4 {
        let forward = (self.target - self.position).normalize_or_zero();
        let up = if forward.cross(Vec3::Y).length_squared() < 1e-6 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        Mat4::look_at_rh(self.position, self.target, up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_deg.to_radians(), aspect.max(1e-3), self.near, self.far)
    }

    pub fn distance(&self) -> f32 {
        self.position.distance(self.target)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitSettings {
    pub min_distance: f32,
    pub max_distance: f32,
    /// Revolutions per minute; zero disables auto-rotation.
    pub auto_rotate_speed: f32,
    pub damping_enabled: bool,
    pub damping_factor: f32,
}

/// Orbit camera around a fixed target with optional auto-rotation and
/// damped user input.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitControls {
    target: Vec3,
    distance: f32,
    yaw: f32,
    pitch: f32,
    yaw_velocity: f32,
    pitch_velocity: f32,
    settings: OrbitSettings,
}

impl OrbitControls {
    pub fn new(position: Vec3, target: Vec3, settings: OrbitSettings) -> Self {
        let offset = position - target;
        let (yaw, pitch) = offset_to_yaw_pitch(offset);
        let mut controls = Self {
            target,
            distance: offset.length(),
            yaw,
            pitch: pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT),
            yaw_velocity: 0.0,
            pitch_velocity: 0.0,
            settings,
        };
        controls.clamp_distance();
        controls
    }

    pub fn settings(&self) -> &OrbitSettings {
        &self.settings
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn position(&self) -> Vec3 {
        let cos_pitch = self.pitch.cos();
        let offset = Vec3::new(
            self.yaw.cos() * cos_pitch,
            self.pitch.sin(),
            self.yaw.sin() * cos_pitch,
        );
        self.target + offset * self.distance
    }

    /// User drag. With damping the motion is spread over following updates.
    pub fn rotate(&mut self, yaw_delta: f32, pitch_delta: f32) {
        if self.settings.damping_enabled {
            self.yaw_velocity += yaw_delta;
            self.pitch_velocity += pitch_delta;
        } else {
            self.yaw += yaw_delta;
            self.pitch += pitch_delta;
            self.normalize_angles();
        }
    }

    /// Scales the orbit distance; values below one move closer.
    pub fn zoom(&mut self, factor: f32) {
        if factor.is_finite() && factor > 0.0 {
            self.distance *= factor;
            self.clamp_distance();
        }
    }

    /// Advances auto-rotation and damping by `dt` seconds. Returns whether
    /// the camera moved.
    pub fn update(&mut self, dt: f32) -> bool {
        let before = (self.yaw, self.pitch, self.distance);

        if self.settings.auto_rotate_speed != 0.0 {
            self.yaw += TAU / 60.0 * self.settings.auto_rotate_speed * dt.max(0.0);
        }

        if self.settings.damping_enabled {
            let factor = self.settings.damping_factor;
            self.yaw += self.yaw_velocity * factor;
            self.pitch += self.pitch_velocity * factor;
            self.yaw_velocity *= 1.0 - factor;
            self.pitch_velocity *= 1.0 - factor;
            if self.yaw_velocity.abs() < 1e-6 {
                self.yaw_velocity = 0.0;
            }
            if self.pitch_velocity.abs() < 1e-6 {
                self.pitch_velocity = 0.0;
            }
        }

        self.normalize_angles();
        self.clamp_distance();
        before != (self.yaw, self.pitch, self.distance)
    }

    pub fn apply(&self, camera: &mut PerspectiveCamera) {
        camera.position = self.position();
        camera.target = self.target;
    }

    fn clamp_distance(&mut self) {
        let max = self.settings.max_distance.max(self.settings.min_distance);
        self.distance = self.distance.clamp(self.settings.min_distance, max);
    }

    fn normalize_angles(&mut self) {
        if self.yaw.is_finite() {
            self.yaw = (self.yaw + PI).rem_euclid(TAU) - PI;
        }
        if self.pitch.is_finite() {
            self.pitch = self.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        }
    }
}

fn offset_to_yaw_pitch(offset: Vec3) -> (f32, f32) {
    let len = offset.length().max(1e-6);
    let n = offset / len;
    (n.z.atan2(n.x), n.y.clamp(-1.0, 1.0).asin())
}
