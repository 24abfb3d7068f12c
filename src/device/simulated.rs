use portable_atomic::AtomicF64;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{HapticDevice, Quat, Vec3};

/// Synthetic device tracing a slow Lissajous figure over the workspace.
///
/// The driver sets the device time once per tick with [`SimulatedDevice::set_time`];
/// every reading is derived from that time so readers on other threads
/// always see a consistent tick.
#[derive(Debug)]
pub struct SimulatedDevice {
    time_s: AtomicF64,
    amplitude_mm: f32,
    with_collision_geometry: AtomicBool,
    with_visualization_geometry: AtomicBool,
}

impl SimulatedDevice {
    pub fn new(amplitude_mm: f32) -> Self {
        Self {
            time_s: AtomicF64::new(0.0),
            amplitude_mm,
            with_collision_geometry: AtomicBool::new(false),
            with_visualization_geometry: AtomicBool::new(false),
        }
    }

    pub fn set_time(&self, seconds: f64) {
        self.time_s.store(seconds, Ordering::Release);
    }

    pub fn time(&self) -> f64 {
        self.time_s.load(Ordering::Acquire)
    }

    pub fn attach_collision_geometry(&self, attached: bool) {
        self.with_collision_geometry.store(attached, Ordering::Release);
    }

    pub fn attach_visualization_geometry(&self, attached: bool) {
        self.with_visualization_geometry.store(attached, Ordering::Release);
    }

    fn phase(&self) -> f32 {
        self.time() as f32
    }

    /// Yaw of the stylus tip.
    fn tip_yaw(&self) -> f32 {
        (self.phase() * 0.5).sin() * 0.8
    }
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new(40.0)
    }
}

impl HapticDevice for SimulatedDevice {
    fn current_position(&self) -> Vec3 {
        let t = self.phase();
        let a = self.amplitude_mm;
        Vec3::new(a * (t * 1.3).sin(), a * 0.5 * (t * 0.7).cos(), a * (t * 0.9).sin() * 0.25)
    }

    fn current_force(&self) -> Vec3 {
        // Spring pulling the stylus back to the origin
        let p = self.current_position();
        Vec3::new(-p.x * 0.02, -p.y * 0.02, -p.z * 0.02)
    }

    fn joint_angles(&self) -> Vec3 {
        let t = self.phase();
        Vec3::new(20.0 * (t * 0.4).sin(), 35.0 + 10.0 * t.cos(), -15.0 * (t * 0.6).sin())
    }

    fn gimbal_angles(&self) -> Vec3 {
        let yaw = self.tip_yaw().to_degrees();
        Vec3::new(yaw, 5.0 * self.phase().sin(), 0.0)
    }

    fn collision_geometry_rotation(&self) -> Option<Quat> {
        self.with_collision_geometry
            .load(Ordering::Acquire)
            .then(|| Quat::from_yaw(self.tip_yaw()))
    }

    fn visualization_geometry_rotation(&self) -> Option<Quat> {
        self.with_visualization_geometry
            .load(Ordering::Acquire)
            .then(|| Quat::from_yaw(self.tip_yaw() * 0.5))
    }

    fn own_rotation(&self) -> Quat {
        Quat::IDENTITY
    }
}
