//! Boundary to the haptic device driver.
//!
//! The driver plugin is owned by whatever engine runs the simulation. It must
//! already be updated for the current tick when the sampler reads it, and its
//! accessors must not block.

pub mod simulated;

pub use simulated::SimulatedDevice;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn to_radians(self) -> Self {
        Self {
            x: self.x.to_radians(),
            y: self.y.to_radians(),
            z: self.z.to_radians(),
        }
    }
}

/// Unit quaternion, scalar last.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quat {
    pub const IDENTITY: Quat = Quat { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Rotation of `angle` radians about the Y axis.
    pub fn from_yaw(angle: f32) -> Self {
        let half = angle * 0.5;
        Self {
            x: 0.0,
            y: half.sin(),
            z: 0.0,
            w: half.cos(),
        }
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// What the sampler needs from a device driver plugin.
pub trait HapticDevice: Send + Sync {
    /// Stylus position in millimetres.
    fn current_position(&self) -> Vec3;
    /// Output force in newtons.
    fn current_force(&self) -> Vec3;
    /// Arm joint angles in degrees.
    fn joint_angles(&self) -> Vec3;
    /// Gimbal angles in degrees.
    fn gimbal_angles(&self) -> Vec3;
    /// Rotation of the attached collision geometry, if one is assigned.
    fn collision_geometry_rotation(&self) -> Option<Quat> {
        None
    }
    /// Rotation of the attached visualization geometry, if one is assigned.
    fn visualization_geometry_rotation(&self) -> Option<Quat> {
        None
    }
    /// Rotation of the device's own transform.
    fn own_rotation(&self) -> Quat;
}

/// Picks the pose source: collision geometry, then visualization geometry,
/// then the device itself.
pub fn resolve_orientation(device: &dyn HapticDevice) -> Quat {
    device
        .collision_geometry_rotation()
        .or_else(|| device.visualization_geometry_rotation())
        .unwrap_or_else(|| device.own_rotation())
}
