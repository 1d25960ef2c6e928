use serde::{Deserialize, Serialize};

/// A point or direction in 3D space. Gameplay movement happens on the
/// ground plane (x/z); the y component is carried for spawn heights and
/// impulse effects but ignored by the planar operations.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Returns the normalized vector, or zero if the magnitude is zero.
    pub fn normalized(&self) -> Vec3 {
        let mag = self.magnitude();
        if mag == 0.0 {
            Vec3::default()
        } else {
            Vec3::new(self.x / mag, self.y / mag, self.z / mag)
        }
    }

    pub fn scale(&self, scalar: f32) -> Vec3 {
        Vec3::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }

    pub fn add(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    /// Distance to `other` projected onto the ground plane.
    pub fn planar_distance(&self, other: &Vec3) -> f32 {
        let dx = other.x - self.x;
        let dz = other.z - self.z;
        (dx * dx + dz * dz).sqrt()
    }

    /// Normalized ground-plane direction toward `other` (y forced to zero).
    /// Zero when the planar distance is zero.
    pub fn planar_direction_to(&self, other: &Vec3) -> Vec3 {
        Vec3::new(other.x - self.x, 0.0, other.z - self.z).normalized()
    }
}

/// Yaw angle in radians facing along `direction` on the ground plane.
pub fn yaw_from_direction(direction: &Vec3) -> f32 {
    direction.x.atan2(direction.z)
}
