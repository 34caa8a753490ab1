//! Pose value type shared by the resolver and the graph client

use nalgebra::{Isometry3, Translation3};
use serde::{Deserialize, Serialize};

use crate::rotation::unit_quaternion;

/// Position + orientation of a rigid body.
///
/// The orientation is a quaternion in `[x, y, z, w]` wire order. It does not
/// have to be normalized: every conversion to an isometry renormalizes it,
/// and a zero-norm quaternion is read as identity orientation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position in meters: `[x, y, z]`
    pub position: [f64; 3],
    /// Orientation quaternion: `[x, y, z, w]`
    pub orientation: [f64; 4],
}

impl Pose {
    pub fn new(position: [f64; 3], orientation: [f64; 4]) -> Self {
        Self { position, orientation }
    }

    /// Pose at the origin with identity orientation
    pub fn identity() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            orientation: [0.0, 0.0, 0.0, 1.0],
        }
    }

    pub fn to_isometry(&self) -> Isometry3<f64> {
        let trans = Translation3::new(self.position[0], self.position[1], self.position[2]);
        Isometry3::from_parts(trans, unit_quaternion(self.orientation))
    }

    pub fn from_isometry(iso: &Isometry3<f64>) -> Self {
        let trans = iso.translation.vector;
        let quat = iso.rotation.quaternion();
        Self {
            position: [trans.x, trans.y, trans.z],
            orientation: [quat.i, quat.j, quat.k, quat.w],
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isometry_roundtrip_normalizes() {
        // Non-unit quaternion: 2x identity
        let pose = Pose::new([1.0, 2.0, 3.0], [0.0, 0.0, 0.0, 2.0]);
        let back = Pose::from_isometry(&pose.to_isometry());
        assert_eq!(back.position, [1.0, 2.0, 3.0]);
        let norm: f64 = back.orientation.iter().map(|c| c * c).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-12);
        assert!((back.orientation[3] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn zero_quaternion_reads_as_identity() {
        let pose = Pose::new([0.5, 0.0, 0.0], [0.0, 0.0, 0.0, 0.0]);
        let iso = pose.to_isometry();
        assert_eq!(iso.rotation.quaternion().w, 1.0);
        assert_eq!(iso.translation.vector.x, 0.5);
    }
}
