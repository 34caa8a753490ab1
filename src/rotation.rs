//! Quaternion ↔ roll-pitch-yaw conversions and pose formatting

use nalgebra::{Quaternion, UnitQuaternion};

use crate::pose::Pose;

/// Build a unit quaternion from `[x, y, z, w]` components.
///
/// The input is normalized; a zero-norm quaternion yields the identity
/// rotation instead of dividing by zero.
pub fn unit_quaternion(q: [f64; 4]) -> UnitQuaternion<f64> {
    let quat = Quaternion::new(q[3], q[0], q[1], q[2]);
    if quat.norm() <= f64::EPSILON {
        UnitQuaternion::identity()
    } else {
        UnitQuaternion::from_quaternion(quat)
    }
}

/// Extract `(roll, pitch, yaw)` in radians from an `[x, y, z, w]` quaternion.
///
/// Intrinsic Z-Y-X (aerospace) convention, the same decomposition tf2's
/// `Matrix3x3::getRPY` performs. `quat_to_rpy((0,0,0,0))` is `(0, 0, 0)`.
pub fn quat_to_rpy(q: [f64; 4]) -> (f64, f64, f64) {
    unit_quaternion(q).euler_angles()
}

/// Build the `[x, y, z, w]` unit quaternion for `(roll, pitch, yaw)` radians.
pub fn rpy_to_quat(roll: f64, pitch: f64, yaw: f64) -> [f64; 4] {
    let unit = UnitQuaternion::from_euler_angles(roll, pitch, yaw);
    let quat = unit.quaternion();
    [quat.i, quat.j, quat.k, quat.w]
}

/// Format quaternion components the way the diagnostics log expects them.
pub fn format_quaternion(q: [f64; 4]) -> String {
    format!("[x: {:.6}, y: {:.6}, z: {:.6}, w: {:.6}]", q[0], q[1], q[2], q[3])
}

/// Format a pose as position + quaternion + derived RPY.
pub fn format_pose(pose: &Pose) -> String {
    let (roll, pitch, yaw) = quat_to_rpy(pose.orientation);
    format!(
        "position: [{:.6}, {:.6}, {:.6}] orientation: {} rpy: [{:.6}, {:.6}, {:.6}]",
        pose.position[0],
        pose.position[1],
        pose.position[2],
        format_quaternion(pose.orientation),
        roll,
        pitch,
        yaw
    )
}
