//! Sensor-layer detection records and part-identity comparison

use serde::{Deserialize, Serialize};

use crate::pose::Pose;
use crate::rotation::format_pose;

/// Planar distance under which two detections count as the same part.
pub const DEFAULT_IDENTITY_TOLERANCE: f64 = 0.05;

/// One named-object pose report from the sensor layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Detection {
    /// Object type, e.g. `assembly_battery_blue`
    pub object: String,
    /// Frame the pose is expressed in
    pub frame_id: String,
    pub pose: Pose,
}

/// Two detections of the same object type are the same physical part when
/// their XY planar distance is under `tolerance`. Z is ignored: parts of one
/// type sit at a common height on a surface, and the vertical reading is the
/// noisier axis.
pub fn is_same_object(a: &Detection, b: &Detection, tolerance: f64) -> bool {
    if a.object != b.object {
        return false;
    }
    let dx = b.pose.position[0] - a.pose.position[0];
    let dy = b.pose.position[1] - a.pose.position[1];
    (dx * dx + dy * dy).sqrt() < tolerance
}

/// Emit a detection through the diagnostics sink.
pub fn log_detection(det: &Detection) {
    tracing::info!("{} in /{} frame: {}", det.object, det.frame_id, format_pose(&det.pose));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(object: &str, x: f64, y: f64, z: f64) -> Detection {
        Detection {
            object: object.to_string(),
            frame_id: "world".to_string(),
            pose: Pose::new([x, y, z], [0.0, 0.0, 0.0, 1.0]),
        }
    }

    #[test]
    fn nearby_same_type_is_same_part() {
        let a = det("gear_part", 1.00, 2.00, 0.0);
        let b = det("gear_part", 1.02, 2.03, 0.0);
        assert!(is_same_object(&a, &b, DEFAULT_IDENTITY_TOLERANCE));
    }

    #[test]
    fn distance_beyond_tolerance_is_a_different_part() {
        let a = det("gear_part", 1.0, 2.0, 0.0);
        let b = det("gear_part", 1.1, 2.0, 0.0);
        assert!(!is_same_object(&a, &b, DEFAULT_IDENTITY_TOLERANCE));
    }

    #[test]
    fn height_difference_is_ignored() {
        let a = det("gear_part", 1.0, 2.0, 0.0);
        let b = det("gear_part", 1.0, 2.0, 0.5);
        assert!(is_same_object(&a, &b, DEFAULT_IDENTITY_TOLERANCE));
    }

    #[test]
    fn different_types_never_match() {
        let a = det("gear_part", 1.0, 2.0, 0.0);
        let b = det("piston_rod", 1.0, 2.0, 0.0);
        assert!(!is_same_object(&a, &b, DEFAULT_IDENTITY_TOLERANCE));
    }
}
