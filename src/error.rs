//! Error types for frame resolution

use std::fmt;
use std::time::Duration;

/// Errors surfaced by the resolver and the transform graph client.
///
/// None of these are process-fatal; callers decide whether a failed
/// resolution aborts the surrounding manipulation task.
#[derive(Debug)]
pub enum ResolveError {
    /// A single lookup attempt ran out of time without the two frames
    /// becoming connected.
    LookupTimeout {
        /// Frame the pose was requested in.
        target: String,
        /// Frame the pose was published under.
        source: String,
        /// Per-attempt timeout that elapsed.
        timeout: Duration,
    },

    /// The bounded retry loop exhausted its attempts.
    ///
    /// A pending-propagation frame and a permanently absent frame look the
    /// same from the client contract; the attempt count is all the engine
    /// can report.
    ResolutionFailed {
        /// Frame the pose was requested in.
        target: String,
        /// Frame the pose was published under.
        source: String,
        /// Number of lookup attempts made.
        attempts: usize,
    },

    /// An AGV identifier outside the configured alias table.
    UnknownFrameAlias(String),

    /// Alias table rejected at construction.
    InvalidAliasTable(String),

    /// The caller's cancellation token fired.
    Cancelled,

    /// The caller-supplied overall deadline elapsed.
    DeadlineExceeded {
        /// The deadline that elapsed.
        deadline: Duration,
    },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::LookupTimeout {
                target,
                source,
                timeout,
            } => write!(
                f,
                "transform {source} -> {target} not available within {timeout:?}"
            ),
            ResolveError::ResolutionFailed {
                target,
                source,
                attempts,
            } => write!(
                f,
                "could not resolve {source} in {target} after {attempts} attempts"
            ),
            ResolveError::UnknownFrameAlias(alias) => write!(f, "unknown AGV alias: {alias}"),
            ResolveError::InvalidAliasTable(msg) => {
                write!(f, "invalid frame alias table: {msg}")
            }
            ResolveError::Cancelled => write!(f, "resolution cancelled"),
            ResolveError::DeadlineExceeded { deadline } => {
                write!(f, "resolution deadline of {deadline:?} exceeded")
            }
        }
    }
}

impl std::error::Error for ResolveError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display() {
        let err = ResolveError::LookupTimeout {
            target: "world".to_string(),
            source: "target_0a1b2c3d".to_string(),
            timeout: Duration::from_secs(1),
        };
        let msg = format!("{err}");
        assert!(msg.contains("world"));
        assert!(msg.contains("target_0a1b2c3d"));
    }

    #[test]
    fn resolution_failed_display() {
        let err = ResolveError::ResolutionFailed {
            target: "kit_tray_2".to_string(),
            source: "target_ffffffff".to_string(),
            attempts: 10,
        };
        let msg = format!("{err}");
        assert!(msg.contains("kit_tray_2"));
        assert!(msg.contains("10"));
    }

    #[test]
    fn unknown_alias_display() {
        let msg = format!("{}", ResolveError::UnknownFrameAlias("agv9".to_string()));
        assert!(msg.contains("agv9"));
    }
}
