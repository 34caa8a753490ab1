use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "pose2frame",
    about = "Resolve rigid-body poses across workcell coordinate frames",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List frames and edges of a graph file
    Inspect {
        /// Path to the graph JSON file
        graph: String,
    },

    /// Resolve a pose into world (default) or an AGV tray frame
    Resolve {
        /// Path to the graph JSON file
        graph: String,
        /// Position "X,Y,Z" in meters
        #[arg(long = "position")]
        position: String,
        /// Orientation "ROLL,PITCH,YAW" in radians
        #[arg(long = "rpy")]
        rpy: Option<String>,
        /// Orientation "X,Y,Z,W" quaternion (overrides --rpy)
        #[arg(long = "quat")]
        quat: Option<String>,
        /// Frame the pose is expressed in
        #[arg(long = "from", default_value = "world")]
        from: String,
        /// Resolve into this AGV's tray frame; the pose must be in world
        #[arg(long = "agv")]
        agv: Option<String>,
        /// Publish repetitions before the first lookup
        #[arg(long = "burst", default_value_t = 15)]
        burst: usize,
        /// Bounded lookup attempts
        #[arg(long = "attempts", default_value_t = 10)]
        attempts: usize,
        /// Per-attempt lookup timeout in milliseconds
        #[arg(long = "timeout-ms", default_value_t = 1000)]
        timeout_ms: u64,
        /// Pause between failed attempts in milliseconds
        #[arg(long = "backoff-ms", default_value_t = 1000)]
        backoff_ms: u64,
        /// Overall deadline in milliseconds
        #[arg(long = "deadline-ms")]
        deadline_ms: Option<u64>,
        /// Simulated propagation delay of the publish channel
        #[arg(long = "propagation-ms", default_value_t = 20)]
        propagation_ms: u64,
        /// Dynamic edge sampling: nearest | interpolate | exact
        #[arg(long = "sample-mode", default_value = "nearest")]
        sample_mode: String,
        /// Print the result as JSON
        #[arg(long = "json")]
        json: bool,
    },

    /// Resolve an already-published frame into world
    Locate {
        /// Path to the graph JSON file
        graph: String,
        /// Frame name, e.g. a camera detection frame
        frame: String,
        /// Bounded lookup attempts
        #[arg(long = "attempts", default_value_t = 10)]
        attempts: usize,
        /// Per-attempt lookup timeout in milliseconds
        #[arg(long = "timeout-ms", default_value_t = 1000)]
        timeout_ms: u64,
        /// Pause between failed attempts in milliseconds
        #[arg(long = "backoff-ms", default_value_t = 1000)]
        backoff_ms: u64,
        /// Simulated propagation delay of the publish channel
        #[arg(long = "propagation-ms", default_value_t = 20)]
        propagation_ms: u64,
        /// Dynamic edge sampling: nearest | interpolate | exact
        #[arg(long = "sample-mode", default_value = "nearest")]
        sample_mode: String,
        /// Print the result as JSON
        #[arg(long = "json")]
        json: bool,
    },

    /// Resolve a detection batch in parallel
    Batch {
        /// Path to the graph JSON file
        graph: String,
        /// Path to the detection batch JSON file
        detections: String,
        /// Resolve into this AGV's tray frame instead of world
        #[arg(long = "agv")]
        agv: Option<String>,
        /// Worker threads (0 = one per core)
        #[arg(long = "jobs", default_value_t = 0)]
        jobs: usize,
        /// Planar distance under which same-type detections collapse
        #[arg(long = "dedupe-tolerance", default_value_t = 0.05)]
        dedupe_tolerance: f64,
        /// Output path; stdout when unset
        #[arg(long = "out")]
        out: Option<String>,
        /// Show progress bar (enabled by default)
        #[arg(long = "progress", action = ArgAction::SetTrue, default_value_t = true)]
        progress: bool,
        /// Bounded lookup attempts
        #[arg(long = "attempts", default_value_t = 10)]
        attempts: usize,
        /// Per-attempt lookup timeout in milliseconds
        #[arg(long = "timeout-ms", default_value_t = 1000)]
        timeout_ms: u64,
        /// Pause between failed attempts in milliseconds
        #[arg(long = "backoff-ms", default_value_t = 1000)]
        backoff_ms: u64,
        /// Simulated propagation delay of the publish channel
        #[arg(long = "propagation-ms", default_value_t = 20)]
        propagation_ms: u64,
        /// Dynamic edge sampling: nearest | interpolate | exact
        #[arg(long = "sample-mode", default_value = "nearest")]
        sample_mode: String,
    },

    /// Convert a quaternion to roll-pitch-yaw
    Rpy {
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
        #[arg(allow_negative_numbers = true)]
        z: f64,
        #[arg(allow_negative_numbers = true)]
        w: f64,
    },

    /// Convert roll-pitch-yaw to a quaternion
    Quat {
        #[arg(allow_negative_numbers = true)]
        roll: f64,
        #[arg(allow_negative_numbers = true)]
        pitch: f64,
        #[arg(allow_negative_numbers = true)]
        yaw: f64,
    },

    /// Show known AGV tray-frame aliases
    Aliases {},
}
