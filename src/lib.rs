//! pose2frame - Resolve rigid-body poses across workcell coordinate frames
//!
//! This library resolves the pose of physical objects across the named
//! coordinate frames of a robotic manipulation workcell (world, tray/AGV
//! frames, camera frames), and converts orientations between quaternion and
//! roll-pitch-yaw representations.
//!
//! # Features
//!
//! - **Rotation codec**: quaternion ↔ RPY with a defined zero-norm edge case
//! - **Transform graph**: static + time-stamped dynamic edges, path finding,
//!   nearest/interpolate/exact sampling
//! - **Publish-then-lookup protocol**: burst publish of an ephemeral target
//!   frame, bounded retry lookups with early exit and typed failure
//! - **Per-call frame names**: concurrent resolutions without a shared lock
//! - **Injected policy and aliases**: retry tuning and the AGV → tray table
//!   are configuration, not constants
//! - **Batch resolution**: rayon-parallel resolution of detection batches
//!   with near-duplicate collapsing
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use pose2frame::{ChannelClient, FrameResolver, GraphBuffer, Pose};
//!
//! let client = ChannelClient::new(GraphBuffer::new(), Duration::from_millis(20));
//! let resolver = FrameResolver::new(client);
//! let pose = Pose::new([1.0, 2.0, 0.0], [0.0, 0.0, 0.0, 1.0]);
//! let in_world = resolver.resolve_to_world(&pose, "logical_camera_1_frame")?;
//! let on_tray = resolver.resolve_to_tray(&in_world, "agv2")?;
//! # Ok::<(), pose2frame::ResolveError>(())
//! ```

pub mod cli;
pub mod client;
pub mod commands;
pub mod detection;
pub mod error;
pub mod graph;
pub mod graph_io;
pub mod pose;
pub mod resolver;
pub mod rotation;

// Re-export main types for convenience
pub use client::ChannelClient;
pub use detection::{Detection, is_same_object};
pub use error::ResolveError;
pub use graph::{EdgeSample, GraphBuffer, LookupTime, SampleMode, TransformClient};
pub use pose::Pose;
pub use resolver::{CancelToken, FrameAliases, FrameResolver, RetryPolicy, WORLD_FRAME};
pub use rotation::{format_pose, format_quaternion, quat_to_rpy, rpy_to_quat};
