//! Frame Resolver: the publish-then-lookup protocol
//!
//! A resolution publishes the caller's pose as an ephemeral child frame,
//! bursts the publish to outrun propagation delay in the graph, then runs a
//! bounded retry loop of lookups against the requested reference frame.
//! Each call gets its own randomly-suffixed frame name, so concurrent
//! resolutions never race on a shared frame.

use nalgebra::Isometry3;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::ResolveError;
use crate::graph::{LookupTime, TransformClient};
use crate::pose::Pose;

/// Root reference frame of the workcell.
pub const WORLD_FRAME: &str = "world";

/// Retry/timeout policy of one resolution call.
///
/// Defaults match the tuning the protocol was commissioned with: a burst of
/// 15 publishes, then up to 10 lookups of 1 s each with a 1 s pause between
/// misses.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Publish repetitions before the first lookup
    pub publish_burst: usize,
    /// Bounded lookup attempts
    pub max_attempts: usize,
    /// Per-attempt lookup timeout
    pub attempt_timeout: Duration,
    /// Pause between failed attempts
    pub backoff: Duration,
    /// Optional overall deadline across burst and retries
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            publish_burst: 15,
            max_attempts: 10,
            attempt_timeout: Duration::from_secs(1),
            backoff: Duration::from_secs(1),
            deadline: None,
        }
    }
}

/// Caller-held flag that aborts an in-progress resolution.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

static DEFAULT_TRAYS: Lazy<BTreeMap<String, String>> = Lazy::new(|| {
    (1..=4)
        .map(|i| (format!("agv{i}"), format!("kit_tray_{i}")))
        .collect()
});

/// Injected AGV-id → tray-frame mapping, validated at construction.
#[derive(Clone, Debug)]
pub struct FrameAliases {
    map: BTreeMap<String, String>,
}

impl FrameAliases {
    pub fn new(map: BTreeMap<String, String>) -> Result<Self, ResolveError> {
        if map.is_empty() {
            return Err(ResolveError::InvalidAliasTable("empty table".to_string()));
        }
        for (id, frame) in &map {
            if id.is_empty() || frame.is_empty() {
                return Err(ResolveError::InvalidAliasTable(format!(
                    "blank identifier or frame in entry {id:?} -> {frame:?}"
                )));
            }
        }
        Ok(Self { map })
    }

    /// Tray frame for an AGV identifier; unrecognized ids fail fast instead
    /// of falling through to a lookup against an empty frame name.
    pub fn tray_frame(&self, agv_id: &str) -> Result<&str, ResolveError> {
        self.map
            .get(agv_id)
            .map(String::as_str)
            .ok_or_else(|| ResolveError::UnknownFrameAlias(agv_id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(id, frame)| (id.as_str(), frame.as_str()))
    }
}

impl Default for FrameAliases {
    fn default() -> Self {
        Self { map: DEFAULT_TRAYS.clone() }
    }
}

fn ephemeral_frame() -> String {
    format!("target_{:08x}", rand::random::<u32>())
}

/// The resolution engine. Blocking and synchronous: each call holds the
/// caller for the publish burst plus up to attempts × timeout. Hosts that
/// want parallel resolutions run calls on separate threads; per-call frame
/// names make that safe with a shared client.
pub struct FrameResolver<C> {
    client: C,
    policy: RetryPolicy,
    aliases: FrameAliases,
    cancel: CancelToken,
}

impl<C: TransformClient> FrameResolver<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            policy: RetryPolicy::default(),
            aliases: FrameAliases::default(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_aliases(mut self, aliases: FrameAliases) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn aliases(&self) -> &FrameAliases {
        &self.aliases
    }

    /// Resolve a pose given in `source_frame` into world coordinates.
    pub fn resolve_to_world(&self, pose: &Pose, source_frame: &str) -> Result<Pose, ResolveError> {
        let child = ephemeral_frame();
        let started = Instant::now();
        tracing::debug!(source = source_frame, frame = %child, "publishing target frame");
        self.publish_burst(source_frame, &child, &pose.to_isometry(), started)?;
        self.lookup_with_retry(WORLD_FRAME, &child, started)
            .map(|iso| Pose::from_isometry(&iso))
    }

    /// Resolve an already-published frame (e.g. a sensor detection frame)
    /// into world coordinates. No publish step.
    pub fn resolve_frame_to_world(&self, frame: &str) -> Result<Pose, ResolveError> {
        let started = Instant::now();
        self.lookup_with_retry(WORLD_FRAME, frame, started)
            .map(|iso| Pose::from_isometry(&iso))
    }

    /// Resolve a world-frame pose into the tray frame of the given AGV.
    pub fn resolve_to_tray(&self, pose_in_world: &Pose, agv_id: &str) -> Result<Pose, ResolveError> {
        let tray_frame = self.aliases.tray_frame(agv_id)?.to_string();
        let child = ephemeral_frame();
        let started = Instant::now();
        tracing::debug!(agv = agv_id, tray = %tray_frame, frame = %child, "publishing target frame");
        self.publish_burst(WORLD_FRAME, &child, &pose_in_world.to_isometry(), started)?;
        self.lookup_with_retry(&tray_frame, &child, started)
            .map(|iso| Pose::from_isometry(&iso))
    }

    // The burst always completes before the first lookup; no individual
    // publish is guaranteed to have propagated by then, which is what the
    // retry loop absorbs.
    fn publish_burst(
        &self,
        parent: &str,
        child: &str,
        transform: &Isometry3<f64>,
        started: Instant,
    ) -> Result<(), ResolveError> {
        for _ in 0..self.policy.publish_burst.max(1) {
            self.check_abort(started)?;
            self.client.publish_static_transform(parent, child, transform);
        }
        Ok(())
    }

    fn lookup_with_retry(
        &self,
        target: &str,
        source: &str,
        started: Instant,
    ) -> Result<Isometry3<f64>, ResolveError> {
        let attempts = self.policy.max_attempts.max(1);
        for attempt in 1..=attempts {
            self.check_abort(started)?;
            let timeout = self.clamp_to_deadline(self.policy.attempt_timeout, started);
            match self
                .client
                .lookup_transform(target, source, LookupTime::Latest, timeout)
            {
                Ok(iso) => {
                    tracing::debug!(target_frame = target, source_frame = source, attempt, "resolved");
                    return Ok(iso);
                }
                Err(err) => {
                    tracing::warn!(
                        target_frame = target,
                        source_frame = source,
                        attempt,
                        attempts,
                        "lookup failed: {err}"
                    );
                    if attempt < attempts {
                        self.check_abort(started)?;
                        std::thread::sleep(self.clamp_to_deadline(self.policy.backoff, started));
                    }
                }
            }
        }
        Err(ResolveError::ResolutionFailed {
            target: target.to_string(),
            source: source.to_string(),
            attempts,
        })
    }

    fn check_abort(&self, started: Instant) -> Result<(), ResolveError> {
        if self.cancel.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }
        if let Some(deadline) = self.policy.deadline
            && started.elapsed() >= deadline
        {
            return Err(ResolveError::DeadlineExceeded { deadline });
        }
        Ok(())
    }

    fn clamp_to_deadline(&self, wanted: Duration, started: Instant) -> Duration {
        match self.policy.deadline {
            Some(deadline) => wanted.min(deadline.saturating_sub(started.elapsed())),
            None => wanted,
        }
    }
}
