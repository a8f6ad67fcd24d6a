//! Bounded multi-target tracking with dynamic priority.
//!
//! The tracked set never exceeds its configured capacity. A new candidate
//! arriving at capacity must beat the current weakest tracked target
//! strictly, otherwise it is rejected — a stream of equal-scoring candidates
//! cannot churn the set.
//!
//! ```text
//! priority = (dist_score·Wd + score·Ws
//!             + [moving]  movement_score·Wm
//!             + [suspect] suspicion_score·Wt) × confidence
//! ```
//!
//! Sub-scores normalize against fixed references (30 u, 10 u/s, 5 s) so the
//! weights stay comparable across maps. Priority refresh and primary-target
//! recomputation run on separate, slower cadences than the scan loop.

use crate::config::TrackingConfig;
use crate::target::DetectedTarget;
use crate::types::EntityId;
use glam::Vec3;
use ordered_float::OrderedFloat;
use tracing::{debug, trace};

/// Tracking-side view of a target. Owned value state, refreshed from the
/// sensor's [`DetectedTarget`] on every admission or update.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedTarget {
    /// The tracked entity.
    pub id: EntityId,
    /// Raw detection score at the latest update.
    pub detection_score: f32,
    /// Position at the latest update.
    pub last_known_position: Vec3,
    /// Estimated velocity at the latest update.
    pub velocity: Vec3,
    /// Magnitude of the estimated velocity.
    pub movement_speed: f32,
    /// Whether the target was moving at the latest update.
    pub is_moving: bool,
    /// Whether the target had crossed the suspicion threshold.
    pub was_suspicious: bool,
    /// Seconds the target has stayed suspicious.
    pub suspicion_duration: f32,
    /// Smoothed confidence carried over from the detection record.
    pub confidence: f32,
    /// Dynamic priority; recomputed on the update cadence.
    pub priority: f32,
    /// Simulation time of admission; orders first-encountered tie-breaks.
    pub first_tracked_at: f32,
    /// Simulation time of the latest update.
    pub last_update: f32,
}

/// Bounded priority tracker. One instance per sensor.
#[derive(Debug)]
pub struct TargetTrackingModule {
    config: TrackingConfig,
    // insertion order is the first-encountered order
    targets: Vec<TrackedTarget>,
    primary: Option<EntityId>,
    since_update: f32,
    since_priority: f32,
}

impl TargetTrackingModule {
    /// Build the module from tracking configuration.
    #[must_use]
    pub fn new(config: &TrackingConfig) -> Self {
        Self {
            config: config.clone(),
            targets: Vec::new(),
            primary: None,
            since_update: 0.0,
            since_priority: 0.0,
        }
    }

    /// Admit or refresh a target. Already-tracked targets update in place.
    /// At capacity the candidate must strictly out-prioritize the weakest
    /// tracked target, which is then evicted. Returns whether the target is
    /// tracked afterwards.
    pub fn add_target(
        &mut self,
        detected: &DetectedTarget,
        score: f32,
        observer: Vec3,
        now: f32,
    ) -> bool {
        if let Some(existing) = self.targets.iter_mut().find(|t| t.id == detected.id) {
            Self::refresh(existing, detected, score, now);
            existing.priority = Self::priority_of(&self.config, existing, observer);
            return true;
        }

        let mut candidate = TrackedTarget {
            id: detected.id,
            detection_score: score,
            last_known_position: detected.last_known_position,
            velocity: detected.estimated_velocity,
            movement_speed: detected.movement_speed,
            is_moving: detected.is_moving,
            was_suspicious: detected.was_suspicious,
            suspicion_duration: detected.suspicion_duration,
            confidence: detected.confidence,
            priority: 0.0,
            first_tracked_at: now,
            last_update: now,
        };
        candidate.priority = Self::priority_of(&self.config, &candidate, observer);

        if self.targets.len() >= self.config.max_tracked_targets {
            let weakest = self
                .targets
                .iter()
                .enumerate()
                .min_by_key(|(_, t)| OrderedFloat(t.priority))
                .map(|(i, _)| i);
            let Some(weakest) = weakest else { return false };

            if candidate.priority <= self.targets[weakest].priority {
                trace!(entity = %candidate.id, "tracking rejected, set is full");
                return false;
            }
            let evicted = self.targets.remove(weakest);
            if self.primary == Some(evicted.id) {
                self.primary = None;
            }
            debug!(evicted = %evicted.id, admitted = %candidate.id, "tracked target evicted");
        }

        self.targets.push(candidate);
        true
    }

    /// Per-tick update: expiry runs unconditionally; priority refresh and
    /// primary-target recomputation each run on their own cadence.
    pub fn update(&mut self, dt: f32, now: f32, observer: Vec3) {
        self.expire(now);

        self.since_update += dt;
        if self.since_update >= 1.0 / self.config.update_hz {
            self.since_update = 0.0;
            for target in &mut self.targets {
                target.priority = Self::priority_of(&self.config, target, observer);
            }
        }

        self.since_priority += dt;
        if self.since_priority >= 1.0 / self.config.priority_update_hz {
            self.since_priority = 0.0;
            self.recompute_primary();
        }
    }

    /// The current primary target, if any.
    #[must_use]
    pub fn primary_target(&self) -> Option<&TrackedTarget> {
        self.primary
            .and_then(|id| self.targets.iter().find(|t| t.id == id))
    }

    /// All tracked targets, highest priority first.
    #[must_use]
    pub fn targets_by_priority(&self) -> Vec<&TrackedTarget> {
        let mut sorted: Vec<&TrackedTarget> = self.targets.iter().collect();
        sorted.sort_by_key(|t| std::cmp::Reverse(OrderedFloat(t.priority)));
        sorted
    }

    /// The tracked target nearest to `position`.
    #[must_use]
    pub fn nearest_target(&self, position: Vec3) -> Option<&TrackedTarget> {
        self.targets
            .iter()
            .min_by_key(|t| OrderedFloat(t.last_known_position.distance(position)))
    }

    /// Tracked targets within `range` of `position`.
    #[must_use]
    pub fn targets_in_range(&self, position: Vec3, range: f32) -> Vec<&TrackedTarget> {
        self.targets
            .iter()
            .filter(|t| t.last_known_position.distance(position) <= range)
            .collect()
    }

    /// Tracked targets currently moving.
    #[must_use]
    pub fn moving_targets(&self) -> Vec<&TrackedTarget> {
        self.targets.iter().filter(|t| t.is_moving).collect()
    }

    /// Tracked targets that have crossed the suspicion threshold.
    #[must_use]
    pub fn suspicious_targets(&self) -> Vec<&TrackedTarget> {
        self.targets.iter().filter(|t| t.was_suspicious).collect()
    }

    /// Whether the entity is currently tracked.
    #[must_use]
    pub fn is_tracking(&self, id: EntityId) -> bool {
        self.targets.iter().any(|t| t.id == id)
    }

    /// Currently tracked target count.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.targets.len()
    }

    /// Stop tracking the entity.
    pub fn remove_target(&mut self, id: EntityId) {
        self.targets.retain(|t| t.id != id);
        if self.primary == Some(id) {
            self.primary = None;
        }
    }

    /// Drop all tracked targets.
    pub fn clear(&mut self) {
        self.targets.clear();
        self.primary = None;
    }

    fn refresh(target: &mut TrackedTarget, detected: &DetectedTarget, score: f32, now: f32) {
        target.detection_score = score;
        target.last_known_position = detected.last_known_position;
        target.velocity = detected.estimated_velocity;
        target.movement_speed = detected.movement_speed;
        target.is_moving = detected.is_moving;
        target.was_suspicious = detected.was_suspicious;
        target.suspicion_duration = detected.suspicion_duration;
        target.confidence = detected.confidence;
        target.last_update = now;
    }

    fn priority_of(config: &TrackingConfig, target: &TrackedTarget, observer: Vec3) -> f32 {
        let distance = target.last_known_position.distance(observer);
        let distance_score = (1.0 - distance / config.distance_reference).clamp(0.0, 1.0);

        let mut priority = distance_score * config.distance_weight
            + target.detection_score * config.score_weight;

        if target.is_moving {
            let movement_score = (target.movement_speed / config.speed_reference).clamp(0.0, 1.0);
            priority += movement_score * config.movement_weight;
        }
        if target.was_suspicious {
            let suspicion_score =
                (target.suspicion_duration / config.suspicion_reference).clamp(0.0, 1.0);
            priority += suspicion_score * config.suspicion_weight;
        }

        priority * target.confidence
    }

    /// Strict `>` keeps the first-encountered target on ties.
    fn recompute_primary(&mut self) {
        let mut best: Option<&TrackedTarget> = None;
        for target in &self.targets {
            match best {
                Some(current) if target.priority <= current.priority => {}
                _ => best = Some(target),
            }
        }
        self.primary = best.map(|t| t.id);
    }

    fn expire(&mut self, now: f32) {
        let expiry = self.config.target_expiry_time;
        let mut dropped = false;
        self.targets.retain(|t| {
            let keep = now - t.last_update <= expiry;
            if !keep {
                debug!(entity = %t.id, "tracked target expired");
                dropped = true;
            }
            keep
        });
        if dropped {
            if let Some(primary) = self.primary {
                if !self.is_tracking(primary) {
                    self.primary = None;
                }
            }
        }
    }
}
