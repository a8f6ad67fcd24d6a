//! Detected-target records and their reuse pool.
//!
//! A [`DetectedTarget`] is created when a candidate first crosses the
//! detection threshold and mutated every tick it stays above it. Confidence
//! and priority are derived values — recomputed from raw score, distance,
//! motion and elapsed suspicion — and are never set directly by callers.
//!
//! The pool is owned by the sensor instance, not process-global. A record
//! handed back to the pool is fully re-initialized by [`DetectedTarget::reset`]
//! on the next acquire; callers must not rely on any leftover field.

use crate::types::EntityId;
use glam::Vec3;

/// Speed above which a target counts as moving, units/s.
const MOVING_SPEED_THRESHOLD: f32 = 0.1;
/// Detection score at which a target becomes suspicious.
const SUSPICIOUS_SCORE_THRESHOLD: f32 = 0.5;
/// Confidence smoothing rate per second.
const CONFIDENCE_LERP_RATE: f32 = 2.0;

/// Per-candidate detection record.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedTarget {
    /// The candidate this record tracks.
    pub id: EntityId,
    /// Most recent raw detection score.
    pub detection_score: f32,
    /// Simulation time of the first sighting.
    pub first_detected_at: f32,
    /// Simulation time of the latest sighting.
    pub last_seen_at: f32,
    /// Position at the first sighting.
    pub first_detected_position: Vec3,
    /// Position at the latest sighting.
    pub last_known_position: Vec3,
    /// Velocity estimated from successive sightings.
    pub estimated_velocity: Vec3,
    /// Smoothed confidence in [0, 1]; derived, never set by callers.
    pub confidence: f32,
    /// Derived priority in 1..=5.
    pub priority: u8,
    /// Whether the target moved since the previous sighting.
    pub is_moving: bool,
    /// Magnitude of the estimated velocity.
    pub movement_speed: f32,
    /// Whether the target has crossed the suspicion threshold.
    pub was_suspicious: bool,
    /// Seconds the target has stayed suspicious.
    pub suspicion_duration: f32,
}

impl DetectedTarget {
    /// Create a fresh record for a first sighting.
    #[must_use]
    pub fn new(id: EntityId, score: f32, position: Vec3, now: f32) -> Self {
        let mut target = Self {
            id,
            detection_score: 0.0,
            first_detected_at: 0.0,
            last_seen_at: 0.0,
            first_detected_position: Vec3::ZERO,
            last_known_position: Vec3::ZERO,
            estimated_velocity: Vec3::ZERO,
            confidence: 0.0,
            priority: 1,
            is_moving: false,
            movement_speed: 0.0,
            was_suspicious: false,
            suspicion_duration: 0.0,
        };
        target.reset(id, score, position, now);
        target
    }

    /// Re-initialize a pooled record for a new sighting. Every field is
    /// overwritten; this is the manual-ownership contract the pool relies on.
    pub fn reset(&mut self, id: EntityId, score: f32, position: Vec3, now: f32) {
        self.id = id;
        self.detection_score = score;
        self.first_detected_at = now;
        self.last_seen_at = now;
        self.first_detected_position = position;
        self.last_known_position = position;
        self.estimated_velocity = Vec3::ZERO;
        self.confidence = score.clamp(0.0, 1.0);
        self.priority = initial_priority(score);
        self.is_moving = false;
        self.movement_speed = 0.0;
        self.was_suspicious = score >= SUSPICIOUS_SCORE_THRESHOLD;
        self.suspicion_duration = 0.0;
    }

    /// Fold a repeat sighting into the record: smooths confidence, estimates
    /// velocity from displacement, tracks suspicion and re-derives priority.
    pub fn update(&mut self, score: f32, position: Vec3, now: f32) {
        let dt = now - self.last_seen_at;

        self.detection_score = score;
        let blend = (dt * CONFIDENCE_LERP_RATE).clamp(0.0, 1.0);
        self.confidence += (score.clamp(0.0, 1.0) - self.confidence) * blend;

        if dt > 0.0 {
            self.estimated_velocity = (position - self.last_known_position) / dt;
            self.movement_speed = self.estimated_velocity.length();
            self.is_moving = self.movement_speed > MOVING_SPEED_THRESHOLD;
        }
        self.last_known_position = position;

        if score >= SUSPICIOUS_SCORE_THRESHOLD {
            if !self.was_suspicious {
                self.was_suspicious = true;
                self.suspicion_duration = 0.0;
            }
            self.suspicion_duration += dt.max(0.0);
        } else {
            self.was_suspicious = false;
        }

        self.priority = self.dynamic_priority();
        self.last_seen_at = now;
    }

    /// Linear position extrapolation `horizon` seconds ahead. Stationary
    /// targets predict in place.
    #[must_use]
    pub fn predicted_position(&self, horizon: f32) -> Vec3 {
        if !self.is_moving || self.estimated_velocity.length() < 0.01 {
            return self.last_known_position;
        }
        self.last_known_position + self.estimated_velocity * horizon
    }

    /// Seconds since the latest sighting.
    #[must_use]
    pub fn time_since_last_seen(&self, now: f32) -> f32 {
        now - self.last_seen_at
    }

    /// Seconds since the first sighting.
    #[must_use]
    pub fn total_detection_time(&self, now: f32) -> f32 {
        now - self.first_detected_at
    }

    fn dynamic_priority(&self) -> u8 {
        let mut priority = initial_priority(self.detection_score);
        if self.is_moving && self.movement_speed > 2.0 {
            priority += 1;
        }
        if self.was_suspicious && self.suspicion_duration > 3.0 {
            priority += 1;
        }
        if self.confidence > 0.8 {
            priority += 1;
        }
        priority.clamp(1, 5)
    }
}

/// Map a raw score onto the 1..=5 priority ladder.
fn initial_priority(score: f32) -> u8 {
    if score >= 0.9 {
        5
    } else if score >= 0.7 {
        4
    } else if score >= 0.5 {
        3
    } else if score >= 0.3 {
        2
    } else {
        1
    }
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// Bounded reuse pool for [`DetectedTarget`] records, owned by the sensor.
#[derive(Debug)]
pub struct TargetPool {
    idle: Vec<DetectedTarget>,
    capacity: usize,
}

impl TargetPool {
    /// Create a pool with `prewarm` idle records, capped at `capacity`.
    #[must_use]
    pub fn new(prewarm: usize, capacity: usize) -> Self {
        let prewarm = prewarm.min(capacity);
        let idle = (0..prewarm)
            .map(|_| DetectedTarget::new(EntityId(0), 0.0, Vec3::ZERO, 0.0))
            .collect();
        Self { idle, capacity }
    }

    /// Take a record from the pool (or allocate) and initialize it.
    pub fn acquire(&mut self, id: EntityId, score: f32, position: Vec3, now: f32) -> DetectedTarget {
        match self.idle.pop() {
            Some(mut target) => {
                target.reset(id, score, position, now);
                target
            }
            None => DetectedTarget::new(id, score, position, now),
        }
    }

    /// Return a record to the pool; dropped silently when the pool is full.
    pub fn release(&mut self, target: DetectedTarget) {
        if self.idle.len() < self.capacity {
            self.idle.push(target);
        }
    }

    /// Idle records currently held.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_target_derives_confidence_and_priority_from_score() {
        let t = DetectedTarget::new(EntityId(1), 0.75, Vec3::ZERO, 10.0);
        assert!((t.confidence - 0.75).abs() < f32::EPSILON);
        assert_eq!(t.priority, 4);
        assert!(t.was_suspicious);
        assert!(!t.is_moving);
    }

    #[test]
    fn priority_ladder_matches_score_bands() {
        for (score, expected) in [(0.95, 5), (0.7, 4), (0.55, 3), (0.3, 2), (0.1, 1)] {
            assert_eq!(initial_priority(score), expected, "score {score}");
        }
    }

    #[test]
    fn update_estimates_velocity_from_displacement() {
        let mut t = DetectedTarget::new(EntityId(1), 0.6, Vec3::ZERO, 0.0);
        t.update(0.6, Vec3::new(2.0, 0.0, 0.0), 1.0);
        assert!((t.estimated_velocity.x - 2.0).abs() < 1e-5);
        assert!(t.is_moving);
        assert!((t.movement_speed - 2.0).abs() < 1e-5);
    }

    #[test]
    fn suspicion_accumulates_while_score_stays_high() {
        let mut t = DetectedTarget::new(EntityId(1), 0.6, Vec3::ZERO, 0.0);
        t.update(0.6, Vec3::ZERO, 1.0);
        t.update(0.6, Vec3::ZERO, 2.0);
        assert!(t.was_suspicious);
        assert!(t.suspicion_duration >= 2.0);

        t.update(0.2, Vec3::ZERO, 3.0);
        assert!(!t.was_suspicious);
    }

    #[test]
    fn confidence_moves_toward_new_score_not_past_it() {
        let mut t = DetectedTarget::new(EntityId(1), 0.2, Vec3::ZERO, 0.0);
        t.update(0.8, Vec3::ZERO, 0.1);
        assert!(t.confidence > 0.2);
        assert!(t.confidence < 0.8);
    }

    #[test]
    fn stationary_target_predicts_in_place() {
        let t = DetectedTarget::new(EntityId(1), 0.5, Vec3::new(1.0, 0.0, 1.0), 0.0);
        assert_eq!(t.predicted_position(2.0), Vec3::new(1.0, 0.0, 1.0));
    }

    #[test]
    fn moving_target_extrapolates_linearly() {
        let mut t = DetectedTarget::new(EntityId(1), 0.5, Vec3::ZERO, 0.0);
        t.update(0.5, Vec3::new(1.0, 0.0, 0.0), 1.0);
        let predicted = t.predicted_position(2.0);
        assert!((predicted.x - 3.0).abs() < 1e-4);
    }

    #[test]
    fn pool_reuses_and_fully_reinitializes_records() {
        let mut pool = TargetPool::new(2, 4);
        assert_eq!(pool.idle_count(), 2);

        let mut t = pool.acquire(EntityId(7), 0.9, Vec3::ONE, 5.0);
        assert_eq!(pool.idle_count(), 1);
        t.update(0.9, Vec3::new(4.0, 4.0, 4.0), 6.0);

        pool.release(t);
        assert_eq!(pool.idle_count(), 2);

        let reused = pool.acquire(EntityId(8), 0.2, Vec3::ZERO, 7.0);
        assert_eq!(reused.id, EntityId(8));
        assert_eq!(reused.estimated_velocity, Vec3::ZERO);
        assert!(!reused.was_suspicious);
        assert!((reused.first_detected_at - 7.0).abs() < f32::EPSILON);
    }

    #[test]
    fn full_pool_drops_released_records() {
        let mut pool = TargetPool::new(1, 1);
        let extra = DetectedTarget::new(EntityId(2), 0.5, Vec3::ZERO, 0.0);
        pool.release(extra);
        assert_eq!(pool.idle_count(), 1);
    }
}
