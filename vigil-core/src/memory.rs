//! Tiered sighting memory with decay, promotion and position prediction.
//!
//! Entries live in exactly one of two tiers:
//!
//! ```text
//!   add/reinforce ──▶ short-term (duration S) ──▶ promoted ──▶ long-term (duration L)
//!                          │   confidence < min      │
//!                          ▼                         ▼
//!                       discarded                discarded (age > L or
//!                                                confidence < min)
//! ```
//!
//! Confidence decays every cleanup pass (long-term at half rate) and is
//! non-increasing between reinforcements. A per-target bounded position ring
//! feeds velocity-averaged position prediction.

use crate::config::MemoryConfig;
use crate::types::{EntityId, MemoryKind};
use glam::Vec3;
use std::collections::HashMap;
use std::collections::VecDeque;
use tracing::trace;

/// One remembered sighting. Lives in exactly one tier.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryEntry {
    /// Entity this memory is about.
    pub id: EntityId,
    /// Position at the time of the sighting (or latest reinforcement).
    pub position: Vec3,
    /// Simulation time of creation or latest reinforcement.
    pub timestamp: f32,
    /// Belief strength in [0, 1]; decays, never rises without reinforcement.
    pub confidence: f32,
    /// What produced the memory.
    pub kind: MemoryKind,
    /// Whether the entry has been reinforced at least once.
    pub reinforced: bool,
}

/// Position sample used solely for velocity estimation.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PositionRecord {
    position: Vec3,
    timestamp: f32,
}

/// Two-tier memory store. One instance per sensor.
#[derive(Debug)]
pub struct MemoryModule {
    config: MemoryConfig,
    short_term: Vec<MemoryEntry>,
    long_term: Vec<MemoryEntry>,
    history: HashMap<EntityId, VecDeque<PositionRecord>>,
    since_cleanup: f32,
}

impl MemoryModule {
    /// Build the module from memory configuration.
    #[must_use]
    pub fn new(config: &MemoryConfig) -> Self {
        Self {
            config: config.clone(),
            short_term: Vec::new(),
            long_term: Vec::new(),
            history: HashMap::new(),
            since_cleanup: 0.0,
        }
    }

    /// Insert a new short-term memory.
    pub fn add_memory(&mut self, id: EntityId, position: Vec3, confidence: f32, kind: MemoryKind, now: f32) {
        self.short_term.push(MemoryEntry {
            id,
            position,
            timestamp: now,
            confidence: confidence.clamp(0.0, 1.0),
            kind,
            reinforced: false,
        });
        self.record_position(id, position, now);
        trace!(entity = %id, confidence, "memory added");
    }

    /// Reinforce an existing short-term memory for the same entity within
    /// the position tolerance; falls back to a plain insert when none
    /// matches.
    pub fn reinforce_memory(
        &mut self,
        id: EntityId,
        position: Vec3,
        extra_confidence: f32,
        kind: MemoryKind,
        now: f32,
    ) {
        let tolerance = self.config.reinforce_tolerance;
        let found = self.short_term.iter_mut().find(|entry| {
            entry.id == id && entry.position.distance(position) <= tolerance
        });

        match found {
            Some(entry) => {
                entry.confidence = (entry.confidence + extra_confidence).clamp(0.0, 1.0);
                entry.position = position;
                entry.timestamp = now;
                entry.reinforced = true;
                self.record_position(id, position, now);
            }
            None => self.add_memory(id, position, extra_confidence, kind, now),
        }
    }

    /// Per-tick update, internally throttled to the cleanup interval. Runs
    /// the decay pass and the expiry/promotion pass.
    pub fn update(&mut self, dt: f32, now: f32) {
        self.since_cleanup += dt;
        if self.since_cleanup < self.config.cleanup_interval {
            return;
        }
        let elapsed = self.since_cleanup;
        self.since_cleanup = 0.0;

        self.decay_pass(elapsed);
        self.expiry_pass(now);
        self.prune_history();
    }

    /// Whether either tier holds a memory of the entity.
    #[must_use]
    pub fn has_memory_of(&self, id: EntityId) -> bool {
        self.short_term.iter().any(|e| e.id == id) || self.long_term.iter().any(|e| e.id == id)
    }

    /// Highest confidence across both tiers; 0 after eviction.
    #[must_use]
    pub fn confidence_of(&self, id: EntityId) -> f32 {
        self.short_term
            .iter()
            .chain(self.long_term.iter())
            .filter(|e| e.id == id)
            .map(|e| e.confidence)
            .fold(0.0, f32::max)
    }

    /// Most recently remembered position of the entity.
    #[must_use]
    pub fn last_known_position(&self, id: EntityId) -> Option<Vec3> {
        self.short_term
            .iter()
            .chain(self.long_term.iter())
            .filter(|e| e.id == id)
            .max_by(|a, b| a.timestamp.total_cmp(&b.timestamp))
            .map(|e| e.position)
    }

    /// Extrapolate where the entity will be `horizon` seconds from `now`.
    ///
    /// Averages per-sample velocities from history samples younger than
    /// twice the horizon; the extrapolated displacement is clamped to the
    /// configured maximum prediction distance. Entities with fewer than two
    /// recent samples predict at their last known position.
    #[must_use]
    pub fn predicted_position(&self, id: EntityId, horizon: f32, now: f32) -> Option<Vec3> {
        let ring = self.history.get(&id)?;
        let last = ring.back()?;

        let window = now - horizon * 2.0;
        let recent: Vec<&PositionRecord> =
            ring.iter().filter(|r| r.timestamp >= window).collect();
        if recent.len() < 2 {
            return Some(last.position);
        }

        let mut sum = Vec3::ZERO;
        let mut samples = 0;
        for pair in recent.windows(2) {
            let dt = pair[1].timestamp - pair[0].timestamp;
            if dt > f32::EPSILON {
                sum += (pair[1].position - pair[0].position) / dt;
                samples += 1;
            }
        }
        if samples == 0 {
            return Some(last.position);
        }

        let velocity = sum / samples as f32;
        let mut displacement = velocity * horizon;
        let max = self.config.max_prediction_distance;
        if displacement.length() > max {
            displacement = displacement.normalize() * max;
        }
        Some(last.position + displacement)
    }

    /// Entries currently in the short-term tier.
    #[must_use]
    pub fn short_term_count(&self) -> usize {
        self.short_term.len()
    }

    /// Entries currently in the long-term tier.
    #[must_use]
    pub fn long_term_count(&self) -> usize {
        self.long_term.len()
    }

    /// Drop every memory and position sample.
    pub fn clear(&mut self) {
        self.short_term.clear();
        self.long_term.clear();
        self.history.clear();
        self.since_cleanup = 0.0;
    }

    fn record_position(&mut self, id: EntityId, position: Vec3, now: f32) {
        let ring = self.history.entry(id).or_default();
        ring.push_back(PositionRecord { position, timestamp: now });
        while ring.len() > self.config.position_history_cap {
            ring.pop_front();
        }
    }

    /// Long-term entries decay at half the short-term rate.
    fn decay_pass(&mut self, elapsed: f32) {
        let rate = self.config.confidence_decay;
        for entry in &mut self.short_term {
            entry.confidence = (entry.confidence - rate * elapsed).max(0.0);
        }
        for entry in &mut self.long_term {
            entry.confidence = (entry.confidence - rate * 0.5 * elapsed).max(0.0);
        }
    }

    fn expiry_pass(&mut self, now: f32) {
        let short_duration = self.config.short_term_duration;
        let min_confidence = self.config.min_confidence;

        let mut expired = Vec::new();
        self.short_term.retain_mut(|entry| {
            if now - entry.timestamp <= short_duration {
                return true;
            }
            expired.push(entry.clone());
            false
        });
        for entry in expired {
            if entry.confidence >= min_confidence {
                self.promote(entry, now);
            } else {
                trace!(entity = %entry.id, "short-term memory discarded");
            }
        }

        let long_duration = self.config.long_term_duration;
        self.long_term.retain(|entry| {
            now - entry.timestamp <= long_duration && entry.confidence >= min_confidence
        });
    }

    /// The long-term duration counts from promotion, not first sighting.
    fn promote(&mut self, mut entry: MemoryEntry, now: f32) {
        if self.long_term.len() >= self.config.max_entries {
            if let Some(weakest) = self
                .long_term
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| a.confidence.total_cmp(&b.confidence))
                .map(|(i, _)| i)
            {
                self.long_term.swap_remove(weakest);
            }
        }
        entry.timestamp = now;
        trace!(entity = %entry.id, confidence = entry.confidence, "memory promoted");
        self.long_term.push(entry);
    }

    /// Rings for entities with no remaining memory carry no information.
    fn prune_history(&mut self) {
        let retained: Vec<EntityId> = self.history.keys().copied().collect();
        for id in retained {
            if !self.has_memory_of(id) {
                self.history.remove(&id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module() -> MemoryModule {
        MemoryModule::new(&MemoryConfig::default())
    }

    #[test]
    fn added_memory_is_queryable() {
        let mut mem = module();
        mem.add_memory(EntityId(1), Vec3::ONE, 0.7, MemoryKind::Visual, 0.0);

        assert!(mem.has_memory_of(EntityId(1)));
        assert!((mem.confidence_of(EntityId(1)) - 0.7).abs() < f32::EPSILON);
        assert_eq!(mem.last_known_position(EntityId(1)), Some(Vec3::ONE));
        assert_eq!(mem.short_term_count(), 1);
    }

    #[test]
    fn reinforcement_within_tolerance_updates_in_place() {
        let mut mem = module();
        mem.add_memory(EntityId(1), Vec3::ZERO, 0.3, MemoryKind::Visual, 0.0);
        mem.reinforce_memory(EntityId(1), Vec3::new(1.0, 0.0, 0.0), 0.4, MemoryKind::Visual, 1.0);

        assert_eq!(mem.short_term_count(), 1);
        assert!((mem.confidence_of(EntityId(1)) - 0.7).abs() < 1e-5);
        assert_eq!(
            mem.last_known_position(EntityId(1)),
            Some(Vec3::new(1.0, 0.0, 0.0))
        );
    }

    #[test]
    fn reinforcement_outside_tolerance_inserts_new_entry() {
        let mut mem = module();
        mem.add_memory(EntityId(1), Vec3::ZERO, 0.3, MemoryKind::Visual, 0.0);
        mem.reinforce_memory(EntityId(1), Vec3::new(10.0, 0.0, 0.0), 0.4, MemoryKind::Visual, 1.0);
        assert_eq!(mem.short_term_count(), 2);
    }

    #[test]
    fn confidence_decays_and_never_rises_without_reinforcement() {
        let mut mem = module();
        mem.add_memory(EntityId(1), Vec3::ZERO, 0.5, MemoryKind::Visual, 0.0);

        let mut previous = mem.confidence_of(EntityId(1));
        for step in 1..=4 {
            let now = step as f32;
            mem.update(1.0, now);
            let current = mem.confidence_of(EntityId(1));
            assert!(current <= previous, "confidence rose at t={now}");
            previous = current;
        }
        // 4 seconds at 0.1/s
        assert!((previous - 0.1).abs() < 1e-4);
    }

    #[test]
    fn confident_entry_promotes_at_short_term_boundary() {
        let mut mem = module();
        mem.add_memory(EntityId(1), Vec3::ZERO, 0.9, MemoryKind::Visual, 0.0);

        // 6 one-second passes carry the entry past the 5s short-term
        // duration with confidence ~0.3, above the 0.1 minimum.
        for step in 1..=6 {
            mem.update(1.0, step as f32);
        }

        assert_eq!(mem.short_term_count(), 0);
        assert_eq!(mem.long_term_count(), 1);
        assert!(mem.has_memory_of(EntityId(1)));
    }

    #[test]
    fn weak_entry_is_discarded_at_the_boundary() {
        let mut mem = module();
        mem.add_memory(EntityId(1), Vec3::ZERO, 0.05, MemoryKind::Visual, 0.0);

        for step in 1..=6 {
            mem.update(1.0, step as f32);
        }

        assert!(!mem.has_memory_of(EntityId(1)));
        assert_eq!(mem.confidence_of(EntityId(1)), 0.0);
        assert_eq!(mem.long_term_count(), 0);
    }

    #[test]
    fn long_term_decays_at_half_rate() {
        let config = MemoryConfig {
            short_term_duration: 0.5,
            ..MemoryConfig::default()
        };
        let mut mem = MemoryModule::new(&config);
        mem.add_memory(EntityId(1), Vec3::ZERO, 0.9, MemoryKind::Visual, 0.0);

        // First pass promotes (entry older than 0.5s), later passes decay
        // the long-term entry at 0.05/s.
        mem.update(1.0, 1.0);
        assert_eq!(mem.long_term_count(), 1);
        let after_promotion = mem.confidence_of(EntityId(1));

        mem.update(1.0, 2.0);
        let after_one_second = mem.confidence_of(EntityId(1));
        assert!((after_promotion - after_one_second - 0.05).abs() < 1e-4);
    }

    #[test]
    fn full_long_term_tier_evicts_lowest_confidence() {
        let config = MemoryConfig {
            short_term_duration: 0.5,
            max_entries: 2,
            ..MemoryConfig::default()
        };
        let mut mem = MemoryModule::new(&config);
        mem.add_memory(EntityId(1), Vec3::ZERO, 0.9, MemoryKind::Visual, 0.0);
        mem.add_memory(EntityId(2), Vec3::ZERO, 0.3, MemoryKind::Visual, 0.0);
        mem.update(1.0, 1.0);
        assert_eq!(mem.long_term_count(), 2);

        mem.add_memory(EntityId(3), Vec3::ZERO, 0.8, MemoryKind::Visual, 1.0);
        mem.update(1.0, 2.0);

        assert_eq!(mem.long_term_count(), 2);
        assert!(mem.has_memory_of(EntityId(1)));
        assert!(mem.has_memory_of(EntityId(3)));
        assert!(!mem.has_memory_of(EntityId(2)));
    }

    #[test]
    fn prediction_extrapolates_average_velocity() {
        let mut mem = module();
        // 1 unit/s along +x, sampled every 0.5s.
        for step in 0..4 {
            let t = step as f32 * 0.5;
            mem.reinforce_memory(
                EntityId(1),
                Vec3::new(t, 0.0, 0.0),
                0.2,
                MemoryKind::Visual,
                t,
            );
        }

        let predicted = mem.predicted_position(EntityId(1), 2.0, 1.5);
        let predicted = predicted.expect("entity has history");
        assert!((predicted.x - 3.5).abs() < 0.01, "got {predicted:?}");
    }

    #[test]
    fn prediction_displacement_is_clamped() {
        let mut mem = module();
        // 100 units/s would extrapolate 200 units over the horizon.
        mem.add_memory(EntityId(1), Vec3::ZERO, 0.5, MemoryKind::Visual, 0.0);
        mem.reinforce_memory(
            EntityId(1),
            Vec3::new(10.0, 0.0, 0.0),
            0.2,
            MemoryKind::Visual,
            0.1,
        );

        let predicted = mem
            .predicted_position(EntityId(1), 2.0, 0.1)
            .expect("entity has history");
        let displacement = predicted - Vec3::new(10.0, 0.0, 0.0);
        assert!(displacement.length() <= 5.0 + 1e-4);
    }

    #[test]
    fn stationary_history_predicts_in_place() {
        let mut mem = module();
        mem.add_memory(EntityId(1), Vec3::ONE, 0.5, MemoryKind::Visual, 0.0);
        let predicted = mem.predicted_position(EntityId(1), 2.0, 0.0);
        assert_eq!(predicted, Some(Vec3::ONE));
    }

    #[test]
    fn clear_drops_everything() {
        let mut mem = module();
        mem.add_memory(EntityId(1), Vec3::ZERO, 0.9, MemoryKind::Visual, 0.0);
        mem.clear();
        assert!(!mem.has_memory_of(EntityId(1)));
        assert_eq!(mem.predicted_position(EntityId(1), 2.0, 0.0), None);
        assert_eq!(mem.short_term_count() + mem.long_term_count(), 0);
    }
}
