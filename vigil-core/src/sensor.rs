//! The visual sensor orchestrator.
//!
//! One [`VisualSensor`] per NPC owns every pipeline module and drives them
//! from a single [`VisualSensor::advance`] call per simulation tick. Data
//! flows one way:
//!
//! ```text
//! overlap query ─▶ culling ─▶ batched LOD scoring ─▶ threshold fan-out
//!                                                        │
//!                              ┌─────────────┬───────────┼────────────┐
//!                              ▼             ▼           ▼            ▼
//!                            alert         memory     tracking     behavior
//!                              └─────────────┴───────────┴──▶ notifications
//! ```
//!
//! Scanning is a resumable state machine: a full pass over the candidate
//! set is spread across fixed-size batches inside the batch window, and the
//! pass-to-pass interval follows the alert level (a calm NPC scans slower
//! than an alerted one).

use crate::alert::AlertSystemModule;
use crate::config::SensorConfig;
use crate::detection::VisualDetectionModule;
use crate::error::{Result, VigilError};
use crate::events::{Notification, VisualSensorEventManager};
use crate::memory::MemoryModule;
use crate::target::{DetectedTarget, TargetPool};
use crate::tracking::{TargetTrackingModule, TrackedTarget};
use crate::types::{AlertLevel, EntityId, EventStats, MemoryKind, Pose, SensorStats};
use crate::visibility::angle_between_deg;
use crate::world::{BehaviorSink, NotificationChannel, SceneQuery};
use glam::Vec3;
use tracing::{debug, warn};

/// Scan frequency blend per alert level, between base and alert rate.
const BLEND_SUSPICIOUS: f32 = 0.5;
const BLEND_INVESTIGATING: f32 = 0.7;
const BLEND_SEARCHING: f32 = 0.85;
/// Culling keeps candidates slightly beyond sight range so targets on the
/// boundary do not flicker in and out of the working set.
const CULL_RANGE_SCALE: f32 = 1.2;

/// Where the scan loop currently is.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ScanPhase {
    /// Between passes; the next pass starts at `until`.
    Waiting { until: f32 },
    /// Mid-pass; the next batch starts at `resume_at`.
    Scanning { cursor: usize, resume_at: f32 },
}

/// Per-NPC visual sensor. See the module docs for the pipeline shape.
#[derive(Debug)]
pub struct VisualSensor {
    id: EntityId,
    config: SensorConfig,
    detection: VisualDetectionModule,
    alert: AlertSystemModule,
    memory: MemoryModule,
    tracking: TargetTrackingModule,
    events: VisualSensorEventManager,
    pool: TargetPool,
    detected: Vec<DetectedTarget>,
    candidates: Vec<EntityId>,
    phase: ScanPhase,
    clock: f32,
    since_cull: f32,
    culled_last_pass: usize,
    last_primary: Option<EntityId>,
}

impl VisualSensor {
    /// Build a sensor for the NPC with the given entity id.
    #[must_use]
    pub fn new(id: EntityId, config: SensorConfig) -> Self {
        let (prewarm, capacity) = if config.scan.use_pool {
            (config.scan.pool_prewarm, config.scan.pool_capacity)
        } else {
            (0, 0)
        };
        Self {
            id,
            detection: VisualDetectionModule::new(&config.detection),
            alert: AlertSystemModule::new(&config.alert),
            memory: MemoryModule::new(&config.memory),
            tracking: TargetTrackingModule::new(&config.tracking),
            events: VisualSensorEventManager::new(&config.events),
            pool: TargetPool::new(prewarm, capacity),
            detected: Vec::new(),
            candidates: Vec::new(),
            phase: ScanPhase::Waiting { until: 0.0 },
            clock: 0.0,
            since_cull: 0.0,
            culled_last_pass: 0,
            last_primary: None,
            config,
        }
    }

    /// The entity this sensor belongs to.
    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.id
    }

    /// Advance the whole pipeline by `dt` seconds.
    ///
    /// # Errors
    /// Returns `VigilError::Collaborator` when the scene no longer knows the
    /// sensor's own entity. Failures of individual behavior callbacks are
    /// logged and do not abort the tick.
    pub fn advance<S, B, C>(
        &mut self,
        dt: f32,
        scene: &S,
        behavior: &mut B,
        channel: &mut C,
    ) -> Result<()>
    where
        S: SceneQuery,
        B: BehaviorSink,
        C: NotificationChannel,
    {
        self.clock += dt;
        self.since_cull += dt;
        let now = self.clock;

        let pose = scene.pose(self.id).ok_or_else(|| {
            VigilError::Collaborator(format!("scene has no pose for observer {}", self.id))
        })?;

        self.alert.update(dt);
        self.memory.update(dt, now);
        self.tracking.update(dt, now, pose.position);

        self.run_scan(dt, scene, behavior, channel, &pose);
        self.cleanup_stale(channel, now);
        self.dispatch_alert_transitions(behavior, channel, now);
        self.sync_primary(behavior);

        self.events.update(dt, channel);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Scan loop
    // -----------------------------------------------------------------------

    fn run_scan<S, B, C>(
        &mut self,
        dt: f32,
        scene: &S,
        behavior: &mut B,
        channel: &mut C,
        pose: &Pose,
    ) where
        S: SceneQuery,
        B: BehaviorSink,
        C: NotificationChannel,
    {
        let now = self.clock;

        if let ScanPhase::Waiting { until } = self.phase {
            if now >= until {
                self.refresh_candidates(scene, pose);
                self.phase = ScanPhase::Scanning { cursor: 0, resume_at: now };
            }
        }

        if let ScanPhase::Scanning { cursor, resume_at } = self.phase {
            if now < resume_at {
                return;
            }
            let batch_size = self.config.scan.targets_per_batch.max(1);
            let end = (cursor + batch_size).min(self.candidates.len());
            for index in cursor..end {
                let candidate = self.candidates[index];
                self.score_candidate(dt, scene, behavior, channel, pose, candidate);
            }

            if end >= self.candidates.len() {
                self.reconcile_departed(channel);
                let interval = 1.0 / self.scan_frequency();
                self.phase = ScanPhase::Waiting { until: now + interval };
            } else {
                let batches = self.candidates.len().div_ceil(batch_size);
                let quantum = self.config.scan.batch_window / batches as f32;
                self.phase = ScanPhase::Scanning { cursor: end, resume_at: now + quantum };
            }
        }
    }

    /// Rebuild the candidate working set, dropping out-of-range and
    /// out-of-cone entities before any scoring happens. The culling pass
    /// itself is throttled; between passes the previous set is reused.
    fn refresh_candidates<S: SceneQuery>(&mut self, scene: &S, pose: &Pose) {
        let scan = &self.config.scan;
        let cull_range = self.config.detection.max_detection_range * CULL_RANGE_SCALE;

        if !scan.early_culling {
            self.candidates = scene.overlap_sphere(pose.position, cull_range, scan.candidate_mask);
            self.candidates.retain(|&id| id != self.id);
            return;
        }
        if self.since_cull < scan.cull_interval {
            return;
        }
        self.since_cull = 0.0;

        let raw = scene.overlap_sphere(pose.position, cull_range, scan.candidate_mask);
        let before = raw.len();
        let half_fov = self.config.detection.field_of_view_deg / 2.0;

        self.candidates = raw
            .into_iter()
            .filter(|&id| {
                if id == self.id {
                    return false;
                }
                let Some(target) = scene.pose(id) else { return false };
                let to_target = target.position - pose.position;
                to_target.length() <= cull_range
                    && angle_between_deg(pose.forward, to_target) <= half_fov
            })
            .collect();
        self.culled_last_pass = before.saturating_sub(self.candidates.len());
    }

    fn score_candidate<S, B, C>(
        &mut self,
        dt: f32,
        scene: &S,
        behavior: &mut B,
        channel: &mut C,
        pose: &Pose,
        candidate: EntityId,
    ) where
        S: SceneQuery,
        B: BehaviorSink,
        C: NotificationChannel,
    {
        let Some(target) = scene.pose(candidate) else {
            self.lose_target(candidate, channel);
            return;
        };

        let raw = self.detection.detection_score(scene, pose, target.position);
        let distance = pose.position.distance(target.position);
        let score = raw * self.lod_multiplier(distance);

        if score >= self.config.detection.detection_threshold {
            self.handle_detection(dt, behavior, channel, pose, candidate, target.position, score);
        } else {
            self.lose_target(candidate, channel);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_detection<B, C>(
        &mut self,
        dt: f32,
        behavior: &mut B,
        channel: &mut C,
        pose: &Pose,
        id: EntityId,
        position: Vec3,
        score: f32,
    ) where
        B: BehaviorSink,
        C: NotificationChannel,
    {
        let now = self.clock;

        let record_index = match self.detected.iter().position(|t| t.id == id) {
            Some(index) => {
                self.detected[index].update(score, position, now);
                index
            }
            None => {
                self.make_room_for_new_target(channel);
                let record = if self.config.scan.use_pool {
                    self.pool.acquire(id, score, position, now)
                } else {
                    DetectedTarget::new(id, score, position, now)
                };
                self.detected.push(record);
                self.events.raise(
                    Notification::TargetSpotted {
                        id,
                        position,
                        score,
                        active_targets: self.detected.len(),
                    },
                    now,
                    channel,
                );
                debug!(entity = %id, score, "target detected");
                self.detected.len() - 1
            }
        };

        self.alert.record_detection(score, dt, position);
        if self.memory.has_memory_of(id) {
            self.memory
                .reinforce_memory(id, position, score * dt, MemoryKind::Visual, now);
        } else {
            self.memory.add_memory(id, position, score, MemoryKind::Visual, now);
        }
        let record = self.detected[record_index].clone();
        self.tracking.add_target(&record, score, pose.position, now);

        if let Err(err) = behavior.on_sight_target(id) {
            warn!(%err, entity = %id, "sight callback failed");
        }
        if let Err(err) = behavior.increase_suspicion(score * dt) {
            warn!(%err, "suspicion callback failed");
        }
        if let Err(err) = behavior.set_last_known_position(position) {
            warn!(%err, "last-known-position callback failed");
        }
    }

    /// Oldest-first eviction keeps the detected set under its cap.
    fn make_room_for_new_target<C: NotificationChannel>(&mut self, channel: &mut C) {
        let cap = self.config.scan.max_simultaneous_targets;
        while self.detected.len() >= cap {
            let oldest = self
                .detected
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| a.first_detected_at.total_cmp(&b.first_detected_at))
                .map(|(i, _)| i);
            match oldest {
                Some(index) => {
                    let id = self.detected[index].id;
                    debug!(entity = %id, "oldest target evicted for capacity");
                    self.release_at(index, channel);
                }
                None => break,
            }
        }
    }

    /// Drop the detected record for `id`, if any, notifying the loss and
    /// returning the record to the pool.
    fn lose_target<C: NotificationChannel>(&mut self, id: EntityId, channel: &mut C) {
        if let Some(index) = self.detected.iter().position(|t| t.id == id) {
            self.release_at(index, channel);
        }
    }

    /// A detected target that fell out of the candidate working set was
    /// never re-scored this pass; out-of-set counts as score zero, so the
    /// record is released like any other sub-threshold target.
    fn reconcile_departed<C: NotificationChannel>(&mut self, channel: &mut C) {
        let mut index = 0;
        while index < self.detected.len() {
            if self.candidates.contains(&self.detected[index].id) {
                index += 1;
            } else {
                self.release_at(index, channel);
            }
        }
    }

    fn release_at<C: NotificationChannel>(&mut self, index: usize, channel: &mut C) {
        let record = self.detected.remove(index);
        self.events.raise(
            Notification::TargetLost {
                id: record.id,
                last_known_position: record.last_known_position,
                active_targets: self.detected.len(),
            },
            self.clock,
            channel,
        );
        debug!(entity = %record.id, "target lost");
        if self.config.scan.use_pool {
            self.pool.release(record);
        }
    }

    /// Memory-driven retirement, a backstop behind the per-pass scoring:
    /// a record unseen longer than the short-term duration whose remembered
    /// confidence fell below the minimum is dropped, as is anything unseen
    /// past the tracking expiry outright.
    fn cleanup_stale<C: NotificationChannel>(&mut self, channel: &mut C, now: f32) {
        let expiry = self.config.tracking.target_expiry_time;
        let faded_after = self.config.memory.short_term_duration;
        let min_confidence = self.config.memory.min_confidence;

        let mut index = 0;
        while index < self.detected.len() {
            let unseen = self.detected[index].time_since_last_seen(now);
            let stale = unseen > expiry
                || (unseen > faded_after
                    && self.memory.confidence_of(self.detected[index].id) < min_confidence);
            if stale {
                self.release_at(index, channel);
            } else {
                index += 1;
            }
        }
    }

    fn dispatch_alert_transitions<B, C>(&mut self, behavior: &mut B, channel: &mut C, now: f32)
    where
        B: BehaviorSink,
        C: NotificationChannel,
    {
        for snapshot in self.alert.take_transitions() {
            if snapshot.level >= AlertLevel::Investigating {
                if let Some(point) = snapshot.investigation_point {
                    if let Err(err) = behavior.set_last_known_position(point) {
                        warn!(%err, "last-known-position callback failed");
                    }
                }
            }
            if snapshot.level > snapshot.previous_level && snapshot.level > AlertLevel::Suspicious {
                self.report_suspicious_activity(channel, now);
            }
            self.events.raise(Notification::AlertChanged(snapshot), now, channel);
        }
    }

    /// Escalating past Suspicious pins the blame on the target the NPC is
    /// focused on: the designated primary, or failing that the highest
    /// priority tracked target. With nothing tracked the escalation has no
    /// subject and only the level-change notification goes out.
    fn report_suspicious_activity<C: NotificationChannel>(&mut self, channel: &mut C, now: f32) {
        let focus = self
            .tracking
            .primary_target()
            .or_else(|| {
                self.tracking
                    .targets_by_priority()
                    .first()
                    .copied()
            })
            .map(|t| (t.id, t.last_known_position));
        let Some((id, position)) = focus else { return };

        self.events.raise(
            Notification::SuspiciousActivity {
                id,
                position,
                intensity: self.alert.intensity(),
            },
            now,
            channel,
        );
    }

    fn sync_primary<B: BehaviorSink>(&mut self, behavior: &mut B) {
        let primary = self.tracking.primary_target().map(|t| t.id);
        if primary == self.last_primary {
            return;
        }
        let result = match primary {
            Some(id) => behavior.set_target(id),
            None => behavior.clear_target(),
        };
        if let Err(err) = result {
            warn!(%err, "target designation callback failed");
            return;
        }
        self.last_primary = primary;
    }

    fn scan_frequency(&self) -> f32 {
        let scan = &self.config.scan;
        let blend = match self.alert.level() {
            AlertLevel::Unaware => 0.0,
            AlertLevel::Suspicious => BLEND_SUSPICIOUS,
            AlertLevel::Investigating => BLEND_INVESTIGATING,
            AlertLevel::Searching => BLEND_SEARCHING,
            AlertLevel::Alert => 1.0,
        };
        scan.base_scan_hz + (scan.alert_scan_hz - scan.base_scan_hz) * blend
    }

    /// Distance-banded LOD multiplier, 1.0 near descending to 0.4 far.
    fn lod_multiplier(&self, distance: f32) -> f32 {
        let scan = &self.config.scan;
        if !scan.lod_enabled {
            return 1.0;
        }
        let normalized = (distance / self.config.detection.max_detection_range).clamp(0.0, 1.0);
        let level = (4.0 - normalized * 2.0 * scan.lod_distance_multiplier).clamp(0.0, 4.0);
        match level.floor() as i32 {
            4 => 1.0,
            3 => 0.8,
            2 => 0.6,
            _ => 0.4,
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Current alert level.
    #[must_use]
    pub fn alert_level(&self) -> AlertLevel {
        self.alert.level()
    }

    /// Current alert intensity in [0, 1].
    #[must_use]
    pub fn alert_intensity(&self) -> f32 {
        self.alert.intensity()
    }

    /// Targets currently above the detection threshold.
    #[must_use]
    pub fn detected_targets(&self) -> &[DetectedTarget] {
        &self.detected
    }

    /// The tracked target the NPC should act on, if any.
    #[must_use]
    pub fn primary_target(&self) -> Option<&TrackedTarget> {
        self.tracking.primary_target()
    }

    /// Memory-backed position prediction for the entity.
    #[must_use]
    pub fn predicted_position(&self, id: EntityId) -> Option<Vec3> {
        self.memory
            .predicted_position(id, self.config.memory.prediction_horizon, self.clock)
    }

    /// Most recently remembered position of the entity.
    #[must_use]
    pub fn last_known_position(&self, id: EntityId) -> Option<Vec3> {
        self.memory.last_known_position(id)
    }

    /// Remembered confidence for the entity; 0 when forgotten.
    #[must_use]
    pub fn memory_confidence(&self, id: EntityId) -> f32 {
        self.memory.confidence_of(id)
    }

    /// On-demand range + cone + occlusion check, independent of the scan
    /// schedule. Does not touch detection state.
    #[must_use]
    pub fn can_see<S: SceneQuery>(&self, scene: &S, id: EntityId) -> bool {
        let Some(observer) = scene.pose(self.id) else { return false };
        let Some(target) = scene.pose(id) else { return false };

        let to_target = target.position - observer.position;
        if to_target.length() > self.config.detection.max_detection_range {
            return false;
        }
        let half_fov = self.config.detection.field_of_view_deg / 2.0;
        if angle_between_deg(observer.forward, to_target) > half_fov {
            return false;
        }
        !scene.raycast(observer.position, target.position)
    }

    /// Force full alert at the given position.
    pub fn trigger_max_alert(&mut self, position: Vec3) {
        self.alert.trigger_max_alert(position);
    }

    /// Clear all detection, memory, tracking and alert state.
    pub fn reset(&mut self) {
        while let Some(record) = self.detected.pop() {
            if self.config.scan.use_pool {
                self.pool.release(record);
            }
        }
        self.candidates.clear();
        self.alert.reset();
        self.memory.clear();
        self.tracking.clear();
        self.phase = ScanPhase::Waiting { until: self.clock };
        self.last_primary = None;
    }

    /// Pipeline counters for diagnostics.
    #[must_use]
    pub fn stats(&self) -> SensorStats {
        SensorStats {
            active_targets: self.detected.len(),
            potential_targets: self.candidates.len(),
            pooled_targets: self.pool.idle_count(),
            culled_targets: self.culled_last_pass,
            scan_frequency: self.scan_frequency(),
        }
    }

    /// Notification delivery counters.
    #[must_use]
    pub fn event_stats(&self) -> EventStats {
        self.events.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const OBSERVER: EntityId = EntityId(100);

    struct StubScene {
        poses: HashMap<EntityId, Pose>,
        blocked: bool,
        light: f32,
    }

    impl StubScene {
        fn new() -> Self {
            let mut poses = HashMap::new();
            poses.insert(
                OBSERVER,
                Pose::stationary(Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0)),
            );
            Self { poses, blocked: false, light: 1.0 }
        }

        fn place(&mut self, id: EntityId, position: Vec3) {
            self.poses
                .insert(id, Pose::stationary(position, Vec3::new(0.0, 0.0, -1.0)));
        }
    }

    impl SceneQuery for StubScene {
        fn overlap_sphere(&self, center: Vec3, radius: f32, _mask: u32) -> Vec<EntityId> {
            let mut ids: Vec<EntityId> = self
                .poses
                .iter()
                .filter(|(_, pose)| pose.position.distance(center) <= radius)
                .map(|(id, _)| *id)
                .collect();
            ids.sort_by_key(|id| id.0);
            ids
        }
        fn raycast(&self, _from: Vec3, _to: Vec3) -> bool {
            self.blocked
        }
        fn pose(&self, id: EntityId) -> Option<Pose> {
            self.poses.get(&id).copied()
        }
        fn light_level(&self, _position: Vec3) -> f32 {
            self.light
        }
    }

    #[derive(Default)]
    struct StubBehavior {
        target: Option<EntityId>,
        sightings: usize,
        suspicion: f32,
        fail: bool,
    }

    impl BehaviorSink for StubBehavior {
        fn set_target(&mut self, id: EntityId) -> Result<()> {
            if self.fail {
                return Err(VigilError::Collaborator("behavior offline".into()));
            }
            self.target = Some(id);
            Ok(())
        }
        fn clear_target(&mut self) -> Result<()> {
            self.target = None;
            Ok(())
        }
        fn on_sight_target(&mut self, _id: EntityId) -> Result<()> {
            if self.fail {
                return Err(VigilError::Collaborator("behavior offline".into()));
            }
            self.sightings += 1;
            Ok(())
        }
        fn increase_suspicion(&mut self, intensity: f32) -> Result<()> {
            self.suspicion += intensity;
            Ok(())
        }
        fn set_last_known_position(&mut self, _position: Vec3) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recorder {
        received: Vec<Notification>,
    }

    impl NotificationChannel for Recorder {
        fn raise(&mut self, notification: Notification) {
            self.received.push(notification);
        }
    }

    fn sensor() -> VisualSensor {
        VisualSensor::new(OBSERVER, SensorConfig::default())
    }

    fn advance_for(
        sensor: &mut VisualSensor,
        scene: &StubScene,
        behavior: &mut StubBehavior,
        channel: &mut Recorder,
        seconds: f32,
    ) {
        let steps = (seconds / 0.05).round() as usize;
        for _ in 0..steps {
            sensor
                .advance(0.05, scene, behavior, channel)
                .expect("advance");
        }
    }

    #[test]
    fn visible_candidate_becomes_detected_target() {
        let mut scene = StubScene::new();
        scene.place(EntityId(1), Vec3::new(0.0, 0.0, 5.0));
        let mut sensor = sensor();
        let mut behavior = StubBehavior::default();
        let mut channel = Recorder::default();

        advance_for(&mut sensor, &scene, &mut behavior, &mut channel, 1.0);

        assert_eq!(sensor.detected_targets().len(), 1);
        assert_eq!(sensor.detected_targets()[0].id, EntityId(1));
        assert!(behavior.sightings > 0);
        assert!(sensor.alert_intensity() > 0.0);
        assert!(sensor.memory_confidence(EntityId(1)) > 0.0);
        assert!(channel
            .received
            .iter()
            .any(|n| matches!(n, Notification::TargetSpotted { id, .. } if *id == EntityId(1))));
    }

    #[test]
    fn candidate_behind_observer_stays_undetected() {
        let mut scene = StubScene::new();
        scene.place(EntityId(1), Vec3::new(0.0, 0.0, -5.0));
        let mut sensor = sensor();
        let mut behavior = StubBehavior::default();
        let mut channel = Recorder::default();

        advance_for(&mut sensor, &scene, &mut behavior, &mut channel, 1.0);

        assert!(sensor.detected_targets().is_empty());
        assert_eq!(behavior.sightings, 0);
        assert_eq!(sensor.alert_intensity(), 0.0);
    }

    #[test]
    fn occluded_candidate_stays_undetected() {
        let mut scene = StubScene::new();
        scene.place(EntityId(1), Vec3::new(0.0, 0.0, 5.0));
        scene.blocked = true;
        let mut sensor = sensor();
        let mut behavior = StubBehavior::default();
        let mut channel = Recorder::default();

        advance_for(&mut sensor, &scene, &mut behavior, &mut channel, 1.0);
        assert!(sensor.detected_targets().is_empty());
    }

    #[test]
    fn sustained_detection_escalates_alert_level() {
        let mut scene = StubScene::new();
        scene.place(EntityId(1), Vec3::new(0.0, 0.0, 3.0));
        let mut sensor = sensor();
        let mut behavior = StubBehavior::default();
        let mut channel = Recorder::default();

        advance_for(&mut sensor, &scene, &mut behavior, &mut channel, 3.0);

        assert!(sensor.alert_level() >= AlertLevel::Investigating);
        assert!(channel
            .received
            .iter()
            .any(|n| matches!(n, Notification::AlertChanged(_))));
    }

    #[test]
    fn vanished_target_is_lost_and_pooled() {
        let mut scene = StubScene::new();
        scene.place(EntityId(1), Vec3::new(0.0, 0.0, 5.0));
        let mut sensor = sensor();
        let mut behavior = StubBehavior::default();
        let mut channel = Recorder::default();

        advance_for(&mut sensor, &scene, &mut behavior, &mut channel, 1.0);
        assert_eq!(sensor.detected_targets().len(), 1);
        let pooled_before = sensor.stats().pooled_targets;

        // target steps behind the observer: still a candidate, score drops
        scene.place(EntityId(1), Vec3::new(0.0, 0.0, -5.0));
        advance_for(&mut sensor, &scene, &mut behavior, &mut channel, 1.0);

        assert!(sensor.detected_targets().is_empty());
        assert!(sensor.stats().pooled_targets > pooled_before);
        assert!(channel
            .received
            .iter()
            .any(|n| matches!(n, Notification::TargetLost { id, .. } if *id == EntityId(1))));
    }

    #[test]
    fn memory_outlives_sight() {
        let mut scene = StubScene::new();
        let spot = Vec3::new(0.0, 0.0, 5.0);
        scene.place(EntityId(1), spot);
        let mut sensor = sensor();
        let mut behavior = StubBehavior::default();
        let mut channel = Recorder::default();

        advance_for(&mut sensor, &scene, &mut behavior, &mut channel, 1.0);
        scene.poses.remove(&EntityId(1));
        advance_for(&mut sensor, &scene, &mut behavior, &mut channel, 1.0);

        assert!(sensor.detected_targets().is_empty());
        assert!(sensor.memory_confidence(EntityId(1)) > 0.0);
        assert_eq!(sensor.last_known_position(EntityId(1)), Some(spot));
    }

    #[test]
    fn departed_entity_is_released_after_the_pass() {
        let mut scene = StubScene::new();
        scene.place(EntityId(1), Vec3::new(0.0, 0.0, 5.0));
        let mut sensor = sensor();
        let mut behavior = StubBehavior::default();
        let mut channel = Recorder::default();

        advance_for(&mut sensor, &scene, &mut behavior, &mut channel, 1.0);
        assert_eq!(sensor.detected_targets().len(), 1);

        // the entity disappears entirely: the next culling pass drops it
        // from the working set, and the pass-end reconciliation releases it
        scene.poses.remove(&EntityId(1));
        advance_for(&mut sensor, &scene, &mut behavior, &mut channel, 1.0);

        assert!(sensor.detected_targets().is_empty());
        assert!(channel
            .received
            .iter()
            .any(|n| matches!(n, Notification::TargetLost { id, .. } if *id == EntityId(1))));
    }

    #[test]
    fn escalation_past_suspicious_reports_suspicious_activity() {
        let mut scene = StubScene::new();
        scene.place(EntityId(1), Vec3::new(0.0, 0.0, 3.0));
        let mut sensor = sensor();
        let mut behavior = StubBehavior::default();
        let mut channel = Recorder::default();

        advance_for(&mut sensor, &scene, &mut behavior, &mut channel, 3.0);

        assert!(sensor.alert_level() >= AlertLevel::Investigating);
        assert!(channel.received.iter().any(|n| matches!(
            n,
            Notification::SuspiciousActivity { id, intensity, .. }
                if *id == EntityId(1) && *intensity > 0.0
        )));
    }

    #[test]
    fn capacity_evicts_oldest_target_first() {
        let mut scene = StubScene::new();
        // six candidates ahead, cap is five
        for i in 0..6 {
            scene.place(EntityId(i), Vec3::new(i as f32 - 2.5, 0.0, 4.0));
        }
        let mut sensor = sensor();
        let mut behavior = StubBehavior::default();
        let mut channel = Recorder::default();

        advance_for(&mut sensor, &scene, &mut behavior, &mut channel, 2.0);

        assert!(sensor.detected_targets().len() <= 5);
    }

    #[test]
    fn primary_target_is_designated_to_behavior() {
        let mut scene = StubScene::new();
        scene.place(EntityId(1), Vec3::new(0.0, 0.0, 3.0));
        let mut sensor = sensor();
        let mut behavior = StubBehavior::default();
        let mut channel = Recorder::default();

        advance_for(&mut sensor, &scene, &mut behavior, &mut channel, 3.0);

        assert_eq!(sensor.primary_target().map(|t| t.id), Some(EntityId(1)));
        assert_eq!(behavior.target, Some(EntityId(1)));
    }

    #[test]
    fn behavior_failures_do_not_abort_the_tick() {
        let mut scene = StubScene::new();
        scene.place(EntityId(1), Vec3::new(0.0, 0.0, 3.0));
        let mut sensor = sensor();
        let mut behavior = StubBehavior { fail: true, ..StubBehavior::default() };
        let mut channel = Recorder::default();

        advance_for(&mut sensor, &scene, &mut behavior, &mut channel, 1.0);
        assert_eq!(sensor.detected_targets().len(), 1);
    }

    #[test]
    fn missing_observer_pose_is_an_error() {
        let scene = StubScene { poses: HashMap::new(), blocked: false, light: 1.0 };
        let mut sensor = sensor();
        let mut behavior = StubBehavior::default();
        let mut channel = Recorder::default();

        let result = sensor.advance(0.05, &scene, &mut behavior, &mut channel);
        assert!(matches!(result, Err(VigilError::Collaborator(_))));
    }

    #[test]
    fn can_see_checks_range_cone_and_occlusion() {
        let mut scene = StubScene::new();
        scene.place(EntityId(1), Vec3::new(0.0, 0.0, 5.0));
        scene.place(EntityId(2), Vec3::new(0.0, 0.0, -5.0));
        scene.place(EntityId(3), Vec3::new(0.0, 0.0, 50.0));
        let sensor = sensor();

        assert!(sensor.can_see(&scene, EntityId(1)));
        assert!(!sensor.can_see(&scene, EntityId(2)));
        assert!(!sensor.can_see(&scene, EntityId(3)));

        scene.blocked = true;
        assert!(!sensor.can_see(&scene, EntityId(1)));
    }

    #[test]
    fn scan_frequency_rises_with_alert_level() {
        let mut sensor = sensor();
        let calm = sensor.stats().scan_frequency;
        sensor.trigger_max_alert(Vec3::ZERO);
        let alerted = sensor.stats().scan_frequency;
        assert!(alerted > calm);
        assert!((calm - 15.0).abs() < f32::EPSILON);
        assert!((alerted - 20.0).abs() < f32::EPSILON);
    }

    #[test]
    fn reset_clears_pipeline_state() {
        let mut scene = StubScene::new();
        scene.place(EntityId(1), Vec3::new(0.0, 0.0, 3.0));
        let mut sensor = sensor();
        let mut behavior = StubBehavior::default();
        let mut channel = Recorder::default();

        advance_for(&mut sensor, &scene, &mut behavior, &mut channel, 2.0);
        sensor.reset();

        assert!(sensor.detected_targets().is_empty());
        assert_eq!(sensor.alert_level(), AlertLevel::Unaware);
        assert_eq!(sensor.alert_intensity(), 0.0);
        assert_eq!(sensor.memory_confidence(EntityId(1)), 0.0);
        assert!(sensor.primary_target().is_none());
    }
}
