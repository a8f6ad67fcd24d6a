//! Outward notification throttling.
//!
//! Every notification carries a [`EventKey`] identifying what it is about.
//! Raising the same key again inside the cooldown window suppresses the
//! event (counted, never delivered). Non-suppressed events are delivered
//! immediately when buffering is off, otherwise queued into a bounded
//! buffer that flushes on a fixed interval or when full.

use crate::config::EventConfig;
use crate::types::{AlertSnapshot, EntityId, EventStats};
use crate::world::NotificationChannel;
use glam::Vec3;
use std::collections::HashMap;
use std::collections::VecDeque;
use tracing::trace;

/// Notification payload delivered through a [`NotificationChannel`].
///
/// Target payloads are enriched with the sensor state at raise time so
/// consumers never have to query the sensor back.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// A candidate crossed the detection threshold.
    TargetSpotted {
        /// The spotted entity.
        id: EntityId,
        /// Where it was seen.
        position: Vec3,
        /// Its detection score.
        score: f32,
        /// Simultaneously detected targets at raise time.
        active_targets: usize,
    },
    /// A previously detected target dropped below the threshold.
    TargetLost {
        /// The lost entity.
        id: EntityId,
        /// Where it was last seen.
        last_known_position: Vec3,
        /// Simultaneously detected targets at raise time.
        active_targets: usize,
    },
    /// The alert level changed.
    AlertChanged(AlertSnapshot),
    /// A target stayed suspicious long enough to warrant attention.
    SuspiciousActivity {
        /// The suspicious entity.
        id: EntityId,
        /// Where the activity happened.
        position: Vec3,
        /// Alert intensity at raise time.
        intensity: f32,
    },
}

impl Notification {
    /// The throttling key for this notification.
    #[must_use]
    pub fn key(&self) -> EventKey {
        match self {
            Self::TargetSpotted { id, .. } => EventKey::TargetSpotted(*id),
            Self::TargetLost { id, .. } => EventKey::TargetLost(*id),
            Self::AlertChanged(snapshot) => EventKey::AlertChanged(snapshot.level as u8),
            Self::SuspiciousActivity { id, .. } => EventKey::SuspiciousActivity(*id),
        }
    }
}

/// Per-key cooldown identity. Two notifications with the same key inside
/// one cooldown window collapse to the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKey {
    /// Keyed per spotted entity.
    TargetSpotted(EntityId),
    /// Keyed per lost entity.
    TargetLost(EntityId),
    /// Keyed per destination level.
    AlertChanged(u8),
    /// Keyed per suspicious entity.
    SuspiciousActivity(EntityId),
}

/// Notification throttler and buffer. One instance per sensor.
#[derive(Debug)]
pub struct VisualSensorEventManager {
    config: EventConfig,
    last_sent: HashMap<EventKey, f32>,
    buffer: VecDeque<Notification>,
    since_flush: f32,
    sent: u64,
    suppressed: u64,
}

impl VisualSensorEventManager {
    /// Build the manager from event configuration.
    #[must_use]
    pub fn new(config: &EventConfig) -> Self {
        Self {
            config: config.clone(),
            last_sent: HashMap::new(),
            buffer: VecDeque::with_capacity(config.max_buffer_size),
            since_flush: 0.0,
            sent: 0,
            suppressed: 0,
        }
    }

    /// Raise a notification. Suppressed if its key fired inside the
    /// cooldown window; otherwise delivered or buffered.
    pub fn raise<C: NotificationChannel>(&mut self, notification: Notification, now: f32, channel: &mut C) {
        let key = notification.key();
        if let Some(&last) = self.last_sent.get(&key) {
            if now - last < self.config.cooldown {
                self.suppressed += 1;
                trace!(?key, "notification suppressed");
                return;
            }
        }
        self.last_sent.insert(key, now);

        if !self.config.buffer_events {
            self.deliver(notification, channel);
            return;
        }

        self.buffer.push_back(notification);
        if self.buffer.len() >= self.config.max_buffer_size {
            self.flush(channel);
        }
    }

    /// Per-tick update: flushes the buffer on the configured interval.
    pub fn update<C: NotificationChannel>(&mut self, dt: f32, channel: &mut C) {
        self.since_flush += dt;
        if self.since_flush >= self.config.flush_interval {
            self.flush(channel);
        }
    }

    /// Deliver everything currently buffered.
    pub fn flush<C: NotificationChannel>(&mut self, channel: &mut C) {
        self.since_flush = 0.0;
        while let Some(notification) = self.buffer.pop_front() {
            self.deliver(notification, channel);
        }
    }

    /// Delivery counters for diagnostics.
    #[must_use]
    pub fn stats(&self) -> EventStats {
        EventStats {
            buffered: self.buffer.len(),
            sent: self.sent,
            suppressed: self.suppressed,
        }
    }

    fn deliver<C: NotificationChannel>(&mut self, notification: Notification, channel: &mut C) {
        channel.raise(notification);
        self.sent += 1;
    }
}
