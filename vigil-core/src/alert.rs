//! Hysteretic alert state machine.
//!
//! An intensity accumulator in [0, 1] drives the level upward through three
//! configured thresholds; coming back down requires the accumulator to drain
//! after a calm-down period with no detections — there is no instantaneous
//! drop.
//! Two forced forward transitions run on timers: Investigating advances to
//! Searching when the investigation times out, and Searching starts
//! auto-decay when the search times out. Searching holds its level against
//! decay until that timer fires. Alert never auto-decays; only a reset or an
//! explicitly started decay brings an NPC back from full alert.

use crate::config::AlertConfig;
use crate::types::{AlertLevel, AlertSnapshot};
use glam::Vec3;
use tracing::debug;

/// Alert state machine module. One instance per sensor.
#[derive(Debug)]
pub struct AlertSystemModule {
    config: AlertConfig,
    level: AlertLevel,
    previous_level: AlertLevel,
    intensity: f32,
    time_in_level: f32,
    time_since_detection: f32,
    auto_decaying: bool,
    investigation_point: Option<Vec3>,
    transitions: Vec<AlertSnapshot>,
}

impl AlertSystemModule {
    /// Build the module from alert configuration.
    #[must_use]
    pub fn new(config: &AlertConfig) -> Self {
        Self {
            config: config.clone(),
            level: AlertLevel::Unaware,
            previous_level: AlertLevel::Unaware,
            intensity: 0.0,
            time_in_level: 0.0,
            time_since_detection: 0.0,
            auto_decaying: false,
            investigation_point: None,
            transitions: Vec::new(),
        }
    }

    /// Current alert level.
    #[must_use]
    pub fn level(&self) -> AlertLevel {
        self.level
    }

    /// Level before the most recent transition.
    #[must_use]
    pub fn previous_level(&self) -> AlertLevel {
        self.previous_level
    }

    /// Current intensity in [0, 1].
    #[must_use]
    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    /// Seconds spent in the current level.
    #[must_use]
    pub fn time_in_level(&self) -> f32 {
        self.time_in_level
    }

    /// Whether the intensity accumulator is draining.
    #[must_use]
    pub fn is_auto_decaying(&self) -> bool {
        self.auto_decaying
    }

    /// Where the most recent escalating detection happened.
    #[must_use]
    pub fn investigation_point(&self) -> Option<Vec3> {
        self.investigation_point
    }

    /// Record an above-threshold detection: resets the idle timer, cancels
    /// auto-decay, accumulates `score × dt` into the intensity and
    /// re-evaluates the level against the thresholds.
    pub fn record_detection(&mut self, score: f32, dt: f32, position: Vec3) {
        self.time_since_detection = 0.0;
        self.auto_decaying = false;

        self.intensity = (self.intensity + score * dt).clamp(0.0, 1.0);

        let new_level = self.level_for_intensity();
        if new_level != self.level {
            self.transition_to(new_level, Some(position));
        }
    }

    /// Per-tick update: advances timers, drains intensity when auto-decay is
    /// active and the calm-down time has elapsed, and runs the level timers.
    pub fn update(&mut self, dt: f32) {
        self.time_in_level += dt;
        self.time_since_detection += dt;

        // Below full alert, idling past the calm-down time is enough to
        // start draining. Searching holds until its own timer fires, and
        // Alert drains only when explicitly told to.
        let draining = self.auto_decaying
            || (self.level < AlertLevel::Alert && self.level != AlertLevel::Searching);
        if draining && self.time_since_detection >= self.config.calm_down_time {
            self.decay_intensity(dt);
            self.check_level_decrease();
        }

        match self.level {
            AlertLevel::Investigating => {
                if self.time_in_level >= self.config.investigation_time {
                    self.transition_to(AlertLevel::Searching, self.investigation_point);
                }
            }
            AlertLevel::Searching => {
                if self.time_in_level >= self.config.search_time {
                    self.start_auto_decay();
                }
            }
            // Alert only comes down via reset or an explicitly started decay.
            _ => {}
        }
    }

    /// Begin draining intensity once the calm-down time elapses.
    pub fn start_auto_decay(&mut self) {
        self.auto_decaying = true;
    }

    /// Cancel draining and restart the idle timer.
    pub fn stop_auto_decay(&mut self) {
        self.auto_decaying = false;
        self.time_since_detection = 0.0;
    }

    /// Force full alert at the given position.
    pub fn trigger_max_alert(&mut self, position: Vec3) {
        self.intensity = 1.0;
        if self.level != AlertLevel::Alert {
            self.transition_to(AlertLevel::Alert, Some(position));
        }
    }

    /// Return to Unaware with zero intensity.
    pub fn reset(&mut self) {
        if self.level != AlertLevel::Unaware {
            self.transition_to(AlertLevel::Unaware, None);
        }
        self.intensity = 0.0;
        self.auto_decaying = false;
        self.time_since_detection = 0.0;
        self.investigation_point = None;
    }

    /// Drain the transitions recorded since the last call.
    pub fn take_transitions(&mut self) -> Vec<AlertSnapshot> {
        std::mem::take(&mut self.transitions)
    }

    fn decay_intensity(&mut self, dt: f32) {
        if self.intensity > 0.0 {
            self.intensity = (self.intensity - self.config.decay_rate * dt).max(0.0);
        }
    }

    /// Intensity maps only onto the threshold-driven levels; Searching is
    /// reachable solely via the investigation timeout.
    fn level_for_intensity(&self) -> AlertLevel {
        if self.intensity >= self.config.alert_threshold {
            AlertLevel::Alert
        } else if self.intensity >= self.config.investigating_threshold {
            AlertLevel::Investigating
        } else if self.intensity >= self.config.suspicious_threshold {
            AlertLevel::Suspicious
        } else {
            AlertLevel::Unaware
        }
    }

    /// Decay moves the level downward only; it never skips upward.
    fn check_level_decrease(&mut self) {
        let new_level = self.level_for_intensity();
        if new_level < self.level {
            self.transition_to(new_level, None);
        }
    }

    fn transition_to(&mut self, new_level: AlertLevel, point: Option<Vec3>) {
        self.previous_level = self.level;
        self.level = new_level;
        self.time_in_level = 0.0;
        if point.is_some() {
            self.investigation_point = point;
        }

        let snapshot = AlertSnapshot {
            level: self.level,
            previous_level: self.previous_level,
            time_in_level: 0.0,
            investigation_point: self.investigation_point,
            is_global_alert: self.level.is_global_alert(),
        };
        self.transitions.push(snapshot);

        debug!(
            from = %self.previous_level,
            to = %self.level,
            intensity = self.intensity,
            "alert level changed"
        );
    }
}
