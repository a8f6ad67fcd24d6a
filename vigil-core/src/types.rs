//! Core type definitions for the vigil perception pipeline.
//!
//! All timers in the pipeline are measured in simulation seconds accumulated
//! from the host's `advance(dt)` calls, never wall-clock time, so pausing
//! the host loop pauses every timer uniformly.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Opaque identifier for an entity owned by the external scene framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Alert levels
// ---------------------------------------------------------------------------

/// NPC vigilance level, totally ordered from calm to hostile.
///
/// `Searching` is reached only via the investigation timeout inside the alert
/// state machine, never directly from an intensity threshold. `Alert` is
/// reached from intensity crossing the top threshold or from an explicit
/// max-alert trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AlertLevel {
    /// Normal patrol, nothing noticed.
    Unaware = 0,
    /// Something felt off.
    Suspicious = 1,
    /// Actively checking a disturbance.
    Investigating = 2,
    /// Lost the trail, sweeping the area.
    Searching = 3,
    /// Target confirmed, engaged.
    Alert = 4,
}

impl AlertLevel {
    /// Whether this level counts as a global (NPC-wide) alert.
    #[must_use]
    pub fn is_global_alert(self) -> bool {
        self >= Self::Alert
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unaware => "Unaware",
            Self::Suspicious => "Suspicious",
            Self::Investigating => "Investigating",
            Self::Searching => "Searching",
            Self::Alert => "Alert",
        };
        write!(f, "{name}")
    }
}

/// Snapshot of the alert state machine attached to a level transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertSnapshot {
    /// Level after the transition.
    pub level: AlertLevel,
    /// Level before the transition.
    pub previous_level: AlertLevel,
    /// Seconds spent in the new level (zero at transition time).
    pub time_in_level: f32,
    /// Where the triggering detection happened, if any.
    pub investigation_point: Option<Vec3>,
    /// Whether the new level is a global alert.
    pub is_global_alert: bool,
}

// ---------------------------------------------------------------------------
// Poses & memory categories
// ---------------------------------------------------------------------------

/// Per-entity pose as reported by the external pose accessor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// World position.
    pub position: Vec3,
    /// Unit facing direction.
    pub forward: Vec3,
    /// Current velocity.
    pub velocity: Vec3,
}

impl Pose {
    /// A stationary pose at `position` facing `forward`.
    #[must_use]
    pub fn stationary(position: Vec3, forward: Vec3) -> Self {
        Self {
            position,
            forward,
            velocity: Vec3::ZERO,
        }
    }
}

/// Which sense produced a memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryKind {
    /// Direct sighting.
    Visual,
    /// Heard, not seen.
    Auditory,
    /// Found during an investigation sweep.
    Investigation,
    /// Reported by another NPC.
    Communication,
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Runtime counters exposed by the sensor for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorStats {
    /// Targets currently above the detection threshold.
    pub active_targets: usize,
    /// Candidates in the current working set.
    pub potential_targets: usize,
    /// Idle records waiting in the reuse pool.
    pub pooled_targets: usize,
    /// Candidates dropped by the last culling pass.
    pub culled_targets: usize,
    /// Scan frequency currently in effect, in Hz.
    pub scan_frequency: f32,
}

/// Counters exposed by the event manager.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EventStats {
    /// Notifications currently waiting in the buffer.
    pub buffered: usize,
    /// Notifications delivered since startup.
    pub sent: u64,
    /// Notifications dropped by per-key cooldowns.
    pub suppressed: u64,
}
