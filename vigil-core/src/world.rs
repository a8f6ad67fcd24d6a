//! External collaborator interfaces.
//!
//! The pipeline never owns scene geometry, behavior trees, or event wiring.
//! It consumes them through these three narrow contracts, all passed by
//! reference into [`crate::sensor::VisualSensor::advance`] each tick.

use crate::error::Result;
use crate::events::Notification;
use crate::types::{EntityId, Pose};
use glam::Vec3;

/// Spatial and pose queries answered by the external scene framework.
pub trait SceneQuery {
    /// Entities whose bounds intersect the sphere, filtered by `mask`.
    fn overlap_sphere(&self, center: Vec3, radius: f32, mask: u32) -> Vec<EntityId>;

    /// Whether an opaque obstruction lies between `from` and `to`.
    fn raycast(&self, from: Vec3, to: Vec3) -> bool;

    /// Current pose of an entity, or `None` if it no longer exists.
    fn pose(&self, id: EntityId) -> Option<Pose>;

    /// Combined ambient and point-light level at a position, clamped to
    /// [0, 1]. Implementations without lighting may return a constant.
    fn light_level(&self, position: Vec3) -> f32;
}

/// One-way commands into the external behavior state machine.
///
/// A failing callback is logged by the sensor and treated as a failed
/// interaction for that tick only; it never aborts the scan loop.
pub trait BehaviorSink {
    /// Designate the entity the NPC should act on.
    fn set_target(&mut self, id: EntityId) -> Result<()>;

    /// Drop the current target designation.
    fn clear_target(&mut self) -> Result<()>;

    /// A candidate was sighted this tick.
    fn on_sight_target(&mut self, id: EntityId) -> Result<()>;

    /// Raise the behavior layer's suspicion by the given intensity.
    fn increase_suspicion(&mut self, intensity: f32) -> Result<()>;

    /// Update the behavior layer's last-known-position hint.
    fn set_last_known_position(&mut self, position: Vec3) -> Result<()>;
}

/// Fire-and-forget notification channel to the rest of the game.
pub trait NotificationChannel {
    /// Deliver a notification. Delivery failures are the channel's problem.
    fn raise(&mut self, notification: Notification);
}
