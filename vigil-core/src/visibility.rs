//! Geometric and lighting visibility scoring.
//!
//! The base model is:
//!
//! ```text
//! visibility = occluded ? 0 : distance_factor × light_factor
//! distance_factor = 1 - clamp01(distance / max_range)
//! light_factor   = clamp01(ambient + point-light contributions)
//! ```
//!
//! The auxiliary scores (angle, movement, cover) are pure functions so the
//! composite [`total_detection_score`] can be evaluated without touching the
//! scene. Any factor reaching zero short-circuits the composite to zero.

use crate::config::DetectionConfig;
use crate::world::SceneQuery;
use glam::Vec3;

/// Weight of the base visibility term in the composite score.
const VISIBILITY_WEIGHT: f32 = 0.3;
/// Weight of the view-angle term.
const ANGLE_WEIGHT: f32 = 0.3;
/// Weight of the target-movement term.
const MOVEMENT_WEIGHT: f32 = 0.2;
/// Weight of the cover/stance term.
const COVER_WEIGHT: f32 = 0.2;

/// Stateless visibility calculator parameterized by detection config.
#[derive(Debug, Clone)]
pub struct VisibilityCalculator {
    max_range: f32,
    ambient_light: f32,
}

impl VisibilityCalculator {
    /// Build a calculator from the detection configuration.
    #[must_use]
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            max_range: config.max_detection_range,
            ambient_light: config.ambient_light,
        }
    }

    /// Visibility of `target` from `observer`, in [0, 1].
    ///
    /// Zero whenever the scene reports an opaque obstruction between the two
    /// points; otherwise distance falloff scaled by the light level at the
    /// target.
    #[must_use]
    pub fn visibility<S: SceneQuery>(&self, scene: &S, observer: Vec3, target: Vec3) -> f32 {
        if scene.raycast(observer, target) {
            return 0.0;
        }

        let distance = observer.distance(target);
        let distance_factor = 1.0 - (distance / self.max_range).clamp(0.0, 1.0);
        let light_factor = (self.ambient_light + scene.light_level(target)).clamp(0.0, 1.0);

        distance_factor * light_factor
    }
}

/// View-angle score with linear falloff to zero at the cone edge.
///
/// `max_angle_deg` is the half-angle of the vision cone. A target dead ahead
/// scores 1.0; one on the cone edge scores 0.0; outside the cone, 0.0.
#[must_use]
pub fn angle_score(observer_forward: Vec3, dir_to_target: Vec3, max_angle_deg: f32) -> f32 {
    if max_angle_deg <= 0.0 {
        return 0.0;
    }
    let angle = angle_between_deg(observer_forward, dir_to_target);
    if angle > max_angle_deg {
        return 0.0;
    }
    1.0 - angle / max_angle_deg
}

/// Movement score: faster targets are easier to notice.
#[must_use]
pub fn movement_score(velocity: Vec3, max_detectable_speed: f32) -> f32 {
    if max_detectable_speed <= 0.0 {
        return 0.0;
    }
    (velocity.length() / max_detectable_speed).clamp(0.0, 1.0)
}

/// Cover/stance multiplier: hard cover 0.3, crouching 0.6, exposed 1.0.
#[must_use]
pub fn cover_score(in_cover: bool, crouching: bool) -> f32 {
    if in_cover {
        0.3
    } else if crouching {
        0.6
    } else {
        1.0
    }
}

/// Composite detection score weighting visibility, angle, movement and
/// cover. Any factor at zero short-circuits the whole score to zero —
/// a fully occluded or fully out-of-cone target is never "slightly seen".
#[must_use]
pub fn total_detection_score(visibility: f32, angle: f32, movement: f32, cover: f32) -> f32 {
    if visibility <= 0.0 || angle <= 0.0 || movement <= 0.0 || cover <= 0.0 {
        return 0.0;
    }
    let score = visibility * VISIBILITY_WEIGHT
        + angle * ANGLE_WEIGHT
        + movement * MOVEMENT_WEIGHT
        + cover * COVER_WEIGHT;
    score.clamp(0.0, 1.0)
}

/// Angle between two directions in degrees. Zero-length inputs count as
/// fully misaligned rather than panicking.
#[must_use]
pub fn angle_between_deg(a: Vec3, b: Vec3) -> f32 {
    let denom = a.length() * b.length();
    if denom <= f32::EPSILON {
        return 180.0;
    }
    let cos = (a.dot(b) / denom).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}
