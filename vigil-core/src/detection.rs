//! Multi-factor visual detection scoring.
//!
//! Combines four independently weighted factors — distance, view angle,
//! occlusion and light — into one detection score per candidate, then
//! applies gameplay threshold adjustments (instant detection up close, a
//! boost inside the optimal cone, and a noise floor).

use crate::config::{CurvePoint, DetectionConfig};
use crate::types::Pose;
use crate::visibility::{angle_between_deg, VisibilityCalculator};
use crate::world::SceneQuery;
use glam::Vec3;

/// Each factor contributes a quarter of the weighted base score.
const FACTOR_WEIGHT: f32 = 0.25;
/// Score floor applied inside the instant-detection radius.
const INSTANT_DETECTION_SCORE: f32 = 0.9;
/// Multiplicative boost inside the optimal-angle cone.
const OPTIMAL_ANGLE_BOOST: f32 = 1.2;
/// Floor that keeps total darkness from fully hiding a target.
const DARKNESS_LIGHT_FLOOR: f32 = 0.3;
/// Angle-factor floor retained at the cone edge.
const EDGE_ANGLE_RETENTION: f32 = 0.2;

/// Per-factor breakdown of a detection score, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreBreakdown {
    /// Distance falloff factor.
    pub distance: f32,
    /// View-angle factor.
    pub angle: f32,
    /// Occlusion factor.
    pub obstruction: f32,
    /// Light factor.
    pub light: f32,
    /// Final adjusted score.
    pub total: f32,
}

/// Visual detection module: scores one candidate position per call.
#[derive(Debug, Clone)]
pub struct VisualDetectionModule {
    config: DetectionConfig,
    visibility: VisibilityCalculator,
}

impl VisualDetectionModule {
    /// Build the module from detection configuration.
    #[must_use]
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            config: config.clone(),
            visibility: VisibilityCalculator::new(config),
        }
    }

    /// Detection score for a candidate at `target`, in [0, 1].
    ///
    /// Zero whenever the candidate is out of range, outside the vision
    /// cone, or occluded; none of the threshold adjustments can rescue
    /// those cases.
    #[must_use]
    pub fn detection_score<S: SceneQuery>(&self, scene: &S, observer: &Pose, target: Vec3) -> f32 {
        let distance = observer.position.distance(target);
        if distance > self.config.max_detection_range {
            return 0.0;
        }
        let angle = angle_between_deg(observer.forward, target - observer.position);
        if angle > self.config.field_of_view_deg / 2.0 {
            return 0.0;
        }
        if scene.raycast(observer.position, target) {
            return 0.0;
        }

        let base = self.weighted_base_score(scene, observer, target, distance);
        let adjusted = self.apply_threshold_adjustments(base, observer, target, distance);
        adjusted.clamp(0.0, 1.0)
    }

    /// Per-factor breakdown for the same score, for diagnostics.
    #[must_use]
    pub fn score_breakdown<S: SceneQuery>(
        &self,
        scene: &S,
        observer: &Pose,
        target: Vec3,
    ) -> ScoreBreakdown {
        ScoreBreakdown {
            distance: self.distance_factor(observer.position.distance(target)),
            angle: self.angle_factor(observer, target),
            obstruction: self.obstruction_factor(scene, observer, target),
            light: self.light_factor(scene, observer, target),
            total: self.detection_score(scene, observer, target),
        }
    }

    fn weighted_base_score<S: SceneQuery>(
        &self,
        scene: &S,
        observer: &Pose,
        target: Vec3,
        distance: f32,
    ) -> f32 {
        self.distance_factor(distance) * FACTOR_WEIGHT
            + self.angle_factor(observer, target) * FACTOR_WEIGHT
            + self.obstruction_factor(scene, observer, target) * FACTOR_WEIGHT
            + self.light_factor(scene, observer, target) * FACTOR_WEIGHT
    }

    /// Distance falloff via the configured curve, or linear when absent.
    fn distance_factor(&self, distance: f32) -> f32 {
        if distance >= self.config.max_detection_range {
            return 0.0;
        }
        let normalized = distance / self.config.max_detection_range;
        match &self.config.distance_curve {
            Some(curve) => sample_curve(curve, normalized),
            None => 1.0 - normalized,
        }
    }

    /// Angle factor normalized against the half field of view; a candidate
    /// on the cone edge still retains 20% of the factor.
    fn angle_factor(&self, observer: &Pose, target: Vec3) -> f32 {
        let half_fov = self.config.field_of_view_deg / 2.0;
        let angle = angle_between_deg(observer.forward, target - observer.position);
        if angle > half_fov {
            return 0.0;
        }
        let normalized = angle / half_fov;
        1.0 - normalized * (1.0 - EDGE_ANGLE_RETENTION)
    }

    /// Occlusion factor derived from the visibility score, rescaled so
    /// partial visibility maps to the full factor range.
    fn obstruction_factor<S: SceneQuery>(&self, scene: &S, observer: &Pose, target: Vec3) -> f32 {
        let visibility = self.visibility.visibility(scene, observer.position, target);
        (visibility * 2.0).clamp(0.0, 1.0)
    }

    /// Light factor with a darkness floor so an unlit target is dim, not
    /// invisible.
    fn light_factor<S: SceneQuery>(&self, scene: &S, observer: &Pose, target: Vec3) -> f32 {
        let visibility = self.visibility.visibility(scene, observer.position, target);
        (visibility + DARKNESS_LIGHT_FLOOR).clamp(0.0, 1.0)
    }

    fn apply_threshold_adjustments(
        &self,
        base: f32,
        observer: &Pose,
        target: Vec3,
        distance: f32,
    ) -> f32 {
        let mut score = base;

        if distance <= self.config.instant_detection_range {
            score = score.max(INSTANT_DETECTION_SCORE);
        }

        let angle = angle_between_deg(observer.forward, target - observer.position);
        if angle <= self.config.optimal_angle_deg {
            score *= OPTIMAL_ANGLE_BOOST;
        }

        // Sub-floor scores are noise, not detections.
        if score > 0.0 && score < self.config.min_visibility {
            score = 0.0;
        }

        score
    }
}

/// Sample a piecewise-linear curve at `t`, clamping outside the sampled
/// domain. Points are assumed sorted by `t`.
#[must_use]
pub fn sample_curve(points: &[CurvePoint], t: f32) -> f32 {
    match points {
        [] => 1.0 - t.clamp(0.0, 1.0),
        [only] => only.value,
        _ => {
            let first = &points[0];
            if t <= first.t {
                return first.value;
            }
            for pair in points.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                if t <= b.t {
                    let span = b.t - a.t;
                    if span <= f32::EPSILON {
                        return b.value;
                    }
                    let frac = (t - a.t) / span;
                    return a.value + (b.value - a.value) * frac;
                }
            }
            points[points.len() - 1].value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityId;

    struct OpenScene {
        light: f32,
    }

    impl SceneQuery for OpenScene {
        fn overlap_sphere(&self, _center: Vec3, _radius: f32, _mask: u32) -> Vec<EntityId> {
            Vec::new()
        }
        fn raycast(&self, _from: Vec3, _to: Vec3) -> bool {
            false
        }
        fn pose(&self, _id: EntityId) -> Option<Pose> {
            None
        }
        fn light_level(&self, _position: Vec3) -> f32 {
            self.light
        }
    }

    struct WalledScene;

    impl SceneQuery for WalledScene {
        fn overlap_sphere(&self, _center: Vec3, _radius: f32, _mask: u32) -> Vec<EntityId> {
            Vec::new()
        }
        fn raycast(&self, _from: Vec3, _to: Vec3) -> bool {
            true
        }
        fn pose(&self, _id: EntityId) -> Option<Pose> {
            None
        }
        fn light_level(&self, _position: Vec3) -> f32 {
            1.0
        }
    }

    fn module() -> VisualDetectionModule {
        VisualDetectionModule::new(&DetectionConfig::default())
    }

    fn observer() -> Pose {
        Pose::stationary(Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0))
    }

    #[test]
    fn out_of_range_scores_zero() {
        let scene = OpenScene { light: 1.0 };
        let score = module().detection_score(&scene, &observer(), Vec3::new(0.0, 0.0, 30.0));
        assert_eq!(score, 0.0);
    }

    #[test]
    fn score_is_always_in_unit_interval() {
        let scene = OpenScene { light: 1.0 };
        let m = module();
        let obs = observer();
        for z in [0.5, 1.0, 3.0, 5.0, 10.0, 19.0] {
            let score = m.detection_score(&scene, &obs, Vec3::new(0.0, 0.0, z));
            assert!((0.0..=1.0).contains(&score), "score {score} at z={z}");
        }
    }

    #[test]
    fn point_blank_candidate_is_instantly_detected() {
        let scene = OpenScene { light: 0.0 };
        let score = module().detection_score(&scene, &observer(), Vec3::new(0.0, 0.0, 1.5));
        assert!(score >= INSTANT_DETECTION_SCORE);
    }

    #[test]
    fn occluded_candidate_scores_zero() {
        // Fully walled off at 5 u dead ahead: no residual factor survives.
        let score = module().detection_score(&WalledScene, &observer(), Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(score, 0.0);
    }

    #[test]
    fn occlusion_beats_instant_detection() {
        // Point blank behind a wall is still unseen.
        let score = module().detection_score(&WalledScene, &observer(), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(score, 0.0);
    }

    #[test]
    fn out_of_cone_candidate_scores_zero() {
        let scene = OpenScene { light: 0.5 };
        let m = module();
        let obs = observer();
        let behind = m.detection_score(&scene, &obs, Vec3::new(0.0, 0.0, -10.0));
        assert_eq!(behind, 0.0);
        assert!(m.detection_score(&scene, &obs, Vec3::new(0.0, 0.0, 10.0)) > 0.0);
    }

    #[test]
    fn optimal_angle_boosts_score() {
        let scene = OpenScene { light: 0.5 };
        let m = module();
        let obs = observer();
        // Same distance, one straight ahead (inside the 30-degree cone),
        // one 45 degrees off.
        let ahead = m.detection_score(&scene, &obs, Vec3::new(0.0, 0.0, 10.0));
        let off = m.detection_score(
            &scene,
            &obs,
            Vec3::new(10.0 / 2f32.sqrt(), 0.0, 10.0 / 2f32.sqrt()),
        );
        assert!(ahead > off);
    }

    #[test]
    fn sub_floor_scores_are_zeroed() {
        let config = DetectionConfig {
            min_visibility: 0.9,
            instant_detection_range: 0.0,
            ..DetectionConfig::default()
        };
        let m = VisualDetectionModule::new(&config);
        let scene = OpenScene { light: 0.0 };
        // Far and dim: would land below the (deliberately huge) floor.
        let score = m.detection_score(&scene, &observer(), Vec3::new(0.0, 5.0, 18.0));
        assert_eq!(score, 0.0);
    }

    #[test]
    fn curve_sampling_interpolates_linearly() {
        let curve = vec![
            CurvePoint { t: 0.0, value: 1.0 },
            CurvePoint { t: 0.5, value: 0.8 },
            CurvePoint { t: 1.0, value: 0.0 },
        ];
        assert!((sample_curve(&curve, 0.0) - 1.0).abs() < 1e-5);
        assert!((sample_curve(&curve, 0.25) - 0.9).abs() < 1e-5);
        assert!((sample_curve(&curve, 0.75) - 0.4).abs() < 1e-5);
        assert!((sample_curve(&curve, 2.0) - 0.0).abs() < 1e-5);
    }

    #[test]
    fn empty_curve_falls_back_to_linear() {
        assert!((sample_curve(&[], 0.25) - 0.75).abs() < 1e-5);
    }

    #[test]
    fn breakdown_matches_total() {
        let scene = OpenScene { light: 0.5 };
        let m = module();
        let obs = observer();
        let target = Vec3::new(0.0, 0.0, 10.0);
        let breakdown = m.score_breakdown(&scene, &obs, target);
        let total = m.detection_score(&scene, &obs, target);
        assert!((breakdown.total - total).abs() < 1e-6);
    }
}
