//! Configuration for the vigil sensor pipeline.
//!
//! One immutable [`SensorConfig`] is loaded at initialization (TOML or
//! defaults) and passed by reference into each module's constructor. There
//! is no hot reload; the host rebuilds the sensor to change tuning.

use serde::{Deserialize, Serialize};

/// Top-level sensor configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Visibility and detection scoring.
    #[serde(default)]
    pub detection: DetectionConfig,
    /// Scan scheduling and performance knobs.
    #[serde(default)]
    pub scan: ScanConfig,
    /// Alert state machine tuning.
    #[serde(default)]
    pub alert: AlertConfig,
    /// Tiered memory tuning.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Multi-target tracking tuning.
    #[serde(default)]
    pub tracking: TrackingConfig,
    /// Outward notification throttling.
    #[serde(default)]
    pub events: EventConfig,
}

impl SensorConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `VigilError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::VigilError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// One sample on the distance-falloff curve.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CurvePoint {
    /// Normalized distance in [0, 1].
    pub t: f32,
    /// Score at that distance.
    pub value: f32,
}

/// Visibility and detection scoring configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Maximum sight distance in world units.
    #[serde(default = "default_20_0")]
    pub max_detection_range: f32,
    /// Full field-of-view cone in degrees.
    #[serde(default = "default_110_0")]
    pub field_of_view_deg: f32,
    /// Inside this radius a candidate is effectively always seen.
    #[serde(default = "default_2_0")]
    pub instant_detection_range: f32,
    /// Candidates within this angle of the forward axis get a score boost.
    #[serde(default = "default_30_0")]
    pub optimal_angle_deg: f32,
    /// Scores below this floor are zeroed rather than left as noise.
    #[serde(default = "default_0_1")]
    pub min_visibility: f32,
    /// Baseline light level when the scene reports none.
    #[serde(default = "default_0_5")]
    pub ambient_light: f32,
    /// Score at or above which a candidate counts as detected.
    #[serde(default = "default_0_3")]
    pub detection_threshold: f32,
    /// Optional distance-falloff curve, sampled at normalized distance.
    /// A missing curve falls back to linear falloff.
    #[serde(default)]
    pub distance_curve: Option<Vec<CurvePoint>>,
    /// Maximum speed the movement factor normalizes against, units/s.
    #[serde(default = "default_10_0")]
    pub max_detectable_speed: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            max_detection_range: 20.0,
            field_of_view_deg: 110.0,
            instant_detection_range: 2.0,
            optimal_angle_deg: 30.0,
            min_visibility: 0.1,
            ambient_light: 0.5,
            detection_threshold: 0.3,
            distance_curve: None,
            max_detectable_speed: 10.0,
        }
    }
}

/// Scan scheduling and performance configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Scan frequency while calm, in Hz.
    #[serde(default = "default_15_0")]
    pub base_scan_hz: f32,
    /// Scan frequency at full alert, in Hz.
    #[serde(default = "default_20_0")]
    pub alert_scan_hz: f32,
    /// Candidates scored per scheduling quantum.
    #[serde(default = "default_3")]
    pub targets_per_batch: usize,
    /// Total window a full scan is spread across, in seconds.
    #[serde(default = "default_0_5")]
    pub batch_window: f32,
    /// Whether distance-banded LOD score scaling is applied.
    #[serde(default = "default_true")]
    pub lod_enabled: bool,
    /// Steepness of the LOD distance bands.
    #[serde(default = "default_1_5")]
    pub lod_distance_multiplier: f32,
    /// Whether the early-culling pass runs before scoring.
    #[serde(default = "default_true")]
    pub early_culling: bool,
    /// Minimum seconds between culling passes.
    #[serde(default = "default_0_1")]
    pub cull_interval: f32,
    /// Whether detected-target records are drawn from a reuse pool.
    #[serde(default = "default_true")]
    pub use_pool: bool,
    /// Records pre-warmed into the pool at startup.
    #[serde(default = "default_20")]
    pub pool_prewarm: usize,
    /// Hard cap on idle pooled records.
    #[serde(default = "default_50")]
    pub pool_capacity: usize,
    /// Hard cap on simultaneously detected targets.
    #[serde(default = "default_5")]
    pub max_simultaneous_targets: usize,
    /// Spatial-query layer mask handed to the scene.
    #[serde(default)]
    pub candidate_mask: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            base_scan_hz: 15.0,
            alert_scan_hz: 20.0,
            targets_per_batch: 3,
            batch_window: 0.5,
            lod_enabled: true,
            lod_distance_multiplier: 1.5,
            early_culling: true,
            cull_interval: 0.1,
            use_pool: true,
            pool_prewarm: 20,
            pool_capacity: 50,
            max_simultaneous_targets: 5,
            candidate_mask: 0,
        }
    }
}

/// Alert state machine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Intensity at which Unaware becomes Suspicious.
    #[serde(default = "default_0_2")]
    pub suspicious_threshold: f32,
    /// Intensity at which Suspicious becomes Investigating.
    #[serde(default = "default_0_5")]
    pub investigating_threshold: f32,
    /// Intensity at which the NPC goes to full Alert.
    #[serde(default = "default_0_8")]
    pub alert_threshold: f32,
    /// Intensity lost per second while decaying.
    #[serde(default = "default_0_3")]
    pub decay_rate: f32,
    /// Idle seconds before auto-decay starts draining intensity.
    #[serde(default = "default_5_0")]
    pub calm_down_time: f32,
    /// Seconds spent Investigating before advancing to Searching.
    #[serde(default = "default_8_0")]
    pub investigation_time: f32,
    /// Seconds spent Searching before auto-decay kicks in.
    #[serde(default = "default_15_0")]
    pub search_time: f32,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            suspicious_threshold: 0.2,
            investigating_threshold: 0.5,
            alert_threshold: 0.8,
            decay_rate: 0.3,
            calm_down_time: 5.0,
            investigation_time: 8.0,
            search_time: 15.0,
        }
    }
}

/// Tiered memory configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Short-term tier duration in seconds.
    #[serde(default = "default_5_0")]
    pub short_term_duration: f32,
    /// Long-term tier duration in seconds.
    #[serde(default = "default_30_0")]
    pub long_term_duration: f32,
    /// Hard cap on long-term entries.
    #[serde(default = "default_20")]
    pub max_entries: usize,
    /// Confidence lost per second in the short-term tier.
    /// Long-term entries decay at half this rate.
    #[serde(default = "default_0_1")]
    pub confidence_decay: f32,
    /// Entries below this confidence are discarded instead of promoted.
    #[serde(default = "default_0_1")]
    pub min_confidence: f32,
    /// Seconds between decay/expiry passes.
    #[serde(default = "default_1_0")]
    pub cleanup_interval: f32,
    /// Reinforcement matches an entry within this position tolerance.
    #[serde(default = "default_2_0")]
    pub reinforce_tolerance: f32,
    /// How far ahead position prediction extrapolates, in seconds.
    #[serde(default = "default_2_0")]
    pub prediction_horizon: f32,
    /// Cap on the extrapolated displacement, in world units.
    #[serde(default = "default_5_0")]
    pub max_prediction_distance: f32,
    /// Position samples retained per target for velocity estimation.
    #[serde(default = "default_20")]
    pub position_history_cap: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            short_term_duration: 5.0,
            long_term_duration: 30.0,
            max_entries: 20,
            confidence_decay: 0.1,
            min_confidence: 0.1,
            cleanup_interval: 1.0,
            reinforce_tolerance: 2.0,
            prediction_horizon: 2.0,
            max_prediction_distance: 5.0,
            position_history_cap: 20,
        }
    }
}

/// Multi-target tracking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Hard cap on tracked targets.
    #[serde(default = "default_5")]
    pub max_tracked_targets: usize,
    /// Seconds without an update before a tracked target is dropped.
    #[serde(default = "default_8_0")]
    pub target_expiry_time: f32,
    /// State refresh frequency in Hz.
    #[serde(default = "default_2_0")]
    pub update_hz: f32,
    /// Primary-target recomputation frequency in Hz.
    #[serde(default = "default_0_5")]
    pub priority_update_hz: f32,
    /// Weight of the distance sub-score.
    #[serde(default = "default_2_0")]
    pub distance_weight: f32,
    /// Weight of the raw detection score.
    #[serde(default = "default_3_0")]
    pub score_weight: f32,
    /// Weight of the movement sub-score.
    #[serde(default = "default_1_5")]
    pub movement_weight: f32,
    /// Weight of the suspicion sub-score.
    #[serde(default = "default_2_5")]
    pub suspicion_weight: f32,
    /// Distance the distance sub-score normalizes against, world units.
    #[serde(default = "default_30_0")]
    pub distance_reference: f32,
    /// Speed the movement sub-score normalizes against, units/s.
    #[serde(default = "default_10_0")]
    pub speed_reference: f32,
    /// Duration the suspicion sub-score normalizes against, seconds.
    #[serde(default = "default_5_0")]
    pub suspicion_reference: f32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            max_tracked_targets: 5,
            target_expiry_time: 8.0,
            update_hz: 2.0,
            priority_update_hz: 0.5,
            distance_weight: 2.0,
            score_weight: 3.0,
            movement_weight: 1.5,
            suspicion_weight: 2.5,
            distance_reference: 30.0,
            speed_reference: 10.0,
            suspicion_reference: 5.0,
        }
    }
}

/// Outward notification throttling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    /// Minimum seconds between deliveries of the same event key.
    #[serde(default = "default_0_1")]
    pub cooldown: f32,
    /// Whether non-suppressed events are buffered before delivery.
    #[serde(default = "default_true")]
    pub buffer_events: bool,
    /// Buffer capacity; a full buffer delivers immediately.
    #[serde(default = "default_10")]
    pub max_buffer_size: usize,
    /// Seconds between buffer flushes.
    #[serde(default = "default_0_2")]
    pub flush_interval: f32,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            cooldown: 0.1,
            buffer_events: true,
            max_buffer_size: 10,
            flush_interval: 0.2,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_0_1() -> f32 { 0.1 }
fn default_0_2() -> f32 { 0.2 }
fn default_0_3() -> f32 { 0.3 }
fn default_0_5() -> f32 { 0.5 }
fn default_0_8() -> f32 { 0.8 }
fn default_1_0() -> f32 { 1.0 }
fn default_1_5() -> f32 { 1.5 }
fn default_2_0() -> f32 { 2.0 }
fn default_2_5() -> f32 { 2.5 }
fn default_3_0() -> f32 { 3.0 }
fn default_5_0() -> f32 { 5.0 }
fn default_8_0() -> f32 { 8.0 }
fn default_10_0() -> f32 { 10.0 }
fn default_15_0() -> f32 { 15.0 }
fn default_20_0() -> f32 { 20.0 }
fn default_30_0() -> f32 { 30.0 }
fn default_110_0() -> f32 { 110.0 }
fn default_3() -> usize { 3 }
fn default_5() -> usize { 5 }
fn default_10() -> usize { 10 }
fn default_20() -> usize { 20 }
fn default_50() -> usize { 50 }
