//! Grading configuration.

use std::fmt;
use std::str::FromStr;

use mesh_types::Point3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{GradingError, GradingResult};

/// How the target edge length of a vertex is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SizingStrategy {
    /// Curvature-driven sizing, sharpened towards the landmarks.
    #[default]
    Hybrid,
    /// Sizing grows linearly with the distance to the nearest landmark.
    Distance,
}

impl FromStr for SizingStrategy {
    type Err = GradingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hybrid" => Ok(Self::Hybrid),
            "distance" => Ok(Self::Distance),
            _ => Err(GradingError::UnknownMode(s.to_string())),
        }
    }
}

impl fmt::Display for SizingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hybrid => "hybrid",
            Self::Distance => "distance",
        })
    }
}

/// Which ear the mesh is graded towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum EarSide {
    /// Refine around the left ear canal entrance.
    Left,
    /// Refine around the right ear canal entrance.
    Right,
    /// No preferred ear.
    #[default]
    None,
}

impl FromStr for EarSide {
    type Err = GradingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "none" => Ok(Self::None),
            _ => Err(GradingError::UnknownSide(s.to_string())),
        }
    }
}

impl fmt::Display for EarSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::None => "none",
        })
    }
}

/// Caller-supplied landmark information.
///
/// Unset points are estimated from the mesh width using the gamma factors.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LandmarkOptions {
    /// Left ear canal entrance.
    pub left: Option<Point3<f64>>,
    /// Right ear canal entrance.
    pub right: Option<Point3<f64>>,
    /// Scale of the half head width used to estimate the left entrance.
    pub left_gamma: Option<f64>,
    /// Scale of the half head width used to estimate the right entrance.
    pub right_gamma: Option<f64>,
}

impl LandmarkOptions {
    /// Set the left ear canal entrance.
    #[must_use]
    pub const fn with_left(mut self, point: Point3<f64>) -> Self {
        self.left = Some(point);
        self
    }

    /// Set the right ear canal entrance.
    #[must_use]
    pub const fn with_right(mut self, point: Point3<f64>) -> Self {
        self.right = Some(point);
        self
    }

    /// Set the left gamma factor.
    #[must_use]
    pub const fn with_left_gamma(mut self, gamma: f64) -> Self {
        self.left_gamma = Some(gamma);
        self
    }

    /// Set the right gamma factor.
    #[must_use]
    pub const fn with_right_gamma(mut self, gamma: f64) -> Self {
        self.right_gamma = Some(gamma);
        self
    }
}

/// Parameters for adaptive mesh grading.
///
/// Lengths are in mesh units (millimetres for head scans).
///
/// # Example
///
/// ```
/// use mesh_grading::{EarSide, GradingConfig, SizingStrategy};
///
/// let config = GradingConfig::new(1.0, 10.0)
///     .with_mode(SizingStrategy::Distance)
///     .with_side(EarSide::Left)
///     .with_iterations(5);
///
/// assert!(config.validate().is_ok());
/// assert!((config.effective_error_tolerance() - 1.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[allow(clippy::struct_excessive_bools)]
pub struct GradingConfig {
    /// Smallest target edge length.
    pub min_length: f64,

    /// Largest target edge length.
    pub max_length: f64,

    /// Allowed chordal deviation; `None` or non-positive means `min_length`.
    pub error_tolerance: Option<f64>,

    /// Sizing strategy.
    pub mode: SizingStrategy,

    /// Ear the grading is focused on.
    pub side: EarSide,

    /// Distance over which sizing reaches `max_length`; 0 derives it from
    /// the bounding-box diagonal.
    pub distance_normalization: f64,

    /// Number of remeshing passes.
    pub iterations: u32,

    /// Keep vertices on the input surface.
    pub project_to_original: bool,

    /// Explicit landmarks and gamma factors.
    pub landmarks: LandmarkOptions,

    /// Dihedral angle (degrees) above which an edge is kept as a feature.
    pub feature_angle: Option<f64>,

    /// Fraction of the way each vertex moves towards its relaxed position.
    pub relaxation_factor: f64,

    /// Uniform smoothing passes over the curvature field.
    pub curvature_smoothing: u32,

    /// Stop early once a pass changes nothing and moves vertices less than this.
    pub convergence_tolerance: Option<f64>,

    /// Flip away needle triangles with an angle above 170° after the last pass.
    pub remove_caps: bool,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            min_length: 1.0,
            max_length: 10.0,
            error_tolerance: None,
            mode: SizingStrategy::Hybrid,
            side: EarSide::None,
            distance_normalization: 0.0,
            iterations: 10,
            project_to_original: true,
            landmarks: LandmarkOptions::default(),
            feature_angle: None,
            relaxation_factor: 0.5,
            curvature_smoothing: 1,
            convergence_tolerance: None,
            remove_caps: true,
        }
    }
}

impl GradingConfig {
    /// Create a configuration for the given edge length band.
    #[must_use]
    pub fn new(min_length: f64, max_length: f64) -> Self {
        Self {
            min_length,
            max_length,
            ..Self::default()
        }
    }

    /// Quick preset: fewer passes, no cap removal.
    #[must_use]
    pub fn quick(min_length: f64, max_length: f64) -> Self {
        Self {
            iterations: 3,
            remove_caps: false,
            ..Self::new(min_length, max_length)
        }
    }

    /// Set the error tolerance.
    #[must_use]
    pub const fn with_error_tolerance(mut self, tolerance: f64) -> Self {
        self.error_tolerance = Some(tolerance);
        self
    }

    /// Set the sizing strategy.
    #[must_use]
    pub const fn with_mode(mut self, mode: SizingStrategy) -> Self {
        self.mode = mode;
        self
    }

    /// Set the ear side.
    #[must_use]
    pub const fn with_side(mut self, side: EarSide) -> Self {
        self.side = side;
        self
    }

    /// Set the distance normalization length.
    #[must_use]
    pub const fn with_distance_normalization(mut self, length: f64) -> Self {
        self.distance_normalization = length;
        self
    }

    /// Set the number of passes.
    #[must_use]
    pub const fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// Enable or disable projection onto the input surface.
    #[must_use]
    pub const fn with_projection(mut self, enable: bool) -> Self {
        self.project_to_original = enable;
        self
    }

    /// Set the landmark options.
    #[must_use]
    pub const fn with_landmarks(mut self, landmarks: LandmarkOptions) -> Self {
        self.landmarks = landmarks;
        self
    }

    /// Enable feature preservation above the given dihedral angle (degrees).
    #[must_use]
    pub const fn with_feature_angle(mut self, degrees: f64) -> Self {
        self.feature_angle = Some(degrees);
        self
    }

    /// Set the relaxation factor.
    #[must_use]
    pub const fn with_relaxation_factor(mut self, factor: f64) -> Self {
        self.relaxation_factor = factor;
        self
    }

    /// Set the number of curvature smoothing passes.
    #[must_use]
    pub const fn with_curvature_smoothing(mut self, passes: u32) -> Self {
        self.curvature_smoothing = passes;
        self
    }

    /// Stop early once the mesh settles.
    #[must_use]
    pub const fn with_convergence_tolerance(mut self, tolerance: f64) -> Self {
        self.convergence_tolerance = Some(tolerance);
        self
    }

    /// Enable or disable the cap removal pass.
    #[must_use]
    pub const fn with_cap_removal(mut self, enable: bool) -> Self {
        self.remove_caps = enable;
        self
    }

    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first invalid parameter found.
    pub fn validate(&self) -> GradingResult<()> {
        if !(self.min_length > 0.0 && self.min_length.is_finite()) {
            return Err(GradingError::InvalidMinLength(self.min_length));
        }
        if !(self.max_length >= self.min_length && self.max_length.is_finite()) {
            return Err(GradingError::InvalidLengthRange {
                min: self.min_length,
                max: self.max_length,
            });
        }
        if !(self.distance_normalization >= 0.0 && self.distance_normalization.is_finite()) {
            return Err(GradingError::InvalidNormalization(
                self.distance_normalization,
            ));
        }
        if self.iterations == 0 {
            return Err(GradingError::InvalidIterations(self.iterations));
        }
        if !(self.relaxation_factor > 0.0 && self.relaxation_factor <= 1.0) {
            return Err(GradingError::InvalidRelaxationFactor(
                self.relaxation_factor,
            ));
        }
        Ok(())
    }

    /// Error tolerance actually used: the configured value if positive,
    /// `min_length` otherwise.
    #[must_use]
    pub fn effective_error_tolerance(&self) -> f64 {
        match self.error_tolerance {
            Some(e) if e > 0.0 && e.is_finite() => e,
            _ => self.min_length,
        }
    }

    /// Feature angle in radians, if feature detection is enabled.
    #[must_use]
    pub fn feature_angle_radians(&self) -> Option<f64> {
        self.feature_angle
            .filter(|a| a.is_finite() && *a > 0.0)
            .map(f64::to_radians)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GradingConfig::default();
        assert_eq!(config.iterations, 10);
        assert!(config.project_to_original);
        assert_eq!(config.mode, SizingStrategy::Hybrid);
        assert_eq!(config.side, EarSide::None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = GradingConfig::new(2.0, 8.0)
            .with_error_tolerance(0.1)
            .with_side(EarSide::Right)
            .with_iterations(4)
            .with_projection(false);
        assert_eq!(config.min_length, 2.0);
        assert_eq!(config.side, EarSide::Right);
        assert_eq!(config.iterations, 4);
        assert!(!config.project_to_original);
        assert_eq!(config.effective_error_tolerance(), 0.1);
    }

    #[test]
    fn test_error_tolerance_fallback() {
        let config = GradingConfig::new(1.5, 5.0);
        assert_eq!(config.effective_error_tolerance(), 1.5);
        let config = config.with_error_tolerance(-1.0);
        assert_eq!(config.effective_error_tolerance(), 1.5);
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            GradingConfig::new(0.0, 5.0).validate(),
            Err(GradingError::InvalidMinLength(_))
        ));
        assert!(matches!(
            GradingConfig::new(5.0, 1.0).validate(),
            Err(GradingError::InvalidLengthRange { .. })
        ));
        assert!(matches!(
            GradingConfig::new(1.0, 5.0).with_iterations(0).validate(),
            Err(GradingError::InvalidIterations(0))
        ));
        assert!(matches!(
            GradingConfig::new(1.0, 5.0)
                .with_distance_normalization(-2.0)
                .validate(),
            Err(GradingError::InvalidNormalization(_))
        ));
        assert!(matches!(
            GradingConfig::new(1.0, 5.0)
                .with_relaxation_factor(1.5)
                .validate(),
            Err(GradingError::InvalidRelaxationFactor(_))
        ));
        assert!(GradingConfig::new(3.0, 3.0).validate().is_ok());
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("Left".parse::<EarSide>().unwrap(), EarSide::Left);
        assert_eq!("none".parse::<EarSide>().unwrap(), EarSide::None);
        assert!(matches!(
            "up".parse::<EarSide>(),
            Err(GradingError::UnknownSide(_))
        ));
        assert_eq!(
            "distance".parse::<SizingStrategy>().unwrap(),
            SizingStrategy::Distance
        );
        assert!(matches!(
            "fancy".parse::<SizingStrategy>(),
            Err(GradingError::UnknownMode(_))
        ));
        assert_eq!(SizingStrategy::Hybrid.to_string(), "hybrid");
    }

    #[test]
    fn test_feature_angle() {
        assert!(GradingConfig::default().feature_angle_radians().is_none());
        let angle = GradingConfig::default()
            .with_feature_angle(90.0)
            .feature_angle_radians()
            .unwrap();
        assert!((angle - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_partial_config() {
        let config: GradingConfig =
            serde_json::from_str(r#"{"min_length": 2.0, "max_length": 6.0, "side": "left"}"#)
                .unwrap();
        assert_eq!(config.side, EarSide::Left);
        assert_eq!(config.iterations, 10);
    }
}
