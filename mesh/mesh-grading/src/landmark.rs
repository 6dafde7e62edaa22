//! Ear canal landmark resolution.
//!
//! Heads are expected centered at the origin with X as the lateral axis
//! (left ear on negative X). When an entrance is not given explicitly it is
//! placed on the X axis at `gamma` times the half head width.

use mesh_types::{Aabb, Point3};
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::config::{EarSide, LandmarkOptions};

/// Gamma factor used when none is given or the given one is out of range.
pub const DEFAULT_GAMMA: f64 = 0.15;

/// Gamma factors at or above this value are treated as unset.
pub const GAMMA_LIMIT: f64 = 1.9;

/// Resolved ear canal entrances.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Landmarks {
    /// Left ear canal entrance.
    pub left: Point3<f64>,
    /// Right ear canal entrance.
    pub right: Point3<f64>,
    /// Gamma factor applied to the left side.
    pub left_gamma: f64,
    /// Gamma factor applied to the right side.
    pub right_gamma: f64,
    /// Whether the left point was given explicitly.
    pub left_explicit: bool,
    /// Whether the right point was given explicitly.
    pub right_explicit: bool,
}

impl Landmarks {
    /// Landmarks that drive the sizing for `side`: the chosen ear, or both
    /// ears when no side is chosen.
    #[must_use]
    pub fn relevant(&self, side: EarSide) -> SmallVec<[Point3<f64>; 2]> {
        match side {
            EarSide::Left => SmallVec::from_slice(&[self.left]),
            EarSide::Right => SmallVec::from_slice(&[self.right]),
            EarSide::None => SmallVec::from_slice(&[self.left, self.right]),
        }
    }

    /// Distance from `point` to the nearest landmark relevant for `side`.
    #[must_use]
    pub fn distance(&self, side: EarSide, point: &Point3<f64>) -> f64 {
        self.relevant(side)
            .iter()
            .map(|l| (point - l).norm())
            .fold(f64::INFINITY, f64::min)
    }
}

/// Resolve a gamma factor, falling back to [`DEFAULT_GAMMA`] when unset or
/// outside `(0, GAMMA_LIMIT)`.
#[must_use]
pub fn resolve_gamma(gamma: Option<f64>) -> f64 {
    match gamma {
        Some(g) if g > 0.0 && g < GAMMA_LIMIT => g,
        Some(g) => {
            warn!(
                "Gamma factor {} outside (0, {}), using {}",
                g, GAMMA_LIMIT, DEFAULT_GAMMA
            );
            DEFAULT_GAMMA
        }
        None => DEFAULT_GAMMA,
    }
}

/// Resolve both ear canal entrances.
///
/// Explicit points are used as given, except the origin which counts as
/// unset. The `side` only affects diagnostics; both points are always
/// resolved so callers can report them.
///
/// # Example
///
/// ```
/// use mesh_grading::{resolve_landmarks, EarSide, LandmarkOptions};
/// use mesh_types::{Aabb, Point3};
///
/// let bounds = Aabb::new(Point3::new(-80.0, -100.0, -120.0), Point3::new(80.0, 100.0, 120.0));
/// let landmarks = resolve_landmarks(EarSide::Left, &LandmarkOptions::default(), &bounds);
///
/// assert!((landmarks.left.x + 0.15 * 80.0).abs() < 1e-9);
/// assert!((landmarks.right.x - 0.15 * 80.0).abs() < 1e-9);
/// ```
#[must_use]
pub fn resolve_landmarks(side: EarSide, options: &LandmarkOptions, bounds: &Aabb) -> Landmarks {
    let half_width = bounds.half_width();
    let left_gamma = resolve_gamma(options.left_gamma);
    let right_gamma = resolve_gamma(options.right_gamma);

    let explicit = |p: Option<Point3<f64>>| p.filter(|p| *p != Point3::origin());
    let left = explicit(options.left);
    let right = explicit(options.right);

    let landmarks = Landmarks {
        left: left.unwrap_or_else(|| Point3::new(-left_gamma * half_width, 0.0, 0.0)),
        right: right.unwrap_or_else(|| Point3::new(right_gamma * half_width, 0.0, 0.0)),
        left_gamma,
        right_gamma,
        left_explicit: left.is_some(),
        right_explicit: right.is_some(),
    };

    debug!(
        "Landmarks ({}): left {:?} (gamma {}), right {:?} (gamma {})",
        side,
        landmarks.left.coords.as_slice(),
        left_gamma,
        landmarks.right.coords.as_slice(),
        right_gamma
    );
    landmarks
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn head_bounds() -> Aabb {
        Aabb::new(
            Point3::new(-75.0, -95.0, -110.0),
            Point3::new(75.0, 95.0, 130.0),
        )
    }

    #[test]
    fn estimated_from_width() {
        let lm = resolve_landmarks(EarSide::None, &LandmarkOptions::default(), &head_bounds());
        assert_relative_eq!(lm.left, Point3::new(-11.25, 0.0, 0.0));
        assert_relative_eq!(lm.right, Point3::new(11.25, 0.0, 0.0));
        assert!(!lm.left_explicit && !lm.right_explicit);
    }

    #[test]
    fn explicit_points_win() {
        let options = LandmarkOptions::default()
            .with_left(Point3::new(-70.0, 5.0, 2.0))
            .with_right_gamma(0.5);
        let lm = resolve_landmarks(EarSide::Left, &options, &head_bounds());
        assert_eq!(lm.left, Point3::new(-70.0, 5.0, 2.0));
        assert!(lm.left_explicit);
        assert_relative_eq!(lm.right.x, 37.5);
        assert_eq!(lm.right_gamma, 0.5);
    }

    #[test]
    fn origin_counts_as_unset() {
        let options = LandmarkOptions::default().with_right(Point3::origin());
        let lm = resolve_landmarks(EarSide::Right, &options, &head_bounds());
        assert!(!lm.right_explicit);
        assert_relative_eq!(lm.right.x, 11.25);
    }

    #[test]
    fn out_of_range_gamma_falls_back() {
        assert_eq!(resolve_gamma(None), DEFAULT_GAMMA);
        assert_eq!(resolve_gamma(Some(1.9)), DEFAULT_GAMMA);
        assert_eq!(resolve_gamma(Some(25.0)), DEFAULT_GAMMA);
        assert_eq!(resolve_gamma(Some(0.0)), DEFAULT_GAMMA);
        assert_eq!(resolve_gamma(Some(-0.3)), DEFAULT_GAMMA);
        assert_eq!(resolve_gamma(Some(1.2)), 1.2);
    }

    #[test]
    fn relevant_landmarks_by_side() {
        let lm = resolve_landmarks(EarSide::None, &LandmarkOptions::default(), &head_bounds());
        assert_eq!(lm.relevant(EarSide::Left).as_slice(), &[lm.left]);
        assert_eq!(lm.relevant(EarSide::Right).as_slice(), &[lm.right]);
        assert_eq!(lm.relevant(EarSide::None).len(), 2);

        let p = Point3::new(20.0, 0.0, 0.0);
        assert_relative_eq!(lm.distance(EarSide::None, &p), 8.75);
        assert_relative_eq!(lm.distance(EarSide::Left, &p), 31.25);
    }

    #[test]
    fn empty_bounds_put_estimates_at_origin() {
        let lm = resolve_landmarks(EarSide::Left, &LandmarkOptions::default(), &Aabb::empty());
        assert_eq!(lm.left.x, 0.0);
    }

    proptest! {
        #[test]
        fn resolution_is_deterministic(
            gamma in prop::option::of(-1.0f64..4.0),
            half in 1.0f64..200.0,
        ) {
            let bounds = Aabb::new(Point3::new(-half, -1.0, -1.0), Point3::new(half, 1.0, 1.0));
            let options = LandmarkOptions { left_gamma: gamma, right_gamma: gamma, ..LandmarkOptions::default() };
            let a = resolve_landmarks(EarSide::None, &options, &bounds);
            let b = resolve_landmarks(EarSide::None, &options, &bounds);
            prop_assert_eq!(a, b);
            prop_assert!(a.left_gamma > 0.0 && a.left_gamma < GAMMA_LIMIT);
            prop_assert!(a.left.x <= 0.0 && a.right.x >= 0.0);
            prop_assert!((a.left.x + a.right.x).abs() < 1e-9);
        }
    }
}
