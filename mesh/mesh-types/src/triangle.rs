//! Triangle type for geometric calculations.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A triangle with concrete vertex positions.
///
/// Winding is **counter-clockwise (CCW) when viewed from the front**
/// (normal points toward viewer).
///
/// # Example
///
/// ```
/// use mesh_types::{Triangle, Point3};
///
/// let tri = Triangle::new(
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
/// );
///
/// assert!((tri.area() - 0.5).abs() < 1e-10);
/// let normal = tri.normal().unwrap();
/// assert!((normal.z - 1.0).abs() < 1e-10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Triangle {
    /// First vertex.
    pub v0: Point3<f64>,
    /// Second vertex.
    pub v1: Point3<f64>,
    /// Third vertex.
    pub v2: Point3<f64>,
}

/// Result of a closest-point query against a triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPoint {
    /// The closest point on the triangle.
    pub point: Point3<f64>,
    /// Barycentric weights of `point` with respect to `(v0, v1, v2)`.
    pub barycentric: [f64; 3],
    /// Squared distance between the query and `point`.
    pub distance_squared: f64,
}

impl Triangle {
    /// Create a new triangle from three points.
    #[inline]
    #[must_use]
    pub const fn new(v0: Point3<f64>, v1: Point3<f64>, v2: Point3<f64>) -> Self {
        Self { v0, v1, v2 }
    }

    /// Unnormalized face normal; its magnitude is twice the area.
    #[inline]
    #[must_use]
    pub fn normal_unnormalized(&self) -> Vector3<f64> {
        (self.v1 - self.v0).cross(&(self.v2 - self.v0))
    }

    /// Unit face normal, or `None` for a degenerate triangle.
    #[must_use]
    pub fn normal(&self) -> Option<Vector3<f64>> {
        let n = self.normal_unnormalized();
        let len = n.norm();
        if len > f64::EPSILON {
            Some(n / len)
        } else {
            None
        }
    }

    /// Triangle area.
    #[inline]
    #[must_use]
    pub fn area(&self) -> f64 {
        0.5 * self.normal_unnormalized().norm()
    }

    /// Centroid (average of the three corners).
    #[inline]
    #[must_use]
    pub fn centroid(&self) -> Point3<f64> {
        Point3::from((self.v0.coords + self.v1.coords + self.v2.coords) / 3.0)
    }

    /// Edge lengths `[|v0v1|, |v1v2|, |v2v0|]`.
    #[must_use]
    pub fn edge_lengths(&self) -> [f64; 3] {
        [
            (self.v1 - self.v0).norm(),
            (self.v2 - self.v1).norm(),
            (self.v0 - self.v2).norm(),
        ]
    }

    /// Interior angles in radians at `[v0, v1, v2]`.
    ///
    /// Angles at coincident corners are reported as zero.
    #[must_use]
    pub fn angles(&self) -> [f64; 3] {
        [
            corner_angle(&self.v0, &self.v1, &self.v2),
            corner_angle(&self.v1, &self.v2, &self.v0),
            corner_angle(&self.v2, &self.v0, &self.v1),
        ]
    }

    /// Check whether the triangle has (almost) no area relative to its size.
    ///
    /// `epsilon` bounds the ratio of the area to the squared longest edge.
    #[must_use]
    pub fn is_degenerate(&self, epsilon: f64) -> bool {
        let longest = self.edge_lengths().into_iter().fold(0.0, f64::max);
        if longest <= f64::EPSILON {
            return true;
        }
        self.area() <= epsilon * longest * longest
    }

    /// Closest point on the triangle to `point`, with barycentric weights.
    ///
    /// Region-based algorithm from "Real-Time Collision Detection"
    /// (Ericson), which classifies the query against the Voronoi regions
    /// of the corners, edges and face.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_types::{Triangle, Point3};
    ///
    /// let tri = Triangle::new(
    ///     Point3::new(0.0, 0.0, 0.0),
    ///     Point3::new(2.0, 0.0, 0.0),
    ///     Point3::new(0.0, 2.0, 0.0),
    /// );
    /// let hit = tri.closest_point(&Point3::new(0.5, 0.5, 3.0));
    /// assert!((hit.point - Point3::new(0.5, 0.5, 0.0)).norm() < 1e-12);
    /// assert!((hit.distance_squared - 9.0).abs() < 1e-12);
    /// ```
    #[must_use]
    pub fn closest_point(&self, point: &Point3<f64>) -> ClosestPoint {
        let (v0, v1, v2) = (self.v0, self.v1, self.v2);
        let ab = v1 - v0;
        let ac = v2 - v0;
        let ap = point - v0;

        let d1 = ab.dot(&ap);
        let d2 = ac.dot(&ap);
        if d1 <= 0.0 && d2 <= 0.0 {
            return Self::hit(point, v0, [1.0, 0.0, 0.0]);
        }

        let bp = point - v1;
        let d3 = ab.dot(&bp);
        let d4 = ac.dot(&bp);
        if d3 >= 0.0 && d4 <= d3 {
            return Self::hit(point, v1, [0.0, 1.0, 0.0]);
        }

        let vc = d1 * d4 - d3 * d2;
        if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
            let v = d1 / (d1 - d3);
            return Self::hit(point, v0 + ab * v, [1.0 - v, v, 0.0]);
        }

        let cp = point - v2;
        let d5 = ab.dot(&cp);
        let d6 = ac.dot(&cp);
        if d6 >= 0.0 && d5 <= d6 {
            return Self::hit(point, v2, [0.0, 0.0, 1.0]);
        }

        let vb = d5 * d2 - d1 * d6;
        if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
            let w = d2 / (d2 - d6);
            return Self::hit(point, v0 + ac * w, [1.0 - w, 0.0, w]);
        }

        let va = d3 * d6 - d5 * d4;
        if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
            let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
            return Self::hit(point, v1 + (v2 - v1) * w, [0.0, 1.0 - w, w]);
        }

        let sum = va + vb + vc;
        if sum.abs() <= f64::MIN_POSITIVE {
            // Zero-area triangle whose regions all overlap: fall back to v0.
            return Self::hit(point, v0, [1.0, 0.0, 0.0]);
        }
        let denom = 1.0 / sum;
        let v = vb * denom;
        let w = vc * denom;
        Self::hit(point, v0 + ab * v + ac * w, [1.0 - v - w, v, w])
    }

    fn hit(query: &Point3<f64>, point: Point3<f64>, barycentric: [f64; 3]) -> ClosestPoint {
        ClosestPoint {
            point,
            barycentric,
            distance_squared: (query - point).norm_squared(),
        }
    }
}

/// Angle at `apex` between the edges towards `a` and `b`.
fn corner_angle(apex: &Point3<f64>, a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    let u = a - apex;
    let v = b - apex;
    let denom = u.norm() * v.norm();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    (u.dot(&v) / denom).clamp(-1.0, 1.0).acos()
}
