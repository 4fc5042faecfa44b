//! Closest-point queries on segments and boxes.

use nalgebra::{Point3, Vector3};

/// Lengths and parameters below this are treated as degenerate.
pub const GEOM_EPSILON: f64 = 1e-10;

/// Closest point to `p` on the segment `a`-`b`, returned as the segment
/// parameter in `[0, 1]`.
#[must_use]
pub fn closest_param_on_segment(a: &Point3<f64>, b: &Point3<f64>, p: &Point3<f64>) -> f64 {
    let ab = b - a;
    let ab_len_sq = ab.norm_squared();
    if ab_len_sq < GEOM_EPSILON {
        return 0.0; // Degenerate segment
    }
    ((p - a).dot(&ab) / ab_len_sq).clamp(0.0, 1.0)
}

/// Closest point to `p` on the segment `a`-`b`.
#[must_use]
pub fn closest_point_segment(a: &Point3<f64>, b: &Point3<f64>, p: &Point3<f64>) -> Point3<f64> {
    let t = closest_param_on_segment(a, b, p);
    a + (b - a) * t
}

/// Find closest points between two line segments `p1`-`q1` and `p2`-`q2`.
///
/// Returns (`point_on_seg1`, `point_on_seg2`). Parallel segments resolve to
/// the start of the first segment.
#[must_use]
#[allow(clippy::many_single_char_names)]
pub fn closest_points_segments(
    p1: &Point3<f64>,
    q1: &Point3<f64>,
    p2: &Point3<f64>,
    q2: &Point3<f64>,
) -> (Point3<f64>, Point3<f64>) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;

    let a = d1.dot(&d1);
    let e = d2.dot(&d2);
    let f = d2.dot(&r);

    if a < GEOM_EPSILON && e < GEOM_EPSILON {
        return (*p1, *p2);
    }
    if a < GEOM_EPSILON {
        let t = (f / e).clamp(0.0, 1.0);
        return (*p1, p2 + d2 * t);
    }
    if e < GEOM_EPSILON {
        let s = (-d1.dot(&r) / a).clamp(0.0, 1.0);
        return (p1 + d1 * s, *p2);
    }

    let b = d1.dot(&d2);
    let c = d1.dot(&r);
    // denom = a*e - b², intentionally b*b
    #[allow(clippy::suspicious_operation_groupings)]
    let denom = a * e - b * b;

    let (mut s, mut t) = if denom.abs() < GEOM_EPSILON {
        (0.0, f / e)
    } else {
        let s_val = (b * f - c * e) / denom;
        (s_val, (b * s_val + f) / e)
    };

    if s < 0.0 {
        s = 0.0;
        t = (f / e).clamp(0.0, 1.0);
    } else if s > 1.0 {
        s = 1.0;
        t = ((b + f) / e).clamp(0.0, 1.0);
    }

    if t < 0.0 {
        t = 0.0;
        s = (-c / a).clamp(0.0, 1.0);
    } else if t > 1.0 {
        t = 1.0;
        s = ((b - c) / a).clamp(0.0, 1.0);
    }

    (p1 + d1 * s, p2 + d2 * t)
}

/// Signed distance from a box-local point to an origin-centered box.
///
/// Negative inside.
#[must_use]
pub fn box_signed_distance(local: &Vector3<f64>, half_extents: &Vector3<f64>) -> f64 {
    let q = local.abs() - half_extents;
    let outside = q.map(|x| x.max(0.0)).norm();
    let inside = q.max().min(0.0);
    outside + inside
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_closest_point_segment() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(2.0, 0.0, 0.0);
        let p = closest_point_segment(&a, &b, &Point3::new(1.0, 5.0, 0.0));
        assert_relative_eq!(p, Point3::new(1.0, 0.0, 0.0), epsilon = 1e-12);

        // Beyond the end clamps
        let p = closest_point_segment(&a, &b, &Point3::new(7.0, 1.0, 0.0));
        assert_relative_eq!(p, b, epsilon = 1e-12);

        // Degenerate segment
        let p = closest_point_segment(&a, &a, &Point3::new(7.0, 1.0, 0.0));
        assert_eq!(p, a);
    }

    #[test]
    fn test_crossing_segments() {
        let (c1, c2) = closest_points_segments(
            &Point3::new(-1.0, 0.0, 0.0),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, -1.0, 1.0),
            &Point3::new(0.0, 1.0, 1.0),
        );
        assert_relative_eq!(c1, Point3::new(0.0, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(c2, Point3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_parallel_segments() {
        let (c1, c2) = closest_points_segments(
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, 1.0, 0.0),
            &Point3::new(1.0, 1.0, 0.0),
        );
        assert_relative_eq!((c2 - c1).norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_box_signed_distance() {
        let h = Vector3::new(1.0, 2.0, 3.0);
        assert_relative_eq!(box_signed_distance(&Vector3::zeros(), &h), -1.0);
        assert_relative_eq!(box_signed_distance(&Vector3::new(3.0, 0.0, 0.0), &h), 2.0);
        assert_relative_eq!(
            box_signed_distance(&Vector3::new(2.0, 3.0, 0.0), &h),
            2.0_f64.sqrt(),
            epsilon = 1e-12
        );
    }
}
