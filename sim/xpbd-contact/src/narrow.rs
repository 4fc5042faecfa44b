//! Analytical pairwise collision for convex primitives (sphere, capsule, box).
//!
//! Every routine appends [`ContactGeometry`] records to `out` with the first
//! shape argument as shape "a": the normal points from the second shape
//! toward the first and `point_a` lies on the first shape's surface.
//!
//! A record is produced whenever the signed penetration exceeds `-margin`,
//! so separated-but-close shapes yield contacts with negative depth.

use nalgebra::{Isometry3, Point3, Vector3};

use crate::contact::ContactGeometry;
use crate::geometry::{
    GEOM_EPSILON, box_signed_distance, closest_point_segment, closest_points_segments,
};

/// Golden-section iterations when searching a capsule segment against a box.
const SEGMENT_SEARCH_ITERATIONS: usize = 48;

/// Two face alignments closer than this count as a tie.
const FACE_ALIGNMENT_TOL: f64 = 1e-6;

/// Sphere-sphere collision detection.
pub fn sphere_sphere(
    center_a: &Point3<f64>,
    radius_a: f64,
    center_b: &Point3<f64>,
    radius_b: f64,
    margin: f64,
    out: &mut Vec<ContactGeometry>,
) {
    let diff = center_a - center_b;
    let dist = diff.norm();
    let penetration = radius_a + radius_b - dist;

    if penetration > -margin {
        // Coincident centers have no preferred direction; pick +Y
        let normal = if dist > GEOM_EPSILON {
            diff / dist
        } else {
            Vector3::y()
        };
        out.push(ContactGeometry {
            point_a: center_a - normal * radius_a,
            point_b: center_b + normal * radius_b,
            normal,
        });
    }
}

/// Sphere-box collision detection.
///
/// The sphere center is clamped into the box's local frame. If the center is
/// inside the box, the face with the least penetration supplies the normal.
pub fn sphere_box(
    center: &Point3<f64>,
    radius: f64,
    box_pose: &Isometry3<f64>,
    half_extents: &Vector3<f64>,
    margin: f64,
    out: &mut Vec<ContactGeometry>,
) {
    let local = box_pose.inverse_transform_point(center).coords;
    let clamped = Vector3::new(
        local.x.clamp(-half_extents.x, half_extents.x),
        local.y.clamp(-half_extents.y, half_extents.y),
        local.z.clamp(-half_extents.z, half_extents.z),
    );

    let outside = (local - clamped).norm();
    if outside > GEOM_EPSILON {
        if radius - outside <= -margin {
            return;
        }
        let surface = box_pose * Point3::from(clamped);
        let normal = (center - surface) / outside;
        out.push(ContactGeometry {
            point_a: center - normal * radius,
            point_b: surface,
            normal,
        });
        return;
    }

    // Center inside the box: push out through the nearest face
    let mut min_pen = f64::MAX;
    let mut axis = 0;
    let mut sign = 1.0;
    for i in 0..3 {
        let pen_pos = half_extents[i] - local[i];
        let pen_neg = half_extents[i] + local[i];
        if pen_pos < min_pen {
            min_pen = pen_pos;
            axis = i;
            sign = 1.0;
        }
        if pen_neg < min_pen {
            min_pen = pen_neg;
            axis = i;
            sign = -1.0;
        }
    }

    let mut normal_local = Vector3::zeros();
    normal_local[axis] = sign;
    let mut surface_local = local;
    surface_local[axis] = sign * half_extents[axis];

    let normal = box_pose.rotation * normal_local;
    out.push(ContactGeometry {
        point_a: center - normal * radius,
        point_b: box_pose * Point3::from(surface_local),
        normal,
    });
}

/// Capsule-sphere collision detection.
///
/// Reduces to sphere-sphere against the closest point of the capsule's core
/// segment.
pub fn capsule_sphere(
    capsule_pose: &Isometry3<f64>,
    radius: f64,
    half_length: f64,
    center: &Point3<f64>,
    sphere_radius: f64,
    margin: f64,
    out: &mut Vec<ContactGeometry>,
) {
    let (p0, p1) = capsule_segment(capsule_pose, half_length);
    let closest = closest_point_segment(&p0, &p1, center);
    sphere_sphere(&closest, radius, center, sphere_radius, margin, out);
}

/// Capsule-capsule collision detection.
///
/// Capsules are represented as line segments with radius. The closest points
/// of the two segments give one contact; nearly parallel capsules also get
/// contacts at the segment endpoints so they can rest side by side.
#[allow(clippy::too_many_arguments)]
pub fn capsule_capsule(
    pose_a: &Isometry3<f64>,
    radius_a: f64,
    half_length_a: f64,
    pose_b: &Isometry3<f64>,
    radius_b: f64,
    half_length_b: f64,
    margin: f64,
    out: &mut Vec<ContactGeometry>,
) {
    let (a0, a1) = capsule_segment(pose_a, half_length_a);
    let (b0, b1) = capsule_segment(pose_b, half_length_b);

    let da = a1 - a0;
    let db = b1 - b0;
    let parallel = da.cross(&db).norm() <= 1e-6 * da.norm() * db.norm();

    if !parallel || da.norm() < GEOM_EPSILON || db.norm() < GEOM_EPSILON {
        let (ca, cb) = closest_points_segments(&a0, &a1, &b0, &b1);
        sphere_sphere(&ca, radius_a, &cb, radius_b, margin, out);
        return;
    }

    let start = out.len();
    let mut candidates = Vec::with_capacity(4);
    for end in [a0, a1] {
        candidates.push((end, closest_point_segment(&b0, &b1, &end)));
    }
    for end in [b0, b1] {
        candidates.push((closest_point_segment(&a0, &a1, &end), end));
    }

    let mut found = Vec::with_capacity(4);
    for (ca, cb) in candidates {
        found.clear();
        sphere_sphere(&ca, radius_a, &cb, radius_b, margin, &mut found);
        for g in found.drain(..) {
            let duplicate = out[start..]
                .iter()
                .any(|e| (e.point_a - g.point_a).norm() < 1e-9);
            if !duplicate {
                out.push(g);
            }
        }
    }
}

/// Capsule-box collision detection.
///
/// The signed distance from the capsule's core segment to the box is convex
/// along the segment, so a golden-section search finds the deepest point.
/// Both segment endpoints are also tested so a capsule lying on a face gets
/// a contact at each end.
pub fn capsule_box(
    capsule_pose: &Isometry3<f64>,
    radius: f64,
    half_length: f64,
    box_pose: &Isometry3<f64>,
    half_extents: &Vector3<f64>,
    margin: f64,
    out: &mut Vec<ContactGeometry>,
) {
    let (p0, p1) = capsule_segment(capsule_pose, half_length);
    let l0 = box_pose.inverse_transform_point(&p0).coords;
    let l1 = box_pose.inverse_transform_point(&p1).coords;
    let sdf = |t: f64| box_signed_distance(&(l0 + (l1 - l0) * t), half_extents);

    let ratio = (5.0_f64.sqrt() - 1.0) / 2.0;
    let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
    let mut x1 = hi - ratio * (hi - lo);
    let mut x2 = lo + ratio * (hi - lo);
    let (mut f1, mut f2) = (sdf(x1), sdf(x2));
    for _ in 0..SEGMENT_SEARCH_ITERATIONS {
        if f1 <= f2 {
            hi = x2;
            x2 = x1;
            f2 = f1;
            x1 = hi - ratio * (hi - lo);
            f1 = sdf(x1);
        } else {
            lo = x1;
            x1 = x2;
            f1 = f2;
            x2 = lo + ratio * (hi - lo);
            f2 = sdf(x2);
        }
    }
    let t_min = 0.5 * (lo + hi);

    let length = (p1 - p0).norm();
    let mut params = vec![0.0, 1.0];
    if length < GEOM_EPSILON {
        params.truncate(1);
    } else if t_min * length > 1e-4 && (1.0 - t_min) * length > 1e-4 {
        params.push(t_min);
    }

    for t in params {
        let point = p0 + (p1 - p0) * t;
        sphere_box(&point, radius, box_pose, half_extents, margin, out);
    }
}

/// Box-box collision detection using the Separating Axis Theorem.
///
/// Tests the 15 candidate axes (3 face normals of each box and the 9 edge
/// cross products). Face contacts clip the incident face against the
/// reference face and emit up to 8 points; edge contacts emit the closest
/// points of the two edges.
pub fn box_box(
    pose_a: &Isometry3<f64>,
    half_a: &Vector3<f64>,
    pose_b: &Isometry3<f64>,
    half_b: &Vector3<f64>,
    margin: f64,
    out: &mut Vec<ContactGeometry>,
) {
    let box_a = OrientedBox::new(pose_a, half_a);
    let box_b = OrientedBox::new(pose_b, half_b);
    let center_diff = box_a.center - box_b.center;

    let mut min_pen = f64::MAX;
    let mut best_axis = Vector3::x();
    let mut best_edges = None;

    for axis in box_a.axes.iter().chain(box_b.axes.iter()) {
        let pen = test_sat_axis(axis, &center_diff, &box_a, &box_b);
        if pen <= -margin {
            return; // Separating axis found (beyond margin zone)
        }
        if pen < min_pen {
            min_pen = pen;
            best_axis = *axis;
        }
    }

    for i in 0..3 {
        for j in 0..3 {
            let axis = box_a.axes[i].cross(&box_b.axes[j]);
            let len = axis.norm();
            if len < 1e-6 {
                continue; // Parallel edges
            }
            let axis = axis / len;

            let pen = test_sat_axis(&axis, &center_diff, &box_a, &box_b);
            if pen <= -margin {
                return;
            }
            // Edge-edge contacts are less stable; only use if clearly better
            if pen < min_pen * 0.95 {
                min_pen = pen;
                best_axis = axis;
                best_edges = Some((i, j));
            }
        }
    }

    // Normal points from box b to box a
    if best_axis.dot(&center_diff) < 0.0 {
        best_axis = -best_axis;
    }

    match best_edges {
        Some((i, j)) => edge_contact(&box_a, i, &box_b, j, &best_axis, margin, out),
        None => face_contacts(&box_a, &box_b, &best_axis, margin, out),
    }
}

/// World-space description of a box used by the SAT routines.
struct OrientedBox {
    center: Point3<f64>,
    axes: [Vector3<f64>; 3],
    half: Vector3<f64>,
}

impl OrientedBox {
    fn new(pose: &Isometry3<f64>, half: &Vector3<f64>) -> Self {
        let rot = pose.rotation.to_rotation_matrix();
        let m = rot.matrix();
        Self {
            center: Point3::from(pose.translation.vector),
            axes: [
                m.column(0).into_owned(),
                m.column(1).into_owned(),
                m.column(2).into_owned(),
            ],
            half: *half,
        }
    }

    /// Half-width of the box projected onto `axis`.
    fn projected_radius(&self, axis: &Vector3<f64>) -> f64 {
        (self.half.x * axis.dot(&self.axes[0]).abs())
            + (self.half.y * axis.dot(&self.axes[1]).abs())
            + (self.half.z * axis.dot(&self.axes[2]).abs())
    }

    /// Index of the face axis most aligned with `dir` and that alignment.
    fn best_face(&self, dir: &Vector3<f64>) -> (usize, f64) {
        let mut best = (0, dir.dot(&self.axes[0]).abs());
        for k in 1..3 {
            let a = dir.dot(&self.axes[k]).abs();
            if a > best.1 {
                best = (k, a);
            }
        }
        best
    }

    fn face_area(&self, k: usize) -> f64 {
        self.half[(k + 1) % 3] * self.half[(k + 2) % 3]
    }

    /// Vertex furthest along `dir`.
    fn support(&self, dir: &Vector3<f64>) -> Point3<f64> {
        let mut p = self.center;
        for k in 0..3 {
            let s = if dir.dot(&self.axes[k]) >= 0.0 { 1.0 } else { -1.0 };
            p += self.axes[k] * (s * self.half[k]);
        }
        p
    }
}

/// Test a single SAT axis and return penetration depth (negative = separated).
#[inline]
fn test_sat_axis(
    axis: &Vector3<f64>,
    center_diff: &Vector3<f64>,
    box_a: &OrientedBox,
    box_b: &OrientedBox,
) -> f64 {
    let dist = axis.dot(center_diff).abs();
    box_a.projected_radius(axis) + box_b.projected_radius(axis) - dist
}

/// Clip the incident box's face against the reference box's face.
///
/// The reference box is the one whose face normal best matches the contact
/// normal; ties go to the larger face, so a small box resting on a large
/// slab is clipped against the slab.
fn face_contacts(
    box_a: &OrientedBox,
    box_b: &OrientedBox,
    normal: &Vector3<f64>,
    margin: f64,
    out: &mut Vec<ContactGeometry>,
) {
    let (face_a, align_a) = box_a.best_face(normal);
    let (face_b, align_b) = box_b.best_face(normal);
    let reference_is_b = if (align_b - align_a).abs() > FACE_ALIGNMENT_TOL {
        align_b > align_a
    } else {
        box_b.face_area(face_b) >= box_a.face_area(face_a)
    };

    let (reference, incident, k, toward_incident) = if reference_is_b {
        (box_b, box_a, face_b, *normal)
    } else {
        (box_a, box_b, face_a, -normal)
    };

    // Reference face plane, outward normal pointing at the incident box
    let s = if toward_incident.dot(&reference.axes[k]) >= 0.0 {
        1.0
    } else {
        -1.0
    };
    let face_normal = reference.axes[k] * s;
    let face_center = reference.center + face_normal * reference.half[k];
    let plane_offset = face_normal.dot(&face_center.coords);

    // Incident face: the one most anti-parallel to the reference normal
    let (m, _) = incident.best_face(&face_normal);
    let si = if face_normal.dot(&incident.axes[m]) >= 0.0 {
        -1.0
    } else {
        1.0
    };
    let inc_center = incident.center + incident.axes[m] * (si * incident.half[m]);
    let m1 = (m + 1) % 3;
    let m2 = (m + 2) % 3;
    let e1 = incident.axes[m1] * incident.half[m1];
    let e2 = incident.axes[m2] * incident.half[m2];
    let mut polygon = vec![
        inc_center + e1 + e2,
        inc_center - e1 + e2,
        inc_center - e1 - e2,
        inc_center + e1 - e2,
    ];

    for side in [(k + 1) % 3, (k + 2) % 3] {
        let u = reference.axes[side];
        let c = u.dot(&reference.center.coords);
        let h = reference.half[side];
        polygon = clip_polygon(&polygon, &u, c + h);
        polygon = clip_polygon(&polygon, &(-u), -c + h);
        if polygon.is_empty() {
            break;
        }
    }

    let start = out.len();
    for v in &polygon {
        let separation = face_normal.dot(&v.coords) - plane_offset;
        if separation > margin {
            continue;
        }
        out.push(face_point(v, &face_normal, separation, reference_is_b));
    }

    if out.len() == start {
        // Clipping degenerated; fall back to the deepest incident vertex
        let v = incident.support(&-face_normal);
        let separation = face_normal.dot(&v.coords) - plane_offset;
        if separation < margin {
            out.push(face_point(&v, &face_normal, separation, reference_is_b));
        }
    }
}

/// Contact for an incident point `v` lying `separation` above the reference
/// face.
fn face_point(
    v: &Point3<f64>,
    face_normal: &Vector3<f64>,
    separation: f64,
    reference_is_b: bool,
) -> ContactGeometry {
    let on_face = v - face_normal * separation;
    if reference_is_b {
        ContactGeometry {
            point_a: *v,
            point_b: on_face,
            normal: *face_normal,
        }
    } else {
        ContactGeometry {
            point_a: on_face,
            point_b: *v,
            normal: -face_normal,
        }
    }
}

/// Keep the part of a convex polygon with `u·x <= offset`.
fn clip_polygon(polygon: &[Point3<f64>], u: &Vector3<f64>, offset: f64) -> Vec<Point3<f64>> {
    let mut clipped = Vec::with_capacity(polygon.len() + 2);
    for (idx, p) in polygon.iter().enumerate() {
        let q = &polygon[(idx + 1) % polygon.len()];
        let dp = u.dot(&p.coords) - offset;
        let dq = u.dot(&q.coords) - offset;
        if dp <= 0.0 {
            clipped.push(*p);
        }
        if (dp < 0.0 && dq > 0.0) || (dp > 0.0 && dq < 0.0) {
            clipped.push(p + (q - p) * (dp / (dp - dq)));
        }
    }
    clipped
}

/// Closest points between the supporting edges of an edge-edge contact.
fn edge_contact(
    box_a: &OrientedBox,
    i: usize,
    box_b: &OrientedBox,
    j: usize,
    normal: &Vector3<f64>,
    margin: f64,
    out: &mut Vec<ContactGeometry>,
) {
    let (a0, a1) = supporting_edge(box_a, i, &-normal);
    let (b0, b1) = supporting_edge(box_b, j, normal);
    let (point_a, point_b) = closest_points_segments(&a0, &a1, &b0, &b1);

    let g = ContactGeometry {
        point_a,
        point_b,
        normal: *normal,
    };
    if g.depth() > -margin {
        out.push(g);
    }
}

/// The edge along axis `k` furthest in direction `dir`.
fn supporting_edge(
    b: &OrientedBox,
    k: usize,
    dir: &Vector3<f64>,
) -> (Point3<f64>, Point3<f64>) {
    let mut mid = b.center;
    for other in 0..3 {
        if other != k {
            let s = if dir.dot(&b.axes[other]) >= 0.0 { 1.0 } else { -1.0 };
            mid += b.axes[other] * (s * b.half[other]);
        }
    }
    let e = b.axes[k] * b.half[k];
    (mid - e, mid + e)
}

/// World endpoints of a capsule's core segment (local Y axis).
fn capsule_segment(pose: &Isometry3<f64>, half_length: f64) -> (Point3<f64>, Point3<f64>) {
    (
        pose * Point3::new(0.0, -half_length, 0.0),
        pose * Point3::new(0.0, half_length, 0.0),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Translation3, UnitQuaternion};
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    fn pose(x: f64, y: f64, z: f64) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::new(x, y, z), UnitQuaternion::identity())
    }

    fn ground() -> (Isometry3<f64>, Vector3<f64>) {
        (pose(0.0, 0.0, 0.0), Vector3::new(50.0, 0.05, 50.0))
    }

    #[test]
    fn test_sphere_sphere_overlap() {
        let mut out = Vec::new();
        sphere_sphere(
            &Point3::new(0.0, 0.9, 0.0),
            0.5,
            &Point3::origin(),
            0.5,
            0.0,
            &mut out,
        );
        assert_eq!(out.len(), 1);
        assert_relative_eq!(out[0].depth(), 0.1, epsilon = 1e-12);
        assert_relative_eq!(out[0].normal, Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(out[0].point_a, Point3::new(0.0, 0.4, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_sphere_sphere_margin() {
        let mut out = Vec::new();
        let a = Point3::new(1.05, 0.0, 0.0);
        sphere_sphere(&a, 0.5, &Point3::origin(), 0.5, 0.01, &mut out);
        assert!(out.is_empty());

        sphere_sphere(&a, 0.5, &Point3::origin(), 0.5, 0.1, &mut out);
        assert_eq!(out.len(), 1);
        assert_relative_eq!(out[0].depth(), -0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_sphere_box_resting() {
        let (g, h) = ground();
        let mut out = Vec::new();
        sphere_box(&Point3::new(0.3, 0.54, -0.2), 0.5, &g, &h, 0.0, &mut out);
        assert_eq!(out.len(), 1);
        assert_relative_eq!(out[0].depth(), 0.01, epsilon = 1e-12);
        assert_relative_eq!(out[0].normal, Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(out[0].point_b, Point3::new(0.3, 0.05, -0.2), epsilon = 1e-12);
    }

    #[test]
    fn test_sphere_box_center_inside() {
        let g = pose(0.0, 0.0, 0.0);
        let h = Vector3::new(1.0, 1.0, 1.0);
        let mut out = Vec::new();
        sphere_box(&Point3::new(0.0, 0.0, 0.8), 0.5, &g, &h, 0.0, &mut out);
        assert_eq!(out.len(), 1);
        assert_relative_eq!(out[0].normal, Vector3::z(), epsilon = 1e-12);
        // 0.2 to the face plus the radius
        assert_relative_eq!(out[0].depth(), 0.7, epsilon = 1e-12);
    }

    #[test]
    fn test_sphere_box_corner() {
        let g = pose(0.0, 0.0, 0.0);
        let h = Vector3::new(1.0, 1.0, 1.0);
        let mut out = Vec::new();
        let c = Point3::new(1.3, 1.3, 1.3);
        sphere_box(&c, 0.6, &g, &h, 0.0, &mut out);
        assert_eq!(out.len(), 1);
        let expected = Vector3::new(1.0, 1.0, 1.0).normalize();
        assert_relative_eq!(out[0].normal, expected, epsilon = 1e-12);
        assert_relative_eq!(out[0].depth(), 0.6 - 0.3 * 3.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_box_resting_on_ground() {
        let (g, gh) = ground();
        let b = pose(0.0, 0.54, 0.0);
        let mut out = Vec::new();
        box_box(&b, &Vector3::new(0.5, 0.5, 0.5), &g, &gh, 0.0, &mut out);

        assert_eq!(out.len(), 4);
        for c in &out {
            assert_relative_eq!(c.normal, Vector3::y(), epsilon = 1e-12);
            assert_relative_eq!(c.depth(), 0.01, epsilon = 1e-12);
            assert_relative_eq!(c.point_b.y, 0.05, epsilon = 1e-12);
            assert_relative_eq!(c.point_a.x.abs(), 0.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_ground_above_box_order_swapped() {
        // Same scene with the roles swapped: normal flips
        let (g, gh) = ground();
        let b = pose(0.0, 0.54, 0.0);
        let mut out = Vec::new();
        box_box(&g, &gh, &b, &Vector3::new(0.5, 0.5, 0.5), 0.0, &mut out);

        assert_eq!(out.len(), 4);
        for c in &out {
            assert_relative_eq!(c.normal, -Vector3::y(), epsilon = 1e-12);
            assert_relative_eq!(c.depth(), 0.01, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_box_box_separated() {
        let mut out = Vec::new();
        let h = Vector3::new(0.5, 0.5, 0.5);
        box_box(&pose(0.0, 0.0, 0.0), &h, &pose(2.0, 0.0, 0.0), &h, 0.01, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_box_box_edge_on_face() {
        // Box rotated 45 degrees about Z, resting on an edge
        let (g, gh) = ground();
        let h = Vector3::new(0.5, 0.5, 0.5);
        let q = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_4);
        let y = 0.05 + 0.5 * 2.0_f64.sqrt() - 0.01;
        let b = Isometry3::from_parts(Translation3::new(0.0, y, 0.0), q);

        let mut out = Vec::new();
        box_box(&b, &h, &g, &gh, 0.0, &mut out);
        assert!(!out.is_empty());
        for c in &out {
            assert_relative_eq!(c.normal, Vector3::y(), epsilon = 1e-9);
            assert_relative_eq!(c.depth(), 0.01, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_box_box_crossed_edges() {
        // Two long bars crossing at right angles, touching edge to edge
        let h = Vector3::new(2.0, 0.1, 0.1);
        let qa = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), FRAC_PI_4);
        let qb = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), FRAC_PI_2)
            * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), FRAC_PI_4);
        let reach = 0.1 * 2.0_f64.sqrt();
        let a = Isometry3::from_parts(Translation3::new(0.0, 2.0 * reach - 0.02, 0.0), qa);
        let b = Isometry3::from_parts(Translation3::new(0.0, 0.0, 0.0), qb);

        let mut out = Vec::new();
        box_box(&a, &h, &b, &h, 0.0, &mut out);
        assert_eq!(out.len(), 1);
        assert_relative_eq!(out[0].normal, Vector3::y(), epsilon = 1e-9);
        assert_relative_eq!(out[0].depth(), 0.02, epsilon = 1e-9);
    }

    #[test]
    fn test_capsule_sphere() {
        let cap = pose(0.0, 0.0, 0.0);
        let mut out = Vec::new();
        // Sphere beside the capsule's upper half
        capsule_sphere(&cap, 0.2, 1.0, &Point3::new(0.5, 0.5, 0.0), 0.4, 0.0, &mut out);
        assert_eq!(out.len(), 1);
        assert_relative_eq!(out[0].normal, -Vector3::x(), epsilon = 1e-12);
        assert_relative_eq!(out[0].depth(), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_capsule_capsule_crossing() {
        let qa = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        let qb = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), FRAC_PI_2);
        let a = Isometry3::from_parts(Translation3::new(0.0, 0.35, 0.0), qa);
        let b = Isometry3::from_parts(Translation3::identity(), qb);

        let mut out = Vec::new();
        capsule_capsule(&a, 0.2, 1.0, &b, 0.2, 1.0, 0.0, &mut out);
        assert_eq!(out.len(), 1);
        assert_relative_eq!(out[0].normal, Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(out[0].depth(), 0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_capsule_capsule_parallel() {
        let a = pose(0.35, 0.0, 0.0);
        let b = pose(0.0, 0.0, 0.0);
        let mut out = Vec::new();
        capsule_capsule(&a, 0.2, 1.0, &b, 0.2, 1.0, 0.0, &mut out);
        // One contact per end, duplicates removed
        assert_eq!(out.len(), 2);
        for c in &out {
            assert_relative_eq!(c.normal, Vector3::x(), epsilon = 1e-12);
            assert_relative_eq!(c.depth(), 0.05, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_capsule_lying_on_box() {
        let (g, gh) = ground();
        let q = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        let cap = Isometry3::from_parts(Translation3::new(0.0, 0.24, 0.0), q);

        let mut out = Vec::new();
        capsule_box(&cap, 0.2, 0.5, &g, &gh, 0.0, &mut out);
        assert!(out.len() >= 2);
        for c in &out {
            assert_relative_eq!(c.normal, Vector3::y(), epsilon = 1e-9);
            assert_relative_eq!(c.depth(), 0.01, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_capsule_standing_on_box() {
        let (g, gh) = ground();
        let cap = pose(0.0, 0.05 + 0.2 + 0.5 - 0.02, 0.0);

        let mut out = Vec::new();
        capsule_box(&cap, 0.2, 0.5, &g, &gh, 0.0, &mut out);
        assert_eq!(out.len(), 1);
        assert_relative_eq!(out[0].depth(), 0.02, epsilon = 1e-9);
        assert_relative_eq!(out[0].point_a, Point3::new(0.0, 0.03, 0.0), epsilon = 1e-9);
    }
}
