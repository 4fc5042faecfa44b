//! Contact generation for candidate pairs.

use nalgebra::{Isometry3, Translation3, Vector3};
use tracing::trace;
use xpbd_types::{BodyStore, ContactConfig, Shape};

use crate::contact::{CandidatePair, Contact, ContactGeometry};
use crate::narrow;

/// Distance a body's surface can travel in one step: linear motion plus
/// rotation swept at the bounding radius.
#[must_use]
pub fn surface_travel(store: &BodyStore, i: usize, dt: f64) -> f64 {
    let linear = store.linear_velocity(i).norm();
    let angular = store.angular_velocity(i).norm() * store.shape(i).bounding_radius();
    (linear + angular) * dt
}

/// Detection margin for a pair: the configured margin, widened by how far
/// the two surfaces can close this step when speculative contacts are on.
#[must_use]
pub fn pair_margin(store: &BodyStore, pair: CandidatePair, config: &ContactConfig, dt: f64) -> f64 {
    if config.speculative {
        config.margin + surface_travel(store, pair.a, dt) + surface_travel(store, pair.b, dt)
    } else {
        config.margin
    }
}

/// Generate contacts for every candidate pair at the store's current
/// (predicted) poses.
///
/// `out` is cleared first. Pairs are visited in order and each pair's points
/// are appended in the order the narrowphase produces them, so the output is
/// deterministic for a given input.
pub fn generate_contacts(
    pairs: &[CandidatePair],
    store: &BodyStore,
    config: &ContactConfig,
    dt: f64,
    out: &mut Vec<Contact>,
) {
    out.clear();
    let mut scratch = Vec::with_capacity(8);

    for &pair in pairs {
        let margin = pair_margin(store, pair, config, dt);
        scratch.clear();
        collide(store, pair.a, pair.b, margin, &mut scratch);

        let friction = config
            .friction_combine
            .mix(store.friction(pair.a), store.friction(pair.b));

        for g in &scratch {
            out.push(make_contact(store, pair, g, friction, config.compliance));
        }
    }

    trace!(pairs = pairs.len(), contacts = out.len(), "narrowphase");
}

/// Dispatch on the ordered pair of shape kinds.
///
/// Routines are written for one ordering; the mirrored ordering calls the
/// same routine with the bodies swapped and flips the result.
pub fn collide(store: &BodyStore, a: usize, b: usize, margin: f64, out: &mut Vec<ContactGeometry>) {
    let pose_a = pose(store, a);
    let pose_b = pose(store, b);
    let center_a = store.position(a);
    let center_b = store.position(b);

    match (*store.shape(a), *store.shape(b)) {
        (Shape::Sphere { radius: ra }, Shape::Sphere { radius: rb }) => {
            narrow::sphere_sphere(&center_a, ra, &center_b, rb, margin, out);
        }
        (Shape::Sphere { radius }, Shape::Box { half_extents }) => {
            narrow::sphere_box(&center_a, radius, &pose_b, &half_extents, margin, out);
        }
        (Shape::Box { half_extents }, Shape::Sphere { radius }) => flipped(out, |o| {
            narrow::sphere_box(&center_b, radius, &pose_a, &half_extents, margin, o);
        }),
        (Shape::Box { half_extents: ha }, Shape::Box { half_extents: hb }) => {
            narrow::box_box(&pose_a, &ha, &pose_b, &hb, margin, out);
        }
        (
            Shape::Capsule {
                radius,
                half_length,
            },
            Shape::Sphere { radius: rs },
        ) => {
            narrow::capsule_sphere(&pose_a, radius, half_length, &center_b, rs, margin, out);
        }
        (
            Shape::Sphere { radius: rs },
            Shape::Capsule {
                radius,
                half_length,
            },
        ) => flipped(out, |o| {
            narrow::capsule_sphere(&pose_b, radius, half_length, &center_a, rs, margin, o);
        }),
        (
            Shape::Capsule {
                radius: ra,
                half_length: la,
            },
            Shape::Capsule {
                radius: rb,
                half_length: lb,
            },
        ) => {
            narrow::capsule_capsule(&pose_a, ra, la, &pose_b, rb, lb, margin, out);
        }
        (
            Shape::Capsule {
                radius,
                half_length,
            },
            Shape::Box { half_extents },
        ) => {
            narrow::capsule_box(&pose_a, radius, half_length, &pose_b, &half_extents, margin, out);
        }
        (
            Shape::Box { half_extents },
            Shape::Capsule {
                radius,
                half_length,
            },
        ) => flipped(out, |o| {
            narrow::capsule_box(&pose_b, radius, half_length, &pose_a, &half_extents, margin, o);
        }),
    }
}

/// Run a routine with the bodies swapped and flip what it appended.
fn flipped(out: &mut Vec<ContactGeometry>, routine: impl FnOnce(&mut Vec<ContactGeometry>)) {
    let start = out.len();
    routine(out);
    for g in &mut out[start..] {
        *g = g.flip();
    }
}

fn pose(store: &BodyStore, i: usize) -> Isometry3<f64> {
    Isometry3::from_parts(
        Translation3::from(store.position(i).coords),
        store.orientation(i),
    )
}

fn make_contact(
    store: &BodyStore,
    pair: CandidatePair,
    g: &ContactGeometry,
    friction: f64,
    compliance: f64,
) -> Contact {
    let (a, b) = (pair.a, pair.b);
    let r_a = g.point_a - store.position(a);
    let r_b = g.point_b - store.position(b);

    let v_a = store.linear_velocity(a) + store.angular_velocity(a).cross(&r_a);
    let v_b = store.linear_velocity(b) + store.angular_velocity(b).cross(&r_b);

    Contact {
        body_a: a,
        body_b: b,
        point: nalgebra::center(&g.point_a, &g.point_b),
        normal: g.normal,
        depth: g.depth(),
        local_anchor_a: store.orientation(a).inverse_transform_vector(&r_a),
        local_anchor_b: store.orientation(b).inverse_transform_vector(&r_b),
        friction,
        compliance,
        lambda_normal: 0.0,
        lambda_tangent: 0.0,
        normal_impulse: 0.0,
        tangent_impulse: Vector3::zeros(),
        pre_solve_normal_speed: (v_a - v_b).dot(&g.normal),
    }
}
