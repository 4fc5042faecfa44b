//! Broad-phase pair generation using a uniform spatial hash.
//!
//! The broad phase narrows all-pairs collision checking down to the pairs
//! whose bounding boxes overlap, so the narrow phase only runs where contact
//! is possible.
//!
//! # Algorithm
//!
//! [`SpatialHash`] partitions space into cubic cells:
//! 1. Compute an AABB per body from its predicted pose, expanded by the
//!    distance its surface can travel this step
//! 2. Pick the cell size (configured, or the largest movable AABB extent)
//! 3. Insert every body into each cell its AABB overlaps
//! 4. Emit the pairs that share a cell and whose AABBs overlap
//!
//! Bodies that would cover more than [`MAX_CELLS_PER_BODY`] cells (ground
//! slabs, walls) are kept on a separate list and tested against every other
//! body instead, so one huge static body cannot flood the table.
//!
//! Output pairs are sorted ascending and deduplicated. Pairs of two immovable
//! bodies are dropped.
//!
//! # Example
//!
//! ```
//! use xpbd_core::broad_phase::{BroadPhase, SpatialHash, compute_aabbs};
//! use xpbd_types::{BodyArrays, BodyDesc, BodyStore, ContactConfig};
//! use nalgebra::{Point3, Vector3};
//!
//! let store = BodyStore::from_arrays(BodyArrays::from_bodies([
//!     BodyDesc::fixed_cuboid(Vector3::new(50.0, 0.05, 50.0)),
//!     BodyDesc::sphere(1.0, 0.5).at(Point3::new(0.0, 0.5, 0.0)),
//!     BodyDesc::sphere(1.0, 0.5).at(Point3::new(10.0, 0.5, 0.0)),
//! ]))
//! .unwrap();
//!
//! let mut aabbs = Vec::new();
//! compute_aabbs(&store, &ContactConfig::default(), 0.016, &mut aabbs);
//!
//! let mut pairs = Vec::new();
//! SpatialHash::new().find_potential_pairs(&store, &aabbs, &mut pairs);
//!
//! // Both spheres touch the ground, but not each other
//! assert_eq!(pairs.len(), 2);
//! ```

use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};
use tracing::{trace, warn};
use xpbd_contact::{CandidatePair, surface_travel};
use xpbd_types::{BodyStore, ContactConfig};

/// Bodies covering more cells than this are tested against all others.
pub const MAX_CELLS_PER_BODY: i64 = 64;

/// Cell size used when no usable extent can be derived from the scene.
const FALLBACK_CELL_SIZE: f64 = 1.0;

/// An axis-aligned bounding box (AABB) for broad-phase collision detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner of the bounding box.
    pub min: Point3<f64>,
    /// Maximum corner of the bounding box.
    pub max: Point3<f64>,
}

impl Aabb {
    /// Create a new AABB from min and max corners.
    #[must_use]
    pub const fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    /// Create an AABB from a center point and half-extents.
    #[must_use]
    pub fn from_center(center: Point3<f64>, half_extents: Vector3<f64>) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Check if this AABB overlaps with another. Touching boxes overlap.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Expand the AABB by a margin in all directions.
    #[must_use]
    pub fn expanded(&self, margin: f64) -> Self {
        let m = Vector3::repeat(margin);
        Self {
            min: self.min - m,
            max: self.max + m,
        }
    }

    /// Get the extent (size) along a specific axis.
    #[must_use]
    pub fn extent(&self, axis: Axis) -> f64 {
        self.max_on_axis(axis) - self.min_on_axis(axis)
    }

    /// Largest extent over the three axes.
    #[must_use]
    pub fn max_extent(&self) -> f64 {
        Axis::all()
            .into_iter()
            .map(|axis| self.extent(axis))
            .fold(0.0, f64::max)
    }

    /// Get the minimum value along a specific axis.
    #[must_use]
    pub fn min_on_axis(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.min.x,
            Axis::Y => self.min.y,
            Axis::Z => self.min.z,
        }
    }

    /// Get the maximum value along a specific axis.
    #[must_use]
    pub fn max_on_axis(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.max.x,
            Axis::Y => self.max.y,
            Axis::Z => self.max.z,
        }
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::new(Point3::origin(), Point3::origin())
    }
}

/// Coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// X-axis.
    X,
    /// Y-axis.
    Y,
    /// Z-axis.
    Z,
}

impl Axis {
    /// Get all three axes.
    #[must_use]
    pub const fn all() -> [Self; 3] {
        [Self::X, Self::Y, Self::Z]
    }
}

/// Tight world-space AABB of a body at its current pose.
#[must_use]
pub fn body_aabb(store: &BodyStore, i: usize) -> Aabb {
    let half = store.shape(i).aabb_half_extents(&store.orientation(i));
    Aabb::from_center(store.position(i), half)
}

/// Compute the expanded AABB of every body into `out`.
///
/// Each box grows by half the contact margin plus the distance the body's
/// surface can travel in `dt`. Two boxes grown this way overlap whenever the
/// narrow phase could report a contact for the pair.
pub fn compute_aabbs(store: &BodyStore, contact: &ContactConfig, dt: f64, out: &mut Vec<Aabb>) {
    out.clear();
    out.extend((0..store.len()).map(|i| {
        let travel = if contact.speculative {
            surface_travel(store, i, dt)
        } else {
            0.0
        };
        body_aabb(store, i).expanded(0.5 * contact.margin + travel)
    }));
}

/// Trait for broad-phase collision detection algorithms.
pub trait BroadPhase {
    /// Find all pairs of bodies that potentially collide.
    ///
    /// `aabbs[i]` is the bounding box of body `i`. `pairs` is cleared and
    /// filled with every pair of overlapping boxes where at least one body
    /// is movable, sorted ascending with no duplicates.
    fn find_potential_pairs(
        &mut self,
        store: &BodyStore,
        aabbs: &[Aabb],
        pairs: &mut Vec<CandidatePair>,
    );
}

/// Reference O(N²) broad phase that tests every pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForce;

impl BroadPhase for BruteForce {
    fn find_potential_pairs(
        &mut self,
        store: &BodyStore,
        aabbs: &[Aabb],
        pairs: &mut Vec<CandidatePair>,
    ) {
        pairs.clear();
        for i in 0..aabbs.len() {
            for j in (i + 1)..aabbs.len() {
                if store.is_static(i) && store.is_static(j) {
                    continue;
                }
                if aabbs[i].overlaps(&aabbs[j]) {
                    pairs.push(CandidatePair { a: i, b: j });
                }
            }
        }
    }
}

type CellKey = (i64, i64, i64);

/// Uniform-grid spatial hash broad phase.
///
/// Average O(N) for bodies of similar size spread through space. Cell
/// buckets live in a [`hashbrown::HashMap`] keyed by integer cell
/// coordinates, so only occupied cells cost memory.
#[derive(Debug, Clone, Default)]
pub struct SpatialHash {
    /// Fixed cell size, or `None` to derive it from the scene every step.
    cell_size: Option<f64>,
    /// Cell size used by the last query.
    last_cell_size: f64,
    cells: HashMap<CellKey, Vec<usize>>,
    oversized: Vec<usize>,
}

impl SpatialHash {
    /// Create a spatial hash that sizes its cells from the scene.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a spatial hash with a fixed cell size.
    ///
    /// A non-positive or non-finite size falls back to scene sizing.
    #[must_use]
    pub fn with_cell_size(cell_size: Option<f64>) -> Self {
        Self {
            cell_size,
            ..Self::default()
        }
    }

    /// Cell size used by the most recent query (0 before the first).
    #[must_use]
    pub fn last_cell_size(&self) -> f64 {
        self.last_cell_size
    }

    /// Number of bodies the last query treated as oversized.
    #[must_use]
    pub fn oversized_count(&self) -> usize {
        self.oversized.len()
    }

    /// Pick the cell size: configured, else the largest extent among movable
    /// bodies, else the largest extent overall.
    fn choose_cell_size(&self, store: &BodyStore, aabbs: &[Aabb]) -> f64 {
        if let Some(size) = self.cell_size.filter(|s| s.is_finite() && *s > 0.0) {
            return size;
        }

        let largest = |movable_only: bool| {
            aabbs
                .iter()
                .enumerate()
                .filter(|(i, _)| !movable_only || !store.is_static(*i))
                .map(|(_, aabb)| aabb.max_extent())
                .filter(|e| e.is_finite())
                .fold(0.0, f64::max)
        };

        let size = match largest(true) {
            s if s > 0.0 => s,
            _ => largest(false),
        };

        if size > 0.0 {
            size
        } else {
            if !aabbs.is_empty() {
                warn!(
                    fallback = FALLBACK_CELL_SIZE,
                    "degenerate body extents, using fallback cell size"
                );
            }
            FALLBACK_CELL_SIZE
        }
    }
}

/// Integer cell range covered by a box, inclusive on both ends.
fn cell_range(aabb: &Aabb, cell_size: f64) -> (CellKey, CellKey) {
    // Float to int casts saturate, so far-away or infinite boxes stay finite
    #[allow(clippy::cast_possible_truncation)]
    let cell = |v: f64| (v / cell_size).floor() as i64;
    (
        (cell(aabb.min.x), cell(aabb.min.y), cell(aabb.min.z)),
        (cell(aabb.max.x), cell(aabb.max.y), cell(aabb.max.z)),
    )
}

fn cell_count(lo: CellKey, hi: CellKey) -> i64 {
    let span = |a: i64, b: i64| b.saturating_sub(a).saturating_add(1).max(1);
    span(lo.0, hi.0)
        .saturating_mul(span(lo.1, hi.1))
        .saturating_mul(span(lo.2, hi.2))
}

impl BroadPhase for SpatialHash {
    fn find_potential_pairs(
        &mut self,
        store: &BodyStore,
        aabbs: &[Aabb],
        pairs: &mut Vec<CandidatePair>,
    ) {
        pairs.clear();
        self.cells.clear();
        self.oversized.clear();

        let cell_size = self.choose_cell_size(store, aabbs);
        self.last_cell_size = cell_size;

        // Insert in index order so every bucket is sorted ascending
        for (i, aabb) in aabbs.iter().enumerate() {
            let (lo, hi) = cell_range(aabb, cell_size);
            if cell_count(lo, hi) > MAX_CELLS_PER_BODY {
                self.oversized.push(i);
                continue;
            }
            for x in lo.0..=hi.0 {
                for y in lo.1..=hi.1 {
                    for z in lo.2..=hi.2 {
                        self.cells.entry((x, y, z)).or_default().push(i);
                    }
                }
            }
        }

        let mut push_if_overlapping = |i: usize, j: usize| {
            if i == j || (store.is_static(i) && store.is_static(j)) {
                return;
            }
            if aabbs[i].overlaps(&aabbs[j]) {
                pairs.push(CandidatePair::new(i, j));
            }
        };

        for bucket in self.cells.values() {
            for (k, &i) in bucket.iter().enumerate() {
                for &j in &bucket[k + 1..] {
                    push_if_overlapping(i, j);
                }
            }
        }

        for &i in &self.oversized {
            for j in 0..aabbs.len() {
                push_if_overlapping(i, j);
            }
        }

        pairs.sort_unstable();
        pairs.dedup();

        trace!(
            cell_size,
            cells = self.cells.len(),
            oversized = self.oversized.len(),
            pairs = pairs.len(),
            "broad phase"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use nalgebra::UnitQuaternion;
    use xpbd_types::{BodyArrays, BodyDesc};

    fn store(bodies: Vec<BodyDesc>) -> BodyStore {
        BodyStore::from_arrays(BodyArrays::from_bodies(bodies)).unwrap()
    }

    fn pairs_of(bp: &mut impl BroadPhase, store: &BodyStore) -> Vec<(usize, usize)> {
        let mut aabbs = Vec::new();
        compute_aabbs(store, &ContactConfig::default(), 0.01, &mut aabbs);
        let mut pairs = Vec::new();
        bp.find_potential_pairs(store, &aabbs, &mut pairs);
        pairs.into_iter().map(|p| (p.a, p.b)).collect()
    }

    #[test]
    fn test_aabb_overlap() {
        let a = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let b = Aabb::new(Point3::new(0.5, 0.5, 0.5), Point3::new(1.5, 1.5, 1.5));
        let c = Aabb::new(Point3::new(2.0, 0.0, 0.0), Point3::new(3.0, 1.0, 1.0));
        let touching = Aabb::new(Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));

        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(a.overlaps(&touching));
    }

    #[test]
    fn test_aabb_extents() {
        let a = Aabb::from_center(Point3::origin(), Vector3::new(1.0, 2.0, 0.5));
        assert_eq!(a.extent(Axis::X), 2.0);
        assert_eq!(a.extent(Axis::Y), 4.0);
        assert_eq!(a.max_extent(), 4.0);
        assert_eq!(a.expanded(0.5).extent(Axis::Z), 2.0);
    }

    #[test]
    fn test_rotated_box_aabb() {
        let store = store(vec![
            BodyDesc::cuboid(1.0, Vector3::new(1.0, 0.1, 0.1)).with_orientation(
                UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2),
            ),
        ]);
        let aabb = body_aabb(&store, 0);
        assert!((aabb.extent(Axis::Y) - 2.0).abs() < 1e-12);
        assert!((aabb.extent(Axis::X) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_expansion_includes_travel() {
        let store = store(vec![
            BodyDesc::sphere(1.0, 0.5).with_velocity(Vector3::new(10.0, 0.0, 0.0)),
        ]);
        let margin = ContactConfig::default().margin;
        let mut aabbs = Vec::new();
        compute_aabbs(&store, &ContactConfig::default().with_speculation(), 0.1, &mut aabbs);
        // radius + margin/2 + |v| dt
        let expected = 0.5 + 0.5 * margin + 1.0;
        assert!((aabbs[0].max.x - expected).abs() < 1e-12);

        compute_aabbs(&store, &ContactConfig::default(), 0.1, &mut aabbs);
        assert!((aabbs[0].max.x - (0.5 + 0.5 * margin)).abs() < 1e-12);
    }

    #[test]
    fn test_separated_spheres_no_pairs() {
        let store = store(vec![
            BodyDesc::sphere(1.0, 0.5),
            BodyDesc::sphere(1.0, 0.5).at(Point3::new(5.0, 0.0, 0.0)),
        ]);
        assert!(pairs_of(&mut SpatialHash::new(), &store).is_empty());
    }

    #[test]
    fn test_static_pairs_dropped() {
        let store = store(vec![
            BodyDesc::fixed_cuboid(Vector3::new(1.0, 1.0, 1.0)),
            BodyDesc::fixed_cuboid(Vector3::new(1.0, 1.0, 1.0)).at(Point3::new(1.0, 0.0, 0.0)),
        ]);
        assert!(pairs_of(&mut SpatialHash::new(), &store).is_empty());
        assert!(pairs_of(&mut BruteForce, &store).is_empty());
    }

    #[test]
    fn test_ground_slab_is_oversized() {
        let store = store(vec![
            BodyDesc::fixed_cuboid(Vector3::new(100.0, 0.05, 100.0)),
            BodyDesc::sphere(1.0, 0.5).at(Point3::new(-40.0, 0.5, 30.0)),
            BodyDesc::sphere(1.0, 0.5).at(Point3::new(40.0, 0.5, -30.0)),
        ]);
        let mut hash = SpatialHash::new();
        let pairs = pairs_of(&mut hash, &store);

        assert_eq!(pairs, vec![(0, 1), (0, 2)]);
        assert_eq!(hash.oversized_count(), 1);
        // Sized from the movable spheres, not the slab
        assert!(hash.last_cell_size() < 1.1);
    }

    #[test]
    fn test_fixed_cell_size() {
        let store = store(vec![
            BodyDesc::sphere(1.0, 0.5),
            BodyDesc::sphere(1.0, 0.5).at(Point3::new(0.9, 0.0, 0.0)),
        ]);
        let mut hash = SpatialHash::with_cell_size(Some(0.5));
        assert_eq!(pairs_of(&mut hash, &store), vec![(0, 1)]);
        assert_eq!(hash.last_cell_size(), 0.5);
        assert_eq!(hash.oversized_count(), 0);
    }

    #[test]
    fn test_matches_brute_force() {
        // Deterministic pseudo-random cloud
        let mut seed = 12345_u64;
        let mut next = move || {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            #[allow(clippy::cast_precision_loss)]
            let unit = (seed >> 11) as f64 / (1_u64 << 53) as f64;
            unit
        };

        let mut bodies = vec![BodyDesc::fixed_cuboid(Vector3::new(20.0, 0.1, 20.0))];
        for k in 0..150 {
            let at = Point3::new(next() * 10.0 - 5.0, next() * 4.0, next() * 10.0 - 5.0);
            let body = if k % 2 == 0 {
                BodyDesc::sphere(1.0, 0.1 + next() * 0.4)
            } else {
                BodyDesc::cuboid(1.0, Vector3::new(0.2, 0.3 + next() * 0.3, 0.2))
            };
            bodies.push(body.at(at));
        }
        let store = store(bodies);

        let hashed = pairs_of(&mut SpatialHash::new(), &store);
        let brute = pairs_of(&mut BruteForce, &store);
        assert!(!brute.is_empty());
        assert_eq!(hashed, brute);
    }

    #[test]
    fn test_empty_scene() {
        let store = store(vec![]);
        assert!(pairs_of(&mut SpatialHash::new(), &store).is_empty());
    }
}
