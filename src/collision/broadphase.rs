use std::collections::{HashMap, HashSet};

use glam::Vec2;

use crate::core::shape::{Filter, ShapeType};
use crate::utils::allocator::Id;

/// Axis-aligned bounding box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub lower: Vec2,
    pub upper: Vec2,
}

impl Aabb {
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.lower.x <= other.upper.x
            && other.lower.x <= self.upper.x
            && self.lower.y <= other.upper.y
            && other.lower.y <= self.upper.y
    }

    pub fn contains(&self, other: &Aabb) -> bool {
        self.lower.x <= other.lower.x
            && self.lower.y <= other.lower.y
            && other.upper.x <= self.upper.x
            && other.upper.y <= self.upper.y
    }

    pub fn fattened(&self, margin: f32) -> Aabb {
        Aabb {
            lower: self.lower - Vec2::splat(margin),
            upper: self.upper + Vec2::splat(margin),
        }
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            lower: self.lower.min(other.lower),
            upper: self.upper.max(other.upper),
        }
    }

    pub fn center(&self) -> Vec2 {
        (self.lower + self.upper) * 0.5
    }
}

/// Per-shape broad-phase proxy: its tight AABB, a fattened "enlarged" AABB
/// that absorbs small motion without re-inserting into the grid every step,
/// and the filter used to reject pairs before any narrow-phase work.
#[derive(Debug, Clone)]
struct Proxy {
    tight: Aabb,
    fat: Aabb,
    body_id: Id,
    filter: Filter,
    is_static: bool,
}

/// Uniform-grid broad phase exposing a move-list / pair-set contract:
/// proxies whose tight AABB escapes its fattened AABB are queued in
/// `moved`, and `find_new_pairs` diffs freshly-queried
/// overlaps against the persistent `pair_set` so callers only see pairs
/// that genuinely appeared or disappeared this step.
pub struct BroadPhase {
    cell_size: f32,
    margin: f32,
    grid: HashMap<(i32, i32), Vec<Id>>,
    proxies: HashMap<Id, Proxy>,
    moved: Vec<Id>,
    pair_set: HashSet<(Id, Id)>,
}

impl BroadPhase {
    pub fn new(cell_size: f32, margin: f32) -> Self {
        Self {
            cell_size,
            margin,
            grid: HashMap::new(),
            proxies: HashMap::new(),
            moved: Vec::new(),
            pair_set: HashSet::new(),
        }
    }

    fn cell_of(&self, p: Vec2) -> (i32, i32) {
        (
            (p.x / self.cell_size).floor() as i32,
            (p.y / self.cell_size).floor() as i32,
        )
    }

    fn cells_of(&self, aabb: &Aabb) -> impl Iterator<Item = (i32, i32)> {
        let (x0, y0) = self.cell_of(aabb.lower);
        let (x1, y1) = self.cell_of(aabb.upper);
        (x0..=x1).flat_map(move |x| (y0..=y1).map(move |y| (x, y)))
    }

    fn insert_into_grid(&mut self, shape_id: Id, fat: &Aabb) {
        for cell in self.cells_of(fat) {
            self.grid.entry(cell).or_default().push(shape_id);
        }
    }

    fn remove_from_grid(&mut self, shape_id: Id, fat: &Aabb) {
        for cell in self.cells_of(fat) {
            if let Some(bucket) = self.grid.get_mut(&cell) {
                bucket.retain(|id| *id != shape_id);
            }
        }
    }

    /// Creates (or replaces) a proxy for `shape_id` with a fresh fattened
    /// AABB and queues it for pair re-evaluation.
    pub fn create_proxy(
        &mut self,
        shape_id: Id,
        body_id: Id,
        tight: Aabb,
        filter: Filter,
        is_static: bool,
    ) {
        let fat = tight.fattened(self.margin);
        self.insert_into_grid(shape_id, &fat);
        self.proxies.insert(
            shape_id,
            Proxy {
                tight,
                fat,
                body_id,
                filter,
                is_static,
            },
        );
        self.moved.push(shape_id);
    }

    pub fn destroy_proxy(&mut self, shape_id: Id) {
        if let Some(proxy) = self.proxies.remove(&shape_id) {
            self.remove_from_grid(shape_id, &proxy.fat);
        }
        self.moved.retain(|id| *id != shape_id);
    }

    /// Updates a proxy's tight AABB. Only re-fattens and re-inserts into
    /// the grid (queuing a move event) if the tight box escaped the
    /// existing fat box — the whole point of the enlarged-AABB scheme.
    pub fn update_proxy(&mut self, shape_id: Id, tight: Aabb) {
        let Some(proxy) = self.proxies.get_mut(&shape_id) else {
            return;
        };
        proxy.tight = tight;
        if !proxy.fat.contains(&tight) {
            let old_fat = proxy.fat;
            let new_fat = tight.fattened(self.margin);
            proxy.fat = new_fat;
            self.remove_from_grid(shape_id, &old_fat);
            self.insert_into_grid(shape_id, &new_fat);
            self.moved.push(shape_id);
        }
    }

    fn query(&self, aabb: &Aabb) -> Vec<Id> {
        let mut results = Vec::new();
        for cell in self.cells_of(aabb) {
            if let Some(bucket) = self.grid.get(&cell) {
                results.extend(bucket.iter().copied());
            }
        }
        results.sort_by_key(|id| id.to_bits());
        results.dedup();
        results
    }

    /// Diffs current overlaps (seeded from every moved proxy's fat AABB)
    /// against `pair_set`, returning `(new_pairs, removed_pairs)` and
    /// updating `pair_set` in place. Called once per step after all shape
    /// transforms for the step have been synced.
    pub fn find_new_pairs(&mut self) -> (Vec<(Id, Id)>, Vec<(Id, Id)>) {
        let moved = std::mem::take(&mut self.moved);
        let mut touched: HashSet<(Id, Id)> = HashSet::new();

        for shape_id in &moved {
            let Some(proxy) = self.proxies.get(shape_id) else {
                continue;
            };
            let candidates = self.query(&proxy.fat);
            for other_id in candidates {
                if other_id == *shape_id {
                    continue;
                }
                let Some(other) = self.proxies.get(&other_id) else {
                    continue;
                };
                if proxy.is_static && other.is_static {
                    continue;
                }
                if proxy.body_id == other.body_id {
                    continue;
                }
                if !proxy.filter.should_collide(&other.filter) {
                    continue;
                }
                if !proxy.fat.overlaps(&other.fat) {
                    continue;
                }
                let key = order_pair(*shape_id, other_id);
                touched.insert(key);
            }
        }

        let mut new_pairs = Vec::new();
        for key in &touched {
            if self.pair_set.insert(*key) {
                new_pairs.push(*key);
            }
        }

        // A pair only disappears when one side's fat AABB no longer
        // overlaps the other's; re-check all previously known pairs that
        // touch a moved proxy this step.
        let mut removed_pairs = Vec::new();
        let moved_set: HashSet<Id> = moved.iter().copied().collect();
        self.pair_set.retain(|(a, b)| {
            if !moved_set.contains(a) && !moved_set.contains(b) {
                return true;
            }
            let still_overlaps = match (self.proxies.get(a), self.proxies.get(b)) {
                (Some(pa), Some(pb)) => pa.fat.overlaps(&pb.fat),
                _ => false,
            };
            if !still_overlaps {
                removed_pairs.push((*a, *b));
            }
            still_overlaps
        });

        (new_pairs, removed_pairs)
    }
}

fn order_pair(a: Id, b: Id) -> (Id, Id) {
    if a.to_bits() < b.to_bits() {
        (a, b)
    } else {
        (b, a)
    }
}

/// Computes a shape's tight world-space AABB.
pub fn shape_aabb(shape_type: &ShapeType, transform: &crate::core::types::Transform2) -> Aabb {
    let (local_lo, local_hi) = shape_type.local_bounds();
    let corners = [
        Vec2::new(local_lo.x, local_lo.y),
        Vec2::new(local_hi.x, local_lo.y),
        Vec2::new(local_lo.x, local_hi.y),
        Vec2::new(local_hi.x, local_hi.y),
    ];
    let mut lo = Vec2::splat(f32::MAX);
    let mut hi = Vec2::splat(f32::MIN);
    for corner in corners {
        let world = transform.apply(corner);
        lo = lo.min(world);
        hi = hi.max(world);
    }
    Aabb { lower: lo, upper: hi }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Transform2;
    use crate::utils::math::Rot;

    fn aabb_at(x: f32, y: f32, half: f32) -> Aabb {
        Aabb {
            lower: Vec2::new(x - half, y - half),
            upper: Vec2::new(x + half, y + half),
        }
    }

    #[test]
    fn overlapping_proxies_form_a_pair() {
        let mut bp = BroadPhase::new(5.0, 0.1);
        let a = Id::from_bits(1);
        let b = Id::from_bits(2);
        bp.create_proxy(a, Id::from_bits(100), aabb_at(0.0, 0.0, 1.0), Filter::default(), false);
        bp.create_proxy(b, Id::from_bits(200), aabb_at(1.5, 0.0, 1.0), Filter::default(), false);
        let (new_pairs, removed) = bp.find_new_pairs();
        assert_eq!(new_pairs.len(), 1);
        assert!(removed.is_empty());
    }

    #[test]
    fn separated_proxies_form_no_pair() {
        let mut bp = BroadPhase::new(5.0, 0.1);
        let a = Id::from_bits(1);
        let b = Id::from_bits(2);
        bp.create_proxy(a, Id::from_bits(100), aabb_at(0.0, 0.0, 1.0), Filter::default(), false);
        bp.create_proxy(b, Id::from_bits(200), aabb_at(20.0, 0.0, 1.0), Filter::default(), false);
        let (new_pairs, _) = bp.find_new_pairs();
        assert!(new_pairs.is_empty());
    }

    #[test]
    fn moving_apart_emits_a_removed_pair() {
        let mut bp = BroadPhase::new(5.0, 0.1);
        let a = Id::from_bits(1);
        let b = Id::from_bits(2);
        bp.create_proxy(a, Id::from_bits(100), aabb_at(0.0, 0.0, 1.0), Filter::default(), false);
        bp.create_proxy(b, Id::from_bits(200), aabb_at(1.5, 0.0, 1.0), Filter::default(), false);
        bp.find_new_pairs();
        bp.update_proxy(b, aabb_at(50.0, 0.0, 1.0));
        let (_, removed) = bp.find_new_pairs();
        assert_eq!(removed.len(), 1);
    }

    #[test]
    fn two_static_shapes_never_pair() {
        let mut bp = BroadPhase::new(5.0, 0.1);
        let a = Id::from_bits(1);
        let b = Id::from_bits(2);
        bp.create_proxy(a, Id::from_bits(100), aabb_at(0.0, 0.0, 1.0), Filter::default(), true);
        bp.create_proxy(b, Id::from_bits(200), aabb_at(0.5, 0.0, 1.0), Filter::default(), true);
        let (new_pairs, _) = bp.find_new_pairs();
        assert!(new_pairs.is_empty());
    }

    #[test]
    fn shape_aabb_rotates_with_transform() {
        let shape = ShapeType::Polygon {
            vertices: vec![
                Vec2::new(-1.0, -1.0),
                Vec2::new(1.0, -1.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(-1.0, 1.0),
            ],
            radius: 0.0,
        };
        let t = Transform2::new(Vec2::ZERO, Rot::from_angle(std::f32::consts::FRAC_PI_4));
        let aabb = shape_aabb(&shape, &t);
        assert!(aabb.upper.x > 1.0);
    }
}
