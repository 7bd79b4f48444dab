//! Union-find island assembly: groups touching contacts, joints, and their
//! bodies into connected components with O(1) amortized incremental linking
//! and a deferred flood-fill split when enough constraints have been
//! removed from an island to plausibly disconnect it.

use std::collections::{HashMap, HashSet};

use crate::utils::allocator::{Arena, Id};

/// One constraint edge recorded against an island, kept so a later split can
/// rebuild adjacency without consulting the world's contact/joint arenas.
#[derive(Debug, Clone, Copy)]
struct Edge {
    constraint_id: Id,
    body_a: Id,
    body_b: Id,
    is_joint: bool,
}

/// A maximal connected component of bodies joined by touching contacts and
/// joints. Non-root islands (`parent.is_some()`)
/// are tombstones kept only so union-find lookups can path-compress through
/// them; callers should always resolve through [`IslandBuilder::find_root`].
#[derive(Debug, Clone)]
pub struct Island {
    pub id: Id,
    parent: Option<Id>,
    pub body_ids: Vec<Id>,
    edges: Vec<Edge>,
    /// Number of constraints removed since the last split check; amortizes
    /// the flood-fill cost.
    pub constraint_remove_count: u32,
    pub set_index: u32,
}

impl Island {
    fn new(id: Id) -> Self {
        Self {
            id,
            parent: None,
            body_ids: Vec::new(),
            edges: Vec::new(),
            constraint_remove_count: 0,
            set_index: 0,
        }
    }

    pub fn contact_ids(&self) -> impl Iterator<Item = Id> + '_ {
        self.edges.iter().filter(|e| !e.is_joint).map(|e| e.constraint_id)
    }

    pub fn joint_ids(&self) -> impl Iterator<Item = Id> + '_ {
        self.edges.iter().filter(|e| e.is_joint).map(|e| e.constraint_id)
    }
}

/// How many constraint removals an island tolerates before a split check
/// runs: a later pass checks whether any island whose removals exceed this
/// threshold may have become disconnected.
pub const SPLIT_THRESHOLD: u32 = 4;

pub struct IslandBuilder {
    islands: Arena<Island>,
    /// Which island a body currently belongs to (possibly non-root; resolve
    /// through `find_root`). Static bodies never appear here.
    body_island: HashMap<Id, Id>,
}

impl IslandBuilder {
    pub fn new() -> Self {
        Self {
            islands: Arena::new(0),
            body_island: HashMap::new(),
        }
    }

    /// Resolves `island_id` to its union-find root, compressing the path.
    pub fn find_root(&mut self, island_id: Id) -> Id {
        let mut path = vec![island_id];
        let mut current = island_id;
        loop {
            let parent = self.islands.get(current).and_then(|i| i.parent);
            match parent {
                Some(p) => {
                    path.push(p);
                    current = p;
                }
                None => break,
            }
        }
        let root = current;
        for node in path {
            if node != root {
                if let Some(island) = self.islands.get_mut(node) {
                    island.parent = Some(root);
                }
            }
        }
        root
    }

    fn island_of(&mut self, body: Id) -> Option<Id> {
        self.body_island.get(&body).copied().map(|i| self.find_root(i))
    }

    /// Public lookup of which island a body currently belongs to, resolved
    /// to its union-find root. `None` for static bodies and bodies with no
    /// constraints linked yet.
    pub fn island_of_body(&mut self, body: Id) -> Option<Id> {
        self.island_of(body)
    }

    fn new_island_for(&mut self, body: Id) -> Id {
        let id = self.islands.insert(Island::new(Id::NULL));
        if let Some(island) = self.islands.get_mut(id) {
            island.id = id;
            island.body_ids.push(body);
        }
        self.body_island.insert(body, id);
        id
    }

    /// Merges the islands of `body_a`/`body_b` (creating islands for
    /// whichever endpoint doesn't have one yet) and appends the constraint
    /// as an edge. A `None` endpoint is a static body, which never joins an
    /// island. Returns the resulting root island id, or `None` if both
    /// endpoints are static.
    fn link(
        &mut self,
        body_a: Option<Id>,
        body_b: Option<Id>,
        constraint_id: Id,
        is_joint: bool,
    ) -> Option<Id> {
        let (dyn_a, dyn_b) = (body_a, body_b);
        let root = match (dyn_a, dyn_b) {
            (None, None) => return None,
            (Some(a), None) => self.island_of(a).unwrap_or_else(|| self.new_island_for(a)),
            (None, Some(b)) => self.island_of(b).unwrap_or_else(|| self.new_island_for(b)),
            (Some(a), Some(b)) => {
                let island_a = self.island_of(a).unwrap_or_else(|| self.new_island_for(a));
                let island_b = self.island_of(b).unwrap_or_else(|| self.new_island_for(b));
                self.merge(island_a, island_b)
            }
        };

        if let Some(island) = self.islands.get_mut(root) {
            island.edges.push(Edge {
                constraint_id,
                body_a: body_a.unwrap_or(Id::NULL),
                body_b: body_b.unwrap_or(Id::NULL),
                is_joint,
            });
        }
        Some(root)
    }

    pub fn link_contact(&mut self, body_a: Option<Id>, body_b: Option<Id>, contact_id: Id) -> Option<Id> {
        self.link(body_a, body_b, contact_id, false)
    }

    pub fn link_joint(&mut self, body_a: Option<Id>, body_b: Option<Id>, joint_id: Id) -> Option<Id> {
        self.link(body_a, body_b, joint_id, true)
    }

    /// Merges by lower-id-becomes-root, splicing the smaller
    /// island's body/edge lists into the larger and returning the new root.
    fn merge(&mut self, island_a: Id, island_b: Id) -> Id {
        if island_a == island_b {
            return island_a;
        }
        let (root, absorbed) = if island_a.to_bits() <= island_b.to_bits() {
            (island_a, island_b)
        } else {
            (island_b, island_a)
        };

        let (absorbed_bodies, absorbed_edges) = {
            let absorbed_island = self.islands.get_mut(absorbed).expect("absorbed island must exist");
            (
                std::mem::take(&mut absorbed_island.body_ids),
                std::mem::take(&mut absorbed_island.edges),
            )
        };
        for body in &absorbed_bodies {
            self.body_island.insert(*body, root);
        }
        if let Some(root_island) = self.islands.get_mut(root) {
            root_island.body_ids.extend(absorbed_bodies);
            root_island.edges.extend(absorbed_edges);
        }
        // Leave the absorbed island in place as a tombstone (same `Id`, same
        // arena generation) so an in-flight `find_root` path still resolves.
        if let Some(absorbed_island) = self.islands.get_mut(absorbed) {
            absorbed_island.parent = Some(root);
        }
        root
    }

    /// Removes a constraint's edge from its island and bumps the removal
    /// counter; does not itself perform the split (see [`Self::maybe_split`]).
    pub fn unlink_constraint(&mut self, island_id: Id, constraint_id: Id) {
        let root = self.find_root(island_id);
        if let Some(island) = self.islands.get_mut(root) {
            island.edges.retain(|e| e.constraint_id != constraint_id);
            island.constraint_remove_count += 1;
        }
    }

    /// If `island_id`'s removal counter has crossed [`SPLIT_THRESHOLD`],
    /// flood-fills its current edge set and splits off any body components
    /// no longer connected to the rest. Returns the newly created island
    /// ids (the original id is kept by the largest component).
    pub fn maybe_split(&mut self, island_id: Id) -> Vec<Id> {
        let root = self.find_root(island_id);
        let Some(island) = self.islands.get(root) else {
            return Vec::new();
        };
        if island.constraint_remove_count < SPLIT_THRESHOLD {
            return Vec::new();
        }

        let mut adjacency: HashMap<Id, Vec<Id>> = HashMap::new();
        for body in &island.body_ids {
            adjacency.entry(*body).or_default();
        }
        for edge in &island.edges {
            if edge.body_a != Id::NULL && edge.body_b != Id::NULL {
                adjacency.entry(edge.body_a).or_default().push(edge.body_b);
                adjacency.entry(edge.body_b).or_default().push(edge.body_a);
            }
        }

        let mut visited: HashSet<Id> = HashSet::new();
        let mut components: Vec<Vec<Id>> = Vec::new();
        for &body in &island.body_ids {
            if visited.contains(&body) {
                continue;
            }
            let mut stack = vec![body];
            let mut component = Vec::new();
            while let Some(node) = stack.pop() {
                if !visited.insert(node) {
                    continue;
                }
                component.push(node);
                if let Some(neighbors) = adjacency.get(&node) {
                    stack.extend(neighbors.iter().copied());
                }
            }
            components.push(component);
        }

        if components.len() <= 1 {
            if let Some(island) = self.islands.get_mut(root) {
                island.constraint_remove_count = 0;
            }
            return Vec::new();
        }

        // Largest component keeps the original island id; every other
        // component becomes a fresh island with its own edges.
        components.sort_by_key(|c| std::cmp::Reverse(c.len()));
        let all_edges = island.edges.clone();
        let mut new_ids = Vec::new();

        for component in components.iter().skip(1) {
            let member_set: HashSet<Id> = component.iter().copied().collect();
            let new_id = self.islands.insert(Island::new(Id::NULL));
            let edges: Vec<Edge> = all_edges
                .iter()
                .copied()
                .filter(|e| member_set.contains(&e.body_a) || member_set.contains(&e.body_b))
                .collect();
            if let Some(new_island) = self.islands.get_mut(new_id) {
                new_island.id = new_id;
                new_island.body_ids = component.clone();
                new_island.edges = edges;
            }
            for body in component {
                self.body_island.insert(*body, new_id);
            }
            new_ids.push(new_id);
        }

        let kept = components[0].clone();
        let kept_set: HashSet<Id> = kept.iter().copied().collect();
        if let Some(root_island) = self.islands.get_mut(root) {
            root_island.body_ids = kept;
            root_island.edges.retain(|e| kept_set.contains(&e.body_a) || kept_set.contains(&e.body_b));
            root_island.constraint_remove_count = 0;
        }

        new_ids
    }

    pub fn get(&self, island_id: Id) -> Option<&Island> {
        self.islands.get(island_id)
    }

    pub fn islands(&self) -> impl Iterator<Item = (Id, &Island)> {
        self.islands.iter().filter(|(_, i)| i.parent.is_none())
    }

    /// Removes `body` from bookkeeping entirely (its owning body was
    /// destroyed or became static).
    pub fn remove_body(&mut self, body: Id) {
        if let Some(island_id) = self.body_island.remove(&body) {
            let root = self.find_root(island_id);
            if let Some(island) = self.islands.get_mut(root) {
                island.body_ids.retain(|b| *b != body);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linking_a_contact_between_two_fresh_bodies_creates_one_island() {
        let mut builder = IslandBuilder::new();
        let a = Id::from_bits(1);
        let b = Id::from_bits(2);
        let root = builder.link_contact(Some(a), Some(b), Id::from_bits(100)).unwrap();
        assert_eq!(builder.find_root(root), root);
        let island = builder.get(root).unwrap();
        assert_eq!(island.body_ids.len(), 2);
    }

    #[test]
    fn chained_links_merge_into_a_single_island() {
        let mut builder = IslandBuilder::new();
        let (a, b, c) = (Id::from_bits(1), Id::from_bits(2), Id::from_bits(3));
        let root1 = builder.link_contact(Some(a), Some(b), Id::from_bits(100)).unwrap();
        let root2 = builder.link_contact(Some(b), Some(c), Id::from_bits(101)).unwrap();
        assert_eq!(builder.find_root(root1), builder.find_root(root2));
    }

    #[test]
    fn static_body_never_joins_an_island() {
        let mut builder = IslandBuilder::new();
        let a = Id::from_bits(1);
        let root = builder.link_contact(Some(a), None, Id::from_bits(100)).unwrap();
        let island = builder.get(root).unwrap();
        assert_eq!(island.body_ids, vec![a]);
    }

    #[test]
    fn removing_the_bridging_constraint_splits_the_island_after_threshold() {
        let mut builder = IslandBuilder::new();
        let (a, b) = (Id::from_bits(1), Id::from_bits(2));
        let root = builder.link_contact(Some(a), Some(b), Id::from_bits(100)).unwrap();

        for i in 0..SPLIT_THRESHOLD {
            builder.unlink_constraint(root, Id::from_bits(900 + i as u64));
        }
        builder.unlink_constraint(root, Id::from_bits(100));
        let new_islands = builder.maybe_split(root);
        assert_eq!(new_islands.len(), 1);

        let root_after = builder.find_root(root);
        let a_island_of = builder.island_of(a).unwrap();
        let a_island = builder.find_root(a_island_of);
        let b_island_of = builder.island_of(b).unwrap();
        let b_island = builder.find_root(b_island_of);
        assert_ne!(a_island, b_island);
        assert!(a_island == root_after || b_island == root_after);
    }
}
