//! Constraint graph coloring: assigns each contact/joint to a color such
//! that no dynamic body appears twice within the same color, letting every
//! constraint within a color be relaxed in parallel. Greedy first-fit over
//! `K` regular colors with a final catch-all overflow color for constraints
//! that conflict with every regular one — the overflow color is always
//! solved serially.

use std::collections::HashSet;

use crate::config::GRAPH_COLOR_COUNT;
use crate::utils::allocator::Id;

/// Number of regular colors before falling back to the overflow color.
pub const NUM_COLORS: usize = GRAPH_COLOR_COUNT;

/// Index of the catch-all color; constraints here are relaxed serially.
pub const OVERFLOW_COLOR: usize = NUM_COLORS;

/// One color's occupancy set: the dynamic bodies already claimed by a
/// constraint in this color this step. Static bodies are never inserted —
/// any number of constraints touching the same static body may share a
/// color since a static body never moves during relaxation.
#[derive(Debug, Default, Clone)]
struct Color {
    occupied: HashSet<Id>,
}

impl Color {
    fn conflicts(&self, body_a: Option<Id>, body_b: Option<Id>) -> bool {
        body_a.is_some_and(|a| self.occupied.contains(&a)) || body_b.is_some_and(|b| self.occupied.contains(&b))
    }

    fn claim(&mut self, body_a: Option<Id>, body_b: Option<Id>) {
        if let Some(a) = body_a {
            self.occupied.insert(a);
        }
        if let Some(b) = body_b {
            self.occupied.insert(b);
        }
    }

    fn release(&mut self, body_a: Option<Id>, body_b: Option<Id>) {
        if let Some(a) = body_a {
            self.occupied.remove(&a);
        }
        if let Some(b) = body_b {
            self.occupied.remove(&b);
        }
    }
}

/// Greedy first-fit coloring over the current step's contacts and joints.
/// Rebuilt fresh each step (colors don't need to persist across steps; only
/// the island and solver-set partitioning does).
#[derive(Debug, Clone)]
pub struct ConstraintGraph {
    colors: Vec<Color>,
}

impl Default for ConstraintGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstraintGraph {
    pub fn new() -> Self {
        Self {
            colors: vec![Color::default(); NUM_COLORS + 1],
        }
    }

    pub fn clear(&mut self) {
        for color in &mut self.colors {
            color.occupied.clear();
        }
    }

    /// Assigns a color to a constraint between `body_a`/`body_b` (`None` for
    /// a static endpoint), returning the chosen color index. Regular colors
    /// `0..NUM_COLORS` are tried in order; the first with no conflict wins.
    /// A static-only constraint (both endpoints `None`) always lands in
    /// color 0 since it can never conflict with anything.
    pub fn assign(&mut self, body_a: Option<Id>, body_b: Option<Id>) -> usize {
        for (index, color) in self.colors[..NUM_COLORS].iter().enumerate() {
            if !color.conflicts(body_a, body_b) {
                self.colors[index].claim(body_a, body_b);
                return index;
            }
        }
        self.colors[OVERFLOW_COLOR].claim(body_a, body_b);
        OVERFLOW_COLOR
    }

    pub fn release(&mut self, color: usize, body_a: Option<Id>, body_b: Option<Id>) {
        if let Some(color) = self.colors.get_mut(color) {
            color.release(body_a, body_b);
        }
    }

    pub fn color_count(&self) -> usize {
        self.colors.len()
    }

    pub fn is_overflow(color: usize) -> bool {
        color == OVERFLOW_COLOR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn independent_constraints_share_a_color() {
        let mut graph = ConstraintGraph::new();
        let c1 = graph.assign(Some(Id::from_bits(1)), Some(Id::from_bits(2)));
        let c2 = graph.assign(Some(Id::from_bits(3)), Some(Id::from_bits(4)));
        assert_eq!(c1, c2);
    }

    #[test]
    fn conflicting_constraints_land_in_different_colors() {
        let mut graph = ConstraintGraph::new();
        let shared = Id::from_bits(1);
        let c1 = graph.assign(Some(shared), Some(Id::from_bits(2)));
        let c2 = graph.assign(Some(shared), Some(Id::from_bits(3)));
        assert_ne!(c1, c2);
    }

    #[test]
    fn static_bodies_never_conflict() {
        let mut graph = ConstraintGraph::new();
        let c1 = graph.assign(Some(Id::from_bits(1)), None);
        let c2 = graph.assign(Some(Id::from_bits(2)), None);
        assert_eq!(c1, c2);
    }

    #[test]
    fn exhausting_every_regular_color_falls_back_to_overflow() {
        let mut graph = ConstraintGraph::new();
        let shared = Id::from_bits(1);
        let mut last_color = 0;
        for i in 0..(NUM_COLORS + 1) {
            last_color = graph.assign(Some(shared), Some(Id::from_bits(100 + i as u64)));
        }
        assert_eq!(last_color, OVERFLOW_COLOR);
    }

    #[test]
    fn releasing_a_constraint_frees_its_color_slot() {
        let mut graph = ConstraintGraph::new();
        let shared = Id::from_bits(1);
        let color = graph.assign(Some(shared), Some(Id::from_bits(2)));
        graph.release(color, Some(shared), Some(Id::from_bits(2)));
        let reused = graph.assign(Some(shared), Some(Id::from_bits(3)));
        assert_eq!(reused, color);
    }
}
