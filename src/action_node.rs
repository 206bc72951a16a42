//! A single action's child observations and aggregate statistics.

use std::collections::HashMap;
use std::hash::Hash;

use crate::belief_tree::BeliefId;
use crate::error;

/// The child of a belief under one specific action: an observation → belief
/// map plus the visit/total/mean return triple backed up through it.
#[derive(Debug, Clone)]
pub struct ActionNode<O: Eq + Hash> {
    children: HashMap<O, BeliefId>,
    visit_count: u64,
    total_q: f64,
    mean_q: f64,
}

impl<O: Eq + Hash> Default for ActionNode<O> {
    fn default() -> Self {
        Self { children: HashMap::new(), visit_count: 0, total_q: 0.0, mean_q: 0.0 }
    }
}

impl<O: Eq + Hash> ActionNode<O> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visit_count(&self) -> u64 {
        self.visit_count
    }

    pub fn total_q_value(&self) -> f64 {
        self.total_q
    }

    pub fn mean_q_value(&self) -> f64 {
        self.mean_q
    }

    pub fn get_child(&self, observation: &O) -> Option<BeliefId> {
        self.children.get(observation).copied()
    }

    /// Looks up `observation`; if absent, assigns it the id produced by
    /// `make_id` and returns `(id, true)`. Otherwise returns the existing
    /// id and `false`.
    pub fn add_child_with(&mut self, observation: O, make_id: impl FnOnce() -> BeliefId) -> (BeliefId, bool) {
        if let Some(&existing) = self.children.get(&observation) {
            return (existing, false);
        }
        let id = make_id();
        self.children.insert(observation, id);
        (id, true)
    }

    /// Records a simulated return through this action.
    pub fn update_q_value(&mut self, delta: f64) {
        self.visit_count += 1;
        self.total_q += delta;
        self.recompute_mean();
    }

    /// Replaces a previously-backed-up value. When `reduce_particles` is
    /// set, also undoes the visit that originally produced `old_value`; a
    /// decrement that would go negative is a structural violation and is
    /// rejected.
    pub fn update_q_value_replace(&mut self, old_value: f64, new_value: f64, reduce_particles: bool) {
        self.total_q += new_value - old_value;
        if reduce_particles {
            if self.visit_count == 0 {
                error::structural_violation(
                    "ActionNode::update_q_value_replace",
                    "visit_count would go negative",
                );
            } else {
                self.visit_count -= 1;
            }
        }
        self.recompute_mean();
    }

    /// Applies a raw `(delta_n, delta_q)` backup, as used by
    /// [`crate::discretized::DiscretizedActionMap::update`], where `delta_n`
    /// may be negative (undoing an earlier visit). Returns `false` without
    /// modifying anything if the decrement would drive `visit_count`
    /// negative.
    pub fn apply_delta(&mut self, delta_n: i64, delta_q: f64) -> bool {
        let Some(new_count) = self.visit_count.checked_add_signed(delta_n) else {
            error::structural_violation("ActionNode::apply_delta", "visit_count would go negative");
            return false;
        };
        self.visit_count = new_count;
        self.total_q += delta_q;
        self.recompute_mean();
        true
    }

    fn recompute_mean(&mut self) {
        self.mean_q = if self.visit_count > 0 { self.total_q / self.visit_count as f64 } else { 0.0 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_observation_creates_child() {
        let mut node: ActionNode<u32> = ActionNode::new();
        let (id, created) = node.add_child_with(7, || 42);
        assert_eq!(id, 42);
        assert!(created);
    }

    #[test]
    fn repeated_observation_reuses_child() {
        let mut node: ActionNode<u32> = ActionNode::new();
        let (first, _) = node.add_child_with(7, || 42);
        let (second, created) = node.add_child_with(7, || 99);
        assert_eq!(first, second);
        assert!(!created);
    }

    #[test]
    fn update_tracks_mean() {
        let mut node: ActionNode<u32> = ActionNode::new();
        node.update_q_value(1.0);
        node.update_q_value(3.0);
        assert_eq!(node.visit_count(), 2);
        assert_eq!(node.total_q_value(), 4.0);
        assert_eq!(node.mean_q_value(), 2.0);
    }

    #[test]
    fn replace_without_reducing_keeps_visit_count() {
        let mut node: ActionNode<u32> = ActionNode::new();
        node.update_q_value(1.0);
        node.update_q_value_replace(1.0, 5.0, false);
        assert_eq!(node.visit_count(), 1);
        assert_eq!(node.total_q_value(), 5.0);
    }

    #[test]
    fn apply_delta_rejects_negative_visit_count() {
        let mut node: ActionNode<u32> = ActionNode::new();
        assert!(!node.apply_delta(-1, -1.0));
        assert_eq!(node.visit_count(), 0);
        assert_eq!(node.total_q_value(), 0.0);
    }

    #[test]
    fn apply_delta_then_undo_restores_state() {
        let mut node: ActionNode<u32> = ActionNode::new();
        assert!(node.apply_delta(1, 2.0));
        assert!(node.apply_delta(-1, -2.0));
        assert_eq!(node.visit_count(), 0);
        assert_eq!(node.total_q_value(), 0.0);
        assert_eq!(node.mean_q_value(), 0.0);
    }

    #[test]
    fn replace_reducing_below_zero_is_rejected() {
        let mut node: ActionNode<u32> = ActionNode::new();
        node.update_q_value_replace(1.0, 5.0, true);
        assert_eq!(node.visit_count(), 0);
    }
}
