//! The abstract capability set every concrete action mapping implements.
//!
//! A plain trait rather than a base class: `DiscretizedActionMap` is this
//! crate's only implementer, used as a static type parameter on
//! [`crate::belief_node::BeliefNode`]. A future continuous-action mapping
//! could implement the same trait and drop in as a different type
//! parameter; the generic `rng: &mut impl Rng` parameters keep randomness
//! explicit the way the rest of this crate does, at the cost of this trait
//! not being `dyn`-safe.

use rand::Rng;

use crate::action_node::ActionNode;
use crate::belief_tree::BeliefId;
use crate::model::Pomdp;

/// A mapping owned by one belief node, tracking its action children and the
/// aggregate statistics derived from them.
pub trait ActionMapping<P: Pomdp> {
    /// The concrete per-bin entry type this mapping hands out from
    /// [`Self::entry`]/[`Self::child_entries`].
    type Entry;

    /// Binds this mapping to the belief that owns it. Called exactly once,
    /// at belief-creation time.
    fn set_owner(&mut self, owner: BeliefId);

    fn owner(&self) -> Option<BeliefId>;

    fn get_action_node(&self, action: &P::Action) -> Option<&ActionNode<P::Observation>>;

    fn get_action_node_mut(&mut self, action: &P::Action) -> Option<&mut ActionNode<P::Observation>>;

    /// Must be implemented by the consumer specialization: create (or
    /// return the existing) action node for `action`.
    fn create_action_node(&mut self, action: &P::Action) -> &mut ActionNode<P::Observation>;

    fn n_children(&self) -> usize;

    /// Every entry that has been created so far, in the mapping's canonical
    /// iteration order.
    fn child_entries(&self) -> Vec<&Self::Entry>;

    /// The entry for `action`, if one has been created.
    fn entry(&self, action: &P::Action) -> Option<&Self::Entry>;

    fn visit_count(&self, action: &P::Action) -> u64;

    fn total_q_value(&self, action: &P::Action) -> f64;

    fn mean_q_value(&self, action: &P::Action) -> f64;

    /// All actions with an existing entry, in the mapping's canonical
    /// iteration order (ascending bin number for the discretized
    /// specialization). Used by [`crate::belief_node::BeliefNode`] to
    /// evaluate UCB scores without depending on a concrete mapping type.
    fn actions_in_order(&self) -> Vec<P::Action>;

    fn total_visit_count(&self) -> u64;

    /// The action with the highest mean return, or `None` if nothing has
    /// been created yet.
    fn best_action(&self) -> Option<P::Action>;

    fn max_q_value(&self) -> f64;

    /// The action with the highest visit count (ties broken by higher mean
    /// return, then by the mapping's own tie-break order).
    fn robust_action(&self) -> Option<P::Action>;

    fn robust_q_value(&self) -> f64;

    fn has_unvisited_actions(&self) -> bool;

    fn unvisited_actions(&self, model: &P) -> Vec<P::Action>;

    /// Draws one unvisited action uniformly. Does not mark it visited —
    /// only `update`'s first-visit path removes an action from the
    /// unvisited set.
    fn random_unvisited_action(&self, model: &P, rng: &mut impl Rng) -> Option<P::Action>;

    /// Applies a backup: `delta_n` visits and `delta_q` total return to
    /// `action`'s entry, creating it first if this is its first visit.
    fn update(&mut self, model: &P, action: &P::Action, delta_n: i64, delta_q: f64);

    /// Rebuilds every cached aggregate from scratch.
    fn recalculate(&mut self);

    /// A monotone counter relocated here from the belief node (see
    /// `SPEC_FULL.md` §9): returns and advances the next action index a
    /// caller enumerating actions by hand should try.
    fn next_action_to_try(&mut self) -> usize;
}
