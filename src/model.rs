//! Collaborator seams a host implements to plug a concrete problem into the
//! belief tree core. None of these are implemented by this crate; they are
//! the narrow contracts `BeliefTree` and `DiscretizedActionMap` call back
//! into.

use rand::Rng;

use crate::particle::{HistoryEntry, StateDistance};

/// The outcome of simulating one step of the generative model.
pub struct StepOutcome<P: Pomdp> {
    pub next_state: P::State,
    pub observation: P::Observation,
    pub reward: f64,
}

/// An action that knows which discretized bin it belongs to. Required by
/// [`crate::discretized::DiscretizedActionMap`] so `update` can locate (or
/// lazily create) the right entry without a separate action-to-bin table.
pub trait DiscretizedAction: Clone {
    fn bin(&self) -> usize;
}

/// Per-belief context derived from the path that leads to it. Optional:
/// beliefs with no historical data simply never call `create_child`.
pub trait HistoricalData: Sized {
    type Action;
    type Observation;

    /// Must be implemented by the consumer: produce the derived context for
    /// a child reached via `(action, observation)`.
    fn create_child(&self, action: &Self::Action, observation: &Self::Observation) -> Self;
}

/// The generative model: state transitions, observations, and rewards.
///
/// Must be implemented by the consumer. `State` needs [`StateDistance`] so
/// [`crate::belief_node::BeliefNode::dist_l1_independent`] can compare
/// beliefs; `Observation` needs `Eq + Hash` because children are looked up
/// by observation in a plain hash map (the observation-pool abstraction the
/// original solver used is not reproduced here — see `SPEC_FULL.md` §4.6).
pub trait Pomdp: Sized {
    type State: StateDistance;
    type Action: DiscretizedAction;
    type Observation: Clone + Eq + std::hash::Hash;
    type HistoricalData: HistoricalData<Action = Self::Action, Observation = Self::Observation>;
    /// The particle handle type a belief's [`crate::particle::ParticleSet`]
    /// stores. Hosts typically hand out cheap, cloneable ids into their own
    /// history pool here rather than the state itself.
    type Particle: HistoryEntry<State = Self::State>;

    /// `0` lets [`crate::discretized::DiscretizedActionPool`] fall back to
    /// its own configured default instead of sizing every mapping itself.
    fn number_of_bins(&self) -> usize;

    /// Produces a concrete action belonging to `bin`.
    fn sample_action(&self, bin: usize, rng: &mut impl Rng) -> Self::Action;

    /// Simulates one step of the model from `state` taking `action`.
    fn generate_step(
        &self,
        state: &Self::State,
        action: &Self::Action,
        rng: &mut impl Rng,
    ) -> StepOutcome<Self>;

    fn distance(&self, a: &Self::State, b: &Self::State) -> f64 {
        a.distance_to(b)
    }

    /// `None` when the root carries no historical context.
    fn create_root_historical_data(&self) -> Option<Self::HistoricalData>;
}

/// Produces a mapping bound to a model, installed on every newly created
/// belief node. Must be implemented by the consumer.
pub trait ActionPool<P: Pomdp> {
    type Mapping: crate::action_mapping::ActionMapping<P>;

    fn create_action_mapping(&self, model: &P) -> Self::Mapping;
}

/// Installs a bootstrap value estimate on a new belief before its first
/// backup. Must be implemented by the consumer.
pub trait EstimationStrategy<P: Pomdp, M: crate::action_mapping::ActionMapping<P>> {
    fn set_value_estimator(&self, model: &P, belief: &mut crate::belief_node::BeliefNode<P, M>);
}
