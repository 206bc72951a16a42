//! A node in the belief tree: a particle set, an action mapping, optional
//! derived context, and the cached "best action" summary the outer planner
//! reads after each round of simulations.

use rand::Rng;

use crate::action_mapping::ActionMapping;
use crate::belief_tree::BeliefId;
use crate::clock::Clock;
use crate::error;
use crate::particle::{HistoryEntry, StateDistance};
use crate::model::Pomdp;
use crate::particle::ParticleSet;

pub struct BeliefNode<P: Pomdp, M: ActionMapping<P>> {
    id: BeliefId,
    particles: ParticleSet<P::Particle>,
    mapping: Option<M>,
    historical_data: Option<P::HistoricalData>,
    value_estimate: f64,
    t_last_added_particle: u64,
    cached_best_action: Option<P::Action>,
    cached_best_mean_q_value: f64,
}

impl<P: Pomdp, M: ActionMapping<P>> BeliefNode<P, M> {
    pub fn new(id: BeliefId) -> Self {
        Self {
            id,
            particles: ParticleSet::new(),
            mapping: None,
            historical_data: None,
            value_estimate: 0.0,
            t_last_added_particle: 0,
            cached_best_action: None,
            cached_best_mean_q_value: 0.0,
        }
    }

    pub fn id(&self) -> BeliefId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: BeliefId) {
        self.id = id;
    }

    pub fn n_particles(&self) -> usize {
        self.particles.len()
    }

    pub fn particles(&self) -> &ParticleSet<P::Particle> {
        &self.particles
    }

    pub fn historical_data(&self) -> Option<&P::HistoricalData> {
        self.historical_data.as_ref()
    }

    pub fn set_historical_data(&mut self, data: Option<P::HistoricalData>) {
        self.historical_data = data;
    }

    pub fn value_estimate(&self) -> f64 {
        self.value_estimate
    }

    pub fn set_value_estimate(&mut self, value: f64) {
        self.value_estimate = value;
    }

    pub fn t_last_added_particle(&self) -> u64 {
        self.t_last_added_particle
    }

    /// Binds `mapping` to this belief, stamping it with the belief's own id
    /// as owner. Called exactly once, right after the node is created.
    pub fn install_mapping(&mut self, mut mapping: M, owner: BeliefId) {
        mapping.set_owner(owner);
        self.mapping = Some(mapping);
    }

    pub fn mapping(&self) -> &M {
        self.mapping.as_ref().expect("action mapping not installed on this belief node")
    }

    pub fn mapping_mut(&mut self) -> &mut M {
        self.mapping.as_mut().expect("action mapping not installed on this belief node")
    }

    pub fn has_mapping(&self) -> bool {
        self.mapping.is_some()
    }

    /// Appends a particle and stamps it with the clock's current tick.
    pub fn add(&mut self, entry: P::Particle, clock: &mut impl Clock) {
        self.particles.add(entry);
        self.t_last_added_particle = clock.tick();
    }

    pub fn sample_a_particle(&self, rng: &mut impl Rng) -> Option<&P::Particle> {
        self.particles.sample(rng)
    }

    pub fn get_child(&self, action: &P::Action, obs: &P::Observation) -> Option<BeliefId> {
        self.mapping.as_ref()?.get_action_node(action)?.get_child(obs)
    }

    /// `argmax_a [ mean_q(a) + c * sqrt(ln(n_particles) / n(a)) ]` over
    /// existing action children. Requires every child to have at least one
    /// visit (the caller is expected to exhaust unvisited actions first);
    /// ties go to the first maximizer in the mapping's iteration order.
    pub fn get_ucb_action(&self, exploration_coefficient: f64) -> Option<P::Action> {
        let mapping = self.mapping.as_ref()?;
        let actions = mapping.actions_in_order();
        if actions.is_empty() {
            error::empty_domain("BeliefNode::get_ucb_action");
            return None;
        }
        let n_belief = (self.n_particles().max(1)) as f64;
        let mut best_action: Option<P::Action> = None;
        let mut best_score = f64::NEG_INFINITY;
        for action in actions {
            let Some(node) = mapping.get_action_node(&action) else { continue };
            let n = node.visit_count();
            if n == 0 {
                continue;
            }
            let score = node.mean_q_value() + exploration_coefficient * (n_belief.ln() / n as f64).sqrt();
            if score > best_score {
                best_score = score;
                best_action = Some(action);
            }
        }
        best_action
    }

    /// `argmax_a mean_q(a)`, delegating to the mapping's own best-action
    /// cache rather than keeping a second copy that could drift from it.
    /// Refreshes this node's cached view as a side effect.
    pub fn get_best_action(&mut self) -> Option<P::Action> {
        let mapping = self.mapping.as_ref()?;
        let best = mapping.best_action();
        self.cached_best_action = best.clone();
        self.cached_best_mean_q_value = mapping.max_q_value();
        if best.is_none() {
            error::empty_domain("BeliefNode::get_best_action");
        }
        best
    }

    pub fn get_best_mean_q_value(&mut self) -> f64 {
        self.get_best_action();
        self.cached_best_mean_q_value
    }

    /// Records one simulated visit of `action` with return `delta`.
    pub fn update_q_value(&mut self, model: &P, action: &P::Action, delta: f64) {
        self.mapping_mut().update(model, action, 1, delta);
        self.get_best_action();
    }

    /// Replaces a previously-backed-up value. `reduce_particles` undoes the
    /// visit that produced `old_value`.
    pub fn update_q_value_replace(
        &mut self,
        model: &P,
        action: &P::Action,
        old_value: f64,
        new_value: f64,
        reduce_particles: bool,
    ) {
        let delta_n = if reduce_particles { -1 } else { 0 };
        self.mapping_mut().update(model, action, delta_n, new_value - old_value);
        self.get_best_action();
    }

    /// The relocated "next action to try" counter (see `SPEC_FULL.md` §9):
    /// storage lives on the mapping, this is a thin forwarding call kept so
    /// the belief-level operation is still exposed.
    pub fn get_next_action_to_try(&mut self) -> usize {
        self.mapping_mut().next_action_to_try()
    }

    /// Mean pairwise state distance between this belief's particles and
    /// `other`'s: `(1/nm) * sum_i sum_j d(s_i, s_j')`.
    pub fn dist_l1_independent(&self, other: &Self) -> f64 {
        let n = self.particles.len();
        let m = other.particles.len();
        if n == 0 || m == 0 {
            error::empty_domain("BeliefNode::dist_l1_independent");
            return 0.0;
        }
        let mut total = 0.0;
        for entry in self.particles.iter() {
            for other_entry in other.particles.iter() {
                total += entry.state().distance_to(other_entry.state());
            }
        }
        total / (n * m) as f64
    }
}
