//! The finite-bin action mapping: one entry per bin, lazily created on
//! first visit, with a random-access set of bins still unvisited and
//! incrementally maintained best/robust caches.

use std::cell::{Cell, RefCell};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::action_mapping::ActionMapping;
use crate::action_node::ActionNode;
use crate::belief_tree::BeliefId;
use crate::collections::RandomAccessSet;
use crate::config::SolverConfig;
use crate::model::{ActionPool, DiscretizedAction, Pomdp};

/// One bin's action child: the representative action that created the
/// entry plus the statistics accumulated under it.
pub struct DiscretizedActionMapEntry<P: Pomdp> {
    bin_number: usize,
    action: P::Action,
    node: ActionNode<P::Observation>,
}

impl<P: Pomdp> Clone for DiscretizedActionMapEntry<P> {
    fn clone(&self) -> Self {
        Self { bin_number: self.bin_number, action: self.action.clone(), node: self.node.clone() }
    }
}

impl<P: Pomdp> DiscretizedActionMapEntry<P> {
    pub fn bin_number(&self) -> usize {
        self.bin_number
    }

    pub fn action(&self) -> &P::Action {
        &self.action
    }

    pub fn node(&self) -> &ActionNode<P::Observation> {
        &self.node
    }
}

/// Produces [`DiscretizedActionMap`]s bound to a model's declared bin count.
///
/// `default_number_of_bins` is only consulted when a model reports zero
/// bins (a model that declines to size itself); an ordinary model's
/// `number_of_bins()` always wins, so the pool's default is a fallback,
/// not an override.
#[derive(Debug, Clone, Copy)]
pub struct DiscretizedActionPool {
    default_number_of_bins: usize,
}

impl DiscretizedActionPool {
    pub fn new(default_number_of_bins: usize) -> Self {
        Self { default_number_of_bins }
    }

    pub fn from_config(config: &SolverConfig) -> Self {
        Self::new(config.default_number_of_bins)
    }
}

impl Default for DiscretizedActionPool {
    fn default() -> Self {
        Self::from_config(&SolverConfig::default())
    }
}

impl<P: Pomdp> ActionPool<P> for DiscretizedActionPool {
    type Mapping = DiscretizedActionMap<P>;

    fn create_action_mapping(&self, model: &P) -> Self::Mapping {
        let bins = match model.number_of_bins() {
            0 => self.default_number_of_bins,
            n => n,
        };
        let mut map = DiscretizedActionMap::new(bins);
        map.initialize();
        map
    }
}

/// The concrete action mapping for problems with a finite, pre-numbered set
/// of action bins.
pub struct DiscretizedActionMap<P: Pomdp> {
    owner: Option<BeliefId>,
    entries: Vec<Option<DiscretizedActionMapEntry<P>>>,
    bins_to_try: RandomAccessSet<usize>,
    n_children: usize,
    total_visit_count: u64,
    next_action_to_try: usize,

    best_bin: Cell<Option<usize>>,
    highest_q_value: Cell<f64>,
    robust_bin: Cell<Option<usize>>,
    highest_visit_count: Cell<u64>,
    robust_q_value: Cell<f64>,
    dirty: Cell<bool>,

    // Narrow, deliberate exception to "rng is always an explicit parameter"
    // (see `SPEC_FULL.md` §9): `unvisited_actions` is specified as an
    // argument-free read but still needs an rng to produce a representative
    // action per unvisited bin.
    fallback_rng: RefCell<SmallRng>,
}

impl<P: Pomdp> DiscretizedActionMap<P> {
    pub fn new(number_of_bins: usize) -> Self {
        Self {
            owner: None,
            entries: (0..number_of_bins).map(|_| None).collect(),
            bins_to_try: RandomAccessSet::new(),
            n_children: 0,
            total_visit_count: 0,
            next_action_to_try: 0,
            best_bin: Cell::new(None),
            highest_q_value: Cell::new(0.0),
            robust_bin: Cell::new(None),
            highest_visit_count: Cell::new(0),
            robust_q_value: Cell::new(0.0),
            dirty: Cell::new(false),
            fallback_rng: RefCell::new(SmallRng::seed_from_u64(0)),
        }
    }

    pub fn number_of_bins(&self) -> usize {
        self.entries.len()
    }

    /// Seeds `bins_to_try` with every bin. Called once by
    /// [`DiscretizedActionPool::create_action_mapping`].
    pub fn initialize(&mut self) {
        for bin in 0..self.entries.len() {
            self.bins_to_try.insert(bin);
        }
    }

    /// Internal, allocation-free iteration over populated entries; the
    /// trait-level [`ActionMapping::child_entries`] collects this into a
    /// `Vec` for callers generic over `M: ActionMapping<P>`.
    fn populated_entries(&self) -> impl Iterator<Item = &DiscretizedActionMapEntry<P>> {
        self.entries.iter().filter_map(|e| e.as_ref())
    }

    fn entry_for(&self, action: &P::Action) -> Option<&DiscretizedActionMapEntry<P>> {
        self.entries.get(action.bin()).and_then(|e| e.as_ref())
    }

    fn create_entry(&mut self, bin: usize, action: P::Action) {
        self.entries[bin] = Some(DiscretizedActionMapEntry { bin_number: bin, action, node: ActionNode::new() });
        self.bins_to_try.remove(&bin);
        self.n_children += 1;
    }

    /// Rebuilds the best/robust caches from the current entries. Tie-breaks
    /// favor the lowest bin number because bins are scanned in ascending
    /// order and only strict improvements replace the running winner.
    fn recalc_inner(&self) {
        let mut best: Option<(usize, f64)> = None;
        let mut robust: Option<(usize, u64, f64)> = None;
        for entry in self.populated_entries() {
            let visits = entry.node.visit_count();
            if visits == 0 {
                continue;
            }
            let mean = entry.node.mean_q_value();
            if best.map_or(true, |(_, best_mean)| mean > best_mean) {
                best = Some((entry.bin_number, mean));
            }
            let replaces_robust = match robust {
                None => true,
                Some((_, robust_visits, robust_mean)) => {
                    visits > robust_visits || (visits == robust_visits && mean > robust_mean)
                }
            };
            if replaces_robust {
                robust = Some((entry.bin_number, visits, mean));
            }
        }
        self.best_bin.set(best.map(|(bin, _)| bin));
        self.highest_q_value.set(best.map_or(0.0, |(_, q)| q));
        self.robust_bin.set(robust.map(|(bin, ..)| bin));
        self.highest_visit_count.set(robust.map_or(0, |(_, v, _)| v));
        self.robust_q_value.set(robust.map_or(0.0, |(_, _, q)| q));
        self.dirty.set(false);
    }

    fn ensure_fresh(&self) {
        if self.dirty.get() {
            self.recalc_inner();
        }
    }
}

impl<P: Pomdp> ActionMapping<P> for DiscretizedActionMap<P> {
    type Entry = DiscretizedActionMapEntry<P>;

    fn set_owner(&mut self, owner: BeliefId) {
        self.owner = Some(owner);
    }

    fn owner(&self) -> Option<BeliefId> {
        self.owner
    }

    fn get_action_node(&self, action: &P::Action) -> Option<&ActionNode<P::Observation>> {
        self.entry_for(action).map(|e| &e.node)
    }

    fn get_action_node_mut(&mut self, action: &P::Action) -> Option<&mut ActionNode<P::Observation>> {
        self.entries.get_mut(action.bin())?.as_mut().map(|e| &mut e.node)
    }

    fn create_action_node(&mut self, action: &P::Action) -> &mut ActionNode<P::Observation> {
        let bin = action.bin();
        if self.entries[bin].is_none() {
            self.create_entry(bin, action.clone());
        }
        &mut self.entries[bin].as_mut().unwrap().node
    }

    fn n_children(&self) -> usize {
        self.n_children
    }

    fn child_entries(&self) -> Vec<&Self::Entry> {
        self.populated_entries().collect()
    }

    fn entry(&self, action: &P::Action) -> Option<&Self::Entry> {
        self.entry_for(action)
    }

    fn visit_count(&self, action: &P::Action) -> u64 {
        self.entry_for(action).map_or(0, |e| e.node.visit_count())
    }

    fn total_q_value(&self, action: &P::Action) -> f64 {
        self.entry_for(action).map_or(0.0, |e| e.node.total_q_value())
    }

    fn mean_q_value(&self, action: &P::Action) -> f64 {
        self.entry_for(action).map_or(0.0, |e| e.node.mean_q_value())
    }

    fn actions_in_order(&self) -> Vec<P::Action> {
        self.populated_entries().map(|e| e.action.clone()).collect()
    }

    fn total_visit_count(&self) -> u64 {
        self.total_visit_count
    }

    /// `None` when nothing has been visited yet — callers are expected to
    /// check [`ActionMapping::has_unvisited_actions`] /
    /// [`ActionMapping::random_unvisited_action`] first, consistent with
    /// the empty-domain sentinel policy (`SPEC_FULL.md` §7).
    fn best_action(&self) -> Option<P::Action> {
        self.ensure_fresh();
        let bin = self.best_bin.get()?;
        self.entries[bin].as_ref().map(|e| e.action.clone())
    }

    fn max_q_value(&self) -> f64 {
        self.ensure_fresh();
        self.highest_q_value.get()
    }

    fn robust_action(&self) -> Option<P::Action> {
        self.ensure_fresh();
        match self.robust_bin.get() {
            Some(bin) => self.entries[bin].as_ref().map(|e| e.action.clone()),
            None => None,
        }
    }

    fn robust_q_value(&self) -> f64 {
        self.ensure_fresh();
        self.robust_q_value.get()
    }

    fn has_unvisited_actions(&self) -> bool {
        !self.bins_to_try.is_empty()
    }

    fn unvisited_actions(&self, model: &P) -> Vec<P::Action> {
        self.bins_to_try
            .iter()
            .map(|&bin| model.sample_action(bin, &mut *self.fallback_rng.borrow_mut()))
            .collect()
    }

    fn random_unvisited_action(&self, model: &P, rng: &mut impl Rng) -> Option<P::Action> {
        let &bin = self.bins_to_try.sample(rng)?;
        Some(model.sample_action(bin, rng))
    }

    fn update(&mut self, _model: &P, action: &P::Action, delta_n: i64, delta_q: f64) {
        let bin = action.bin();
        if self.entries[bin].is_none() {
            self.create_entry(bin, action.clone());
        }
        let entry = self.entries[bin].as_mut().unwrap();
        if !entry.node.apply_delta(delta_n, delta_q) {
            return;
        }
        if delta_n >= 0 {
            self.total_visit_count += delta_n as u64;
        } else {
            self.total_visit_count = self.total_visit_count.saturating_sub((-delta_n) as u64);
        }

        let visits = entry.node.visit_count();
        let mean = entry.node.mean_q_value();

        let touched_best = self.best_bin.get() == Some(bin);
        if visits > 0 && (self.best_bin.get().is_none() || mean > self.highest_q_value.get()) {
            self.best_bin.set(Some(bin));
            self.highest_q_value.set(mean);
        } else if touched_best {
            self.dirty.set(true);
        }

        let touched_robust = self.robust_bin.get() == Some(bin);
        let improves_robust = self.robust_bin.get().is_none()
            || visits > self.highest_visit_count.get()
            || (visits == self.highest_visit_count.get() && mean > self.robust_q_value.get());
        if visits > 0 && improves_robust {
            self.robust_bin.set(Some(bin));
            self.highest_visit_count.set(visits);
            self.robust_q_value.set(mean);
        } else if touched_robust {
            self.dirty.set(true);
        }
    }

    fn recalculate(&mut self) {
        self.total_visit_count = self.populated_entries().map(|e| e.node.visit_count()).sum();
        self.recalc_inner();
    }

    fn next_action_to_try(&mut self) -> usize {
        let current = self.next_action_to_try;
        self.next_action_to_try += 1;
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::tiger::{TigerAction, TigerPomdp};

    fn fresh_map() -> DiscretizedActionMap<TigerPomdp> {
        let pool = DiscretizedActionPool::default();
        let model = TigerPomdp::new();
        pool.create_action_mapping(&model)
    }

    #[test]
    fn model_bin_count_wins_over_pool_default() {
        let pool = DiscretizedActionPool::new(7);
        let model = TigerPomdp::new();
        let map = pool.create_action_mapping(&model);
        assert_eq!(map.number_of_bins(), model.number_of_bins());
        assert_ne!(map.number_of_bins(), 7);
    }

    #[test]
    fn starts_with_all_bins_unvisited() {
        let map = fresh_map();
        assert!(map.has_unvisited_actions());
        assert_eq!(map.unvisited_actions(&TigerPomdp::new()).len(), TigerPomdp::new().number_of_bins());
    }

    #[test]
    fn update_removes_bin_from_unvisited_and_creates_entry() {
        let mut map = fresh_map();
        let model = TigerPomdp::new();
        let listen = TigerAction::Listen;
        map.update(&model, &listen, 1, 0.5);
        assert_eq!(map.n_children(), 1);
        assert!(!map.unvisited_actions(&model).iter().any(|a| a.bin() == listen.bin()));
    }

    /// Reads the getters purely through the `ActionMapping<P>` bound, the
    /// way `BeliefNode<P, M>` and any future second implementer would have
    /// to — not through `DiscretizedActionMap`'s own inherent methods.
    fn mean_q_through_trait<P: Pomdp, M: ActionMapping<P>>(mapping: &M, action: &P::Action) -> f64 {
        mapping.mean_q_value(action)
    }

    fn entry_count_through_trait<P: Pomdp, M: ActionMapping<P>>(mapping: &M) -> usize {
        mapping.child_entries().len()
    }

    #[test]
    fn per_action_getters_are_reachable_through_the_trait() {
        let mut map = fresh_map();
        let model = TigerPomdp::new();
        let listen = TigerAction::Listen;
        map.update(&model, &listen, 2, 3.0);

        assert_eq!(mean_q_through_trait(&map, &listen), 1.5);
        assert_eq!(entry_count_through_trait(&map), 1);
    }

    #[test]
    fn child_entries_and_entry_agree_with_per_action_getters() {
        let mut map = fresh_map();
        let model = TigerPomdp::new();
        let listen = TigerAction::Listen;
        map.update(&model, &listen, 3, 1.5);

        let entries = map.child_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action(), &listen);

        let entry = map.entry(&listen).unwrap();
        assert_eq!(entry.node().visit_count(), 3);
        assert_eq!(map.visit_count(&listen), entry.node().visit_count());
        assert_eq!(map.total_q_value(&listen), entry.node().total_q_value());
        assert_eq!(map.mean_q_value(&listen), entry.node().mean_q_value());
    }

    #[test]
    fn best_and_robust_can_diverge() {
        let mut map = fresh_map();
        let model = TigerPomdp::new();
        let a = TigerAction::OpenLeft;
        let b = TigerAction::OpenRight;
        for _ in 0..50 {
            map.update(&model, &a, 1, 0.8);
        }
        for _ in 0..5 {
            map.update(&model, &b, 1, 1.2);
        }
        assert_eq!(map.best_action().unwrap().bin(), b.bin());
        assert_eq!(map.robust_action().unwrap().bin(), a.bin());
    }

    #[test]
    fn undo_restores_totals() {
        let mut map = fresh_map();
        let model = TigerPomdp::new();
        let listen = TigerAction::Listen;
        map.update(&model, &listen, 1, 2.0);
        map.update(&model, &listen, -1, -2.0);
        assert_eq!(map.total_visit_count(), 0);
        assert_eq!(map.mean_q_value(&listen), 0.0);
    }

    #[test]
    fn negative_visit_count_is_rejected() {
        let mut map = fresh_map();
        let model = TigerPomdp::new();
        let listen = TigerAction::Listen;
        map.update(&model, &listen, -1, -1.0);
        assert_eq!(map.visit_count(&listen), 0);
        assert_eq!(map.total_visit_count(), 0);
    }
}
