//! Particle-backed belief representation.
//!
//! A [`ParticleSet`] holds the sampled history entries that approximate a
//! belief node's distribution over states. Membership and removal are
//! identity-based (the same swap-remove idiom used everywhere a set needs
//! O(1) random access in this crate), not value-based — two particles with
//! the same state are still distinct particles.

use std::collections::HashMap;
use std::hash::Hash;

use rand::Rng;

use crate::error;

/// A metric a model's state type must provide so beliefs can be compared.
pub trait StateDistance {
    fn distance_to(&self, other: &Self) -> f64;
}

/// One sampled trajectory ending in a state. Hosts own the actual entries
/// (typically in a history pool); this crate only ever holds cheap handles
/// to them, compared by identity via `Eq + Hash`.
pub trait HistoryEntry: Eq + Hash + Clone {
    type State: StateDistance;

    fn state(&self) -> &Self::State;
}

/// The particle collection owned by exactly one belief node.
#[derive(Debug, Clone)]
pub struct ParticleSet<E: HistoryEntry> {
    particles: Vec<E>,
    index_of: HashMap<E, usize>,
}

impl<E: HistoryEntry> Default for ParticleSet<E> {
    fn default() -> Self {
        Self { particles: Vec::new(), index_of: HashMap::new() }
    }
}

impl<E: HistoryEntry> ParticleSet<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn contains(&self, entry: &E) -> bool {
        self.index_of.contains_key(entry)
    }

    /// Appends `entry`. A duplicate insert is a structural violation: it is
    /// logged and otherwise ignored.
    pub fn add(&mut self, entry: E) {
        if self.contains(&entry) {
            error::structural_violation("ParticleSet::add", "duplicate particle");
            return;
        }
        let index = self.particles.len();
        self.index_of.insert(entry.clone(), index);
        self.particles.push(entry);
    }

    /// Removes `entry` via swap-remove. Removing an absent entry is a
    /// structural violation: logged, no-op.
    pub fn remove(&mut self, entry: &E) {
        let Some(index) = self.index_of.remove(entry) else {
            error::structural_violation("ParticleSet::remove", "entry not present");
            return;
        };
        let last = self.particles.len() - 1;
        self.particles.swap(index, last);
        self.particles.pop();
        if index != last {
            let moved = self.particles[index].clone();
            self.index_of.insert(moved, index);
        }
    }

    /// Indexed access. Out-of-range is a contract violation and panics: a
    /// caller holding an index into this set is expected to keep it valid.
    pub fn get(&self, index: usize) -> &E {
        &self.particles[index]
    }

    pub fn index_of(&self, entry: &E) -> Option<usize> {
        self.index_of.get(entry).copied()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.particles.iter()
    }

    /// Uniformly samples a particle. `None` when empty (an empty-domain
    /// query, logged).
    pub fn sample(&self, rng: &mut impl Rng) -> Option<&E> {
        if self.particles.is_empty() {
            error::empty_domain("ParticleSet::sample");
            return None;
        }
        let index = rng.random_range(0..self.particles.len());
        Some(&self.particles[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Scalar(i64);

    impl StateDistance for Scalar {
        fn distance_to(&self, other: &Self) -> f64 {
            (self.0 - other.0).abs() as f64
        }
    }

    #[derive(Debug, Clone)]
    struct Entry {
        id: u64,
        state: Scalar,
    }

    impl Entry {
        fn new(id: u64, state: i64) -> Self {
            Self { id, state: Scalar(state) }
        }
    }

    impl PartialEq for Entry {
        fn eq(&self, other: &Self) -> bool {
            self.id == other.id
        }
    }

    impl Eq for Entry {}

    impl Hash for Entry {
        fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
            self.id.hash(state);
        }
    }

    impl HistoryEntry for Entry {
        type State = Scalar;

        fn state(&self) -> &Self::State {
            &self.state
        }
    }

    #[test]
    fn swap_remove_keeps_indices_consistent() {
        let mut set = ParticleSet::new();
        let e1 = Entry::new(1, 10);
        let e2 = Entry::new(2, 20);
        let e3 = Entry::new(3, 30);
        let e4 = Entry::new(4, 40);
        set.add(e1.clone());
        set.add(e2.clone());
        set.add(e3.clone());
        set.add(e4.clone());

        set.remove(&e2);

        assert_eq!(set.len(), 3);
        assert_eq!(set.index_of(&e4), Some(1));
        assert_eq!(set.index_of(&e3), Some(2));
        assert_eq!(*set.get(1), e4);
        assert_eq!(*set.get(2), e3);
    }

    #[test]
    fn duplicate_add_is_noop() {
        let mut set = ParticleSet::new();
        let e1 = Entry::new(1, 10);
        set.add(e1.clone());
        set.add(e1.clone());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut set = ParticleSet::new();
        set.add(Entry::new(1, 10));
        set.remove(&Entry::new(9, 90));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn sample_empty_returns_none() {
        let set: ParticleSet<Entry> = ParticleSet::new();
        let mut rng = rand::rng();
        assert!(set.sample(&mut rng).is_none());
    }
}
