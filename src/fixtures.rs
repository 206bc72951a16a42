//! Test-only connective tissue: a minimal concrete `Pomdp` so the modules in
//! this crate can be exercised end-to-end, not just in isolation. Not
//! compiled into release builds.

pub mod tiger {
    use rand::Rng;

    use crate::action_mapping::ActionMapping;
    use crate::belief_node::BeliefNode;
    use crate::model::{DiscretizedAction, EstimationStrategy, HistoricalData, Pomdp, StepOutcome};
    use crate::particle::{HistoryEntry, StateDistance};

    /// The classic two-state "tiger behind a door" POMDP: `Listen` pays a
    /// small cost and narrows the belief; `OpenLeft`/`OpenRight` end the
    /// episode, paying off if the tiger is behind the other door.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum TigerState {
        Left,
        Right,
    }

    impl StateDistance for TigerState {
        fn distance_to(&self, other: &Self) -> f64 {
            if self == other {
                0.0
            } else {
                1.0
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum TigerAction {
        Listen,
        OpenLeft,
        OpenRight,
    }

    impl DiscretizedAction for TigerAction {
        fn bin(&self) -> usize {
            match self {
                TigerAction::Listen => 0,
                TigerAction::OpenLeft => 1,
                TigerAction::OpenRight => 2,
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum TigerObservation {
        HearLeft,
        HearRight,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    pub struct TigerParticle {
        id: u64,
        state: TigerState,
    }

    impl TigerParticle {
        pub fn new(id: u64, state: TigerState) -> Self {
            Self { id, state }
        }
    }

    impl HistoryEntry for TigerParticle {
        type State = TigerState;

        fn state(&self) -> &Self::State {
            &self.state
        }
    }

    /// Carries nothing beyond what the tree already tracks; present so the
    /// historical-data seam is exercised by the fixture.
    #[derive(Debug, Clone, Default)]
    pub struct TigerHistoricalData;

    impl HistoricalData for TigerHistoricalData {
        type Action = TigerAction;
        type Observation = TigerObservation;

        fn create_child(&self, _action: &Self::Action, _observation: &Self::Observation) -> Self {
            Self
        }
    }

    #[derive(Debug, Clone, Copy, Default)]
    pub struct TigerPomdp {
        pub listen_cost: f64,
        pub open_correct_reward: f64,
        pub open_wrong_penalty: f64,
        pub listen_correct_probability: f64,
    }

    impl TigerPomdp {
        pub fn new() -> Self {
            Self {
                listen_cost: -1.0,
                open_correct_reward: 10.0,
                open_wrong_penalty: -100.0,
                listen_correct_probability: 0.85,
            }
        }
    }

    impl Pomdp for TigerPomdp {
        type State = TigerState;
        type Action = TigerAction;
        type Observation = TigerObservation;
        type HistoricalData = TigerHistoricalData;
        type Particle = TigerParticle;

        fn number_of_bins(&self) -> usize {
            3
        }

        fn sample_action(&self, bin: usize, _rng: &mut impl Rng) -> Self::Action {
            match bin {
                0 => TigerAction::Listen,
                1 => TigerAction::OpenLeft,
                _ => TigerAction::OpenRight,
            }
        }

        fn generate_step(
            &self,
            state: &Self::State,
            action: &Self::Action,
            rng: &mut impl Rng,
        ) -> StepOutcome<Self> {
            match action {
                TigerAction::Listen => {
                    let heard_correctly = rng.random_bool(self.listen_correct_probability);
                    let observation = match (state, heard_correctly) {
                        (TigerState::Left, true) | (TigerState::Right, false) => TigerObservation::HearLeft,
                        _ => TigerObservation::HearRight,
                    };
                    StepOutcome { next_state: *state, observation, reward: self.listen_cost }
                }
                TigerAction::OpenLeft => {
                    let reward = if *state == TigerState::Right {
                        self.open_correct_reward
                    } else {
                        self.open_wrong_penalty
                    };
                    StepOutcome { next_state: *state, observation: TigerObservation::HearLeft, reward }
                }
                TigerAction::OpenRight => {
                    let reward = if *state == TigerState::Left {
                        self.open_correct_reward
                    } else {
                        self.open_wrong_penalty
                    };
                    StepOutcome { next_state: *state, observation: TigerObservation::HearRight, reward }
                }
            }
        }

        fn create_root_historical_data(&self) -> Option<Self::HistoricalData> {
            Some(TigerHistoricalData)
        }
    }

    /// Installs a flat zero value estimate; this fixture has no learned
    /// heuristic to bootstrap from.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct NoOpEstimator;

    impl<M: ActionMapping<TigerPomdp>> EstimationStrategy<TigerPomdp, M> for NoOpEstimator {
        fn set_value_estimator(&self, _model: &TigerPomdp, belief: &mut BeliefNode<TigerPomdp, M>) {
            belief.set_value_estimate(0.0);
        }
    }
}
