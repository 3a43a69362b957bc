//! Gillespie's first-reaction method.

use rand_chacha::ChaCha8Rng;

use super::{exponential, Algorithm, StepStats};
use crate::error::SimError;
use crate::model::Network;
use crate::propensity::Propensities;

/// Draws an independent exponential candidate time for every reaction and
/// fires the minimum. Statistically equivalent to [`super::Direct`] at O(R)
/// draws per step.
pub(crate) struct FirstReaction {
    t: f64,
    end_time: f64,
    stats: StepStats,
}

impl FirstReaction {
    pub(crate) fn new(end_time: f64) -> Self {
        Self {
            t: 0.0,
            end_time,
            stats: StepStats::default(),
        }
    }
}

impl Algorithm for FirstReaction {
    fn init(&mut self, _network: &Network) {}

    fn reset(
        &mut self,
        _network: &Network,
        _state: &[i32],
        _propensities: &Propensities,
        _rng: &mut ChaCha8Rng,
    ) {
        self.t = 0.0;
        self.stats = StepStats::default();
    }

    fn step(
        &mut self,
        network: &Network,
        state: &mut [i32],
        propensities: &mut Propensities,
        rng: &mut ChaCha8Rng,
    ) -> Result<(), SimError> {
        self.stats.steps += 1;

        let mut min_tau = f64::INFINITY;
        let mut winner = None;
        for (idx, &a) in propensities.values().iter().enumerate() {
            let tau = exponential(rng, a);
            // strict comparison keeps ties on the lowest index
            if tau < min_tau {
                min_tau = tau;
                winner = Some(idx);
            }
        }

        match winner {
            Some(reaction) if min_tau.is_finite() => {
                self.t += min_tau;
                network.apply_deltas(reaction, state);
                propensities.update_affected(network, state, reaction);
            }
            // absorbed: every candidate is infinite
            _ => self.t = self.end_time,
        }
        Ok(())
    }

    fn time(&self) -> f64 {
        self.t
    }

    fn end_time(&self) -> f64 {
        self.end_time
    }

    fn stats(&self) -> StepStats {
        self.stats
    }
}
