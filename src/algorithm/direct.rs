//! Gillespie's direct method.

use rand_chacha::ChaCha8Rng;

use super::{exact_direct_step, Algorithm, StepStats};
use crate::error::SimError;
use crate::model::Network;
use crate::propensity::Propensities;

/// Draws an exponential holding time from the cumulative propensity, selects
/// the firing reaction by cumulative scan, and updates incrementally.
pub(crate) struct Direct {
    t: f64,
    end_time: f64,
    stats: StepStats,
}

impl Direct {
    pub(crate) fn new(end_time: f64) -> Self {
        Self {
            t: 0.0,
            end_time,
            stats: StepStats::default(),
        }
    }
}

impl Algorithm for Direct {
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
        self.t = exact_direct_step(network, state, propensities, rng, self.t, self.end_time);
        self.stats.steps += 1;
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
