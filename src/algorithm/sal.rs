//! Step-anticipation tau-leaping.
//!
//! Extends plain Poisson leaping with a first-order Taylor correction:
//! propensities are extrapolated across the leap via their time derivative
//! `ȧ_j = Σ_i (∂a_j/∂x_i) ẋ_i`, with `ẋ = Σ_j v_j a_j` the mean drift, so a
//! leap contributes `a_j τ + ȧ_j τ²/2` expected events instead of `a_j τ`.
//! The hybrid switch and contraction safeguards are shared with plain
//! tau-leaping.

use rand_chacha::ChaCha8Rng;

use super::tau_leap::execute_leap;
use super::{exact_direct_step, Algorithm, LeapParams, StepStats};
use crate::error::SimError;
use crate::model::{Network, Reaction};
use crate::propensity::{combinations, combinations_derivative, Propensities};

/// `∂a_j/∂x_s` for a mass-action reaction; zero when `s` is not a reactant.
fn propensity_partial(reaction: &Reaction, state: &[i32], species: usize) -> f64 {
    let mut partial = reaction.rate;
    let mut involved = false;
    for reactant in &reaction.reactants {
        let x = state[reactant.species];
        if reactant.species == species {
            involved = true;
            partial *= combinations_derivative(x, reactant.count);
        } else {
            partial *= combinations(x, reactant.count);
        }
    }
    if involved {
        partial
    } else {
        0.0
    }
}

pub(crate) struct StepAnticipation {
    t: f64,
    end_time: f64,
    params: LeapParams,
    /// Mean drift of the state, `ẋ_i = Σ_j v_ij a_j`.
    dxdt: Vec<f64>,
    /// Propensity time derivatives `ȧ_j`.
    drdt: Vec<f64>,
    events: Vec<i64>,
    proposed: Vec<i64>,
    stats: StepStats,
}

impl StepAnticipation {
    pub(crate) fn new(end_time: f64, params: LeapParams) -> Self {
        Self {
            t: 0.0,
            end_time,
            params,
            dxdt: Vec::new(),
            drdt: Vec::new(),
            events: Vec::new(),
            proposed: Vec::new(),
            stats: StepStats::default(),
        }
    }

    fn compute_derivatives(
        &mut self,
        network: &Network,
        state: &[i32],
        propensities: &Propensities,
    ) {
        self.dxdt.fill(0.0);
        for (reaction, &a) in network.reactions().iter().zip(propensities.values()) {
            if a <= 0.0 {
                continue;
            }
            for delta in &reaction.deltas {
                self.dxdt[delta.species] += delta.delta as f64 * a;
            }
        }

        for (slot, reaction) in self.drdt.iter_mut().zip(network.reactions()) {
            let mut derivative = 0.0;
            for reactant in &reaction.reactants {
                let drift = self.dxdt[reactant.species];
                if drift != 0.0 {
                    derivative += propensity_partial(reaction, state, reactant.species) * drift;
                }
            }
            *slot = derivative;
        }
    }

    /// Largest leap keeping the anticipated relative propensity change under
    /// epsilon: `|ȧ_j| τ ≤ ε a_j` for every active reaction.
    fn select_tau(&self, propensities: &Propensities) -> f64 {
        let mut tau = f64::INFINITY;
        for (&a, &da) in propensities.values().iter().zip(&self.drdt) {
            if a > 0.0 && da != 0.0 {
                tau = tau.min(self.params.epsilon * a / da.abs());
            }
        }
        tau
    }
}

impl Algorithm for StepAnticipation {
    fn init(&mut self, network: &Network) {
        self.dxdt = vec![0.0; network.n_species()];
        self.drdt = vec![0.0; network.n_reactions()];
        self.events = vec![0; network.n_reactions()];
        self.proposed = vec![0; network.n_species()];
    }

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

        let total = propensities.total();
        if total <= 0.0 {
            self.t = self.end_time;
            return Ok(());
        }

        self.compute_derivatives(network, state, propensities);
        let mut tau = self.select_tau(propensities);
        tau = tau.min(self.end_time - self.t);

        if tau < self.params.delta / total {
            self.t = exact_direct_step(network, state, propensities, rng, self.t, self.end_time);
            return Ok(());
        }

        let values = propensities.values().to_vec();
        let drdt = self.drdt.clone();
        let outcome = execute_leap(
            network,
            state,
            propensities,
            rng,
            &mut self.events,
            &mut self.proposed,
            &self.params,
            self.t,
            tau,
            |reaction, tau| (values[reaction] * tau + 0.5 * drdt[reaction] * tau * tau).max(0.0),
        )?;
        self.t += outcome.tau;
        self.stats.negative_excursions += outcome.contractions as u64;
        if outcome.contractions > 0 {
            self.stats.recoveries += 1;
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
