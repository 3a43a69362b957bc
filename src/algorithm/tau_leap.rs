//! Poisson tau-leaping with hybrid exact switching and negative-population
//! contraction.
//!
//! Leap sizes come from the Cao–Gillespie–Petzold moment bound: for each
//! species `i` the expected change `μ_i = Σ_j v_ij a_j` and its variance
//! `σ²_i = Σ_j v_ij² a_j` are held within `max(ε·x_i/g_i, 1)`, where `g_i`
//! is the highest total reactant order among reactions consuming `i`.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Poisson};

use super::{exact_direct_step, Algorithm, LeapParams, StepStats};
use crate::error::SimError;
use crate::model::Network;
use crate::propensity::Propensities;

pub(super) struct LeapOutcome {
    pub tau: f64,
    pub contractions: u32,
}

/// Draw Poisson event counts for a candidate leap, contract on a would-be
/// negative population, and commit the first viable aggregate update.
/// Shared by [`TauLeap`] and [`super::StepAnticipation`].
pub(super) fn execute_leap(
    network: &Network,
    state: &mut [i32],
    propensities: &mut Propensities,
    rng: &mut ChaCha8Rng,
    events: &mut [i64],
    proposed: &mut [i64],
    params: &LeapParams,
    time: f64,
    mut tau: f64,
    mean_events: impl Fn(usize, f64) -> f64,
) -> Result<LeapOutcome, SimError> {
    let mut contractions = 0u32;
    loop {
        for (reaction, slot) in events.iter_mut().enumerate() {
            let mean = mean_events(reaction, tau);
            *slot = if mean > 0.0 {
                let dist = Poisson::new(mean).map_err(|err| {
                    SimError::InvalidArgument(format!("poisson mean {mean}: {err}"))
                })?;
                dist.sample(rng) as i64
            } else {
                0
            };
        }

        for (slot, &x) in proposed.iter_mut().zip(state.iter()) {
            *slot = x as i64;
        }
        for (reaction, &count) in events.iter().enumerate() {
            if count == 0 {
                continue;
            }
            for delta in &network.reactions()[reaction].deltas {
                proposed[delta.species] += count * delta.delta as i64;
            }
        }

        let viable = proposed
            .iter()
            .all(|&x| (0..=i32::MAX as i64).contains(&x));
        if viable {
            for (dst, &src) in state.iter_mut().zip(proposed.iter()) {
                *dst = src as i32;
            }
            propensities.update_after_leap(network, state, events);
            return Ok(LeapOutcome { tau, contractions });
        }

        contractions += 1;
        if contractions > params.max_contractions {
            log::warn!(
                "leap contraction budget exhausted at t = {time} (tau = {tau})"
            );
            return Err(SimError::RetryExhausted { time });
        }
        tau *= params.beta;
        log::debug!("negative excursion at t = {time}, contracting leap to tau = {tau}");
    }
}

pub(crate) struct TauLeap {
    t: f64,
    end_time: f64,
    params: LeapParams,
    /// Highest reactant order consuming each species (`g_i`).
    highest_order: Vec<f64>,
    mu: Vec<f64>,
    sigma2: Vec<f64>,
    events: Vec<i64>,
    proposed: Vec<i64>,
    stats: StepStats,
}

impl TauLeap {
    pub(crate) fn new(end_time: f64, params: LeapParams) -> Self {
        Self {
            t: 0.0,
            end_time,
            params,
            highest_order: Vec::new(),
            mu: Vec::new(),
            sigma2: Vec::new(),
            events: Vec::new(),
            proposed: Vec::new(),
            stats: StepStats::default(),
        }
    }

    fn select_tau(
        &mut self,
        network: &Network,
        state: &[i32],
        propensities: &Propensities,
    ) -> f64 {
        self.mu.fill(0.0);
        self.sigma2.fill(0.0);
        for (reaction, &a) in network.reactions().iter().zip(propensities.values()) {
            if a <= 0.0 {
                continue;
            }
            for delta in &reaction.deltas {
                let v = delta.delta as f64;
                self.mu[delta.species] += v * a;
                self.sigma2[delta.species] += v * v * a;
            }
        }

        let epsilon = self.params.epsilon;
        let mut tau = f64::INFINITY;
        for (species, (&mu, &sigma2)) in self.mu.iter().zip(&self.sigma2).enumerate() {
            if sigma2 <= 0.0 {
                continue;
            }
            let bound = (epsilon * state[species] as f64 / self.highest_order[species]).max(1.0);
            let by_mean = if mu != 0.0 {
                bound / mu.abs()
            } else {
                f64::INFINITY
            };
            tau = tau.min(by_mean).min(bound * bound / sigma2);
        }
        tau
    }
}

impl Algorithm for TauLeap {
    fn init(&mut self, network: &Network) {
        let n = network.n_species();
        self.highest_order = vec![1.0; n];
        for reaction in network.reactions() {
            let order: i32 = reaction.reactants.iter().map(|r| r.count).sum();
            for reactant in &reaction.reactants {
                let slot = &mut self.highest_order[reactant.species];
                *slot = slot.max(order as f64);
            }
        }
        self.mu = vec![0.0; n];
        self.sigma2 = vec![0.0; n];
        self.events = vec![0; network.n_reactions()];
        self.proposed = vec![0; n];
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

        let mut tau = self.select_tau(network, state, propensities);
        tau = tau.min(self.end_time - self.t);

        if tau < self.params.delta / total {
            // degenerate leap: one exact step instead
            self.t = exact_direct_step(network, state, propensities, rng, self.t, self.end_time);
            return Ok(());
        }

        let values = propensities.values().to_vec();
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
            |reaction, tau| values[reaction] * tau,
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
