//! The family of interchangeable step algorithms.
//!
//! Every variant advances time, state, and propensities by one unit of
//! progress behind the same [`Algorithm`] contract; the [`Method`] enum
//! selects and constructs a variant at the `simulate` call boundary.

mod direct;
mod first_reaction;
mod next_reaction;
mod optimized;
mod sal;
mod tau_leap;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

pub(crate) use direct::Direct;
pub(crate) use first_reaction::FirstReaction;
#[cfg(test)]
pub(crate) use next_reaction::IndexedHeap;
pub(crate) use next_reaction::NextReaction;
pub(crate) use optimized::OptimizedDirect;
pub(crate) use sal::StepAnticipation;
pub(crate) use tau_leap::TauLeap;

use crate::error::SimError;
use crate::model::Network;
use crate::propensity::Propensities;

/// Per-trial step statistics, accumulated into summary totals by the driver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepStats {
    /// Committed `step` calls.
    pub steps: u64,
    /// Leap contractions triggered by a would-be-negative population.
    pub negative_excursions: u64,
    /// Leaps committed after at least one contraction.
    pub recoveries: u64,
}

impl StepStats {
    pub(crate) fn merge(&mut self, other: StepStats) {
        self.steps += other.steps;
        self.negative_excursions += other.negative_excursions;
        self.recoveries += other.recoveries;
    }
}

/// Shared contract of all step algorithms.
///
/// `init` runs once per worker (allocation and precomputation), `reset`
/// restores time to zero between trials, and `step` performs one unit of
/// simulated progress. The driver stops issuing `step` calls once `done`.
pub(crate) trait Algorithm {
    fn init(&mut self, network: &Network);

    fn reset(
        &mut self,
        network: &Network,
        state: &[i32],
        propensities: &Propensities,
        rng: &mut ChaCha8Rng,
    );

    fn step(
        &mut self,
        network: &Network,
        state: &mut [i32],
        propensities: &mut Propensities,
        rng: &mut ChaCha8Rng,
    ) -> Result<(), SimError>;

    fn time(&self) -> f64;

    fn end_time(&self) -> f64;

    fn done(&self) -> bool {
        self.time() >= self.end_time()
    }

    fn stats(&self) -> StepStats;
}

/// Parameters shared by the leaping variants.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LeapParams {
    /// Tolerance on the expected relative change of propensities per leap.
    pub epsilon: f64,
    /// Hybrid switch: take an exact step when the candidate leap is shorter
    /// than `delta` expected event gaps (`delta / a0`).
    pub delta: f64,
    /// Contraction factor applied to the leap on a negative excursion.
    pub beta: f64,
    /// Contraction budget per leap before the trial aborts.
    pub max_contractions: u32,
}

impl Default for LeapParams {
    fn default() -> Self {
        Self {
            epsilon: 0.125,
            delta: 4.0,
            beta: 0.75,
            max_contractions: 25,
        }
    }
}

impl LeapParams {
    fn validate(&self) -> Result<(), SimError> {
        if !(self.epsilon > 0.0 && self.epsilon < 1.0) {
            return Err(SimError::InvalidArgument(format!(
                "epsilon must lie in (0, 1), got {}",
                self.epsilon
            )));
        }
        if !(self.delta > 0.0) || !self.delta.is_finite() {
            return Err(SimError::InvalidArgument(format!(
                "delta must be positive and finite, got {}",
                self.delta
            )));
        }
        if !(self.beta > 0.0 && self.beta < 1.0) {
            return Err(SimError::InvalidArgument(format!(
                "beta must lie in (0, 1), got {}",
                self.beta
            )));
        }
        if self.max_contractions == 0 {
            return Err(SimError::InvalidArgument(
                "max_contractions must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Algorithm selection, resolved into a concrete variant per worker.
#[derive(Clone, Debug, PartialEq)]
pub enum Method {
    /// Gillespie's direct method (exact).
    Direct,
    /// First-reaction method (exact, reference semantics).
    FirstReaction,
    /// Gibson–Bruck next-reaction method (exact).
    NextReaction,
    /// Direct method with a periodically resorted scan order (exact).
    OptimizedDirect,
    /// Poisson tau-leaping with hybrid switching and contraction.
    TauLeap(LeapParams),
    /// Step-anticipation tau-leaping (first-order propensity extrapolation).
    StepAnticipation(LeapParams),
}

impl Method {
    pub fn name(&self) -> &'static str {
        match self {
            Method::Direct => "direct",
            Method::FirstReaction => "first-reaction",
            Method::NextReaction => "next-reaction",
            Method::OptimizedDirect => "optimized-direct",
            Method::TauLeap(_) => "tau-leap",
            Method::StepAnticipation(_) => "step-anticipation",
        }
    }

    pub(crate) fn validate(&self) -> Result<(), SimError> {
        match self {
            Method::TauLeap(params) | Method::StepAnticipation(params) => params.validate(),
            _ => Ok(()),
        }
    }

    pub(crate) fn build(&self, end_time: f64) -> Box<dyn Algorithm + Send> {
        match self {
            Method::Direct => Box::new(Direct::new(end_time)),
            Method::FirstReaction => Box::new(FirstReaction::new(end_time)),
            Method::NextReaction => Box::new(NextReaction::new(end_time)),
            Method::OptimizedDirect => Box::new(OptimizedDirect::new(end_time)),
            Method::TauLeap(params) => Box::new(TauLeap::new(end_time, *params)),
            Method::StepAnticipation(params) => Box::new(StepAnticipation::new(end_time, *params)),
        }
    }
}

/// Exponential waiting time with the given rate; `+inf` when the rate
/// vanishes (the inverse-transform draw used throughout).
#[inline]
pub(crate) fn exponential(rng: &mut ChaCha8Rng, rate: f64) -> f64 {
    if rate <= 0.0 {
        return f64::INFINITY;
    }
    let u: f64 = rng.gen();
    -u.ln() / rate
}

/// Select a reaction by cumulative scan in list order; ties resolve to the
/// lowest index, and floating-point residue falls back to the last reaction
/// with positive propensity.
#[inline]
pub(crate) fn select_linear(values: &[f64], mut target: f64) -> usize {
    let mut last_positive = 0;
    for (idx, &value) in values.iter().enumerate() {
        if value <= 0.0 {
            continue;
        }
        if target < value {
            return idx;
        }
        target -= value;
        last_positive = idx;
    }
    last_positive
}

/// One exact direct-method step, shared by [`Direct`] and the hybrid path of
/// the leaping variants. Returns the new simulation time; an absorbed state
/// (zero cumulative propensity) jumps straight to `end_time`.
pub(crate) fn exact_direct_step(
    network: &Network,
    state: &mut [i32],
    propensities: &mut Propensities,
    rng: &mut ChaCha8Rng,
    time: f64,
    end_time: f64,
) -> f64 {
    let total = propensities.total();
    if total <= 0.0 {
        return end_time;
    }
    let tau = exponential(rng, total);
    if !tau.is_finite() {
        return end_time;
    }
    let target: f64 = rng.gen::<f64>() * total;
    let chosen = select_linear(propensities.values(), target);
    network.apply_deltas(chosen, state);
    propensities.update_affected(network, state, chosen);
    time + tau
}
