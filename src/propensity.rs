//! Mass-action propensity evaluation with incremental dependency-set updates.

use crate::model::{Network, Reaction};

/// Number of distinct ways to pick the reactant combination out of `value`
/// particles: the binomial coefficient C(value, count) with small-order fast
/// paths. Zero whenever the population is below the stoichiometric threshold.
#[inline]
pub(crate) fn combinations(value: i32, count: i32) -> f64 {
    match count {
        0 => 1.0,
        1 => value.max(0) as f64,
        2 if value >= 2 => (value as f64) * ((value - 1) as f64) * 0.5,
        _ if value < count => 0.0,
        _ => {
            let mut acc = 1.0;
            for i in 0..count {
                acc *= ((value - i) as f64) / ((count - i) as f64);
            }
            acc
        }
    }
}

/// d/dx C(x, count) with x treated as a real variable; used by the
/// step-anticipation method to extrapolate propensities.
#[inline]
pub(crate) fn combinations_derivative(value: i32, count: i32) -> f64 {
    let x = value as f64;
    match count {
        0 => 0.0,
        1 => 1.0,
        2 => x - 0.5,
        3 => (3.0 * x * x - 6.0 * x + 2.0) / 6.0,
        _ => (combinations(value + 1, count) - combinations(value - 1, count)) * 0.5,
    }
}

/// Propensity of a single reaction at `state`:
/// `rate · Π_s C(x_s, m_s)` over its reactants.
#[inline]
pub(crate) fn reaction_propensity(reaction: &Reaction, state: &[i32]) -> f64 {
    let mut propensity = reaction.rate;
    for reactant in &reaction.reactants {
        let available = state[reactant.species];
        if available < reactant.count {
            return 0.0;
        }
        propensity *= combinations(available, reactant.count);
    }
    propensity
}

/// The propensity vector `a` plus its cached running total `a0`.
#[derive(Clone, Debug)]
pub struct Propensities {
    values: Vec<f64>,
    total: f64,
    // stamp markers for deduplicating dependency sets after a leap
    marks: Vec<usize>,
    stamp: usize,
}

impl Propensities {
    pub fn new(n_reactions: usize) -> Self {
        Self {
            values: vec![0.0; n_reactions],
            total: 0.0,
            marks: vec![0; n_reactions],
            stamp: 0,
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[inline]
    pub fn total(&self) -> f64 {
        self.total
    }

    #[inline]
    pub fn get(&self, reaction: usize) -> f64 {
        self.values[reaction]
    }

    /// Overwrite a single entry, keeping the running total consistent.
    #[inline]
    pub(crate) fn set(&mut self, reaction: usize, value: f64) {
        self.total += value - self.values[reaction];
        self.values[reaction] = value;
    }

    /// Full O(R) evaluation; called once per trial at initialization.
    pub fn compute_all(&mut self, network: &Network, state: &[i32]) {
        let mut total = 0.0;
        for (value, reaction) in self.values.iter_mut().zip(network.reactions()) {
            *value = reaction_propensity(reaction, state);
            total += *value;
        }
        self.total = total;
    }

    /// Recompute only the dependency set of `fired`; O(deg), not O(R).
    pub fn update_affected(&mut self, network: &Network, state: &[i32], fired: usize) {
        for &dep in network.dependencies(fired) {
            let new_value = reaction_propensity(&network.reactions()[dep], state);
            self.total += new_value - self.values[dep];
            self.values[dep] = new_value;
        }
    }

    /// Recompute the union of dependency sets of every reaction that fired at
    /// least once during a leap.
    pub fn update_after_leap(&mut self, network: &Network, state: &[i32], events: &[i64]) {
        if self.stamp == usize::MAX {
            self.marks.fill(0);
            self.stamp = 0;
        }
        self.stamp += 1;
        let mark = self.stamp;
        for (reaction, &count) in events.iter().enumerate() {
            if count == 0 {
                continue;
            }
            for &dep in network.dependencies(reaction) {
                if self.marks[dep] != mark {
                    self.marks[dep] = mark;
                    let new_value = reaction_propensity(&network.reactions()[dep], state);
                    self.total += new_value - self.values[dep];
                    self.values[dep] = new_value;
                }
            }
        }
    }
}
