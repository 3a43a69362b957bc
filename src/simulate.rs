//! Trial driver: runs independent replicates of a network simulation,
//! optionally in parallel, and aggregates them into a summary.

use std::collections::HashMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::algorithm::{Algorithm, Method, StepStats};
use crate::error::SimError;
use crate::model::Network;
use crate::output::{OutputMode, Recorder, RegularPath, SamplePath, TrialPath};
use crate::propensity::Propensities;

/// Options common to every simulate call. Leap-specific parameters ride on
/// the [`Method`] variants.
#[derive(Clone, Debug)]
pub struct SimulateOptions {
    /// Termination time, in the units of the model. Zero is accepted and
    /// yields the initial state in every representation.
    pub time: f64,
    /// Number of equal sampling epochs; meaningful only for
    /// [`OutputMode::FixedEpoch`].
    pub epochs: usize,
    /// Number of independent replicates.
    pub trials: usize,
    /// Accumulate per-trial step statistics into the summary.
    pub track_stats: bool,
    /// Base seed for reproducible runs; per-trial generators derive from it.
    pub seed: Option<u64>,
    /// Worker pool size override; `None` uses the global rayon pool.
    pub n_threads: Option<usize>,
}

impl Default for SimulateOptions {
    fn default() -> Self {
        Self {
            time: 1.0,
            epochs: 1,
            trials: 1,
            track_stats: false,
            seed: None,
            n_threads: None,
        }
    }
}

/// A trial that aborted (leap retry exhaustion). Failed trials deposit no
/// path and never crash the batch.
#[derive(Debug)]
pub struct TrialFailure {
    pub trial: usize,
    pub error: SimError,
}

/// Per-trial trajectories, tagged by the recording mode of the run.
#[derive(Debug)]
pub enum PathSet {
    Full(Vec<SamplePath>),
    Regular(Vec<RegularPath>),
}

impl PathSet {
    pub fn len(&self) -> usize {
        match self {
            PathSet::Full(paths) => paths.len(),
            PathSet::Regular(paths) => paths.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything a simulate call produced: identity of the run, aggregate
/// statistics, and the per-trial path collection.
#[derive(Debug)]
pub struct SimulationSummary {
    network_name: String,
    species_names: Vec<String>,
    species_index: HashMap<String, usize>,
    method: Method,
    end_time: f64,
    stats: Option<StepStats>,
    paths: PathSet,
    failures: Vec<TrialFailure>,
}

impl SimulationSummary {
    pub fn network_name(&self) -> &str {
        &self.network_name
    }

    pub fn species_names(&self) -> &[String] {
        &self.species_names
    }

    /// Name → index lookup for species columns.
    pub fn species_index(&self) -> &HashMap<String, usize> {
        &self.species_index
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    /// Aggregate step statistics; `None` unless `track_stats` was set.
    pub fn stats(&self) -> Option<&StepStats> {
        self.stats.as_ref()
    }

    pub fn paths(&self) -> &PathSet {
        &self.paths
    }

    pub fn failures(&self) -> &[TrialFailure] {
        &self.failures
    }
}

/// Simulate `options.trials` independent realizations of `network` with the
/// chosen algorithm and recording mode.
///
/// All configuration is validated before any trial executes. Trials are
/// distributed over a rayon pool; each owns a private state vector,
/// propensity vector, algorithm instance, and a deterministically seeded
/// generator, so results are independent of scheduling order.
pub fn simulate(
    network: &Network,
    method: Method,
    mode: OutputMode,
    options: &SimulateOptions,
) -> Result<SimulationSummary, SimError> {
    validate(&method, mode, options)?;

    let end_time = options.time;
    let epochs = options.epochs;
    let seed = options.seed;
    let initial = network.initial_state();

    let run_all = || -> Vec<Result<(TrialPath, StepStats), TrialFailure>> {
        (0..options.trials)
            .into_par_iter()
            .map_init(
                || {
                    let mut algorithm = method.build(end_time);
                    algorithm.init(network);
                    (
                        algorithm,
                        vec![0i32; network.n_species()],
                        Propensities::new(network.n_reactions()),
                    )
                },
                |(algorithm, state, propensities), trial| {
                    run_trial(
                        network,
                        algorithm.as_mut(),
                        state,
                        propensities,
                        &initial,
                        mode,
                        epochs,
                        end_time,
                        derive_seed(seed, trial as u64),
                    )
                    .map_err(|error| {
                        log::warn!("trial {trial} failed: {error}");
                        TrialFailure { trial, error }
                    })
                },
            )
            .collect()
    };

    let results = match options.n_threads {
        Some(n) => ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map_err(|e| SimError::ThreadPool(e.to_string()))?
            .install(run_all),
        None => run_all(),
    };

    let mut paths = match mode {
        OutputMode::Full => PathSet::Full(Vec::with_capacity(options.trials)),
        OutputMode::FixedEpoch => PathSet::Regular(Vec::with_capacity(options.trials)),
    };
    let mut failures = Vec::new();
    let mut stats = StepStats::default();
    for result in results {
        match result {
            Ok((path, trial_stats)) => {
                stats.merge(trial_stats);
                match (&mut paths, path) {
                    (PathSet::Full(list), TrialPath::Full(p)) => list.push(p),
                    (PathSet::Regular(list), TrialPath::Regular(p)) => list.push(p),
                    _ => unreachable!("recorder mode matches the requested output mode"),
                }
            }
            Err(failure) => failures.push(failure),
        }
    }

    Ok(SimulationSummary {
        network_name: network.name().to_string(),
        species_names: network.species().iter().map(|s| s.name.clone()).collect(),
        species_index: network.species_index().clone(),
        method,
        end_time,
        stats: options.track_stats.then_some(stats),
        paths,
        failures,
    })
}

fn validate(method: &Method, mode: OutputMode, options: &SimulateOptions) -> Result<(), SimError> {
    if !options.time.is_finite() || options.time < 0.0 {
        return Err(SimError::InvalidArgument(format!(
            "time must be finite and non-negative, got {}",
            options.time
        )));
    }
    if options.trials == 0 {
        return Err(SimError::InvalidArgument(
            "number of trials must be greater than zero".into(),
        ));
    }
    if mode == OutputMode::FixedEpoch && options.epochs == 0 {
        return Err(SimError::InvalidArgument(
            "fixed-epoch recording requires at least one epoch".into(),
        ));
    }
    method.validate()
}

/// One independent replicate: restore the initial counts, recompute all
/// propensities, reset the algorithm, then step until done, feeding the
/// recorder after every step and flushing it afterwards.
#[allow(clippy::too_many_arguments)]
fn run_trial(
    network: &Network,
    algorithm: &mut dyn Algorithm,
    state: &mut [i32],
    propensities: &mut Propensities,
    initial: &[i32],
    mode: OutputMode,
    epochs: usize,
    end_time: f64,
    seed: u64,
) -> Result<(TrialPath, StepStats), SimError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    state.copy_from_slice(initial);
    propensities.compute_all(network, state);
    algorithm.reset(network, state, propensities, &mut rng);

    let mut recorder = Recorder::new(mode, network, epochs, end_time);
    recorder.begin(state);
    while !algorithm.done() {
        algorithm.step(network, state, propensities, &mut rng)?;
        recorder.sample(algorithm.time(), state);
    }
    recorder.finish();

    Ok((recorder.into_path(), algorithm.stats()))
}

/// Per-trial seed derivation (SplitMix64 over the base seed and the trial
/// index) so that parallel trials draw from independent streams.
pub(crate) fn derive_seed(seed: Option<u64>, trial: u64) -> u64 {
    const GOLDEN_GAMMA: u64 = 0x9E3779B97F4A7C15;
    let base = seed.unwrap_or(0xDEADBEEFCAFEBABE);
    let z = base ^ (trial.wrapping_mul(GOLDEN_GAMMA));
    let mut result = z.wrapping_add(GOLDEN_GAMMA);
    result = (result ^ (result >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    result = (result ^ (result >> 27)).wrapping_mul(0x94D049BB133111EB);
    result ^ (result >> 31)
}
