//! Trajectory representations and the per-trial recorder.
//!
//! Full recording appends every realized event; fixed-epoch recording
//! samples the trajectory as a right-continuous step function onto equally
//! spaced epoch boundaries (last value carried forward).

use crate::model::Network;

pub(crate) const TIME_EPSILON: f64 = 1e-12;

/// How trajectories are recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputMode {
    /// Append every `(time, state)` event; unbounded growth with event count.
    Full,
    /// Sample onto `epochs` equal subdivisions of `[0, end_time]`.
    FixedEpoch,
}

/// Event-exact trajectory: one `(time, state)` record per realized event,
/// including the initial state at time zero. States are stored flat,
/// `n_species` entries per record.
#[derive(Clone, Debug)]
pub struct SamplePath {
    times: Vec<f64>,
    states: Vec<i32>,
    n_species: usize,
}

impl SamplePath {
    fn new(n_species: usize) -> Self {
        Self {
            times: Vec::new(),
            states: Vec::new(),
            n_species,
        }
    }

    fn push(&mut self, time: f64, state: &[i32]) {
        debug_assert_eq!(state.len(), self.n_species);
        self.times.push(time);
        self.states.extend_from_slice(state);
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn time(&self, record: usize) -> f64 {
        self.times[record]
    }

    pub fn state(&self, record: usize) -> &[i32] {
        &self.states[record * self.n_species..(record + 1) * self.n_species]
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }
}

///// Fixed-grid trajectory: an `epochs × n_species` matrix plus the epoch
/// boundary times. Row `e` holds the state at `(e+1)·end_time/epochs`, so a
/// single epoch records exactly the state at `end_time`.
#[derive(Clone, Debug)]
pub struct RegularPath {
    times: Vec<f64>,
    data: Vec<i32>,
    n_species: usize,
}

impl RegularPath {
    fn new(epochs: usize, n_species: usize, end_time: f64) -> Self {
        let times = (0..epochs)
            .map(|e| end_time * (e + 1) as f64 / epochs as f64)
            .collect();
        Self {
            times,
            data: vec![0; epochs * n_species],
            n_species,
        }
    }

    pub fn epochs(&self) -> usize {
        self.times.len()
    }

    pub fn time(&self, epoch: usize) -> f64 {
        self.times[epoch]
    }

    pub fn state(&self, epoch: usize) -> &[i32] {
        &self.data[epoch * self.n_species..(epoch + 1) * self.n_species]
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    fn write(&mut self, epoch: usize, state: &[i32]) {
        let start = epoch * self.n_species;
        self.data[start..start + self.n_species].copy_from_slice(state);
    }

    /// Re-sample a recorded [`SamplePath`] onto a fixed epoch grid. Agrees
    /// with direct fixed-epoch recording of the same trajectory.
    pub fn from_sample_path(path: &SamplePath, epochs: usize, end_time: f64) -> Self {
        let mut regular = Self::new(epochs, path.n_species, end_time);
        if path.is_empty() {
            return regular;
        }
        let mut next_epoch = 0usize;
        let mut prev = 0usize;
        for record in 1..path.len() {
            let t = path.time(record);
            while next_epoch < epochs {
                let boundary = regular.times[next_epoch];
                if boundary + TIME_EPSILON < t {
                    regular.write(next_epoch, path.state(prev));
                    next_epoch += 1;
                } else if boundary <= t + TIME_EPSILON {
                    regular.write(next_epoch, path.state(record));
                    next_epoch += 1;
                } else {
                    break;
                }
            }
            prev = record;
        }
        while next_epoch < epochs {
            regular.write(next_epoch, path.state(path.len() - 1));
            next_epoch += 1;
        }
        regular
    }
}

/// A completed trial's trajectory, tagged by recording mode.
#[derive(Clone, Debug)]
pub enum TrialPath {
    Full(SamplePath),
    Regular(RegularPath),
}

/// Per-trial recorder, resolved into one concrete representation at the
/// simulate boundary rather than branching on mode in the hot loop.
pub(crate) enum Recorder {
    Full(SamplePath),
    Regular {
        path: RegularPath,
        next_epoch: usize,
        /// State observed at the previous event; carried into crossed epochs.
        prev_state: Vec<i32>,
    },
}

impl Recorder {
    pub(crate) fn new(mode: OutputMode, network: &Network, epochs: usize, end_time: f64) -> Self {
        match mode {
            OutputMode::Full => Self::Full(SamplePath::new(network.n_species())),
            OutputMode::FixedEpoch => Self::Regular {
                path: RegularPath::new(epochs, network.n_species(), end_time),
                next_epoch: 0,
                prev_state: vec![0; network.n_species()],
            },
        }
    }

    /// Record the initial state at time zero.
    pub(crate) fn begin(&mut self, state: &[i32]) {
        match self {
            Self::Full(path) => path.push(0.0, state),
            Self::Regular { prev_state, .. } => prev_state.copy_from_slice(state),
        }
    }

    /// Observe the state reached by a step at time `t`. Epoch boundaries
    /// crossed strictly before `t` carry the previous state; a boundary
    /// coinciding with `t` takes the post-jump state (right continuity).
    pub(crate) fn sample(&mut self, t: f64, state: &[i32]) {
        match self {
            Self::Full(path) => path.push(t, state),
            Self::Regular {
                path,
                next_epoch,
                prev_state,
            } => {
                while *next_epoch < path.epochs() {
                    let boundary = path.times[*next_epoch];
                    if boundary + TIME_EPSILON < t {
                        path.write(*next_epoch, prev_state);
                        *next_epoch += 1;
                    } else if boundary <= t + TIME_EPSILON {
                        path.write(*next_epoch, state);
                        *next_epoch += 1;
                    } else {
                        break;
                    }
                }
                prev_state.copy_from_slice(state);
            }
        }
    }

    /// Force-fill every remaining epoch with the last observed state.
    pub(crate) fn finish(&mut self) {
        if let Self::Regular {
            path,
            next_epoch,
            prev_state,
        } = self
        {
            while *next_epoch < path.epochs() {
                path.write(*next_epoch, prev_state);
                *next_epoch += 1;
            }
        }
    }

    pub(crate) fn into_path(self) -> TrialPath {
        match self {
            Self::Full(path) => TrialPath::Full(path),
            Self::Regular { path, .. } => TrialPath::Regular(path),
        }
    }
}
