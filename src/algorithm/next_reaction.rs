//! Gibson–Bruck next-reaction method.
//!
//! Maintains one absolute putative firing time per reaction in an indexed
//! binary heap. After reaction `k` fires at time `t`, only `k`'s dependency
//! set is touched: the fired reaction redraws, a reaction whose propensity
//! changed from `a_old` to `a_new` rescales its pending time via
//! `T' = t + (a_old / a_new) · (T − t)`, and a reaction whose propensity
//! became nonzero from zero draws fresh. Everything else keeps its entry.

use rand_chacha::ChaCha8Rng;

use super::{exponential, Algorithm, StepStats};
use crate::error::SimError;
use crate::model::Network;
use crate::propensity::{reaction_propensity, Propensities};

/// Binary min-heap over a fixed set of reactions with an update-key
/// operation, since rescaling mutates entries that are not the minimum.
/// Flat `Vec` storage with a position table per reaction.
#[derive(Clone, Debug, Default)]
pub(crate) struct IndexedHeap {
    keys: Vec<f64>,
    heap: Vec<usize>,
    pos: Vec<usize>,
}

impl IndexedHeap {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            keys: vec![f64::INFINITY; len],
            heap: (0..len).collect(),
            pos: (0..len).collect(),
        }
    }

    /// Replace every key and re-establish the heap order.
    pub(crate) fn rebuild(&mut self, keys: &[f64]) {
        debug_assert_eq!(keys.len(), self.keys.len());
        self.keys.copy_from_slice(keys);
        for (slot, item) in self.heap.iter_mut().enumerate() {
            *item = slot;
            self.pos[slot] = slot;
        }
        for slot in (0..self.heap.len() / 2).rev() {
            self.sift_down(slot);
        }
    }

    /// The reaction with the smallest putative time, and that time.
    pub(crate) fn min(&self) -> (usize, f64) {
        debug_assert!(!self.heap.is_empty());
        let item = self.heap[0];
        (item, self.keys[item])
    }

    pub(crate) fn update(&mut self, item: usize, key: f64) {
        let old = self.keys[item];
        self.keys[item] = key;
        let slot = self.pos[item];
        if key < old {
            self.sift_up(slot);
        } else {
            self.sift_down(slot);
        }
    }

    #[inline]
    pub(crate) fn key(&self, item: usize) -> f64 {
        self.keys[item]
    }

    fn sift_up(&mut self, mut slot: usize) {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if self.keys[self.heap[slot]] < self.keys[self.heap[parent]] {
                self.swap_slots(slot, parent);
                slot = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut slot: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * slot + 1;
            if left >= len {
                break;
            }
            let mut child = left;
            let right = left + 1;
            if right < len && self.keys[self.heap[right]] < self.keys[self.heap[left]] {
                child = right;
            }
            if self.keys[self.heap[child]] < self.keys[self.heap[slot]] {
                self.swap_slots(slot, child);
                slot = child;
            } else {
                break;
            }
        }
    }

    #[inline]
    fn swap_slots(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.pos[self.heap[a]] = a;
        self.pos[self.heap[b]] = b;
    }
}

pub(crate) struct NextReaction {
    t: f64,
    end_time: f64,
    queue: IndexedHeap,
    scratch_keys: Vec<f64>,
    stats: StepStats,
}

impl NextReaction {
    pub(crate) fn new(end_time: f64) -> Self {
        Self {
            t: 0.0,
            end_time,
            queue: IndexedHeap::default(),
            scratch_keys: Vec::new(),
            stats: StepStats::default(),
        }
    }

    /// Rescaled putative time for a still-pending reaction whose propensity
    /// changed from `a_old` to `a_new` at time `t`.
    #[inline]
    pub(crate) fn rescale(t: f64, a_old: f64, a_new: f64, pending: f64) -> f64 {
        t + (a_old / a_new) * (pending - t)
    }
}

impl Algorithm for NextReaction {
    fn init(&mut self, network: &Network) {
        self.queue = IndexedHeap::new(network.n_reactions());
        self.scratch_keys = vec![f64::INFINITY; network.n_reactions()];
    }

    fn reset(
        &mut self,
        _network: &Network,
        _state: &[i32],
        propensities: &Propensities,
        rng: &mut ChaCha8Rng,
    ) {
        self.t = 0.0;
        self.stats = StepStats::default();
        for (key, &a) in self.scratch_keys.iter_mut().zip(propensities.values()) {
            *key = exponential(rng, a);
        }
        self.queue.rebuild(&self.scratch_keys);
    }

    fn step(
        &mut self,
        network: &Network,
        state: &mut [i32],
        propensities: &mut Propensities,
        rng: &mut ChaCha8Rng,
    ) -> Result<(), SimError> {
        self.stats.steps += 1;

        let (fired, firing_time) = self.queue.min();
        if !firing_time.is_finite() {
            // absorbed: no reaction is pending
            self.t = self.end_time;
            return Ok(());
        }
        self.t = firing_time;
        network.apply_deltas(fired, state);

        for &dep in network.dependencies(fired) {
            let a_old = propensities.get(dep);
            let a_new = reaction_propensity(&network.reactions()[dep], state);
            propensities.set(dep, a_new);

            let key = if dep == fired {
                self.t + exponential(rng, a_new)
            } else if a_new > 0.0 && a_old > 0.0 {
                Self::rescale(self.t, a_old, a_new, self.queue.key(dep))
            } else if a_new > 0.0 {
                // propensity just became nonzero from zero
                self.t + exponential(rng, a_new)
            } else {
                f64::INFINITY
            };
            self.queue.update(dep, key);
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
