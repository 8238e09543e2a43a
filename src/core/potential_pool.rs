//! The `PotentialPool` stores the proximal synapses of every Spatial Pooler column.
//!
//! Each column owns a fixed set of potential inputs chosen at initialisation. The pool keeps
//! all of them in one flat vec: a column's synapses occupy a contiguous block of
//! `max_per_column` slots, of which the first `len` are used. After every permanence change
//! the block is partitioned so connected synapses (permanence ≥ connected threshold) come
//! first, which makes "connected inputs of column c" a plain sub-slice.

use rand::Rng;
use std::ops::Range;

/// A proximal synapse from a column to one input bit.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ProximalSynapse {
    /// Input bit this synapse samples.
    pub input: usize,

    /// Connection strength in `[min, max]`.
    pub permanence: f32,
}

/// How proximal permanences are initialised, adjusted and trimmed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PermanenceRules {
    pub inactive_decrement: f32,
    pub active_increment: f32,
    pub connected: f32,
    pub below_stimulus_increment: f32,
    pub min: f32,
    pub max: f32,
    /// Permanences below this are snapped to zero.
    pub trim_threshold: f32,
}

/// Flat per-column store of proximal synapses.
#[derive(Debug, Clone)]
pub struct PotentialPool {
    synapses: Vec<ProximalSynapse>,
    len_per_column: Vec<usize>,
    connected_per_column: Vec<usize>,
    max_per_column: usize,
}

impl PotentialPool {
    /// Creates an empty pool for `num_columns` columns of at most `max_per_column` synapses.
    pub fn new(num_columns: usize, max_per_column: usize) -> Self {
        Self {
            synapses: vec![ProximalSynapse::default(); num_columns * max_per_column],
            len_per_column: vec![0; num_columns],
            connected_per_column: vec![0; num_columns],
            max_per_column,
        }
    }

    /// Fills a column from its potential inputs with random initial permanences.
    ///
    /// Each synapse starts connected with probability `init_connected_pct`, uniformly in
    /// `[connected, max]`, otherwise uniformly in `[0, connected)`. Values are rounded to five
    /// decimals and anything not above the trim threshold starts at zero.
    pub fn init_column<R: Rng>(
        &mut self,
        column: usize,
        inputs: &[usize],
        init_connected_pct: f32,
        rules: &PermanenceRules,
        rng: &mut R,
    ) {
        debug_assert!(inputs.len() <= self.max_per_column);
        let start = column * self.max_per_column;

        for (slot, &input) in self.synapses[start..start + inputs.len()]
            .iter_mut()
            .zip(inputs)
        {
            let raw = if rng.random::<f32>() <= init_connected_pct {
                rules.connected + (rules.max - rules.connected) * rng.random::<f32>()
            } else {
                rules.connected * rng.random::<f32>()
            };

            let permanence = if raw > rules.trim_threshold {
                (raw * 100_000.0).round() / 100_000.0
            } else {
                0.0
            };

            *slot = ProximalSynapse { input, permanence };
        }

        self.len_per_column[column] = inputs.len();
        self.partition_connected(column, rules.connected);
    }

    /// Moves connected synapses to the front of the column's block and records their count.
    pub fn partition_connected(&mut self, column: usize, connected: f32) {
        let range = self.range(column);
        let block = &mut self.synapses[range];

        let mut pivot = 0;
        for i in 0..block.len() {
            if block[i].permanence >= connected {
                block.swap(i, pivot);
                pivot += 1;
            }
        }

        self.connected_per_column[column] = pivot;
    }

    /// Normalises a column after its permanences were changed:
    /// - optionally raises permanences until `stimulus_threshold` synapses are connected,
    /// - trims small values to zero and clamps to `[min, max]`,
    /// - re-partitions connected synapses to the front.
    pub fn update_column(
        &mut self,
        column: usize,
        raise: bool,
        stimulus_threshold: usize,
        rules: &PermanenceRules,
    ) {
        if raise {
            self.raise_to_threshold(column, stimulus_threshold, rules);
        }

        for syn in self.column_mut(column) {
            syn.permanence = if syn.permanence < rules.trim_threshold {
                0.0
            } else {
                syn.permanence.clamp(rules.min, rules.max)
            };
        }

        self.partition_connected(column, rules.connected);
    }

    /// Bumps every synapse of the column by `below_stimulus_increment` until at least
    /// `stimulus_threshold` of them are connected. A column with fewer potential synapses than
    /// the threshold stops once all of them are connected.
    pub fn raise_to_threshold(
        &mut self,
        column: usize,
        stimulus_threshold: usize,
        rules: &PermanenceRules,
    ) {
        let block = self.column_mut(column);
        let target = stimulus_threshold.min(block.len());
        if rules.below_stimulus_increment <= 0.0 {
            return;
        }

        for syn in block.iter_mut() {
            syn.permanence = syn.permanence.clamp(rules.min, rules.max);
        }

        while block
            .iter()
            .filter(|syn| syn.permanence >= rules.connected)
            .count()
            < target
        {
            for syn in block.iter_mut() {
                syn.permanence += rules.below_stimulus_increment;
            }
        }
    }

    fn range(&self, column: usize) -> Range<usize> {
        let start = column * self.max_per_column;
        start..start + self.len_per_column[column]
    }

    /// All potential synapses of a column.
    pub fn column(&self, column: usize) -> &[ProximalSynapse] {
        &self.synapses[self.range(column)]
    }

    /// All potential synapses of a column, mutable. Call `update_column` afterwards.
    pub fn column_mut(&mut self, column: usize) -> &mut [ProximalSynapse] {
        let range = self.range(column);
        &mut self.synapses[range]
    }

    /// The connected prefix of a column's block.
    pub fn connected(&self, column: usize) -> &[ProximalSynapse] {
        let start = column * self.max_per_column;
        &self.synapses[start..start + self.connected_per_column[column]]
    }

    /// Input indices of the connected synapses of a column.
    pub fn connected_inputs(&self, column: usize) -> Vec<usize> {
        self.connected(column).iter().map(|syn| syn.input).collect()
    }

    /// Number of connected synapses of a column.
    #[inline]
    pub fn connected_count(&self, column: usize) -> usize {
        self.connected_per_column[column]
    }
}
