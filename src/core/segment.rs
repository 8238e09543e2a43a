//! Distal dendrite segments and their synapses.
//!
//! A `Segment` belongs to exactly one cell and holds an ordered list of synapses onto other
//! cells. Besides the synapses it carries usage statistics: how often it became active, how
//! often that activity was confirmed, and a duty cycle estimated with a tiered moving average.
//!
//! Segments never reach back into the engine that owns them. Everything they need from the
//! outside (permanence ceiling, current learning iteration) is passed in by the caller.
//!
//! Learning proposals are represented by `SegmentUpdate`s. They are dated and queued per cell
//! in `PendingUpdates` until their cell becomes a winner, then committed by the learning
//! phase; proposals older than the validity window are dropped instead of applied.

use crate::error::{HtmError, Result};

/// Flat cell identifier: `column * cells_per_column + index_in_column`.
pub type CellId = usize;

/// Identifier of a segment inside a `Connections` store.
pub type SegmentId = usize;

/// Iteration thresholds and the moving-average rate used once the learning iteration passes
/// them. Below the first non-zero threshold the duty cycle is the exact running average.
pub const DUTY_CYCLE_TIERS: [(u64, f32); 9] = [
    (0, 0.0),
    (100, 0.0032),
    (320, 0.0010),
    (1_000, 0.00032),
    (3_200, 0.00010),
    (10_000, 0.000032),
    (32_000, 0.00001),
    (100_000, 0.0000032),
    (320_000, 0.0000010),
];

/// A synapse from a presynaptic (source) cell onto a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Synapse {
    pub source: CellId,
    pub permanence: f32,
}

/// A dendrite segment: synapses plus activity bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    cell: CellId,
    synapses: Vec<Synapse>,
    is_sequence: bool,
    positive_activations: u64,
    total_activations: u64,
    last_active_iteration: u64,
    last_pos_duty_cycle: f32,
    last_pos_duty_cycle_iteration: u64,
}

impl Segment {
    /// Creates an empty segment on `cell`.
    pub fn new(cell: CellId, is_sequence: bool) -> Self {
        Self {
            cell,
            synapses: Vec::new(),
            is_sequence,
            positive_activations: 0,
            total_activations: 0,
            last_active_iteration: 0,
            last_pos_duty_cycle: 0.0,
            last_pos_duty_cycle_iteration: 0,
        }
    }

    #[inline]
    pub fn cell(&self) -> CellId {
        self.cell
    }

    #[inline]
    pub fn synapses(&self) -> &[Synapse] {
        &self.synapses
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.synapses.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.synapses.is_empty()
    }

    /// Whether the segment predicts activity on the very next step.
    #[inline]
    pub fn is_sequence(&self) -> bool {
        self.is_sequence
    }

    #[inline]
    pub fn positive_activations(&self) -> u64 {
        self.positive_activations
    }

    #[inline]
    pub fn total_activations(&self) -> u64 {
        self.total_activations
    }

    #[inline]
    pub fn last_active_iteration(&self) -> u64 {
        self.last_active_iteration
    }

    /// Appends a synapse and returns its index on the segment.
    pub fn add_synapse(&mut self, source: CellId, permanence: f32) -> usize {
        self.synapses.push(Synapse { source, permanence });
        self.synapses.len() - 1
    }

    /// Index of the synapse from `source`, if any.
    pub fn synapse_for_source(&self, source: CellId) -> Option<usize> {
        self.synapses.iter().position(|syn| syn.source == source)
    }

    /// Removes the synapse at `index`, keeping the order of the rest.
    pub fn remove_synapse(&mut self, index: usize) -> Option<Synapse> {
        (index < self.synapses.len()).then(|| self.synapses.remove(index))
    }

    pub(crate) fn synapse_mut(&mut self, index: usize) -> Option<&mut Synapse> {
        self.synapses.get_mut(index)
    }

    /// Adds `delta` to the permanence of every synapse in `indices`, clamping to
    /// `[0, perm_max]`. Returns true if any of them ended up at exactly zero; those synapses
    /// are left in place for the caller to evict.
    pub fn update_synapses(&mut self, indices: &[usize], delta: f32, perm_max: f32) -> bool {
        let mut hit_zero = false;
        for &index in indices {
            if let Some(syn) = self.synapses.get_mut(index) {
                syn.permanence = (syn.permanence + delta).clamp(0.0, perm_max);
                hit_zero |= syn.permanence == 0.0;
            }
        }
        hit_zero
    }

    /// Removes every synapse whose permanence is zero, keeping the order of the rest.
    /// Returns the sources of the removed synapses.
    pub fn remove_zero_permanence(&mut self) -> Vec<CellId> {
        let mut removed = Vec::new();
        self.synapses.retain(|syn| {
            if syn.permanence == 0.0 {
                removed.push(syn.source);
                false
            } else {
                true
            }
        });
        removed
    }

    /// Evicts the `n` weakest synapses. Synapses listed in `inactive_indices` are sacrificed
    /// first (lowest permanence first); only if there are fewer than `n` of them do the
    /// remaining synapses follow, again lowest permanence first. Returns the evicted sources.
    pub fn free_n_synapses(&mut self, n: usize, inactive_indices: &[usize]) -> Vec<CellId> {
        let n = n.min(self.synapses.len());
        if n == 0 {
            return Vec::new();
        }

        let by_permanence = |a: &usize, b: &usize| {
            self.synapses[*a]
                .permanence
                .total_cmp(&self.synapses[*b].permanence)
                .then(a.cmp(b))
        };

        let mut inactive: Vec<usize> = inactive_indices
            .iter()
            .copied()
            .filter(|&i| i < self.synapses.len())
            .collect();
        inactive.sort_unstable();
        inactive.dedup();

        let mut victims = inactive.clone();
        victims.sort_by(by_permanence);

        if victims.len() < n {
            let mut active: Vec<usize> = (0..self.synapses.len())
                .filter(|i| inactive.binary_search(i).is_err())
                .collect();
            active.sort_by(by_permanence);
            victims.extend(active);
        }
        victims.truncate(n);
        victims.sort_unstable_by(|a, b| b.cmp(a));

        victims
            .into_iter()
            .map(|index| self.synapses.remove(index).source)
            .collect()
    }

    /// Counts one more activation of the segment.
    pub fn record_activation(&mut self, iteration: u64) {
        self.total_activations += 1;
        self.last_active_iteration = iteration;
    }

    /// Counts a confirmed (positive) activation and folds it into the duty cycle.
    pub fn record_positive_activation(&mut self, iteration: u64) {
        self.positive_activations += 1;
        self.duty_cycle(true, false, iteration);
    }

    /// Duty cycle of the segment at learning iteration `iteration`.
    ///
    /// Up to the first tier threshold this is `positive_activations / iteration`. Past it,
    /// the cached value decays as `(1 - α)^age` where `age` is the number of iterations since
    /// the cache was written, and `α` is added when `active`. With `read_only` the cache is
    /// left untouched.
    pub fn duty_cycle(&mut self, active: bool, read_only: bool, iteration: u64) -> f32 {
        let value = self.peek_duty_cycle(active, iteration);
        if !read_only {
            self.last_pos_duty_cycle = value;
            self.last_pos_duty_cycle_iteration = iteration;
        }
        value
    }

    /// Side-effect free form of `duty_cycle`.
    pub fn peek_duty_cycle(&self, active: bool, iteration: u64) -> f32 {
        if iteration <= DUTY_CYCLE_TIERS[1].0 {
            if iteration == 0 {
                return 0.0;
            }
            return self.positive_activations as f32 / iteration as f32;
        }

        let age = iteration.saturating_sub(self.last_pos_duty_cycle_iteration);
        if age == 0 && !active {
            return self.last_pos_duty_cycle;
        }

        let alpha = DUTY_CYCLE_TIERS
            .iter()
            .rev()
            .find(|&&(threshold, _)| iteration > threshold)
            .map_or(0.0, |&(_, alpha)| alpha);

        let decay = (1.0 - alpha).powi(age.min(i32::MAX as u64) as i32);
        let mut value = decay * self.last_pos_duty_cycle;
        if active {
            value += alpha;
        }
        value
    }
}

/// A learning proposal for one segment.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentUpdate {
    /// Raise synapses whose source is in `active_sources`, lower all others.
    Reinforce {
        segment: SegmentId,
        active_sources: Vec<CellId>,
    },
    /// Grow new synapses from `sources` at the initial permanence.
    Grow {
        segment: SegmentId,
        sources: Vec<CellId>,
    },
}

impl SegmentUpdate {
    pub fn segment(&self) -> SegmentId {
        match self {
            SegmentUpdate::Reinforce { segment, .. } | SegmentUpdate::Grow { segment, .. } => {
                *segment
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct DatedUpdate {
    created_at: u64,
    update: SegmentUpdate,
}

/// Per-cell queues of dated segment updates, indexed by flat cell id.
#[derive(Debug, Clone)]
pub struct PendingUpdates {
    per_cell: Vec<Vec<DatedUpdate>>,
    /// Cells with a non-empty queue, in first-push order.
    queued: Vec<CellId>,
}

impl PendingUpdates {
    pub fn new(num_cells: usize) -> Self {
        Self {
            per_cell: vec![Vec::new(); num_cells],
            queued: Vec::new(),
        }
    }

    /// Queues `update` for `cell`, dated `created_at`.
    pub fn push(&mut self, cell: CellId, created_at: u64, update: SegmentUpdate) -> Result<()> {
        let size = self.per_cell.len();
        let queue = self
            .per_cell
            .get_mut(cell)
            .ok_or(HtmError::out_of_range("cell", cell, size))?;
        if queue.is_empty() {
            self.queued.push(cell);
        }
        queue.push(DatedUpdate { created_at, update });
        Ok(())
    }

    /// Number of queued updates across all cells.
    pub fn len(&self) -> usize {
        self.queued.iter().map(|&cell| self.per_cell[cell].len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// Updates queued for one cell, oldest first.
    pub fn for_cell(&self, cell: CellId) -> impl Iterator<Item = &SegmentUpdate> {
        self.per_cell
            .get(cell)
            .into_iter()
            .flatten()
            .map(|dated| &dated.update)
    }

    /// Drains the queues of the cells for which `ready` holds. Updates created more than
    /// `valid_for` iterations before `now` are discarded from every queue first; the rest of
    /// the drained updates are returned grouped by cell in ascending cell order, each cell's
    /// updates in the order they were queued. Queues of cells that are not ready stay put.
    pub fn take_valid(
        &mut self,
        now: u64,
        valid_for: u64,
        mut ready: impl FnMut(CellId) -> bool,
    ) -> Vec<(CellId, SegmentUpdate)> {
        self.discard_stale(now, valid_for);

        let mut cells = Vec::new();
        self.queued.retain(|&cell| {
            if ready(cell) {
                cells.push(cell);
                false
            } else {
                true
            }
        });
        cells.sort_unstable();

        let mut valid = Vec::new();
        for cell in cells {
            valid.extend(self.per_cell[cell].drain(..).map(|dated| (cell, dated.update)));
        }
        valid
    }

    /// Drops updates older than the validity window without committing anything.
    pub fn discard_stale(&mut self, now: u64, valid_for: u64) {
        let per_cell = &mut self.per_cell;
        self.queued.retain(|&cell| {
            per_cell[cell].retain(|dated| now.saturating_sub(dated.created_at) <= valid_for);
            !per_cell[cell].is_empty()
        });
    }

    pub fn clear(&mut self) {
        for cell in self.queued.drain(..) {
            self.per_cell[cell].clear();
        }
    }
}
