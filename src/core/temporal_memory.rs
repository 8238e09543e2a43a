//! The `TemporalMemory` module learns and predicts sequences of column activations.
//!
//! It models a set of columns, where each column contains multiple cells. Each cell can form
//! multiple dendritic segments, which in turn consist of synapses onto other cells.
//!
//! Column:
//! - A group of cells that share the same feed-forward input (one Spatial Pooler column).
//!
//! Cell:
//! - An individual unit within a column. Different cells of one column represent the same
//!   input in different temporal contexts.
//!
//! Dendritic Segment:
//! - A cluster of synapses on a cell that detects a pattern of activity among other cells.
//! - A segment with enough connected synapses onto currently active cells is active and
//!   makes its cell predictive for the next step.
//!
//! Bursting:
//! - When a column becomes active but none of its cells was predicted, all of its cells
//!   activate. One of them is chosen as the winner that learns the new transition.
//!
//! How It Works, once per time step:
//! 1. Previously predictive cells in active columns become active and winners.
//! 2. Active columns without such a cell burst; each picks a winner cell, preferably the one
//!    owning the best-matching segment, otherwise the least used cell.
//! 3. When learning, segments chosen to learn are reinforced towards the previous active
//!    cells and grow synapses to the previous winner cells. Reinforcements queued for cells
//!    that have now become winners are committed, unless they have expired.
//! 4. Active cells are propagated through the synapses they source; segments reaching the
//!    activation threshold mark their cells predictive. When learning, each active segment
//!    queues a reinforcement towards the current active cells, to be committed once its cell
//!    wins.

use super::{
    binary_matrix::{BinaryMatrix, SparseBinaryMatrix},
    connections::Connections,
    segment::{CellId, PendingUpdates, SegmentId, SegmentUpdate},
    topology::Topology,
};
use crate::error::{HtmError, Result};
use fxhash::FxHashMap;
use log::{debug, trace};
use rand::{prelude::*, rngs::StdRng};
use serde::{Deserialize, Serialize};

/// Holds the parameters of the Temporal Memory. Missing fields take their defaults when
/// deserialised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalMemoryParams {
    /// Shape of the column space; must match the Spatial Pooler feeding it.
    pub column_dimensions: Vec<usize>,
    /// Cells in every column.
    pub cells_per_column: usize,
    /// Connected active synapses a segment needs to become active.
    pub activation_threshold: usize,
    /// Potential active synapses a segment needs to count as matching while bursting.
    pub min_threshold: usize,
    /// New synapses may only come from winner cells within this many columns.
    pub learning_radius: usize,
    /// Permanence of a newly grown synapse.
    pub initial_permanence: f32,
    /// Permanence at or above which a synapse is connected.
    pub connected_permanence: f32,
    /// Synapses a learning segment grows per step, less those already active.
    pub max_new_synapse_count: usize,
    /// Permanence increment for synapses onto active cells when a segment is reinforced.
    pub permanence_increment: f32,
    /// Permanence decrement for the remaining synapses of a reinforced segment.
    pub permanence_decrement: f32,
    /// Upper bound on synapses per segment; growth past it evicts the weakest first.
    pub max_synapses_per_segment: Option<usize>,
    /// Learning iterations a queued segment update stays valid. An update whose cell has not
    /// won within that many learning steps is dropped.
    pub segment_update_valid_duration: u64,
    /// Seed of the generator behind cell tie-breaks and synapse growth order.
    pub seed: u64,
}

impl Default for TemporalMemoryParams {
    fn default() -> Self {
        Self {
            column_dimensions: vec![2048],
            cells_per_column: 32,
            activation_threshold: 13,
            min_threshold: 10,
            learning_radius: 2048,
            initial_permanence: 0.21,
            connected_permanence: 0.5,
            max_new_synapse_count: 20,
            permanence_increment: 0.10,
            permanence_decrement: 0.10,
            max_synapses_per_segment: None,
            segment_update_valid_duration: 5,
            seed: 42,
        }
    }
}

impl TemporalMemoryParams {
    pub fn validate(&self) -> Result<()> {
        Topology::new(&self.column_dimensions)?;
        if self.cells_per_column == 0 {
            return Err(HtmError::invalid("cells_per_column", "must be at least 1"));
        }
        if self.activation_threshold == 0 {
            return Err(HtmError::invalid("activation_threshold", "must be positive"));
        }
        if self.min_threshold == 0 {
            return Err(HtmError::invalid("min_threshold", "must be positive"));
        }
        if self.max_new_synapse_count == 0 {
            return Err(HtmError::invalid("max_new_synapse_count", "must be positive"));
        }
        if self.max_synapses_per_segment == Some(0) {
            return Err(HtmError::invalid("max_synapses_per_segment", "must be positive"));
        }
        for (name, value) in [
            ("initial_permanence", self.initial_permanence),
            ("connected_permanence", self.connected_permanence),
            ("permanence_increment", self.permanence_increment),
            ("permanence_decrement", self.permanence_decrement),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(HtmError::invalid(name, format!("{value} is outside [0, 1]")));
            }
        }
        Ok(())
    }
}

/// Sequence learning over columns of cells with distal segments.
///
/// Cell state (active, winner, predictive) is kept in sparse matrices with one row per
/// column and one bit per cell. Randomness (least-used-cell ties, order of new synapses)
/// comes from a generator seeded from the parameters, so runs are reproducible. `Clone`
/// yields a fully independent snapshot.
#[derive(Debug, Clone)]
pub struct TemporalMemory {
    params: TemporalMemoryParams,

    /// Shape of the column space, for learning radius distances.
    column_topology: Topology,

    /// Every segment and synapse of the memory.
    connections: Connections,

    /// Cells active in the last step.
    active: SparseBinaryMatrix,

    /// Cells chosen to represent the last step's input.
    winner: SparseBinaryMatrix,

    /// Cells predicted to become active in the next step.
    predictive: SparseBinaryMatrix,

    /// Segments that became active in the last step, ascending.
    active_segments: Vec<SegmentId>,

    /// Potential active synapse count per segment, from the last step's active cells.
    segment_potential: FxHashMap<SegmentId, usize>,

    /// Queued reinforcements and growth, committed once their cell wins.
    pending: PendingUpdates,

    // Compute calls so far, and those with learning enabled.
    iteration_num: u64,
    learn_iteration: u64,

    rand: StdRng,
}

impl TemporalMemory {
    pub fn new(params: TemporalMemoryParams) -> Result<Self> {
        params.validate()?;

        let column_topology = Topology::new(&params.column_dimensions)?;
        let num_columns = column_topology.len();
        let cpc = params.cells_per_column;
        let connections = Connections::new(num_columns, cpc)?;

        debug!(
            "temporal memory: {} columns × {} cells, activation {}, min {}",
            num_columns, cpc, params.activation_threshold, params.min_threshold
        );

        Ok(Self {
            column_topology,
            active: SparseBinaryMatrix::new(cpc, num_columns)?,
            winner: SparseBinaryMatrix::new(cpc, num_columns)?,
            predictive: SparseBinaryMatrix::new(cpc, num_columns)?,
            active_segments: Vec::new(),
            segment_potential: FxHashMap::default(),
            pending: PendingUpdates::new(connections.num_cells()),
            connections,
            iteration_num: 0,
            learn_iteration: 0,
            rand: StdRng::seed_from_u64(params.seed),
            params,
        })
    }

    /// Executes one time step for the given active columns (strictly increasing).
    pub fn compute(&mut self, active_columns: &[usize], learn: bool) -> Result<()> {
        self.check_active_columns(active_columns)?;

        self.iteration_num += 1;
        if learn {
            self.learn_iteration += 1;
        }

        let prev_active_cells = self.active_cells();
        let prev_winner_cells = self.winner_cells();
        let fresh = self.empty_state()?;
        let prev_predictive = std::mem::replace(&mut self.predictive, fresh);
        self.active.clear();
        self.winner.clear();

        let mut learning_segments = Vec::new();
        let mut bursting = 0usize;
        for &column in active_columns {
            let predicted = prev_predictive.row_indices(column);
            if predicted.is_empty() {
                bursting += 1;
                if let Some(segment) = self.burst_column(column, &prev_winner_cells, learn)? {
                    learning_segments.push(segment);
                }
            } else {
                self.activate_predicted_column(column, &predicted, learn)?;
            }
        }

        if learn {
            self.learn_on_segments(&learning_segments, &prev_active_cells, &prev_winner_cells)?;
        } else {
            self.pending.clear();
        }

        self.activate_segments(learn)?;

        trace!(
            "temporal memory iteration {}: {} columns ({} bursting), {} active cells, {} predictive",
            self.iteration_num,
            active_columns.len(),
            bursting,
            self.active.count(),
            self.predictive.count()
        );
        Ok(())
    }

    fn check_active_columns(&self, active_columns: &[usize]) -> Result<()> {
        if active_columns.windows(2).any(|w| w[0] >= w[1]) {
            return Err(HtmError::UnsortedColumns);
        }
        let num_columns = self.num_columns();
        match active_columns.last() {
            Some(&last) if last >= num_columns => {
                Err(HtmError::out_of_range("column", last, num_columns))
            }
            _ => Ok(()),
        }
    }

    fn empty_state(&self) -> Result<SparseBinaryMatrix> {
        SparseBinaryMatrix::new(self.params.cells_per_column, self.num_columns())
    }

    /// Phase 1: predicted cells of an active column become active and winners. When
    /// learning, the segments that predicted them are credited.
    fn activate_predicted_column(
        &mut self,
        column: usize,
        predicted: &[usize],
        learn: bool,
    ) -> Result<()> {
        for &index in predicted {
            self.active.set(column, index, true);
            self.winner.set(column, index, true);

            if !learn {
                continue;
            }
            let cell = self.connections.cell(column, index)?;
            let confirmed: Vec<SegmentId> = self
                .connections
                .segments_for_cell(cell)?
                .iter()
                .copied()
                .filter(|seg| self.active_segments.binary_search(seg).is_ok())
                .collect();
            for segment in confirmed {
                self.connections
                    .segment_mut(segment)?
                    .record_positive_activation(self.learn_iteration);
            }
        }
        Ok(())
    }

    /// Phase 2: activates every cell of a column nobody predicted and picks its winner.
    /// Returns the segment chosen to learn, if any.
    fn burst_column(
        &mut self,
        column: usize,
        prev_winner_cells: &[CellId],
        learn: bool,
    ) -> Result<Option<SegmentId>> {
        let cells = self.connections.cells_for_column(column)?;
        for index in 0..cells.len() {
            self.active.set(column, index, true);
        }

        let (winner, segment) = match self.best_matching_segment(column)? {
            Some((cell, segment)) => (cell, Some(segment)),
            None => {
                let cell = self.least_used_cell(column)?;
                let segment = if learn && !prev_winner_cells.is_empty() {
                    Some(self.connections.create_segment(cell)?)
                } else {
                    None
                };
                (cell, segment)
            }
        };

        self.winner.set(column, winner - cells.start, true);
        Ok(segment)
    }

    /// The segment of the column with the most potential synapses onto the previous active
    /// cells, provided it reaches `min_threshold`. The first segment found wins a tie.
    fn best_matching_segment(&self, column: usize) -> Result<Option<(CellId, SegmentId)>> {
        let mut best: Option<(CellId, SegmentId)> = None;
        let mut best_score = self.params.min_threshold.saturating_sub(1);

        for cell in self.connections.cells_for_column(column)? {
            for &segment in self.connections.segments_for_cell(cell)? {
                let score = self.segment_potential.get(&segment).copied().unwrap_or(0);
                if score > best_score {
                    best_score = score;
                    best = Some((cell, segment));
                }
            }
        }
        Ok(best)
    }

    /// Identifies the cell with the fewest segments within a column. If several cells share
    /// the minimum, one of them is chosen at random.
    fn least_used_cell(&mut self, column: usize) -> Result<CellId> {
        let mut min_segments = usize::MAX;
        let mut min_cells = Vec::new();

        for cell in self.connections.cells_for_column(column)? {
            let count = self.connections.segments_for_cell(cell)?.len();
            if count < min_segments {
                min_segments = count;
                min_cells.clear();
                min_cells.push(cell);
            } else if count == min_segments {
                min_cells.push(cell);
            }
        }

        let pick = if min_cells.len() > 1 {
            self.rand.random_range(0..min_cells.len())
        } else {
            0
        };
        Ok(min_cells[pick])
    }

    /// Phase 3: queues reinforcement and growth for the learning segments, then commits
    /// the queued updates of every winner cell that are still inside the validity window.
    /// Updates of other cells stay queued until their cell wins or they expire.
    fn learn_on_segments(
        &mut self,
        learning_segments: &[SegmentId],
        prev_active_cells: &[CellId],
        prev_winner_cells: &[CellId],
    ) -> Result<()> {
        let mut learning = learning_segments.to_vec();
        learning.sort_unstable();
        learning.dedup();

        for segment in learning {
            let cell = self.connections.cell_for_segment(segment)?;
            let active_sources = self.active_sources(segment, prev_active_cells)?;
            let wanted = self
                .params
                .max_new_synapse_count
                .saturating_sub(active_sources.len());
            self.pending.push(
                cell,
                self.learn_iteration,
                SegmentUpdate::Reinforce {
                    segment,
                    active_sources,
                },
            )?;

            let sources = self.pick_cells_to_learn_on(wanted, segment, prev_winner_cells)?;
            if !sources.is_empty() {
                self.pending.push(
                    cell,
                    self.learn_iteration,
                    SegmentUpdate::Grow { segment, sources },
                )?;
            }
        }

        let cpc = self.params.cells_per_column;
        let winner = &self.winner;
        let updates = self.pending.take_valid(
            self.learn_iteration,
            self.params.segment_update_valid_duration,
            |cell| winner.get(cell / cpc, cell % cpc),
        );
        for (_, update) in updates {
            self.apply_update(update, prev_active_cells)?;
        }
        Ok(())
    }

    /// Sources of the segment's synapses that are among `active_cells` (sorted).
    fn active_sources(&self, segment: SegmentId, active_cells: &[CellId]) -> Result<Vec<CellId>> {
        Ok(self
            .connections
            .segment(segment)?
            .synapses()
            .iter()
            .map(|syn| syn.source)
            .filter(|source| active_cells.binary_search(source).is_ok())
            .collect())
    }

    fn apply_update(&mut self, update: SegmentUpdate, prev_active_cells: &[CellId]) -> Result<()> {
        match update {
            SegmentUpdate::Reinforce {
                segment,
                mut active_sources,
            } => {
                active_sources.sort_unstable();
                self.connections.adapt_segment(
                    segment,
                    |source| active_sources.binary_search(&source).is_ok(),
                    self.params.permanence_increment,
                    self.params.permanence_decrement,
                    1.0,
                )
            }
            SegmentUpdate::Grow { segment, sources } => {
                self.grow_synapses(segment, sources, prev_active_cells)
            }
        }
    }

    /// Adds synapses from `sources` at the initial permanence. With a synapse cap, room is
    /// made first by evicting the weakest synapses, inactive ones before active ones.
    fn grow_synapses(
        &mut self,
        segment: SegmentId,
        mut sources: Vec<CellId>,
        prev_active_cells: &[CellId],
    ) -> Result<()> {
        if let Some(max) = self.params.max_synapses_per_segment {
            sources.truncate(max);
            let existing = self.connections.segment(segment)?;
            let overflow = (existing.len() + sources.len()).saturating_sub(max);
            if overflow > 0 {
                let inactive: Vec<usize> = existing
                    .synapses()
                    .iter()
                    .enumerate()
                    .filter(|(_, syn)| prev_active_cells.binary_search(&syn.source).is_err())
                    .map(|(index, _)| index)
                    .collect();
                self.connections.free_synapses(segment, overflow, &inactive)?;
            }
        }

        for source in sources {
            self.connections
                .create_synapse(segment, source, self.params.initial_permanence)?;
        }
        Ok(())
    }

    /// Phase 4: segments with enough connected synapses onto the current active cells
    /// become active and make their cells predictive. When learning, every active segment
    /// queues a reinforcement towards the current active cells.
    fn activate_segments(&mut self, learn: bool) -> Result<()> {
        let active_cells = self.active_cells();
        let activity = self
            .connections
            .compute_activity(&active_cells, self.params.connected_permanence)?;

        let threshold = self.params.activation_threshold;
        let mut active_segments: Vec<SegmentId> = activity
            .connected
            .iter()
            .filter(|&(_, &count)| count >= threshold)
            .map(|(&segment, _)| segment)
            .collect();
        active_segments.sort_unstable();

        let cpc = self.params.cells_per_column;
        for &segment in &active_segments {
            let cell = self.connections.cell_for_segment(segment)?;
            self.predictive.set(cell / cpc, cell % cpc, true);
            if learn {
                self.connections
                    .segment_mut(segment)?
                    .record_activation(self.learn_iteration);
                let active_sources = self.active_sources(segment, &active_cells)?;
                self.pending.push(
                    cell,
                    self.learn_iteration,
                    SegmentUpdate::Reinforce {
                        segment,
                        active_sources,
                    },
                )?;
            }
        }

        self.active_segments = active_segments;
        self.segment_potential = activity.potential;
        Ok(())
    }

    /// Picks up to `n` cells from `winner_cells` to grow synapses from onto `segment`.
    ///
    /// Cells already synapsed onto the segment and cells farther than `learning_radius`
    /// columns from the segment's column are skipped. The result holds no duplicates, has
    /// `min(n, candidates)` entries, and is in random order.
    pub fn pick_cells_to_learn_on(
        &mut self,
        n: usize,
        segment: SegmentId,
        winner_cells: &[CellId],
    ) -> Result<Vec<CellId>> {
        let seg = self.connections.segment(segment)?;
        let home = self
            .column_topology
            .coordinates(self.connections.column_for_cell(seg.cell())?);

        let mut candidates = Vec::with_capacity(winner_cells.len());
        for &cell in winner_cells {
            let column = self.connections.column_for_cell(cell)?;
            if seg.synapse_for_source(cell).is_some() {
                continue;
            }
            let distance = self
                .column_topology
                .coordinates(column)
                .iter()
                .zip(&home)
                .map(|(&a, &b)| a.abs_diff(b))
                .max()
                .unwrap_or(0);
            if distance <= self.params.learning_radius {
                candidates.push(cell);
            }
        }
        candidates.sort_unstable();
        candidates.dedup();

        candidates.shuffle(&mut self.rand);
        candidates.truncate(n);
        Ok(candidates)
    }

    /// Clears all cell and segment activity at a sequence boundary. Learned synapses stay.
    pub fn reset(&mut self) {
        self.active.clear();
        self.winner.clear();
        self.predictive.clear();
        self.active_segments.clear();
        self.segment_potential.clear();
        self.pending.clear();
        debug!("temporal memory reset at iteration {}", self.iteration_num);
    }

    /// Predicted column sets for the next `steps` steps: the current prediction first, then
    /// what a snapshot predicts when fed its own predictions with learning off. Stops early
    /// once nothing is predicted. `self` is not modified.
    pub fn predict_ahead(&self, steps: usize) -> Result<Vec<Vec<usize>>> {
        let mut snapshot = self.clone();
        let mut predictions = Vec::with_capacity(steps);
        for _ in 0..steps {
            let columns = snapshot.predicted_columns();
            if columns.is_empty() {
                break;
            }
            snapshot.compute(&columns, false)?;
            predictions.push(columns);
        }
        Ok(predictions)
    }

    fn flat_cells(&self, state: &SparseBinaryMatrix) -> Vec<CellId> {
        let cpc = self.params.cells_per_column;
        state
            .entries()
            .into_iter()
            .map(|(column, index)| column * cpc + index)
            .collect()
    }

    /// Active cells of the last step, ascending flat ids.
    pub fn active_cells(&self) -> Vec<CellId> {
        self.flat_cells(&self.active)
    }

    /// Winner cells of the last step, ascending flat ids.
    pub fn winner_cells(&self) -> Vec<CellId> {
        self.flat_cells(&self.winner)
    }

    /// Cells predicted for the next step, ascending flat ids.
    pub fn predictive_cells(&self) -> Vec<CellId> {
        self.flat_cells(&self.predictive)
    }

    /// Columns holding at least one predictive cell, ascending.
    pub fn predicted_columns(&self) -> Vec<usize> {
        self.predictive.non_zero_rows()
    }

    pub fn active_segments(&self) -> &[SegmentId] {
        &self.active_segments
    }

    /// Current duty cycle of a segment, without touching its cache.
    pub fn segment_duty_cycle(&self, segment: SegmentId) -> Result<f32> {
        Ok(self
            .connections
            .segment(segment)?
            .peek_duty_cycle(false, self.learn_iteration))
    }

    pub fn connections(&self) -> &Connections {
        &self.connections
    }

    pub fn params(&self) -> &TemporalMemoryParams {
        &self.params
    }

    #[inline]
    pub fn num_columns(&self) -> usize {
        self.connections.num_columns()
    }

    #[inline]
    pub fn cells_per_column(&self) -> usize {
        self.params.cells_per_column
    }

    pub fn iteration_num(&self) -> u64 {
        self.iteration_num
    }

    pub fn learn_iteration(&self) -> u64 {
        self.learn_iteration
    }

    pub fn pending_updates(&self) -> &PendingUpdates {
        &self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn params() -> TemporalMemoryParams {
        TemporalMemoryParams {
            column_dimensions: vec![32],
            cells_per_column: 4,
            activation_threshold: 3,
            min_threshold: 2,
            learning_radius: 32,
            max_new_synapse_count: 4,
            ..Default::default()
        }
    }

    #[test]
    fn rejects_malformed_configuration() {
        let mut bad = params();
        bad.cells_per_column = 0;
        assert!(TemporalMemory::new(bad).is_err());

        let mut bad = params();
        bad.column_dimensions = vec![];
        assert!(TemporalMemory::new(bad).is_err());

        let mut bad = params();
        bad.connected_permanence = 1.5;
        assert!(TemporalMemory::new(bad).is_err());
    }

    #[test]
    fn active_columns_must_be_sorted_unique_and_in_range() {
        let mut tm = TemporalMemory::new(params()).unwrap();
        assert_eq!(tm.compute(&[3, 1], true), Err(HtmError::UnsortedColumns));
        assert_eq!(tm.compute(&[1, 1], true), Err(HtmError::UnsortedColumns));
        assert!(matches!(
            tm.compute(&[1, 32], true),
            Err(HtmError::IndexOutOfRange { kind: "column", .. })
        ));
        assert!(tm.compute(&[], true).is_ok());
    }

    #[test]
    fn unpredicted_columns_burst_with_one_winner_each() {
        let mut tm = TemporalMemory::new(params()).unwrap();
        tm.compute(&[0, 5], true).unwrap();
        assert_eq!(tm.active_cells(), vec![0, 1, 2, 3, 20, 21, 22, 23]);
        let winners = tm.winner_cells();
        assert_eq!(winners.len(), 2);
        assert!(winners[0] < 4 && (20..24).contains(&winners[1]));
        assert_eq!(tm.connections().num_segments(), 0);
    }

    #[test]
    fn bursting_grows_segment_towards_previous_winners() {
        let mut tm = TemporalMemory::new(params()).unwrap();
        tm.compute(&[0, 1, 2, 3], true).unwrap();
        let prev_winners = tm.winner_cells();
        tm.compute(&[10], true).unwrap();

        let connections = tm.connections();
        assert_eq!(connections.num_segments(), 1);
        let segment = connections.segment(0).unwrap();
        assert!((40..44).contains(&segment.cell()));
        let mut sources: Vec<CellId> = segment.synapses().iter().map(|s| s.source).collect();
        sources.sort_unstable();
        assert_eq!(sources, prev_winners);
        assert!(segment
            .synapses()
            .iter()
            .all(|s| (s.permanence - 0.21).abs() < 1e-6));
        assert!(tm.pending_updates().is_empty());
    }

    #[test]
    fn no_segments_are_created_without_learning() {
        let mut tm = TemporalMemory::new(params()).unwrap();
        tm.compute(&[0, 1, 2, 3], false).unwrap();
        tm.compute(&[10], false).unwrap();
        assert_eq!(tm.connections().num_segments(), 0);
        assert_eq!(tm.learn_iteration(), 0);
        assert_eq!(tm.iteration_num(), 2);
    }

    #[test]
    fn connected_segment_makes_its_cell_predictive() {
        let mut tm = TemporalMemory::new(params()).unwrap();
        let segment = tm.connections.create_segment(41).unwrap();
        for source in [0, 4, 8] {
            tm.connections.create_synapse(segment, source, 0.6).unwrap();
        }

        tm.compute(&[0, 1, 2], false).unwrap();
        assert_eq!(tm.predictive_cells(), vec![41]);
        assert_eq!(tm.predicted_columns(), vec![10]);
        assert_eq!(tm.active_segments(), &[segment]);

        tm.compute(&[10], false).unwrap();
        assert_eq!(tm.active_cells(), vec![41]);
        assert_eq!(tm.winner_cells(), vec![41]);
    }

    #[test]
    fn predicted_cell_learns_and_is_credited() {
        let mut tm = TemporalMemory::new(params()).unwrap();
        let segment = tm.connections.create_segment(41).unwrap();
        for source in [0, 4, 8] {
            tm.connections.create_synapse(segment, source, 0.6).unwrap();
        }
        tm.connections.create_synapse(segment, 100, 0.6).unwrap();

        tm.compute(&[0, 1, 2], true).unwrap();
        tm.compute(&[10], true).unwrap();

        let seg = tm.connections().segment(segment).unwrap();
        assert_eq!(seg.positive_activations(), 1);
        assert_eq!(seg.total_activations(), 1);
        for syn in seg.synapses() {
            let expected = if syn.source == 100 { 0.5 } else { 0.7 };
            assert!((syn.permanence - expected).abs() < 1e-6);
        }
    }

    fn predicting_segment(tm: &mut TemporalMemory) -> SegmentId {
        let segment = tm.connections.create_segment(41).unwrap();
        for source in [0, 4, 8, 100] {
            tm.connections.create_synapse(segment, source, 0.6).unwrap();
        }
        segment
    }

    /// Predicts cell 41 twice, two learning steps apart, before column 10 arrives.
    fn train_with_gap(valid_for: u64) -> TemporalMemory {
        let mut tm = TemporalMemory::new(TemporalMemoryParams {
            segment_update_valid_duration: valid_for,
            ..params()
        })
        .unwrap();
        predicting_segment(&mut tm);
        tm.compute(&[0, 1, 2], true).unwrap();
        tm.compute(&[20], true).unwrap();
        tm.compute(&[0, 1, 2], true).unwrap();
        tm.compute(&[10], true).unwrap();
        tm
    }

    #[test]
    fn reinforcement_waits_for_its_cell_to_win() {
        let mut tm = TemporalMemory::new(params()).unwrap();
        let segment = predicting_segment(&mut tm);

        tm.compute(&[0, 1, 2], true).unwrap();
        assert_eq!(tm.pending_updates().for_cell(41).count(), 1);
        assert!(tm
            .connections()
            .segment(segment)
            .unwrap()
            .synapses()
            .iter()
            .all(|s| (s.permanence - 0.6).abs() < 1e-6));

        tm.compute(&[10], true).unwrap();
        assert!(tm.pending_updates().for_cell(41).next().is_none());
    }

    #[test]
    fn expired_reinforcement_is_dropped() {
        let assert_permanences = |tm: &TemporalMemory, active: f32, inactive: f32| {
            let segment = tm.connections().segments_for_cell(41).unwrap()[0];
            for syn in tm.connections().segment(segment).unwrap().synapses() {
                let expected = if syn.source == 100 { inactive } else { active };
                assert!((syn.permanence - expected).abs() < 1e-5, "{syn:?}");
            }
        };

        // Both queued reinforcements are still valid when cell 41 wins.
        assert_permanences(&train_with_gap(5), 0.8, 0.4);
        // Only the recent one survives a window of one learning step.
        assert_permanences(&train_with_gap(1), 0.7, 0.5);
    }

    #[test]
    fn inference_drops_queued_reinforcement() {
        let mut tm = TemporalMemory::new(params()).unwrap();
        predicting_segment(&mut tm);
        tm.compute(&[0, 1, 2], true).unwrap();
        assert!(!tm.pending_updates().is_empty());
        tm.compute(&[10], false).unwrap();
        assert!(tm.pending_updates().is_empty());
    }

    #[test]
    fn best_matching_segment_picks_the_winner() {
        let mut tm = TemporalMemory::new(params()).unwrap();
        let weak = tm.connections.create_segment(40).unwrap();
        let strong = tm.connections.create_segment(42).unwrap();
        for source in [0, 4] {
            tm.connections.create_synapse(weak, source, 0.3).unwrap();
        }
        for source in [0, 4, 8] {
            tm.connections.create_synapse(strong, source, 0.3).unwrap();
        }

        tm.compute(&[0, 1, 2], true).unwrap();
        assert!(tm.predictive_cells().is_empty());
        tm.compute(&[10], true).unwrap();
        assert_eq!(tm.winner_cells(), vec![42]);
        assert_eq!(tm.connections().num_segments(), 2);
    }

    #[test]
    fn least_used_cell_avoids_cells_with_segments() {
        let mut tm = TemporalMemory::new(params()).unwrap();
        for cell in [0, 1, 3] {
            tm.connections.create_segment(cell).unwrap();
        }
        assert_eq!(tm.least_used_cell(0).unwrap(), 2);
    }

    #[test]
    fn synapse_cap_evicts_before_growing() {
        let mut capped = params();
        capped.max_synapses_per_segment = Some(3);
        let mut tm = TemporalMemory::new(capped).unwrap();
        let segment = tm.connections.create_segment(40).unwrap();
        tm.connections.create_synapse(segment, 0, 0.2).unwrap();
        tm.connections.create_synapse(segment, 4, 0.3).unwrap();

        tm.grow_synapses(segment, vec![8, 12], &[4]).unwrap();
        let sources: Vec<CellId> = tm
            .connections()
            .segment(segment)
            .unwrap()
            .synapses()
            .iter()
            .map(|s| s.source)
            .collect();
        assert_eq!(sources, vec![4, 8, 12]);
        assert_eq!(tm.connections().num_synapses(), 3);
    }

    #[test]
    fn reset_clears_activity_but_keeps_synapses() {
        let mut tm = TemporalMemory::new(params()).unwrap();
        tm.compute(&[0, 1, 2, 3], true).unwrap();
        tm.compute(&[10, 11], true).unwrap();
        let segments = tm.connections().num_segments();
        tm.reset();
        assert!(tm.active_cells().is_empty());
        assert!(tm.winner_cells().is_empty());
        assert!(tm.predictive_cells().is_empty());
        assert!(tm.active_segments().is_empty());
        assert_eq!(tm.connections().num_segments(), segments);
    }

    #[test]
    fn predict_ahead_leaves_engine_untouched() {
        let mut tm = TemporalMemory::new(params()).unwrap();
        for cell in [40, 41, 42] {
            let ab = tm.connections.create_segment(cell).unwrap();
            for source in [0, 4, 8] {
                tm.connections.create_synapse(ab, source, 0.6).unwrap();
            }
        }
        let bc = tm.connections.create_segment(80).unwrap();
        for source in [40, 41, 42] {
            tm.connections.create_synapse(bc, source, 0.6).unwrap();
        }

        tm.compute(&[0, 1, 2], false).unwrap();
        let before = tm.predictive_cells();
        let ahead = tm.predict_ahead(5).unwrap();
        assert_eq!(ahead, vec![vec![10], vec![20]]);
        assert_eq!(tm.predictive_cells(), before);
        assert_eq!(tm.iteration_num(), 1);
    }

    #[test]
    fn pick_cells_respects_learning_radius() {
        let mut narrow = params();
        narrow.learning_radius = 2;
        let mut tm = TemporalMemory::new(narrow).unwrap();
        let segment = tm.connections.create_segment(40).unwrap();
        let mut picked = tm
            .pick_cells_to_learn_on(10, segment, &[0, 32, 36, 44, 48, 49, 60])
            .unwrap();
        picked.sort_unstable();
        assert_eq!(picked, vec![32, 36, 44, 48, 49]);
        assert!(tm.pick_cells_to_learn_on(1, segment, &[500]).is_err());
    }

    proptest! {
        #[test]
        fn picked_cells_are_new_unique_and_bounded(
            n in 0usize..12,
            existing in proptest::collection::vec(0usize..128, 0..10),
            winners in proptest::collection::vec(0usize..128, 0..40),
        ) {
            let mut tm = TemporalMemory::new(params()).unwrap();
            let segment = tm.connections.create_segment(64).unwrap();
            for &source in &existing {
                tm.connections.create_synapse(segment, source, 0.3).unwrap();
            }

            let picked = tm.pick_cells_to_learn_on(n, segment, &winners).unwrap();

            let mut available: Vec<usize> = winners
                .iter()
                .copied()
                .filter(|cell| !existing.contains(cell))
                .collect();
            available.sort_unstable();
            available.dedup();

            prop_assert_eq!(picked.len(), n.min(available.len()));
            let mut unique = picked.clone();
            unique.sort_unstable();
            unique.dedup();
            prop_assert_eq!(unique.len(), picked.len());
            for cell in &picked {
                prop_assert!(!existing.contains(cell));
                prop_assert!(winners.contains(cell));
            }
        }
    }
}
