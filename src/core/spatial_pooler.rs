//! The `SpatialPooler` turns a dense input bit-vector into a sparse set of active columns:
//! - Every column samples a fixed potential pool of input bits through permanence-valued synapses.
//! - Its overlap is the number of active input bits reached through connected synapses.
//! - Columns compete (globally or inside a local neighbourhood) and the strongest win.
//! - Winners learn: synapses onto active bits are strengthened, the rest weakened.
//!
//! Homeostasis keeps every column in use. Two rolling statistics are tracked per column:
//! - the overlap duty cycle (how often the column has any overlap),
//! - the active duty cycle (how often it wins).
//! Columns whose active duty cycle falls below a fraction of their neighbourhood's maximum get
//! their overlap boosted; columns that rarely overlap at all get their permanences bumped.

use super::{
    binary_matrix::{BinaryMatrix, DenseBinaryMatrix},
    potential_pool::{PermanenceRules, PotentialPool},
    topology::Topology,
};
use crate::error::{HtmError, Result};
use log::{debug, trace};
use rand::{
    rngs::StdRng,
    seq::{IteratorRandom, SliceRandom},
    SeedableRng,
};
use serde::{Deserialize, Serialize};

/// How many columns may win inside one inhibition area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InhibitionDensity {
    /// A fixed number of winners per inhibition area.
    ColumnsPerArea(usize),
    /// A fraction of the columns in each inhibition area, in `(0, 0.5]`.
    LocalAreaDensity(f32),
}

/// Configuration of a `SpatialPooler`. Missing fields take their defaults when deserialised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialPoolerParams {
    /// Shape of the input space; its product is the expected input length.
    pub input_dimensions: Vec<usize>,
    /// Shape of the column space. Must have the same rank as the input space.
    pub column_dimensions: Vec<usize>,
    /// Input radius around a column's centre from which its potential pool is drawn.
    /// `None` means the whole input space.
    pub potential_radius: Option<usize>,
    /// Fraction of the inputs within the radius that become potential synapses.
    pub potential_pct: f32,
    /// Winners are picked over all columns instead of per neighbourhood.
    pub global_inhibition: bool,
    /// Target number or fraction of winners per inhibition area.
    pub density: InhibitionDensity,
    /// Minimum raw overlap for a column to take part in inhibition.
    pub stimulus_threshold: usize,
    /// Permanence decrement for a winner's synapses onto inactive inputs.
    pub syn_perm_inactive_dec: f32,
    /// Permanence increment for a winner's synapses onto active inputs.
    pub syn_perm_active_inc: f32,
    /// Increment applied to all synapses of a column that rarely overlaps, and per step
    /// while raising a column to the stimulus threshold.
    pub syn_perm_below_stimulus_inc: f32,
    /// Permanence at or above which a synapse is connected.
    pub syn_perm_connected: f32,
    /// Lower bound of every permanence.
    pub syn_perm_min: f32,
    /// Upper bound of every permanence.
    pub syn_perm_max: f32,
    /// Fraction of the neighbourhood's highest overlap duty cycle below which a column's
    /// permanences are bumped.
    pub min_pct_overlap_duty_cycles: f32,
    /// Fraction of the neighbourhood's highest active duty cycle below which a column is
    /// boosted.
    pub min_pct_active_duty_cycles: f32,
    /// Window (in iterations) of the duty-cycle moving averages.
    pub duty_cycle_period: u32,
    /// Highest boost factor, reached by a column whose active duty cycle is 0.
    pub max_boost: f32,
    /// Period (in iterations) of the inhibition radius and minimum duty cycle refresh.
    pub update_period: u32,
    /// Probability that a potential synapse starts out connected.
    pub init_connected_pct: f32,
    /// Neighbourhoods wrap around the edges of the input and column spaces.
    pub wrap_around: bool,
    /// Seed of the generator behind potential pools and initial permanences.
    pub seed: u64,
}

impl Default for SpatialPoolerParams {
    fn default() -> Self {
        Self {
            input_dimensions: vec![1024],
            column_dimensions: vec![2048],
            potential_radius: Some(16),
            potential_pct: 0.5,
            global_inhibition: true,
            density: InhibitionDensity::ColumnsPerArea(10),
            stimulus_threshold: 0,
            syn_perm_inactive_dec: 0.008,
            syn_perm_active_inc: 0.05,
            syn_perm_below_stimulus_inc: 0.10 / 10.0,
            syn_perm_connected: 0.10,
            syn_perm_min: 0.0,
            syn_perm_max: 1.0,
            min_pct_overlap_duty_cycles: 0.001,
            min_pct_active_duty_cycles: 0.001,
            duty_cycle_period: 1000,
            max_boost: 10.0,
            update_period: 50,
            init_connected_pct: 0.5,
            wrap_around: true,
            seed: 42,
        }
    }
}

fn unit(name: &'static str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(HtmError::invalid(name, format!("{value} is outside [0, 1]")))
    }
}

impl SpatialPoolerParams {
    /// Checks every value; called by `SpatialPooler::new`.
    pub fn validate(&self) -> Result<()> {
        Topology::new(&self.input_dimensions)?;
        Topology::new(&self.column_dimensions)?;
        if self.input_dimensions.len() != self.column_dimensions.len() {
            return Err(HtmError::InvalidDimensions(format!(
                "input dimensions {:?} and column dimensions {:?} differ in rank",
                self.input_dimensions, self.column_dimensions
            )));
        }

        if !(self.potential_pct > 0.0 && self.potential_pct <= 1.0) {
            return Err(HtmError::invalid("potential_pct", "must be in (0, 1]"));
        }
        match self.density {
            InhibitionDensity::ColumnsPerArea(0) => {
                return Err(HtmError::invalid("density", "columns per area must be positive"));
            }
            InhibitionDensity::LocalAreaDensity(d) if !(d > 0.0 && d <= 0.5) => {
                return Err(HtmError::invalid("density", "local area density must be in (0, 0.5]"));
            }
            _ => {}
        }

        unit("syn_perm_inactive_dec", self.syn_perm_inactive_dec)?;
        unit("syn_perm_active_inc", self.syn_perm_active_inc)?;
        unit("syn_perm_connected", self.syn_perm_connected)?;
        unit("syn_perm_min", self.syn_perm_min)?;
        unit("syn_perm_max", self.syn_perm_max)?;
        unit("init_connected_pct", self.init_connected_pct)?;
        unit("min_pct_overlap_duty_cycles", self.min_pct_overlap_duty_cycles)?;
        unit("min_pct_active_duty_cycles", self.min_pct_active_duty_cycles)?;
        if !(self.syn_perm_below_stimulus_inc > 0.0 && self.syn_perm_below_stimulus_inc <= 1.0) {
            return Err(HtmError::invalid("syn_perm_below_stimulus_inc", "must be in (0, 1]"));
        }
        if self.syn_perm_min > self.syn_perm_connected || self.syn_perm_connected > self.syn_perm_max
        {
            return Err(HtmError::invalid(
                "syn_perm_connected",
                "must lie between syn_perm_min and syn_perm_max",
            ));
        }

        if self.duty_cycle_period == 0 {
            return Err(HtmError::invalid("duty_cycle_period", "must be positive"));
        }
        if self.update_period == 0 {
            return Err(HtmError::invalid("update_period", "must be positive"));
        }
        if !(self.max_boost >= 1.0) {
            return Err(HtmError::invalid("max_boost", "must be at least 1"));
        }
        Ok(())
    }
}

/// Column competition and proximal learning over a dense input space.
#[derive(Debug, Clone)]
pub struct SpatialPooler {
    params: SpatialPoolerParams,

    /// Seeded generator used for potential pools and initial permanences.
    rand: StdRng,

    /// Compute calls so far, learning or not.
    iteration_num: u32,

    /// Compute calls so far with learning enabled.
    iteration_learn_num: u32,

    /// Length of the input vector.
    num_inputs: usize,

    /// Number of columns.
    num_columns: usize,

    /// Permanence bounds and increments, derived from the parameters.
    rules: PermanenceRules,

    /// Shape of the input space.
    input_topology: Topology,

    /// Shape of the column space.
    column_topology: Topology,

    /// Proximal synapses (permanences) of every column.
    pool: PotentialPool,

    /// Mirror of the connected synapses: one row per column, one bit per input.
    connected: DenseBinaryMatrix,

    /// Radius, in columns, of the neighbourhood a column competes in.
    inhibition_radius: usize,

    /// Moving average of how often each column had a non-zero overlap.
    overlap_duty_cycles: Vec<f32>,

    /// Moving average of how often each column won.
    active_duty_cycles: Vec<f32>,

    /// Overlap duty cycle below which a column gets its permanences bumped.
    min_overlap_duty_cycles: Vec<f32>,

    /// Active duty cycle below which a column is boosted.
    min_active_duty_cycles: Vec<f32>,

    /// Multiplier applied to each column's overlap while learning.
    boost_factors: Vec<f32>,

    /// Raw overlap of each column with the last input, zeroed below the stimulus threshold.
    overlaps: Vec<usize>,

    /// Overlaps after boosting, the values inhibition competes on.
    boosted_overlaps: Vec<f32>,

    /// Scratch copy of the boosted overlaps with the tie-break bonus of local inhibition.
    tie_broken_overlaps: Vec<f32>,

    /// Winners of the last compute call, ascending.
    active_columns: Vec<usize>,
}

impl SpatialPooler {
    /// Builds a pooler: validates the parameters, samples each column's potential pool,
    /// initialises permanences and derives the initial inhibition radius.
    pub fn new(params: SpatialPoolerParams) -> Result<Self> {
        params.validate()?;

        let input_topology = Topology::new(&params.input_dimensions)?;
        let column_topology = Topology::new(&params.column_dimensions)?;
        let num_inputs = input_topology.len();
        let num_columns = column_topology.len();

        let rules = PermanenceRules {
            inactive_decrement: params.syn_perm_inactive_dec,
            active_increment: params.syn_perm_active_inc,
            connected: params.syn_perm_connected,
            below_stimulus_increment: params.syn_perm_below_stimulus_inc,
            min: params.syn_perm_min,
            max: params.syn_perm_max,
            trim_threshold: params.syn_perm_active_inc / 2.0,
        };

        // A radius past the largest dimension already spans the whole input.
        let radius = params
            .potential_radius
            .map_or(input_topology.max_dimension(), |radius| {
                radius.min(input_topology.max_dimension())
            });
        let max_pool = input_topology
            .dimensions()
            .iter()
            .map(|&dim| (2 * radius + 1).min(dim))
            .product();

        let mut sp = Self {
            rand: StdRng::seed_from_u64(params.seed),
            iteration_num: 0,
            iteration_learn_num: 0,
            num_inputs,
            num_columns,
            rules,
            pool: PotentialPool::new(num_columns, max_pool),
            connected: DenseBinaryMatrix::new(num_inputs, num_columns)?,
            inhibition_radius: 0,
            overlap_duty_cycles: vec![0.0; num_columns],
            active_duty_cycles: vec![0.0; num_columns],
            min_overlap_duty_cycles: vec![0.0; num_columns],
            min_active_duty_cycles: vec![0.0; num_columns],
            boost_factors: vec![1.0; num_columns],
            overlaps: vec![0; num_columns],
            boosted_overlaps: vec![0.0; num_columns],
            tie_broken_overlaps: vec![0.0; num_columns],
            active_columns: Vec::with_capacity(num_columns),
            input_topology,
            column_topology,
            params,
        };

        sp.connect_and_configure_inputs(radius);
        sp.update_inhibition_radius();

        debug!(
            "spatial pooler: {} inputs, {} columns, potential pool ≤ {}, inhibition radius {}",
            sp.num_inputs, sp.num_columns, max_pool, sp.inhibition_radius
        );

        Ok(sp)
    }

    /// Processes one input vector and returns the dense column activation.
    ///
    /// Overlap → boost (learning only) → inhibition. With learning, winners adapt their
    /// synapses and the duty cycles, weak-column bumps, periodic refreshes and boost factors
    /// are updated. Without learning, columns that never won are left out of the result.
    pub fn compute(&mut self, input: &[bool], learn: bool) -> Result<Vec<bool>> {
        if input.len() != self.num_inputs {
            return Err(HtmError::InputLength {
                expected: self.num_inputs,
                actual: input.len(),
            });
        }

        self.update_iteration_number(learn);
        self.calculate_overlaps(input)?;
        self.boost(learn);
        self.inhibit_columns();

        if learn {
            self.adapt_synapses(input);
            self.update_duty_cycles();
            self.bump_up_weak_columns();
            if self.is_update_round() {
                self.update_inhibition_radius();
                self.update_min_duty_cycles();
                self.raise_under_stimulated_columns();
                debug!(
                    "spatial pooler update round at iteration {}: inhibition radius {}, min active duty cycle {:.4}",
                    self.iteration_num,
                    self.inhibition_radius,
                    self.min_active_duty_cycles.iter().fold(0.0f32, |a, &x| a.max(x))
                );
            }
            self.update_boost_factors();
        } else {
            self.strip_never_learned();
        }

        trace!(
            "spatial pooler iteration {}: {} active columns",
            self.iteration_num,
            self.active_columns.len()
        );

        let mut output = vec![false; self.num_columns];
        for &col in &self.active_columns {
            output[col] = true;
        }
        Ok(output)
    }

    fn update_iteration_number(&mut self, learn: bool) {
        self.iteration_num += 1;
        if learn {
            self.iteration_learn_num += 1;
        }
    }

    fn is_update_round(&self) -> bool {
        self.iteration_num % self.params.update_period == 0
    }

    /// Raw overlap per column via the connected-synapse matrix. Overlaps below the stimulus
    /// threshold count as zero.
    fn calculate_overlaps(&mut self, input: &[bool]) -> Result<()> {
        self.overlaps = self.connected.row_and_sum(input)?;
        let threshold = self.params.stimulus_threshold;
        for overlap in self.overlaps.iter_mut() {
            if *overlap < threshold {
                *overlap = 0;
            }
        }
        Ok(())
    }

    /// Scales overlaps by the boost factors when learning; passes them through otherwise.
    fn boost(&mut self, learn: bool) {
        for ((boosted, &overlap), &factor) in self
            .boosted_overlaps
            .iter_mut()
            .zip(&self.overlaps)
            .zip(&self.boost_factors)
        {
            *boosted = if learn {
                overlap as f32 * factor
            } else {
                overlap as f32
            };
        }
    }

    /// Winner density for the current inhibition radius.
    fn inhibition_density(&self) -> f32 {
        match self.params.density {
            InhibitionDensity::LocalAreaDensity(density) => density,
            InhibitionDensity::ColumnsPerArea(count) => {
                let diameter = 2 * self.inhibition_radius + 1;
                let area = self
                    .column_topology
                    .dimensions()
                    .iter()
                    .fold(1usize, |acc, _| acc.saturating_mul(diameter))
                    .min(self.num_columns);
                (count as f32 / area as f32).min(0.5)
            }
        }
    }

    fn inhibit_columns(&mut self) {
        let density = self.inhibition_density();
        if self.params.global_inhibition
            || self.inhibition_radius > self.column_topology.max_dimension()
        {
            self.inhibit_columns_global(density);
        } else {
            self.inhibit_columns_local(density);
        }
    }

    /// Top `density * num_columns` columns by boosted overlap. The sort is stable, so among
    /// equal overlaps the lower column index wins. Columns without overlap never win.
    fn inhibit_columns_global(&mut self, density: f32) {
        let num_active = (density * self.num_columns as f32).round() as usize;
        let mut candidates: Vec<usize> = (0..self.num_columns).collect();
        candidates.sort_by(|&a, &b| {
            self.boosted_overlaps[b].total_cmp(&self.boosted_overlaps[a])
        });

        self.active_columns.clear();
        self.active_columns.extend(
            candidates
                .into_iter()
                .take(num_active)
                .filter(|&col| self.boosted_overlaps[col] > 0.0),
        );
        self.active_columns.sort_unstable();
    }

    /// A column wins if fewer than `density * (neighbours + 1)` of its neighbours beat it.
    /// Each winner's overlap is nudged up a little so later equal columns lose the tie.
    fn inhibit_columns_local(&mut self, density: f32) {
        let bonus = self
            .boosted_overlaps
            .iter()
            .fold(0.0f32, |acc, &x| acc.max(x))
            / 1000.0;
        self.tie_broken_overlaps.copy_from_slice(&self.boosted_overlaps);
        self.active_columns.clear();

        for col in 0..self.num_columns {
            let own = self.tie_broken_overlaps[col];
            if own <= 0.0 {
                continue;
            }

            let mut neighbours = 0usize;
            let mut bigger = 0usize;
            for other in self.column_topology.neighborhood(
                col,
                self.inhibition_radius,
                self.params.wrap_around,
            ) {
                if other == col {
                    continue;
                }
                neighbours += 1;
                if self.tie_broken_overlaps[other] > own {
                    bigger += 1;
                }
            }

            let num_active = (0.5 + density * (neighbours + 1) as f32) as usize;
            if bigger < num_active {
                self.active_columns.push(col);
                self.tie_broken_overlaps[col] += bonus;
            }
        }
    }

    /// Hebbian update of the winners' potential synapses, followed by clamping, trimming and
    /// raising each winner back to the stimulus threshold.
    fn adapt_synapses(&mut self, input: &[bool]) {
        for i in 0..self.active_columns.len() {
            let col = self.active_columns[i];
            for syn in self.pool.column_mut(col) {
                if input[syn.input] {
                    syn.permanence += self.rules.active_increment;
                } else {
                    syn.permanence -= self.rules.inactive_decrement;
                }
            }
            self.pool
                .update_column(col, true, self.params.stimulus_threshold, &self.rules);
            self.sync_connected(col);
        }
    }

    /// Trailing averages over `min(iteration, duty_cycle_period)` iterations of "had any
    /// overlap" and "won".
    fn update_duty_cycles(&mut self) {
        let period = self.iteration_num.min(self.params.duty_cycle_period) as f32;

        let mut won = vec![false; self.num_columns];
        for &col in &self.active_columns {
            won[col] = true;
        }

        for (duty, &overlap) in self.overlap_duty_cycles.iter_mut().zip(&self.overlaps) {
            let hit = if overlap > 0 { 1.0 } else { 0.0 };
            *duty = (*duty * (period - 1.0) + hit) / period;
        }
        for (duty, &winner) in self.active_duty_cycles.iter_mut().zip(&won) {
            let hit = if winner { 1.0 } else { 0.0 };
            *duty = (*duty * (period - 1.0) + hit) / period;
        }
    }

    /// Columns whose overlap duty cycle is below their minimum get every potential synapse
    /// bumped by `syn_perm_below_stimulus_inc`.
    fn bump_up_weak_columns(&mut self) {
        for col in 0..self.num_columns {
            if self.overlap_duty_cycles[col] >= self.min_overlap_duty_cycles[col] {
                continue;
            }
            for syn in self.pool.column_mut(col) {
                syn.permanence += self.rules.below_stimulus_increment;
            }
            self.pool
                .update_column(col, false, self.params.stimulus_threshold, &self.rules);
            self.sync_connected(col);
        }
    }

    /// Raises permanences of every column with fewer connected synapses than the stimulus
    /// threshold.
    fn raise_under_stimulated_columns(&mut self) {
        let threshold = self.params.stimulus_threshold;
        for col in 0..self.num_columns {
            if self.pool.connected_count(col) < threshold {
                self.pool.update_column(col, true, threshold, &self.rules);
                self.sync_connected(col);
            }
        }
    }

    /// Boost is `max_boost` for a column that never wins and falls linearly to 1 as its
    /// active duty cycle approaches its minimum; above the minimum it is 1. Columns whose
    /// minimum is still zero keep their factor.
    fn update_boost_factors(&mut self) {
        let max_boost = self.params.max_boost;
        for ((boost, &min), &active) in self
            .boost_factors
            .iter_mut()
            .zip(&self.min_active_duty_cycles)
            .zip(&self.active_duty_cycles)
        {
            if min <= 0.0 {
                continue;
            }
            *boost = if active > min {
                1.0
            } else {
                ((1.0 - max_boost) / min) * active + max_boost
            };
        }
    }

    /// Minimum duty cycles are a fixed fraction of the largest duty cycle in each column's
    /// inhibition neighbourhood (the whole layer under global inhibition).
    fn update_min_duty_cycles(&mut self) {
        let pct_overlap = self.params.min_pct_overlap_duty_cycles;
        let pct_active = self.params.min_pct_active_duty_cycles;

        if self.params.global_inhibition
            || self.inhibition_radius > self.column_topology.max_dimension()
        {
            let max_overlap = self.overlap_duty_cycles.iter().fold(0.0f32, |a, &x| a.max(x));
            let max_active = self.active_duty_cycles.iter().fold(0.0f32, |a, &x| a.max(x));
            self.min_overlap_duty_cycles.fill(pct_overlap * max_overlap);
            self.min_active_duty_cycles.fill(pct_active * max_active);
            return;
        }

        for col in 0..self.num_columns {
            let (mut max_overlap, mut max_active) = (0.0f32, 0.0f32);
            for other in self.column_topology.neighborhood(
                col,
                self.inhibition_radius,
                self.params.wrap_around,
            ) {
                max_overlap = max_overlap.max(self.overlap_duty_cycles[other]);
                max_active = max_active.max(self.active_duty_cycles[other]);
            }
            self.min_overlap_duty_cycles[col] = pct_overlap * max_overlap;
            self.min_active_duty_cycles[col] = pct_active * max_active;
        }
    }

    /// Global inhibition uses the largest column dimension. Otherwise the radius follows the
    /// average span of connected inputs, converted to column units.
    fn update_inhibition_radius(&mut self) {
        if self.params.global_inhibition {
            self.inhibition_radius = self.column_topology.max_dimension();
            return;
        }

        let total_span: f32 = (0..self.num_columns)
            .map(|col| self.avg_connected_span_for_column(col))
            .sum();
        let avg_span = total_span / self.num_columns as f32;
        let diameter = avg_span * self.avg_columns_per_input();
        let radius = ((diameter - 1.0) / 2.0).max(1.0);
        self.inhibition_radius = radius.round() as usize;
    }

    /// Mean (over input dimensions) extent of the box enclosing a column's connected inputs.
    fn avg_connected_span_for_column(&self, column: usize) -> f32 {
        let connected = self.connected.row_indices(column);
        if connected.is_empty() {
            return 0.0;
        }

        let rank = self.input_topology.dimensions().len();
        let mut min_coord = vec![usize::MAX; rank];
        let mut max_coord = vec![0usize; rank];
        for input in connected {
            for (axis, coord) in self.input_topology.coordinates(input).into_iter().enumerate() {
                min_coord[axis] = min_coord[axis].min(coord);
                max_coord[axis] = max_coord[axis].max(coord);
            }
        }

        let total: usize = min_coord
            .iter()
            .zip(&max_coord)
            .map(|(&lo, &hi)| hi - lo + 1)
            .sum();
        total as f32 / rank as f32
    }

    fn avg_columns_per_input(&self) -> f32 {
        let ratios: f32 = self
            .column_topology
            .dimensions()
            .iter()
            .zip(self.input_topology.dimensions())
            .map(|(&col, &inp)| col as f32 / inp as f32)
            .sum();
        ratios / self.column_topology.dimensions().len() as f32
    }

    /// Inference only reports columns that have won at least once while learning.
    fn strip_never_learned(&mut self) {
        let duty = &self.active_duty_cycles;
        self.active_columns.retain(|&col| duty[col] > 0.0);
    }

    fn sync_connected(&mut self, column: usize) {
        let inputs = self.pool.connected_inputs(column);
        self.connected.replace_row(column, &inputs);
    }

    /// Samples each column's potential pool and initialises its permanences.
    fn connect_and_configure_inputs(&mut self, radius: usize) {
        for column in 0..self.num_columns {
            let inputs = self.map_potential(column, radius);
            self.pool.init_column(
                column,
                &inputs,
                self.params.init_connected_pct,
                &self.rules,
                &mut self.rand,
            );
            self.pool
                .update_column(column, true, self.params.stimulus_threshold, &self.rules);
            self.sync_connected(column);
        }
    }

    /// Picks `potential_pct` of the inputs within `radius` of the column's centre.
    fn map_potential(&mut self, column: usize, radius: usize) -> Vec<usize> {
        let center = self.map_column(column);
        let neighbourhood: Vec<usize> = self
            .input_topology
            .neighborhood(center, radius, self.params.wrap_around)
            .collect();
        let size = ((neighbourhood.len() as f32 * self.params.potential_pct) + 0.5) as usize;
        let mut sample = neighbourhood
            .into_iter()
            .choose_multiple(&mut self.rand, size);
        sample.shuffle(&mut self.rand);
        sample
    }

    /// Proportionally maps a column onto the input grid, offset by half a cell, and returns
    /// the linear index of that centre input.
    fn map_column(&self, column: usize) -> usize {
        let coords: Vec<usize> = self
            .column_topology
            .coordinates(column)
            .into_iter()
            .zip(self.column_topology.dimensions())
            .zip(self.input_topology.dimensions())
            .map(|((index, &col_dim), &in_dim)| {
                let mapped = (index as f32 / col_dim as f32) * in_dim as f32
                    + (in_dim as f32 / col_dim as f32) * 0.5;
                (mapped as usize).min(in_dim - 1)
            })
            .collect();
        self.input_topology.index_from_coordinates(&coords)
    }

    pub fn params(&self) -> &SpatialPoolerParams {
        &self.params
    }

    #[inline]
    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    #[inline]
    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    /// Winning columns of the last compute call, ascending and unique; ready for
    /// `TemporalMemory::compute`.
    pub fn active_columns(&self) -> &[usize] {
        &self.active_columns
    }

    pub fn overlaps(&self) -> &[usize] {
        &self.overlaps
    }

    pub fn boosted_overlaps(&self) -> &[f32] {
        &self.boosted_overlaps
    }

    pub fn boost_factors(&self) -> &[f32] {
        &self.boost_factors
    }

    pub fn overlap_duty_cycles(&self) -> &[f32] {
        &self.overlap_duty_cycles
    }

    pub fn active_duty_cycles(&self) -> &[f32] {
        &self.active_duty_cycles
    }

    pub fn min_overlap_duty_cycles(&self) -> &[f32] {
        &self.min_overlap_duty_cycles
    }

    pub fn min_active_duty_cycles(&self) -> &[f32] {
        &self.min_active_duty_cycles
    }

    pub fn inhibition_radius(&self) -> usize {
        self.inhibition_radius
    }

    pub fn iteration_num(&self) -> u32 {
        self.iteration_num
    }

    pub fn iteration_learn_num(&self) -> u32 {
        self.iteration_learn_num
    }

    /// Input indices of a column's potential pool, ascending.
    pub fn potential_pool(&self, column: usize) -> Result<Vec<usize>> {
        self.check_column(column)?;
        let mut inputs: Vec<usize> = self.pool.column(column).iter().map(|s| s.input).collect();
        inputs.sort_unstable();
        Ok(inputs)
    }

    /// `(input, permanence)` pairs of a column's potential synapses, ascending by input.
    pub fn permanences(&self, column: usize) -> Result<Vec<(usize, f32)>> {
        self.check_column(column)?;
        let mut perms: Vec<(usize, f32)> = self
            .pool
            .column(column)
            .iter()
            .map(|s| (s.input, s.permanence))
            .collect();
        perms.sort_unstable_by_key(|&(input, _)| input);
        Ok(perms)
    }

    /// Connected input indices of a column, ascending.
    pub fn connected_synapses(&self, column: usize) -> Result<Vec<usize>> {
        self.check_column(column)?;
        Ok(self.connected.row_indices(column))
    }

    pub fn connected_counts(&self) -> Vec<usize> {
        (0..self.num_columns)
            .map(|col| self.pool.connected_count(col))
            .collect()
    }

    fn check_column(&self, column: usize) -> Result<()> {
        if column < self.num_columns {
            Ok(())
        } else {
            Err(HtmError::out_of_range("column", column, self.num_columns))
        }
    }
}
