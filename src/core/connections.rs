//! The `Connections` store owns every distal segment and synapse of a layer of cells.
//!
//! Cells are grouped into fixed-size columns and addressed by a flat id
//! (`column * cells_per_column + index`). Segments live in one arena indexed by `SegmentId`;
//! each cell keeps the list of its segment ids, and each presynaptic cell keeps the list of
//! segments holding a synapse from it. The latter is what makes activity propagation cheap:
//! only segments reachable from currently active cells are ever touched.
//!
//! Unlike `BinaryMatrix`, every lookup here is checked and fails fast with
//! `HtmError::IndexOutOfRange` on an unknown identifier.

use super::segment::{CellId, Segment, SegmentId};
use crate::error::{HtmError, Result};
use fxhash::FxHashMap;
use std::ops::Range;

/// Per-segment counts of synapses from currently active cells.
#[derive(Debug, Clone, Default)]
pub struct SegmentActivity {
    /// Active synapses with permanence ≥ the connected threshold.
    pub connected: FxHashMap<SegmentId, usize>,
    /// Active synapses with any positive permanence.
    pub potential: FxHashMap<SegmentId, usize>,
}

/// Segment and synapse storage for `num_columns × cells_per_column` cells.
#[derive(Debug, Clone)]
pub struct Connections {
    num_columns: usize,
    cells_per_column: usize,
    segments: Vec<Segment>,
    segments_for_cell: Vec<Vec<SegmentId>>,
    segments_for_source: Vec<Vec<SegmentId>>,
    num_synapses: usize,
}

impl Connections {
    /// Creates an empty store. Both counts must be at least one.
    pub fn new(num_columns: usize, cells_per_column: usize) -> Result<Self> {
        if num_columns == 0 {
            return Err(HtmError::InvalidDimensions(
                "connections need at least one column".into(),
            ));
        }
        if cells_per_column == 0 {
            return Err(HtmError::invalid("cells_per_column", "must be at least 1"));
        }

        let num_cells = num_columns * cells_per_column;
        Ok(Self {
            num_columns,
            cells_per_column,
            segments: Vec::new(),
            segments_for_cell: vec![Vec::new(); num_cells],
            segments_for_source: vec![Vec::new(); num_cells],
            num_synapses: 0,
        })
    }

    #[inline]
    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    #[inline]
    pub fn cells_per_column(&self) -> usize {
        self.cells_per_column
    }

    #[inline]
    pub fn num_cells(&self) -> usize {
        self.segments_for_cell.len()
    }

    #[inline]
    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    #[inline]
    pub fn num_synapses(&self) -> usize {
        self.num_synapses
    }

    fn check_cell(&self, cell: CellId) -> Result<()> {
        if cell < self.num_cells() {
            Ok(())
        } else {
            Err(HtmError::out_of_range("cell", cell, self.num_cells()))
        }
    }

    fn check_column(&self, column: usize) -> Result<()> {
        if column < self.num_columns {
            Ok(())
        } else {
            Err(HtmError::out_of_range("column", column, self.num_columns))
        }
    }

    /// Column a cell belongs to.
    pub fn column_for_cell(&self, cell: CellId) -> Result<usize> {
        self.check_cell(cell)?;
        Ok(cell / self.cells_per_column)
    }

    /// Flat ids of the cells of `column`.
    pub fn cells_for_column(&self, column: usize) -> Result<Range<CellId>> {
        self.check_column(column)?;
        let start = column * self.cells_per_column;
        Ok(start..start + self.cells_per_column)
    }

    /// Flat id of the `index`-th cell of `column`.
    pub fn cell(&self, column: usize, index: usize) -> Result<CellId> {
        self.check_column(column)?;
        if index >= self.cells_per_column {
            return Err(HtmError::out_of_range("cell index", index, self.cells_per_column));
        }
        Ok(column * self.cells_per_column + index)
    }

    /// Creates an empty sequence segment on `cell`.
    pub fn create_segment(&mut self, cell: CellId) -> Result<SegmentId> {
        self.check_cell(cell)?;
        let id = self.segments.len();
        self.segments.push(Segment::new(cell, true));
        self.segments_for_cell[cell].push(id);
        Ok(id)
    }

    pub fn segment(&self, segment: SegmentId) -> Result<&Segment> {
        let size = self.segments.len();
        self.segments
            .get(segment)
            .ok_or(HtmError::out_of_range("segment", segment, size))
    }

    /// Mutable access for statistics bookkeeping. Synapse edits go through the store so the
    /// reverse index stays consistent.
    pub(crate) fn segment_mut(&mut self, segment: SegmentId) -> Result<&mut Segment> {
        let size = self.segments.len();
        self.segments
            .get_mut(segment)
            .ok_or(HtmError::out_of_range("segment", segment, size))
    }

    pub fn segments_for_cell(&self, cell: CellId) -> Result<&[SegmentId]> {
        self.check_cell(cell)?;
        Ok(&self.segments_for_cell[cell])
    }

    pub fn cell_for_segment(&self, segment: SegmentId) -> Result<CellId> {
        Ok(self.segment(segment)?.cell())
    }

    /// Segments holding a synapse from `source`.
    pub fn segments_for_presynaptic_cell(&self, source: CellId) -> Result<&[SegmentId]> {
        self.check_cell(source)?;
        Ok(&self.segments_for_source[source])
    }

    /// Every synapse sourced by `source`, as `(segment, synapse index)`.
    pub fn synapses_for_presynaptic_cell(
        &self,
        source: CellId,
    ) -> Result<Vec<(SegmentId, usize)>> {
        Ok(self
            .segments_for_presynaptic_cell(source)?
            .iter()
            .filter_map(|&segment| {
                self.segments[segment]
                    .synapse_for_source(source)
                    .map(|index| (segment, index))
            })
            .collect())
    }

    /// Adds a synapse from `source` onto `segment`. If the segment already has one from that
    /// source, its permanence is raised to `permanence` when larger and its index returned.
    pub fn create_synapse(
        &mut self,
        segment: SegmentId,
        source: CellId,
        permanence: f32,
    ) -> Result<usize> {
        check_permanence(permanence)?;
        self.check_cell(source)?;
        let seg = self.segment_mut(segment)?;

        if let Some(index) = seg.synapse_for_source(source) {
            if let Some(syn) = seg.synapse_mut(index) {
                syn.permanence = syn.permanence.max(permanence);
            }
            return Ok(index);
        }

        let index = seg.add_synapse(source, permanence);
        self.segments_for_source[source].push(segment);
        self.num_synapses += 1;
        Ok(index)
    }

    /// Overwrites the permanence of one synapse. `permanence` must lie in `[0, 1]`.
    pub fn update_synapse_permanence(
        &mut self,
        segment: SegmentId,
        synapse: usize,
        permanence: f32,
    ) -> Result<()> {
        check_permanence(permanence)?;
        let seg = self.segment_mut(segment)?;
        let len = seg.len();
        let syn = seg
            .synapse_mut(synapse)
            .ok_or(HtmError::out_of_range("synapse", synapse, len))?;
        syn.permanence = permanence;
        Ok(())
    }

    /// Removes one synapse from a segment.
    pub fn destroy_synapse(&mut self, segment: SegmentId, synapse: usize) -> Result<()> {
        let seg = self.segment_mut(segment)?;
        let len = seg.len();
        let removed = seg
            .remove_synapse(synapse)
            .ok_or(HtmError::out_of_range("synapse", synapse, len))?;
        self.unlink(removed.source, segment);
        Ok(())
    }

    /// Hebbian update of one segment: synapses whose source satisfies `is_active` gain
    /// `increment`, all others lose `decrement`, clamped to `[0, perm_max]`. Synapses that
    /// reach zero are removed.
    pub fn adapt_segment<F>(
        &mut self,
        segment: SegmentId,
        is_active: F,
        increment: f32,
        decrement: f32,
        perm_max: f32,
    ) -> Result<()>
    where
        F: Fn(CellId) -> bool,
    {
        let seg = self.segment_mut(segment)?;
        let (active, inactive): (Vec<usize>, Vec<usize>) =
            (0..seg.len()).partition(|&i| is_active(seg.synapses()[i].source));

        let mut hit_zero = seg.update_synapses(&active, increment, perm_max);
        hit_zero |= seg.update_synapses(&inactive, -decrement, perm_max);

        if hit_zero {
            let removed = seg.remove_zero_permanence();
            for source in removed {
                self.unlink(source, segment);
            }
        }
        Ok(())
    }

    /// Evicts the `n` weakest synapses of a segment, preferring those listed in
    /// `inactive_indices`. Returns the sources that lost their synapse.
    pub fn free_synapses(
        &mut self,
        segment: SegmentId,
        n: usize,
        inactive_indices: &[usize],
    ) -> Result<Vec<CellId>> {
        let removed = self
            .segment_mut(segment)?
            .free_n_synapses(n, inactive_indices);
        for &source in &removed {
            self.unlink(source, segment);
        }
        Ok(removed)
    }

    /// Counts, for every segment reachable from `active_cells`, its active synapses.
    pub fn compute_activity(
        &self,
        active_cells: &[CellId],
        connected_permanence: f32,
    ) -> Result<SegmentActivity> {
        let mut activity = SegmentActivity::default();

        for &source in active_cells {
            for &segment in self.segments_for_presynaptic_cell(source)? {
                let seg = &self.segments[segment];
                let Some(index) = seg.synapse_for_source(source) else {
                    continue;
                };
                let permanence = seg.synapses()[index].permanence;
                if permanence > 0.0 {
                    *activity.potential.entry(segment).or_insert(0) += 1;
                }
                if permanence >= connected_permanence {
                    *activity.connected.entry(segment).or_insert(0) += 1;
                }
            }
        }

        Ok(activity)
    }

    fn unlink(&mut self, source: CellId, segment: SegmentId) {
        let list = &mut self.segments_for_source[source];
        if let Some(pos) = list.iter().position(|&s| s == segment) {
            list.swap_remove(pos);
            self.num_synapses -= 1;
        }
    }
}

fn check_permanence(permanence: f32) -> Result<()> {
    if (0.0..=1.0).contains(&permanence) {
        Ok(())
    } else {
        Err(HtmError::PermanenceOutOfRange(permanence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_cell_arithmetic() {
        let connections = Connections::new(10, 4).unwrap();
        assert_eq!(connections.num_cells(), 40);
        assert_eq!(connections.cells_for_column(3).unwrap(), 12..16);
        assert_eq!(connections.column_for_cell(15).unwrap(), 3);
        assert_eq!(connections.cell(2, 1).unwrap(), 9);
    }

    #[test]
    fn lookups_fail_fast_out_of_range() {
        let mut connections = Connections::new(2, 2).unwrap();
        assert!(matches!(
            connections.column_for_cell(4),
            Err(HtmError::IndexOutOfRange { kind: "cell", index: 4, size: 4 })
        ));
        assert!(connections.cells_for_column(2).is_err());
        assert!(connections.cell(0, 2).is_err());
        assert!(connections.create_segment(9).is_err());
        assert!(connections.segment(0).is_err());
    }

    #[test]
    fn rejects_malformed_construction() {
        assert!(Connections::new(0, 4).is_err());
        assert!(Connections::new(4, 0).is_err());
    }

    #[test]
    fn synapses_are_indexed_by_source() {
        let mut connections = Connections::new(4, 2).unwrap();
        let a = connections.create_segment(0).unwrap();
        let b = connections.create_segment(5).unwrap();
        connections.create_synapse(a, 3, 0.4).unwrap();
        connections.create_synapse(b, 3, 0.6).unwrap();
        connections.create_synapse(b, 7, 0.6).unwrap();

        assert_eq!(connections.num_synapses(), 3);
        assert_eq!(connections.segments_for_cell(5).unwrap(), &[b]);
        assert_eq!(connections.cell_for_segment(a).unwrap(), 0);
        let mut from_three = connections.synapses_for_presynaptic_cell(3).unwrap();
        from_three.sort_unstable();
        assert_eq!(from_three, vec![(a, 0), (b, 0)]);
    }

    #[test]
    fn duplicate_synapse_keeps_larger_permanence() {
        let mut connections = Connections::new(2, 2).unwrap();
        let seg = connections.create_segment(0).unwrap();
        let first = connections.create_synapse(seg, 2, 0.3).unwrap();
        let second = connections.create_synapse(seg, 2, 0.5).unwrap();
        assert_eq!(first, second);
        assert_eq!(connections.num_synapses(), 1);
        assert_eq!(connections.segment(seg).unwrap().synapses()[0].permanence, 0.5);
    }

    #[test]
    fn permanence_must_be_in_unit_interval() {
        let mut connections = Connections::new(2, 2).unwrap();
        let seg = connections.create_segment(0).unwrap();
        assert_eq!(
            connections.create_synapse(seg, 1, 1.5),
            Err(HtmError::PermanenceOutOfRange(1.5))
        );
        connections.create_synapse(seg, 1, 0.5).unwrap();
        assert!(connections.update_synapse_permanence(seg, 0, -0.1).is_err());
        assert!(connections.update_synapse_permanence(seg, 3, 0.1).is_err());
        connections.update_synapse_permanence(seg, 0, 0.9).unwrap();
        assert_eq!(connections.segment(seg).unwrap().synapses()[0].permanence, 0.9);
    }

    #[test]
    fn adapt_removes_synapses_that_reach_zero() {
        let mut connections = Connections::new(4, 1).unwrap();
        let seg = connections.create_segment(0).unwrap();
        connections.create_synapse(seg, 1, 0.05).unwrap();
        connections.create_synapse(seg, 2, 0.5).unwrap();
        connections.create_synapse(seg, 3, 0.5).unwrap();

        connections
            .adapt_segment(seg, |cell| cell == 2, 0.1, 0.1, 1.0)
            .unwrap();

        let synapses = connections.segment(seg).unwrap().synapses();
        assert_eq!(synapses.len(), 2);
        assert!((synapses[0].permanence - 0.6).abs() < 1e-6);
        assert!((synapses[1].permanence - 0.4).abs() < 1e-6);
        assert!(connections.segments_for_presynaptic_cell(1).unwrap().is_empty());
        assert_eq!(connections.num_synapses(), 2);
    }

    #[test]
    fn destroy_and_free_keep_reverse_index_consistent() {
        let mut connections = Connections::new(5, 1).unwrap();
        let seg = connections.create_segment(0).unwrap();
        for (source, perm) in [(1, 0.3), (2, 0.1), (3, 0.7), (4, 0.2)] {
            connections.create_synapse(seg, source, perm).unwrap();
        }

        connections.destroy_synapse(seg, 0).unwrap();
        assert!(connections.segments_for_presynaptic_cell(1).unwrap().is_empty());

        let freed = connections.free_synapses(seg, 1, &[]).unwrap();
        assert_eq!(freed, vec![2]);
        assert!(connections.segments_for_presynaptic_cell(2).unwrap().is_empty());
        assert_eq!(connections.num_synapses(), 2);
    }

    #[test]
    fn activity_counts_connected_and_potential() {
        let mut connections = Connections::new(6, 1).unwrap();
        let seg = connections.create_segment(0).unwrap();
        connections.create_synapse(seg, 1, 0.6).unwrap();
        connections.create_synapse(seg, 2, 0.3).unwrap();
        connections.create_synapse(seg, 3, 0.6).unwrap();

        let activity = connections.compute_activity(&[1, 2, 4], 0.5).unwrap();
        assert_eq!(activity.connected.get(&seg), Some(&1));
        assert_eq!(activity.potential.get(&seg), Some(&2));
        assert!(connections.compute_activity(&[6], 0.5).is_err());
    }
}
