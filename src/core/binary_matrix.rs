//! A `BinaryMatrix` is a fixed `width × height` grid of booleans.
//!
//! It is the workhorse container of both engines: the Spatial Pooler mirrors its connected
//! proximal synapses into one (rows = columns, cols = input bits) and scores overlaps with
//! `row_and_sum`, the Temporal Memory keeps its active/winner/predictive cells in one
//! (rows = columns, cols = cell index within the column).
//!
//! Two backings share the trait:
//! - `DenseBinaryMatrix`: one `bool` per entry, O(1) access, O(width·height) memory.
//! - `SparseBinaryMatrix`: sorted list of `(row, col)` coordinates, memory proportional to the
//!   number of true entries.
//!
//! Indexing wraps: a row or column outside the grid is reduced modulo the matrix dimensions
//! instead of failing. Zero-sized matrices are rejected at construction so the modulo is
//! always defined. Length checks on whole-row operations are strict.

use crate::error::{HtmError, Result};

/// Behaviour common to the dense and sparse backings.
///
/// `Clone` is the deep copy used for state snapshots; neither backing shares storage.
pub trait BinaryMatrix: Clone {
    /// Number of columns per row.
    fn width(&self) -> usize;

    /// Number of rows.
    fn height(&self) -> usize;

    /// Reads the entry at `(row, col)`, wrapping out-of-range coordinates.
    fn get(&self, row: usize, col: usize) -> bool;

    /// Writes the entry at `(row, col)`, wrapping out-of-range coordinates.
    fn set(&mut self, row: usize, col: usize, value: bool);

    /// Indices of the true entries of `row`, ascending.
    fn row_indices(&self, row: usize) -> Vec<usize>;

    /// Replaces `row` with the true entries listed in `indices` (wrapped into range).
    fn replace_row(&mut self, row: usize, indices: &[usize]);

    /// Sets every entry to false.
    fn clear(&mut self);

    /// All true entries as `(row, col)`, row-major order.
    fn entries(&self) -> Vec<(usize, usize)>;

    /// Total number of true entries.
    fn count(&self) -> usize;

    /// Overwrites `row` from a dense slice of exactly `width` values.
    fn set_row_from_dense(&mut self, row: usize, dense: &[bool]) -> Result<()> {
        check_len(self.width(), dense.len())?;
        let indices: Vec<usize> = dense
            .iter()
            .enumerate()
            .filter_map(|(i, &bit)| bit.then_some(i))
            .collect();
        self.replace_row(row, &indices);
        Ok(())
    }

    /// Dot product of `probe` with every row: for each row, the number of columns that are
    /// true in both. The result has one entry per row.
    fn row_and_sum(&self, probe: &[bool]) -> Result<Vec<usize>> {
        check_len(self.width(), probe.len())?;
        let mut sums = vec![0; self.height()];
        for (row, col) in self.entries() {
            if probe[col] {
                sums[row] += 1;
            }
        }
        Ok(sums)
    }

    /// Rows holding at least one true entry, ascending.
    fn non_zero_rows(&self) -> Vec<usize> {
        let mut rows: Vec<usize> = self.entries().into_iter().map(|(row, _)| row).collect();
        rows.dedup();
        rows
    }

    /// Set union: every entry true in `other` becomes true in `self`.
    fn or<M: BinaryMatrix>(&mut self, other: &M) -> Result<()> {
        if self.width() != other.width() || self.height() != other.height() {
            return Err(HtmError::DimensionMismatch {
                expected: (self.width(), self.height()),
                actual: (other.width(), other.height()),
            });
        }
        for (row, col) in other.entries() {
            self.set(row, col, true);
        }
        Ok(())
    }
}

fn check_len(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(HtmError::InputLength { expected, actual })
    }
}

fn check_shape(width: usize, height: usize) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(HtmError::InvalidDimensions(format!(
            "binary matrix must be at least 1x1, got {width}x{height}"
        )));
    }
    Ok(())
}

/// Row-major dense backing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenseBinaryMatrix {
    width: usize,
    height: usize,
    bits: Vec<bool>,
}

impl DenseBinaryMatrix {
    /// Creates an all-false `width × height` matrix.
    pub fn new(width: usize, height: usize) -> Result<Self> {
        check_shape(width, height)?;
        Ok(Self {
            width,
            height,
            bits: vec![false; width * height],
        })
    }

    #[inline]
    fn offset(&self, row: usize, col: usize) -> usize {
        (row % self.height) * self.width + col % self.width
    }

    #[inline]
    fn row_slice(&self, row: usize) -> &[bool] {
        let start = (row % self.height) * self.width;
        &self.bits[start..start + self.width]
    }
}

impl BinaryMatrix for DenseBinaryMatrix {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn get(&self, row: usize, col: usize) -> bool {
        self.bits[self.offset(row, col)]
    }

    #[inline]
    fn set(&mut self, row: usize, col: usize, value: bool) {
        let offset = self.offset(row, col);
        self.bits[offset] = value;
    }

    fn row_indices(&self, row: usize) -> Vec<usize> {
        self.row_slice(row)
            .iter()
            .enumerate()
            .filter_map(|(i, &bit)| bit.then_some(i))
            .collect()
    }

    fn replace_row(&mut self, row: usize, indices: &[usize]) {
        let start = (row % self.height) * self.width;
        self.bits[start..start + self.width].fill(false);
        for &col in indices {
            self.bits[start + col % self.width] = true;
        }
    }

    fn clear(&mut self) {
        self.bits.fill(false);
    }

    fn entries(&self) -> Vec<(usize, usize)> {
        self.bits
            .iter()
            .enumerate()
            .filter_map(|(i, &bit)| bit.then_some((i / self.width, i % self.width)))
            .collect()
    }

    fn count(&self) -> usize {
        self.bits.iter().filter(|&&bit| bit).count()
    }

    /// Scans rows directly instead of going through `entries`.
    fn row_and_sum(&self, probe: &[bool]) -> Result<Vec<usize>> {
        check_len(self.width, probe.len())?;
        Ok(self
            .bits
            .chunks_exact(self.width)
            .map(|row| {
                row.iter()
                    .zip(probe)
                    .filter(|(&bit, &input)| bit && input)
                    .count()
            })
            .collect())
    }

    fn non_zero_rows(&self) -> Vec<usize> {
        self.bits
            .chunks_exact(self.width)
            .enumerate()
            .filter_map(|(row, bits)| bits.iter().any(|&b| b).then_some(row))
            .collect()
    }
}

/// Coordinate-list backing. Entries are kept sorted row-major and unique, so lookups are
/// a binary search and iteration is already in the order `entries` promises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseBinaryMatrix {
    width: usize,
    height: usize,
    entries: Vec<(usize, usize)>,
}

impl SparseBinaryMatrix {
    /// Creates an empty `width × height` matrix.
    pub fn new(width: usize, height: usize) -> Result<Self> {
        check_shape(width, height)?;
        Ok(Self {
            width,
            height,
            entries: Vec::new(),
        })
    }

    #[inline]
    fn wrap(&self, row: usize, col: usize) -> (usize, usize) {
        (row % self.height, col % self.width)
    }

    /// Range of `self.entries` belonging to an already wrapped row.
    fn row_span(&self, row: usize) -> std::ops::Range<usize> {
        let start = self.entries.partition_point(|&(r, _)| r < row);
        let end = self.entries.partition_point(|&(r, _)| r <= row);
        start..end
    }
}

impl BinaryMatrix for SparseBinaryMatrix {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn get(&self, row: usize, col: usize) -> bool {
        let key = self.wrap(row, col);
        self.entries.binary_search(&key).is_ok()
    }

    fn set(&mut self, row: usize, col: usize, value: bool) {
        let key = self.wrap(row, col);
        match (self.entries.binary_search(&key), value) {
            (Err(pos), true) => self.entries.insert(pos, key),
            (Ok(pos), false) => {
                self.entries.remove(pos);
            }
            _ => {}
        }
    }

    fn row_indices(&self, row: usize) -> Vec<usize> {
        let span = self.row_span(row % self.height);
        self.entries[span].iter().map(|&(_, col)| col).collect()
    }

    fn replace_row(&mut self, row: usize, indices: &[usize]) {
        let row = row % self.height;
        let mut cols: Vec<usize> = indices.iter().map(|&col| col % self.width).collect();
        cols.sort_unstable();
        cols.dedup();
        let span = self.row_span(row);
        self.entries
            .splice(span, cols.into_iter().map(|col| (row, col)));
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn entries(&self) -> Vec<(usize, usize)> {
        self.entries.clone()
    }

    fn count(&self) -> usize {
        self.entries.len()
    }

    fn row_and_sum(&self, probe: &[bool]) -> Result<Vec<usize>> {
        check_len(self.width, probe.len())?;
        let mut sums = vec![0; self.height];
        for &(row, col) in &self.entries {
            if probe[col] {
                sums[row] += 1;
            }
        }
        Ok(sums)
    }
}
