//! Topology describes an N-dimensional grid by its dimension sizes and row-major strides.
//!
//! The Spatial Pooler lives in two such grids: the input space and the column space.
//! Potential pools are drawn from an input neighbourhood around each column's centre, local
//! inhibition and the neighbourhood minimum duty cycles look at column neighbourhoods, and the
//! inhibition radius is derived from the coordinate span of connected inputs.

use crate::error::{HtmError, Result};
use serde::{Deserialize, Serialize};

/// Shape of an N-dimensional space with precomputed strides for linear index conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    dims: Vec<usize>,
    strides: Vec<usize>,
}

impl Topology {
    /// Creates a topology; every dimension must be non-zero and there must be at least one.
    pub fn new(dimensions: &[usize]) -> Result<Self> {
        if dimensions.is_empty() || dimensions.contains(&0) {
            return Err(HtmError::InvalidDimensions(format!(
                "dimensions must be non-empty and non-zero, got {dimensions:?}"
            )));
        }

        let mut strides = vec![1; dimensions.len()];
        for i in (0..dimensions.len() - 1).rev() {
            strides[i] = strides[i + 1] * dimensions[i + 1];
        }

        Ok(Self {
            dims: dimensions.to_vec(),
            strides,
        })
    }

    /// Size of each dimension.
    #[inline]
    pub fn dimensions(&self) -> &[usize] {
        &self.dims
    }

    /// Total number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    /// Never true for a constructed topology; provided for clippy symmetry with `len`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Largest dimension size.
    #[inline]
    pub fn max_dimension(&self) -> usize {
        self.dims.iter().copied().max().unwrap_or(0)
    }

    /// Linear index → coordinates, one per dimension.
    #[inline]
    pub fn coordinates(&self, index: usize) -> Vec<usize> {
        let mut remainder = index;
        self.strides
            .iter()
            .map(|&stride| {
                let coord = remainder / stride;
                remainder %= stride;
                coord
            })
            .collect()
    }

    /// Coordinates → linear index. `coords` must have one entry per dimension.
    #[inline]
    pub fn index_from_coordinates(&self, coords: &[usize]) -> usize {
        coords.iter().zip(&self.strides).map(|(&c, &s)| c * s).sum()
    }

    /// Iterates every index within `radius` (Chebyshev distance) of `center`, the centre
    /// included. With `wrapping` the space is a torus and each axis contributes at most its
    /// own size; otherwise the box is clipped at the borders.
    pub fn neighborhood(&self, center: usize, radius: usize, wrapping: bool) -> Neighborhood<'_> {
        let radius = radius as isize;
        let axes: Vec<(isize, isize)> = self
            .coordinates(center)
            .into_iter()
            .zip(&self.dims)
            .map(|(c, &dim)| {
                let (c, dim) = (c as isize, dim as isize);
                if wrapping {
                    let span = (2 * radius + 1).min(dim);
                    (c - radius, c - radius + span)
                } else {
                    ((c - radius).max(0), (c + radius + 1).min(dim))
                }
            })
            .collect();

        let cursor = axes.iter().map(|&(low, _)| low).collect();

        Neighborhood {
            topology: self,
            axes,
            cursor: Some(cursor),
        }
    }
}

/// Iterator over the linear indices of a neighbourhood box, row-major.
pub struct Neighborhood<'a> {
    topology: &'a Topology,
    /// Half-open `[low, high)` bounds per axis, possibly outside the grid when wrapping.
    axes: Vec<(isize, isize)>,
    cursor: Option<Vec<isize>>,
}

impl Iterator for Neighborhood<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let cursor = self.cursor.as_mut()?;

        let index = cursor
            .iter()
            .zip(&self.topology.dims)
            .zip(&self.topology.strides)
            .map(|((&c, &dim), &stride)| c.rem_euclid(dim as isize) as usize * stride)
            .sum();

        let mut axis = cursor.len();
        loop {
            if axis == 0 {
                self.cursor = None;
                break;
            }
            axis -= 1;
            cursor[axis] += 1;
            if cursor[axis] < self.axes[axis].1 {
                break;
            }
            cursor[axis] = self.axes[axis].0;
        }

        Some(index)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.cursor.is_none() {
            return (0, Some(0));
        }
        let total = self
            .axes
            .iter()
            .map(|&(low, high)| (high - low) as usize)
            .product();
        (0, Some(total))
    }
}
