//! N-dimensional grid storage for shaped sweep results.
//!
//! Use [`format_data`] to shape a flat, expansion-ordered sequence into a
//! [`SweepGrid`] and [`unformat_data`] to flatten it back; the two are exact
//! inverses.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SweepError};

/// N-dimensional grid storage with flat backing array and stride-based indexing.
///
/// Stores values in row-major order where the last dimension varies fastest,
/// which is the order in which a configuration tree expands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "GridRepr<T>",
    into = "GridRepr<T>",
    bound(
        serialize = "T: Serialize + Clone",
        deserialize = "T: Deserialize<'de>"
    )
)]
pub struct SweepGrid<T> {
    data: Vec<T>,
    shape: Vec<usize>,
    strides: Vec<usize>,
}

/// On-disk form: strides are derived, never stored
#[derive(Serialize, Deserialize)]
struct GridRepr<T> {
    shape: Vec<usize>,
    data: Vec<T>,
}

impl<T> TryFrom<GridRepr<T>> for SweepGrid<T> {
    type Error = SweepError;

    fn try_from(repr: GridRepr<T>) -> Result<Self> {
        SweepGrid::from_data(repr.shape, repr.data)
    }
}

impl<T> From<SweepGrid<T>> for GridRepr<T> {
    fn from(grid: SweepGrid<T>) -> Self {
        GridRepr {
            shape: grid.shape,
            data: grid.data,
        }
    }
}

impl<T: Clone> SweepGrid<T> {
    /// Create a new grid with the given shape, filled with `fill`.
    pub fn new(shape: Vec<usize>, fill: T) -> Self {
        let total_size: usize = shape.iter().product();
        let strides = compute_strides(&shape);
        Self {
            data: vec![fill; total_size],
            shape,
            strides,
        }
    }

    /// Set the value at the given indices
    pub fn set(&mut self, indices: &[usize], value: T) -> bool {
        if let Some(i) = self.flat_index(indices) {
            self.data[i] = value;
            true
        } else {
            false
        }
    }
}

impl<T> SweepGrid<T> {
    /// Create a grid from row-major data.
    pub fn from_data(shape: Vec<usize>, data: Vec<T>) -> Result<Self> {
        let total_size: usize = shape.iter().product();
        if data.len() != total_size {
            return Err(SweepError::IncompatibleShape(format!(
                "{} values cannot fill a grid of shape {shape:?}",
                data.len()
            )));
        }
        let strides = compute_strides(&shape);
        Ok(Self {
            data,
            shape,
            strides,
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Position in the backing array of the cell at `indices`
    pub fn flat_index(&self, indices: &[usize]) -> Option<usize> {
        if indices.len() != self.shape.len() {
            return None;
        }
        indices
            .iter()
            .zip(&self.shape)
            .zip(&self.strides)
            .try_fold(0, |offset, ((&index, &dim), &stride)| {
                (index < dim).then(|| offset + index * stride)
            })
    }

    /// Coordinates of the cell stored at position `flat`
    pub fn multi_index(&self, flat: usize) -> Option<Vec<usize>> {
        (flat < self.data.len()).then(|| unravel(flat, &self.shape))
    }

    pub fn get(&self, indices: &[usize]) -> Option<&T> {
        self.flat_index(indices).map(|i| &self.data[i])
    }

    pub fn get_mut(&mut self, indices: &[usize]) -> Option<&mut T> {
        self.flat_index(indices).map(|i| &mut self.data[i])
    }

    /// Underlying row-major data
    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    /// Iterate over all indices in row-major order
    pub fn indices(&self) -> GridIndices {
        GridIndices::new(self.shape.clone())
    }

    /// Iterate over (indices, value) pairs
    pub fn iter(&self) -> impl Iterator<Item = (Vec<usize>, &T)> {
        self.indices().zip(self.data.iter())
    }

    /// Apply `f` to every cell, keeping the shape.
    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> SweepGrid<U> {
        SweepGrid {
            data: self.data.iter().map(f).collect(),
            shape: self.shape.clone(),
            strides: self.strides.clone(),
        }
    }
}

/// Shape a flat, expansion-ordered sequence into a grid.
pub fn format_data<T>(shape: &[usize], flat: Vec<T>) -> Result<SweepGrid<T>> {
    SweepGrid::from_data(shape.to_vec(), flat)
}

/// Flatten a grid back into expansion order.
pub fn unformat_data<T: Clone>(grid: &SweepGrid<T>) -> Vec<T> {
    grid.data().to_vec()
}

/// Row-major strides: each dimension steps over the product of the ones
/// after it.
fn compute_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides: Vec<usize> = shape
        .iter()
        .rev()
        .scan(1, |step, &dim| {
            let stride = *step;
            *step *= dim;
            Some(stride)
        })
        .collect();
    strides.reverse();
    strides
}

/// Row-major coordinates of `flat` within `shape`; every dimension must be
/// non-empty.
fn unravel(mut flat: usize, shape: &[usize]) -> Vec<usize> {
    let mut indices = vec![0; shape.len()];
    for (slot, &dim) in indices.iter_mut().zip(shape).rev() {
        *slot = flat % dim;
        flat /= dim;
    }
    indices
}

/// Coordinates of every cell of a shape in row-major order.
///
/// A zero-dimensional shape has one cell, a shape with an empty dimension
/// has none.
pub struct GridIndices {
    shape: Vec<usize>,
    next: usize,
    len: usize,
}

impl GridIndices {
    pub fn new(shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self { shape, next: 0, len }
    }
}

impl Iterator for GridIndices {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.len {
            return None;
        }
        let indices = unravel(self.next, &self.shape);
        self.next += 1;
        Some(indices)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for GridIndices {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_layout() {
        let grid = SweepGrid::from_data(vec![2, 3], (0..6).collect::<Vec<_>>()).unwrap();
        assert_eq!(grid.get(&[0, 2]), Some(&2));
        assert_eq!(grid.get(&[1, 0]), Some(&3));
        assert_eq!(grid.multi_index(4), Some(vec![1, 1]));
        assert_eq!(grid.flat_index(&[1, 2]), Some(5));
        assert_eq!(grid.get(&[2, 0]), None);
    }

    #[test]
    fn test_indices_follow_data_order() {
        let grid = SweepGrid::from_data(vec![2, 2, 2], (0..8).collect::<Vec<_>>()).unwrap();
        for (indices, value) in grid.iter() {
            assert_eq!(grid.flat_index(&indices), Some(*value));
        }
        assert_eq!(grid.indices().count(), 8);
    }

    #[test]
    fn test_zero_dimensional_grid_has_one_cell() {
        let grid = SweepGrid::from_data(vec![], vec![42.0]).unwrap();
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.indices().collect::<Vec<_>>(), vec![Vec::<usize>::new()]);
        assert_eq!(grid.get(&[]), Some(&42.0));
    }

    #[test]
    fn test_strides_and_unravel_agree() {
        assert_eq!(compute_strides(&[2, 3, 4]), vec![12, 4, 1]);
        assert!(compute_strides(&[]).is_empty());
        let grid: SweepGrid<u8> = SweepGrid::new(vec![2, 3, 4], 0);
        for flat in 0..grid.len() {
            let indices = grid.multi_index(flat).unwrap();
            assert_eq!(grid.flat_index(&indices), Some(flat));
        }
        assert_eq!(grid.multi_index(24), None);
        assert_eq!(grid.indices().len(), 24);
    }

    #[test]
    fn test_empty_axis_yields_no_indices() {
        let grid: SweepGrid<f64> = SweepGrid::new(vec![3, 0], 0.0);
        assert!(grid.is_empty());
        assert_eq!(grid.indices().count(), 0);
    }

    #[test]
    fn test_format_rejects_wrong_length() {
        let err = format_data(&[2, 2], vec![1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, SweepError::IncompatibleShape(_)));
    }

    #[test]
    fn test_unformat_inverts_format() {
        let flat: Vec<f64> = (0..24).map(f64::from).collect();
        let grid = format_data(&[2, 3, 4], flat.clone()).unwrap();
        assert_eq!(grid.shape(), &[2, 3, 4]);
        assert_eq!(unformat_data(&grid), flat);
        // cell (i, j, k) holds the value at position i*12 + j*4 + k
        assert_eq!(grid.get(&[1, 2, 3]), Some(&23.0));
    }

    #[test]
    fn test_serde_rejects_inconsistent_shape() {
        let bad = r#"{"shape":[2,2],"data":[1.0,2.0]}"#;
        assert!(serde_json::from_str::<SweepGrid<f64>>(bad).is_err());

        let grid = SweepGrid::from_data(vec![1, 2], vec![1.5, 2.5]).unwrap();
        let json = serde_json::to_string(&grid).unwrap();
        let back: SweepGrid<f64> = serde_json::from_str(&json).unwrap();
        assert_eq!(grid, back);
    }
}
