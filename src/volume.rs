//! Dense n-dimensional arrays in C (row-major) order.
use std::fmt;

use crate::{Error, Result};

/// An n-dimensional array. The last axis varies fastest.
#[derive(Clone, PartialEq)]
pub struct Volume<T> {
    shape: Vec<usize>,
    data: Vec<T>,
}

/// Boolean selection of voxels.
pub type Mask = Volume<bool>;

/// A 2-D cut through a 3-D volume, rows by columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane<T> {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<T>,
}

impl<T> Plane<T> {
    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.data.get(row * self.cols + col)
    }
}

impl<T> fmt::Debug for Volume<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Volume")
            .field("shape", &self.shape)
            .field("dtype", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> Volume<T> {
    pub fn new(shape: Vec<usize>, data: Vec<T>) -> Result<Self> {
        let numel = shape.iter().try_fold(1usize, |acc, &n| acc.checked_mul(n));
        if numel != Some(data.len()) {
            return Err(Error::Shape {
                expected: shape,
                found: vec![data.len()],
            });
        }
        Ok(Self { shape, data })
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

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    fn offset(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut offset = 0;
        for (&idx, &len) in index.iter().zip(&self.shape) {
            if idx >= len {
                return None;
            }
            offset = offset * len + idx;
        }
        Some(offset)
    }

    pub fn get(&self, index: &[usize]) -> Option<&T> {
        self.offset(index).map(|o| &self.data[o])
    }

    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Volume<U> {
        Volume {
            shape: self.shape.clone(),
            data: self.data.iter().map(f).collect(),
        }
    }

    /// Drop axes of length 1. A volume that is all singleton axes keeps one.
    pub fn squeeze(mut self) -> Self {
        self.shape.retain(|&n| n != 1);
        if self.shape.is_empty() {
            self.shape.push(self.data.len());
        }
        self
    }

    fn check_shape(&self, other: &[usize]) -> Result<()> {
        if self.shape != other {
            return Err(Error::shape(&self.shape, other));
        }
        Ok(())
    }
}

impl<T: Copy> Volume<T> {
    pub fn filled(shape: Vec<usize>, value: T) -> Self {
        let numel = shape.iter().product();
        Self {
            shape,
            data: vec![value; numel],
        }
    }

    /// Values at the voxels selected by `mask`, in C order.
    pub fn masked(&self, mask: &Mask) -> Result<Vec<T>> {
        self.check_shape(mask.shape())?;
        Ok(self
            .data
            .iter()
            .zip(&mask.data)
            .filter_map(|(&v, &m)| m.then_some(v))
            .collect())
    }

    /// Cut a 3-D volume at `index` along `axis`.
    ///
    /// The remaining two axes keep their relative order: the first becomes rows.
    pub fn plane(&self, axis: usize, index: usize) -> Result<Plane<T>> {
        let &[d0, d1, d2] = self.shape.as_slice() else {
            return Err(Error::general(format!(
                "planes require a 3-D volume, got shape {:?}",
                self.shape
            )));
        };
        if axis > 2 {
            return Err(Error::general(format!("invalid axis {axis}")));
        }
        if index >= self.shape[axis] {
            return Err(Error::general(format!(
                "index {index} out of range for axis {axis} of length {}",
                self.shape[axis]
            )));
        }
        let (rows, cols) = match axis {
            0 => (d1, d2),
            1 => (d0, d2),
            _ => (d0, d1),
        };
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                let at = match axis {
                    0 => (index * d1 + r) * d2 + c,
                    1 => (r * d1 + index) * d2 + c,
                    _ => (r * d1 + c) * d2 + index,
                };
                data.push(self.data[at]);
            }
        }
        Ok(Plane { rows, cols, data })
    }
}

impl Mask {
    /// Number of selected voxels.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&b| b).count()
    }
}

impl Volume<f64> {
    /// Non-zero voxels are selected; NaN is treated as background.
    pub fn to_mask(&self) -> Mask {
        self.map(|&v| v != 0.0 && !v.is_nan())
    }

    /// Smallest and largest finite value.
    pub fn min_max(&self) -> Option<(f64, f64)> {
        self.data
            .iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// One mask per label value of an integer label map.
    pub fn split_labels(&self, labels: &[(u32, String)]) -> Vec<(String, Mask)> {
        labels
            .iter()
            .map(|(value, name)| {
                let target = f64::from(*value);
                (name.clone(), self.map(|&v| v == target))
            })
            .collect()
    }
}
