//! Row-major index arithmetic for array fields.

use crate::error::{Error, Result};

/// Number of elements in an array of `shape`.
pub fn element_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Resolve a possibly negative multi-dimensional index to its row-major position.
///
/// Negative components wrap once (`-1` is the last element of that
/// dimension). The index rank must equal the shape rank and every resolved
/// component must fall in `0..dim`.
pub fn flat_index(shape: &[usize], index: &[isize]) -> Result<usize> {
    let out_of_bounds = || Error::IndexOutOfBounds {
        index: index.to_vec(),
        shape: shape.to_vec(),
    };

    if index.len() != shape.len() {
        return Err(out_of_bounds());
    }

    let mut flat = 0usize;
    for (&i, &dim) in index.iter().zip(shape) {
        let resolved = if i < 0 {
            dim.checked_sub(i.unsigned_abs())
        } else {
            Some(i.unsigned_abs())
        };
        let resolved = resolved.filter(|&r| r < dim).ok_or_else(out_of_bounds)?;
        flat = flat * dim + resolved;
    }

    Ok(flat)
}
