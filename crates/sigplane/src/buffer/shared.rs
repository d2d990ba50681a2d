// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Immutable, reference-counted sample buffer.
///
/// Slicing shares the underlying allocation, so splitting a large push into
/// sub-packets never copies samples.
pub struct SharedBuffer<T> {
    data: Arc<[T]>,
    start: usize,
    len: usize,
}

impl<T> SharedBuffer<T> {
    pub fn empty() -> Self {
        Self::from(Vec::new())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sub-range `[start, end)` sharing storage with `self`.
    ///
    /// Out-of-range bounds are clamped to the buffer.
    pub fn slice(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.len);
        let start = start.min(end);
        Self {
            data: Arc::clone(&self.data),
            start: self.start + start,
            len: end - start,
        }
    }

    /// True when both buffers view the same allocation.
    pub fn shares_storage(&self, other: &SharedBuffer<T>) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data[self.start..self.start + self.len]
    }
}

impl<T: Clone> SharedBuffer<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.as_slice().to_vec()
    }
}

impl<T> Clone for SharedBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            start: self.start,
            len: self.len,
        }
    }
}

impl<T> Deref for SharedBuffer<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> From<Vec<T>> for SharedBuffer<T> {
    fn from(values: Vec<T>) -> Self {
        let len = values.len();
        Self {
            data: Arc::from(values),
            start: 0,
            len,
        }
    }
}

impl<T: Clone> From<&[T]> for SharedBuffer<T> {
    fn from(values: &[T]) -> Self {
        Self::from(values.to_vec())
    }
}

impl<T> FromIterator<T> for SharedBuffer<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<T>>())
    }
}

impl<T: PartialEq> PartialEq for SharedBuffer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}
