//! Growable array with an optional per-item destructor.
//!
//! Capacity doubles when an append or insert finds the array full. Index
//! based operations are bounds-checked and report [`ArrayError::OutOfBounds`]
//! rather than touching memory outside `0..len`.

use std::fmt;

/// Hook invoked with every item the array destroys (`set`, `remove`, `clear`, drop).
pub type ItemDestructor<T> = Box<dyn Fn(T) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayError {
    OutOfBounds { index: usize, len: usize },
    OutOfMemory { capacity: usize },
}

impl fmt::Display for ArrayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayError::OutOfBounds { index, len } => {
                write!(f, "index {index} out of bounds for array of length {len}")
            }
            ArrayError::OutOfMemory { capacity } => {
                write!(f, "failed to grow array to capacity {capacity}")
            }
        }
    }
}

impl std::error::Error for ArrayError {}

pub struct ViewArray<T> {
    items: Vec<T>,
    destructor: Option<ItemDestructor<T>>,
}

impl<T> ViewArray<T> {
    pub fn with_capacity(capacity: usize) -> Result<Self, ArrayError> {
        let mut items = Vec::new();
        items
            .try_reserve_exact(capacity)
            .map_err(|_| ArrayError::OutOfMemory { capacity })?;
        Ok(Self {
            items,
            destructor: None,
        })
    }

    pub fn with_destructor(
        capacity: usize,
        destructor: impl Fn(T) + Send + Sync + 'static,
    ) -> Result<Self, ArrayError> {
        let mut array = Self::with_capacity(capacity)?;
        array.destructor = Some(Box::new(destructor));
        Ok(array)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn append(&mut self, item: T) -> Result<(), ArrayError> {
        self.grow_if_full()?;
        self.items.push(item);
        Ok(())
    }

    /// Insert at `index`, shifting later items right. `index == len` appends.
    pub fn insert(&mut self, index: usize, item: T) -> Result<(), ArrayError> {
        if index > self.items.len() {
            return Err(self.out_of_bounds(index));
        }
        self.grow_if_full()?;
        self.items.insert(index, item);
        Ok(())
    }

    /// Replace the item at `index`, destroying the displaced item.
    pub fn set(&mut self, index: usize, item: T) -> Result<(), ArrayError> {
        let err = self.out_of_bounds(index);
        let slot = self.items.get_mut(index).ok_or(err)?;
        let old = std::mem::replace(slot, item);
        self.dispose(old);
        Ok(())
    }

    /// Remove and destroy the item at `index`.
    pub fn remove(&mut self, index: usize) -> Result<(), ArrayError> {
        let item = self.pop(index)?;
        self.dispose(item);
        Ok(())
    }

    /// Remove the item at `index` and hand it back without destroying it.
    pub fn pop(&mut self, index: usize) -> Result<T, ArrayError> {
        if index >= self.items.len() {
            return Err(self.out_of_bounds(index));
        }
        Ok(self.items.remove(index))
    }

    /// Destroy every item, keeping the allocation.
    pub fn clear(&mut self) {
        let items: Vec<T> = self.items.drain(..).collect();
        for item in items {
            self.dispose(item);
        }
    }

    fn grow_if_full(&mut self) -> Result<(), ArrayError> {
        if self.items.len() < self.items.capacity() {
            return Ok(());
        }
        let target = self.items.capacity().max(1).saturating_mul(2);
        self.items
            .try_reserve_exact(target - self.items.len())
            .map_err(|_| ArrayError::OutOfMemory { capacity: target })
    }

    fn out_of_bounds(&self, index: usize) -> ArrayError {
        ArrayError::OutOfBounds {
            index,
            len: self.items.len(),
        }
    }

    fn dispose(&self, item: T) {
        if let Some(destructor) = &self.destructor {
            destructor(item);
        }
    }
}

impl<T> Default for ViewArray<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            destructor: None,
        }
    }
}

impl<T> Drop for ViewArray<T> {
    fn drop(&mut self) {
        if self.destructor.is_some() {
            self.clear();
        }
    }
}

impl<T> FromIterator<T> for ViewArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
            destructor: None,
        }
    }
}

impl<'a, T> IntoIterator for &'a ViewArray<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: fmt::Debug> fmt::Debug for ViewArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}
