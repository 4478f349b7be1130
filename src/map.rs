//! # Route Map
//!
//! Open-addressing, string-keyed hash map used for the per-method route
//! tables, the transport trie children and request header storage.
//!
//! ## Layout
//!
//! - Keys are hashed with 64-bit FNV-1a and indexed with `hash & (capacity - 1)`,
//!   so the capacity is always a power of two.
//! - Collisions are resolved with linear probing.
//! - The table doubles once the number of occupied slots reaches half the
//!   capacity. Doubling past `usize::MAX` is reported as
//!   [`MapError::CapacityOverflow`], never wrapped.
//!
//! ## Destructors
//!
//! A map may carry a destructor hook. Setting an existing key *replaces* the
//! value, and the displaced value is handed to the hook before the new one is
//! stored. Values still in the map when it is dropped are passed to the hook
//! as well.

use std::fmt;

/// 64-bit FNV-1a offset basis.
pub const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
/// 64-bit FNV-1a prime.
pub const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Hook invoked with every value the map gives up (replacement or drop).
pub type Destructor<V> = Box<dyn Fn(V) + Send + Sync>;

/// Hash a key with 64-bit FNV-1a.
#[must_use]
pub fn fnv1a(key: &str) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in key.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Errors raised while growing a [`ViewMap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapError {
    /// Doubling the table would overflow the capacity type.
    CapacityOverflow { capacity: usize },
    /// The allocator refused the larger table.
    OutOfMemory { capacity: usize },
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::CapacityOverflow { capacity } => write!(
                f,
                "integer limit reached on map capacity (current capacity {capacity})"
            ),
            MapError::OutOfMemory { capacity } => {
                write!(f, "failed to allocate map with capacity {capacity}")
            }
        }
    }
}

impl std::error::Error for MapError {}

struct Pair<V> {
    key: Box<str>,
    value: V,
}

/// String-keyed open-addressing map.
pub struct ViewMap<V> {
    slots: Vec<Option<Pair<V>>>,
    len: usize,
    destructor: Option<Destructor<V>>,
}

impl<V> ViewMap<V> {
    /// Create a map with room for at least `initial_capacity` slots.
    ///
    /// The capacity is rounded up to the next power of two (minimum 1).
    pub fn new(initial_capacity: usize) -> Result<Self, MapError> {
        Self::build(initial_capacity, None)
    }

    /// Create a map whose displaced and dropped values go through `destructor`.
    pub fn with_destructor(
        initial_capacity: usize,
        destructor: impl Fn(V) + Send + Sync + 'static,
    ) -> Result<Self, MapError> {
        Self::build(initial_capacity, Some(Box::new(destructor)))
    }

    fn build(initial_capacity: usize, destructor: Option<Destructor<V>>) -> Result<Self, MapError> {
        let capacity = initial_capacity
            .max(1)
            .checked_next_power_of_two()
            .ok_or(MapError::CapacityOverflow {
                capacity: initial_capacity,
            })?;
        Ok(Self {
            slots: empty_slots(capacity)?,
            len: 0,
            destructor,
        })
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current slot count (always a power of two).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Look up `key`. Absence is not an error.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&V> {
        let index = self.find(key)?;
        self.slots[index].as_ref().map(|pair| &pair.value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        let index = self.find(key)?;
        self.slots[index].as_mut().map(|pair| &mut pair.value)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// Insert or replace `key`.
    ///
    /// When the key already exists the previous value is passed to the
    /// destructor hook (or dropped) before the new value is stored.
    pub fn set(&mut self, key: &str, value: V) -> Result<(), MapError> {
        if let Some(index) = self.find(key) {
            if let Some(pair) = self.slots[index].as_mut() {
                let old = std::mem::replace(&mut pair.value, value);
                self.dispose(old);
            }
            return Ok(());
        }

        if self.len + 1 > self.capacity() / 2 {
            self.expand()?;
        }

        let index = self.probe_free(key);
        self.slots[index] = Some(Pair {
            key: key.into(),
            value,
        });
        self.len += 1;
        Ok(())
    }

    /// Value stored under `key`, inserting `make()` first when the key is absent.
    pub fn get_or_insert_with(
        &mut self,
        key: &str,
        make: impl FnOnce() -> V,
    ) -> Result<&mut V, MapError> {
        let index = match self.find(key) {
            Some(index) => index,
            None => {
                if self.len + 1 > self.capacity() / 2 {
                    self.expand()?;
                }
                self.len += 1;
                self.probe_free(key)
            }
        };
        let slot = &mut self.slots[index];
        let pair = match slot.take() {
            Some(pair) => pair,
            None => Pair {
                key: key.into(),
                value: make(),
            },
        };
        Ok(&mut slot.insert(pair).value)
    }

    /// Iterate over `(key, value)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.slots
            .iter()
            .filter_map(|slot| slot.as_ref().map(|pair| (&*pair.key, &pair.value)))
    }

    /// Iterate over stored keys in slot order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|(key, _)| key)
    }

    fn find(&self, key: &str) -> Option<usize> {
        let mask = self.capacity() - 1;
        let mut index = (fnv1a(key) as usize) & mask;
        for _ in 0..self.capacity() {
            match &self.slots[index] {
                Some(pair) if &*pair.key == key => return Some(index),
                Some(_) => index = (index + 1) & mask,
                None => return None,
            }
        }
        None
    }

    fn probe_free(&self, key: &str) -> usize {
        let mask = self.capacity() - 1;
        let mut index = (fnv1a(key) as usize) & mask;
        while self.slots[index].is_some() {
            index = (index + 1) & mask;
        }
        index
    }

    fn expand(&mut self) -> Result<(), MapError> {
        let new_capacity =
            self.capacity()
                .checked_mul(2)
                .ok_or(MapError::CapacityOverflow {
                    capacity: self.capacity(),
                })?;
        let old = std::mem::replace(&mut self.slots, empty_slots(new_capacity)?);
        for pair in old.into_iter().flatten() {
            let index = self.probe_free(&pair.key);
            self.slots[index] = Some(pair);
        }
        Ok(())
    }

    fn dispose(&self, value: V) {
        if let Some(destructor) = &self.destructor {
            destructor(value);
        }
    }
}

fn empty_slots<V>(capacity: usize) -> Result<Vec<Option<Pair<V>>>, MapError> {
    let mut slots = Vec::new();
    slots
        .try_reserve_exact(capacity)
        .map_err(|_| MapError::OutOfMemory { capacity })?;
    slots.resize_with(capacity, || None);
    Ok(slots)
}

impl<V> Drop for ViewMap<V> {
    fn drop(&mut self) {
        if self.destructor.is_none() {
            return;
        }
        let slots = std::mem::take(&mut self.slots);
        for pair in slots.into_iter().flatten() {
            self.dispose(pair.value);
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for ViewMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
