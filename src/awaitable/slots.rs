use super::error::TaskError;
use smallvec::SmallVec;
use std::any::{type_name, Any};

/// Per-table capacity of a [`Slots`] store.
pub const SLOT_CAPACITY: usize = 32;

/// Values a task carries between its callbacks.
///
/// Two index-addressed tables: arbitrary owned values and plain integers.
/// Each holds at most [`SLOT_CAPACITY`] entries.
#[derive(Default)]
pub struct Slots {
    values: Vec<Box<dyn Any + Send>>,
    ints: SmallVec<[i64; 8]>,
}

impl Slots {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, returning its index.
    pub fn save_value<V: Any + Send>(&mut self, value: V) -> Result<usize, TaskError> {
        if self.values.len() >= SLOT_CAPACITY {
            return Err(TaskError::SlotOverflow {
                capacity: SLOT_CAPACITY,
            });
        }
        self.values
            .try_reserve(1)
            .map_err(|_| TaskError::OutOfMemory)?;
        self.values.push(Box::new(value));
        Ok(self.values.len() - 1)
    }

    pub fn value<V: Any>(&self, index: usize) -> Result<&V, TaskError> {
        self.values
            .get(index)
            .ok_or(TaskError::SlotMissing { index })?
            .downcast_ref::<V>()
            .ok_or(TaskError::SlotType {
                index,
                expected: type_name::<V>(),
            })
    }

    pub fn value_mut<V: Any>(&mut self, index: usize) -> Result<&mut V, TaskError> {
        self.values
            .get_mut(index)
            .ok_or(TaskError::SlotMissing { index })?
            .downcast_mut::<V>()
            .ok_or(TaskError::SlotType {
                index,
                expected: type_name::<V>(),
            })
    }

    /// Overwrite an existing value slot. The new value may be of another type.
    pub fn set_value<V: Any + Send>(&mut self, index: usize, value: V) -> Result<(), TaskError> {
        let slot = self
            .values
            .get_mut(index)
            .ok_or(TaskError::SlotMissing { index })?;
        *slot = Box::new(value);
        Ok(())
    }

    pub fn save_int(&mut self, value: i64) -> Result<usize, TaskError> {
        if self.ints.len() >= SLOT_CAPACITY {
            return Err(TaskError::SlotOverflow {
                capacity: SLOT_CAPACITY,
            });
        }
        self.ints.push(value);
        Ok(self.ints.len() - 1)
    }

    pub fn int(&self, index: usize) -> Result<i64, TaskError> {
        self.ints
            .get(index)
            .copied()
            .ok_or(TaskError::SlotMissing { index })
    }

    pub fn set_int(&mut self, index: usize, value: i64) -> Result<(), TaskError> {
        let slot = self
            .ints
            .get_mut(index)
            .ok_or(TaskError::SlotMissing { index })?;
        *slot = value;
        Ok(())
    }

    #[must_use]
    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn int_count(&self) -> usize {
        self.ints.len()
    }

    /// Drop every stored value, keeping the allocations.
    pub fn clear(&mut self) {
        self.values.clear();
        self.ints.clear();
    }
}

impl std::fmt::Debug for Slots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slots")
            .field("values", &self.values.len())
            .field("ints", &self.ints)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_round_trip_by_index() {
        let mut slots = Slots::new();
        let a = slots.save_value(String::from("hello")).unwrap();
        let b = slots.save_value(7_u16).unwrap();
        assert_eq!(slots.value::<String>(a).unwrap(), "hello");
        *slots.value_mut::<u16>(b).unwrap() += 1;
        assert_eq!(*slots.value::<u16>(b).unwrap(), 8);
        assert!(matches!(
            slots.value::<u16>(a),
            Err(TaskError::SlotType { index: 0, .. })
        ));
        assert!(matches!(
            slots.value::<u16>(9),
            Err(TaskError::SlotMissing { index: 9 })
        ));
    }

    #[test]
    fn test_tables_are_bounded() {
        let mut slots = Slots::new();
        for i in 0..SLOT_CAPACITY {
            slots.save_int(i as i64).unwrap();
            slots.save_value(i).unwrap();
        }
        assert!(matches!(
            slots.save_int(0),
            Err(TaskError::SlotOverflow { capacity: 32 })
        ));
        assert!(matches!(
            slots.save_value(0),
            Err(TaskError::SlotOverflow { capacity: 32 })
        ));
        slots.set_int(3, -1).unwrap();
        assert_eq!(slots.int(3).unwrap(), -1);
        slots.clear();
        assert_eq!(slots.int_count(), 0);
        assert_eq!(slots.value_count(), 0);
    }
}
