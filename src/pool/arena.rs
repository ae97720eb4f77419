//! Fixed-capacity slot arena backing one pool kind.

use std::any::Any;

pub(super) type Pooled = Box<dyn Any + Send>;

/// Slots for one kind.
///
/// `occupied` is a LIFO stack of filled slot indices, so the most recently
/// returned object is rented first. `vacant` recycles emptied indices; the
/// slot vector never grows past the largest capacity ever configured.
pub(super) struct Bucket {
    slots: Vec<Option<Pooled>>,
    occupied: Vec<usize>,
    vacant: Vec<usize>,
    capacity: usize,
    pub(super) hits: u64,
    pub(super) misses: u64,
    pub(super) returned: u64,
    pub(super) discarded: u64,
}

impl Bucket {
    pub(super) fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            occupied: Vec::new(),
            vacant: Vec::new(),
            capacity,
            hits: 0,
            misses: 0,
            returned: 0,
            discarded: 0,
        }
    }

    #[inline]
    pub(super) fn len(&self) -> usize {
        self.occupied.len()
    }

    #[inline]
    pub(super) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Move the newest object out of the arena.
    pub(super) fn take(&mut self) -> Option<Pooled> {
        let idx = self.occupied.pop()?;
        let item = self.slots[idx].take();
        self.vacant.push(idx);
        item
    }

    /// Move an object into the arena. Hands it back when full.
    pub(super) fn put(&mut self, item: Pooled) -> Result<(), Pooled> {
        if self.occupied.len() >= self.capacity {
            return Err(item);
        }
        let idx = match self.vacant.pop() {
            Some(idx) => idx,
            None => {
                self.slots.push(None);
                self.slots.len() - 1
            }
        };
        self.slots[idx] = Some(item);
        self.occupied.push(idx);
        Ok(())
    }

    /// Change capacity, dropping the oldest objects that no longer fit.
    pub(super) fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        if self.occupied.len() <= capacity {
            return;
        }

        let excess = self.occupied.len() - capacity;
        for idx in self.occupied.drain(..excess) {
            self.slots[idx] = None;
            self.vacant.push(idx);
        }
        self.discarded += excess as u64;
    }

    pub(super) fn clear(&mut self) {
        self.slots.clear();
        self.occupied.clear();
        self.vacant.clear();
    }
}
