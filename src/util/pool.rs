use std::marker::PhantomData;

/// Generational index into a [`Pool`]. Stale handles (slot freed and
/// reused) never resolve.
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub fn index(self) -> u32 {
        self.index
    }
}

// Manual impls: derives would put bounds on T.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.index, self.generation).cmp(&(other.index, other.generation))
    }
}

impl<T> std::hash::Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

struct Slot<T> {
    generation: u32,
    item: Option<T>,
}

/// Fixed-budget object pool. Allocation fails once the budget is spent.
pub struct Pool<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    capacity: usize,
    live: usize,
}

impl<T> Pool<T> {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            slots: Vec::with_capacity(cap.min(1024)),
            free: Vec::new(),
            capacity: cap,
            live: 0,
        }
    }

    /// Returns `None` when the budget is exhausted.
    pub fn alloc(&mut self, item: T) -> Option<Handle<T>> {
        let index = match self.free.pop() {
            Some(idx) => idx,
            None => {
                if self.slots.len() >= self.capacity {
                    return None;
                }
                self.slots.push(Slot {
                    generation: 0,
                    item: None,
                });
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.item = Some(item);
        self.live += 1;
        Some(Handle {
            index,
            generation: slot.generation,
            _marker: PhantomData,
        })
    }

    /// Remove and return the item. Stale handles return `None`.
    pub fn free(&mut self, handle: Handle<T>) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let item = slot.item.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.live -= 1;
        Some(item)
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.item.as_ref()
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.item.as_mut()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Live items in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.item.as_ref().map(|item| {
                (
                    Handle {
                        index: i as u32,
                        generation: slot.generation,
                        _marker: PhantomData,
                    },
                    item,
                )
            })
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, slot)| {
            let generation = slot.generation;
            slot.item.as_mut().map(|item| {
                (
                    Handle {
                        index: i as u32,
                        generation,
                        _marker: PhantomData,
                    },
                    item,
                )
            })
        })
    }

    /// Drop every item. Outstanding handles become stale.
    pub fn clear(&mut self) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.item.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(i as u32);
            }
        }
        self.live = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_is_enforced() {
        let mut pool = Pool::with_capacity(2);
        assert!(pool.alloc(1).is_some());
        assert!(pool.alloc(2).is_some());
        assert!(pool.alloc(3).is_none());
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn stale_handles_do_not_resolve() {
        let mut pool = Pool::with_capacity(4);
        let a = pool.alloc("a").unwrap();
        assert_eq!(pool.free(a), Some("a"));
        let b = pool.alloc("b").unwrap();
        assert_eq!(a.index(), b.index());
        assert!(pool.get(a).is_none());
        assert_eq!(pool.get(b), Some(&"b"));
        assert!(pool.free(a).is_none());
    }

    #[test]
    fn clear_invalidates_everything() {
        let mut pool = Pool::with_capacity(4);
        let a = pool.alloc(10).unwrap();
        let _ = pool.alloc(11).unwrap();
        pool.clear();
        assert_eq!(pool.len(), 0);
        assert!(pool.get(a).is_none());
        assert_eq!(pool.iter().count(), 0);
        assert!(pool.alloc(12).is_some());
    }
}
