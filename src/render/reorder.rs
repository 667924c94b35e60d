use std::collections::BTreeMap;

/// Holds out-of-order results until the next expected index arrives.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    next: usize,
    pending: BTreeMap<usize, T>,
}

impl<T> ReorderBuffer<T> {
    pub fn new(start: usize) -> Self {
        Self {
            next: start,
            pending: BTreeMap::new(),
        }
    }

    /// Index the buffer will release next.
    pub fn next_index(&self) -> usize {
        self.next
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Stash an item. Indices already released are ignored.
    pub fn insert(&mut self, index: usize, item: T) {
        if index >= self.next {
            self.pending.insert(index, item);
        }
    }

    /// Release the next item if it has arrived.
    pub fn pop_ready(&mut self) -> Option<(usize, T)> {
        let item = self.pending.remove(&self.next)?;
        let index = self.next;
        self.next += 1;
        Some((index, item))
    }
}
