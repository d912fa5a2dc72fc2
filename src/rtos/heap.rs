//! Fixed-capacity indexed min-heap
//!
//! A binary heap over a dense `heapless::Vec` that hands out a stable
//! [`Handle`] per inserted element. Handles stay valid while the backing array
//! is reordered, so elements can be removed from anywhere in the heap.

use heapless::Vec;

use crate::error::Error;

/// Stable identifier of a heap element
///
/// Issued from an ever-incrementing 32-bit counter, so a handle is never
/// handed out twice while an older element could still hold it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Handle(u32);

impl Handle {
    pub const fn from_raw(raw: u32) -> Self {
        Handle(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// One heap slot: handle, ordering key and payload
#[derive(Debug, Clone)]
pub struct Entry<K, V> {
    handle: Handle,
    key: K,
    value: V,
}

impl<K, V> Entry<K, V> {
    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn into_parts(self) -> (Handle, K, V) {
        (self.handle, self.key, self.value)
    }
}

/// Min-heap of at most `N` entries ordered by `K`
///
/// Entries with equal keys are ordered by handle, so among equal keys the
/// earliest-issued handle comes out first.
pub struct IndexedHeap<K, V, const N: usize> {
    entries: Vec<Entry<K, V>, N>,
    next_handle: u32,
}

impl<K: Ord, V, const N: usize> IndexedHeap<K, V, N> {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_handle: 0,
        }
    }

    /// Insert `value` keyed by `key`
    ///
    /// Fails without touching the heap when it already holds `N` entries.
    pub fn push(&mut self, key: K, value: V) -> Result<Handle, Error> {
        if self.entries.is_full() {
            return Err(Error::CapacityExceeded);
        }

        // After the counter wraps, step over handles still held by live
        // entries; at most N are live, so this ends within N + 1 steps
        let mut handle = Handle(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1);
        while self.contains(handle) {
            handle = Handle(self.next_handle);
            self.next_handle = self.next_handle.wrapping_add(1);
        }

        let entry = Entry { handle, key, value };
        if self.entries.push(entry).is_err() {
            unreachable!("heap capacity checked above");
        }
        self.sift_up(self.entries.len() - 1);
        Ok(handle)
    }

    /// Smallest entry, without removing it
    pub fn peek_min(&self) -> Option<&Entry<K, V>> {
        self.entries.first()
    }

    /// Remove and return the smallest entry
    pub fn pop_min(&mut self) -> Option<Entry<K, V>> {
        if self.entries.is_empty() {
            return None;
        }
        Some(self.remove_at(0))
    }

    /// Overwrite the root's key and restore heap order
    ///
    /// The root keeps its handle and payload. Used to re-arm an element
    /// without a pop/push pair.
    pub fn replace_min(&mut self, key: K) -> Result<(), Error> {
        let root = self.entries.first_mut().ok_or(Error::EmptyQueue)?;
        root.key = key;
        self.sift_down(0);
        Ok(())
    }

    /// Remove the entry identified by `handle`, wherever it sits
    pub fn remove(&mut self, handle: Handle) -> Option<Entry<K, V>> {
        let pos = self.position(handle)?;
        Some(self.remove_at(pos))
    }

    /// Remove the entry identified by `handle`; `false` if it is not present
    pub fn erase(&mut self, handle: Handle) -> bool {
        self.remove(handle).is_some()
    }

    pub fn get(&self, handle: Handle) -> Option<&Entry<K, V>> {
        self.position(handle).map(|pos| &self.entries[pos])
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.position(handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Entries in storage order (not sorted)
    pub fn iter(&self) -> impl Iterator<Item = &Entry<K, V>> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn position(&self, handle: Handle) -> Option<usize> {
        self.entries.iter().position(|e| e.handle == handle)
    }

    /// Move the last entry into `pos`, shrink, then repair around `pos`.
    /// The displaced entry may need to travel up or down.
    fn remove_at(&mut self, pos: usize) -> Entry<K, V> {
        let removed = self.entries.swap_remove(pos);
        if pos < self.entries.len() {
            let settled = self.sift_up(pos);
            if settled == pos {
                self.sift_down(pos);
            }
        }
        removed
    }

    fn less(&self, a: usize, b: usize) -> bool {
        let (a, b) = (&self.entries[a], &self.entries[b]);
        match a.key.cmp(&b.key) {
            core::cmp::Ordering::Less => true,
            core::cmp::Ordering::Greater => false,
            core::cmp::Ordering::Equal => a.handle < b.handle,
        }
    }

    fn sift_up(&mut self, mut child: usize) -> usize {
        while child > 0 {
            let parent = (child - 1) / 2;
            if !self.less(child, parent) {
                break;
            }
            self.entries.swap(child, parent);
            child = parent;
        }
        child
    }

    fn sift_down(&mut self, mut parent: usize) -> usize {
        let n = self.entries.len();
        loop {
            let left = 2 * parent + 1;
            if left >= n {
                break;
            }
            let right = left + 1;
            let child = if right < n && self.less(right, left) {
                right
            } else {
                left
            };
            if !self.less(child, parent) {
                break;
            }
            self.entries.swap(parent, child);
            parent = child;
        }
        parent
    }

    #[cfg(test)]
    fn is_heap(&self) -> bool {
        (1..self.entries.len()).all(|i| !self.less(i, (i - 1) / 2))
    }
}

impl<K: Ord, V, const N: usize> Default for IndexedHeap<K, V, N> {
    fn default() -> Self {
        Self::new()
    }
}
