//! Array-backed binary min-heap keyed by `(sort_index, id)`.
//!
//! Used for both the ready queue and the delayed queue. The id tie-break makes
//! equal keys pop in insertion order, since ids are handed out monotonically.

use std::rc::Rc;

/// An entry that can live in a [`MinHeap`].
pub trait HeapNode {
    /// Primary ordering key.
    fn sort_index(&self) -> u64;
    /// Tie-break for equal `sort_index`. Must be unique per heap.
    fn id(&self) -> u64;
}

impl<T: HeapNode + ?Sized> HeapNode for Rc<T> {
    fn sort_index(&self) -> u64 {
        (**self).sort_index()
    }

    fn id(&self) -> u64 {
        (**self).id()
    }
}

#[derive(Debug)]
pub struct MinHeap<T> {
    nodes: Vec<T>,
}

impl<T> Default for MinHeap<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

impl<T: HeapNode> MinHeap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Smallest entry, without removing it.
    pub fn peek(&self) -> Option<&T> {
        self.nodes.first()
    }

    pub fn push(&mut self, node: T) {
        self.nodes.push(node);
        self.sift_up(self.nodes.len() - 1);
    }

    /// Remove and return the smallest entry.
    pub fn pop(&mut self) -> Option<T> {
        if self.nodes.is_empty() {
            return None;
        }
        let root = self.nodes.swap_remove(0);
        if !self.nodes.is_empty() {
            self.sift_down(0);
        }
        Some(root)
    }

    fn less(a: &T, b: &T) -> bool {
        (a.sort_index(), a.id()) < (b.sort_index(), b.id())
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if Self::less(&self.nodes[index], &self.nodes[parent]) {
                self.nodes.swap(index, parent);
                index = parent;
            } else {
                return;
            }
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        let len = self.nodes.len();
        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            let mut smallest = index;

            if left < len && Self::less(&self.nodes[left], &self.nodes[smallest]) {
                smallest = left;
            }
            if right < len && Self::less(&self.nodes[right], &self.nodes[smallest]) {
                smallest = right;
            }
            if smallest == index {
                return;
            }
            self.nodes.swap(index, smallest);
            index = smallest;
        }
    }
}
