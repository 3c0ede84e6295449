//! Growable circular-array FIFO
//!
//! Backed by a power-of-two array so head/tail wrap with a mask instead of a
//! modulo. Grows by doubling when full and halves once occupancy drops to a
//! quarter of the capacity, which keeps alternating push/pop at a boundary
//! from resizing on every call.
//!
//! Besides the usual tail insert it supports [`RingBuffer::return_to_front`],
//! which puts an element back ahead of everything else in the buffer.

/// Capacity of a fresh buffer and the floor for shrinking
pub const MIN_CAPACITY: usize = 16;

#[derive(Debug)]
pub struct RingBuffer<T> {
    buf: Vec<Option<T>>,
    head: usize,
    tail: usize,
    count: usize,
}

impl<T> Default for RingBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RingBuffer<T> {
    pub fn new() -> Self {
        Self {
            buf: empty_slots(MIN_CAPACITY),
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    /// Number of elements currently stored
    pub fn depth(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Size of the backing array, always a power of two
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    fn mask(&self) -> usize {
        self.buf.len() - 1
    }

    /// Append an element at the tail.
    pub fn enqueue(&mut self, item: T) {
        if self.count == self.buf.len() {
            self.resize();
        }

        self.buf[self.tail] = Some(item);
        self.tail = (self.tail + 1) & self.mask();
        self.count += 1;
    }

    /// Put an element at the head, ahead of everything already stored.
    ///
    /// Successive returns stack: the most recently returned element is the
    /// next one out.
    pub fn return_to_front(&mut self, item: T) {
        if self.count == self.buf.len() {
            self.resize();
        }

        self.head = self.head.wrapping_sub(1) & self.mask();
        self.buf[self.head] = Some(item);
        self.count += 1;
    }

    /// The element at the head of the buffer.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is empty. Check [`RingBuffer::depth`] first.
    pub fn peek(&self) -> &T {
        assert!(self.count > 0, "ring buffer: peek() called on empty queue");
        self.slot(self.head)
    }

    /// Element `index` counted from the head, or from the tail when negative
    /// (`-1` is the last element).
    ///
    /// # Panics
    ///
    /// Panics if `index` is outside `[-depth, depth)`.
    pub fn get(&self, index: isize) -> &T {
        let depth = self.count as isize;
        let logical = if index < 0 { index + depth } else { index };
        assert!(
            (0..depth).contains(&logical),
            "ring buffer: get({index}) called with index out of range (depth {depth})"
        );

        #[allow(clippy::cast_sign_loss)]
        let position = (self.head + logical as usize) & self.mask();
        self.slot(position)
    }

    /// Remove and return the element at the head.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is empty. Check [`RingBuffer::depth`] first.
    pub fn dequeue(&mut self) -> T {
        assert!(self.count > 0, "ring buffer: dequeue() called on empty queue");

        let item = self.buf[self.head].take();
        self.head = (self.head + 1) & self.mask();
        self.count -= 1;

        if self.buf.len() > MIN_CAPACITY && self.count << 2 == self.buf.len() {
            self.resize();
        }

        match item {
            Some(item) => item,
            None => unreachable!("ring buffer: occupied slot at head was empty"),
        }
    }

    fn slot(&self, position: usize) -> &T {
        match &self.buf[position] {
            Some(item) => item,
            None => unreachable!("ring buffer: occupied slot {position} was empty"),
        }
    }

    /// Reallocate to exactly twice the current occupancy, moving the live
    /// region to the start of the new array. Only called when full (grow) or
    /// a quarter full (shrink), so the result stays a power of two.
    fn resize(&mut self) {
        let capacity = self.count << 1;
        let old = std::mem::replace(&mut self.buf, Vec::with_capacity(capacity));

        let mut old = old.into_iter();
        if self.tail > self.head {
            self.buf
                .extend(old.by_ref().skip(self.head).take(self.count));
        } else {
            // Live region wraps: [head, len) then [0, tail)
            let mut front: Vec<Option<T>> = old.by_ref().take(self.head).collect();
            self.buf.extend(old);
            self.buf.extend(front.drain(..self.tail));
        }
        self.buf.resize_with(capacity, || None);

        self.head = 0;
        self.tail = self.count;
    }
}

fn empty_slots<T>(capacity: usize) -> Vec<Option<T>> {
    let mut buf = Vec::with_capacity(capacity);
    buf.resize_with(capacity, || None);
    buf
}
