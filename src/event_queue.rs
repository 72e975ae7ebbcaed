use crate::keymap::KeyEvent;

/// Growth step of the pushback queue.
pub const UNGET_GROWTH: usize = 16;
/// Growth step of the macro queue.
pub const MACRO_GROWTH: usize = 128;

/// Stack of pending key events.  Events are pushed on and popped off the
/// tail, so the most recently pushed event is read first.
///
/// Capacity grows by a fixed step and is kept across `clear()`.
#[derive(Debug)]
pub struct EventQueue {
    events: Vec<KeyEvent>,
    capacity: usize,
    growth: usize,
}

impl EventQueue {
    pub fn new(growth: usize) -> Self {
        Self {
            events: Vec::new(),
            capacity: 0,
            growth,
        }
    }

    pub fn push(&mut self, event: KeyEvent) {
        if self.events.len() >= self.capacity {
            self.capacity += self.growth;
            self.events.reserve_exact(self.capacity - self.events.len());
        }
        self.events.push(event);
    }

    pub fn pop(&mut self) -> Option<KeyEvent> {
        self.events.pop()
    }

    /// Pop events until one carrying `op` has been removed, or the queue is
    /// empty.
    pub fn pop_through(&mut self, op: i32) {
        while let Some(event) = self.events.pop() {
            if event.op == op {
                return;
            }
        }
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pending events, oldest first.
    pub fn events(&self) -> &[KeyEvent] {
        &self.events
    }
}
