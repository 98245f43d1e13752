//! Generic FIFO message queue with an in-place inspection pass.
//!
//! `dequeue` returns `None` on empty — the end-of-sequence signal — so a
//! queue doubles as a finite iterator that can only be restarted by
//! reconstruction. [`MessageQueue::inspect`] offers each in-flight item to a
//! decision function that may keep, replace, or delete it without a
//! dequeue/requeue cycle; the pipeline uses this to expire hop-limited
//! messages.
//!
//! Enqueueing while a drain cursor is live is a logical-correctness error and
//! is detected, not raced: the queue is never shared across threads, but a
//! leaked cursor must not silently interleave with producers.

use std::collections::VecDeque;

use thiserror::Error;

/// Errors from queue mutation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// An enqueue or inspection was attempted while a drain cursor is live.
    #[error("queue {name} is being iterated, mutation is not allowed")]
    IterationInProgress {
        /// The queue's name.
        name: String,
    },
}

/// Decision returned by an inspection callback for one item.
#[derive(Debug)]
pub enum Inspection<T> {
    /// Leave the item as is.
    Keep,
    /// Swap the item for a new value in place.
    Replace(T),
    /// Remove the item from the queue.
    Delete,
}

/// Ordered FIFO container for stage-to-stage messages.
#[derive(Debug)]
pub struct MessageQueue<T> {
    name: String,
    items: VecDeque<T>,
    iterating: bool,
}

impl<T> MessageQueue<T> {
    /// Creates an empty queue named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: VecDeque::new(),
            iterating: false,
        }
    }

    /// Creates a queue pre-seeded with `items`.
    #[must_use]
    pub fn with_items(name: impl Into<String>, items: impl IntoIterator<Item = T>) -> Self {
        Self {
            name: name.into(),
            items: items.into_iter().collect(),
            iterating: false,
        }
    }

    /// The queue's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends an item at the back.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::IterationInProgress`] while a drain cursor is
    /// live.
    pub fn enqueue(&mut self, item: T) -> Result<(), QueueError> {
        if self.iterating {
            return Err(QueueError::IterationInProgress {
                name: self.name.clone(),
            });
        }
        self.items.push_back(item);
        Ok(())
    }

    /// Removes and returns the front item; `None` signals end of sequence.
    pub fn dequeue(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Borrows the front item without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        self.items.front()
    }

    /// Offers `(index, &item)` to `decide` for every item, applying the
    /// returned [`Inspection`] in place. Single pass; indices are positions
    /// in the surviving sequence at the time each item is visited.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::IterationInProgress`] while a drain cursor is
    /// live.
    pub fn inspect(
        &mut self,
        mut decide: impl FnMut(usize, &T) -> Inspection<T>,
    ) -> Result<(), QueueError> {
        if self.iterating {
            return Err(QueueError::IterationInProgress {
                name: self.name.clone(),
            });
        }
        let mut index = 0;
        while index < self.items.len() {
            match decide(index, &self.items[index]) {
                Inspection::Keep => index += 1,
                Inspection::Replace(new_item) => {
                    self.items[index] = new_item;
                    index += 1;
                }
                Inspection::Delete => {
                    self.items.remove(index);
                }
            }
        }
        Ok(())
    }

    /// Returns a consuming front-to-back cursor. While the cursor (or a leak
    /// of it) is live, `enqueue` and `inspect` report an error.
    pub fn drain(&mut self) -> Drain<'_, T> {
        self.iterating = true;
        Drain { queue: self }
    }

    /// True when the queue holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of items currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// Consuming iteration cursor over a [`MessageQueue`].
#[derive(Debug)]
pub struct Drain<'a, T> {
    queue: &'a mut MessageQueue<T>,
}

impl<T> Iterator for Drain<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.queue.dequeue()
    }
}

impl<T> Drop for Drain<'_, T> {
    fn drop(&mut self) {
        self.queue.iterating = false;
    }
}
