//! Double-buffered command queue.
//!
//! Producers append encoded records to the write arena under a short lock.
//! The render thread owns a [`ReadQueue`]; once per frame it calls
//! [`CommandQueue::swap`], which exchanges the two arenas in O(1) so the
//! whole generation becomes readable without copying and the producer keeps
//! writing into the (cleared) former read arena.

use parking_lot::Mutex;

use super::Command;
use super::codec::{self, HEADER_SIZE};
use crate::core::arena::Arena;
use crate::errors::Result;

/// Default arena capacity, per side.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64 * 1024;

#[derive(Debug)]
struct WriteSide {
    arena: Arena,
    count: usize,
    generation: u64,
}

/// Producer-facing half of the queue. Shared behind an `Arc`.
#[derive(Debug)]
pub struct CommandQueue {
    write: Mutex<WriteSide>,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            write: Mutex::new(WriteSide {
                arena: Arena::with_capacity(bytes),
                count: 0,
                generation: 0,
            }),
        }
    }

    /// Appends one command to the current generation.
    pub fn push(&self, cmd: &Command) {
        let mut write = self.write.lock();
        codec::encode(cmd, &mut write.arena);
        write.count += 1;
    }

    /// Appends several commands under a single lock acquisition. They land
    /// contiguously, in iteration order.
    pub fn push_batch<'a>(&self, cmds: impl IntoIterator<Item = &'a Command>) {
        let mut write = self.write.lock();
        for cmd in cmds {
            codec::encode(cmd, &mut write.arena);
            write.count += 1;
        }
    }

    /// Commands pushed since the last swap.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.write.lock().count
    }

    /// Number of swaps performed so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.write.lock().generation
    }

    /// Publishes everything pushed so far to `read` and hands its (empty)
    /// arena back to the producers. Returns the number of commands published.
    ///
    /// # Panics
    /// If `read` still holds commands that were not [cleared](ReadQueue::clear):
    /// swapping would drop a generation the consumer never applied.
    pub fn swap(&self, read: &mut ReadQueue) -> usize {
        if !read.is_drained() {
            log::error!(
                "Command queue swapped with {} undrained commands from generation {}",
                read.count,
                read.generation
            );
            panic!("swap of an undrained read queue");
        }

        let mut write = self.write.lock();
        std::mem::swap(&mut write.arena, &mut read.arena);
        read.count = std::mem::take(&mut write.count);
        write.generation += 1;
        read.generation = write.generation;
        drop(write);

        if read.count > 0 {
            log::trace!(
                "Swapped generation {}: {} commands, {} bytes",
                read.generation,
                read.count,
                read.arena.cursor()
            );
        }
        read.count
    }
}

/// Consumer-owned, immutable-after-swap generation of commands.
#[derive(Debug, Default)]
pub struct ReadQueue {
    arena: Arena,
    count: usize,
    generation: u64,
}

impl ReadQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            arena: Arena::with_capacity(bytes),
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// `true` once the current generation has been cleared.
    #[inline]
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.arena.is_empty()
    }

    /// The swap that produced the current contents.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Decodes the generation in issue order. Stops after the first decode
    /// error, since the position of the following record is then unknown.
    #[must_use]
    pub fn iter(&self) -> ReadQueueIter<'_> {
        ReadQueueIter {
            arena: &self.arena,
            offset: 0,
            failed: false,
        }
    }

    /// Marks the generation applied and resets the arena for reuse.
    pub fn clear(&mut self) {
        self.arena.clear();
        self.count = 0;
    }
}

impl<'a> IntoIterator for &'a ReadQueue {
    type Item = Result<Command>;
    type IntoIter = ReadQueueIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct ReadQueueIter<'a> {
    arena: &'a Arena,
    offset: usize,
    failed: bool,
}

impl Iterator for ReadQueueIter<'_> {
    type Item = Result<Command>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset + HEADER_SIZE > self.arena.cursor() {
            return None;
        }
        match codec::decode(self.arena, self.offset) {
            Ok((cmd, next)) => {
                self.offset = next;
                Some(Ok(cmd))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for ReadQueueIter<'_> {}
