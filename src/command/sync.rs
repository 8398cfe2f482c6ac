use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Frame counter the producer can block on.
///
/// The render thread calls [`notify_frame`](Self::notify_frame) after each
/// frame has consumed a generation; a producer that wants to pace itself to
/// the display waits for the counter to move past the value it last saw.
#[derive(Debug, Default)]
pub struct FrameSync {
    frame: Mutex<u64>,
    cond: Condvar,
}

impl FrameSync {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn frame(&self) -> u64 {
        *self.frame.lock()
    }

    /// Advances the counter and wakes every waiter. Returns the new frame.
    pub fn notify_frame(&self) -> u64 {
        let mut frame = self.frame.lock();
        *frame += 1;
        let current = *frame;
        drop(frame);
        self.cond.notify_all();
        current
    }

    /// Blocks until the counter exceeds `last_seen` or `timeout` elapses
    /// (`None` waits indefinitely). Returns the counter value on wake-up.
    pub fn wait_for_frame(&self, last_seen: u64, timeout: Option<Duration>) -> u64 {
        let mut frame = self.frame.lock();
        match timeout {
            Some(timeout) => {
                let result = self.cond.wait_while_for(&mut frame, |f| *f <= last_seen, timeout);
                if result.timed_out() {
                    log::debug!("Frame wait timed out after {timeout:?} at frame {}", *frame);
                }
            }
            None => self.cond.wait_while(&mut frame, |f| *f <= last_seen),
        }
        *frame
    }
}
