/// Per-record revision counter.
///
/// Bumped by the application loop whenever a command changes data a renderer
/// would have to re-upload (buffer samples, text, material bindings). A
/// renderer keeps the last revision it consumed and compares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeTracker {
    version: u64,
}

impl ChangeTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn changed(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// True if the record changed since revision `seen`.
    #[must_use]
    pub fn is_newer_than(&self, seen: u64) -> bool {
        self.version != seen
    }

    /// Advances `seen` to the current revision. Returns whether it moved.
    pub fn sync(&self, seen: &mut u64) -> bool {
        let moved = self.is_newer_than(*seen);
        *seen = self.version;
        moved
    }
}
