//! Command tags.

/// Produces the sequential tags (`A0001`, `A0002`, ...) that pair each command
/// with its completion response.
#[derive(Debug, Clone)]
pub struct TagGenerator {
    prefix: char,
    next: u32,
}

impl TagGenerator {
    /// Creates a generator with the given prefix.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self { prefix, next: 1 }
    }

    /// Returns the next tag. Wraps around after `u32::MAX` commands.
    pub fn next_tag(&mut self) -> String {
        let tag = format!("{}{:04}", self.prefix, self.next);
        self.next = self.next.wrapping_add(1);
        tag
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
    }
}
