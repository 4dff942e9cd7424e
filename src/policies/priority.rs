//! # Priority shared by scheduled tasks and registered effects.
//!
//! Ordered `Low < Normal < High`. The scheduler drains higher priorities first;
//! the registry uses priority for admission at capacity and for preemption.

/// Priority of a task or effect.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Background work (prefetch-like DOM reads, decorative effects).
    Low,
    /// Default priority (enter animations, ordinary DOM writes).
    #[default]
    Normal,
    /// Latency-sensitive work (exit animations, navigation-critical writes).
    High,
}

impl Priority {
    /// Returns a short stable label for logs.
    pub fn as_label(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_follows_urgency() {
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
        assert_eq!(Priority::default(), Priority::Normal);
    }
}
