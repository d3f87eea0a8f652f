use shared::{DAY_END_SECOND, DAY_START_SECOND};

/// In-game clock advancing one simulated second per real second.
/// Sessions start at dawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldClock {
    seconds: u64,
}

impl WorldClock {
    pub fn new() -> Self {
        Self {
            seconds: DAY_START_SECOND,
        }
    }

    pub fn advance(&mut self, simulated_seconds: u64) {
        self.seconds += simulated_seconds;
    }

    /// Total simulated seconds since the session epoch (midnight of
    /// day one), for the save layer.
    pub fn seconds(&self) -> u64 {
        self.seconds
    }

    fn second_of_day(&self) -> u64 {
        self.seconds % (24 * 3600)
    }

    /// Day is the 06:00-18:00 window; everything else is night.
    pub fn is_day(&self) -> bool {
        let s = self.second_of_day();
        (DAY_START_SECOND..DAY_END_SECOND).contains(&s)
    }

    /// `HH:MM:SS`, the first snapshot line.
    pub fn display(&self) -> String {
        let s = self.second_of_day();
        format!("{:02}:{:02}:{:02}", s / 3600, (s % 3600) / 60, s % 60)
    }
}

impl Default for WorldClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_dawn() {
        let clock = WorldClock::new();
        assert_eq!(clock.display(), "06:00:00");
        assert!(clock.is_day());
    }

    #[test]
    fn test_advance_and_display() {
        let mut clock = WorldClock::new();
        clock.advance(3 * 3600 + 61);
        assert_eq!(clock.display(), "09:01:01");
    }

    #[test]
    fn test_night_window() {
        let mut clock = WorldClock::new();
        clock.advance(12 * 3600); // 18:00
        assert!(!clock.is_day());

        clock.advance(11 * 3600 + 3599); // 05:59:59
        assert!(!clock.is_day());

        clock.advance(1); // wrapped to 06:00:00
        assert!(clock.is_day());
        assert_eq!(clock.display(), "06:00:00");
    }
}
