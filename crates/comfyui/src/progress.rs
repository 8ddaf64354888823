//! Step progress to percent conversion with de-duplication.

/// Converts `value/max` progress messages into percentages, reporting a
/// value only when it differs from the last one reported in this run.
///
/// Multi-stage workflows reset the step counter per sampler, so a drop
/// back below 100 followed by a fresh 100 is reported again.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    last_reported: Option<u8>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the percentage to report, if any.
    pub fn observe(&mut self, value: i64, max: i64) -> Option<u8> {
        if max <= 0 {
            return None;
        }
        let percent = ((value as f64 / max as f64) * 100.0).round().clamp(0.0, 100.0) as u8;
        if self.last_reported == Some(percent) {
            return None;
        }
        self.last_reported = Some(percent);
        Some(percent)
    }

    pub fn last_reported(&self) -> Option<u8> {
        self.last_reported
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_nearest_percent() {
        let mut t = ProgressTracker::new();
        assert_eq!(t.observe(1, 3), Some(33));
        assert_eq!(t.observe(2, 3), Some(67));
    }

    #[test]
    fn repeated_value_is_suppressed() {
        let mut t = ProgressTracker::new();
        assert_eq!(t.observe(10, 20), Some(50));
        assert_eq!(t.observe(10, 20), None);
        assert_eq!(t.observe(20, 40), None);
    }

    #[test]
    fn second_stage_reports_again() {
        let mut t = ProgressTracker::new();
        assert_eq!(t.observe(4, 4), Some(100));
        assert_eq!(t.observe(1, 8), Some(13));
        assert_eq!(t.observe(8, 8), Some(100));
    }

    #[test]
    fn zero_max_is_ignored() {
        let mut t = ProgressTracker::new();
        assert_eq!(t.observe(3, 0), None);
        assert_eq!(t.last_reported(), None);
    }
}
