//! Session statistics

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub correct: u32,
    pub wrong: u32,
    pub total_attempts: u32,
}

impl SessionStats {
    pub(crate) fn record_hit(&mut self) {
        self.correct += 1;
        self.total_attempts += 1;
    }

    pub(crate) fn record_miss(&mut self) {
        self.wrong += 1;
        self.total_attempts += 1;
    }

    /// Slots filled in by the OK button count as correct attempts
    pub(crate) fn record_skipped(&mut self, slots: u32) {
        self.correct += slots;
        self.total_attempts += slots;
    }

    /// Rounded (half-up) share of correct attempts; 0 without attempts
    pub fn accuracy_percent(&self) -> u32 {
        if self.total_attempts == 0 {
            return 0;
        }
        let correct = u64::from(self.correct);
        let total = u64::from(self.total_attempts);
        ((correct * 100 + total / 2) / total) as u32
    }

    /// Two summary lines: `OK: 7/9` and `P: 78%`
    pub fn summary_lines(&self) -> [String; 2] {
        [
            format!("OK: {}/{}", self.correct, self.total_attempts),
            format!("P: {}%", self.accuracy_percent()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(correct: u32, total: u32) -> SessionStats {
        SessionStats {
            correct,
            wrong: total - correct,
            total_attempts: total,
        }
    }

    #[test]
    fn test_accuracy_rounding() {
        assert_eq!(stats(0, 0).accuracy_percent(), 0);
        assert_eq!(stats(1, 1).accuracy_percent(), 100);
        assert_eq!(stats(1, 3).accuracy_percent(), 33);
        assert_eq!(stats(2, 3).accuracy_percent(), 67);
        assert_eq!(stats(1, 8).accuracy_percent(), 13); // 12.5 rounds up
        assert_eq!(stats(0, 5).accuracy_percent(), 0);
    }

    #[test]
    fn test_counters() {
        let mut s = SessionStats::default();
        s.record_hit();
        s.record_miss();
        s.record_skipped(2);
        assert_eq!(s, stats(3, 4));
        assert_eq!(s.accuracy_percent(), 75);
    }

    #[test]
    fn test_summary_lines() {
        let [ok, percent] = stats(7, 9).summary_lines();
        assert_eq!(ok, "OK: 7/9");
        assert_eq!(percent, "P: 78%");
    }
}
