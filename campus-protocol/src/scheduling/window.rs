use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Half-open time window `[start, end)` on a scheduled subject.
///
/// An absent `end` means the window is open-ended and occupies the subject
/// indefinitely (allocations without a due-back date).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// Window with both endpoints known.
    pub fn bounded(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// Window that never closes on its own.
    pub fn open_ended(start: DateTime<Utc>) -> Self {
        Self { start, end: None }
    }

    /// Whether the window is well formed (`end > start` when bounded).
    pub fn is_valid(&self) -> bool {
        match self.end {
            Some(end) => end > self.start,
            None => true,
        }
    }

    /// Half-open intersection test: `[s1,e1)` and `[s2,e2)` overlap iff
    /// `s1 < e2 && s2 < e1`, treating an unbounded end as +infinity.
    /// Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        let starts_before_other_ends = other.end.map_or(true, |end| self.start < end);
        let other_starts_before_self_ends = self.end.map_or(true, |end| other.start < end);
        starts_before_other_ends && other_starts_before_self_ends
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 11, hour, minute, 0).unwrap()
    }

    #[test]
    fn partial_overlap_is_symmetric() {
        let a = TimeWindow::bounded(at(10, 0), at(11, 0));
        let b = TimeWindow::bounded(at(10, 30), at(11, 30));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }

    #[test]
    fn containment_conflicts() {
        let outer = TimeWindow::bounded(at(9, 0), at(12, 0));
        let inner = TimeWindow::bounded(at(10, 30), at(10, 45));
        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
    }

    #[test]
    fn identical_starts_conflict() {
        let a = TimeWindow::bounded(at(10, 0), at(11, 0));
        let b = TimeWindow::bounded(at(10, 0), at(10, 15));
        assert!(a.overlaps(&b));
    }

    #[test]
    fn touching_endpoints_do_not_conflict() {
        let first = TimeWindow::bounded(at(10, 0), at(11, 0));
        let second = TimeWindow::bounded(at(11, 0), at(12, 0));
        assert!(!first.overlaps(&second));
        assert!(!second.overlaps(&first));
    }

    #[test]
    fn disjoint_windows_do_not_conflict() {
        let morning = TimeWindow::bounded(at(8, 0), at(9, 0));
        let afternoon = TimeWindow::bounded(at(14, 0), at(15, 0));
        assert!(!morning.overlaps(&afternoon));
        assert!(!afternoon.overlaps(&morning));
    }

    #[test]
    fn open_ended_window_blocks_everything_after_its_start() {
        let open = TimeWindow::open_ended(at(10, 0));
        let later = TimeWindow::bounded(at(15, 0), at(16, 0));
        let earlier = TimeWindow::bounded(at(8, 0), at(9, 0));
        assert!(open.overlaps(&later));
        assert!(later.overlaps(&open));
        assert!(!open.overlaps(&earlier));
    }

    #[test]
    fn validity_requires_end_after_start() {
        assert!(TimeWindow::bounded(at(10, 0), at(11, 0)).is_valid());
        assert!(!TimeWindow::bounded(at(11, 0), at(11, 0)).is_valid());
        assert!(!TimeWindow::bounded(at(11, 0), at(10, 0)).is_valid());
        assert!(TimeWindow::open_ended(at(11, 0)).is_valid());
    }
}
