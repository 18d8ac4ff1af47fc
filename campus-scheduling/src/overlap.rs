use campus_protocol::scheduling::TimeWindow;
use uuid::Uuid;

/// Scans the active windows of a subject for one that intersects the
/// candidate window.
///
/// `exclude` removes the interval currently being updated from the scan so
/// an allocation re-marked as active never conflicts with itself.
pub fn has_conflict(
    active: &[(Uuid, TimeWindow)],
    candidate: &TimeWindow,
    exclude: Option<Uuid>,
) -> bool {
    active
        .iter()
        .filter(|(id, _)| Some(*id) != exclude)
        .any(|(_, window)| window.overlaps(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 11, hour, minute, 0).unwrap()
    }

    #[test]
    fn overlapping_window_conflicts() {
        let held = vec![(Uuid::new_v4(), TimeWindow::bounded(at(10, 0), at(11, 0)))];
        let candidate = TimeWindow::bounded(at(10, 30), at(10, 45));
        assert!(has_conflict(&held, &candidate, None));
    }

    #[test]
    fn touching_window_does_not_conflict() {
        let held = vec![(Uuid::new_v4(), TimeWindow::bounded(at(10, 0), at(11, 0)))];
        let candidate = TimeWindow::bounded(at(11, 0), at(12, 0));
        assert!(!has_conflict(&held, &candidate, None));
    }

    #[test]
    fn no_active_windows_means_no_conflict() {
        let candidate = TimeWindow::bounded(at(10, 0), at(11, 0));
        assert!(!has_conflict(&[], &candidate, None));
    }

    #[test]
    fn excluded_interval_never_conflicts_with_itself() {
        let own_id = Uuid::new_v4();
        let held = vec![(own_id, TimeWindow::bounded(at(10, 0), at(11, 0)))];
        let candidate = TimeWindow::bounded(at(10, 0), at(11, 30));
        assert!(has_conflict(&held, &candidate, None));
        assert!(!has_conflict(&held, &candidate, Some(own_id)));
    }

    #[test]
    fn exclusion_only_skips_the_matching_interval() {
        let own_id = Uuid::new_v4();
        let held = vec![
            (own_id, TimeWindow::bounded(at(10, 0), at(11, 0))),
            (Uuid::new_v4(), TimeWindow::bounded(at(10, 30), at(12, 0))),
        ];
        let candidate = TimeWindow::bounded(at(10, 0), at(11, 0));
        assert!(has_conflict(&held, &candidate, Some(own_id)));
    }

    #[test]
    fn open_ended_holding_blocks_later_candidates() {
        let held = vec![(Uuid::new_v4(), TimeWindow::open_ended(at(9, 0)))];
        let candidate = TimeWindow::bounded(at(15, 0), at(16, 0));
        assert!(has_conflict(&held, &candidate, None));
    }
}
