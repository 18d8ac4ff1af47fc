use campus_core::errors::{CampusError, Result};
use campus_protocol::scheduling::{ActorRole, Booking, BookingStatus};
use uuid::Uuid;

/// Checks that the actor may drive `booking` to `next`.
///
/// Admins and staff may perform any legal transition; the original
/// requester may only cancel their own booking.
pub fn authorize_status_change(
    booking: &Booking,
    next: BookingStatus,
    actor_role: ActorRole,
    actor_id: Option<Uuid>,
) -> Result<()> {
    if actor_role.can_manage() {
        return Ok(());
    }

    let is_requester = actor_id.is_some() && actor_id == booking.requested_by;
    if is_requester && next == BookingStatus::Cancelled {
        return Ok(());
    }

    Err(CampusError::Forbidden(
        "only staff may change booking status; requesters may cancel their own bookings".into(),
    ))
}

/// Checks the lifecycle edge, rejecting re-opens from terminal states.
pub fn ensure_transition(current: BookingStatus, next: BookingStatus) -> Result<()> {
    if current.can_transition_to(next) {
        Ok(())
    } else {
        Err(CampusError::ProhibitedTransition(format!(
            "booking {} -> {}",
            current.as_str(),
            next.as_str()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn booking(requested_by: Option<Uuid>, status: BookingStatus) -> Booking {
        let start = Utc.with_ymd_and_hms(2024, 3, 11, 10, 0, 0).unwrap();
        Booking {
            id: Uuid::new_v4(),
            classroom_id: Uuid::new_v4(),
            title: "seminar".into(),
            booking_type: None,
            recurrence: None,
            requested_by,
            starts_at: start,
            ends_at: start + chrono::Duration::hours(1),
            status,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn staff_may_confirm() {
        let target = booking(None, BookingStatus::Pending);
        authorize_status_change(&target, BookingStatus::Confirmed, ActorRole::Staff, None)
            .expect("staff should confirm");
        authorize_status_change(&target, BookingStatus::Confirmed, ActorRole::Admin, None)
            .expect("admin should confirm");
    }

    #[test]
    fn requester_may_only_cancel() {
        let requester = Uuid::new_v4();
        let target = booking(Some(requester), BookingStatus::Pending);

        authorize_status_change(
            &target,
            BookingStatus::Cancelled,
            ActorRole::Student,
            Some(requester),
        )
        .expect("requester should cancel");

        let err = authorize_status_change(
            &target,
            BookingStatus::Confirmed,
            ActorRole::Student,
            Some(requester),
        )
        .expect_err("requester must not confirm");
        assert!(matches!(err, CampusError::Forbidden(_)));
    }

    #[test]
    fn strangers_may_not_cancel() {
        let target = booking(Some(Uuid::new_v4()), BookingStatus::Pending);
        let err = authorize_status_change(
            &target,
            BookingStatus::Cancelled,
            ActorRole::Student,
            Some(Uuid::new_v4()),
        )
        .expect_err("other students must not cancel");
        assert!(matches!(err, CampusError::Forbidden(_)));
    }

    #[test]
    fn anonymous_actor_never_matches_a_requester() {
        let target = booking(None, BookingStatus::Pending);
        let err =
            authorize_status_change(&target, BookingStatus::Cancelled, ActorRole::Student, None)
                .expect_err("missing actor id must not pass the ownership check");
        assert!(matches!(err, CampusError::Forbidden(_)));
    }

    #[test]
    fn terminal_states_reject_transitions() {
        let err = ensure_transition(BookingStatus::Cancelled, BookingStatus::Confirmed)
            .expect_err("cancelled is terminal");
        assert!(matches!(err, CampusError::ProhibitedTransition(_)));
        ensure_transition(BookingStatus::Pending, BookingStatus::Confirmed)
            .expect("pending -> confirmed is legal");
    }
}
