use crate::model::*;

use super::{Engine, EngineError};

pub fn validate_span(span: &Span) -> Result<(), EngineError> {
    use crate::limits::*;
    if span.start >= span.end {
        return Err(EngineError::InvalidSpan {
            start: span.start,
            end: span.end,
        });
    }
    if span.start < MIN_VALID_TIMESTAMP_MS || span.end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if span.duration_ms() > MAX_SPAN_DURATION_MS {
        return Err(EngineError::LimitExceeded("span too wide"));
    }
    Ok(())
}

/// Any live reservation on the resource overlapping `span` is a conflict.
pub(crate) fn check_no_conflict(rs: &ResourceState, span: &Span) -> Result<(), EngineError> {
    match rs.live_overlapping(span).next() {
        Some(existing) => Err(EngineError::SlotConflict(existing.id)),
        None => Ok(()),
    }
}

/// Cap on live reservations per resource; completed and cancelled ones are history.
pub(crate) fn check_live_capacity(rs: &ResourceState, max: usize) -> Result<(), EngineError> {
    if rs.live_count() >= max {
        return Err(EngineError::LimitExceeded("too many live reservations on resource"));
    }
    Ok(())
}

impl Engine {
    /// Count the principal's live reservations overlapping `span`, across all
    /// resources. Takes one read lock at a time; the caller holds the
    /// principal's admission mutex so the count cannot grow underneath it.
    pub(super) async fn principal_overlap_count(&self, principal_id: PrincipalId, span: &Span) -> usize {
        let mut count = 0;
        for reservation_id in self.store.live_reservations_of(&principal_id) {
            let Some(resource_id) = self.store.resource_for_reservation(&reservation_id) else {
                continue;
            };
            let Some(rs) = self.get_resource(&resource_id) else {
                continue;
            };
            let guard = rs.read().await;
            if let Some(r) = guard.reservation(reservation_id)
                && r.status.is_live()
                && r.span.overlaps(span)
            {
                count += 1;
            }
        }
        count
    }

    /// Quota check for a prospective reservation of `principal`. Admission
    /// runs it before taking the resource lock but reports it after the
    /// overlap test.
    pub(super) async fn check_quota(&self, principal: &Principal, span: &Span) -> Result<(), EngineError> {
        let max = self.config.quotas.max_concurrent(&principal.group);
        let held = self.principal_overlap_count(principal.id, span).await;
        if held >= max as usize {
            return Err(EngineError::QuotaExceeded(max));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: Ms = 1_700_000_000_000;

    fn live(id: ReservationId, start: Ms, end: Ms, status: ReservationStatus) -> Reservation {
        Reservation {
            id,
            principal_id: 1,
            span: Span::new(start, end),
            status,
            created_at: 0,
            session: Session {
                id,
                unlock_code: "AAAAAAAA".into(),
                status: SessionStatus::Locked,
                unlocked_at: None,
                locked_at: None,
            },
        }
    }

    #[test]
    fn validate_span_rules() {
        assert!(validate_span(&Span { start: T0, end: T0 + 1 }).is_ok());
        assert!(matches!(
            validate_span(&Span { start: T0, end: T0 }),
            Err(EngineError::InvalidSpan { .. })
        ));
        assert!(matches!(
            validate_span(&Span { start: T0 + 5, end: T0 }),
            Err(EngineError::InvalidSpan { .. })
        ));
        assert!(matches!(
            validate_span(&Span { start: 0, end: 10 }),
            Err(EngineError::LimitExceeded(_))
        ));
        assert!(matches!(
            validate_span(&Span { start: T0, end: T0 + 40 * 24 * 3_600_000 }),
            Err(EngineError::LimitExceeded(_))
        ));
    }

    #[test]
    fn conflict_ignores_terminal_and_adjacent() {
        let mut rs = ResourceState::new(1, "PC-01".into(), None, None);
        rs.insert_reservation(live(1, 100, 200, ReservationStatus::Cancelled));
        rs.insert_reservation(live(2, 200, 300, ReservationStatus::Completed));
        rs.insert_reservation(live(3, 300, 400, ReservationStatus::Pending));

        assert!(check_no_conflict(&rs, &Span::new(100, 300)).is_ok());
        assert!(check_no_conflict(&rs, &Span::new(400, 500)).is_ok());
        assert!(matches!(
            check_no_conflict(&rs, &Span::new(350, 450)),
            Err(EngineError::SlotConflict(3))
        ));
    }

    #[test]
    fn capacity_counts_only_live_reservations() {
        let mut rs = ResourceState::new(1, "PC-01".into(), None, None);
        rs.insert_reservation(live(1, 100, 200, ReservationStatus::Cancelled));
        rs.insert_reservation(live(2, 200, 300, ReservationStatus::Completed));
        rs.insert_reservation(live(3, 300, 400, ReservationStatus::Active));

        assert!(check_live_capacity(&rs, 2).is_ok());
        assert!(matches!(
            check_live_capacity(&rs, 1),
            Err(EngineError::LimitExceeded(_))
        ));
    }
}
