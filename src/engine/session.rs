use tracing::{debug, info};

use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    /// Find the live reservation covering `now` on a resource, promoting it
    /// from pending to active. `eligible` is the "should unlock" signal.
    pub async fn check_eligibility(&self, resource_id: ResourceId, now: Ms) -> Result<Eligibility, EngineError> {
        let mut guard = self.resource_write(resource_id).await?;

        // Earliest start wins if, abnormally, more than one qualifies.
        let Some((id, status)) = guard
            .reservations
            .iter()
            .find(|r| r.status.is_live() && r.span.contains_instant(now))
            .map(|r| (r.id, r.status))
        else {
            return Ok(Eligibility::none());
        };

        if status == ReservationStatus::Pending {
            let event = Event::ReservationActivated { id, resource_id };
            self.persist_and_apply(resource_id, &mut guard, &event).await?;
            info!("reservation {id} on resource {resource_id} is now active");
        }

        let r = guard
            .reservation(id)
            .ok_or(EngineError::NotFound(id))?;
        Ok(Eligibility {
            eligible: r.span.contains_instant(now),
            reservation: Some(ReservationInfo::from_reservation(resource_id, r)),
            unlock_code: Some(r.session.unlock_code.clone()),
        })
    }

    /// Unlock the session of the active reservation on `resource_id` whose code
    /// matches and whose window contains `now`. Repeating a successful unlock
    /// succeeds again without changing anything.
    pub async fn unlock(&self, resource_id: ResourceId, code: &str, now: Ms) -> Result<(), EngineError> {
        let mut guard = self.resource_write(resource_id).await?;

        let matched = guard
            .reservations
            .iter()
            .find(|r| {
                r.status == ReservationStatus::Active
                    && r.span.contains_instant(now)
                    && r.session.unlock_code == code
            })
            .map(|r| (r.id, r.session.status));

        let outcome = match matched {
            None => Err(EngineError::InvalidCodeOrWindow),
            Some((_, SessionStatus::Unlocked)) => Ok(()),
            Some((id, SessionStatus::Locked)) => {
                let event = Event::SessionUnlocked {
                    reservation_id: id,
                    resource_id,
                    at: now,
                };
                self.persist_and_apply(resource_id, &mut guard, &event).await?;
                info!("resource {resource_id} unlocked by reservation {id}");
                Ok(())
            }
        };

        let label = if outcome.is_ok() { "ok" } else { "rejected" };
        metrics::counter!(crate::observability::UNLOCK_ATTEMPTS_TOTAL, "outcome" => label).increment(1);
        if outcome.is_err() {
            debug!("unlock rejected on resource {resource_id}");
        }
        outcome
    }

    /// Complete every active reservation on the resource whose window has
    /// ended and lock its session. Returns how many sessions were locked.
    pub async fn lock(&self, resource_id: ResourceId, now: Ms) -> Result<usize, EngineError> {
        let mut guard = self.resource_write(resource_id).await?;

        let ended: Vec<ReservationId> = guard
            .reservations
            .iter()
            .filter(|r| r.status == ReservationStatus::Active && r.span.end <= now)
            .map(|r| r.id)
            .collect();

        for id in &ended {
            let event = Event::ReservationCompleted {
                id: *id,
                resource_id,
                at: now,
            };
            self.persist_and_apply(resource_id, &mut guard, &event).await?;
        }
        if !ended.is_empty() {
            info!("resource {resource_id}: locked {} session(s)", ended.len());
        }
        Ok(ended.len())
    }
}
