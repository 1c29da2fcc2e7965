use std::sync::Arc;

use tokio::sync::{oneshot, RwLock};
use tracing::{debug, info};

use crate::limits::*;
use crate::model::*;

use super::conflict::{check_live_capacity, check_no_conflict, validate_span};
use super::{Engine, EngineError, WalCommand};

fn check_text(value: Option<&str>, max: usize, what: &'static str) -> Result<(), EngineError> {
    match value {
        Some(v) if v.len() > max => Err(EngineError::LimitExceeded(what)),
        _ => Ok(()),
    }
}

impl Engine {
    pub async fn create_resource(
        &self,
        id: ResourceId,
        name: String,
        description: Option<String>,
        location: Option<String>,
    ) -> Result<(), EngineError> {
        if self.store.resource_count() >= MAX_RESOURCES_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many resources"));
        }
        check_text(Some(&name), MAX_NAME_LEN, "resource name too long")?;
        check_text(description.as_deref(), MAX_DESCRIPTION_LEN, "description too long")?;
        check_text(location.as_deref(), MAX_NAME_LEN, "location too long")?;
        if self.store.contains_resource(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let event = Event::ResourceCreated {
            id,
            name: name.clone(),
            description: description.clone(),
            location: location.clone(),
        };
        self.wal_append(&event).await?;
        let rs = ResourceState::new(id, name, description, location);
        self.store.insert_resource(id, Arc::new(RwLock::new(rs)));
        self.notify.send(id, &event);
        info!("created resource {id}");
        Ok(())
    }

    pub async fn update_resource(
        &self,
        id: ResourceId,
        name: String,
        description: Option<String>,
        location: Option<String>,
    ) -> Result<(), EngineError> {
        check_text(Some(&name), MAX_NAME_LEN, "resource name too long")?;
        check_text(description.as_deref(), MAX_DESCRIPTION_LEN, "description too long")?;
        check_text(location.as_deref(), MAX_NAME_LEN, "location too long")?;
        let mut guard = self.resource_write(id).await?;

        let event = Event::ResourceUpdated { id, name, description, location };
        self.persist_and_apply(id, &mut guard, &event).await
    }

    /// Remove a resource and, with it, every reservation and session on it.
    pub async fn delete_resource(&self, id: ResourceId) -> Result<usize, EngineError> {
        let guard = self.resource_write(id).await?;
        let purged = guard.reservations.len();

        let event = Event::ResourceDeleted { id };
        self.wal_append(&event).await?;
        self.store.remove_resource(&guard);
        drop(guard);
        self.notify.send(id, &event);
        self.notify.remove(&id);
        info!("deleted resource {id} ({purged} reservation(s) purged)");
        Ok(purged)
    }

    /// Admit a reservation of `span` on `resource_id` for `principal`, or say
    /// why not. On success the reservation is pending and its session locked.
    pub async fn admit(
        &self,
        resource_id: ResourceId,
        principal: &Principal,
        span: Span,
        now: Ms,
    ) -> Result<Admission, EngineError> {
        let result = self.try_admit(resource_id, principal, span, now).await;
        self.release_principal_lock(principal.id);
        let outcome = match &result {
            Ok(_) => "accepted",
            Err(e) => e.kind(),
        };
        metrics::counter!(crate::observability::ADMISSIONS_TOTAL, "outcome" => outcome).increment(1);
        match &result {
            Ok(a) => info!(
                "admitted reservation {} on resource {resource_id} for principal {} [{}, {})",
                a.reservation_id, principal.id, span.start, span.end
            ),
            Err(e) => debug!("rejected reservation on resource {resource_id} for principal {}: {e}", principal.id),
        }
        result
    }

    async fn try_admit(
        &self,
        resource_id: ResourceId,
        principal: &Principal,
        span: Span,
        now: Ms,
    ) -> Result<Admission, EngineError> {
        validate_span(&span)?;
        check_text(Some(&principal.group), MAX_GROUP_NAME_LEN, "group name too long")?;
        if !self.store.contains_resource(&resource_id) {
            return Err(EngineError::ResourceNotFound(resource_id));
        }

        self.sweep(now).await?;

        // Lock order: principal, then one resource at a time. The quota is
        // counted first but a slot conflict takes precedence when reporting.
        let principal_lock = self.principal_lock(principal.id);
        let _admitting = principal_lock.lock().await;

        let quota = self.check_quota(principal, &span).await;

        let mut guard = self.resource_write(resource_id).await?;
        self.complete_expired(&mut guard, now).await?;
        check_no_conflict(&guard, &span)?;
        quota?;
        check_live_capacity(&guard, MAX_LIVE_RESERVATIONS_PER_RESOURCE)?;

        let (id, session_id) = self.store.allocate_ids();
        let unlock_code = self.codes.next_code();
        let event = Event::ReservationAdmitted {
            id,
            session_id,
            resource_id,
            principal_id: principal.id,
            span,
            unlock_code: unlock_code.clone(),
            created_at: now,
        };
        self.persist_and_apply(resource_id, &mut guard, &event).await?;

        Ok(Admission {
            reservation_id: id,
            session_id,
            unlock_code,
        })
    }

    /// Cancel a reservation on behalf of its owner. The session is left as-is;
    /// its code stops working because unlock requires an active reservation.
    pub async fn cancel(
        &self,
        reservation_id: ReservationId,
        principal_id: PrincipalId,
        now: Ms,
    ) -> Result<(), EngineError> {
        let (resource_id, mut guard) = self.resolve_reservation_write(&reservation_id).await?;
        self.complete_expired(&mut guard, now).await?;

        let r = guard
            .reservation(reservation_id)
            .ok_or(EngineError::NotFound(reservation_id))?;
        if r.principal_id != principal_id {
            return Err(EngineError::NotOwner(reservation_id));
        }
        match r.status {
            ReservationStatus::Completed => Err(EngineError::AlreadyCompleted(reservation_id)),
            ReservationStatus::Cancelled => Ok(()),
            ReservationStatus::Pending | ReservationStatus::Active => {
                let event = Event::ReservationCancelled {
                    id: reservation_id,
                    resource_id,
                };
                self.persist_and_apply(resource_id, &mut guard, &event).await?;
                info!("reservation {reservation_id} cancelled by principal {principal_id}");
                Ok(())
            }
        }
    }

    /// Administrative hard delete of a reservation and its session.
    pub async fn purge_reservation(&self, reservation_id: ReservationId) -> Result<ResourceId, EngineError> {
        let (resource_id, mut guard) = self.resolve_reservation_write(&reservation_id).await?;
        let event = Event::ReservationPurged {
            id: reservation_id,
            resource_id,
        };
        self.persist_and_apply(resource_id, &mut guard, &event).await?;
        info!("purged reservation {reservation_id}");
        Ok(resource_id)
    }

    /// Compact the WAL by rewriting it with only the events needed to recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();

        for id in self.store.resource_ids() {
            let Some(rs) = self.get_resource(&id) else {
                continue;
            };
            let guard = rs.read().await;
            events.push(Event::ResourceCreated {
                id: guard.id,
                name: guard.name.clone(),
                description: guard.description.clone(),
                location: guard.location.clone(),
            });
            for r in &guard.reservations {
                events.extend(reservation_events(guard.id, r));
            }
        }

        // Taken last so it covers every id handed out above.
        let (next_reservation_id, next_session_id) = self.store.sequence();
        events.push(Event::SequenceAdvanced {
            next_reservation_id,
            next_session_id,
        });

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::StorageFailure("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::StorageFailure("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::StorageFailure(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

/// Events that rebuild one reservation, session included, in its current state.
fn reservation_events(resource_id: ResourceId, r: &Reservation) -> Vec<Event> {
    let mut events = vec![Event::ReservationAdmitted {
        id: r.id,
        session_id: r.session.id,
        resource_id,
        principal_id: r.principal_id,
        span: r.span,
        unlock_code: r.session.unlock_code.clone(),
        created_at: r.created_at,
    }];

    let was_activated = match r.status {
        ReservationStatus::Active => true,
        // Only active reservations can carry an unlock.
        ReservationStatus::Completed | ReservationStatus::Cancelled => r.session.unlocked_at.is_some(),
        ReservationStatus::Pending => false,
    };
    if was_activated {
        events.push(Event::ReservationActivated { id: r.id, resource_id });
    }
    if let Some(at) = r.session.unlocked_at {
        events.push(Event::SessionUnlocked {
            reservation_id: r.id,
            resource_id,
            at,
        });
    }
    match r.status {
        ReservationStatus::Completed => events.push(Event::ReservationCompleted {
            id: r.id,
            resource_id,
            at: r.session.locked_at.unwrap_or(r.span.end),
        }),
        ReservationStatus::Cancelled => {
            events.push(Event::ReservationCancelled { id: r.id, resource_id })
        }
        ReservationStatus::Pending | ReservationStatus::Active => {}
    }
    events
}
