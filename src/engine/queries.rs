use crate::model::*;

use super::{Engine, EngineError};

const DAY_MS: Ms = 86_400_000;

fn resource_info(rs: &ResourceState) -> ResourceInfo {
    ResourceInfo {
        id: rs.id,
        name: rs.name.clone(),
        description: rs.description.clone(),
        location: rs.location.clone(),
    }
}

fn in_window(window: Option<&Span>, r: &Reservation) -> bool {
    window.is_none_or(|w| w.contains_span(&r.span))
}

impl Engine {
    /// Every resource with its current booking flags, ordered by name.
    /// Expired reservations are swept first so the flags are current.
    pub async fn list_resources(&self, now: Ms) -> Result<Vec<ResourceStatus>, EngineError> {
        self.sweep(now).await?;

        let mut out = Vec::new();
        for id in self.store.resource_ids() {
            let Some(rs) = self.get_resource(&id) else {
                continue;
            };
            let guard = rs.read().await;
            let covering = |status: ReservationStatus| {
                guard
                    .reservations
                    .iter()
                    .any(|r| r.status == status && r.span.contains_instant(now))
            };
            let is_currently_in_use = covering(ReservationStatus::Active);
            let is_currently_booked = is_currently_in_use || covering(ReservationStatus::Pending);
            let is_booked_future = guard
                .reservations
                .iter()
                .any(|r| r.status == ReservationStatus::Pending && r.span.start > now);
            out.push(ResourceStatus {
                resource: resource_info(&guard),
                is_currently_booked,
                is_currently_in_use,
                is_booked_future,
            });
        }
        out.sort_by(|a, b| a.resource.name.cmp(&b.resource.name).then(a.resource.id.cmp(&b.resource.id)));
        Ok(out)
    }

    pub async fn resource_info(&self, id: ResourceId) -> Option<ResourceInfo> {
        let rs = self.get_resource(&id)?;
        let guard = rs.read().await;
        Some(resource_info(&guard))
    }

    /// Non-cancelled reservations on a resource, by start. With a window, only
    /// those lying entirely inside it.
    pub async fn reservations_for_resource(
        &self,
        resource_id: ResourceId,
        window: Option<Span>,
    ) -> Result<Vec<ReservationInfo>, EngineError> {
        let rs = self
            .get_resource(&resource_id)
            .ok_or(EngineError::ResourceNotFound(resource_id))?;
        let guard = rs.read().await;
        Ok(guard
            .reservations
            .iter()
            .filter(|r| r.status != ReservationStatus::Cancelled && in_window(window.as_ref(), r))
            .map(|r| ReservationInfo::from_reservation(resource_id, r))
            .collect())
    }

    /// A principal's reservations in every status, newest start first.
    pub async fn reservations_for_principal(&self, principal_id: PrincipalId) -> Vec<ReservationInfo> {
        let mut out = Vec::new();
        for reservation_id in self.store.reservations_of(&principal_id) {
            let Some(resource_id) = self.store.resource_for_reservation(&reservation_id) else {
                continue;
            };
            let Some(rs) = self.get_resource(&resource_id) else {
                continue;
            };
            let guard = rs.read().await;
            if let Some(r) = guard.reservation(reservation_id) {
                out.push(ReservationInfo::from_reservation(resource_id, r));
            }
        }
        out.sort_by(|a, b| b.start.cmp(&a.start).then(b.id.cmp(&a.id)));
        out
    }

    /// Every reservation across all resources, by start.
    pub async fn all_reservations(&self, window: Option<Span>) -> Vec<ReservationInfo> {
        let mut out = Vec::new();
        for id in self.store.resource_ids() {
            let Some(rs) = self.get_resource(&id) else {
                continue;
            };
            let guard = rs.read().await;
            out.extend(
                guard
                    .reservations
                    .iter()
                    .filter(|r| in_window(window.as_ref(), r))
                    .map(|r| ReservationInfo::from_reservation(id, r)),
            );
        }
        out.sort_by(|a, b| a.start.cmp(&b.start).then(a.id.cmp(&b.id)));
        out
    }

    pub async fn get_session(&self, reservation_id: ReservationId) -> Option<SessionInfo> {
        let resource_id = self.store.resource_for_reservation(&reservation_id)?;
        let rs = self.get_resource(&resource_id)?;
        let guard = rs.read().await;
        let r = guard.reservation(reservation_id)?;
        Some(SessionInfo {
            id: r.session.id,
            reservation_id,
            unlock_code: r.session.unlock_code.clone(),
            status: r.session.status,
            unlocked_at: r.session.unlocked_at,
            locked_at: r.session.locked_at,
        })
    }

    /// Dashboard counters. "Today" is the UTC day containing `now`.
    pub async fn stats(&self, now: Ms) -> Stats {
        let day_start = now.div_euclid(DAY_MS) * DAY_MS;
        let today = Span {
            start: day_start,
            end: day_start + DAY_MS,
        };

        let mut live_reservations = 0;
        let mut reservations_today = 0;
        let mut total_resources = 0;
        for id in self.store.resource_ids() {
            let Some(rs) = self.get_resource(&id) else {
                continue;
            };
            total_resources += 1;
            let guard = rs.read().await;
            for r in &guard.reservations {
                if r.status.is_live() {
                    live_reservations += 1;
                }
                if today.contains_instant(r.span.start) {
                    reservations_today += 1;
                }
            }
        }
        Stats {
            total_resources,
            live_reservations,
            reservations_today,
        }
    }
}
