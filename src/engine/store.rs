use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;

use crate::model::*;

use super::SharedResourceState;

/// Resource catalog plus the reservation indexes the engine needs:
/// reservation → resource, principal → reservations, and the id sequences.
pub struct InMemoryStore {
    resources: DashMap<ResourceId, SharedResourceState>,
    reservation_to_resource: DashMap<ReservationId, ResourceId>,
    by_principal: DashMap<PrincipalId, Vec<ReservationId>>,
    /// Pending and active reservations only; what quota counting walks.
    live_by_principal: DashMap<PrincipalId, Vec<ReservationId>>,
    next_reservation_id: AtomicI64,
    next_session_id: AtomicI64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            resources: DashMap::new(),
            reservation_to_resource: DashMap::new(),
            by_principal: DashMap::new(),
            live_by_principal: DashMap::new(),
            next_reservation_id: AtomicI64::new(1),
            next_session_id: AtomicI64::new(1),
        }
    }

    // ── Resource CRUD ────────────────────────────────────────

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn contains_resource(&self, id: &ResourceId) -> bool {
        self.resources.contains_key(id)
    }

    pub fn get_resource(&self, id: &ResourceId) -> Option<SharedResourceState> {
        self.resources.get(id).map(|e| e.value().clone())
    }

    pub fn insert_resource(&self, id: ResourceId, state: SharedResourceState) {
        self.resources.insert(id, state);
    }

    /// Drop a resource whose write lock the caller holds, unindexing its reservations.
    pub fn remove_resource(&self, rs: &ResourceState) {
        for r in &rs.reservations {
            self.unindex_reservation(r.id, r.principal_id);
        }
        self.resources.remove(&rs.id);
    }

    /// Replay-time removal: nobody else can hold the lock yet.
    pub fn remove_resource_now(&self, id: &ResourceId) {
        let Some(rs_arc) = self.get_resource(id) else {
            return;
        };
        match rs_arc.try_read() {
            Ok(guard) => self.remove_resource(&guard),
            Err(_) => {
                self.resources.remove(id);
            }
        }
    }

    pub fn resource_ids(&self) -> Vec<ResourceId> {
        let mut ids: Vec<ResourceId> = self.resources.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    // ── Reservation indexes ──────────────────────────────────

    pub fn resource_for_reservation(&self, id: &ReservationId) -> Option<ResourceId> {
        self.reservation_to_resource.get(id).map(|e| *e.value())
    }

    pub fn reservations_of(&self, principal_id: &PrincipalId) -> Vec<ReservationId> {
        self.by_principal
            .get(principal_id)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    pub fn live_reservations_of(&self, principal_id: &PrincipalId) -> Vec<ReservationId> {
        self.live_by_principal
            .get(principal_id)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    fn index_reservation(&self, id: ReservationId, resource_id: ResourceId, principal_id: PrincipalId) {
        self.reservation_to_resource.insert(id, resource_id);
        self.by_principal.entry(principal_id).or_default().push(id);
        self.live_by_principal.entry(principal_id).or_default().push(id);
    }

    fn unindex_reservation(&self, id: ReservationId, principal_id: PrincipalId) {
        self.reservation_to_resource.remove(&id);
        remove_id(&self.by_principal, principal_id, id);
        remove_id(&self.live_by_principal, principal_id, id);
    }

    /// A reservation went terminal: it no longer counts toward quota.
    fn retire_reservation(&self, id: ReservationId, principal_id: PrincipalId) {
        remove_id(&self.live_by_principal, principal_id, id);
    }

    // ── Id sequences ─────────────────────────────────────────

    /// Hand out the next reservation and session ids. Ids burned by a failed
    /// WAL write are skipped, never reused.
    pub fn allocate_ids(&self) -> (ReservationId, SessionId) {
        (
            self.next_reservation_id.fetch_add(1, Ordering::AcqRel),
            self.next_session_id.fetch_add(1, Ordering::AcqRel),
        )
    }

    pub fn advance_sequence(&self, next_reservation_id: ReservationId, next_session_id: SessionId) {
        self.next_reservation_id.fetch_max(next_reservation_id, Ordering::AcqRel);
        self.next_session_id.fetch_max(next_session_id, Ordering::AcqRel);
    }

    pub fn sequence(&self) -> (ReservationId, SessionId) {
        (
            self.next_reservation_id.load(Ordering::Acquire),
            self.next_session_id.load(Ordering::Acquire),
        )
    }

    // ── Event application ────────────────────────────────────

    /// Apply a resource-scoped event. The caller holds the resource's write lock.
    pub fn apply_event(&self, rs: &mut ResourceState, event: &Event) {
        match event {
            Event::ReservationAdmitted {
                id,
                session_id,
                resource_id,
                principal_id,
                span,
                unlock_code,
                created_at,
            } => {
                rs.insert_reservation(Reservation {
                    id: *id,
                    principal_id: *principal_id,
                    span: *span,
                    status: ReservationStatus::Pending,
                    created_at: *created_at,
                    session: Session {
                        id: *session_id,
                        unlock_code: unlock_code.clone(),
                        status: SessionStatus::Locked,
                        unlocked_at: None,
                        locked_at: None,
                    },
                });
                self.index_reservation(*id, *resource_id, *principal_id);
                self.advance_sequence(id + 1, session_id + 1);
            }
            Event::ReservationActivated { id, .. } => {
                if let Some(r) = rs.reservation_mut(*id)
                    && r.status == ReservationStatus::Pending
                {
                    r.status = ReservationStatus::Active;
                }
            }
            Event::SessionUnlocked { reservation_id, at, .. } => {
                if let Some(r) = rs.reservation_mut(*reservation_id) {
                    r.session.status = SessionStatus::Unlocked;
                    r.session.unlocked_at = Some(*at);
                }
            }
            Event::ReservationCompleted { id, at, .. } => {
                if let Some(r) = rs.reservation_mut(*id)
                    && r.status.is_live()
                {
                    r.status = ReservationStatus::Completed;
                    r.session.status = SessionStatus::Locked;
                    r.session.locked_at.get_or_insert(*at);
                    self.retire_reservation(r.id, r.principal_id);
                }
            }
            Event::ReservationCancelled { id, .. } => {
                if let Some(r) = rs.reservation_mut(*id)
                    && r.status.is_live()
                {
                    r.status = ReservationStatus::Cancelled;
                    self.retire_reservation(r.id, r.principal_id);
                }
            }
            Event::ReservationPurged { id, .. } => {
                if let Some(r) = rs.remove_reservation(*id) {
                    self.unindex_reservation(r.id, r.principal_id);
                }
            }
            Event::ResourceUpdated {
                name,
                description,
                location,
                ..
            } => {
                rs.name = name.clone();
                rs.description = description.clone();
                rs.location = location.clone();
            }
            // Handled at the map level, not here
            Event::ResourceCreated { .. }
            | Event::ResourceDeleted { .. }
            | Event::SequenceAdvanced { .. } => {}
        }
    }
}

/// Drops the principal's entry once its last id is gone.
fn remove_id(index: &DashMap<PrincipalId, Vec<ReservationId>>, principal_id: PrincipalId, id: ReservationId) {
    if let Some(mut ids) = index.get_mut(&principal_id) {
        ids.retain(|r| *r != id);
    }
    index.remove_if(&principal_id, |_, ids| ids.is_empty());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    fn admitted(id: ReservationId, principal_id: PrincipalId, start: Ms, end: Ms) -> Event {
        Event::ReservationAdmitted {
            id,
            session_id: id + 100,
            resource_id: 1,
            principal_id,
            span: Span::new(start, end),
            unlock_code: "ABC12345".into(),
            created_at: 0,
        }
    }

    #[test]
    fn admitted_event_creates_reservation_and_session() {
        let store = InMemoryStore::new();
        let mut rs = ResourceState::new(1, "PC-01".into(), None, None);
        store.apply_event(&mut rs, &admitted(5, 9, 100, 200));

        let r = rs.reservation(5).unwrap();
        assert_eq!(r.status, ReservationStatus::Pending);
        assert_eq!(r.session.id, 105);
        assert_eq!(r.session.status, SessionStatus::Locked);
        assert_eq!(store.resource_for_reservation(&5), Some(1));
        assert_eq!(store.reservations_of(&9), vec![5]);
        assert_eq!(store.sequence(), (6, 106));
    }

    #[test]
    fn completed_locks_session_once() {
        let store = InMemoryStore::new();
        let mut rs = ResourceState::new(1, "PC-01".into(), None, None);
        store.apply_event(&mut rs, &admitted(1, 9, 100, 200));
        store.apply_event(&mut rs, &Event::ReservationActivated { id: 1, resource_id: 1 });
        store.apply_event(&mut rs, &Event::SessionUnlocked { reservation_id: 1, resource_id: 1, at: 120 });
        store.apply_event(&mut rs, &Event::ReservationCompleted { id: 1, resource_id: 1, at: 200 });
        store.apply_event(&mut rs, &Event::ReservationCompleted { id: 1, resource_id: 1, at: 300 });

        let r = rs.reservation(1).unwrap();
        assert_eq!(r.status, ReservationStatus::Completed);
        assert_eq!(r.session.status, SessionStatus::Locked);
        assert_eq!(r.session.unlocked_at, Some(120));
        assert_eq!(r.session.locked_at, Some(200));
    }

    #[test]
    fn terminal_reservations_do_not_transition() {
        let store = InMemoryStore::new();
        let mut rs = ResourceState::new(1, "PC-01".into(), None, None);
        store.apply_event(&mut rs, &admitted(1, 9, 100, 200));
        store.apply_event(&mut rs, &Event::ReservationCancelled { id: 1, resource_id: 1 });
        store.apply_event(&mut rs, &Event::ReservationActivated { id: 1, resource_id: 1 });
        store.apply_event(&mut rs, &Event::ReservationCompleted { id: 1, resource_id: 1, at: 300 });

        let r = rs.reservation(1).unwrap();
        assert_eq!(r.status, ReservationStatus::Cancelled);
        assert_eq!(r.session.locked_at, None);
    }

    #[test]
    fn purge_unindexes() {
        let store = InMemoryStore::new();
        let mut rs = ResourceState::new(1, "PC-01".into(), None, None);
        store.apply_event(&mut rs, &admitted(1, 9, 100, 200));
        store.apply_event(&mut rs, &admitted(2, 9, 200, 300));
        store.apply_event(&mut rs, &Event::ReservationPurged { id: 1, resource_id: 1 });

        assert!(rs.reservation(1).is_none());
        assert_eq!(store.resource_for_reservation(&1), None);
        assert_eq!(store.reservations_of(&9), vec![2]);
    }

    #[test]
    fn terminal_reservations_leave_live_index() {
        let store = InMemoryStore::new();
        let mut rs = ResourceState::new(1, "PC-01".into(), None, None);
        store.apply_event(&mut rs, &admitted(1, 9, 100, 200));
        store.apply_event(&mut rs, &admitted(2, 9, 200, 300));
        store.apply_event(&mut rs, &admitted(3, 9, 300, 400));
        store.apply_event(&mut rs, &Event::ReservationCompleted { id: 1, resource_id: 1, at: 200 });
        store.apply_event(&mut rs, &Event::ReservationCancelled { id: 2, resource_id: 1 });

        assert_eq!(store.live_reservations_of(&9), vec![3]);
        // History stays listable.
        assert_eq!(store.reservations_of(&9), vec![1, 2, 3]);

        store.apply_event(&mut rs, &Event::ReservationPurged { id: 3, resource_id: 1 });
        assert!(store.live_reservations_of(&9).is_empty());
        assert!(!store.live_by_principal.contains_key(&9));
    }

    #[test]
    fn remove_resource_unindexes_its_reservations() {
        let store = InMemoryStore::new();
        let mut rs = ResourceState::new(1, "PC-01".into(), None, None);
        store.apply_event(&mut rs, &admitted(1, 9, 100, 200));
        store.insert_resource(1, Arc::new(RwLock::new(rs.clone())));

        store.remove_resource(&rs);
        assert!(!store.contains_resource(&1));
        assert_eq!(store.resource_for_reservation(&1), None);
        assert!(store.reservations_of(&9).is_empty());
        assert!(store.live_reservations_of(&9).is_empty());
    }

    #[test]
    fn allocate_ids_is_monotonic() {
        let store = InMemoryStore::new();
        assert_eq!(store.allocate_ids(), (1, 1));
        assert_eq!(store.allocate_ids(), (2, 2));
        store.advance_sequence(10, 4);
        assert_eq!(store.allocate_ids(), (10, 4));
        store.advance_sequence(5, 5);
        assert_eq!(store.sequence(), (11, 5));
    }
}
