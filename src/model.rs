use serde::{Deserialize, Serialize};

/// Unix milliseconds. The only time type.
pub type Ms = i64;

pub type ResourceId = i64;
pub type ReservationId = i64;
pub type SessionId = i64;
pub type PrincipalId = i64;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    /// Back-to-back spans (one ends where the other starts) do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReservationStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    /// Pending and active reservations hold their slot.
    pub fn is_live(self) -> bool {
        matches!(self, ReservationStatus::Pending | ReservationStatus::Active)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_live()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Active => "active",
            ReservationStatus::Completed => "completed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Locked,
    Unlocked,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Locked => "locked",
            SessionStatus::Unlocked => "unlocked",
        }
    }
}

/// An authenticated caller as supplied by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub group: String,
}

impl Principal {
    pub fn new(id: PrincipalId, group: impl Into<String>) -> Self {
        Self { id, group: group.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub unlock_code: String,
    pub status: SessionStatus,
    pub unlocked_at: Option<Ms>,
    pub locked_at: Option<Ms>,
}

/// A reservation together with the session it owns. They are created by the
/// same event and removed together, so one never exists without the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub id: ReservationId,
    pub principal_id: PrincipalId,
    pub span: Span,
    pub status: ReservationStatus,
    pub created_at: Ms,
    pub session: Session,
}

impl Reservation {
    /// Live and past its end: the sweeper completes it.
    pub fn is_expired(&self, now: Ms) -> bool {
        self.status.is_live() && self.span.end <= now
    }
}

#[derive(Debug, Clone)]
pub struct ResourceState {
    pub id: ResourceId,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    /// All reservations on this resource, sorted by `span.start`.
    pub reservations: Vec<Reservation>,
}

impl ResourceState {
    pub fn new(
        id: ResourceId,
        name: String,
        description: Option<String>,
        location: Option<String>,
    ) -> Self {
        Self {
            id,
            name,
            description,
            location,
            reservations: Vec::new(),
        }
    }

    /// Insert reservation maintaining sort order by span.start.
    pub fn insert_reservation(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .binary_search_by_key(&reservation.span.start, |r| r.span.start)
            .unwrap_or_else(|e| e);
        self.reservations.insert(pos, reservation);
    }

    /// Remove reservation by id.
    pub fn remove_reservation(&mut self, id: ReservationId) -> Option<Reservation> {
        let pos = self.reservations.iter().position(|r| r.id == id)?;
        Some(self.reservations.remove(pos))
    }

    pub fn reservation(&self, id: ReservationId) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == id)
    }

    pub fn reservation_mut(&mut self, id: ReservationId) -> Option<&mut Reservation> {
        self.reservations.iter_mut().find(|r| r.id == id)
    }

    /// Return only reservations whose span overlaps the query window.
    /// Uses binary search to skip reservations starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Reservation> {
        let right_bound = self
            .reservations
            .partition_point(|r| r.span.start < query.end);
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| r.span.end > query.start)
    }

    /// Live reservations overlapping `query`.
    pub fn live_overlapping(&self, query: &Span) -> impl Iterator<Item = &Reservation> {
        self.overlapping(query).filter(|r| r.status.is_live())
    }

    pub fn live_count(&self) -> usize {
        self.reservations.iter().filter(|r| r.status.is_live()).count()
    }

    /// Ids of live reservations whose end has passed.
    pub fn expired_ids(&self, now: Ms) -> Vec<ReservationId> {
        self.reservations
            .iter()
            .filter(|r| r.is_expired(now))
            .map(|r| r.id)
            .collect()
    }
}

/// The event types, flat with no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ResourceCreated {
        id: ResourceId,
        name: String,
        description: Option<String>,
        location: Option<String>,
    },
    ResourceUpdated {
        id: ResourceId,
        name: String,
        description: Option<String>,
        location: Option<String>,
    },
    ResourceDeleted {
        id: ResourceId,
    },
    /// Creates the reservation (pending) and its session (locked) together.
    ReservationAdmitted {
        id: ReservationId,
        session_id: SessionId,
        resource_id: ResourceId,
        principal_id: PrincipalId,
        span: Span,
        unlock_code: String,
        created_at: Ms,
    },
    ReservationActivated {
        id: ReservationId,
        resource_id: ResourceId,
    },
    SessionUnlocked {
        reservation_id: ReservationId,
        resource_id: ResourceId,
        at: Ms,
    },
    /// Reservation becomes completed; its session is forced to locked.
    ReservationCompleted {
        id: ReservationId,
        resource_id: ResourceId,
        at: Ms,
    },
    ReservationCancelled {
        id: ReservationId,
        resource_id: ResourceId,
    },
    ReservationPurged {
        id: ReservationId,
        resource_id: ResourceId,
    },
    /// Id high-water marks, so ids are never reused after compaction.
    SequenceAdvanced {
        next_reservation_id: ReservationId,
        next_session_id: SessionId,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceInfo {
    pub id: ResourceId,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceStatus {
    pub resource: ResourceInfo,
    pub is_currently_booked: bool,
    pub is_currently_in_use: bool,
    pub is_booked_future: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationInfo {
    pub id: ReservationId,
    pub resource_id: ResourceId,
    pub principal_id: PrincipalId,
    pub start: Ms,
    pub end: Ms,
    pub status: ReservationStatus,
    pub created_at: Ms,
}

impl ReservationInfo {
    pub fn from_reservation(resource_id: ResourceId, r: &Reservation) -> Self {
        Self {
            id: r.id,
            resource_id,
            principal_id: r.principal_id,
            start: r.span.start,
            end: r.span.end,
            status: r.status,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub reservation_id: ReservationId,
    pub unlock_code: String,
    pub status: SessionStatus,
    pub unlocked_at: Option<Ms>,
    pub locked_at: Option<Ms>,
}

/// Result of an eligibility check. `eligible` is the "should unlock" signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Eligibility {
    pub eligible: bool,
    pub reservation: Option<ReservationInfo>,
    pub unlock_code: Option<String>,
}

impl Eligibility {
    pub fn none() -> Self {
        Self {
            eligible: false,
            reservation: None,
            unlock_code: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Admission {
    pub reservation_id: ReservationId,
    pub session_id: SessionId,
    pub unlock_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total_resources: usize,
    pub live_reservations: usize,
    pub reservations_today: usize,
}
