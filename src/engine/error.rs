use crate::model::{Ms, ReservationId, ResourceId};

#[derive(Debug)]
pub enum EngineError {
    ResourceNotFound(ResourceId),
    /// Overlaps a live reservation on the same resource.
    SlotConflict(ReservationId),
    /// The principal's group allows this many overlapping reservations.
    QuotaExceeded(u32),
    InvalidCodeOrWindow,
    NotFound(ReservationId),
    NotOwner(ReservationId),
    AlreadyCompleted(ReservationId),
    AlreadyExists(ResourceId),
    InvalidSpan { start: Ms, end: Ms },
    LimitExceeded(&'static str),
    StorageFailure(String),
}

impl EngineError {
    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::ResourceNotFound(_) => "resource_not_found",
            EngineError::SlotConflict(_) => "slot_conflict",
            EngineError::QuotaExceeded(_) => "quota_exceeded",
            EngineError::InvalidCodeOrWindow => "invalid_code_or_window",
            EngineError::NotFound(_) => "not_found",
            EngineError::NotOwner(_) => "not_owner",
            EngineError::AlreadyCompleted(_) => "already_completed",
            EngineError::AlreadyExists(_) => "already_exists",
            EngineError::InvalidSpan { .. } => "invalid_span",
            EngineError::LimitExceeded(_) => "limit_exceeded",
            EngineError::StorageFailure(_) => "storage_failure",
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::ResourceNotFound(id) => write!(f, "resource not found: {id}"),
            EngineError::SlotConflict(id) => {
                write!(f, "slot conflict: overlaps reservation {id}")
            }
            EngineError::QuotaExceeded(max) => {
                write!(f, "quota exceeded: at most {max} concurrent reservation(s) allowed")
            }
            EngineError::InvalidCodeOrWindow => {
                write!(f, "invalid unlock code or reservation not in its active window")
            }
            EngineError::NotFound(id) => write!(f, "reservation not found: {id}"),
            EngineError::NotOwner(id) => {
                write!(f, "reservation {id} belongs to another principal")
            }
            EngineError::AlreadyCompleted(id) => {
                write!(f, "reservation {id} is already completed")
            }
            EngineError::AlreadyExists(id) => write!(f, "resource already exists: {id}"),
            EngineError::InvalidSpan { start, end } => {
                write!(f, "invalid interval [{start}, {end}): start must be before end")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::StorageFailure(e) => write!(f, "storage failure: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
