//! Hard limits applied per tenant. Requests beyond these fail with
//! `EngineError::LimitExceeded` instead of growing state without bound.

use crate::model::Ms;

pub const MAX_TENANTS: usize = 64;
pub const MAX_TENANT_NAME_LEN: usize = 128;

pub const MAX_RESOURCES_PER_TENANT: usize = 10_000;
pub const MAX_NAME_LEN: usize = 256;
pub const MAX_DESCRIPTION_LEN: usize = 1024;
pub const MAX_GROUP_NAME_LEN: usize = 64;
pub const MAX_UNLOCK_CODE_LEN: usize = 64;

/// Pending plus active reservations on a single resource.
pub const MAX_LIVE_RESERVATIONS_PER_RESOURCE: usize = 100_000;

/// 2000-01-01T00:00:00Z
pub const MIN_VALID_TIMESTAMP_MS: Ms = 946_684_800_000;
/// 2100-01-01T00:00:00Z
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

/// A single reservation may not exceed 31 days.
pub const MAX_SPAN_DURATION_MS: Ms = 31 * 24 * 3_600_000;

/// Length of generated unlock codes.
pub const UNLOCK_CODE_LEN: usize = 8;

/// Channels a single connection may LISTEN on at once.
pub const MAX_LISTENS_PER_CONNECTION: usize = 1024;
