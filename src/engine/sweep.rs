use tracing::info;

use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    /// Complete every live reservation on `rs` whose end has passed, forcing
    /// its session to locked. The caller holds the resource's write lock.
    pub(super) async fn complete_expired(&self, rs: &mut ResourceState, now: Ms) -> Result<usize, EngineError> {
        let expired = rs.expired_ids(now);
        let resource_id = rs.id;
        for id in &expired {
            let event = Event::ReservationCompleted {
                id: *id,
                resource_id,
                at: now,
            };
            self.persist_and_apply(resource_id, rs, &event).await?;
        }
        Ok(expired.len())
    }

    /// Advance every time-lapsed reservation to `completed`. Safe to run at any
    /// cadence and concurrently with everything else; a second run at the same
    /// `now` finds nothing to do.
    pub async fn sweep(&self, now: Ms) -> Result<usize, EngineError> {
        let mut completed = 0;
        for resource_id in self.store.resource_ids() {
            let Ok(mut guard) = self.resource_write(resource_id).await else {
                continue; // deleted since we listed it
            };
            completed += self.complete_expired(&mut guard, now).await?;
        }
        if completed > 0 {
            info!("sweep completed {completed} reservation(s)");
            metrics::counter!(crate::observability::RESERVATIONS_SWEPT_TOTAL).increment(completed as u64);
        }
        Ok(completed)
    }
}
