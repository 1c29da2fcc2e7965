mod conflict;
mod error;
mod mutations;
mod queries;
mod session;
mod store;
mod sweep;

pub use conflict::validate_span;
pub use error::EngineError;
pub use store::InMemoryStore;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex, RwLock};

use crate::codes::CodeGenerator;
use crate::config::EngineConfig;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedResourceState = Arc<RwLock<ResourceState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            commit_batch(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                if !batch.is_empty() {
                    commit_batch(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    respond_batch(batch, &result);
}

fn flush_batch(wal: &mut Wal, batch: &mut [(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush, even on append error, so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn respond_batch(batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        // Appends never reach here: the writer loop batches them.
        WalCommand::Append { response, .. } => {
            let _ = response.send(Err(io::Error::other("append routed outside batch")));
        }
    }
}

/// One tenant's reservation engine: registry, reservation store, conflict
/// checks and session state machine, all persisted through the WAL.
pub struct Engine {
    pub(super) store: InMemoryStore,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    pub(super) config: EngineConfig,
    pub(super) codes: Arc<dyn CodeGenerator>,
    /// Serializes admissions per principal so quota counts cannot race.
    pub(super) principal_locks: dashmap::DashMap<PrincipalId, Arc<Mutex<()>>>,
}

impl Engine {
    pub fn new(
        wal_path: PathBuf,
        notify: Arc<NotifyHub>,
        config: EngineConfig,
        codes: Arc<dyn CodeGenerator>,
    ) -> io::Result<Self> {
        let (wal, events) = Wal::recover(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            store: InMemoryStore::new(),
            wal_tx,
            notify,
            config,
            codes,
            principal_locks: dashmap::DashMap::new(),
        };

        // Replay events. We're the sole owner of these Arcs, so try_write always
        // succeeds instantly. Never use blocking_write here because this may run
        // inside an async context (e.g. lazy tenant creation).
        for event in &events {
            match event {
                Event::ResourceCreated { id, name, description, location } => {
                    let rs = ResourceState::new(*id, name.clone(), description.clone(), location.clone());
                    engine.store.insert_resource(*id, Arc::new(RwLock::new(rs)));
                }
                Event::ResourceDeleted { id } => {
                    engine.store.remove_resource_now(id);
                }
                Event::SequenceAdvanced { next_reservation_id, next_session_id } => {
                    engine.store.advance_sequence(*next_reservation_id, *next_session_id);
                }
                other => {
                    if let Some(resource_id) = event_resource_id(other)
                        && let Some(rs_arc) = engine.store.get_resource(&resource_id)
                        && let Ok(mut guard) = rs_arc.try_write()
                    {
                        engine.store.apply_event(&mut guard, other);
                    }
                }
            }
        }

        if !events.is_empty() {
            tracing::info!(
                "replayed {} events ({} resources)",
                events.len(),
                engine.store.resource_count()
            );
        }

        Ok(engine)
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::StorageFailure("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::StorageFailure("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::StorageFailure(e.to_string()))
    }

    pub fn get_resource(&self, id: &ResourceId) -> Option<SharedResourceState> {
        self.store.get_resource(id)
    }

    pub fn resource_exists(&self, id: &ResourceId) -> bool {
        self.store.contains_resource(id)
    }

    /// WAL-append + apply + notify in one call.
    pub(super) async fn persist_and_apply(
        &self,
        resource_id: ResourceId,
        rs: &mut ResourceState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.store.apply_event(rs, event);
        self.notify.send(resource_id, event);
        Ok(())
    }

    /// Lookup reservation → resource, get resource, acquire write lock.
    pub(super) async fn resolve_reservation_write(
        &self,
        reservation_id: &ReservationId,
    ) -> Result<(ResourceId, tokio::sync::OwnedRwLockWriteGuard<ResourceState>), EngineError> {
        let resource_id = self
            .store
            .resource_for_reservation(reservation_id)
            .ok_or(EngineError::NotFound(*reservation_id))?;
        let rs = self
            .get_resource(&resource_id)
            .ok_or(EngineError::NotFound(*reservation_id))?;
        let guard = rs.write_owned().await;
        if guard.reservation(*reservation_id).is_none() {
            return Err(EngineError::NotFound(*reservation_id));
        }
        Ok((resource_id, guard))
    }

    /// Get a resource and acquire its write lock.
    pub(super) async fn resource_write(
        &self,
        resource_id: ResourceId,
    ) -> Result<tokio::sync::OwnedRwLockWriteGuard<ResourceState>, EngineError> {
        let rs = self
            .get_resource(&resource_id)
            .ok_or(EngineError::ResourceNotFound(resource_id))?;
        let guard = rs.write_owned().await;
        // Deleted while we waited for the lock.
        if !self.store.contains_resource(&resource_id) {
            return Err(EngineError::ResourceNotFound(resource_id));
        }
        Ok(guard)
    }

    pub(super) fn principal_lock(&self, principal_id: PrincipalId) -> Arc<Mutex<()>> {
        self.principal_locks
            .entry(principal_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Forget the principal's admission mutex unless another admission holds
    /// or waits on it. Clones are only made under the map's shard lock, so a
    /// count of one here means nobody else can reach it.
    pub(super) fn release_principal_lock(&self, principal_id: PrincipalId) {
        self.principal_locks
            .remove_if(&principal_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Extract the resource id from a resource-scoped event.
fn event_resource_id(event: &Event) -> Option<ResourceId> {
    match event {
        Event::ReservationAdmitted { resource_id, .. }
        | Event::ReservationActivated { resource_id, .. }
        | Event::SessionUnlocked { resource_id, .. }
        | Event::ReservationCompleted { resource_id, .. }
        | Event::ReservationCancelled { resource_id, .. }
        | Event::ReservationPurged { resource_id, .. } => Some(*resource_id),
        Event::ResourceUpdated { id, .. } => Some(*id),
        Event::ResourceCreated { .. }
        | Event::ResourceDeleted { .. }
        | Event::SequenceAdvanced { .. } => None,
    }
}
