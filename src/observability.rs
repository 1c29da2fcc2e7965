use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total statements executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "slotlock_queries_total";

/// Histogram: statement latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "slotlock_query_duration_seconds";

/// Counter: admission decisions. Labels: outcome (`accepted` or the error kind).
pub const ADMISSIONS_TOTAL: &str = "slotlock_admissions_total";

/// Counter: unlock attempts. Labels: outcome (`ok` / `rejected`).
pub const UNLOCK_ATTEMPTS_TOTAL: &str = "slotlock_unlock_attempts_total";

/// Counter: reservations completed by the sweeper.
pub const RESERVATIONS_SWEPT_TOTAL: &str = "slotlock_reservations_swept_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "slotlock_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "slotlock_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "slotlock_connections_rejected_total";

/// Gauge: number of active tenants (loaded engines).
pub const TENANTS_ACTIVE: &str = "slotlock_tenants_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "slotlock_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "slotlock_wal_flush_batch_size";

/// Install the Prometheus exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertResource { .. } => "insert_resource",
        Command::UpdateResource { .. } => "update_resource",
        Command::DeleteResource { .. } => "delete_resource",
        Command::InsertReservation { .. } => "insert_reservation",
        Command::CancelReservation { .. } => "cancel_reservation",
        Command::DeleteReservation { .. } => "delete_reservation",
        Command::UnlockSession { .. } => "unlock_session",
        Command::LockSessions { .. } => "lock_sessions",
        Command::SelectEligibility { .. } => "select_eligibility",
        Command::SelectResources { .. } => "select_resources",
        Command::SelectReservations { .. } => "select_reservations",
        Command::SelectSession { .. } => "select_session",
        Command::SelectStats => "select_stats",
        Command::Sweep => "sweep",
        Command::Listen { .. } => "listen",
        Command::Unlisten { .. } => "unlisten",
        Command::UnlistenAll => "unlisten_all",
    }
}
