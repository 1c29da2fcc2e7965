use std::collections::HashMap;
use std::fmt::Debug;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use futures::{stream, Sink, SinkExt};
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::response::NotificationResponse;
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::debug;

use crate::auth::SlotlockAuthSource;
use crate::clock::Clock;
use crate::engine::{validate_span, Engine};
use crate::limits::MAX_LISTENS_PER_CONNECTION;
use crate::model::*;
use crate::notify;
use crate::observability;
use crate::sql::{self, Command, ReservationFilter};
use crate::tenant::TenantManager;

/// LISTEN state of one connection. Events queue in the broadcast receivers
/// and are flushed to the client after its next statement.
struct Listener {
    pid: i32,
    subscriptions: HashMap<ResourceId, broadcast::Receiver<Event>>,
}

pub struct SlotlockHandler {
    tenant_manager: Arc<TenantManager>,
    query_parser: Arc<SlotlockQueryParser>,
    clock: Arc<dyn Clock>,
    listeners: DashMap<SocketAddr, Listener>,
    next_pid: AtomicI32,
}

impl SlotlockHandler {
    pub fn new(tenant_manager: Arc<TenantManager>, clock: Arc<dyn Clock>) -> Self {
        Self {
            tenant_manager,
            query_parser: Arc::new(SlotlockQueryParser),
            clock,
            listeners: DashMap::new(),
            next_pid: AtomicI32::new(1),
        }
    }

    fn resolve_engine<C: ClientInfo>(&self, client: &C) -> PgWireResult<Arc<Engine>> {
        let db = client
            .metadata()
            .get("database")
            .cloned()
            .unwrap_or_else(|| "default".to_string());
        self.tenant_manager.get_or_create(&db).map_err(|e| {
            PgWireError::UserError(Box::new(ErrorInfo::new(
                "ERROR".into(),
                "08006".into(),
                format!("tenant error: {e}"),
            )))
        })
    }

    /// Parse, execute and time one statement, then flush pending notifications.
    async fn run_statement<C>(&self, client: &mut C, query: &str) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        let label = observability::command_label(&cmd);
        let started = std::time::Instant::now();

        let result = self.execute_command(&engine, client.socket_addr(), cmd).await;

        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status).increment(1);
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());

        for message in self.drain_notifications(&client.socket_addr()) {
            client
                .send(PgWireBackendMessage::NotificationResponse(message))
                .await?;
        }
        result
    }

    async fn execute_command(
        &self,
        engine: &Engine,
        peer: SocketAddr,
        cmd: Command,
    ) -> PgWireResult<Vec<Response>> {
        let now = self.clock.now();
        match cmd {
            Command::InsertResource {
                id,
                name,
                description,
                location,
            } => {
                engine
                    .create_resource(id, name, description, location)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::UpdateResource {
                id,
                name,
                description,
                location,
            } => {
                let current = engine
                    .resource_info(id)
                    .await
                    .ok_or_else(|| engine_err(crate::engine::EngineError::ResourceNotFound(id)))?;
                engine
                    .update_resource(
                        id,
                        name.unwrap_or(current.name),
                        description.unwrap_or(current.description),
                        location.unwrap_or(current.location),
                    )
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::DeleteResource { id } => {
                engine.delete_resource(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::InsertReservation {
                resource_id,
                principal_id,
                group,
                start,
                end,
            } => {
                let span = Span { start, end };
                let principal = Principal::new(principal_id, group);
                let admission = engine
                    .admit(resource_id, &principal, span, now)
                    .await
                    .map_err(engine_err)?;
                let schema = Arc::new(admission_schema());
                let mut encoder = DataRowEncoder::new(schema.clone());
                encoder.encode_field(&admission.reservation_id)?;
                encoder.encode_field(&admission.session_id)?;
                encoder.encode_field(&admission.unlock_code)?;
                let rows: Vec<PgWireResult<_>> = vec![Ok(encoder.take_row())];
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::CancelReservation { id, principal_id } => {
                engine.cancel(id, principal_id, now).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::DeleteReservation { id } => {
                engine.purge_reservation(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::UnlockSession { resource_id, code } => {
                engine.unlock(resource_id, &code, now).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::LockSessions { resource_id } => {
                let locked = engine.lock(resource_id, now).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(locked))])
            }
            Command::SelectEligibility { resource_id } => {
                let eligibility = engine
                    .check_eligibility(resource_id, now)
                    .await
                    .map_err(engine_err)?;
                let schema = Arc::new(eligibility_schema());
                let mut encoder = DataRowEncoder::new(schema.clone());
                let r = eligibility.reservation.as_ref();
                encoder.encode_field(&eligibility.eligible)?;
                encoder.encode_field(&r.map(|r| r.id))?;
                encoder.encode_field(&r.map(|r| r.principal_id))?;
                encoder.encode_field(&r.map(|r| r.start))?;
                encoder.encode_field(&r.map(|r| r.end))?;
                encoder.encode_field(&eligibility.unlock_code)?;
                let rows: Vec<PgWireResult<_>> = vec![Ok(encoder.take_row())];
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::SelectResources { id } => {
                let mut statuses = engine.list_resources(now).await.map_err(engine_err)?;
                if let Some(id) = id {
                    statuses.retain(|s| s.resource.id == id);
                }
                let schema = Arc::new(resources_schema());
                let rows: Vec<PgWireResult<_>> = statuses
                    .into_iter()
                    .map(|s| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&s.resource.id)?;
                        encoder.encode_field(&s.resource.name)?;
                        encoder.encode_field(&s.resource.description)?;
                        encoder.encode_field(&s.resource.location)?;
                        encoder.encode_field(&s.is_currently_booked)?;
                        encoder.encode_field(&s.is_currently_in_use)?;
                        encoder.encode_field(&s.is_booked_future)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::SelectReservations { filter, window } => {
                let window = match window {
                    Some((start, end)) => {
                        let span = Span { start, end };
                        validate_span(&span).map_err(engine_err)?;
                        Some(span)
                    }
                    None => None,
                };
                let reservations = match filter {
                    ReservationFilter::Resource(rid) => engine
                        .reservations_for_resource(rid, window)
                        .await
                        .map_err(engine_err)?,
                    ReservationFilter::Principal(pid) => {
                        let mut out = engine.reservations_for_principal(pid).await;
                        if let Some(w) = window {
                            out.retain(|r| w.contains_span(&Span { start: r.start, end: r.end }));
                        }
                        out
                    }
                    ReservationFilter::All => engine.all_reservations(window).await,
                };
                let schema = Arc::new(reservations_schema());
                let rows: Vec<PgWireResult<_>> = reservations
                    .into_iter()
                    .map(|r| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&r.id)?;
                        encoder.encode_field(&r.resource_id)?;
                        encoder.encode_field(&r.principal_id)?;
                        encoder.encode_field(&r.start)?;
                        encoder.encode_field(&r.end)?;
                        encoder.encode_field(&r.status.as_str().to_string())?;
                        encoder.encode_field(&r.created_at)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::SelectSession { reservation_id } => {
                let schema = Arc::new(sessions_schema());
                let rows: Vec<PgWireResult<_>> = engine
                    .get_session(reservation_id)
                    .await
                    .into_iter()
                    .map(|s| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&s.id)?;
                        encoder.encode_field(&s.reservation_id)?;
                        encoder.encode_field(&s.unlock_code)?;
                        encoder.encode_field(&s.status.as_str().to_string())?;
                        encoder.encode_field(&s.unlocked_at)?;
                        encoder.encode_field(&s.locked_at)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::SelectStats => {
                let stats = engine.stats(now).await;
                let schema = Arc::new(stats_schema());
                let mut encoder = DataRowEncoder::new(schema.clone());
                encoder.encode_field(&(stats.total_resources as i64))?;
                encoder.encode_field(&(stats.live_reservations as i64))?;
                encoder.encode_field(&(stats.reservations_today as i64))?;
                let rows: Vec<PgWireResult<_>> = vec![Ok(encoder.take_row())];
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::Sweep => {
                let swept = engine.sweep(now).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(swept))])
            }
            Command::Listen { channel } => {
                let resource_id = notify::parse_channel(&channel).ok_or_else(|| {
                    PgWireError::UserError(Box::new(ErrorInfo::new(
                        "ERROR".into(),
                        "42000".into(),
                        format!("invalid channel: {channel} (expected resource_{{id}})"),
                    )))
                })?;
                if !engine.resource_exists(&resource_id) {
                    return Err(engine_err(crate::engine::EngineError::ResourceNotFound(resource_id)));
                }
                self.listen(peer, engine, resource_id)?;
                Ok(vec![Response::Execution(Tag::new("LISTEN"))])
            }
            Command::Unlisten { channel } => {
                if let Some(resource_id) = notify::parse_channel(&channel)
                    && let Some(mut listener) = self.listeners.get_mut(&peer)
                {
                    listener.subscriptions.remove(&resource_id);
                }
                Ok(vec![Response::Execution(Tag::new("UNLISTEN"))])
            }
            Command::UnlistenAll => {
                self.listeners.remove(&peer);
                Ok(vec![Response::Execution(Tag::new("UNLISTEN"))])
            }
        }
    }

    /// Subscribe `peer` to a resource channel. Listening twice is a no-op.
    fn listen(&self, peer: SocketAddr, engine: &Engine, resource_id: ResourceId) -> PgWireResult<()> {
        let mut listener = self.listeners.entry(peer).or_insert_with(|| Listener {
            pid: self.next_pid.fetch_add(1, Ordering::Relaxed),
            subscriptions: HashMap::new(),
        });
        if listener.subscriptions.contains_key(&resource_id) {
            return Ok(());
        }
        if listener.subscriptions.len() >= MAX_LISTENS_PER_CONNECTION {
            return Err(engine_err(crate::engine::EngineError::LimitExceeded(
                "too many LISTEN channels on this connection",
            )));
        }
        listener
            .subscriptions
            .insert(resource_id, engine.notify.subscribe(resource_id));
        Ok(())
    }

    /// Take every queued event for `peer`. Channels whose resource was deleted
    /// are dropped once their last event has been delivered.
    fn drain_notifications(&self, peer: &SocketAddr) -> Vec<NotificationResponse> {
        let Some(mut listener) = self.listeners.get_mut(peer) else {
            return Vec::new();
        };
        let pid = listener.pid;
        let mut out = Vec::new();
        let mut closed = Vec::new();
        for (resource_id, rx) in listener.subscriptions.iter_mut() {
            loop {
                match rx.try_recv() {
                    Ok(event) => out.push(NotificationResponse::new(
                        pid,
                        notify::channel_name(*resource_id),
                        notify::payload(&event),
                    )),
                    Err(broadcast::error::TryRecvError::Lagged(n)) => {
                        debug!("listener {peer} lagged, dropped {n} event(s) on resource {resource_id}");
                    }
                    Err(broadcast::error::TryRecvError::Closed) => {
                        closed.push(*resource_id);
                        break;
                    }
                    Err(broadcast::error::TryRecvError::Empty) => break,
                }
            }
        }
        for resource_id in closed {
            listener.subscriptions.remove(&resource_id);
        }
        out
    }

    /// Forget all LISTEN state of a closed connection.
    pub fn disconnect(&self, peer: &SocketAddr) {
        self.listeners.remove(peer);
    }

    pub fn listening_connections(&self) -> usize {
        self.listeners.len()
    }
}

// ── Result schemas ───────────────────────────────────────────────

fn int8(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::INT8, FieldFormat::Text)
}

fn varchar(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::VARCHAR, FieldFormat::Text)
}

fn boolean(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::BOOL, FieldFormat::Text)
}

fn resources_schema() -> Vec<FieldInfo> {
    vec![
        int8("id"),
        varchar("name"),
        varchar("description"),
        varchar("location"),
        boolean("is_currently_booked"),
        boolean("is_currently_in_use"),
        boolean("is_booked_future"),
    ]
}

fn reservations_schema() -> Vec<FieldInfo> {
    vec![
        int8("id"),
        int8("resource_id"),
        int8("principal_id"),
        int8("start"),
        int8("end"),
        varchar("status"),
        int8("created_at"),
    ]
}

fn sessions_schema() -> Vec<FieldInfo> {
    vec![
        int8("id"),
        int8("reservation_id"),
        varchar("unlock_code"),
        varchar("status"),
        int8("unlocked_at"),
        int8("locked_at"),
    ]
}

fn eligibility_schema() -> Vec<FieldInfo> {
    vec![
        boolean("eligible"),
        int8("reservation_id"),
        int8("principal_id"),
        int8("start"),
        int8("end"),
        varchar("unlock_code"),
    ]
}

fn stats_schema() -> Vec<FieldInfo> {
    vec![
        int8("total_resources"),
        int8("live_reservations"),
        int8("reservations_today"),
    ]
}

fn admission_schema() -> Vec<FieldInfo> {
    vec![int8("reservation_id"), int8("session_id"), varchar("unlock_code")]
}

/// Row shape of a statement before its parameters are bound. Statements
/// without a result set describe as empty.
fn result_schema(sql: &str) -> Vec<FieldInfo> {
    let upper = sql.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
    if upper.starts_with("INSERT") {
        if upper.contains("INTO RESERVATIONS") {
            return admission_schema();
        }
        return vec![];
    }
    if !upper.starts_with("SELECT") {
        return vec![];
    }
    if upper.contains("FROM ELIGIBILITY") {
        eligibility_schema()
    } else if upper.contains("FROM STATS") {
        stats_schema()
    } else if upper.contains("FROM SESSIONS") {
        sessions_schema()
    } else if upper.contains("FROM RESERVATIONS") {
        reservations_schema()
    } else if upper.contains("FROM RESOURCES") {
        resources_schema()
    } else {
        vec![]
    }
}

#[async_trait]
impl SimpleQueryHandler for SlotlockHandler {
    async fn do_query<C>(
        &self,
        client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        self.run_statement(client, query).await
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct SlotlockQueryParser;

#[async_trait]
impl QueryParser for SlotlockQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(result_schema(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for SlotlockHandler {
    type Statement = String;
    type QueryParser = SlotlockQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let sql = substitute_params(portal);
        let mut responses = self.run_statement(client, &sql).await?;
        if responses.is_empty() {
            return Ok(Response::EmptyQuery);
        }
        Ok(responses.remove(0))
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            result_schema(&target.statement),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(result_schema(
            &target.statement.statement,
        )))
    }
}

/// Byte ranges and indexes of `$N` placeholders, skipping quoted literals.
fn placeholders(sql: &str) -> Vec<(std::ops::Range<usize>, usize)> {
    let bytes = sql.as_bytes();
    let mut found = Vec::new();
    let mut in_literal = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            // '' inside a literal toggles twice and stays in it.
            b'\'' => {
                in_literal = !in_literal;
                i += 1;
            }
            b'$' if !in_literal => {
                let start = i;
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if let Ok(n) = sql[start + 1..i].parse::<usize>() {
                    found.push((start..i, n));
                }
            }
            _ => i += 1,
        }
    }
    found
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    placeholders(sql).into_iter().map(|(_, n)| n).max().unwrap_or(0)
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
fn substitute_params(portal: &Portal<String>) -> String {
    substitute(&portal.statement.statement, &portal.parameters)
}

/// One left-to-right pass over the statement text: bound values are copied
/// into the output and never scanned again. Unbound indexes stay verbatim.
fn substitute(sql: &str, params: &[Option<Bytes>]) -> String {
    let mut result = String::with_capacity(sql.len());
    let mut copied = 0;
    for (range, n) in placeholders(sql) {
        let Some(param) = n.checked_sub(1).and_then(|i| params.get(i)) else {
            continue;
        };
        result.push_str(&sql[copied..range.start]);
        match param {
            Some(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                result.push('\'');
                result.push_str(&text.replace('\'', "''"));
                result.push('\'');
            }
            None => result.push_str("NULL"),
        }
        copied = range.end;
    }
    result.push_str(&sql[copied..]);
    result
}

// ── Factory ──────────────────────────────────────────────────────

pub struct SlotlockFactory {
    handler: Arc<SlotlockHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<SlotlockAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl SlotlockFactory {
    pub fn new(tenant_manager: Arc<TenantManager>, password: String, clock: Arc<dyn Clock>) -> Self {
        let auth_source = SlotlockAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(SlotlockHandler::new(tenant_manager, clock)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }

    pub fn handler(&self) -> &Arc<SlotlockHandler> {
        &self.handler
    }
}

impl PgWireServerHandlers for SlotlockFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection to completion, then drop its LISTEN state.
pub async fn process_connection(
    socket: TcpStream,
    factory: Arc<SlotlockFactory>,
    tls: Option<TlsAcceptor>,
) -> io::Result<()> {
    let peer = socket.peer_addr()?;
    let result = pgwire::tokio::process_socket(socket, tls, factory.clone()).await;
    factory.handler().disconnect(&peer);
    result
}

fn engine_err(e: crate::engine::EngineError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "P0001".into(),
        e.to_string(),
    )))
}

fn sql_err(e: crate::sql::SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42601".into(),
        e.to_string(),
    )))
}
