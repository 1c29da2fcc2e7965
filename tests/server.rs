use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{stream, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_postgres::{AsyncMessage, Config, NoTls, Notification, SimpleQueryMessage, SimpleQueryRow};

use slotlock::clock::ManualClock;
use slotlock::codes::FixedCodes;
use slotlock::config::{EngineConfig, QuotaPolicy};
use slotlock::tenant::{TenantManager, TenantSettings};
use slotlock::wire::{self, SlotlockFactory};

/// 2026-01-01T10:00:00Z
const TEN: i64 = 1_767_261_600_000;
const H: i64 = 3_600_000;

// ── Test infrastructure ──────────────────────────────────────

async fn start_test_server(name: &str) -> (SocketAddr, Arc<SlotlockFactory>, Arc<ManualClock>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let dir = std::env::temp_dir()
        .join("slotlock_int_test")
        .join(format!("{name}_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();

    let clock = Arc::new(ManualClock::new(TEN));
    let settings = TenantSettings {
        engine: EngineConfig {
            quotas: QuotaPolicy::new(1).with_group("admin", 5),
        },
        ..TenantSettings::default()
    };
    let tm = Arc::new(TenantManager::new(
        dir,
        settings,
        clock.clone(),
        Arc::new(FixedCodes::new(["K7Q2M9XA", "B4N8R2TZ", "C1D2E3F4"])),
    ));
    let factory = Arc::new(SlotlockFactory::new(tm, "slotlock".to_string(), clock.clone()));

    let factory2 = factory.clone();
    tokio::spawn(async move {
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let factory = factory2.clone();
            tokio::spawn(async move {
                let _ = wire::process_connection(socket, factory, None).await;
            });
        }
    });

    (addr, factory, clock)
}

async fn connect(addr: SocketAddr) -> (tokio_postgres::Client, mpsc::UnboundedReceiver<Notification>) {
    let mut config = Config::new();
    config
        .host(addr.ip().to_string())
        .port(addr.port())
        .dbname("lab")
        .user("frontend")
        .password("slotlock");

    let (client, mut connection) = config.connect(NoTls).await.unwrap();

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let stream = stream::poll_fn(move |cx| connection.poll_message(cx));
        futures::pin_mut!(stream);
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(AsyncMessage::Notification(n)) => {
                    let _ = tx.send(n);
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    });

    (client, rx)
}

async fn rows(client: &tokio_postgres::Client, sql: &str) -> Vec<SimpleQueryRow> {
    client
        .simple_query(sql)
        .await
        .unwrap()
        .into_iter()
        .filter_map(|m| match m {
            SimpleQueryMessage::Row(row) => Some(row),
            _ => None,
        })
        .collect()
}

async fn reserve(client: &tokio_postgres::Client, resource: i64, principal: i64, start: i64, end: i64) -> SimpleQueryRow {
    let sql = format!(
        r#"INSERT INTO reservations (resource_id, principal_id, "group", start, "end") VALUES ({resource}, {principal}, 'user', {start}, {end})"#
    );
    rows(client, &sql).await.remove(0)
}

async fn recv_notification(rx: &mut mpsc::UnboundedReceiver<Notification>, timeout: Duration) -> Option<Notification> {
    tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn resources_roundtrip() {
    let (addr, _factory, _clock) = start_test_server("resources").await;
    let (client, _rx) = connect(addr).await;

    client
        .batch_execute("INSERT INTO resources (id, name, location) VALUES (1, 'PC-01', 'Lab A')")
        .await
        .unwrap();
    client
        .batch_execute("UPDATE resources SET description = 'Workstation' WHERE id = 1")
        .await
        .unwrap();

    let listed = rows(&client, "SELECT * FROM resources").await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].get("name"), Some("PC-01"));
    assert_eq!(listed[0].get("description"), Some("Workstation"));
    assert_eq!(listed[0].get("location"), Some("Lab A"));
    assert_eq!(listed[0].get("is_currently_booked"), Some("f"));
}

#[tokio::test]
async fn admission_and_conflict() {
    let (addr, _factory, _clock) = start_test_server("admission").await;
    let (client, _rx) = connect(addr).await;
    client
        .batch_execute("INSERT INTO resources (id, name) VALUES (1, 'PC-01')")
        .await
        .unwrap();

    let admitted = reserve(&client, 1, 7, TEN, TEN + H).await;
    assert_eq!(admitted.get("unlock_code"), Some("K7Q2M9XA"));
    let reservation_id = admitted.get("reservation_id").unwrap().to_string();

    let sql = format!(
        r#"INSERT INTO reservations (resource_id, principal_id, "group", start, "end") VALUES (1, 8, 'user', {}, {})"#,
        TEN + H / 2,
        TEN + 2 * H
    );
    let err = client.simple_query(&sql).await.unwrap_err();
    let db = err.as_db_error().expect("database error");
    assert_eq!(db.code().code(), "P0001");
    assert!(db.message().contains("slot conflict"), "{}", db.message());

    // Back-to-back is fine.
    reserve(&client, 1, 8, TEN + H, TEN + 2 * H).await;

    let mine = rows(&client, "SELECT * FROM reservations WHERE principal_id = 7").await;
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].get("id"), Some(reservation_id.as_str()));
    assert_eq!(mine[0].get("status"), Some("pending"));
}

#[tokio::test]
async fn eligibility_unlock_and_lock() {
    let (addr, _factory, clock) = start_test_server("unlock").await;
    let (client, _rx) = connect(addr).await;
    client
        .batch_execute("INSERT INTO resources (id, name) VALUES (1, 'PC-01')")
        .await
        .unwrap();
    let admitted = reserve(&client, 1, 7, TEN, TEN + H).await;
    let reservation_id = admitted.get("reservation_id").unwrap().to_string();

    let wrong = client
        .simple_query("UPDATE sessions SET status = 'unlocked' WHERE resource_id = 1 AND unlock_code = 'K7Q2M9XA'")
        .await;
    assert!(wrong.is_err(), "pending reservation must not unlock");

    let eligibility = rows(&client, "SELECT * FROM eligibility WHERE resource_id = 1").await;
    assert_eq!(eligibility[0].get("eligible"), Some("t"));
    assert_eq!(eligibility[0].get("unlock_code"), Some("K7Q2M9XA"));

    client
        .batch_execute("UPDATE sessions SET status = 'unlocked' WHERE resource_id = 1 AND unlock_code = 'K7Q2M9XA'")
        .await
        .unwrap();
    let session = rows(
        &client,
        &format!("SELECT * FROM sessions WHERE reservation_id = {reservation_id}"),
    )
    .await;
    assert_eq!(session[0].get("status"), Some("unlocked"));
    assert_eq!(session[0].get("unlocked_at"), Some(TEN.to_string().as_str()));

    clock.set(TEN + H);
    client
        .batch_execute("UPDATE sessions SET status = 'locked' WHERE resource_id = 1")
        .await
        .unwrap();
    let session = rows(
        &client,
        &format!("SELECT * FROM sessions WHERE reservation_id = {reservation_id}"),
    )
    .await;
    assert_eq!(session[0].get("status"), Some("locked"));

    let stats = rows(&client, "SELECT * FROM stats").await;
    assert_eq!(stats[0].get("total_resources"), Some("1"));
    assert_eq!(stats[0].get("live_reservations"), Some("0"));
    assert_eq!(stats[0].get("reservations_today"), Some("1"));
}

#[tokio::test]
async fn cancel_requires_owner() {
    let (addr, _factory, _clock) = start_test_server("cancel").await;
    let (client, _rx) = connect(addr).await;
    client
        .batch_execute("INSERT INTO resources (id, name) VALUES (1, 'PC-01')")
        .await
        .unwrap();
    let admitted = reserve(&client, 1, 7, TEN + H, TEN + 2 * H).await;
    let id = admitted.get("reservation_id").unwrap().to_string();

    let err = client
        .simple_query(&format!("UPDATE reservations SET status = 'cancelled' WHERE id = {id} AND principal_id = 8"))
        .await
        .unwrap_err();
    assert!(err.as_db_error().unwrap().message().contains("another principal"));

    client
        .batch_execute(&format!("UPDATE reservations SET status = 'cancelled' WHERE id = {id} AND principal_id = 7"))
        .await
        .unwrap();
    let listed = rows(&client, "SELECT * FROM reservations WHERE resource_id = 1").await;
    assert!(listed.is_empty(), "cancelled reservations are hidden from the resource view");
}

#[tokio::test]
async fn listen_delivers_on_next_statement() {
    let (addr, _factory, _clock) = start_test_server("listen").await;
    let (client1, mut rx1) = connect(addr).await;
    client1
        .batch_execute("INSERT INTO resources (id, name) VALUES (1, 'PC-01')")
        .await
        .unwrap();
    client1.batch_execute("LISTEN resource_1").await.unwrap();
    // Listening twice is a no-op.
    client1.batch_execute("LISTEN resource_1").await.unwrap();

    let (client2, _rx2) = connect(addr).await;
    reserve(&client2, 1, 7, TEN, TEN + H).await;

    client1.batch_execute("SELECT * FROM stats").await.unwrap();
    let notif = recv_notification(&mut rx1, Duration::from_secs(5))
        .await
        .expect("expected notification");
    assert_eq!(notif.channel(), "resource_1");
    let payload: serde_json::Value = serde_json::from_str(notif.payload()).unwrap();
    assert!(payload.get("ReservationAdmitted").is_some(), "{payload}");

    let dup = recv_notification(&mut rx1, Duration::from_millis(300)).await;
    assert!(dup.is_none(), "should not receive duplicate notification");
}

#[tokio::test]
async fn listen_unknown_resource_fails() {
    let (addr, _factory, _clock) = start_test_server("listen_unknown").await;
    let (client, _rx) = connect(addr).await;
    assert!(client.batch_execute("LISTEN resource_99").await.is_err());
    assert!(client.batch_execute("LISTEN bookings").await.is_err());
}

#[tokio::test]
async fn unlisten_stops_notifications() {
    let (addr, factory, _clock) = start_test_server("unlisten").await;
    let (client1, mut rx1) = connect(addr).await;
    client1
        .batch_execute("INSERT INTO resources (id, name) VALUES (1, 'PC-01')")
        .await
        .unwrap();
    client1
        .batch_execute("INSERT INTO resources (id, name) VALUES (2, 'PC-02')")
        .await
        .unwrap();
    client1.batch_execute("LISTEN resource_1").await.unwrap();
    client1.batch_execute("LISTEN resource_2").await.unwrap();
    client1.batch_execute("UNLISTEN resource_1").await.unwrap();

    let (client2, _rx2) = connect(addr).await;
    reserve(&client2, 1, 7, TEN, TEN + H).await;
    client1.batch_execute("SELECT * FROM stats").await.unwrap();
    assert!(recv_notification(&mut rx1, Duration::from_millis(300)).await.is_none());

    client1.batch_execute("UNLISTEN *").await.unwrap();
    assert_eq!(factory.handler().listening_connections(), 0);
    reserve(&client2, 2, 8, TEN, TEN + H).await;
    client1.batch_execute("SELECT * FROM stats").await.unwrap();
    assert!(recv_notification(&mut rx1, Duration::from_millis(300)).await.is_none());
}

#[tokio::test]
async fn disconnect_cleans_up() {
    let (addr, factory, _clock) = start_test_server("disconnect").await;
    let (client, rx) = connect(addr).await;
    client
        .batch_execute("INSERT INTO resources (id, name) VALUES (1, 'PC-01')")
        .await
        .unwrap();
    client.batch_execute("LISTEN resource_1").await.unwrap();
    assert_eq!(factory.handler().listening_connections(), 1);

    drop(client);
    drop(rx);

    let mut remaining = 1;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        remaining = factory.handler().listening_connections();
        if remaining == 0 {
            break;
        }
    }
    assert_eq!(remaining, 0);
}
