use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::info;

use crate::clock::Clock;
use crate::codes::CodeGenerator;
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::limits::*;
use crate::notify::NotifyHub;
use crate::reaper;

/// Knobs every tenant engine is started with.
#[derive(Debug, Clone)]
pub struct TenantSettings {
    pub compact_threshold: u64,
    pub sweep_interval: Duration,
    pub engine: EngineConfig,
}

impl Default for TenantSettings {
    fn default() -> Self {
        Self {
            compact_threshold: 1000,
            sweep_interval: Duration::from_secs(30),
            engine: EngineConfig::default(),
        }
    }
}

/// Manages per-tenant engines. Each tenant gets its own Engine + WAL + reaper.
/// Tenant = database name from the pgwire connection.
pub struct TenantManager {
    engines: DashMap<String, Arc<Engine>>,
    data_dir: PathBuf,
    settings: TenantSettings,
    clock: Arc<dyn Clock>,
    codes: Arc<dyn CodeGenerator>,
}

impl TenantManager {
    pub fn new(
        data_dir: PathBuf,
        settings: TenantSettings,
        clock: Arc<dyn Clock>,
        codes: Arc<dyn CodeGenerator>,
    ) -> Self {
        Self {
            engines: DashMap::new(),
            data_dir,
            settings,
            clock,
            codes,
        }
    }

    /// Get or lazily create an engine for the given tenant. Engines are keyed
    /// by the sanitized name, the same name their WAL file carries, so two
    /// spellings that map to one file share one engine.
    pub fn get_or_create(&self, tenant: &str) -> std::io::Result<Arc<Engine>> {
        if tenant.len() > MAX_TENANT_NAME_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "tenant name too long",
            ));
        }
        let safe_name = sanitize(tenant)?;
        if let Some(engine) = self.engines.get(&safe_name) {
            return Ok(engine.value().clone());
        }
        if self.engines.len() >= MAX_TENANTS {
            return Err(std::io::Error::other("too many tenants"));
        }

        // Two connections may race to create the same tenant; the entry lock
        // makes the loser pick up the winner's engine.
        let entry = self.engines.entry(safe_name.clone());
        if let dashmap::mapref::entry::Entry::Occupied(existing) = &entry {
            return Ok(existing.get().clone());
        }

        let wal_path = self.data_dir.join(format!("{safe_name}.wal"));
        let notify = Arc::new(NotifyHub::new());
        let engine = Arc::new(Engine::new(
            wal_path,
            notify,
            self.settings.engine.clone(),
            self.codes.clone(),
        )?);

        // Spawn reaper + compactor for this tenant
        tokio::spawn(reaper::run_reaper(
            engine.clone(),
            self.settings.sweep_interval,
            self.clock.clone(),
        ));
        tokio::spawn(reaper::run_compactor(
            engine.clone(),
            self.settings.compact_threshold,
        ));

        entry.or_insert(engine.clone());
        metrics::gauge!(crate::observability::TENANTS_ACTIVE).set(self.engines.len() as f64);
        info!("tenant {tenant:?} loaded");
        Ok(engine)
    }

    pub fn tenant_count(&self) -> usize {
        self.engines.len()
    }
}

/// Strip everything but `[A-Za-z0-9_-]` so the name is safe as a file stem.
fn sanitize(tenant: &str) -> std::io::Result<String> {
    let safe_name: String = tenant
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if safe_name.is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "empty tenant name",
        ));
    }
    Ok(safe_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::codes::FixedCodes;
    use crate::model::*;
    use std::fs;

    const TEN: Ms = 1_767_261_600_000;
    const H: Ms = 3_600_000;

    fn test_data_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("slotlock_test_tenant").join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn manager(dir: PathBuf) -> TenantManager {
        TenantManager::new(
            dir,
            TenantSettings::default(),
            Arc::new(ManualClock::new(TEN)),
            Arc::new(FixedCodes::default()),
        )
    }

    #[tokio::test]
    async fn tenant_isolation() {
        let dir = test_data_dir("isolation");
        let tm = manager(dir);

        let eng_a = tm.get_or_create("tenant_a").unwrap();
        let eng_b = tm.get_or_create("tenant_b").unwrap();

        // Same resource id in both tenants
        eng_a.create_resource(1, "PC-01".into(), None, None).await.unwrap();
        eng_b.create_resource(1, "PC-01".into(), None, None).await.unwrap();

        eng_a
            .admit(1, &Principal::new(7, "user"), Span::new(TEN, TEN + H), TEN)
            .await
            .unwrap();

        // Tenant B's resource is still free for the same slot
        assert!(eng_b.reservations_for_resource(1, None).await.unwrap().is_empty());
        eng_b
            .admit(1, &Principal::new(7, "user"), Span::new(TEN, TEN + H), TEN)
            .await
            .unwrap();
        assert_eq!(eng_a.reservations_for_resource(1, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn tenant_lazy_creation() {
        let dir = test_data_dir("lazy");
        let tm = manager(dir.clone());

        // No WAL files should exist yet
        let entries: Vec<_> = fs::read_dir(&dir).unwrap().collect();
        assert!(entries.is_empty());

        let _eng = tm.get_or_create("my_db").unwrap();

        assert!(dir.join("my_db.wal").exists());
        assert_eq!(tm.tenant_count(), 1);
    }

    #[tokio::test]
    async fn tenant_same_engine_returned() {
        let dir = test_data_dir("same_eng");
        let tm = manager(dir);

        let eng1 = tm.get_or_create("foo").unwrap();
        let eng2 = tm.get_or_create("foo").unwrap();

        assert!(Arc::ptr_eq(&eng1, &eng2));
    }

    #[tokio::test]
    async fn tenant_reload_from_disk() {
        let dir = test_data_dir("reload");
        {
            let tm = manager(dir.clone());
            let eng = tm.get_or_create("lab").unwrap();
            eng.create_resource(3, "PC-03".into(), Some("Workstation".into()), None)
                .await
                .unwrap();
        }
        let tm = manager(dir);
        let eng = tm.get_or_create("lab").unwrap();
        let info = eng.resource_info(3).await.unwrap();
        assert_eq!(info.description.as_deref(), Some("Workstation"));
    }

    #[tokio::test]
    async fn tenant_name_sanitized() {
        let dir = test_data_dir("sanitize");
        let tm = manager(dir.clone());

        // Path traversal attempt
        let _eng = tm.get_or_create("../evil").unwrap();
        assert!(dir.join("evil.wal").exists());

        // Empty after sanitization
        let result = tm.get_or_create("../..");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn tenant_spellings_sharing_a_wal_share_an_engine() {
        let dir = test_data_dir("same_wal");
        let tm = manager(dir.clone());

        let dotted = tm.get_or_create("lab.1").unwrap();
        let plain = tm.get_or_create("lab1").unwrap();

        assert!(Arc::ptr_eq(&dotted, &plain));
        assert_eq!(tm.tenant_count(), 1);
        let wals: Vec<_> = fs::read_dir(&dir).unwrap().collect();
        assert_eq!(wals.len(), 1);
        assert!(dir.join("lab1.wal").exists());
    }

    #[tokio::test]
    async fn tenant_name_too_long() {
        let dir = test_data_dir("name_too_long");
        let tm = manager(dir);

        let long_name = "x".repeat(MAX_TENANT_NAME_LEN + 1);
        let err = tm.get_or_create(&long_name).err().unwrap();
        assert!(err.to_string().contains("tenant name too long"));
    }

    #[tokio::test]
    async fn tenant_count_limit() {
        let dir = test_data_dir("count_limit");
        let tm = manager(dir);

        for i in 0..MAX_TENANTS {
            tm.get_or_create(&format!("t{i}")).unwrap();
        }
        let err = tm.get_or_create("one_more").err().unwrap();
        assert!(err.to_string().contains("too many tenants"));
    }
}
