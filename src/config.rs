use std::collections::HashMap;
use std::path::PathBuf;

use crate::limits::MAX_GROUP_NAME_LEN;

pub const DEFAULT_GROUP_QUOTAS: &str = "user=1,admin=5";

/// Maximum number of simultaneously overlapping live reservations per group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaPolicy {
    default_max: u32,
    groups: HashMap<String, u32>,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            default_max: 1,
            groups: HashMap::new(),
        }
    }
}

impl QuotaPolicy {
    pub fn new(default_max: u32) -> Self {
        Self {
            default_max,
            groups: HashMap::new(),
        }
    }

    pub fn with_group(mut self, group: impl Into<String>, max_concurrent: u32) -> Self {
        self.groups.insert(group.into(), max_concurrent);
        self
    }

    /// Unmapped groups fall back to the default (1 unless configured).
    pub fn max_concurrent(&self, group: &str) -> u32 {
        self.groups.get(group).copied().unwrap_or(self.default_max)
    }

    /// Parse `group=max,group=max`. Whitespace around entries is ignored.
    pub fn parse(list: &str, default_max: u32) -> Result<Self, ConfigError> {
        let mut policy = Self::new(default_max);
        for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (group, max) = entry
                .split_once('=')
                .ok_or_else(|| ConfigError::BadQuota(entry.to_string()))?;
            let group = group.trim();
            if group.is_empty() || group.len() > MAX_GROUP_NAME_LEN {
                return Err(ConfigError::BadQuota(entry.to_string()));
            }
            let max: u32 = max
                .trim()
                .parse()
                .map_err(|_| ConfigError::BadQuota(entry.to_string()))?;
            policy.groups.insert(group.to_string(), max);
        }
        Ok(policy)
    }
}

/// Immutable settings shared by every tenant engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub quotas: QuotaPolicy,
}

/// PEM certificate chain and private key, always configured together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub password: String,
    pub max_connections: usize,
    pub compact_threshold: u64,
    pub sweep_interval_secs: u64,
    pub metrics_port: Option<u16>,
    pub tls: Option<TlsFiles>,
    pub engine: EngineConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let parsed = |key: &'static str| -> Result<Option<u64>, ConfigError> {
            match lookup(key) {
                None => Ok(None),
                Some(v) => v
                    .trim()
                    .parse()
                    .map(Some)
                    .map_err(|_| ConfigError::BadNumber(key, v)),
            }
        };

        let port = match parsed("SLOTLOCK_PORT")? {
            Some(p) => u16::try_from(p).map_err(|_| ConfigError::BadNumber("SLOTLOCK_PORT", p.to_string()))?,
            None => 5433,
        };
        let metrics_port = match parsed("SLOTLOCK_METRICS_PORT")? {
            Some(p) => Some(
                u16::try_from(p)
                    .map_err(|_| ConfigError::BadNumber("SLOTLOCK_METRICS_PORT", p.to_string()))?,
            ),
            None => None,
        };
        let default_quota = match parsed("SLOTLOCK_DEFAULT_QUOTA")? {
            Some(q) => u32::try_from(q)
                .map_err(|_| ConfigError::BadNumber("SLOTLOCK_DEFAULT_QUOTA", q.to_string()))?,
            None => 1,
        };
        let quota_list =
            lookup("SLOTLOCK_GROUP_QUOTAS").unwrap_or_else(|| DEFAULT_GROUP_QUOTAS.to_string());

        let tls = match (lookup("SLOTLOCK_TLS_CERT"), lookup("SLOTLOCK_TLS_KEY")) {
            (None, None) => None,
            (Some(cert), Some(key)) => Some(TlsFiles {
                cert: cert.into(),
                key: key.into(),
            }),
            _ => return Err(ConfigError::TlsPair),
        };

        Ok(Self {
            bind: lookup("SLOTLOCK_BIND").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            data_dir: PathBuf::from(lookup("SLOTLOCK_DATA_DIR").unwrap_or_else(|| "./data".into())),
            password: lookup("SLOTLOCK_PASSWORD").unwrap_or_else(|| "slotlock".into()),
            max_connections: parsed("SLOTLOCK_MAX_CONNECTIONS")?.unwrap_or(256) as usize,
            compact_threshold: parsed("SLOTLOCK_COMPACT_THRESHOLD")?.unwrap_or(1000),
            sweep_interval_secs: parsed("SLOTLOCK_SWEEP_INTERVAL_SECS")?.unwrap_or(30).max(1),
            metrics_port,
            tls,
            engine: EngineConfig {
                quotas: QuotaPolicy::parse(&quota_list, default_quota)?,
            },
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    BadNumber(&'static str, String),
    BadQuota(String),
    TlsPair,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::BadNumber(key, v) => write!(f, "{key}: not a valid number: {v:?}"),
            ConfigError::BadQuota(entry) => {
                write!(f, "bad group quota entry {entry:?} (expected group=max)")
            }
            ConfigError::TlsPair => write!(
                f,
                "both SLOTLOCK_TLS_CERT and SLOTLOCK_TLS_KEY must be set, or neither"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
