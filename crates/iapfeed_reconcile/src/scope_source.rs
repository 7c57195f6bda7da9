//! Where scope rows come from.

use async_trait::async_trait;
use iapfeed_common::ScopeRecord;
use iapfeed_config::{resolve_secret, ScopeDbConfig};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::Row;

use crate::error::ReconcileError;

const SCOPE_QUERY: &str = "SELECT network, netmask, cmts_hostname, cmts_interface, \
     CAST(vlan_id AS SIGNED) AS vlan_id, CAST(active AS SIGNED) AS active \
     FROM dhcp_scopes WHERE active = 1";

/// A read-only provider of scope database rows.
#[async_trait]
pub trait ScopeSource: Send + Sync {
    /// Loads every active scope row.
    async fn load_scopes(&self) -> Result<Vec<ScopeRecord>, ReconcileError>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Scope rows held in memory.
///
/// Used in tests and in deployments without a scope database, where it is
/// empty and reconciliation only normalizes inventory subnets.
#[derive(Debug, Clone, Default)]
pub struct StaticScopeSource {
    records: Vec<ScopeRecord>,
}

impl StaticScopeSource {
    /// Creates a source serving `records`.
    pub fn new(records: Vec<ScopeRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl ScopeSource for StaticScopeSource {
    async fn load_scopes(&self) -> Result<Vec<ScopeRecord>, ReconcileError> {
        Ok(self.records.clone())
    }

    fn describe(&self) -> String {
        format!("static ({} rows)", self.records.len())
    }
}

/// The `dhcp_scopes` table of a MySQL scope database.
pub struct MySqlScopeSource {
    pool: MySqlPool,
    display_url: String,
}

impl MySqlScopeSource {
    /// Creates a lazily-connecting pool. No connection is opened until the
    /// first query.
    pub fn connect_lazy(url: &str, max_connections: u32) -> Result<Self, ReconcileError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_lazy(url)
            .map_err(|source| ReconcileError::Database { source })?;
        Ok(Self {
            pool,
            display_url: mask_url(url),
        })
    }

    /// Builds a source from configuration. Returns `None` when no database
    /// URL is configured.
    pub fn from_config(config: &ScopeDbConfig) -> Result<Option<Self>, ReconcileError> {
        let url = resolve_secret("scope_db.url", config.url.as_deref(), config.url_env.as_deref())
            .map_err(|e| ReconcileError::Config {
                reason: e.to_string(),
            })?;
        url.map(|u| Self::connect_lazy(&u, config.max_connections))
            .transpose()
    }
}

#[async_trait]
impl ScopeSource for MySqlScopeSource {
    async fn load_scopes(&self) -> Result<Vec<ScopeRecord>, ReconcileError> {
        let rows = sqlx::query(SCOPE_QUERY)
            .fetch_all(&self.pool)
            .await
            .map_err(|source| ReconcileError::Database { source })?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let db = |source| ReconcileError::Database { source };
            let vlan: Option<i64> = row.try_get("vlan_id").map_err(db)?;
            let active: Option<i64> = row.try_get("active").map_err(db)?;
            records.push(ScopeRecord {
                network: row.try_get("network").map_err(db)?,
                netmask: row
                    .try_get::<Option<String>, _>("netmask")
                    .map_err(db)?
                    .unwrap_or_default(),
                hostname: row.try_get("cmts_hostname").map_err(db)?,
                interface: row
                    .try_get::<Option<String>, _>("cmts_interface")
                    .map_err(db)?
                    .filter(|i| !i.trim().is_empty()),
                vlan: vlan.and_then(|v| u32::try_from(v).ok()),
                active: active.unwrap_or(1) != 0,
            });
        }
        tracing::info!(source = %self.display_url, rows = records.len(), "loaded scope rows");
        Ok(records)
    }

    fn describe(&self) -> String {
        format!("mysql {}", self.display_url)
    }
}

/// Hides the password of a database URL.
fn mask_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    match rest.split_once('@') {
        Some((credentials, host)) => {
            let user = credentials.split(':').next().unwrap_or_default();
            format!("{scheme}://{user}:***@{host}")
        }
        None => url.to_string(),
    }
}
