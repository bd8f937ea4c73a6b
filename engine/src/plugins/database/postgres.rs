use super::{
    db_error, identity_from_row, identity_query, namespace_from_row, page, IdentityRow,
    NamespaceRow, DEFAULT_MAX_CONNECTIONS,
};
use async_trait::async_trait;
use sdk::config::ConfigHandle;
use sdk::errors::CoreError;
use sdk::plugins::{database, PluginContext};
use sdk::types::{Identity, IdentityFilter, Namespace};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};

const PLUGIN_TYPE: &str = "postgres";

/// PostgreSQL database plugin.
#[derive(Default)]
pub struct Postgres {
    pool: Option<PgPool>,
}

impl Postgres {
    pub fn new() -> Self {
        Self::default()
    }

    fn pool(&self) -> Result<&PgPool, CoreError> {
        self.pool
            .as_ref()
            .ok_or_else(|| CoreError::invalid_state("query postgres", "uninitialized"))
    }
}

#[async_trait]
impl database::Plugin for Postgres {
    fn name(&self) -> &str {
        PLUGIN_TYPE
    }

    async fn init(&mut self, ctx: &PluginContext, config: &ConfigHandle) -> Result<(), CoreError> {
        let url = config.require_string("url", PLUGIN_TYPE)?;
        let max_connections = config
            .get_i64("max_connections")
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);

        info!(plugin = %ctx.name, max_connections, "Connecting to postgres");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(&url)
            .await
            .map_err(|e| db_error("Failed to connect to database", e))?;

        sqlx::raw_sql(include_str!("../../../migrations/postgres/001_initial.sql"))
            .execute(&pool)
            .await
            .map_err(|e| db_error("Failed to execute migration 001_initial.sql", e))?;
        debug!(plugin = %ctx.name, "postgres migrations applied");

        self.pool = Some(pool);
        Ok(())
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, CoreError> {
        let row: Option<NamespaceRow> = sqlx::query_as(
            "SELECT id, name, ns_type, description, created FROM namespaces WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(self.pool()?)
        .await
        .map_err(|e| db_error("Failed to query namespace", e))?;

        row.map(namespace_from_row).transpose()
    }

    async fn upsert_namespace(
        &self,
        namespace: &Namespace,
        allow_existing: bool,
    ) -> Result<(), CoreError> {
        let sql = if allow_existing {
            "INSERT INTO namespaces (id, name, ns_type, description, created) VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (name) DO UPDATE SET ns_type = EXCLUDED.ns_type, description = EXCLUDED.description"
        } else {
            "INSERT INTO namespaces (id, name, ns_type, description, created) VALUES ($1, $2, $3, $4, $5)"
        };

        sqlx::query(sql)
            .bind(namespace.id.to_string())
            .bind(&namespace.name)
            .bind(namespace.ns_type.as_str())
            .bind(&namespace.description)
            .bind(namespace.created.to_rfc3339())
            .execute(self.pool()?)
            .await
            .map_err(|e| db_error("Failed to upsert namespace", e))?;

        Ok(())
    }

    async fn get_identities(
        &self,
        filter: &IdentityFilter,
    ) -> Result<(Vec<Identity>, bool), CoreError> {
        let (sql, binds) = identity_query(filter, |i| format!("${}", i));
        let mut query = sqlx::query_as::<_, IdentityRow>(&sql);
        for value in binds {
            query = query.bind(value);
        }
        let rows = query
            .fetch_all(self.pool()?)
            .await
            .map_err(|e| db_error("Failed to query identities", e))?;

        let identities = rows
            .into_iter()
            .map(identity_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(page(identities, filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScopedConfig;
    use sdk::plugins::database::Plugin;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn missing_url_is_reported_before_connecting() {
        let mut plugin = Postgres::new();
        let err = plugin
            .init(
                &PluginContext::new("database_0", CancellationToken::new()),
                &ScopedConfig::empty("database.postgres").handle(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("FF10138"));
        assert!(err.to_string().contains("url"));
    }

    #[tokio::test]
    async fn queries_before_init_fail_cleanly() {
        let plugin = Postgres::new();
        let err = plugin.get_namespace("default").await.unwrap_err();
        assert!(err.to_string().starts_with("FF10900"));
    }
}
