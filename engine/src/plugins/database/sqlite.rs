use super::{
    db_error, identity_from_row, identity_query, namespace_from_row, page, IdentityRow,
    NamespaceRow, DEFAULT_MAX_CONNECTIONS,
};
use async_trait::async_trait;
use sdk::config::ConfigHandle;
use sdk::errors::CoreError;
use sdk::plugins::{database, PluginContext};
use sdk::types::{Identity, IdentityFilter, Namespace};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::str::FromStr;
use tracing::{debug, info};

const PLUGIN_TYPE: &str = "sqlite3";

/// SQLite database plugin, for single-process development nodes.
#[derive(Default)]
pub struct Sqlite {
    pool: Option<SqlitePool>,
}

impl Sqlite {
    pub fn new() -> Self {
        Self::default()
    }

    fn pool(&self) -> Result<&SqlitePool, CoreError> {
        self.pool
            .as_ref()
            .ok_or_else(|| CoreError::invalid_state("query sqlite3", "uninitialized"))
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<(), CoreError> {
        sqlx::raw_sql(include_str!("../../../migrations/sqlite/001_initial.sql"))
            .execute(pool)
            .await
            .map_err(|e| db_error("Failed to execute migration 001_initial.sql", e))?;
        Ok(())
    }
}

#[async_trait]
impl database::Plugin for Sqlite {
    fn name(&self) -> &str {
        PLUGIN_TYPE
    }

    async fn init(&mut self, ctx: &PluginContext, config: &ConfigHandle) -> Result<(), CoreError> {
        let url = config.require_string("url", PLUGIN_TYPE)?;
        let max_connections = config
            .get_i64("max_connections")
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);

        info!(plugin = %ctx.name, "Opening sqlite3 database");

        let options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| db_error("Invalid sqlite3 url", e))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| db_error("Failed to connect to database", e))?;

        Self::run_migrations(&pool).await?;
        debug!(plugin = %ctx.name, "sqlite3 migrations applied");

        self.pool = Some(pool);
        Ok(())
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, CoreError> {
        let row: Option<NamespaceRow> = sqlx::query_as(
            "SELECT id, name, ns_type, description, created FROM namespaces WHERE name = ?",
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
            "INSERT INTO namespaces (id, name, ns_type, description, created) VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(name) DO UPDATE SET ns_type = excluded.ns_type, description = excluded.description"
        } else {
            "INSERT INTO namespaces (id, name, ns_type, description, created) VALUES (?, ?, ?, ?, ?)"
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
        let (sql, binds) = identity_query(filter, |_| "?".to_string());
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
