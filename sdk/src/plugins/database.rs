use super::PluginContext;
use crate::config::ConfigHandle;
use crate::errors::CoreError;
use crate::types::{Identity, IdentityFilter, Namespace};
use async_trait::async_trait;

/// Persistence for the records the node itself needs at boot.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Plugin type name, e.g. `postgres`
    fn name(&self) -> &str;

    async fn init(&mut self, ctx: &PluginContext, config: &ConfigHandle) -> Result<(), CoreError>;

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, CoreError>;

    /// Inserts `namespace`, or updates the row with the same name when
    /// `allow_existing` is set. Without it, an existing row is an error.
    async fn upsert_namespace(
        &self,
        namespace: &Namespace,
        allow_existing: bool,
    ) -> Result<(), CoreError>;

    /// Returns matching identities and whether more rows exist beyond the
    /// filter's limit.
    async fn get_identities(
        &self,
        filter: &IdentityFilter,
    ) -> Result<(Vec<Identity>, bool), CoreError>;
}
