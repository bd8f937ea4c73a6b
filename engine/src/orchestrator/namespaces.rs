//! Namespace bootstrap

use crate::config::Config;
use sdk::errors::CoreError;
use sdk::plugins::database;
use sdk::types::{validate_name, Namespace, NamespaceType, SYSTEM_NAMESPACE};
use std::collections::HashSet;
use tracing::{debug, info, warn};

const SYSTEM_DESCRIPTION: &str = "Reserved namespace for node and network administration";

/// The namespaces this node must hold: the system namespace first, then
/// `namespaces.predefined` in order with duplicates dropped.
pub fn predefined(config: &Config) -> Result<Vec<Namespace>, CoreError> {
    let mut list = vec![Namespace::new(
        SYSTEM_NAMESPACE,
        NamespaceType::System,
        SYSTEM_DESCRIPTION,
    )];
    let mut seen: HashSet<&str> = HashSet::from([SYSTEM_NAMESPACE]);

    for (i, entry) in config.namespaces.predefined.iter().enumerate() {
        validate_name(&format!("namespaces.predefined[{}].name", i), &entry.name)?;
        if !seen.insert(entry.name.as_str()) {
            warn!(namespace = %entry.name, "Duplicate predefined namespace ignored");
            continue;
        }
        list.push(Namespace::new(
            entry.name.as_str(),
            NamespaceType::Local,
            entry.description.as_str(),
        ));
    }

    if !seen.contains(config.namespaces.default.as_str()) {
        return Err(CoreError::DefaultNamespaceMissing(
            config.namespaces.default.clone(),
        ));
    }
    Ok(list)
}

/// Persists the predefined namespaces. Broadcast namespaces already in the
/// database are left untouched; local ones are updated only when they
/// differ.
pub async fn init_namespaces(
    config: &Config,
    database: &dyn database::Plugin,
) -> Result<Vec<Namespace>, CoreError> {
    let list = predefined(config)?;
    for ns in &list {
        match database.get_namespace(&ns.name).await? {
            None => {
                database.upsert_namespace(ns, true).await?;
                info!(namespace = %ns.name, ns_type = %ns.ns_type, "Namespace created");
            }
            Some(existing) if existing.ns_type == NamespaceType::Broadcast => {
                debug!(namespace = %ns.name, "Broadcast namespace kept as defined by the network");
            }
            Some(existing) => {
                if existing.ns_type == ns.ns_type && existing.description == ns.description {
                    continue;
                }
                let updated = Namespace {
                    ns_type: ns.ns_type,
                    description: ns.description.clone(),
                    ..existing
                };
                database.upsert_namespace(&updated, true).await?;
                info!(namespace = %ns.name, "Namespace updated");
            }
        }
    }
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use async_trait::async_trait;
    use sdk::config::ConfigHandle;
    use sdk::errors::ErrorExt;
    use sdk::plugins::PluginContext;
    use sdk::types::{Identity, IdentityFilter};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryDb {
        namespaces: Mutex<HashMap<String, Namespace>>,
        writes: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl database::Plugin for MemoryDb {
        fn name(&self) -> &str {
            "memory"
        }

        async fn init(&mut self, _ctx: &PluginContext, _config: &ConfigHandle) -> Result<(), CoreError> {
            Ok(())
        }

        async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, CoreError> {
            if self.fail {
                return Err(CoreError::Database("pop".into()));
            }
            Ok(self.namespaces.lock().unwrap().get(name).cloned())
        }

        async fn upsert_namespace(&self, ns: &Namespace, _allow_existing: bool) -> Result<(), CoreError> {
            self.writes.lock().unwrap().push(ns.name.clone());
            self.namespaces
                .lock()
                .unwrap()
                .insert(ns.name.clone(), ns.clone());
            Ok(())
        }

        async fn get_identities(
            &self,
            _filter: &IdentityFilter,
        ) -> Result<(Vec<Identity>, bool), CoreError> {
            Ok((Vec::new(), false))
        }
    }

    fn config(toml: &str) -> Config {
        Config::from_toml_str(toml).unwrap()
    }

    #[test]
    fn system_namespace_comes_first() {
        let list = predefined(&Config::default()).unwrap();
        let names: Vec<_> = list.iter().map(|ns| ns.name.as_str()).collect();
        assert_eq!(names, [SYSTEM_NAMESPACE, "default"]);
        assert_eq!(list[0].ns_type, NamespaceType::System);
    }

    #[test]
    fn default_must_be_predefined() {
        let err = predefined(&config(
            r#"
            [namespaces]
            default = "ns1"
            predefined = [{ name = "ns2" }]
            "#,
        ))
        .unwrap_err();
        assert_eq!(err.code(), "FF10166");

        let err = predefined(&config("[namespaces]\npredefined = []\n")).unwrap_err();
        assert_eq!(err.code(), "FF10166");
    }

    #[test]
    fn invalid_names_name_their_position() {
        let err = predefined(&config(
            r#"
            [namespaces]
            predefined = [{ name = "default" }, { name = "_bad" }]
            "#,
        ))
        .unwrap_err();
        assert!(err
            .to_string()
            .starts_with("FF00140: Field 'namespaces.predefined[1].name'"));
    }

    #[test]
    fn duplicates_are_dropped() {
        let list = predefined(&config(
            r#"
            [namespaces]
            predefined = [{ name = "default" }, { name = "default", description = "again" }]
            "#,
        ))
        .unwrap();
        assert_eq!(list.len(), 2);
    }

    #[tokio::test]
    async fn broadcast_namespaces_are_not_overwritten() {
        let db = MemoryDb::default();
        let remote = Namespace::new("default", NamespaceType::Broadcast, "from the network");
        db.namespaces
            .lock()
            .unwrap()
            .insert("default".into(), remote.clone());

        init_namespaces(&Config::default(), &db).await.unwrap();

        assert_eq!(db.writes.lock().unwrap().as_slice(), [SYSTEM_NAMESPACE]);
        assert_eq!(db.namespaces.lock().unwrap()["default"], remote);
    }

    #[tokio::test]
    async fn local_namespaces_update_only_on_change() {
        let db = MemoryDb::default();
        init_namespaces(&Config::default(), &db).await.unwrap();
        let first = db.namespaces.lock().unwrap()["default"].clone();

        init_namespaces(&Config::default(), &db).await.unwrap();
        assert_eq!(db.writes.lock().unwrap().len(), 2);

        let changed = config("[namespaces]\npredefined = [{ name = \"default\", description = \"new\" }]\n");
        init_namespaces(&changed, &db).await.unwrap();
        let updated = db.namespaces.lock().unwrap()["default"].clone();
        assert_eq!(updated.description, "new");
        assert_eq!(updated.id, first.id);
        assert_eq!(db.writes.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn database_errors_propagate() {
        let db = MemoryDb {
            fail: true,
            ..Default::default()
        };
        let err = init_namespaces(&Config::default(), &db).await.unwrap_err();
        assert_eq!(err.to_string(), CoreError::Database("pop".into()).to_string());
    }
}
