//! SQL database plugins
//!
//! Both backends share the same two-table schema (`namespaces`,
//! `identities`) and store ids and timestamps as text, so row conversion
//! lives here and each backend only owns its pool and placeholder syntax.

pub mod postgres;
pub mod sqlite;

pub use postgres::Postgres;
pub use sqlite::Sqlite;

use chrono::{DateTime, Utc};
use sdk::errors::CoreError;
use sdk::types::{Identity, IdentityFilter, Namespace};
use uuid::Uuid;

pub(crate) const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// `(id, name, ns_type, description, created)`
pub(crate) type NamespaceRow = (String, String, String, String, String);

/// `(id, did, itype, namespace, name, parent, profile, created)`
pub(crate) type IdentityRow = (
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    String,
);

pub(crate) fn db_error(context: &str, err: impl std::fmt::Display) -> CoreError {
    CoreError::Database(format!("{}: {}", context, err))
}

fn parse_uuid(value: &str) -> Result<Uuid, CoreError> {
    Uuid::parse_str(value).map_err(|e| db_error("invalid id", e))
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, CoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| db_error("invalid timestamp", e))
}

pub(crate) fn namespace_from_row(row: NamespaceRow) -> Result<Namespace, CoreError> {
    let (id, name, ns_type, description, created) = row;
    Ok(Namespace {
        id: parse_uuid(&id)?,
        name,
        ns_type: ns_type.parse()?,
        description,
        created: parse_time(&created)?,
    })
}

pub(crate) fn identity_from_row(row: IdentityRow) -> Result<Identity, CoreError> {
    let (id, did, itype, namespace, name, parent, profile, created) = row;
    Ok(Identity {
        id: parse_uuid(&id)?,
        did,
        identity_type: itype.parse()?,
        namespace,
        name,
        parent: parent.as_deref().map(parse_uuid).transpose()?,
        profile: serde_json::from_str(&profile).map_err(|e| db_error("invalid profile", e))?,
        created: parse_time(&created)?,
    })
}

/// Builds the identity query for `filter`. Returns the SQL and the string
/// values to bind in order. One extra row is requested beyond the limit so
/// the caller can tell whether more exist.
pub(crate) fn identity_query(
    filter: &IdentityFilter,
    placeholder: impl Fn(usize) -> String,
) -> (String, Vec<String>) {
    let mut sql = String::from(
        "SELECT id, did, itype, namespace, name, parent, profile, created FROM identities",
    );
    let mut binds = Vec::new();
    let mut conditions = Vec::new();

    if let Some(identity_type) = filter.identity_type {
        binds.push(identity_type.as_str().to_string());
        conditions.push(format!("itype = {}", placeholder(binds.len())));
    }
    if let Some(namespace) = &filter.namespace {
        binds.push(namespace.clone());
        conditions.push(format!("namespace = {}", placeholder(binds.len())));
    }
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY created, id");
    if let Some(limit) = filter.limit {
        sql.push_str(&format!(" LIMIT {}", u64::from(limit) + 1));
    }
    (sql, binds)
}

/// Trims the look-ahead row added by [`identity_query`].
pub(crate) fn page(mut identities: Vec<Identity>, filter: &IdentityFilter) -> (Vec<Identity>, bool) {
    match filter.limit {
        Some(limit) if identities.len() > limit as usize => {
            identities.truncate(limit as usize);
            (identities, true)
        }
        _ => (identities, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdk::types::IdentityType;

    #[test]
    fn identity_query_numbers_placeholders() {
        let filter = IdentityFilter {
            identity_type: Some(IdentityType::Node),
            namespace: Some("ff_system".into()),
            limit: Some(10),
        };
        let (sql, binds) = identity_query(&filter, |i| format!("${}", i));
        assert!(sql.contains("itype = $1 AND namespace = $2"));
        assert!(sql.ends_with("LIMIT 11"));
        assert_eq!(binds, ["node", "ff_system"]);
    }

    #[test]
    fn identity_query_without_filter_has_no_where() {
        let (sql, binds) = identity_query(&IdentityFilter::default(), |_| "?".to_string());
        assert!(!sql.contains("WHERE"));
        assert!(!sql.contains("LIMIT"));
        assert!(binds.is_empty());
    }

    #[test]
    fn namespace_row_rejects_unknown_type() {
        let row = (
            Uuid::new_v4().to_string(),
            "ns1".to_string(),
            "remote".to_string(),
            String::new(),
            Utc::now().to_rfc3339(),
        );
        assert!(namespace_from_row(row).is_err());
    }
}
