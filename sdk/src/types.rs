//! Shared domain types: namespaces, identities and the identifier rule

use crate::errors::CoreError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use uuid::Uuid;

/// Name of the namespace reserved for node-internal definitions.
pub const SYSTEM_NAMESPACE: &str = "ff_system";

const NAME_PATTERN: &str = r"^[0-9a-zA-Z]([0-9a-zA-Z._-]{0,62}[0-9a-zA-Z])?$";

static NAME_REGEX: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

/// Checks `value` against the identifier rule used for plugin and namespace
/// names: 1-64 characters, alphanumerics plus `.`, `-` and `_`, starting and
/// ending with an alphanumeric.
///
/// `field` names the offending config entry in the error.
pub fn validate_name(field: &str, value: &str) -> Result<(), CoreError> {
    let valid = match NAME_REGEX.get_or_init(|| Regex::new(NAME_PATTERN)) {
        Ok(re) => re.is_match(value),
        Err(_) => false,
    };
    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidName {
            field: field.to_string(),
            value: value.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceType {
    /// Known only to this node
    Local,
    /// Defined by a network-wide broadcast; never rewritten at boot
    Broadcast,
    /// The node-internal system namespace
    System,
}

impl NamespaceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Broadcast => "broadcast",
            Self::System => "system",
        }
    }
}

impl fmt::Display for NamespaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NamespaceType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "broadcast" => Ok(Self::Broadcast),
            "system" => Ok(Self::System),
            other => Err(CoreError::Database(format!(
                "unrecognized namespace type '{}'",
                other
            ))),
        }
    }
}

/// A namespace as persisted by the database plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub ns_type: NamespaceType,
    pub description: String,
    pub created: DateTime<Utc>,
}

impl Namespace {
    /// Creates a namespace with a fresh id and the current time.
    pub fn new(name: impl Into<String>, ns_type: NamespaceType, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            ns_type,
            description: description.into(),
            created: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityType {
    Org,
    Node,
    Custom,
}

impl IdentityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Org => "org",
            Self::Node => "node",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for IdentityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IdentityType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "org" => Ok(Self::Org),
            "node" => Ok(Self::Node),
            "custom" => Ok(Self::Custom),
            other => Err(CoreError::Database(format!(
                "unrecognized identity type '{}'",
                other
            ))),
        }
    }
}

/// A registered identity. Node identities carry the data exchange profile
/// of the peer they describe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub did: String,
    #[serde(rename = "type")]
    pub identity_type: IdentityType,
    pub namespace: String,
    pub name: String,
    pub parent: Option<Uuid>,
    #[serde(default)]
    pub profile: serde_json::Value,
    pub created: DateTime<Utc>,
}

/// Query filter for [`crate::plugins::database::Plugin::get_identities`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityFilter {
    pub identity_type: Option<IdentityType>,
    pub namespace: Option<String>,
    pub limit: Option<u32>,
}

impl IdentityFilter {
    pub fn by_type(identity_type: IdentityType) -> Self {
        Self {
            identity_type: Some(identity_type),
            ..Self::default()
        }
    }
}
