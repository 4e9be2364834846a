//! Instance group roles and the role predicate used by hooks and file assets

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// What the machines of an instance group run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceGroupRole {
    /// etcd, API server, scheduler and controllers
    ControlPlane,
    /// Workers
    Node,
    /// Dedicated API servers without etcd
    ApiServer,
    /// SSH jump hosts
    Bastion,
}

impl InstanceGroupRole {
    pub fn has_api_server(self) -> bool {
        matches!(self, Self::ControlPlane | Self::ApiServer)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ControlPlane => "control-plane",
            Self::Node => "node",
            Self::ApiServer => "api-server",
            Self::Bastion => "bastion",
        }
    }
}

impl fmt::Display for InstanceGroupRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which roles an item applies to
///
/// Serialized as the `roles` list; an empty list means every role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AppliesTo {
    #[default]
    All,
    Roles(BTreeSet<InstanceGroupRole>),
}

impl AppliesTo {
    pub fn roles(roles: impl IntoIterator<Item = InstanceGroupRole>) -> Self {
        Self::from(roles.into_iter().collect::<Vec<_>>())
    }

    pub fn matches(&self, role: InstanceGroupRole) -> bool {
        match self {
            Self::All => true,
            Self::Roles(roles) => roles.contains(&role),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl From<Vec<InstanceGroupRole>> for AppliesTo {
    fn from(roles: Vec<InstanceGroupRole>) -> Self {
        if roles.is_empty() {
            Self::All
        } else {
            Self::Roles(roles.into_iter().collect())
        }
    }
}

impl From<AppliesTo> for Vec<InstanceGroupRole> {
    fn from(applies: AppliesTo) -> Self {
        match applies {
            AppliesTo::All => Vec::new(),
            AppliesTo::Roles(roles) => roles.into_iter().collect(),
        }
    }
}

impl Serialize for AppliesTo {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Vec::<InstanceGroupRole>::from(self.clone()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AppliesTo {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<InstanceGroupRole>::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_list_means_all() {
        let applies = AppliesTo::from(Vec::new());
        assert!(applies.is_all());
        assert!(applies.matches(InstanceGroupRole::Bastion));
    }

    #[test]
    fn test_roles_match() {
        let applies = AppliesTo::roles([InstanceGroupRole::ControlPlane]);
        assert!(applies.matches(InstanceGroupRole::ControlPlane));
        assert!(!applies.matches(InstanceGroupRole::Node));
    }

    #[test]
    fn test_api_server_roles() {
        assert!(InstanceGroupRole::ControlPlane.has_api_server());
        assert!(InstanceGroupRole::ApiServer.has_api_server());
        assert!(!InstanceGroupRole::Node.has_api_server());
        assert!(!InstanceGroupRole::Bastion.has_api_server());
    }

    #[test]
    fn test_serde_as_role_list() {
        #[derive(Serialize, Deserialize)]
        struct Item {
            #[serde(default)]
            roles: AppliesTo,
        }

        let item: Item = toml::from_str(r#"roles = ["control-plane", "api-server"]"#).unwrap();
        assert_eq!(
            item.roles,
            AppliesTo::roles([InstanceGroupRole::ApiServer, InstanceGroupRole::ControlPlane])
        );

        let item: Item = toml::from_str("").unwrap();
        assert!(item.roles.is_all());

        let encoded = toml::to_string(&Item {
            roles: AppliesTo::roles([InstanceGroupRole::Node]),
        })
        .unwrap();
        assert_eq!(encoded.trim(), r#"roles = ["node"]"#);
    }
}
