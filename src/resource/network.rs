//! Network resource - the cluster's private address space

use anyhow::Result;
use declarative::{FieldChange, FindError, ProviderContext, Resource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Cidr, find_document, render_document};
use crate::cloud::LocalCloud;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub cidr: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl Resource for Network {
    type Cloud = LocalCloud;
    const KIND: &'static str = "Network";

    fn find(&self, name: &str, ctx: &ProviderContext<LocalCloud>) -> Result<Option<Self>, FindError> {
        find_document(name, ctx)
    }

    fn render(
        &self,
        name: &str,
        actual: Option<&Self>,
        ctx: &ProviderContext<LocalCloud>,
        dry_run: bool,
    ) -> Result<bool> {
        Cidr::parse(&self.cidr)?;
        render_document(self, name, actual, ctx, dry_run)
    }

    fn changes(&self, actual: &Self) -> Vec<FieldChange> {
        let mut changes = Vec::new();
        if self.cidr != actual.cidr {
            changes.push(FieldChange::new("cidr", &actual.cidr, &self.cidr));
        }
        if self.tags != actual.tags {
            changes.push(FieldChange::debug("tags", &actual.tags, &self.tags));
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::testing::context;

    fn network(cidr: &str) -> Network {
        Network {
            cidr: cidr.to_string(),
            tags: BTreeMap::from([("KubernetesCluster".to_string(), "dev.example.com".to_string())]),
        }
    }

    #[test]
    fn test_create_then_find() {
        let (_dir, ctx) = context();
        let desired = network("10.0.0.0/16");
        assert_eq!(desired.find("dev", &ctx).unwrap(), None);

        assert!(desired.render("dev", None, &ctx, true).unwrap());
        assert_eq!(desired.find("dev", &ctx).unwrap(), None, "dry run must not write");

        assert!(desired.render("dev", None, &ctx, false).unwrap());
        let actual = desired.find("dev", &ctx).unwrap();
        assert_eq!(actual.as_ref(), Some(&desired));
        assert!(!desired.render("dev", actual.as_ref(), &ctx, false).unwrap());
    }

    #[test]
    fn test_field_changes() {
        let actual = network("10.0.0.0/16");
        let mut desired = network("10.1.0.0/16");
        desired.tags.clear();
        let changes = desired.changes(&actual);
        let fields: Vec<_> = changes.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["cidr", "tags"]);
        assert_eq!(changes[0].from, "10.0.0.0/16");
        assert_eq!(changes[0].to, "10.1.0.0/16");
        assert!(actual.changes(&actual).is_empty());
    }

    #[test]
    fn test_invalid_cidr_fails_render() {
        let (_dir, ctx) = context();
        assert!(network("10.0.0.0").render("dev", None, &ctx, false).is_err());
    }
}
