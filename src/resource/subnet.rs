//! Subnet resource - a slice of the network in one zone

use anyhow::{Context, Result, bail};
use declarative::{FieldChange, FindError, ProviderContext, Resource, TaskKey, TaskRef};
use serde::{Deserialize, Serialize};

use super::{Cidr, Network, find_document, or_unset, render_document};
use crate::cloud::LocalCloud;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub network: TaskRef<Network>,
    pub cidr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
}

impl Subnet {
    /// The provider rejects subnets outside their network's range
    fn check_placement(&self, ctx: &ProviderContext<LocalCloud>) -> Result<()> {
        let network: Network = ctx
            .cloud()
            .read(Network::KIND, self.network.name())?
            .with_context(|| format!("network {} does not exist", self.network.name()))?;
        let outer = Cidr::parse(&network.cidr)?;
        if !outer.contains(Cidr::parse(&self.cidr)?) {
            bail!(
                "subnet range {} is outside network {} ({})",
                self.cidr,
                self.network.name(),
                network.cidr
            );
        }
        Ok(())
    }
}

impl Resource for Subnet {
    type Cloud = LocalCloud;
    const KIND: &'static str = "Subnet";

    fn references(&self) -> Vec<TaskKey> {
        vec![self.network.key()]
    }

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
        if !dry_run && actual != Some(self) {
            self.check_placement(ctx)?;
        }
        render_document(self, name, actual, ctx, dry_run)
    }

    fn changes(&self, actual: &Self) -> Vec<FieldChange> {
        let mut changes = Vec::new();
        if self.network != actual.network {
            changes.push(FieldChange::new("network", actual.network.name(), self.network.name()));
        }
        if self.cidr != actual.cidr {
            changes.push(FieldChange::new("cidr", &actual.cidr, &self.cidr));
        }
        if self.zone != actual.zone {
            changes.push(FieldChange::new("zone", or_unset(actual.zone.as_deref()), or_unset(self.zone.as_deref())));
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::testing::context;
    use std::collections::BTreeMap;

    fn subnet(cidr: &str) -> Subnet {
        Subnet {
            network: TaskRef::new("dev"),
            cidr: cidr.to_string(),
            zone: Some("zone-a".to_string()),
        }
    }

    fn with_network(ctx: &ProviderContext<LocalCloud>) {
        let network = Network {
            cidr: "10.0.0.0/16".to_string(),
            tags: BTreeMap::new(),
        };
        network.render("dev", None, ctx, false).unwrap();
    }

    #[test]
    fn test_references_network() {
        assert_eq!(subnet("10.0.1.0/24").references(), vec![TaskKey::new("Network", "dev")]);
    }

    #[test]
    fn test_create_inside_network() {
        let (_dir, ctx) = context();
        with_network(&ctx);
        let desired = subnet("10.0.1.0/24");
        assert!(desired.render("a.dev", None, &ctx, false).unwrap());
        assert_eq!(desired.find("a.dev", &ctx).unwrap(), Some(desired));
    }

    #[test]
    fn test_outside_network_rejected_on_apply_only() {
        let (_dir, ctx) = context();
        with_network(&ctx);
        let desired = subnet("192.168.0.0/24");
        assert!(desired.render("a.dev", None, &ctx, true).unwrap());
        let err = desired.render("a.dev", None, &ctx, false).unwrap_err();
        assert!(err.to_string().contains("outside network"));
    }

    #[test]
    fn test_missing_network_fails() {
        let (_dir, ctx) = context();
        assert!(subnet("10.0.1.0/24").render("a.dev", None, &ctx, false).is_err());
    }

    #[test]
    fn test_changes_print_plain_values() {
        let actual = subnet("10.0.1.0/24");
        let mut desired = subnet("10.0.2.0/24");
        desired.zone = None;
        let fields: Vec<_> = desired
            .changes(&actual)
            .into_iter()
            .map(|c| (c.field, c.from, c.to))
            .collect();
        assert_eq!(
            fields,
            vec![
                ("cidr".to_string(), "10.0.1.0/24".to_string(), "10.0.2.0/24".to_string()),
                ("zone".to_string(), "zone-a".to_string(), "(unset)".to_string()),
            ]
        );
    }

    #[test]
    fn test_serializes_reference_as_name() {
        let json = serde_json::to_value(subnet("10.0.1.0/24")).unwrap();
        assert_eq!(json["network"], "dev");
    }
}
