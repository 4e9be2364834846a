//! Security group resource - ingress rules for one role's machines

use anyhow::{Result, bail};
use declarative::{FieldChange, FindError, ProviderContext, Resource, TaskKey, TaskRef};
use serde::{Deserialize, Serialize};

use super::{Cidr, Network, find_document, render_document};
use crate::cloud::LocalCloud;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRule {
    pub protocol: String,
    pub from_port: u16,
    pub to_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_group: Option<TaskRef<SecurityGroup>>,
}

impl IngressRule {
    pub fn from_cidr(protocol: &str, from_port: u16, to_port: u16, cidr: &str) -> Self {
        Self {
            protocol: protocol.to_string(),
            from_port,
            to_port,
            cidr: Some(cidr.to_string()),
            source_group: None,
        }
    }

    pub fn from_group(protocol: &str, from_port: u16, to_port: u16, group: &str) -> Self {
        Self {
            protocol: protocol.to_string(),
            from_port,
            to_port,
            cidr: None,
            source_group: Some(TaskRef::new(group)),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.from_port > self.to_port {
            bail!("port range {}-{} is reversed", self.from_port, self.to_port);
        }
        match (&self.cidr, &self.source_group) {
            (Some(cidr), None) => Cidr::parse(cidr).map(|_| ()),
            (None, Some(_)) => Ok(()),
            _ => bail!("ingress rule needs exactly one of cidr or source_group"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub network: TaskRef<Network>,
    pub description: String,
    #[serde(default)]
    pub ingress: Vec<IngressRule>,
}

impl Resource for SecurityGroup {
    type Cloud = LocalCloud;
    const KIND: &'static str = "SecurityGroup";

    fn references(&self) -> Vec<TaskKey> {
        let mut refs = vec![self.network.key()];
        refs.extend(
            self.ingress
                .iter()
                .filter_map(|rule| rule.source_group.as_ref())
                .map(TaskRef::key),
        );
        refs
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
        for rule in &self.ingress {
            rule.validate()?;
        }
        render_document(self, name, actual, ctx, dry_run)
    }

    fn changes(&self, actual: &Self) -> Vec<FieldChange> {
        let mut changes = Vec::new();
        if self.network != actual.network {
            changes.push(FieldChange::new("network", actual.network.name(), self.network.name()));
        }
        if self.description != actual.description {
            changes.push(FieldChange::new("description", &actual.description, &self.description));
        }
        if self.ingress != actual.ingress {
            changes.push(FieldChange::debug("ingress", &actual.ingress, &self.ingress));
        }
        changes
    }
}
