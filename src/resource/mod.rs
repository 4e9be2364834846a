//! Cloud resources managed through the local provider
//!
//! Every resource is stored as its own desired-state document, so `find`
//! deserializes straight back into the resource type and equality is the
//! convergence test.

use anyhow::{Context, Result, bail};
use declarative::{FindError, ProviderContext, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::net::Ipv4Addr;

use crate::cloud::LocalCloud;

pub mod autoscaling_group;
pub mod network;
pub mod security_group;
pub mod subnet;

pub use autoscaling_group::AutoscalingGroup;
pub use network::Network;
pub use security_group::{IngressRule, SecurityGroup};
pub use subnet::Subnet;

/// Shared `find` for document-backed resources
fn find_document<R>(name: &str, ctx: &ProviderContext<LocalCloud>) -> Result<Option<R>, FindError>
where
    R: Resource<Cloud = LocalCloud> + DeserializeOwned,
{
    ctx.cloud().read(R::KIND, name)
}

/// Shown in field changes for an absent optional value
fn or_unset(value: Option<&str>) -> &str {
    value.unwrap_or("(unset)")
}

/// Shared `render` for document-backed resources
fn render_document<R>(
    desired: &R,
    name: &str,
    actual: Option<&R>,
    ctx: &ProviderContext<LocalCloud>,
    dry_run: bool,
) -> Result<bool>
where
    R: Resource<Cloud = LocalCloud> + Serialize,
{
    if actual == Some(desired) {
        return Ok(false);
    }
    if dry_run {
        return Ok(true);
    }
    ctx.checkpoint()?;
    ctx.cloud().write(R::KIND, name, desired)?;
    log::info!(
        "{} {} {name}",
        if actual.is_some() { "Updated" } else { "Created" },
        R::KIND
    );
    Ok(true)
}

/// An IPv4 CIDR block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cidr {
    addr: u32,
    prefix: u8,
}

impl Cidr {
    pub fn parse(s: &str) -> Result<Self> {
        let (addr, prefix) = s
            .split_once('/')
            .with_context(|| format!("CIDR {s:?} has no prefix length"))?;
        let addr: Ipv4Addr = addr
            .parse()
            .with_context(|| format!("CIDR {s:?} has an invalid address"))?;
        let prefix: u8 = prefix
            .parse()
            .with_context(|| format!("CIDR {s:?} has an invalid prefix length"))?;
        if prefix > 32 {
            bail!("CIDR {s:?} has a prefix longer than 32 bits");
        }
        Ok(Self {
            addr: u32::from(addr),
            prefix,
        })
    }

    fn mask(self) -> u32 {
        if self.prefix == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(self.prefix))
        }
    }

    /// Whether `other` lies entirely inside this block
    pub fn contains(self, other: Self) -> bool {
        other.prefix >= self.prefix && (other.addr & self.mask()) == (self.addr & self.mask())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cidr_contains() {
        let vpc = Cidr::parse("10.0.0.0/16").unwrap();
        assert!(vpc.contains(Cidr::parse("10.0.1.0/24").unwrap()));
        assert!(vpc.contains(vpc));
        assert!(!vpc.contains(Cidr::parse("10.1.0.0/24").unwrap()));
        assert!(!vpc.contains(Cidr::parse("10.0.0.0/8").unwrap()));
        assert!(Cidr::parse("0.0.0.0/0").unwrap().contains(vpc));
    }

    #[test]
    fn test_cidr_parse_errors() {
        for bad in ["10.0.0.0", "10.0.0/16", "10.0.0.0/33", "x/8"] {
            assert!(Cidr::parse(bad).is_err(), "{bad}");
        }
    }
}
