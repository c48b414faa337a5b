//! The network stack: a new VPC, or an existing one resolved by lookup.

use tracing::info;

use crate::environment::Environment;
use crate::error::Result;
use crate::lookup::{resolve_vpc, LookupCache};
use crate::model::network::{NetworkHandle, SubnetRef};
use crate::settings::{NetworkConfig, NetworkSource};
use crate::stack::Stack;
use crate::token::Token;

/// Logical id prefix of the VPC and everything declared with it.
pub const VPC_ID: &str = "Vpc";

/// Output carrying the VPC id.
pub const VPC_ID_OUTPUT: &str = "VPCId";

/// A built network stack and the handle its consumers receive.
#[derive(Debug, Clone)]
pub struct NetworkStack {
    /// The stack
    pub stack: Stack,
    /// Network handle for the compute stacks
    pub handle: NetworkHandle,
}

/// Build the network stack named `name`.
pub fn build_network_stack(
    name: &str,
    config: &NetworkConfig,
    env: &Environment,
    cache: &LookupCache,
) -> Result<NetworkStack> {
    let mut stack = Stack::new(name, env.clone())
        .with_description("VPC shared by the bastion and private hosts");

    let handle = match &config.source {
        NetworkSource::Create(spec) => {
            let vpc = spec.synthesize(&mut stack, VPC_ID, &format!("{}-VPC", name))?;
            let vpc_id =
                stack.export_named(VPC_ID_OUTPUT, vpc.vpc_id.clone(), Some("VPC id"))?;

            let mut subnets = Vec::with_capacity(vpc.subnets.len());
            for subnet in &vpc.subnets {
                let subnet_id = stack.export_internal(&subnet.logical_id, subnet.subnet_id.clone())?;
                subnets.push(SubnetRef {
                    group: subnet.allocation.group.clone(),
                    subnet_type: subnet.allocation.subnet_type,
                    subnet_id,
                });
            }
            info!(stack = %name, cidr = %spec.cidr, subnets = subnets.len(), "network stack creates a VPC");
            NetworkHandle::new(name, vpc_id, subnets)
        }
        NetworkSource::Lookup(lookup) => {
            let response = resolve_vpc(&mut stack, lookup, cache)?;
            stack.export_named(
                VPC_ID_OUTPUT,
                Token::from(response.vpc_id.clone()),
                Some("VPC id"),
            )?;
            info!(stack = %name, vpc = %lookup.name, vpc_id = %response.vpc_id, "network stack uses an existing VPC");
            response.to_handle(name)
        }
    };

    Ok(NetworkStack { stack, handle })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::network::{SubnetType, VpcLookup, VpcSpec};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_vpc_handle_uses_imports() {
        let built = build_network_stack(
            "net",
            &NetworkConfig::default(),
            &Environment::default(),
            &LookupCache::empty(),
        )
        .unwrap();

        assert_eq!(
            built.handle.vpc_id(),
            &Token::Import {
                producer: "net".to_string(),
                export_name: "net-VPCId".to_string()
            }
        );
        let public = built.handle.select(SubnetType::Public).unwrap();
        assert_eq!(public.subnet_id.producers(), vec!["net"]);
        assert!(built.stack.output("ExportsOutputRefVpcPublicSubnet1").is_some());
        built.stack.to_template().unwrap();
    }

    #[test]
    fn test_lookup_creates_no_vpc() {
        let config = NetworkConfig {
            source: NetworkSource::Lookup(VpcLookup::by_name("shared")),
        };
        let built = build_network_stack(
            "net",
            &config,
            &Environment::new("123456789012", "eu-west-1"),
            &LookupCache::empty(),
        )
        .unwrap();

        assert_eq!(built.stack.resources().len(), 0);
        assert_eq!(built.stack.missing_lookups().len(), 1);
        assert_eq!(built.handle.vpc_id(), &Token::str("vpc-12345"));
        assert!(built.stack.output(VPC_ID_OUTPUT).is_some());
    }

    #[test]
    fn test_invalid_layout_fails() {
        let config = NetworkConfig {
            source: NetworkSource::Create(VpcSpec {
                cidr: "10.0.0.0/24".parse().unwrap(),
                ..VpcSpec::default()
            }),
        };
        assert!(build_network_stack(
            "net",
            &config,
            &Environment::default(),
            &LookupCache::empty()
        )
        .is_err());
    }
}
