//! The bastion stack: an SSH jump host in the public subnet.

use tracing::{info, warn};

use crate::environment::Environment;
use crate::error::Result;
use crate::model::compute::{InstanceSpec, MachineImage, SubnetSelection};
use crate::model::network::{NetworkHandle, SubnetType};
use crate::model::security::{Peer, Port, SecurityGroupHandle, SecurityGroupSpec};
use crate::settings::BastionConfig;
use crate::stack::Stack;

/// Logical id of the bastion instance.
pub const INSTANCE_ID: &str = "BastionHost";
/// Logical id of the bastion security group.
pub const SECURITY_GROUP_ID: &str = "BastionHostSG";

/// Output names.
pub mod outputs {
    /// Instance id
    pub const INSTANCE_ID: &str = "BastionHostId";
    /// Security group id
    pub const SECURITY_GROUP_ID: &str = "BastionHostSecurityGroupId";
    /// Public DNS name of the instance
    pub const PUBLIC_DNS_NAME: &str = "BastionHostPublicDNSName";
}

/// A built bastion stack.
#[derive(Debug, Clone)]
pub struct BastionStack {
    /// The stack
    pub stack: Stack,
    /// Handle to the bastion security group, for the private stack
    pub security_group: SecurityGroupHandle,
}

/// Build the bastion stack named `name` on top of `network`.
pub fn build_bastion_stack(
    name: &str,
    config: &BastionConfig,
    network: &NetworkHandle,
    env: &Environment,
) -> Result<BastionStack> {
    let mut stack =
        Stack::new(name, env.clone()).with_description("Bastion host reachable over SSH");
    stack.add_dependency(network.producer());

    let ssh_source = config.ssh_source;
    let description = if ssh_source.is_any() {
        warn!(stack = %name, "bastion accepts SSH from 0.0.0.0/0");
        "SSH access from any IP".to_string()
    } else {
        format!("SSH access from {}", ssh_source)
    };

    let sg_name = format!("{}-bastion-host-sg", name);
    let group_id = SecurityGroupSpec::new(sg_name, "security group for bastion host")
        .allow_ingress(Peer::Ipv4(ssh_source), Port::tcp(22), description)
        .synthesize(&mut stack, SECURITY_GROUP_ID, network.vpc_id())?;

    let subnet = SubnetSelection(SubnetType::Public).resolve(network)?;
    let instance = InstanceSpec {
        name: format!("{}/{}", name, INSTANCE_ID),
        machine_image: MachineImage::amazon_linux_2023(&config.instance_type),
        instance_type: config.instance_type.clone(),
        key_pair: config.key_pair.clone(),
        subnet_id: subnet.subnet_id.clone(),
        security_groups: vec![group_id.clone()],
        user_data: None,
        statements: Vec::new(),
    }
    .synthesize(&mut stack, INSTANCE_ID)?;

    stack.export_named(
        outputs::INSTANCE_ID,
        instance.instance_id,
        Some("Bastion host instance id"),
    )?;
    let exported_group = stack.export_named(
        outputs::SECURITY_GROUP_ID,
        group_id,
        Some("Bastion host security group id"),
    )?;
    stack.export_named(
        outputs::PUBLIC_DNS_NAME,
        instance.public_dns_name,
        Some("Bastion host public DNS name"),
    )?;

    info!(stack = %name, instance_type = %config.instance_type, "built bastion stack");
    Ok(BastionStack {
        security_group: SecurityGroupHandle::new(name, exported_group),
        stack,
    })
}
