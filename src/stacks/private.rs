//! The private host stack: the sync server, reachable only through the
//! bastion.

use tracing::info;

use crate::environment::Environment;
use crate::error::Result;
use crate::model::compute::{InstanceSpec, MachineImage, SubnetSelection};
use crate::model::iam::bucket_read_statements;
use crate::model::network::{NetworkHandle, SubnetType};
use crate::model::security::{Port, SecurityGroupHandle, SecurityGroupSpec};
use crate::model::user_data::UserData;
use crate::settings::PrivateConfig;
use crate::stack::Stack;

/// Logical id of the private instance.
pub const INSTANCE_ID: &str = "PrivateHost";
/// Logical id of the private security group.
pub const SECURITY_GROUP_ID: &str = "PrivateHostSG";

/// Output names.
pub mod outputs {
    /// Instance id
    pub const INSTANCE_ID: &str = "PrivateHostId";
    /// Security group id
    pub const SECURITY_GROUP_ID: &str = "PrivateHostSecurityGroupId";
    /// Private IPv4 address of the instance
    pub const PRIVATE_IP: &str = "PrivateHostPrivateIP";
}

/// A built private host stack.
#[derive(Debug, Clone)]
pub struct PrivateStack {
    /// The stack
    pub stack: Stack,
    /// User data attached to the host
    pub user_data: UserData,
}

/// Build the private host stack named `name`, reachable over SSH from the
/// bastion's security group only.
pub fn build_private_stack(
    name: &str,
    config: &PrivateConfig,
    network: &NetworkHandle,
    bastion: &SecurityGroupHandle,
    env: &Environment,
) -> Result<PrivateStack> {
    let mut stack = Stack::new(name, env.clone())
        .with_description("Private host syncing from S3, reachable through the bastion");
    stack.add_dependency(network.producer());
    stack.add_dependency(bastion.producer());

    let sg_name = format!("{}-private-host-sg", name);
    let group_id = SecurityGroupSpec::new(sg_name, "security group for private host")
        .allow_ingress(bastion.as_peer(), Port::tcp(22), "SSH access from bastion host")
        .synthesize(&mut stack, SECURITY_GROUP_ID, network.vpc_id())?;

    let user_data = UserData::for_linux(config.user_data_format).add_script(&config.boot_script);

    let subnet = SubnetSelection(SubnetType::PrivateWithEgress).resolve(network)?;
    let instance = InstanceSpec {
        name: format!("{}/{}", name, INSTANCE_ID),
        machine_image: MachineImage::amazon_linux_2023(&config.instance_type),
        instance_type: config.instance_type.clone(),
        key_pair: config.key_pair.clone(),
        subnet_id: subnet.subnet_id.clone(),
        security_groups: vec![group_id.clone()],
        user_data: Some(user_data.clone()),
        statements: bucket_read_statements(&config.bucket_name),
    }
    .synthesize(&mut stack, INSTANCE_ID)?;

    stack.export_named(
        outputs::INSTANCE_ID,
        instance.instance_id,
        Some("Private host instance id"),
    )?;
    stack.export_named(
        outputs::SECURITY_GROUP_ID,
        group_id,
        Some("Private host security group id"),
    )?;
    stack.export_named(
        outputs::PRIVATE_IP,
        instance.private_ip,
        Some("Private host private IP address"),
    )?;

    info!(
        stack = %name,
        instance_type = %config.instance_type,
        bucket = %config.bucket_name,
        user_data = %config.user_data_format,
        "built private host stack"
    );
    Ok(PrivateStack { stack, user_data })
}
