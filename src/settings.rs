//! Typed deployment settings parsed from the [`Context`].
//!
//! Every context key the stacks read is interpreted here, once. Builders in
//! [`crate::stacks`] only ever see these typed structs.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::model::compute::{InstanceType, KeyPairRef};
use crate::model::network::{Ipv4Cidr, VpcLookup, VpcSpec};
use crate::model::user_data::{BootScript, UserDataFormat, SYNC_CLIENT_URL};

/// Context keys.
pub mod keys {
    /// First part of every stack name
    pub const PROJECT_PREFIX: &str = "project_prefix";
    /// Second part of every stack name
    pub const PROJECT_NAME: &str = "project_name";
    /// Resolve an existing VPC instead of creating one
    pub const USE_EXISTING_VPC: &str = "use_existing_vpc";
    /// `Name` tag of the existing VPC
    pub const EXISTING_VPC_NAME: &str = "existing_vpc_name";
    /// Restrict the lookup to the default VPC
    pub const EXISTING_VPC_IS_DEFAULT: &str = "existing_vpc_is_default";
    /// Key pair of the bastion host
    pub const BASTION_KEY_PAIR: &str = "ec2_bastion_key_pair_name";
    /// Key pair of the private host
    pub const PRIVATE_KEY_PAIR: &str = "ec2_private_key_pair_name";
    /// Bucket the private host reads from
    pub const BUCKET_NAME: &str = "bucket_name";
    /// Address range of a new VPC
    pub const VPC_CIDR: &str = "vpc_cidr";
    /// Availability zones of a new VPC
    pub const MAX_AZS: &str = "max_azs";
    /// Bastion instance type
    pub const BASTION_INSTANCE_TYPE: &str = "bastion_instance_type";
    /// Private host instance type
    pub const PRIVATE_INSTANCE_TYPE: &str = "private_instance_type";
    /// Source range allowed to SSH into the bastion
    pub const BASTION_SSH_CIDR: &str = "bastion_ssh_cidr";
    /// Installer downloaded by the private host
    pub const SYNC_CLIENT_URL: &str = "sync_client_url";
    /// `inline` or `multipart`
    pub const USER_DATA_FORMAT: &str = "user_data_format";
}

/// Default bastion instance type.
pub const DEFAULT_BASTION_INSTANCE_TYPE: &str = "t3.nano";
/// Default private host instance type.
pub const DEFAULT_PRIVATE_INSTANCE_TYPE: &str = "t3.micro";

static BUCKET_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").expect("Invalid bucket name regex")
});

/// Where the deployment's network comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkSource {
    /// Create a new VPC
    Create(VpcSpec),
    /// Resolve an existing VPC by name
    Lookup(VpcLookup),
}

/// Settings of the network stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// VPC to create or resolve
    pub source: NetworkSource,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            source: NetworkSource::Create(VpcSpec::default()),
        }
    }
}

/// Settings of the bastion stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BastionConfig {
    /// Instance type
    pub instance_type: InstanceType,
    /// Imported key pair
    pub key_pair: KeyPairRef,
    /// Source range allowed to SSH in
    pub ssh_source: Ipv4Cidr,
}

/// Settings of the private host stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateConfig {
    /// Instance type
    pub instance_type: InstanceType,
    /// Imported key pair
    pub key_pair: KeyPairRef,
    /// Bucket the host may list and read
    pub bucket_name: String,
    /// First-boot script
    pub boot_script: BootScript,
    /// How the script is attached
    pub user_data_format: UserDataFormat,
}

/// All deployment settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Project prefix
    pub project_prefix: String,
    /// Project name
    pub project_name: String,
    /// Network stack
    pub network: NetworkConfig,
    /// Bastion stack
    pub bastion: BastionConfig,
    /// Private host stack
    pub private: PrivateConfig,
}

impl Settings {
    /// Interpret a context.
    pub fn from_context(ctx: &Context) -> Result<Self> {
        let project_prefix = ctx.require_str(keys::PROJECT_PREFIX)?;
        let project_name = ctx.require_str(keys::PROJECT_NAME)?;

        Ok(Self {
            project_prefix,
            project_name,
            network: network_config(ctx)?,
            bastion: bastion_config(ctx)?,
            private: private_config(ctx)?,
        })
    }

    /// `{project_prefix}-{project_name}`, the prefix of every stack name.
    pub fn name_prefix(&self) -> String {
        format!("{}-{}", self.project_prefix, self.project_name)
    }

    /// Name of the network stack.
    pub fn network_stack_name(&self) -> String {
        format!("{}-VpcMainStack", self.name_prefix())
    }

    /// Name of the bastion stack.
    pub fn bastion_stack_name(&self) -> String {
        format!("{}-BastionHostStack", self.name_prefix())
    }

    /// Name of the private host stack.
    pub fn private_stack_name(&self) -> String {
        format!("{}-PrivateHostStack", self.name_prefix())
    }
}

fn network_config(ctx: &Context) -> Result<NetworkConfig> {
    if ctx.get_bool(keys::USE_EXISTING_VPC)?.unwrap_or(false) {
        let name = ctx.get_str(keys::EXISTING_VPC_NAME)?.ok_or_else(|| {
            Error::invalid_context(
                keys::EXISTING_VPC_NAME,
                format!("required when {} is set", keys::USE_EXISTING_VPC),
            )
        })?;
        let mut lookup = VpcLookup::by_name(name);
        if let Some(is_default) = ctx.get_bool(keys::EXISTING_VPC_IS_DEFAULT)? {
            lookup.is_default = is_default;
        }
        return Ok(NetworkConfig {
            source: NetworkSource::Lookup(lookup),
        });
    }

    let mut spec = VpcSpec::default();
    if let Some(cidr) = ctx.get_parsed::<Ipv4Cidr>(keys::VPC_CIDR)? {
        spec.cidr = cidr;
    }
    if let Some(max_azs) = ctx.get_parsed::<usize>(keys::MAX_AZS)? {
        spec.max_azs = max_azs;
    }
    spec.validate()?;
    Ok(NetworkConfig {
        source: NetworkSource::Create(spec),
    })
}

fn instance_type(ctx: &Context, key: &str, default: &str) -> Result<InstanceType> {
    ctx.get_str(key)?
        .as_deref()
        .unwrap_or(default)
        .parse()
        .map_err(|e: Error| Error::invalid_context(key, e.to_string()))
}

fn bastion_config(ctx: &Context) -> Result<BastionConfig> {
    Ok(BastionConfig {
        instance_type: instance_type(
            ctx,
            keys::BASTION_INSTANCE_TYPE,
            DEFAULT_BASTION_INSTANCE_TYPE,
        )?,
        key_pair: KeyPairRef(ctx.require_str(keys::BASTION_KEY_PAIR)?),
        ssh_source: ctx
            .get_parsed::<Ipv4Cidr>(keys::BASTION_SSH_CIDR)?
            .unwrap_or_else(Ipv4Cidr::any),
    })
}

fn private_config(ctx: &Context) -> Result<PrivateConfig> {
    let bucket_name = ctx.require_str(keys::BUCKET_NAME)?;
    if !BUCKET_NAME_REGEX.is_match(&bucket_name) {
        return Err(Error::invalid_context(
            keys::BUCKET_NAME,
            format!("'{}' is not a valid bucket name", bucket_name),
        ));
    }

    let url = ctx
        .get_str(keys::SYNC_CLIENT_URL)?
        .unwrap_or_else(|| SYNC_CLIENT_URL.to_string());
    let url = Url::parse(&url)
        .map_err(|e| Error::invalid_context(keys::SYNC_CLIENT_URL, e.to_string()))?;
    let boot_script = BootScript::sync_client(&url)
        .map_err(|e| Error::invalid_context(keys::SYNC_CLIENT_URL, e.to_string()))?;

    Ok(PrivateConfig {
        instance_type: instance_type(
            ctx,
            keys::PRIVATE_INSTANCE_TYPE,
            DEFAULT_PRIVATE_INSTANCE_TYPE,
        )?,
        key_pair: KeyPairRef(ctx.require_str(keys::PRIVATE_KEY_PAIR)?),
        bucket_name,
        boot_script,
        user_data_format: ctx
            .get_parsed::<UserDataFormat>(keys::USER_DATA_FORMAT)?
            .unwrap_or_default(),
    })
}
