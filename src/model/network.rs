//! Network declarations: CIDR blocks, subnet groups, and the VPC itself.
//!
//! [`VpcSpec`] describes a VPC to create. Subnets are allocated
//! deterministically: groups in declaration order, one subnet per
//! availability zone within a group, each block aligned to its own size and
//! packed after the previous one.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use tracing::debug;

use crate::error::{Error, Result};
use crate::stack::{Resource, Stack};
use crate::token::{name_tags, tags, Token};

/// Smallest subnet (largest mask) the provider accepts.
pub const MAX_SUBNET_MASK: u8 = 28;
/// Largest VPC (smallest mask) the provider accepts.
pub const MIN_VPC_MASK: u8 = 16;

/// Most availability zones any region offers.
pub const MAX_AZS: usize = 6;

/// Default VPC address range.
pub const DEFAULT_VPC_CIDR: &str = "10.0.0.0/16";

/// Default subnet mask for both subnet groups.
pub const DEFAULT_SUBNET_MASK: u8 = 20;

/// An IPv4 network in CIDR notation.
///
/// Invariants:
/// - Prefix length is at most 32
/// - Host bits of the network address are zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Cidr {
    network: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Cidr {
    /// Create a CIDR block from its parts.
    pub fn new(network: Ipv4Addr, prefix: u8) -> Result<Self> {
        if prefix > 32 {
            return Err(Error::InvalidCidr(format!("{}/{}", network, prefix)));
        }
        if u32::from(network) & !mask(prefix) != 0 {
            return Err(Error::InvalidCidr(format!("{}/{}", network, prefix)));
        }
        Ok(Self { network, prefix })
    }

    /// `0.0.0.0/0`.
    pub const fn any() -> Self {
        Self {
            network: Ipv4Addr::UNSPECIFIED,
            prefix: 0,
        }
    }

    /// Network address.
    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    /// Prefix length.
    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// True for `0.0.0.0/0`.
    pub fn is_any(&self) -> bool {
        self.prefix == 0
    }

    /// Number of addresses in the block.
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix))
    }

    fn start(&self) -> u64 {
        u64::from(u32::from(self.network))
    }

    fn end(&self) -> u64 {
        self.start() + self.size()
    }

    /// True if `other` lies entirely inside this block.
    pub fn contains(&self, other: &Ipv4Cidr) -> bool {
        other.prefix >= self.prefix && other.start() >= self.start() && other.end() <= self.end()
    }

    /// True if the two blocks share any address.
    pub fn overlaps(&self, other: &Ipv4Cidr) -> bool {
        self.start() < other.end() && other.start() < self.end()
    }

    /// Consecutive child blocks of size `/new_prefix`, lowest first.
    pub fn subnets(&self, new_prefix: u8) -> Result<impl Iterator<Item = Ipv4Cidr>> {
        if new_prefix < self.prefix || new_prefix > 32 {
            return Err(Error::InvalidCidr(format!("{}/{}", self.network, new_prefix)));
        }
        let step = 1u64 << (32 - u32::from(new_prefix));
        let count = 1u64 << u32::from(new_prefix - self.prefix);
        let start = self.start();
        Ok((0..count).map(move |i| Ipv4Cidr {
            network: Ipv4Addr::from((start + i * step) as u32),
            prefix: new_prefix,
        }))
    }
}

fn mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

impl FromStr for Ipv4Cidr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, prefix) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| Error::InvalidCidr(s.to_string()))?;
        let network =
            Ipv4Addr::from_str(addr).map_err(|_| Error::InvalidCidr(s.to_string()))?;
        let prefix = prefix
            .parse::<u8>()
            .map_err(|_| Error::InvalidCidr(s.to_string()))?;
        Self::new(network, prefix)
    }
}

impl TryFrom<String> for Ipv4Cidr {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Ipv4Cidr> for String {
    fn from(value: Ipv4Cidr) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

/// Placement class of a subnet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubnetType {
    /// Routed to an internet gateway; instances may get public addresses
    Public,
    /// No inbound route from the internet; outbound through a NAT gateway
    PrivateWithEgress,
    /// No route to or from the internet
    PrivateIsolated,
}

impl SubnetType {
    /// Value of the `aws-cdk:subnet-type` tag and of lookup responses.
    pub fn tag_value(&self) -> &'static str {
        match self {
            SubnetType::Public => "Public",
            SubnetType::PrivateWithEgress => "Private",
            SubnetType::PrivateIsolated => "Isolated",
        }
    }
}

impl fmt::Display for SubnetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubnetType::Public => "public",
            SubnetType::PrivateWithEgress => "private-with-egress",
            SubnetType::PrivateIsolated => "private-isolated",
        };
        f.write_str(s)
    }
}

/// A subnet group: one subnet of this shape in every availability zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetGroup {
    /// Group name, also used in logical ids and tags
    pub name: String,
    /// Placement class
    pub subnet_type: SubnetType,
    /// Mask size of every subnet in the group
    pub cidr_mask: u8,
}

impl SubnetGroup {
    /// Create a subnet group.
    pub fn new(name: impl Into<String>, subnet_type: SubnetType, cidr_mask: u8) -> Self {
        Self {
            name: name.into(),
            subnet_type,
            cidr_mask,
        }
    }
}

/// AWS services reachable through a gateway endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayService {
    /// Object storage
    S3,
    /// DynamoDB
    DynamoDb,
}

impl GatewayService {
    fn suffix(&self) -> &'static str {
        match self {
            GatewayService::S3 => "s3",
            GatewayService::DynamoDb => "dynamodb",
        }
    }

    /// Regional service name, resolved at deploy time.
    pub fn service_name(&self) -> Token {
        Token::Join(
            String::new(),
            vec![
                Token::str("com.amazonaws."),
                Token::region(),
                Token::str(format!(".{}", self.suffix())),
            ],
        )
    }
}

/// A gateway endpoint attached to every route table of the VPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayEndpoint {
    /// Endpoint id, used in the logical id
    pub id: String,
    /// Target service
    pub service: GatewayService,
}

/// A VPC to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpcSpec {
    /// Address range
    pub cidr: Ipv4Cidr,
    /// Number of availability zones to span
    pub max_azs: usize,
    /// Subnet groups in allocation order
    pub subnet_groups: Vec<SubnetGroup>,
    /// Gateway endpoints
    pub gateway_endpoints: Vec<GatewayEndpoint>,
    /// NAT gateways to place in the public subnets
    pub nat_gateways: usize,
}

impl Default for VpcSpec {
    fn default() -> Self {
        Self {
            // DEFAULT_VPC_CIDR spelled out; `parse` is not const
            cidr: Ipv4Cidr {
                network: Ipv4Addr::new(10, 0, 0, 0),
                prefix: 16,
            },
            max_azs: 1,
            subnet_groups: vec![
                SubnetGroup::new("Public", SubnetType::Public, DEFAULT_SUBNET_MASK),
                SubnetGroup::new("Private", SubnetType::PrivateWithEgress, DEFAULT_SUBNET_MASK),
            ],
            gateway_endpoints: vec![GatewayEndpoint {
                id: "S3".to_string(),
                service: GatewayService::S3,
            }],
            nat_gateways: 1,
        }
    }
}

/// An existing VPC to resolve by name instead of creating one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcLookup {
    /// Value of the VPC's `Name` tag
    pub name: String,
    /// Restrict the search to the account's default VPC
    pub is_default: bool,
}

impl VpcLookup {
    /// Look up a VPC by `Name` tag.
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_default: true,
        }
    }
}

/// A subnet with its allocated address range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatedSubnet {
    /// Owning group
    pub group: String,
    /// Placement class
    pub subnet_type: SubnetType,
    /// Zero-based availability zone index
    pub az_index: usize,
    /// Address range
    pub cidr: Ipv4Cidr,
}

/// Subnet tokens local to the stack that declared the VPC.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalSubnet {
    /// Allocation this subnet was created from
    pub allocation: AllocatedSubnet,
    /// Logical id of the subnet resource
    pub logical_id: String,
    /// `Ref` to the subnet
    pub subnet_id: Token,
    /// `Ref` to the subnet's route table
    pub route_table_id: Token,
}

/// Tokens of a VPC declared in the current stack.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVpc {
    /// `Ref` to the VPC
    pub vpc_id: Token,
    /// Subnets in allocation order
    pub subnets: Vec<LocalSubnet>,
}

impl VpcSpec {
    /// Check the layout before allocation.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_VPC_MASK..=MAX_SUBNET_MASK).contains(&self.cidr.prefix()) {
            return Err(Error::InvalidNetwork(format!(
                "VPC mask /{} must be between /{} and /{}",
                self.cidr.prefix(),
                MIN_VPC_MASK,
                MAX_SUBNET_MASK
            )));
        }
        if !(1..=MAX_AZS).contains(&self.max_azs) {
            return Err(Error::InvalidNetwork(format!(
                "max_azs {} must be between 1 and {}",
                self.max_azs, MAX_AZS
            )));
        }
        if self.subnet_groups.is_empty() {
            return Err(Error::InvalidNetwork("no subnet groups".to_string()));
        }

        let mut seen = Vec::new();
        for group in &self.subnet_groups {
            if seen.contains(&group.name.as_str()) {
                return Err(Error::InvalidNetwork(format!(
                    "duplicate subnet group '{}'",
                    group.name
                )));
            }
            seen.push(group.name.as_str());

            if group.cidr_mask < self.cidr.prefix() || group.cidr_mask > MAX_SUBNET_MASK {
                return Err(Error::InvalidNetwork(format!(
                    "subnet group '{}' mask /{} must be between /{} and /{}",
                    group.name,
                    group.cidr_mask,
                    self.cidr.prefix(),
                    MAX_SUBNET_MASK
                )));
            }
        }

        let has_public = self.has_group_of(SubnetType::Public);
        if self.has_group_of(SubnetType::PrivateWithEgress) && (!has_public || self.nat_gateways == 0)
        {
            return Err(Error::InvalidNetwork(
                "private-with-egress subnets need a public subnet group and at least one NAT gateway"
                    .to_string(),
            ));
        }
        Ok(())
    }

    fn has_group_of(&self, subnet_type: SubnetType) -> bool {
        self.subnet_groups.iter().any(|g| g.subnet_type == subnet_type)
    }

    /// Carve subnet ranges out of the VPC range.
    pub fn allocate(&self) -> Result<Vec<AllocatedSubnet>> {
        self.validate()?;

        let vpc_end = self.cidr.end();
        let mut cursor = self.cidr.start();
        let mut allocated = Vec::new();

        for group in &self.subnet_groups {
            let block = 1u64 << (32 - u32::from(group.cidr_mask));
            for az_index in 0..self.max_azs {
                cursor = cursor.div_ceil(block) * block;
                if cursor + block > vpc_end {
                    return Err(Error::SubnetAllocation {
                        group: group.name.clone(),
                        vpc_cidr: self.cidr.to_string(),
                    });
                }
                let network = Ipv4Addr::from(cursor as u32);
                allocated.push(AllocatedSubnet {
                    group: group.name.clone(),
                    subnet_type: group.subnet_type,
                    az_index,
                    cidr: Ipv4Cidr::new(network, group.cidr_mask)?,
                });
                cursor += block;
            }
        }
        Ok(allocated)
    }

    /// Declare the VPC and its routing in `stack` under the logical id
    /// prefix `id`.
    pub fn synthesize(&self, stack: &mut Stack, id: &str, name: &str) -> Result<LocalVpc> {
        let allocation = self.allocate()?;

        let vpc_id = stack.add_resource(
            id,
            Resource::new("AWS::EC2::VPC")
                .property("CidrBlock", self.cidr.to_string())
                .property("EnableDnsHostnames", true)
                .property("EnableDnsSupport", true)
                .property("InstanceTenancy", "default")
                .property("Tags", name_tags(name)),
        )?;

        let igw_id = format!("{}IGW", id);
        let attachment_id = format!("{}VPCGW", id);
        if self.has_group_of(SubnetType::Public) {
            let igw = stack.add_resource(
                &igw_id,
                Resource::new("AWS::EC2::InternetGateway").property("Tags", name_tags(name)),
            )?;
            stack.add_resource(
                &attachment_id,
                Resource::new("AWS::EC2::VPCGatewayAttachment")
                    .property("VpcId", vpc_id.clone())
                    .property("InternetGatewayId", igw),
            )?;
        }

        let mut subnets = Vec::with_capacity(allocation.len());
        for subnet in allocation {
            let logical_id = format!(
                "{}{}Subnet{}",
                id,
                sanitize(&subnet.group),
                subnet.az_index + 1
            );
            let subnet_name = format!("{}/{}Subnet{}", name, subnet.group, subnet.az_index + 1);

            let subnet_ref = stack.add_resource(
                &logical_id,
                Resource::new("AWS::EC2::Subnet")
                    .property(
                        "AvailabilityZone",
                        Token::Select(subnet.az_index, Box::new(Token::AvailabilityZones)),
                    )
                    .property("CidrBlock", subnet.cidr.to_string())
                    .property("MapPublicIpOnLaunch", subnet.subnet_type == SubnetType::Public)
                    .property(
                        "Tags",
                        tags([
                            ("Name".to_string(), subnet_name.clone()),
                            ("aws-cdk:subnet-name".to_string(), subnet.group.clone()),
                            (
                                "aws-cdk:subnet-type".to_string(),
                                subnet.subnet_type.tag_value().to_string(),
                            ),
                        ]),
                    )
                    .property("VpcId", vpc_id.clone()),
            )?;

            let route_table = stack.add_resource(
                format!("{}RouteTable", logical_id),
                Resource::new("AWS::EC2::RouteTable")
                    .property("Tags", name_tags(subnet_name))
                    .property("VpcId", vpc_id.clone()),
            )?;
            stack.add_resource(
                format!("{}RouteTableAssociation", logical_id),
                Resource::new("AWS::EC2::SubnetRouteTableAssociation")
                    .property("RouteTableId", route_table.clone())
                    .property("SubnetId", subnet_ref.clone()),
            )?;

            debug!(subnet = %logical_id, cidr = %subnet.cidr, "allocated subnet");
            subnets.push(LocalSubnet {
                allocation: subnet,
                logical_id,
                subnet_id: subnet_ref,
                route_table_id: route_table,
            });
        }

        // Public routes and NAT gateways
        let mut nat_gateways = Vec::new();
        for subnet in subnets
            .iter()
            .filter(|s| s.allocation.subnet_type == SubnetType::Public)
        {
            stack.add_resource(
                format!("{}DefaultRoute", subnet.logical_id),
                Resource::new("AWS::EC2::Route")
                    .property("DestinationCidrBlock", Ipv4Cidr::any().to_string())
                    .property("GatewayId", Token::reference(&igw_id))
                    .property("RouteTableId", subnet.route_table_id.clone())
                    .depends_on(&attachment_id),
            )?;

            let wants_nat = nat_gateways.len() < self.nat_gateways
                && self.has_group_of(SubnetType::PrivateWithEgress)
                && !nat_gateways
                    .iter()
                    .any(|(az, _): &(usize, Token)| *az == subnet.allocation.az_index);
            if wants_nat {
                let eip_id = format!("{}EIP", subnet.logical_id);
                stack.add_resource(
                    &eip_id,
                    Resource::new("AWS::EC2::EIP")
                        .property("Domain", "vpc")
                        .property("Tags", name_tags(format!("{}/{}", name, subnet.logical_id))),
                )?;
                let nat = stack.add_resource(
                    format!("{}NATGateway", subnet.logical_id),
                    Resource::new("AWS::EC2::NatGateway")
                        .property("AllocationId", Token::get_att(&eip_id, "AllocationId"))
                        .property("SubnetId", subnet.subnet_id.clone())
                        .property("Tags", name_tags(format!("{}/{}", name, subnet.logical_id)))
                        .depends_on(format!("{}DefaultRoute", subnet.logical_id))
                        .depends_on(format!("{}RouteTableAssociation", subnet.logical_id)),
                )?;
                nat_gateways.push((subnet.allocation.az_index, nat));
            }
        }

        // Private-with-egress routes through the NAT in the same AZ when
        // there is one, otherwise round-robin
        for subnet in subnets
            .iter()
            .filter(|s| s.allocation.subnet_type == SubnetType::PrivateWithEgress)
        {
            let nat = nat_gateways
                .iter()
                .find(|(az, _)| *az == subnet.allocation.az_index)
                .or_else(|| {
                    subnet
                        .allocation
                        .az_index
                        .checked_rem(nat_gateways.len())
                        .and_then(|i| nat_gateways.get(i))
                })
                .map(|(_, nat)| nat.clone())
                .ok_or_else(|| {
                    Error::InvalidNetwork(format!("no NAT gateway for {}", subnet.logical_id))
                })?;
            stack.add_resource(
                format!("{}DefaultRoute", subnet.logical_id),
                Resource::new("AWS::EC2::Route")
                    .property("DestinationCidrBlock", Ipv4Cidr::any().to_string())
                    .property("NatGatewayId", nat)
                    .property("RouteTableId", subnet.route_table_id.clone()),
            )?;
        }

        for endpoint in &self.gateway_endpoints {
            let route_tables = Token::list(subnets.iter().map(|s| s.route_table_id.clone()));
            stack.add_resource(
                format!("{}{}", id, sanitize(&endpoint.id)),
                Resource::new("AWS::EC2::VPCEndpoint")
                    .property("RouteTableIds", route_tables)
                    .property("ServiceName", endpoint.service.service_name())
                    .property("VpcEndpointType", "Gateway")
                    .property("VpcId", vpc_id.clone()),
            )?;
        }

        Ok(LocalVpc { vpc_id, subnets })
    }
}

/// Keep only characters valid in a logical id.
pub(crate) fn sanitize(s: &str) -> String {
    s.chars().filter(char::is_ascii_alphanumeric).collect()
}

/// A subnet as seen by a consuming stack.
#[derive(Debug, Clone, PartialEq)]
pub struct SubnetRef {
    /// Owning group name
    pub group: String,
    /// Placement class
    pub subnet_type: SubnetType,
    /// Subnet id token
    pub subnet_id: Token,
}

/// Handle to the deployment's network, passed from the network stack to
/// both compute stacks.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkHandle {
    producer: String,
    vpc_id: Token,
    subnets: Vec<SubnetRef>,
}

impl NetworkHandle {
    /// Create a handle.
    pub fn new(producer: impl Into<String>, vpc_id: Token, subnets: Vec<SubnetRef>) -> Self {
        Self {
            producer: producer.into(),
            vpc_id,
            subnets,
        }
    }

    /// Stack that owns the network.
    pub fn producer(&self) -> &str {
        &self.producer
    }

    /// VPC id token.
    pub fn vpc_id(&self) -> &Token {
        &self.vpc_id
    }

    /// All subnets.
    pub fn subnets(&self) -> &[SubnetRef] {
        &self.subnets
    }

    /// First subnet of the given type.
    pub fn select(&self, subnet_type: SubnetType) -> Result<&SubnetRef> {
        self.subnets
            .iter()
            .find(|s| s.subnet_type == subnet_type)
            .ok_or_else(|| Error::NoSuchSubnet {
                stack: self.producer.clone(),
                subnet_type: subnet_type.to_string(),
            })
    }

    /// Number of subnets per group name.
    pub fn group_sizes(&self) -> IndexMap<&str, usize> {
        let mut sizes = IndexMap::new();
        for subnet in &self.subnets {
            *sizes.entry(subnet.group.as_str()).or_insert(0) += 1;
        }
        sizes
    }
}
