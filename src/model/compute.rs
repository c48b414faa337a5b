//! EC2 instances, their images, and the IAM plumbing every instance gets.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::iam::{self, PolicyStatement};
use crate::model::network::{sanitize, NetworkHandle, SubnetRef, SubnetType};
use crate::model::user_data::UserData;
use crate::stack::{Parameter, Resource, Stack};
use crate::token::{name_tags, Token};

/// `family` + generation + optional attributes, then a size.
static INSTANCE_TYPE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-z]+[0-9]+[a-z-]*)\.(nano|micro|small|medium|large|[0-9]*xlarge|metal)$")
        .expect("Invalid instance type regex")
});

/// Families whose generation is followed by `g` run on Graviton.
static GRAVITON_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]+[0-9]+g").expect("Invalid graviton regex"));

/// Service principal assuming instance roles.
pub const EC2_SERVICE_PRINCIPAL: &str = "ec2.amazonaws.com";

/// An EC2 instance type such as `t3.nano`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstanceType {
    class: String,
    size: String,
}

impl InstanceType {
    /// Instance class, e.g. `t3`.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Instance size, e.g. `nano`.
    pub fn size(&self) -> &str {
        &self.size
    }

    /// CPU architecture of the class.
    pub fn architecture(&self) -> Architecture {
        if GRAVITON_REGEX.is_match(&self.class) {
            Architecture::Arm64
        } else {
            Architecture::X86_64
        }
    }
}

impl FromStr for InstanceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let caps = INSTANCE_TYPE_REGEX
            .captures(s.trim())
            .ok_or_else(|| Error::InvalidInstanceType(s.to_string()))?;
        Ok(Self {
            class: caps[1].to_string(),
            size: caps[2].to_string(),
        })
    }
}

impl TryFrom<String> for InstanceType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<InstanceType> for String {
    fn from(value: InstanceType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.size)
    }
}

/// CPU architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Architecture {
    /// Intel and AMD
    X86_64,
    /// Graviton
    Arm64,
}

impl Architecture {
    fn ssm_suffix(&self) -> &'static str {
        match self {
            Architecture::X86_64 => "x86_64",
            Architecture::Arm64 => "arm64",
        }
    }
}

/// Machine image an instance boots from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineImage {
    /// Latest Amazon Linux 2023, resolved at deploy time
    LatestAmazonLinux2023 {
        /// Image architecture
        arch: Architecture,
    },
}

impl MachineImage {
    /// Latest Amazon Linux 2023 for an instance type.
    pub fn amazon_linux_2023(instance_type: &InstanceType) -> Self {
        MachineImage::LatestAmazonLinux2023 {
            arch: instance_type.architecture(),
        }
    }

    /// Public SSM parameter holding the image id.
    pub fn ssm_parameter(&self) -> String {
        match self {
            MachineImage::LatestAmazonLinux2023 { arch } => format!(
                "/aws/service/ami-amazon-linux-latest/al2023-ami-kernel-default-{}",
                arch.ssm_suffix()
            ),
        }
    }

    /// Declare the template parameter resolving the image and return a
    /// `Ref` to it. Instances sharing an image share the parameter.
    pub fn synthesize(&self, stack: &mut Stack) -> Token {
        let name = self.ssm_parameter();
        stack.add_parameter(
            format!("SsmParameterValue{}Parameter", sanitize(&name)),
            Parameter {
                kind: "AWS::SSM::Parameter::Value<AWS::EC2::Image::Id>".to_string(),
                default: Some(name),
                description: None,
            },
        )
    }
}

/// An existing EC2 key pair, referenced by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPairRef(pub String);

impl KeyPairRef {
    /// Key pair name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Subnet placement of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubnetSelection(pub SubnetType);

impl SubnetSelection {
    /// The subnet of `network` an instance with this placement lands in.
    pub fn resolve<'a>(&self, network: &'a NetworkHandle) -> Result<&'a SubnetRef> {
        network.select(self.0)
    }
}

/// An instance to declare.
#[derive(Debug, Clone)]
pub struct InstanceSpec {
    /// `Name` tag
    pub name: String,
    /// Instance type
    pub instance_type: InstanceType,
    /// Boot image
    pub machine_image: MachineImage,
    /// SSH key pair
    pub key_pair: KeyPairRef,
    /// Subnet id the instance is placed in
    pub subnet_id: Token,
    /// Security group ids
    pub security_groups: Vec<Token>,
    /// Boot script
    pub user_data: Option<UserData>,
    /// Statements granted to the instance role
    pub statements: Vec<PolicyStatement>,
}

/// Tokens of a declared instance.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceTokens {
    /// `Ref` to the instance
    pub instance_id: Token,
    /// Public DNS name
    pub public_dns_name: Token,
    /// Private IPv4 address
    pub private_ip: Token,
    /// `Ref` to the instance role
    pub role: Token,
}

impl InstanceSpec {
    /// Declare the instance under logical id `id`, along with its role,
    /// instance profile, and inline policy.
    pub fn synthesize(&self, stack: &mut Stack, id: &str) -> Result<InstanceTokens> {
        let role_id = format!("{}InstanceRole", id);
        let policy_id = format!("{}InstanceRoleDefaultPolicy", id);
        let profile_id = format!("{}InstanceProfile", id);

        let role = stack.add_resource(
            &role_id,
            Resource::new("AWS::IAM::Role")
                .property(
                    "AssumeRolePolicyDocument",
                    iam::assume_role_policy(EC2_SERVICE_PRINCIPAL),
                )
                .property("Tags", name_tags(self.name.clone())),
        )?;

        let mut instance = Resource::new("AWS::EC2::Instance");
        if !self.statements.is_empty() {
            stack.add_resource(
                &policy_id,
                Resource::new("AWS::IAM::Policy")
                    .property("PolicyDocument", iam::policy_document(&self.statements))
                    .property("PolicyName", policy_id.clone())
                    .property("Roles", Token::list([role.clone()])),
            )?;
            instance = instance.depends_on(&policy_id);
        }

        let profile = stack.add_resource(
            &profile_id,
            Resource::new("AWS::IAM::InstanceProfile").property("Roles", Token::list([role.clone()])),
        )?;

        let image_id = self.machine_image.synthesize(stack);

        let instance = instance
            .property("IamInstanceProfile", profile)
            .property("ImageId", image_id)
            .property("InstanceType", self.instance_type.to_string())
            .property("KeyName", self.key_pair.name())
            .property("SecurityGroupIds", Token::list(self.security_groups.iter().cloned()))
            .property("SubnetId", self.subnet_id.clone())
            .property("Tags", name_tags(self.name.clone()))
            .property_opt("UserData", self.user_data.as_ref().map(UserData::to_token))
            .depends_on(&role_id);

        debug!(
            stack = %stack.name(),
            instance = %id,
            instance_type = %self.instance_type,
            "declaring instance"
        );
        let instance_id = stack.add_resource(id, instance)?;

        Ok(InstanceTokens {
            instance_id,
            public_dns_name: Token::get_att(id, "PublicDnsName"),
            private_ip: Token::get_att(id, "PrivateIp"),
            role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::model::user_data::{BootScript, UserDataFormat};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn spec(statements: Vec<PolicyStatement>) -> InstanceSpec {
        let instance_type: InstanceType = "t3.micro".parse().unwrap();
        InstanceSpec {
            name: "host".to_string(),
            machine_image: MachineImage::amazon_linux_2023(&instance_type),
            instance_type,
            key_pair: KeyPairRef("my-key".to_string()),
            subnet_id: Token::str("subnet-1"),
            security_groups: vec![Token::get_att("Sg", "GroupId")],
            user_data: Some(
                UserData::for_linux(UserDataFormat::Inline)
                    .add_script(&BootScript::from_commands(["echo hi"])),
            ),
            statements,
        }
    }

    #[test]
    fn test_parse_instance_type() {
        let t: InstanceType = "t3.nano".parse().unwrap();
        assert_eq!(t.class(), "t3");
        assert_eq!(t.size(), "nano");
        assert_eq!(t.to_string(), "t3.nano");
        assert_eq!(t.architecture(), Architecture::X86_64);

        let t: InstanceType = "m5.2xlarge".parse().unwrap();
        assert_eq!(t.size(), "2xlarge");
    }

    #[test]
    fn test_graviton_is_arm() {
        let t: InstanceType = "t4g.small".parse().unwrap();
        assert_eq!(t.architecture(), Architecture::Arm64);
        assert!(MachineImage::amazon_linux_2023(&t)
            .ssm_parameter()
            .ends_with("arm64"));
    }

    #[test]
    fn test_reject_bad_instance_type() {
        for bad in ["t3", "nano", "t3.huge", "T3.micro", ""] {
            assert!(bad.parse::<InstanceType>().is_err(), "{} should fail", bad);
        }
    }

    #[test]
    fn test_image_is_ssm_parameter() {
        let mut stack = Stack::new("s", Environment::default());
        let image = MachineImage::LatestAmazonLinux2023 {
            arch: Architecture::X86_64,
        };
        let first = image.synthesize(&mut stack);
        let second = image.synthesize(&mut stack);
        assert_eq!(first, second);
        assert_eq!(stack.parameters().len(), 1);

        let (_, param) = stack.parameters().first().unwrap();
        assert_eq!(param.kind, "AWS::SSM::Parameter::Value<AWS::EC2::Image::Id>");
        assert_eq!(
            param.default.as_deref(),
            Some("/aws/service/ami-amazon-linux-latest/al2023-ami-kernel-default-x86_64")
        );
    }

    #[test]
    fn test_synthesize_instance() {
        let mut stack = Stack::new("s", Environment::default());
        stack
            .add_resource("Sg", Resource::new("AWS::EC2::SecurityGroup"))
            .unwrap();
        let tokens = spec(iam::bucket_read_statements("b"))
            .synthesize(&mut stack, "Host")
            .unwrap();

        assert_eq!(tokens.instance_id, Token::reference("Host"));
        assert_eq!(tokens.private_ip, Token::get_att("Host", "PrivateIp"));

        let instance = stack.resource("Host").unwrap();
        assert_eq!(instance.get("InstanceType"), Some(&Token::str("t3.micro")));
        assert_eq!(instance.get("KeyName"), Some(&Token::str("my-key")));
        assert_eq!(
            instance.depends_on,
            vec!["HostInstanceRoleDefaultPolicy", "HostInstanceRole"]
        );
        assert_eq!(
            instance.get("UserData").unwrap().to_json(),
            json!({"Fn::Base64": "#!/bin/bash\necho hi"})
        );

        let policy = stack.resource("HostInstanceRoleDefaultPolicy").unwrap();
        assert_eq!(policy.kind, "AWS::IAM::Policy");
        stack.validate().unwrap();
    }

    #[test]
    fn test_no_policy_without_statements() {
        let mut stack = Stack::new("s", Environment::default());
        stack
            .add_resource("Sg", Resource::new("AWS::EC2::SecurityGroup"))
            .unwrap();
        spec(Vec::new()).synthesize(&mut stack, "Host").unwrap();
        assert!(stack.resource("HostInstanceRoleDefaultPolicy").is_none());
        assert!(stack.resource("HostInstanceProfile").is_some());
        stack.validate().unwrap();
    }
}
