//! Security groups and their ingress rules.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::model::network::Ipv4Cidr;
use crate::stack::{Resource, Stack};
use crate::token::{tags, Token};

/// Transport protocol of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP
    Tcp,
    /// UDP
    Udp,
    /// Every protocol
    All,
}

impl Protocol {
    /// `IpProtocol` value in a template.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::All => "-1",
        }
    }
}

/// Protocol and port range a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    /// Protocol
    pub protocol: Protocol,
    /// First port, absent for all-traffic rules
    pub from_port: Option<u16>,
    /// Last port, absent for all-traffic rules
    pub to_port: Option<u16>,
}

impl Port {
    /// A single TCP port.
    pub fn tcp(port: u16) -> Self {
        Self {
            protocol: Protocol::Tcp,
            from_port: Some(port),
            to_port: Some(port),
        }
    }

    /// A TCP port range.
    pub fn tcp_range(from: u16, to: u16) -> Self {
        Self {
            protocol: Protocol::Tcp,
            from_port: Some(from),
            to_port: Some(to),
        }
    }

    /// Every protocol and port.
    pub fn all_traffic() -> Self {
        Self {
            protocol: Protocol::All,
            from_port: None,
            to_port: None,
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.protocol, self.from_port, self.to_port) {
            (Protocol::All, _, _) => f.write_str("all traffic"),
            (p, Some(a), Some(b)) if a == b => write!(f, "{}/{}", p.as_str().to_uppercase(), a),
            (p, Some(a), Some(b)) => write!(f, "{}/{}-{}", p.as_str().to_uppercase(), a, b),
            (p, _, _) => write!(f, "{}", p.as_str().to_uppercase()),
        }
    }
}

/// Traffic source of an ingress rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Peer {
    /// A literal IPv4 range
    Ipv4(Ipv4Cidr),
    /// Members of another security group
    SecurityGroup(Token),
}

impl Peer {
    /// Every IPv4 address.
    pub fn any_ipv4() -> Self {
        Peer::Ipv4(Ipv4Cidr::any())
    }

    /// True when the peer is a literal address range.
    pub fn is_cidr(&self) -> bool {
        matches!(self, Peer::Ipv4(_))
    }
}

/// One inbound rule.
#[derive(Debug, Clone, PartialEq)]
pub struct IngressRule {
    /// Traffic source
    pub peer: Peer,
    /// Protocol and ports
    pub port: Port,
    /// Rule description
    pub description: String,
}

impl IngressRule {
    fn to_token(&self) -> Token {
        let mut entries: Vec<(&str, Token)> = Vec::new();
        match &self.peer {
            Peer::Ipv4(cidr) => entries.push(("CidrIp", Token::from(cidr.to_string()))),
            Peer::SecurityGroup(group) => entries.push(("SourceSecurityGroupId", group.clone())),
        }
        entries.push(("Description", Token::from(self.description.clone())));
        if let Some(from) = self.port.from_port {
            entries.push(("FromPort", Token::from(from)));
        }
        entries.push(("IpProtocol", Token::str(self.port.protocol.as_str())));
        if let Some(to) = self.port.to_port {
            entries.push(("ToPort", Token::from(to)));
        }
        Token::map(entries)
    }
}

/// A security group to declare.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityGroupSpec {
    /// Group name, also used as the `Name` tag
    pub name: String,
    /// Group description
    pub description: String,
    /// Allow every outbound connection
    pub allow_all_outbound: bool,
    /// Inbound rules
    pub ingress: Vec<IngressRule>,
    /// Extra tags besides `Name`
    pub tags: Vec<(String, String)>,
}

impl SecurityGroupSpec {
    /// A group with all outbound traffic allowed and no inbound rules.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            allow_all_outbound: true,
            ingress: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Add a tag.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    /// Add an inbound rule.
    pub fn allow_ingress(mut self, peer: Peer, port: Port, description: impl Into<String>) -> Self {
        self.ingress.push(IngressRule {
            peer,
            port,
            description: description.into(),
        });
        self
    }

    fn egress(&self) -> Token {
        if self.allow_all_outbound {
            Token::list([Token::map([
                ("CidrIp", Token::str("0.0.0.0/0")),
                ("Description", Token::str("Allow all outbound traffic by default")),
                ("IpProtocol", Token::str("-1")),
            ])])
        } else {
            // An unmatchable rule; an empty list would let the provider add
            // its default allow-all egress
            Token::list([Token::map([
                ("CidrIp", Token::str("255.255.255.255/32")),
                ("Description", Token::str("Disallow all traffic")),
                ("FromPort", Token::from(252u16)),
                ("IpProtocol", Token::str("icmp")),
                ("ToPort", Token::from(86u16)),
            ])])
        }
    }

    fn tags_token(&self) -> Token {
        tags(
            std::iter::once(("Name".to_string(), self.name.clone()))
                .chain(self.tags.iter().cloned()),
        )
    }

    /// Declare the group in `stack` and return its `GroupId` token.
    pub fn synthesize(&self, stack: &mut Stack, id: &str, vpc_id: &Token) -> Result<Token> {
        stack.add_resource(
            id,
            Resource::new("AWS::EC2::SecurityGroup")
                .property("GroupDescription", self.description.clone())
                .property("GroupName", self.name.clone())
                .property("SecurityGroupEgress", self.egress())
                .property(
                    "SecurityGroupIngress",
                    Token::list(self.ingress.iter().map(IngressRule::to_token)),
                )
                .property("Tags", self.tags_token())
                .property("VpcId", vpc_id.clone()),
        )?;
        Ok(Token::get_att(id, "GroupId"))
    }
}

/// Handle to a security group owned by another stack.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityGroupHandle {
    producer: String,
    group_id: Token,
}

impl SecurityGroupHandle {
    /// Create a handle.
    pub fn new(producer: impl Into<String>, group_id: Token) -> Self {
        Self {
            producer: producer.into(),
            group_id,
        }
    }

    /// Stack that owns the group.
    pub fn producer(&self) -> &str {
        &self.producer
    }

    /// Group id token.
    pub fn group_id(&self) -> &Token {
        &self.group_id
    }

    /// Use the group as the source of an ingress rule.
    pub fn as_peer(&self) -> Peer {
        Peer::SecurityGroup(self.group_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_port_display() {
        assert_eq!(Port::tcp(22).to_string(), "TCP/22");
        assert_eq!(Port::tcp_range(1024, 2048).to_string(), "TCP/1024-2048");
        assert_eq!(Port::all_traffic().to_string(), "all traffic");
    }

    #[test]
    fn test_cidr_ingress_rule() {
        let rule = IngressRule {
            peer: Peer::any_ipv4(),
            port: Port::tcp(22),
            description: "ssh".to_string(),
        };
        assert_eq!(
            rule.to_token().to_json(),
            json!({
                "CidrIp": "0.0.0.0/0",
                "Description": "ssh",
                "FromPort": 22,
                "IpProtocol": "tcp",
                "ToPort": 22
            })
        );
    }

    #[test]
    fn test_security_group_peer_rule() {
        let handle = SecurityGroupHandle::new(
            "bastion",
            Token::Import {
                producer: "bastion".to_string(),
                export_name: "bastion-Sg".to_string(),
            },
        );
        let rule = IngressRule {
            peer: handle.as_peer(),
            port: Port::tcp(22),
            description: "from bastion".to_string(),
        };
        let rendered = rule.to_token().to_json();
        assert_eq!(
            rendered["SourceSecurityGroupId"],
            json!({"Fn::ImportValue": "bastion-Sg"})
        );
        assert!(rendered.get("CidrIp").is_none());
    }

    #[test]
    fn test_synthesize_returns_group_id() {
        let mut stack = Stack::new("s", Environment::default());
        let group_id = SecurityGroupSpec::new("web", "web group")
            .allow_ingress(Peer::any_ipv4(), Port::tcp(443), "https")
            .synthesize(&mut stack, "WebSG", &Token::str("vpc-1"))
            .unwrap();
        assert_eq!(group_id, Token::get_att("WebSG", "GroupId"));

        let sg = stack.resource("WebSG").unwrap();
        assert_eq!(sg.get("GroupName"), Some(&Token::str("web")));
        assert_eq!(
            sg.get("SecurityGroupEgress").unwrap().to_json()[0]["IpProtocol"],
            json!("-1")
        );
    }

    #[test]
    fn test_no_outbound_uses_unmatchable_rule() {
        let mut spec = SecurityGroupSpec::new("locked", "locked down");
        spec.allow_all_outbound = false;
        let egress = spec.egress().to_json();
        assert_eq!(egress[0]["CidrIp"], json!("255.255.255.255/32"));
    }
}
