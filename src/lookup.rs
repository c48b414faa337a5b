//! Context lookups for resources that already exist in the account.
//!
//! Lookups are never performed here. A lookup is answered from the context
//! cache (`cdk.context.json`) when the cache has an entry for its key.
//! Otherwise it is recorded in the assembly manifest as missing and dummy
//! values stand in, so the toolkit can perform the lookup, fill the cache and
//! synthesize again.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::network::{NetworkHandle, SubnetRef, SubnetType, VpcLookup};
use crate::stack::Stack;
use crate::token::Token;

/// Context provider answering VPC lookups.
pub const VPC_PROVIDER: &str = "vpc-provider";

/// Marker the toolkit writes into the cache when a lookup failed.
const PROVIDER_ERROR_KEY: &str = "$providerError";

/// A lookup the toolkit must perform before the next synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingLookup {
    /// Cache key the answer will be stored under
    pub key: String,
    /// Context provider
    pub provider: String,
    /// Provider query
    pub props: Value,
}

/// A VPC lookup bound to a concrete account and region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpcQuery {
    account: String,
    region: String,
    filter: BTreeMap<String, String>,
}

impl VpcQuery {
    /// Bind `lookup` to the stack's environment. Lookups cannot be answered
    /// for an environment-agnostic stack.
    pub fn new(lookup: &VpcLookup, stack: &Stack) -> Result<Self> {
        let env = stack.environment();
        let (Some(account), Some(region)) = (env.account.clone(), env.region.clone()) else {
            return Err(Error::EnvironmentRequired(stack.name().to_string()));
        };

        let mut filter = BTreeMap::new();
        if lookup.is_default {
            filter.insert("isDefault".to_string(), "true".to_string());
        }
        filter.insert("tag:Name".to_string(), lookup.name.clone());

        Ok(Self {
            account,
            region,
            filter,
        })
    }

    /// Cache key: the provider name followed by the flattened, sorted query.
    pub fn context_key(&self) -> String {
        let mut parts = vec![VPC_PROVIDER.to_string(), format!("account={}", self.account)];
        parts.extend(
            self.filter
                .iter()
                .map(|(k, v)| format!("filter.{}={}", k, v)),
        );
        parts.push(format!("region={}", self.region));
        parts.push("returnAsymmetricSubnets=true".to_string());
        parts.join(":")
    }

    /// Manifest entry asking the toolkit to perform this lookup.
    pub fn to_missing(&self) -> MissingLookup {
        MissingLookup {
            key: self.context_key(),
            provider: VPC_PROVIDER.to_string(),
            props: json!({
                "account": self.account,
                "region": self.region,
                "filter": self.filter,
                "returnAsymmetricSubnets": true,
            }),
        }
    }
}

/// One subnet of a looked-up VPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetResponse {
    /// Subnet id
    pub subnet_id: String,
    /// Availability zone
    pub availability_zone: String,
    /// Route table id
    pub route_table_id: String,
    /// Address range
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,
}

/// One subnet group of a looked-up VPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetGroupResponse {
    /// Group name
    pub name: String,
    /// `Public`, `Private` or `Isolated`
    #[serde(rename = "type")]
    pub kind: String,
    /// Subnets of the group
    pub subnets: Vec<SubnetResponse>,
}

impl SubnetGroupResponse {
    fn subnet_type(&self) -> Option<SubnetType> {
        [
            SubnetType::Public,
            SubnetType::PrivateWithEgress,
            SubnetType::PrivateIsolated,
        ]
        .into_iter()
        .find(|t| t.tag_value() == self.kind)
    }
}

/// Answer of the VPC context provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VpcContextResponse {
    /// VPC id
    pub vpc_id: String,
    /// VPC address range
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_cidr_block: Option<String>,
    /// Availability zones the VPC spans
    #[serde(default)]
    pub availability_zones: Vec<String>,
    /// Subnet groups
    #[serde(default)]
    pub subnet_groups: Vec<SubnetGroupResponse>,
}

impl VpcContextResponse {
    /// Placeholder used while the real answer is missing from the cache.
    pub fn dummy() -> Self {
        let subnet = |id: &str, az: &str, rtb: &str| SubnetResponse {
            subnet_id: id.to_string(),
            availability_zone: az.to_string(),
            route_table_id: rtb.to_string(),
            cidr: None,
        };
        Self {
            vpc_id: "vpc-12345".to_string(),
            vpc_cidr_block: Some("1.2.3.4/5".to_string()),
            availability_zones: Vec::new(),
            subnet_groups: vec![
                SubnetGroupResponse {
                    name: "Public".to_string(),
                    kind: "Public".to_string(),
                    subnets: vec![
                        subnet("s-12345", "dummy1a", "rtb-12345s1"),
                        subnet("s-67890", "dummy1b", "rtb-67890s1"),
                    ],
                },
                SubnetGroupResponse {
                    name: "Private".to_string(),
                    kind: "Private".to_string(),
                    subnets: vec![
                        subnet("p-12345", "dummy1a", "rtb-12345p1"),
                        subnet("p-67890", "dummy1b", "rtb-57890p1"),
                    ],
                },
            ],
        }
    }

    /// Network handle with literal ids, owned by `producer`.
    pub fn to_handle(&self, producer: &str) -> NetworkHandle {
        let subnets = self
            .subnet_groups
            .iter()
            .filter_map(|group| group.subnet_type().map(|t| (group, t)))
            .flat_map(|(group, subnet_type)| {
                group.subnets.iter().map(move |s| SubnetRef {
                    group: group.name.clone(),
                    subnet_type,
                    subnet_id: Token::from(s.subnet_id.clone()),
                })
            })
            .collect();
        NetworkHandle::new(producer, Token::from(self.vpc_id.clone()), subnets)
    }
}

/// Cached lookup answers.
#[derive(Debug, Clone, Default)]
pub struct LookupCache {
    path: Option<PathBuf>,
    entries: Map<String, Value>,
}

impl LookupCache {
    /// An empty cache.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the cache from a JSON file. A missing file is an empty cache.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no lookup cache");
            return Ok(Self {
                path: Some(path.to_path_buf()),
                entries: Map::new(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        let entries = match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                return Err(Error::context_load(path, "lookup cache must be a JSON object"));
            }
            Err(e) => return Err(Error::context_load(path, e.to_string())),
        };
        debug!(path = %path.display(), entries = entries.len(), "loaded lookup cache");
        Ok(Self {
            path: Some(path.to_path_buf()),
            entries,
        })
    }

    /// Where the cache was loaded from.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Cached answer for a key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Store an answer.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    /// Number of cached answers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached VPC answer for a query, if any.
    pub fn vpc(&self, query: &VpcQuery) -> Result<Option<VpcContextResponse>> {
        let key = query.context_key();
        let Some(value) = self.entries.get(&key) else {
            return Ok(None);
        };
        if let Some(message) = value.get(PROVIDER_ERROR_KEY).and_then(Value::as_str) {
            return Err(Error::invalid_context(key, message));
        }
        serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| Error::invalid_context(key, e.to_string()))
    }
}

/// Resolve an existing VPC for `stack`, recording a missing lookup and
/// returning dummy values when the cache has no answer yet.
pub fn resolve_vpc(
    stack: &mut Stack,
    lookup: &VpcLookup,
    cache: &LookupCache,
) -> Result<VpcContextResponse> {
    let query = VpcQuery::new(lookup, stack)?;
    match cache.vpc(&query)? {
        Some(response) => {
            debug!(stack = %stack.name(), vpc_id = %response.vpc_id, "resolved VPC from cache");
            Ok(response)
        }
        None => {
            warn!(
                stack = %stack.name(),
                key = %query.context_key(),
                "VPC lookup not cached; using dummy values until the lookup is performed"
            );
            stack.record_missing(query.to_missing());
            Ok(VpcContextResponse::dummy())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use pretty_assertions::assert_eq;

    fn stack() -> Stack {
        Stack::new("net", Environment::new("123456789012", "us-east-1"))
    }

    #[test]
    fn test_context_key() {
        let query = VpcQuery::new(&VpcLookup::by_name("shared"), &stack()).unwrap();
        assert_eq!(
            query.context_key(),
            "vpc-provider:account=123456789012:filter.isDefault=true:filter.tag:Name=shared:region=us-east-1:returnAsymmetricSubnets=true"
        );
    }

    #[test]
    fn test_lookup_requires_concrete_environment() {
        let agnostic = Stack::new("net", Environment::default());
        let err = VpcQuery::new(&VpcLookup::by_name("shared"), &agnostic).unwrap_err();
        assert!(matches!(err, Error::EnvironmentRequired(_)));
    }

    #[test]
    fn test_missing_lookup_recorded() {
        let mut s = stack();
        let response = resolve_vpc(&mut s, &VpcLookup::by_name("shared"), &LookupCache::empty()).unwrap();
        assert_eq!(response.vpc_id, "vpc-12345");
        assert_eq!(s.missing_lookups().len(), 1);
        assert_eq!(s.missing_lookups()[0].provider, "vpc-provider");
        assert_eq!(s.missing_lookups()[0].props["filter"]["tag:Name"], "shared");
    }

    #[test]
    fn test_cached_answer_used() {
        let mut s = stack();
        let query = VpcQuery::new(&VpcLookup::by_name("shared"), &s).unwrap();
        let mut cache = LookupCache::empty();
        cache.insert(
            query.context_key(),
            json!({
                "vpcId": "vpc-0abc",
                "availabilityZones": ["us-east-1a"],
                "subnetGroups": [
                    {"name": "Public", "type": "Public", "subnets": [
                        {"subnetId": "subnet-pub", "availabilityZone": "us-east-1a", "routeTableId": "rtb-1"}
                    ]},
                    {"name": "Private", "type": "Private", "subnets": [
                        {"subnetId": "subnet-priv", "availabilityZone": "us-east-1a", "routeTableId": "rtb-2"}
                    ]}
                ]
            }),
        );

        let response = resolve_vpc(&mut s, &VpcLookup::by_name("shared"), &cache).unwrap();
        assert!(s.missing_lookups().is_empty());

        let handle = response.to_handle("net");
        assert_eq!(handle.vpc_id(), &Token::str("vpc-0abc"));
        assert_eq!(
            handle.select(SubnetType::PrivateWithEgress).unwrap().subnet_id,
            Token::str("subnet-priv")
        );
    }

    #[test]
    fn test_provider_error_surfaces() {
        let s = stack();
        let query = VpcQuery::new(&VpcLookup::by_name("shared"), &s).unwrap();
        let mut cache = LookupCache::empty();
        cache.insert(
            query.context_key(),
            json!({"$providerError": "Could not find any VPCs matching", "$dontSaveContext": true}),
        );
        assert!(matches!(
            cache.vpc(&query).unwrap_err(),
            Error::InvalidContext { .. }
        ));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LookupCache::load(dir.path().join("cdk.context.json")).unwrap();
        assert!(cache.is_empty());
    }
}
