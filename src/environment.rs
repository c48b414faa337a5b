//! Target account and region.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Environment variable holding the default account id.
pub const ACCOUNT_ENV: &str = "CDK_DEFAULT_ACCOUNT";

/// Environment variable holding the default region.
pub const REGION_ENV: &str = "CDK_DEFAULT_REGION";

const UNKNOWN_ACCOUNT: &str = "unknown-account";
const UNKNOWN_REGION: &str = "unknown-region";

/// Account and region a stack is deployed into.
///
/// Either part may be absent, in which case the stack is
/// environment-agnostic and the engine fills it in at deploy time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// AWS account id
    pub account: Option<String>,
    /// AWS region
    pub region: Option<String>,
}

impl Environment {
    /// Create a concrete environment.
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: Some(account.into()),
            region: Some(region.into()),
        }
    }

    /// Read account and region from the process environment.
    pub fn from_env() -> Self {
        let read = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            account: read(ACCOUNT_ENV),
            region: read(REGION_ENV),
        }
    }

    /// True when both account and region are known.
    pub fn is_concrete(&self) -> bool {
        self.account.is_some() && self.region.is_some()
    }

    /// Account id or the agnostic placeholder.
    pub fn account_or_unknown(&self) -> &str {
        self.account.as_deref().unwrap_or(UNKNOWN_ACCOUNT)
    }

    /// Region or the agnostic placeholder.
    pub fn region_or_unknown(&self) -> &str {
        self.region.as_deref().unwrap_or(UNKNOWN_REGION)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "aws://{}/{}",
            self.account_or_unknown(),
            self.region_or_unknown()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let env = Environment::new("123456789012", "eu-west-1");
        assert!(env.is_concrete());
        assert_eq!(env.to_string(), "aws://123456789012/eu-west-1");
    }

    #[test]
    fn test_agnostic_display() {
        let env = Environment::default();
        assert!(!env.is_concrete());
        assert_eq!(env.to_string(), "aws://unknown-account/unknown-region");
    }
}
