//! IAM policy statements attached to instance roles.

use serde::{Deserialize, Serialize};

use crate::token::Token;

/// Policy language version written into every document.
pub const POLICY_VERSION: &str = "2012-10-17";

/// Statement effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Effect {
    /// Grant the actions
    #[default]
    Allow,
    /// Refuse the actions
    Deny,
}

impl Effect {
    fn as_str(&self) -> &'static str {
        match self {
            Effect::Allow => "Allow",
            Effect::Deny => "Deny",
        }
    }
}

/// One permission statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStatement {
    /// Effect
    pub effect: Effect,
    /// Actions, e.g. `s3:GetObject`
    pub actions: Vec<String>,
    /// Resource ARN patterns
    pub resources: Vec<String>,
}

impl PolicyStatement {
    /// Allow `actions` on `resources`.
    pub fn allow<A, R>(actions: A, resources: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            effect: Effect::Allow,
            actions: actions.into_iter().map(Into::into).collect(),
            resources: resources.into_iter().map(Into::into).collect(),
        }
    }

    /// Render as a statement object. A single action or resource is written
    /// as a bare string, several as a list.
    pub fn to_token(&self) -> Token {
        Token::map([
            ("Action", one_or_many(&self.actions)),
            ("Effect", Token::str(self.effect.as_str())),
            ("Resource", one_or_many(&self.resources)),
        ])
    }
}

fn one_or_many(values: &[String]) -> Token {
    match values {
        [single] => Token::str(single.clone()),
        many => Token::list(many.iter().cloned().map(Token::from)),
    }
}

/// ARN of an S3 bucket.
pub fn bucket_arn(bucket: &str) -> String {
    format!("arn:aws:s3:::{}", bucket)
}

/// Statements granting list access to a bucket and read access to its
/// objects.
pub fn bucket_read_statements(bucket: &str) -> Vec<PolicyStatement> {
    vec![
        PolicyStatement::allow(["s3:ListBucket"], [bucket_arn(bucket)]),
        PolicyStatement::allow(["s3:GetObject"], [format!("{}/*", bucket_arn(bucket))]),
    ]
}

/// A policy document from statements.
pub fn policy_document(statements: &[PolicyStatement]) -> Token {
    Token::map([
        (
            "Statement",
            Token::list(statements.iter().map(PolicyStatement::to_token)),
        ),
        ("Version", Token::str(POLICY_VERSION)),
    ])
}

/// Trust policy letting a service principal assume a role.
pub fn assume_role_policy(service: &str) -> Token {
    Token::map([
        (
            "Statement",
            Token::list([Token::map([
                ("Action", Token::str("sts:AssumeRole")),
                ("Effect", Token::str("Allow")),
                (
                    "Principal",
                    Token::map([("Service", Token::str(service))]),
                ),
            ])]),
        ),
        ("Version", Token::str(POLICY_VERSION)),
    ])
}
