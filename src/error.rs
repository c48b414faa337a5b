//! Error types for syncstack.
//!
//! Synthesis either produces a complete cloud assembly or fails with one of
//! these errors. Nothing here is retried or recovered: a failure means the
//! deployment context or the stack wiring is wrong and must be fixed by hand.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for syncstack operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for syncstack.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Context Errors
    // ========================================================================
    /// A required context key was not provided.
    #[error("Missing required context key '{0}'")]
    MissingContext(String),

    /// A context key holds a value of the wrong shape.
    #[error("Invalid value for context key '{key}': {message}")]
    InvalidContext {
        /// Context key
        key: String,
        /// Error message
        message: String,
    },

    /// The app file or lookup cache could not be read.
    #[error("Failed to load context from '{path}': {message}")]
    ContextLoad {
        /// Path to the context source
        path: PathBuf,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// Malformed IPv4 CIDR block.
    #[error("Invalid CIDR block '{0}'")]
    InvalidCidr(String),

    /// Subnet groups do not fit into the VPC address range.
    #[error("Subnet group '{group}' does not fit in VPC range {vpc_cidr}")]
    SubnetAllocation {
        /// Subnet group name
        group: String,
        /// VPC CIDR block
        vpc_cidr: String,
    },

    /// The network layout is not deployable.
    #[error("Invalid network layout: {0}")]
    InvalidNetwork(String),

    /// Unparseable instance type string.
    #[error("Invalid instance type '{0}'")]
    InvalidInstanceType(String),

    /// The boot script cannot be assembled.
    #[error("Invalid boot script: {0}")]
    InvalidBootScript(String),

    /// No subnet of the requested type exists in the network.
    #[error("Network from stack '{stack}' has no {subnet_type} subnets")]
    NoSuchSubnet {
        /// Producing stack
        stack: String,
        /// Requested subnet type
        subnet_type: String,
    },

    // ========================================================================
    // Stack Errors
    // ========================================================================
    /// Two resources or outputs share a logical id inside one stack.
    #[error("Duplicate logical id '{logical_id}' in stack '{stack}'")]
    DuplicateLogicalId {
        /// Stack name
        stack: String,
        /// Logical id
        logical_id: String,
    },

    /// A stack with this name was already added to the app.
    #[error("Stack '{0}' already exists")]
    DuplicateStack(String),

    /// Stack not found in the app.
    #[error("Stack '{0}' not found")]
    StackNotFound(String),

    /// A stack consumes a value from another stack it does not depend on.
    #[error("Stack '{consumer}' imports a value from '{producer}' without depending on it")]
    UndeclaredDependency {
        /// Consuming stack
        consumer: String,
        /// Producing stack
        producer: String,
    },

    /// A `Ref`, `Fn::GetAtt`, or `DependsOn` names a logical id the stack
    /// does not declare.
    #[error("Stack '{stack}' references undeclared logical id '{logical_id}'")]
    UnresolvedReference {
        /// Stack name
        stack: String,
        /// Logical id
        logical_id: String,
    },

    /// The stack dependency graph is not a DAG.
    #[error("Dependency cycle detected: {0}")]
    DependencyCycle(String),

    /// A context lookup was requested from an environment-agnostic stack.
    #[error("Stack '{0}' performs a lookup and needs an explicit account and region")]
    EnvironmentRequired(String),

    // ========================================================================
    // IO Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}

impl Error {
    /// Creates a new invalid context error.
    pub fn invalid_context(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidContext {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a new context load error.
    pub fn context_load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ContextLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns true if the error comes from the deployment context rather
    /// than from stack wiring.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::MissingContext(_)
                | Error::InvalidContext { .. }
                | Error::ContextLoad { .. }
                | Error::InvalidCidr(_)
                | Error::InvalidNetwork(_)
                | Error::InvalidInstanceType(_)
                | Error::InvalidBootScript(_)
                | Error::EnvironmentRequired(_)
        )
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            e if e.is_configuration() => 2,
            Error::UndeclaredDependency { .. }
            | Error::UnresolvedReference { .. }
            | Error::DependencyCycle(_) => 3,
            Error::Io(_) => 4,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::MissingContext("bucket_name".into()).exit_code(), 2);
        assert_eq!(Error::DependencyCycle("a -> b".into()).exit_code(), 3);
        assert_eq!(Error::StackNotFound("x".into()).exit_code(), 1);
    }

    #[test]
    fn test_display() {
        let err = Error::UndeclaredDependency {
            consumer: "private".into(),
            producer: "bastion".into(),
        };
        assert_eq!(
            err.to_string(),
            "Stack 'private' imports a value from 'bastion' without depending on it"
        );
    }
}
