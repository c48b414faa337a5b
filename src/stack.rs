//! Stack: one deployable unit of declared resources.
//!
//! A [`Stack`] is an in-memory CloudFormation template plus the metadata the
//! cloud assembly needs: the target environment, the stacks it depends on,
//! and any context lookups that could not be answered from the cache.
//!
//! Stacks are filled in by the builders in [`crate::stacks`] and are not
//! mutated once a builder returns.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::lookup::MissingLookup;
use crate::token::Token;

/// A declared resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// CloudFormation type, e.g. `AWS::EC2::Instance`
    pub kind: String,
    /// Resource properties in declaration order
    pub properties: IndexMap<String, Token>,
    /// Explicit `DependsOn` logical ids
    pub depends_on: Vec<String>,
}

impl Resource {
    /// Create a resource with no properties.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            properties: IndexMap::new(),
            depends_on: Vec::new(),
        }
    }

    /// Set a property.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<Token>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Set a property only when a value is present.
    pub fn property_opt(self, key: impl Into<String>, value: Option<Token>) -> Self {
        match value {
            Some(v) => self.property(key, v),
            None => self,
        }
    }

    /// Add an explicit creation-order dependency on another resource.
    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        let id = logical_id.into();
        if !self.depends_on.contains(&id) {
            self.depends_on.push(id);
        }
        self
    }

    /// Look up a property.
    pub fn get(&self, key: &str) -> Option<&Token> {
        self.properties.get(key)
    }

    fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("Type".to_string(), Value::String(self.kind.clone()));
        if !self.properties.is_empty() {
            obj.insert(
                "Properties".to_string(),
                Value::Object(
                    self.properties
                        .iter()
                        .map(|(k, v)| (k.clone(), v.to_json()))
                        .collect(),
                ),
            );
        }
        if !self.depends_on.is_empty() {
            obj.insert(
                "DependsOn".to_string(),
                Value::Array(self.depends_on.iter().cloned().map(Value::String).collect()),
            );
        }
        Value::Object(obj)
    }
}

/// A template parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Parameter type
    pub kind: String,
    /// Default value
    pub default: Option<String>,
    /// Human readable description
    pub description: Option<String>,
}

/// A named stack output, optionally exported for cross-stack use.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    /// Value of the output
    pub value: Token,
    /// Human readable description
    pub description: Option<String>,
    /// Export name, when the output is exported
    pub export_name: Option<String>,
}

/// One deployable unit of declared infrastructure.
#[derive(Debug, Clone)]
pub struct Stack {
    name: String,
    environment: Environment,
    description: Option<String>,
    parameters: IndexMap<String, Parameter>,
    resources: IndexMap<String, Resource>,
    outputs: IndexMap<String, Output>,
    dependencies: Vec<String>,
    missing: Vec<MissingLookup>,
}

impl Stack {
    /// Create an empty stack.
    pub fn new(name: impl Into<String>, environment: Environment) -> Self {
        Self {
            name: name.into(),
            environment,
            description: None,
            parameters: IndexMap::new(),
            resources: IndexMap::new(),
            outputs: IndexMap::new(),
            dependencies: Vec::new(),
            missing: Vec::new(),
        }
    }

    /// Set the template description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Stack name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target environment.
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Stacks this stack depends on, in declaration order.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// True if a dependency on `producer` is declared.
    pub fn depends_on(&self, producer: &str) -> bool {
        self.dependencies.iter().any(|d| d == producer)
    }

    /// Declared resources.
    pub fn resources(&self) -> &IndexMap<String, Resource> {
        &self.resources
    }

    /// Resource by logical id.
    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    /// Resources of one CloudFormation type.
    pub fn resources_of_type<'a>(
        &'a self,
        kind: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a Resource)> + 'a {
        self.resources.iter().filter(move |(_, r)| r.kind == kind)
    }

    /// Declared parameters.
    pub fn parameters(&self) -> &IndexMap<String, Parameter> {
        &self.parameters
    }

    /// Declared outputs.
    pub fn outputs(&self) -> &IndexMap<String, Output> {
        &self.outputs
    }

    /// Output by logical id.
    pub fn output(&self, name: &str) -> Option<&Output> {
        self.outputs.get(name)
    }

    /// Lookups that could not be answered from the context cache.
    pub fn missing_lookups(&self) -> &[MissingLookup] {
        &self.missing
    }

    /// Add a resource and return a `Ref` to it.
    pub fn add_resource(&mut self, logical_id: impl Into<String>, resource: Resource) -> Result<Token> {
        let id = logical_id.into();
        if self.resources.contains_key(&id) || self.parameters.contains_key(&id) {
            return Err(Error::DuplicateLogicalId {
                stack: self.name.clone(),
                logical_id: id,
            });
        }
        debug!(stack = %self.name, logical_id = %id, kind = %resource.kind, "declared resource");
        self.resources.insert(id.clone(), resource);
        Ok(Token::Ref(id))
    }

    /// Add a parameter, or reuse an existing one with the same id, and
    /// return a `Ref` to it.
    pub fn add_parameter(&mut self, logical_id: impl Into<String>, parameter: Parameter) -> Token {
        let id = logical_id.into();
        self.parameters.entry(id.clone()).or_insert(parameter);
        Token::Ref(id)
    }

    /// Add an output.
    pub fn add_output(&mut self, logical_id: impl Into<String>, output: Output) -> Result<()> {
        let id = logical_id.into();
        if self.outputs.contains_key(&id) {
            return Err(Error::DuplicateLogicalId {
                stack: self.name.clone(),
                logical_id: id,
            });
        }
        self.outputs.insert(id, output);
        Ok(())
    }

    /// Add an output exported as `{stack}-{name}` and return the token a
    /// consuming stack uses to import it.
    pub fn export_named(
        &mut self,
        name: &str,
        value: Token,
        description: Option<&str>,
    ) -> Result<Token> {
        let export_name = format!("{}-{}", self.name, name);
        self.export_as(name, export_name, value, description)
    }

    /// Export a local value under the generated `ExportsOutput` naming
    /// scheme. Used for values that only exist to wire stacks together.
    pub fn export_internal(&mut self, logical_id: &str, value: Token) -> Result<Token> {
        let output_id = format!("ExportsOutputRef{}", logical_id);
        let export_name = format!("{}:{}", self.name, output_id);
        self.export_as(&output_id, export_name, value, None)
    }

    fn export_as(
        &mut self,
        output_id: &str,
        export_name: String,
        value: Token,
        description: Option<&str>,
    ) -> Result<Token> {
        self.add_output(
            output_id,
            Output {
                value,
                description: description.map(str::to_string),
                export_name: Some(export_name.clone()),
            },
        )?;
        Ok(Token::Import {
            producer: self.name.clone(),
            export_name,
        })
    }

    /// Declare that this stack must be deployed after `producer`.
    pub fn add_dependency(&mut self, producer: impl Into<String>) {
        let producer = producer.into();
        if producer != self.name && !self.depends_on(&producer) {
            self.dependencies.push(producer);
        }
    }

    /// Record a lookup that must be performed before the next synthesis.
    pub fn record_missing(&mut self, lookup: MissingLookup) {
        if !self.missing.iter().any(|m| m.key == lookup.key) {
            self.missing.push(lookup);
        }
    }

    /// Check cross-stack imports and local references.
    pub fn validate(&self) -> Result<()> {
        let tokens = self
            .resources
            .values()
            .flat_map(|r| r.properties.values())
            .chain(self.outputs.values().map(|o| &o.value));

        for token in tokens {
            for producer in token.producers() {
                if !self.depends_on(producer) {
                    return Err(Error::UndeclaredDependency {
                        consumer: self.name.clone(),
                        producer: producer.to_string(),
                    });
                }
            }
            for id in token.local_references() {
                if !self.resources.contains_key(id) && !self.parameters.contains_key(id) {
                    return Err(Error::UnresolvedReference {
                        stack: self.name.clone(),
                        logical_id: id.to_string(),
                    });
                }
            }
        }

        for (id, resource) in &self.resources {
            for dep in &resource.depends_on {
                if !self.resources.contains_key(dep) {
                    return Err(Error::UnresolvedReference {
                        stack: self.name.clone(),
                        logical_id: format!("{} (DependsOn of {})", dep, id),
                    });
                }
            }
        }
        Ok(())
    }

    /// Render the CloudFormation template.
    pub fn to_template(&self) -> Result<Value> {
        self.validate()?;

        let mut template = Map::new();
        if let Some(ref description) = self.description {
            template.insert("Description".to_string(), Value::String(description.clone()));
        }

        if !self.parameters.is_empty() {
            let params = self
                .parameters
                .iter()
                .map(|(id, p)| {
                    let mut obj = Map::new();
                    obj.insert("Type".to_string(), Value::String(p.kind.clone()));
                    if let Some(ref default) = p.default {
                        obj.insert("Default".to_string(), Value::String(default.clone()));
                    }
                    if let Some(ref description) = p.description {
                        obj.insert("Description".to_string(), Value::String(description.clone()));
                    }
                    (id.clone(), Value::Object(obj))
                })
                .collect();
            template.insert("Parameters".to_string(), Value::Object(params));
        }

        template.insert(
            "Resources".to_string(),
            Value::Object(
                self.resources
                    .iter()
                    .map(|(id, r)| (id.clone(), r.to_json()))
                    .collect(),
            ),
        );

        if !self.outputs.is_empty() {
            let outputs = self
                .outputs
                .iter()
                .map(|(id, o)| {
                    let mut obj = Map::new();
                    if let Some(ref description) = o.description {
                        obj.insert("Description".to_string(), Value::String(description.clone()));
                    }
                    obj.insert("Value".to_string(), o.value.to_json());
                    if let Some(ref export) = o.export_name {
                        obj.insert("Export".to_string(), serde_json::json!({ "Name": export }));
                    }
                    (id.clone(), Value::Object(obj))
                })
                .collect();
            template.insert("Outputs".to_string(), Value::Object(outputs));
        }

        Ok(Value::Object(template))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn stack(name: &str) -> Stack {
        Stack::new(name, Environment::default())
    }

    #[test]
    fn test_add_resource_returns_ref() {
        let mut s = stack("net");
        let vpc = s
            .add_resource("Vpc", Resource::new("AWS::EC2::VPC").property("CidrBlock", "10.0.0.0/16"))
            .unwrap();
        assert_eq!(vpc, Token::Ref("Vpc".to_string()));
        assert_eq!(s.resources_of_type("AWS::EC2::VPC").count(), 1);
    }

    #[test]
    fn test_duplicate_logical_id_rejected() {
        let mut s = stack("net");
        s.add_resource("Vpc", Resource::new("AWS::EC2::VPC")).unwrap();
        let err = s.add_resource("Vpc", Resource::new("AWS::EC2::VPC")).unwrap_err();
        assert!(matches!(err, Error::DuplicateLogicalId { .. }));
    }

    #[test]
    fn test_export_named_uses_stack_prefix() {
        let mut s = stack("net");
        let vpc = s.add_resource("Vpc", Resource::new("AWS::EC2::VPC")).unwrap();
        let import = s.export_named("VPCId", vpc, None).unwrap();
        assert_eq!(
            import,
            Token::Import {
                producer: "net".to_string(),
                export_name: "net-VPCId".to_string()
            }
        );
        let template = s.to_template().unwrap();
        assert_eq!(
            template["Outputs"]["VPCId"],
            json!({"Value": {"Ref": "Vpc"}, "Export": {"Name": "net-VPCId"}})
        );
    }

    #[test]
    fn test_import_without_dependency_fails() {
        let mut s = stack("bastion");
        let import = Token::Import {
            producer: "net".to_string(),
            export_name: "net-VPCId".to_string(),
        };
        s.add_resource(
            "Sg",
            Resource::new("AWS::EC2::SecurityGroup").property("VpcId", import),
        )
        .unwrap();
        assert!(matches!(
            s.to_template().unwrap_err(),
            Error::UndeclaredDependency { .. }
        ));

        s.add_dependency("net");
        assert!(s.to_template().is_ok());
    }

    #[test]
    fn test_unresolved_local_reference_fails() {
        let mut s = stack("net");
        s.add_resource(
            "Subnet",
            Resource::new("AWS::EC2::Subnet").property("VpcId", Token::reference("Vpc")),
        )
        .unwrap();
        assert!(matches!(
            s.validate().unwrap_err(),
            Error::UnresolvedReference { .. }
        ));
    }

    #[test]
    fn test_self_dependency_ignored() {
        let mut s = stack("net");
        s.add_dependency("net");
        s.add_dependency("other");
        s.add_dependency("other");
        assert_eq!(s.dependencies(), &["other".to_string()]);
    }

    #[test]
    fn test_template_omits_empty_sections() {
        let s = stack("empty");
        assert_eq!(s.to_template().unwrap(), json!({"Resources": {}}));
    }
}
