//! Cloud assembly: the synthesized output handed to the provisioning engine.
//!
//! An assembly directory holds one `{stack}.template.json` per stack and a
//! `manifest.json` listing every stack artifact with its environment,
//! template file, and dependencies, plus the context lookups that still have
//! to be performed.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Result;
use crate::lookup::MissingLookup;
use crate::stack::Stack;

/// Schema version written into the manifest.
pub const MANIFEST_VERSION: &str = "36.0.0";

/// Manifest file name.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Artifact type of a CloudFormation stack.
pub const STACK_ARTIFACT_TYPE: &str = "aws:cloudformation:stack";

/// `manifest.json` contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Schema version
    pub version: String,
    /// Artifacts by id, in deployment order
    pub artifacts: IndexMap<String, Artifact>,
    /// Lookups the toolkit must perform before the next synthesis
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<MissingLookup>,
}

/// One manifest artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Artifact type
    #[serde(rename = "type")]
    pub kind: String,
    /// Target environment, `aws://{account}/{region}`
    pub environment: String,
    /// Artifact properties
    pub properties: ArtifactProperties,
    /// Artifacts that must be deployed first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    /// Human readable name
    pub display_name: String,
}

/// Properties of a stack artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactProperties {
    /// Template file relative to the assembly directory
    pub template_file: String,
}

/// A synthesized stack.
#[derive(Debug, Clone, PartialEq)]
pub struct StackArtifact {
    /// Stack name
    pub name: String,
    /// Target environment
    pub environment: String,
    /// Producers, in declaration order
    pub dependencies: Vec<String>,
    /// Rendered template
    pub template: Value,
}

impl StackArtifact {
    /// Template file name.
    pub fn template_file(&self) -> String {
        format!("{}.template.json", self.name)
    }
}

/// A complete synthesis result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CloudAssembly {
    stacks: Vec<StackArtifact>,
    missing: Vec<MissingLookup>,
}

impl CloudAssembly {
    /// An empty assembly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Render `stack` and append it. Stacks must be added producers first.
    pub fn add_stack(&mut self, stack: &Stack) -> Result<()> {
        let template = stack.to_template()?;
        for lookup in stack.missing_lookups() {
            if !self.missing.iter().any(|m| m.key == lookup.key) {
                self.missing.push(lookup.clone());
            }
        }
        debug!(stack = %stack.name(), "rendered template");
        self.stacks.push(StackArtifact {
            name: stack.name().to_string(),
            environment: stack.environment().to_string(),
            dependencies: stack.dependencies().to_vec(),
            template,
        });
        Ok(())
    }

    /// Stacks in deployment order.
    pub fn stacks(&self) -> &[StackArtifact] {
        &self.stacks
    }

    /// Stack by name.
    pub fn stack(&self, name: &str) -> Option<&StackArtifact> {
        self.stacks.iter().find(|s| s.name == name)
    }

    /// Rendered template of a stack.
    pub fn template(&self, name: &str) -> Option<&Value> {
        self.stack(name).map(|s| &s.template)
    }

    /// Lookups still to be performed.
    pub fn missing(&self) -> &[MissingLookup] {
        &self.missing
    }

    /// True if the assembly was synthesized with dummy lookup values.
    pub fn has_missing(&self) -> bool {
        !self.missing.is_empty()
    }

    /// Build the manifest.
    pub fn manifest(&self) -> Manifest {
        let artifacts = self
            .stacks
            .iter()
            .map(|s| {
                (
                    s.name.clone(),
                    Artifact {
                        kind: STACK_ARTIFACT_TYPE.to_string(),
                        environment: s.environment.clone(),
                        properties: ArtifactProperties {
                            template_file: s.template_file(),
                        },
                        dependencies: s.dependencies.clone(),
                        display_name: s.name.clone(),
                    },
                )
            })
            .collect();

        Manifest {
            version: MANIFEST_VERSION.to_string(),
            artifacts,
            missing: self.missing.clone(),
        }
    }

    /// Write templates and the manifest into `dir`, creating it if needed.
    /// Returns the written paths.
    pub async fn write_to(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;

        let mut written = Vec::with_capacity(self.stacks.len() + 1);
        for stack in &self.stacks {
            let path = dir.join(stack.template_file());
            let content = serde_json::to_string_pretty(&stack.template)?;
            tokio::fs::write(&path, content).await?;
            debug!(path = %path.display(), "wrote template");
            written.push(path);
        }

        let manifest_path = dir.join(MANIFEST_FILE);
        let manifest = serde_json::to_string_pretty(&self.manifest())?;
        tokio::fs::write(&manifest_path, manifest).await?;
        written.push(manifest_path);

        info!(dir = %dir.display(), stacks = self.stacks.len(), "wrote cloud assembly");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::stack::Resource;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn assembly() -> CloudAssembly {
        let env = Environment::new("123456789012", "us-east-1");
        let mut net = Stack::new("net", env.clone());
        net.add_resource("Vpc", Resource::new("AWS::EC2::VPC")).unwrap();
        let mut app = Stack::new("app", env);
        app.add_dependency("net");

        let mut assembly = CloudAssembly::new();
        assembly.add_stack(&net).unwrap();
        assembly.add_stack(&app).unwrap();
        assembly
    }

    #[test]
    fn test_manifest() {
        let manifest = serde_json::to_value(assembly().manifest()).unwrap();
        assert_eq!(manifest["version"], json!(MANIFEST_VERSION));
        assert_eq!(
            manifest["artifacts"]["app"],
            json!({
                "type": "aws:cloudformation:stack",
                "environment": "aws://123456789012/us-east-1",
                "properties": {"templateFile": "app.template.json"},
                "dependencies": ["net"],
                "displayName": "app"
            })
        );
        assert!(manifest["artifacts"]["net"].get("dependencies").is_none());
        assert!(manifest.get("missing").is_none());
    }

    #[tokio::test]
    async fn test_write_to() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("cdk.out");
        let written = assembly().write_to(&out).await.unwrap();
        assert_eq!(written.len(), 3);

        let template: Value =
            serde_json::from_str(&std::fs::read_to_string(out.join("net.template.json")).unwrap())
                .unwrap();
        assert_eq!(template["Resources"]["Vpc"]["Type"], json!("AWS::EC2::VPC"));

        let manifest: Manifest =
            serde_json::from_str(&std::fs::read_to_string(out.join(MANIFEST_FILE)).unwrap())
                .unwrap();
        assert_eq!(
            manifest.artifacts.keys().collect::<Vec<_>>(),
            vec!["net", "app"]
        );
    }
}
