//! The app: all three stacks, wired in dependency order.

use indexmap::IndexMap;
use tracing::info;

use crate::assembly::CloudAssembly;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::graph::StackGraph;
use crate::lookup::LookupCache;
use crate::model::user_data::UserData;
use crate::settings::Settings;
use crate::stack::Stack;
use crate::stacks::{build_bastion_stack, build_network_stack, build_private_stack};

/// The deployment: network, bastion, and private host stacks.
#[derive(Debug, Clone)]
pub struct App {
    settings: Settings,
    environment: Environment,
    stacks: IndexMap<String, Stack>,
    graph: StackGraph,
    user_data: UserData,
}

impl App {
    /// Build every stack from settings. `lookups` answers context lookups
    /// for the use-existing-VPC path.
    pub fn from_settings(
        settings: Settings,
        environment: Environment,
        lookups: &LookupCache,
    ) -> Result<Self> {
        let network = build_network_stack(
            &settings.network_stack_name(),
            &settings.network,
            &environment,
            lookups,
        )?;
        let bastion = build_bastion_stack(
            &settings.bastion_stack_name(),
            &settings.bastion,
            &network.handle,
            &environment,
        )?;
        let private = build_private_stack(
            &settings.private_stack_name(),
            &settings.private,
            &network.handle,
            &bastion.security_group,
            &environment,
        )?;

        let mut app = Self {
            settings,
            environment,
            stacks: IndexMap::new(),
            graph: StackGraph::new(),
            user_data: private.user_data,
        };
        app.add_stack(network.stack)?;
        app.add_stack(bastion.stack)?;
        app.add_stack(private.stack)?;
        Ok(app)
    }

    fn add_stack(&mut self, stack: Stack) -> Result<()> {
        let name = stack.name().to_string();
        if self.stacks.contains_key(&name) {
            return Err(Error::DuplicateStack(name));
        }
        self.graph.add_stack(&name);
        for producer in stack.dependencies() {
            self.graph.add_dependency(&name, producer)?;
        }
        self.stacks.insert(name, stack);
        Ok(())
    }

    /// Settings the app was built from.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Target environment.
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Stacks in construction order.
    pub fn stacks(&self) -> impl Iterator<Item = &Stack> {
        self.stacks.values()
    }

    /// Stack by name.
    pub fn stack(&self, name: &str) -> Option<&Stack> {
        self.stacks.get(name)
    }

    /// Dependency graph.
    pub fn graph(&self) -> &StackGraph {
        &self.graph
    }

    /// User data of the private host.
    pub fn user_data(&self) -> &UserData {
        &self.user_data
    }

    /// Stacks `name` declares directly.
    pub fn direct_dependencies(&self, name: &str) -> Result<Vec<String>> {
        self.graph.direct_dependencies(name)
    }

    /// Every stack `name` depends on, directly or transitively.
    pub fn dependencies_of(&self, name: &str) -> Result<Vec<String>> {
        self.graph.dependencies_of(name)
    }

    /// Stack names in deployment order.
    pub fn deployment_order(&self) -> Result<Vec<String>> {
        self.graph.deployment_order()
    }

    /// Graphviz rendering of the dependency graph.
    pub fn to_dot(&self) -> String {
        self.graph.to_dot()
    }

    /// Render every stack into a cloud assembly, producers first.
    pub fn synth(&self) -> Result<CloudAssembly> {
        let mut assembly = CloudAssembly::new();
        for name in self.deployment_order()? {
            let stack = self
                .stacks
                .get(&name)
                .ok_or_else(|| Error::StackNotFound(name.clone()))?;
            assembly.add_stack(stack)?;
        }
        info!(
            stacks = assembly.stacks().len(),
            missing_lookups = assembly.missing().len(),
            environment = %self.environment,
            "synthesized cloud assembly"
        );
        Ok(assembly)
    }
}
