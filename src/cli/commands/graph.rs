//! Graph command - stack dependencies as Graphviz DOT

use super::{CommandContext, Runnable};
use anyhow::Result;
use clap::Parser;

/// Arguments for the graph command
#[derive(Parser, Debug, Clone)]
pub struct GraphArgs {}

impl GraphArgs {
    /// Execute the graph command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let app = ctx.build_app()?;
        ctx.output.debug(&format!(
            "{} stacks, {} dependency edges",
            app.graph().node_count(),
            app.graph().edge_count()
        ));
        ctx.output.raw(app.to_dot().trim_end());
        Ok(0)
    }
}

#[async_trait::async_trait]
impl Runnable for GraphArgs {
    async fn run(&self, ctx: &mut CommandContext) -> Result<i32> {
        self.execute(ctx).await
    }
}
