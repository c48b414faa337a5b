//! List command - stacks in deployment order

use super::{CommandContext, Runnable};
use anyhow::Result;
use clap::Parser;

/// Arguments for the list command
#[derive(Parser, Debug, Clone)]
pub struct ListArgs {
    /// Show each stack's environment and resource count
    #[arg(short = 'l', long)]
    pub long: bool,
}

impl ListArgs {
    /// Execute the list command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let app = ctx.build_app()?;
        let order = app.deployment_order()?;

        if ctx.output.is_json() {
            let mut stacks = Vec::with_capacity(order.len());
            for name in &order {
                let stack = app.stack(name);
                stacks.push(serde_json::json!({
                    "name": name,
                    "dependencies": app.direct_dependencies(name)?,
                    "environment": stack.map(|s| s.environment().to_string()),
                    "resources": stack.map(|s| s.resources().len()),
                }));
            }
            ctx.output.raw(&serde_json::to_string_pretty(&stacks)?);
            return Ok(0);
        }

        let mut headers = vec!["STACK", "DEPENDS ON"];
        if self.long {
            headers.extend(["ENVIRONMENT", "RESOURCES"]);
        }

        let mut rows = Vec::with_capacity(order.len());
        for name in &order {
            let mut row = vec![name.clone(), app.direct_dependencies(name)?.join(", ")];
            if self.long {
                if let Some(stack) = app.stack(name) {
                    row.push(stack.environment().to_string());
                    row.push(stack.resources().len().to_string());
                }
            }
            rows.push(row);
        }

        ctx.output.table(&headers, &rows);
        Ok(0)
    }
}

#[async_trait::async_trait]
impl Runnable for ListArgs {
    async fn run(&self, ctx: &mut CommandContext) -> Result<i32> {
        self.execute(ctx).await
    }
}
