//! User-data command - print what the private host runs at first boot

use super::{CommandContext, Runnable};
use anyhow::Result;
use clap::Parser;

/// Arguments for the user-data command
#[derive(Parser, Debug, Clone)]
pub struct UserDataArgs {
    /// Print the payload exactly as attached to the instance instead of the
    /// bare script
    #[arg(long)]
    pub rendered: bool,
}

impl UserDataArgs {
    /// Execute the user-data command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let app = ctx.build_app()?;
        let user_data = app.user_data();

        if ctx.output.is_json() {
            let payload = serde_json::json!({
                "format": user_data.format().to_string(),
                "script": user_data.script(),
                "rendered": user_data.render(),
            });
            ctx.output.raw(&serde_json::to_string_pretty(&payload)?);
            return Ok(0);
        }

        let text = if self.rendered {
            user_data.render()
        } else {
            user_data.script()
        };
        ctx.output.raw(text.trim_end());
        Ok(0)
    }
}

#[async_trait::async_trait]
impl Runnable for UserDataArgs {
    async fn run(&self, ctx: &mut CommandContext) -> Result<i32> {
        self.execute(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_data_args() {
        let args = UserDataArgs::try_parse_from(["user-data", "--rendered"]).unwrap();
        assert!(args.rendered);
    }
}
