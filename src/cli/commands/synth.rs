//! Synth command
//!
//! Builds every stack and writes the cloud assembly, or prints one rendered
//! template to stdout.

use super::{CommandContext, Runnable};
use crate::cli::output::StackStatus;
use anyhow::{Context as _, Result};
use clap::Parser;
use std::path::PathBuf;

/// Arguments for the synth command
#[derive(Parser, Debug, Clone)]
pub struct SynthArgs {
    /// Directory to write the cloud assembly to
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Print the template of this stack instead of writing the assembly
    #[arg(long, value_name = "STACK")]
    pub stdout: Option<String>,
}

impl SynthArgs {
    /// Execute the synth command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let app = ctx.build_app()?;
        let assembly = app.synth()?;

        for lookup in assembly.missing() {
            ctx.output.warning(&format!(
                "lookup '{}' has no cached answer; dummy values were used",
                lookup.key
            ));
        }

        if let Some(name) = &self.stdout {
            let template = assembly
                .template(name)
                .with_context(|| format!("No stack named '{}'", name))?;
            ctx.output.raw(&serde_json::to_string_pretty(template)?);
            return Ok(0);
        }

        let dir = self
            .output
            .clone()
            .unwrap_or_else(|| ctx.config.synth.output.clone());

        ctx.output.banner("SYNTH");
        let written = assembly
            .write_to(&dir)
            .await
            .with_context(|| format!("Failed to write cloud assembly to {}", dir.display()))?;
        ctx.output
            .debug(&format!("Wrote {} files", written.len()));

        let status = if assembly.has_missing() {
            StackStatus::PendingLookups
        } else {
            StackStatus::Synthesized
        };
        for stack in assembly.stacks() {
            let file = dir.join(stack.template_file());
            ctx.output
                .stack_result(&stack.name, status, Some(&file.display().to_string()));
        }

        ctx.output.recap(
            assembly.stacks().len(),
            assembly.missing().len(),
            &dir.display().to_string(),
        );
        ctx.output.flush();

        Ok(0)
    }
}

#[async_trait::async_trait]
impl Runnable for SynthArgs {
    async fn run(&self, ctx: &mut CommandContext) -> Result<i32> {
        self.execute(ctx).await
    }
}
