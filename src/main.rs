//! syncstack - synthesize the S3 sync server deployment
//!
//! This is the main entry point for the syncstack CLI.

mod cli;

use anyhow::Result;
use cli::commands::CommandContext;
use cli::Cli;
use syncstack::config::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application version information
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config: {:#}", e);
        Config::from_env()
    });

    // Initialize logging based on verbosity
    init_logging(cli.verbosity(), &config);

    if cli.verbosity() >= 2 {
        eprintln!("{}", syncstack::version_info());
    }
    tracing::debug!(version = VERSION, app = %config.synth.app.display(), "starting");

    // Create command context
    let mut ctx = CommandContext::new(&cli, config);

    // Execute the appropriate command
    let result = cli.command.runnable().run(&mut ctx).await;

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            ctx.output.error(&format!("{:#}", e));
            exit_code_for(&e)
        }
    };

    std::process::exit(exit_code);
}

/// Initialize logging based on verbosity level
///
/// `RUST_LOG` wins over everything; without it `-v` picks the level, and
/// with no `-v` the configured level applies.
fn init_logging(verbosity: u8, config: &Config) {
    let filter = match verbosity {
        0 => config.logging.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if config.logging.json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(verbosity >= 3)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
}

/// Exit status for a failed command: the library error's code when one is
/// in the chain, 1 otherwise
fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<syncstack::error::Error>())
        .map(syncstack::error::Error::exit_code)
        .unwrap_or(1)
}
