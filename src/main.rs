use clap::Parser;
use tracing_subscriber::EnvFilter;

use venue_flow::api;
use venue_flow::cli::{Cli, Command};
use venue_flow::config::Settings;
use venue_flow::{plan, schema};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("venue_flow=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Api { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(api::serve(&host, port, Settings::from_env()))
        }
        Command::Plan {
            prompt,
            group_size,
            budget,
            location,
            vibe,
            json,
        } => plan::run(
            Settings::from_env(),
            &plan::PlanArgs {
                prompt,
                group_size,
                budget,
                location,
                vibe,
                json,
            },
        ),
        Command::Schema => schema::run(),
    }
}
