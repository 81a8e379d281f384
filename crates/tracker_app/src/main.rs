mod cli;
mod commands;
mod render;

use clap::Parser;
use tracker_logging::tracker_debug;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    if let Some(destination) = cli.log_destination() {
        tracker_logging::initialize(destination, cli.log_level());
    }

    let settings = cli.settings()?;
    tracker_debug!("Using jobs api at {}", settings.api_base_url);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let mut stdout = std::io::stdout();
    runtime.block_on(commands::run(cli.command, settings, &mut stdout))
}
