use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use fixate::robot::ShimClient;
use fixate::{fixate_start, init_tracing, parse_config_file, Orchestrator};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct FixateCliArgs {
    /// Path to the application config file (TOML)
    config_file: std::path::PathBuf,
}

fn main() -> Result<()> {
    fixate_start("fixate");
    init_tracing();

    let args = FixateCliArgs::parse();
    let config = parse_config_file(&args.config_file)?;
    info!(
        "video {} | joints {} | perception {} | robot {}",
        config.video_addr, config.joints_addr, config.perception_addr, config.robot_addr
    );

    let robot = Arc::new(ShimClient::new(config.robot_addr.clone()));
    let mut orchestrator = Orchestrator::start(config, robot)?;
    info!("tracking controller running");
    orchestrator.wait();
    Ok(())
}
