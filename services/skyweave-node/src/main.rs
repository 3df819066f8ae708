use anyhow::{bail, Context};
use serde::Serialize;
use skyweave_core::{logging, Config};
use skyweave_node::{ScenarioConfig, Simulation};
use std::path::PathBuf;
use tracing::info;

const NODE_PROTOCOL_VERSION: u32 = 1;
const NODE_RUNTIME_VERSION: u32 = 1;

#[derive(Debug, Serialize)]
struct NodeVersionHandshake {
    version: &'static str,
    runtime_version: u32,
    protocol_version: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|arg| arg == "--version-json") {
        let handshake = NodeVersionHandshake {
            version: env!("CARGO_PKG_VERSION"),
            runtime_version: NODE_RUNTIME_VERSION,
            protocol_version: NODE_PROTOCOL_VERSION,
        };
        println!("{}", serde_json::to_string(&handshake)?);
        return Ok(());
    }

    let scenario_path = parse_path(&args, "--scenario")?
        .context("missing required --scenario <path> argument")?;
    let config = parse_path(&args, "--config")?
        .map(|path| {
            Config::from_file(&path)
                .with_context(|| format!("failed to load config {}", path.display()))
        })
        .transpose()?;
    let scenario = ScenarioConfig::from_file(&scenario_path)?;

    let logging_config = config
        .as_ref()
        .or(scenario.config.as_ref())
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    logging::init_from_config(&logging_config);

    info!(
        scenario = %scenario.name,
        path = %scenario_path.display(),
        agents = scenario.agents.len(),
        "[skyweave-node] started"
    );

    let report = Simulation::new(scenario, config).run().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn parse_path(args: &[String], flag: &str) -> anyhow::Result<Option<PathBuf>> {
    let mut args_iter = args.iter();
    while let Some(arg) = args_iter.next() {
        if arg == flag {
            if let Some(path) = args_iter.next() {
                return Ok(Some(PathBuf::from(path)));
            }
            bail!("{flag} was provided without a path");
        }
    }

    Ok(None)
}
