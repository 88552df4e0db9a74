use std::path::PathBuf;

use anyhow::{anyhow, Result};
use burn::{backend::NdArray, config::Config, prelude::*};
use burn_ppo::{logging, ActionSpace, PpoModuleConfig};
use burn_ppo_agents::driver::ModuleDriverConfig;
use clap::Parser;

/// Drives a PPO module through repeated forward passes on synthetic
/// observations and reports summary statistics.
#[derive(Parser, Debug)]
struct Args {
    /// Module config as JSON. A CartPole-sized module is used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = 100)]
    steps: usize,
    #[arg(long, default_value_t = 16)]
    batch_size: usize,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Use an LSTM encoder.
    #[arg(long)]
    recurrent: bool,
    /// Run inference passes instead of exploration passes.
    #[arg(long)]
    inference: bool,
}

fn main() -> Result<()> {
    logging::init("info");
    let args = Args::parse();

    type B = NdArray;
    let device: &Device<B> = &Default::default();

    let config = match &args.config {
        Some(path) => PpoModuleConfig::load(path)
            .map_err(|err| anyhow!("failed to load {}: {err}", path.display()))?,
        None => PpoModuleConfig::new(4, ActionSpace::Discrete(2)).with_hidden_sizes(vec![64, 64]),
    };
    tracing::info!(?config, recurrent = args.recurrent, "running PPO module");

    let mut driver = ModuleDriverConfig::new(args.steps, args.batch_size)
        .with_seed(args.seed)
        .with_explore(!args.inference)
        .init::<B>(config.observation_size, config.action_space.clone(), device);

    let stats = if args.recurrent {
        driver.run(&config.init_recurrent::<B>(device)?)?
    } else {
        driver.run(&config.init::<B>(device)?)?
    };
    println!("{stats:#?}");
    Ok(())
}
