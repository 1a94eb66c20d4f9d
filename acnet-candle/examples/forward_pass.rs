//! Builds an actor and a critic and runs one forward pass on random states.
//!
//! ```bash
//! cargo run -p acnet-candle --example forward_pass -- --state-size 33 --action-size 4
//! cargo run -p acnet-candle --example forward_pass -- --config demo.yaml
//! ```
use acnet_candle::{model::Parameterized, util::param_stats, Actor, ActorConfig, Critic, CriticConfig, Device};
use anyhow::Result;
use candle_core::Tensor;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::PathBuf};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
struct DemoConfig {
    actor: ActorConfig,
    critic: CriticConfig,
    device: Device,
    batch_size: usize,
}

/// Run a forward pass through freshly initialized networks.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// YAML file with `actor`, `critic`, `device` and `batch_size` entries.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of state features, used without a config file.
    #[arg(long, default_value_t = 4)]
    state_size: usize,

    /// Number of action components, used without a config file.
    #[arg(long, default_value_t = 2)]
    action_size: usize,

    /// Number of samples in the batch.
    #[arg(long, default_value_t = 8)]
    batch_size: usize,

    /// Seed of both networks.
    #[arg(long, default_value_t = 123)]
    seed: u64,

    /// Use evaluation mode for batch normalization.
    #[arg(long, default_value_t = false)]
    eval: bool,

    /// Print mean and standard deviation of the initial parameters.
    #[arg(long, default_value_t = false)]
    show_params: bool,
}

fn demo_config(args: &Args) -> Result<DemoConfig> {
    match &args.config {
        Some(path) => {
            let rdr = BufReader::new(File::open(path)?);
            Ok(serde_yaml::from_reader(rdr)?)
        }
        None => Ok(DemoConfig {
            actor: ActorConfig::new(args.state_size, args.action_size).seed(args.seed),
            critic: CriticConfig::new(args.state_size, args.action_size).seed(args.seed),
            device: Device::Cpu,
            batch_size: args.batch_size,
        }),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = demo_config(&args)?;
    let device = config.device.build()?;

    let mut actor = Actor::build(config.actor.clone(), device.clone())?;
    let mut critic = Critic::build(config.critic.clone(), device.clone())?;
    actor.set_train(!args.eval);
    critic.set_train(!args.eval);

    if args.show_params {
        for (k, v) in param_stats(actor.varmap())? {
            println!("actor  {:24} {:+.6}", k, v);
        }
        for (k, v) in param_stats(critic.varmap())? {
            println!("critic {:24} {:+.6}", k, v);
        }
    }

    let state = Tensor::randn(0f32, 1f32, (config.batch_size, config.actor.state_size), &device)?;
    let action = actor.forward(&state)?;
    let value = critic.forward(&state, &action)?;

    println!("action {:?}", action.dims());
    println!("{}", action);
    println!("value {:?}", value.dims());
    println!("{}", value);

    Ok(())
}
