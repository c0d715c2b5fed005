use anyhow::Context;
use beer::config::{DataStats, PhoneLoopConfig};
use beer::model::PhoneLoop;
use clap::Parser;
use log::info;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use std::fs;

#[derive(Parser)]
#[command(version, about, long_about = None)]
///
/// Create a phone loop from a unit-group configuration and the global
/// statistics of the training features
///
struct Cli {
    /// strength of the priors
    #[arg(long, default_value_t = 1.0)]
    prior_strength: f64,

    /// standard deviation of the noise added to the initial means
    #[arg(long, default_value_t = 0.1)]
    noise_std: f64,

    /// random seed
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// YAML configuration of the unit groups
    conf: Box<str>,

    /// JSON statistics of the data, `{"mean": [...], "var": [...]}`
    stats: Box<str>,

    /// output JSON phone loop
    out: Box<str>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.prior_strength <= 0.0 {
        anyhow::bail!("the prior strength must be positive");
    }

    let conf = fs::read_to_string(cli.conf.as_ref())
        .with_context(|| format!("reading {}", cli.conf))?;
    let conf = PhoneLoopConfig::from_yaml_str(&conf)?;
    let stats = fs::read_to_string(cli.stats.as_ref())
        .with_context(|| format!("reading {}", cli.stats))?;
    let stats = DataStats::from_json_str(&stats)?;

    let mut rng = Xoshiro256Plus::seed_from_u64(cli.seed);
    let ploop = PhoneLoop::create(
        &conf,
        &stats,
        cli.prior_strength,
        cli.noise_std,
        &mut rng,
    )?;

    let json = serde_json::to_string(&ploop)?;
    fs::write(cli.out.as_ref(), json)
        .with_context(|| format!("writing {}", cli.out))?;
    info!("wrote phone loop with {} units to {}", ploop.n_units(), cli.out);
    Ok(())
}
