use anyhow::Context;
use beer::config::PhoneLoopConfig;
use beer::dist::NormalFull;
use beer::model::PhoneLoop;
use beer::subspace::{init_unit_stats, Gsm, PdfLayout, UnitLatentPosteriors};
use clap::Parser;
use log::{debug, info};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use serde::Serialize;
use std::fs;

#[derive(Parser)]
#[command(version, about, long_about = None)]
///
/// Create a subspace phone loop: the units of one group of a trained phone
/// loop get their priors from a generalized subspace model
///
struct Cli {
    /// group of units to model with the subspace
    #[arg(short = 'g', long, default_value = "speech-unit")]
    unit_group: Box<str>,

    /// dimension of the latent space
    #[arg(short = 'l', long, default_value_t = 2)]
    latent_dim: usize,

    /// random seed
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// YAML configuration used to create the phone loop
    conf: Box<str>,

    /// JSON phone loop to initialize the subspace from
    phoneloop: Box<str>,

    /// output JSON subspace model
    gsm: Box<str>,

    /// output JSON latent posteriors of the units
    posts: Box<str>,

    /// output JSON subspace phone loop
    sploop: Box<str>,

    /// output JSON summary of the units in the subspace
    units: Box<str>,
}

#[derive(Serialize)]
struct UnitSummary {
    unit: usize,
    latent_mean: Vec<f64>,
}

#[derive(Serialize)]
struct SubspaceSummary {
    unit_group: String,
    n_units: usize,
    n_states: usize,
    latent_dim: usize,
    pdfvec_len: usize,
    units: Vec<UnitSummary>,
}

fn write_json<T: Serialize>(path: &str, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string(value)?;
    fs::write(path, json).with_context(|| format!("writing {path}"))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    debug!("reading configuration file: {}", cli.conf);
    let conf = fs::read_to_string(cli.conf.as_ref())
        .with_context(|| format!("reading {}", cli.conf))?;
    let conf = PhoneLoopConfig::from_yaml_str(&conf)?;
    let (group_idx, group) = conf.find_group(&cli.unit_group)?;
    let (n_units, n_states) = (group.n_units, group.n_states());
    debug!("group {group_idx}: {n_units} units of {n_states} states");

    debug!("loading the phone loop: {}", cli.phoneloop);
    let ploop = fs::read_to_string(cli.phoneloop.as_ref())
        .with_context(|| format!("reading {}", cli.phoneloop))?;
    let mut ploop: PhoneLoop = serde_json::from_str(&ploop)?;

    let emissions = ploop.group_emissions_mut(group_idx)?;
    if n_states == 0 {
        anyhow::bail!("group \"{}\" has no emitting state", cli.unit_group);
    }
    let layout = PdfLayout::from_unit(&emissions[..n_states.min(emissions.len())])?;
    layout.check_units(emissions, n_units)?;

    debug!("initializing the parameters' statistics");
    init_unit_stats(emissions, n_states)?;

    let mut rng = Xoshiro256Plus::seed_from_u64(cli.seed);
    let latent_prior = NormalFull::standard(cli.latent_dim)?;
    let template = emissions[..n_states].to_vec();
    let gsm = Gsm::create(layout, &template, cli.latent_dim, latent_prior, &mut rng)?;

    let posts = gsm.new_latent_posteriors(n_units);
    let pdfvecs = gsm.expected_pdfvecs(&posts);
    gsm.update_models(emissions, &pdfvecs)?;

    let summary = SubspaceSummary {
        unit_group: cli.unit_group.to_string(),
        n_units,
        n_states,
        latent_dim: gsm.latent_dim(),
        pdfvec_len: gsm.layout().len(),
        units: posts
            .iter()
            .enumerate()
            .map(|(unit, post)| UnitSummary {
                unit,
                latent_mean: post.mean().iter().cloned().collect(),
            })
            .collect(),
    };

    write_json(&cli.gsm, &gsm)?;
    write_json(
        &cli.posts,
        &UnitLatentPosteriors {
            posteriors: posts,
            n_units,
            n_states,
        },
    )?;
    write_json(&cli.sploop, &ploop)?;
    write_json(&cli.units, &summary)?;
    info!("created {n_units} subspace HMMs");
    Ok(())
}
