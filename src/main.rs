use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc::unbounded_channel;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
use config::GhNotifyConfig;

mod feeds;
use feeds::{deliver_batches, ChannelForwarder};

mod notices;
use notices::{AuthorizedRepos, Dispatcher};

mod webhooks;
use webhooks::build_rocket;

#[derive(Parser)]
#[command(version)]
struct Opts {
    /// Configuration file for ghnotify
    #[arg(short, long)]
    config: PathBuf,
}

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let opts = Opts::parse();
    let config_file = File::open(&opts.config)
        .with_context(|| format!("couldn't open {}:", opts.config.display()))?;
    let config: GhNotifyConfig = serde_yaml::from_reader(BufReader::new(config_file))
        .context("couldn't parse config file")?;

    let (sender, receiver) = unbounded_channel();
    tokio::spawn(deliver_batches(receiver, config.delivery_timeout()));

    let authorized_repos = config.authorized_repos.clone().map(AuthorizedRepos::new);
    if let Some(repos) = &config.authorized_repos {
        info!("only accepting events for {} repositories", repos.len());
    }

    let forward_timeout = config.forward_timeout();
    let GhNotifyConfig {
        github_secret,
        merge_pattern,
        feeds,
        ..
    } = config;

    let dispatcher = Dispatcher::new(
        Box::new(ChannelForwarder(sender)),
        feeds,
        merge_pattern,
        authorized_repos,
        forward_timeout,
    );

    build_rocket(github_secret, dispatcher)
        .launch()
        .await
        .map(|_| ())
        .map_err(|err| anyhow::anyhow!(err))
}
