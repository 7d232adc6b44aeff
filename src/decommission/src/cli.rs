use controller_core::telemetry::{self, LogFormat};
use controller_core::{Error, Result};
use decommission::config::{OutputFormat, RunConfig};
use decommission::count::{count_contenders, count_releases, render, CountKind};
use decommission::store::KubeStore;
use decommission::{clean, Context};

use clap::{Args, Parser, Subcommand};
use kube::config::{KubeConfigOptions, Kubeconfig};
use std::path::PathBuf;
use std::sync::Arc;

/// Clean up and audit releases scheduled on decommissioned clusters
#[derive(Parser)]
#[command(name = "shipperctl", version, about)]
struct Cli {
    /// Log line format: text or json
    #[arg(long, global = true, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Clean release objects
    #[command(subcommand)]
    Clean(CleanCommand),
    /// Count releases that are scheduled *only* on decommissioned clusters
    #[command(subcommand)]
    Count(CountCommand),
}

#[derive(Subcommand)]
enum CleanCommand {
    /// Delete releases that are scheduled *only* on decommissioned clusters and are not
    /// contenders, and remove decommissioned clusters from the annotations of releases
    /// that are scheduled partially on decommissioned clusters
    DecommissionedClusters(ClusterArgs),
}

#[derive(Subcommand)]
enum CountCommand {
    /// Count *contenders* that are scheduled only on decommissioned clusters
    Contender(CountArgs),
    /// Count *releases* that are scheduled only on decommissioned clusters
    Release(CountArgs),
}

#[derive(Args)]
struct ClusterArgs {
    /// Comma-separated list of decommissioned clusters
    #[arg(
        long,
        alias = "decommissionedClusters",
        value_delimiter = ',',
        required = true
    )]
    decommissioned_clusters: Vec<String>,

    /// Only print the objects that would be modified or deleted
    #[arg(long)]
    dryrun: bool,

    /// Path to the Kubernetes configuration file, defaults to the usual lookup
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    /// Context used to talk to the management cluster, defaults to the current one
    #[arg(long)]
    management_cluster_context: Option<String>,
}

#[derive(Args)]
struct CountArgs {
    #[command(flatten)]
    clusters: ClusterArgs,

    /// Output format, one of: json, yaml
    #[arg(short, long)]
    output: Option<OutputFormat>,
}

impl ClusterArgs {
    fn run_config(&self) -> Result<RunConfig> {
        Ok(RunConfig::new(&self.decommissioned_clusters)?.with_dry_run(self.dryrun))
    }

    async fn context(&self) -> Result<Context> {
        let options = KubeConfigOptions {
            context: self.management_cluster_context.clone(),
            ..Default::default()
        };
        let config = match (&self.kubeconfig, &self.management_cluster_context) {
            (Some(path), _) => {
                let kubeconfig = Kubeconfig::read_from(path).map_err(Error::KubeconfigError)?;
                kube::Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .map_err(Error::KubeconfigError)?
            }
            (None, Some(_)) => kube::Config::from_kubeconfig(&options)
                .await
                .map_err(Error::KubeconfigError)?,
            (None, None) => kube::Config::infer().await.map_err(Error::InferConfigError)?,
        };
        let client = kube::Client::try_from(config).map_err(Error::KubeError)?;
        Ok(Context::new(Arc::new(KubeStore::new(client))))
    }
}

async fn run_clean(args: ClusterArgs) -> Result<()> {
    let config = args.run_config()?;
    let ctx = args.context().await?;

    let outcome = clean(&ctx, &config).await?;
    for entry in &outcome.value.entries {
        println!("{entry}");
    }
    outcome.check()
}

async fn run_count(args: CountArgs, kind: CountKind) -> Result<()> {
    let config = args.clusters.run_config()?.with_output(args.output);
    let ctx = args.clusters.context().await?;

    let outcome = match kind {
        CountKind::Releases => count_releases(&ctx, &config).await?,
        CountKind::Contenders => count_contenders(&ctx, &config).await?,
    };
    println!("{}", render(&outcome.value, config.output())?.trim_end());
    outcome.check()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.log_format)?;

    match cli.command {
        Command::Clean(CleanCommand::DecommissionedClusters(args)) => run_clean(args).await?,
        Command::Count(CountCommand::Release(args)) => run_count(args, CountKind::Releases).await?,
        Command::Count(CountCommand::Contender(args)) => run_count(args, CountKind::Contenders).await?,
    }
    Ok(())
}
