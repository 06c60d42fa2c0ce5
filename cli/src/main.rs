//! Token bridge fork harness CLI.

mod config;
mod report;
mod runner;

use {
    clap::{Parser, Subcommand},
    config::{ConfigFile, Settings},
    fork_harness::{
        error::HarnessError,
        keys::{KeypairFactory, RandomKeypairs, SeededKeypairs},
        local::LocalCluster,
        provision::provision,
        result::Config,
        rpc::RpcCluster,
        suite::Suite,
        Cluster, HarnessContext,
    },
    report::SuiteMarkdownReport,
    runner::Runner,
    solana_keypair::Keypair,
    solana_signer::Signer,
};

/// Lamports airdropped to the payer on a local cluster.
const LOCAL_PAYER_LAMPORTS: u64 = 1_000_000_000_000;

/// Seed for the message keypairs of local runs, which keeps local reports
/// stable between runs.
const LOCAL_SEED: [u8; 32] = [7; 32];

#[derive(Subcommand)]
enum SubCommand {
    /// Run the standard suite against both deployments and compare the
    /// outcomes.
    Run {
        /// Path to the config file (YAML, or JSON by extension).
        #[arg(short, long)]
        config: Option<String>,
        /// Run against an in-process cluster instead of the configured RPC
        /// endpoint.
        #[arg(long)]
        local: bool,
        /// Print every side's result and divergence, and log at debug level.
        #[arg(short, long)]
        verbose: bool,
        /// Directory to write a markdown report.
        #[arg(long)]
        report_dir: Option<String>,
        /// Table header for the markdown report.
        ///
        /// Note this flag is ignored if `report_dir` is not set.
        #[arg(long)]
        report_table_header: Option<String>,
    },
    /// Create the payer's token accounts and mint the provisioning amount
    /// into each.
    Provision {
        /// Path to the config file (YAML, or JSON by extension).
        #[arg(short, long, required = true)]
        config: String,
    },
}

#[derive(Parser)]
struct Cli {
    #[clap(subcommand)]
    pub command: SubCommand,
}

fn load_settings(config: Option<&str>) -> Result<Settings, Box<dyn std::error::Error>> {
    let file = match config {
        Some(path) => ConfigFile::try_load(path)?,
        None => ConfigFile::default(),
    };
    Ok(file.resolve()?)
}

fn require_payer(settings: &mut Settings) -> Result<Keypair, HarnessError> {
    settings.payer.take().ok_or_else(|| {
        HarnessError::Config("a payer keypair is required against an RPC endpoint".to_string())
    })
}

fn local_cluster(settings: &Settings, payer: &Keypair) -> LocalCluster {
    let cluster = LocalCluster::new().with_deployments(&settings.deployments);
    for mint in &settings.mints {
        cluster.add_mint(mint, &payer.pubkey());
    }
    cluster.airdrop(&payer.pubkey(), LOCAL_PAYER_LAMPORTS);
    cluster
}

fn context<C: Cluster, K: KeypairFactory>(
    cluster: C,
    payer: Keypair,
    keys: K,
    settings: &mut Settings,
    verbose: bool,
) -> HarnessContext<C, K> {
    let ctx = HarnessContext::new(cluster, payer)
        .with_keys(keys)
        .with_deployments(settings.deployments)
        .with_compares(settings.compares.clone())
        .with_config(Config {
            panic: false,
            verbose,
        });
    match settings.sender_authority.take() {
        Some(sender_authority) => ctx.with_sender_authority(sender_authority),
        None => ctx,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let pass = match Cli::parse().command {
        SubCommand::Run {
            config,
            local,
            verbose,
            report_dir,
            report_table_header,
        } => {
            solana_logger::setup_with_default(if verbose {
                "fork_harness=debug,fork_harness_result=debug"
            } else {
                "fork_harness=info"
            });

            let mut settings = load_settings(config.as_deref())?;
            let suite = Suite::standard_with_amount(&settings.mints, settings.amount);
            let report = report_dir.map(|dir| SuiteMarkdownReport::new(dir, report_table_header));

            if local {
                let payer = settings.payer.take().unwrap_or_else(Keypair::new);
                let cluster = local_cluster(&settings, &payer);
                let ctx = context(
                    cluster,
                    payer,
                    SeededKeypairs::new(LOCAL_SEED),
                    &mut settings,
                    verbose,
                );
                Runner::new("local", report, verbose)
                    .run_all(&ctx, &suite, settings.provision_amount)
                    .await
            } else {
                let payer = require_payer(&mut settings)?;
                let cluster = RpcCluster::new(settings.rpc_url.clone());
                let ctx = context(
                    cluster,
                    payer,
                    RandomKeypairs::new(),
                    &mut settings,
                    verbose,
                );
                Runner::new(settings.rpc_url.clone(), report, verbose)
                    .run_all(&ctx, &suite, settings.provision_amount)
                    .await
            }
        }
        SubCommand::Provision { config } => {
            solana_logger::setup_with_default("fork_harness=info");

            let mut settings = load_settings(Some(&config))?;
            let payer = require_payer(&mut settings)?;
            let cluster = RpcCluster::new(settings.rpc_url.clone());
            match provision(
                &cluster,
                &settings.mints,
                &payer,
                settings.provision_amount,
            )
            .await
            {
                Ok(token_accounts) => {
                    for (mint, token_account) in settings.mints.iter().zip(token_accounts) {
                        println!("PROVISIONED: {} -> {}", mint.address, token_account);
                    }
                    true
                }
                Err(err) => {
                    println!("{err}");
                    false
                }
            }
        }
    };

    if !pass {
        std::process::exit(1);
    }
    Ok(())
}
