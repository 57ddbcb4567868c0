//! Donation Platform CLI
//!
//! Browse campaigns, donate, and view NFT receipts from the terminal.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use donation_client::commands;
use donation_client::config::{ClientConfig, Network};

#[derive(Parser)]
#[command(name = "donation-client")]
#[command(about = "Donate to campaigns and collect NFT receipts")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Network to use: local or ic
    #[arg(short, long, global = true)]
    network: Option<Network>,

    /// Custom session file path
    #[arg(long, global = true)]
    session: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect a wallet (local key or identity provider login)
    Connect,

    /// Forget the current session
    Disconnect,

    /// Show the connected principal
    Whoami,

    /// Show replica health and configured services
    Status,

    /// List campaigns
    Campaigns {
        /// Only the N most funded active campaigns
        #[arg(long, value_name = "N", num_args = 0..=1, default_missing_value = "3")]
        featured: Option<usize>,
    },

    /// Show one campaign
    Campaign {
        id: String,
    },

    /// Open a new campaign with yourself as recipient
    CreateCampaign {
        /// Unique campaign id
        id: String,

        /// Target amount in tokens, e.g. 1000.50
        target: String,

        #[arg(long)]
        title: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Last day of the campaign (YYYY-MM-DD)
        #[arg(long)]
        end_date: Option<String>,

        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Donate to a campaign and mint a receipt NFT
    Donate {
        campaign: String,

        /// Amount in tokens, e.g. 2.5
        amount: String,

        /// Optional reference stored with the donation
        #[arg(long)]
        reference: Option<String>,

        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Withdraw the funds raised by one of your campaigns
    Withdraw {
        campaign: String,

        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Show platform totals
    Stats,

    /// List donations (yours by default)
    Donations {
        #[arg(long, conflicts_with = "donor")]
        campaign: Option<String>,

        #[arg(long)]
        donor: Option<String>,
    },

    /// Show a token balance (yours by default)
    Balance {
        owner: Option<String>,
    },

    /// Show token ledger metadata
    TokenInfo,

    /// Send tokens
    Transfer {
        to: String,

        /// Amount in tokens
        amount: String,

        #[arg(long)]
        memo: Option<String>,

        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Allow another principal to spend your tokens
    Approve {
        spender: String,

        /// Amount in tokens
        amount: String,

        /// Approval lifetime in seconds
        #[arg(long)]
        expires_in: Option<u64>,

        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Show an allowance
    Allowance {
        spender: String,

        /// Owner (defaults to you)
        #[arg(long)]
        owner: Option<String>,
    },

    /// List receipt NFTs (yours by default)
    Nfts {
        #[arg(long, conflicts_with = "all")]
        campaign: Option<String>,

        #[arg(long)]
        all: bool,
    },

    /// Show one receipt NFT
    Nft {
        token_id: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = load_config(&cli)?;

    let result = match cli.command {
        Commands::Connect => commands::session::connect(config).await,
        Commands::Disconnect => commands::session::disconnect(config),
        Commands::Whoami => commands::session::whoami(config),
        Commands::Status => commands::status::run(config).await,
        Commands::Campaigns { featured } => commands::campaigns::list(config, featured).await,
        Commands::Campaign { id } => commands::campaigns::show(config, &id).await,
        Commands::CreateCampaign {
            id,
            target,
            title,
            description,
            end_date,
            yes,
        } => {
            commands::campaigns::create(
                config,
                id,
                title,
                description,
                &target,
                end_date.as_deref(),
                yes,
            )
            .await
        }
        Commands::Donate {
            campaign,
            amount,
            reference,
            yes,
        } => commands::donate::run(config, &campaign, &amount, reference.as_deref(), yes).await,
        Commands::Withdraw { campaign, yes } => {
            commands::campaigns::withdraw(config, &campaign, yes).await
        }
        Commands::Stats => commands::campaigns::stats(config).await,
        Commands::Donations { campaign, donor } => {
            commands::campaigns::donations(config, campaign.as_deref(), donor.as_deref()).await
        }
        Commands::Balance { owner } => commands::token::balance(config, owner.as_deref()).await,
        Commands::TokenInfo => commands::token::info(config).await,
        Commands::Transfer {
            to,
            amount,
            memo,
            yes,
        } => commands::token::transfer(config, &to, &amount, memo.as_deref(), yes).await,
        Commands::Approve {
            spender,
            amount,
            expires_in,
            yes,
        } => commands::token::approve(config, &spender, &amount, expires_in, yes).await,
        Commands::Allowance { spender, owner } => {
            commands::token::allowance(config, owner.as_deref(), &spender).await
        }
        Commands::Nfts { campaign, all } => {
            commands::nfts::list(config, campaign.as_deref(), all).await
        }
        Commands::Nft { token_id } => commands::nfts::show(config, token_id).await,
    };

    if let Err(e) = &result {
        commands::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}

/// Config file (explicit, or the default if present), then environment,
/// then command-line flags
fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let default_path = dirs::home_dir().map(|home| home.join(".donation-client").join("config.toml"));
    let mut config = match (&cli.config, default_path) {
        (Some(path), _) => ClientConfig::from_file(path)?,
        (None, Some(path)) if path.exists() => ClientConfig::from_file(&path)?,
        _ => ClientConfig::default(),
    };

    config.apply_env(std::env::vars())?;

    if let Some(network) = cli.network {
        config.network = network;
    }
    if let Some(session) = &cli.session {
        config.session_file = Some(session.clone());
    }
    config.validate()?;
    Ok(config)
}
