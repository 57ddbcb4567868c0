//! CLI Commands
//!
//! Each command builds a [`Context`] and prints what the services return.

pub mod campaigns;
pub mod donate;
pub mod nfts;
pub mod session;
pub mod status;
pub mod token;

use anyhow::Result;
use std::io::{self, Write};
use std::sync::Arc;

use crate::amount::format_progress;
use crate::client::DonationClient;
use crate::config::{ClientConfig, Network};
use crate::rpc::HttpTransport;
use crate::session::{
    DelegatedProvider, EphemeralProvider, IdentityProvider, Session, SessionStore,
};
use crate::types::Campaign;

/// Environment variable holding the session passphrase for non-interactive use
pub const PASSPHRASE_ENV: &str = "DONATION_SESSION_PASSPHRASE";

/// Prompt for password input (hidden)
pub fn prompt_password(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let password = rpassword::read_password()?;
    Ok(password)
}

/// Prompt for confirmation
pub fn prompt_confirm(message: &str) -> Result<bool> {
    print!("{} [y/N]: ", message);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(input.trim().eq_ignore_ascii_case("y") || input.trim().eq_ignore_ascii_case("yes"))
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("\x1b[31mError:\x1b[0m {}", message);
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("\x1b[32m{}\x1b[0m", message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("\x1b[33mWarning:\x1b[0m {}", message);
}

/// Session passphrase from the environment, or prompted
pub fn session_passphrase(prompt: &str) -> Result<String> {
    match std::env::var(PASSPHRASE_ENV) {
        Ok(passphrase) if !passphrase.is_empty() => Ok(passphrase),
        _ => prompt_password(prompt),
    }
}

/// Whether a command resumes the stored session before running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    /// Read-only commands run anonymously and never ask for the passphrase
    No,
    /// Unlock the stored session if there is one
    IfStored,
}

/// Everything a command needs
pub struct Context {
    pub config: ClientConfig,
    pub session: Session,
    pub client: DonationClient,
}

impl Context {
    pub fn new(config: ClientConfig, resume: Resume) -> Result<Self> {
        let store_path = config.session_path();
        let store = if resume == Resume::IfStored && store_path.exists() {
            let passphrase = session_passphrase("Enter session passphrase: ")?;
            Some(SessionStore::new(store_path, passphrase))
        } else {
            None
        };
        Self::with_store(config, store)
    }

    /// Build a context around an explicit (possibly new) session store
    pub fn with_store(config: ClientConfig, store: Option<SessionStore>) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(config.host(), config.request_timeout())?);
        let session = Session::new(provider_for(&config), store);
        session.restore()?;
        let client = DonationClient::new(&config, transport, session.handle());
        Ok(Self {
            config,
            session,
            client,
        })
    }

    /// Local replicas are often not running; say so up front
    pub async fn probe_local_replica(&self) {
        if self.config.network != Network::Local {
            return;
        }
        if let Err(e) = self.client.agent().status().await {
            tracing::warn!(
                "Local replica at {} is not answering ({}). Check that it is running.",
                self.config.host(),
                e
            );
        }
    }

    /// Format base units for display, falling back to the raw integer
    pub fn fmt(&self, amount: u64) -> String {
        self.client
            .format(amount)
            .unwrap_or_else(|_| amount.to_string())
    }
}

fn provider_for(config: &ClientConfig) -> Box<dyn IdentityProvider> {
    match config.network {
        Network::Local => Box::new(EphemeralProvider),
        Network::Ic => Box::new(DelegatedProvider::new(
            config.identity_provider_url.clone(),
            config.callback_port,
            config.login_timeout(),
            config.delegation_ttl(),
            Box::new(|url: &str| {
                println!();
                println!("Open this URL in your browser to log in:");
                println!("  {}", url);
                println!();
            }),
        )),
    }
}

/// One-line campaign summary
pub fn print_campaign_line(ctx: &Context, campaign: &Campaign) {
    let status = if campaign.is_active { "active" } else { "closed" };
    println!(
        "  {:<20} {:>10} of {:<14} {:>8}  [{}] {}",
        campaign.id,
        ctx.fmt(campaign.current_amount),
        ctx.fmt(campaign.target_amount),
        format_progress(campaign.current_amount, campaign.target_amount),
        status,
        campaign.title
    );
}

/// Nanosecond timestamp as a UTC date
pub fn format_timestamp(nanos: i64) -> String {
    chrono::DateTime::from_timestamp(
        nanos.div_euclid(1_000_000_000),
        nanos.rem_euclid(1_000_000_000) as u32,
    )
    .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
    .unwrap_or_else(|| nanos.to_string())
}
