//! Replica and configuration status

use anyhow::Result;

use crate::config::ClientConfig;
use crate::session::SessionStore;

use super::session::describe_mode;
use super::{print_error, print_success, Context, Resume};

/// Run the status command
pub async fn run(config: ClientConfig) -> Result<()> {
    let summary = SessionStore::new(config.session_path(), String::new()).summary()?;
    let ctx = Context::new(config, Resume::No)?;

    println!("Network:         {:?}", ctx.config.network);
    println!("Host:            {}", ctx.config.host());
    println!("Donation ledger: {}", ctx.client.donations().canister());
    println!("NFT registry:    {}", ctx.client.nfts().canister());
    println!("Token ledger:    {}", ctx.client.token().canister());
    match summary {
        Some(summary) => println!(
            "Session:         {} ({})",
            summary.principal,
            describe_mode(summary.mode)
        ),
        None => println!("Session:         not connected"),
    }
    println!();

    match ctx.client.agent().status().await {
        Ok(status) if status.healthy => {
            print_success(&format!("Replica is healthy (version {})", status.impl_version))
        }
        Ok(status) => print_error(&format!(
            "Replica reports unhealthy (version {})",
            status.impl_version
        )),
        Err(e) => print_error(&format!("Replica unreachable: {}", e)),
    }
    Ok(())
}
