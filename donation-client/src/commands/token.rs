//! Token ledger commands

use anyhow::{anyhow, Result};

use crate::config::ClientConfig;
use crate::principal::{Account, Principal};

use super::{print_success, prompt_confirm, Context, Resume};

/// Run the balance command
pub async fn balance(config: ClientConfig, owner: Option<&str>) -> Result<()> {
    let ctx = Context::new(
        config,
        if owner.is_some() {
            Resume::No
        } else {
            Resume::IfStored
        },
    )?;
    let owner = resolve_owner(&ctx, owner)?;
    let balance = ctx.client.token().balance_of(&Account::from(owner)).await?;
    print_success(&format!("Balance: {}", ctx.fmt(balance)));
    Ok(())
}

/// Run the token-info command
pub async fn info(config: ClientConfig) -> Result<()> {
    let ctx = Context::new(config, Resume::No)?;
    let token = ctx.client.token();
    let info = token.token_info().await?;

    println!("Name:         {}", info.name);
    println!("Symbol:       {}", info.symbol);
    println!("Decimals:     {}", info.decimals);
    println!("Fee:          {}", ctx.fmt(info.fee));
    println!("Total supply: {}", ctx.fmt(info.total_supply));
    match token.minting_account().await? {
        Some(account) => println!("Minter:       {}", account),
        None => println!("Minter:       none"),
    }
    if info.decimals != ctx.config.token_decimals {
        tracing::warn!(
            "Ledger reports {} decimals but the client is configured for {}",
            info.decimals,
            ctx.config.token_decimals
        );
    }
    Ok(())
}

/// Run the transfer command
pub async fn transfer(
    config: ClientConfig,
    to: &str,
    amount: &str,
    memo: Option<&str>,
    skip_confirm: bool,
) -> Result<()> {
    let ctx = Context::new(config, Resume::IfStored)?;
    let to: Principal = to.parse()?;
    let amount = ctx.client.parse(amount)?;
    ctx.client.agent().require_caller("transfer")?;

    if !skip_confirm
        && !prompt_confirm(&format!("Transfer {} to {}?", ctx.fmt(amount), to))?
    {
        println!("Cancelled.");
        return Ok(());
    }

    let block = ctx
        .client
        .token()
        .transfer(
            Account::from(to),
            amount,
            memo.map(|m| m.as_bytes().to_vec()),
        )
        .await?;
    print_success(&format!("Transferred in block {}", block));
    Ok(())
}

/// Run the approve command
pub async fn approve(
    config: ClientConfig,
    spender: &str,
    amount: &str,
    expires_in_secs: Option<u64>,
    skip_confirm: bool,
) -> Result<()> {
    let ctx = Context::new(config, Resume::IfStored)?;
    let spender: Principal = spender.parse()?;
    let amount = ctx.client.parse(amount)?;
    ctx.client.agent().require_caller("approve")?;
    let expires_at = expires_in_secs.map(|secs| {
        crate::rpc::envelope::now_nanos().saturating_add(secs.saturating_mul(1_000_000_000))
    });

    if !skip_confirm
        && !prompt_confirm(&format!(
            "Allow {} to spend up to {}?",
            spender,
            ctx.fmt(amount)
        ))?
    {
        println!("Cancelled.");
        return Ok(());
    }

    let block = ctx
        .client
        .token()
        .approve(Account::from(spender), amount, expires_at)
        .await?;
    print_success(&format!("Approved in block {}", block));
    Ok(())
}

/// Run the allowance command
pub async fn allowance(config: ClientConfig, owner: Option<&str>, spender: &str) -> Result<()> {
    let ctx = Context::new(
        config,
        if owner.is_some() {
            Resume::No
        } else {
            Resume::IfStored
        },
    )?;
    let owner = resolve_owner(&ctx, owner)?;
    let spender: Principal = spender.parse()?;

    let allowance = ctx
        .client
        .token()
        .allowance(Account::from(owner), Account::from(spender))
        .await?;
    println!("Allowance: {}", ctx.fmt(allowance.allowance));
    if let Some(expires_at) = allowance.expires_at {
        println!(
            "Expires:   {}",
            super::format_timestamp(i64::try_from(expires_at).unwrap_or(i64::MAX))
        );
    }
    Ok(())
}

fn resolve_owner(ctx: &Context, owner: Option<&str>) -> Result<Principal> {
    match owner {
        Some(owner) => Ok(owner.parse()?),
        None => ctx
            .client
            .caller()
            .ok_or_else(|| anyhow!("Not connected: pass an owner principal")),
    }
}
