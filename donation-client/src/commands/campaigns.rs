//! Campaign browsing and management commands

use anyhow::{anyhow, Result};
use chrono::NaiveDate;

use crate::amount::format_progress;
use crate::board::CampaignBoard;
use crate::config::ClientConfig;
use crate::principal::Principal;
use crate::types::CreateCampaign;

use super::{
    format_timestamp, print_campaign_line, print_error, print_success, prompt_confirm, Context,
    Resume,
};

/// Run the campaigns command
pub async fn list(config: ClientConfig, featured: Option<usize>) -> Result<()> {
    let ctx = Context::new(config, Resume::No)?;
    ctx.probe_local_replica().await;

    let mut board = CampaignBoard::new();
    board.refresh(ctx.client.donations()).await?;

    let campaigns = match featured {
        Some(n) => board.featured(n),
        None => board.campaigns().iter().collect(),
    };
    if campaigns.is_empty() {
        println!("No campaigns yet.");
        return Ok(());
    }

    let stats = board.stats();
    println!(
        "{} campaigns, {} donations, {} raised",
        stats.total_campaigns,
        stats.total_donations,
        ctx.fmt(stats.total_amount)
    );
    println!();
    for campaign in campaigns {
        print_campaign_line(&ctx, campaign);
    }
    Ok(())
}

/// Run the campaign command
pub async fn show(config: ClientConfig, id: &str) -> Result<()> {
    let ctx = Context::new(config, Resume::No)?;
    let Some(campaign) = ctx.client.donations().get_campaign(id).await? else {
        print_error(&format!("No campaign with id '{}'", id));
        return Ok(());
    };

    println!("{}", campaign.title);
    println!();
    println!("{}", campaign.description);
    println!();
    println!("Id:        {}", campaign.id);
    println!("Recipient: {}", campaign.recipient);
    println!(
        "Raised:    {} of {} ({})",
        ctx.fmt(campaign.current_amount),
        ctx.fmt(campaign.target_amount),
        format_progress(campaign.current_amount, campaign.target_amount)
    );
    println!("Created:   {}", format_timestamp(campaign.created_at));
    if let Some(end) = campaign.end_date {
        println!("Ends:      {}", format_timestamp(end));
    }
    println!(
        "Status:    {}{}",
        if campaign.is_active { "active" } else { "closed" },
        if campaign.withdrawable { ", withdrawable" } else { "" }
    );
    Ok(())
}

/// Run the create-campaign command
pub async fn create(
    config: ClientConfig,
    id: String,
    title: String,
    description: String,
    target: &str,
    end_date: Option<&str>,
    skip_confirm: bool,
) -> Result<()> {
    let ctx = Context::new(config, Resume::IfStored)?;
    let target_amount = ctx.client.parse(target)?;
    let end_date = end_date.map(parse_end_date).transpose()?;

    let Some(recipient) = ctx.client.caller() else {
        print_error("Connect a wallet first: the campaign's funds go to your principal.");
        return Ok(());
    };

    println!("Campaign:  {} ({})", title, id);
    println!("Target:    {}", ctx.fmt(target_amount));
    println!("Recipient: {}", recipient);
    if !skip_confirm && !prompt_confirm("Create this campaign?")? {
        println!("Cancelled.");
        return Ok(());
    }

    let campaign = ctx
        .client
        .donations()
        .create_campaign(&CreateCampaign {
            id,
            title,
            description,
            target_amount,
            end_date,
        })
        .await?;
    print_success(&format!("Campaign '{}' created", campaign.id));
    Ok(())
}

/// Run the withdraw command
pub async fn withdraw(config: ClientConfig, id: &str, skip_confirm: bool) -> Result<()> {
    let ctx = Context::new(config, Resume::IfStored)?;
    if !skip_confirm && !prompt_confirm(&format!("Withdraw the funds raised by '{}'?", id))? {
        println!("Cancelled.");
        return Ok(());
    }

    let amount = ctx.client.donations().withdraw(id).await?;
    print_success(&format!("Withdrew {}", ctx.fmt(amount)));
    Ok(())
}

/// Run the stats command
pub async fn stats(config: ClientConfig) -> Result<()> {
    let ctx = Context::new(config, Resume::No)?;
    let stats = ctx.client.donations().get_total_stats().await?;
    println!("Campaigns: {}", stats.total_campaigns);
    println!("Donations: {}", stats.total_donations);
    println!("Raised:    {}", ctx.fmt(stats.total_amount));
    Ok(())
}

/// Run the donations command
pub async fn donations(
    config: ClientConfig,
    campaign: Option<&str>,
    donor: Option<&str>,
) -> Result<()> {
    let resume = if campaign.is_none() && donor.is_none() {
        Resume::IfStored
    } else {
        Resume::No
    };
    let ctx = Context::new(config, resume)?;

    let donations = match (campaign, donor) {
        (Some(campaign), _) => ctx.client.donations().get_donations(campaign).await?,
        (None, Some(donor)) => {
            let donor: Principal = donor.parse()?;
            ctx.client.donations().get_donations_by_donor(donor).await?
        }
        (None, None) => {
            let me = ctx
                .client
                .caller()
                .ok_or_else(|| anyhow!("Not connected: pass --campaign or --donor"))?;
            ctx.client.donations().get_donations_by_donor(me).await?
        }
    };

    if donations.is_empty() {
        println!("No donations found.");
        return Ok(());
    }
    for donation in donations {
        println!(
            "  #{:<6} {:>14} to {:<20} by {}  {}",
            donation.id,
            ctx.fmt(donation.amount),
            donation.campaign_id,
            donation.donor,
            format_timestamp(donation.timestamp)
        );
    }
    Ok(())
}

/// `YYYY-MM-DD` as the end of that day, in nanoseconds
fn parse_end_date(text: &str) -> Result<i64> {
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|e| anyhow!("Invalid end date '{}': {}", text, e))?;
    date.and_hms_opt(23, 59, 59)
        .and_then(|t| t.and_utc().timestamp_nanos_opt())
        .ok_or_else(|| anyhow!("End date '{}' is out of range", text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_end_date() {
        assert_eq!(
            parse_end_date("1970-01-01").unwrap(),
            86_399 * 1_000_000_000
        );
        assert!(parse_end_date("next week").is_err());
    }
}
