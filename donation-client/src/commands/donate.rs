//! Donate command

use anyhow::Result;

use crate::board::CampaignBoard;
use crate::config::ClientConfig;

use super::{print_error, print_success, print_warning, prompt_confirm, Context, Resume};

/// Run the donate command
pub async fn run(
    config: ClientConfig,
    campaign_id: &str,
    amount: &str,
    reference: Option<&str>,
    skip_confirm: bool,
) -> Result<()> {
    let ctx = Context::new(config, Resume::IfStored)?;
    let amount = ctx.client.parse(amount)?;
    if amount == 0 {
        print_error("Amount must be greater than 0");
        return Ok(());
    }
    if ctx.client.caller().is_none() {
        print_error("Not connected. Run 'donation-client connect' first.");
        return Ok(());
    }

    let mut board = CampaignBoard::new();
    board.refresh(ctx.client.donations()).await?;
    let Some(campaign) = board.campaign(campaign_id) else {
        print_error(&format!("No campaign with id '{}'", campaign_id));
        return Ok(());
    };
    let title = campaign.title.clone();

    let fee = ctx.client.token().fee().await?;
    println!("Campaign: {}", title);
    println!("Amount:   {}", ctx.fmt(amount));
    println!("Fee:      {}", ctx.fmt(fee));
    if !skip_confirm && !prompt_confirm("Send this donation?")? {
        println!("Cancelled.");
        return Ok(());
    }

    let outcome = ctx
        .client
        .donate_and_refresh(&mut board, campaign_id, amount, reference)
        .await?;

    println!();
    print_success(&format!(
        "Donation #{} of {} recorded",
        outcome.donation.id,
        ctx.fmt(outcome.donation.amount)
    ));
    match outcome.receipt {
        Ok(token_id) => println!("Receipt NFT #{} minted to your principal", token_id),
        Err(e) => print_warning(&format!("Receipt could not be minted: {}", e)),
    }
    if let Some(campaign) = board.campaign(campaign_id) {
        println!(
            "Campaign now at {} of {}",
            ctx.fmt(campaign.current_amount),
            ctx.fmt(campaign.target_amount)
        );
    }
    Ok(())
}
