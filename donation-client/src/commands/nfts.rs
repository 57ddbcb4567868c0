//! Receipt NFT commands

use anyhow::Result;

use crate::config::ClientConfig;
use crate::principal::Principal;
use crate::types::NftMetadata;

use super::{format_timestamp, print_error, Context, Resume};

/// Run the nfts command
pub async fn list(config: ClientConfig, campaign: Option<&str>, all: bool) -> Result<()> {
    let resume = if campaign.is_some() || all {
        Resume::No
    } else {
        Resume::IfStored
    };
    let ctx = Context::new(config, resume)?;
    let nfts = ctx.client.nfts();

    let receipts = match (campaign, all) {
        (Some(campaign), _) => nfts.get_nfts_by_campaign(campaign).await?,
        (None, true) => nfts.get_all_nfts().await?,
        (None, false) => {
            let Some(owner) = ctx.client.caller() else {
                print_error("Not connected. Pass --all or --campaign to browse receipts.");
                return Ok(());
            };
            owned_receipts(&ctx, owner).await?
        }
    };

    if receipts.is_empty() {
        println!("No receipts found.");
        return Ok(());
    }
    for nft in &receipts {
        println!(
            "  #{:<6} {:>14} to {:<20} donation #{}",
            nft.token_id,
            ctx.fmt(nft.amount),
            nft.campaign_id,
            nft.donation_id
        );
    }
    Ok(())
}

/// Run the nft command
pub async fn show(config: ClientConfig, token_id: u64) -> Result<()> {
    let ctx = Context::new(config, Resume::No)?;
    let Some(nft) = ctx.client.nfts().token_metadata(token_id).await? else {
        print_error(&format!("Receipt #{} does not exist", token_id));
        return Ok(());
    };

    println!("Receipt #{}", nft.token_id);
    println!("Owner:    {}", nft.owner);
    println!("Campaign: {}", nft.campaign_id);
    println!("Donation: #{}", nft.donation_id);
    println!("Amount:   {}", ctx.fmt(nft.amount));
    println!("Minted:   {}", format_timestamp(nft.timestamp));
    println!("Image:    {}", nft.image_url);
    if !nft.attributes.is_empty() {
        println!();
        for (key, value) in &nft.attributes {
            println!("  {}: {}", key, value);
        }
    }
    Ok(())
}

async fn owned_receipts(ctx: &Context, owner: Principal) -> Result<Vec<NftMetadata>> {
    let nfts = ctx.client.nfts();
    let mut receipts = Vec::new();
    for token_id in nfts.tokens_of(owner).await? {
        if let Some(nft) = nfts.token_metadata(token_id).await? {
            receipts.push(nft);
        }
    }
    Ok(receipts)
}
