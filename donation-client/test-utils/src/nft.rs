//! In-memory NFT receipt registry

use donation_client::principal::Principal;
use donation_client::types::{Donation, NftError, NftMetadata};

#[derive(Default)]
pub struct MockNftRegistry {
    pub tokens: Vec<NftMetadata>,
}

impl MockNftRegistry {
    /// Mint a receipt for `donation`, which the caller must have made
    pub fn mint(
        &mut self,
        caller: Principal,
        donation: Option<&Donation>,
        owner: Principal,
        campaign_id: &str,
        amount: u64,
        now: i64,
    ) -> Result<u64, NftError> {
        if caller.is_anonymous() || caller != owner {
            return Err(NftError::Unauthorized);
        }
        let donation = donation.ok_or(NftError::InvalidMetadata)?;
        if donation.donor != owner || donation.campaign_id != campaign_id || donation.amount != amount
        {
            return Err(NftError::InvalidMetadata);
        }
        if self.tokens.iter().any(|t| t.donation_id == donation.id) {
            return Err(NftError::AlreadyExists);
        }

        let token_id = self.tokens.len() as u64 + 1;
        self.tokens.push(NftMetadata {
            token_id,
            donation_id: donation.id,
            owner,
            campaign_id: campaign_id.to_string(),
            amount,
            timestamp: now,
            image_url: format!("https://receipts.example/{}.svg", token_id),
            attributes: vec![
                ("Campaign".to_string(), campaign_id.to_string()),
                ("Amount".to_string(), amount.to_string()),
                ("Donation".to_string(), donation.id.to_string()),
            ],
        });
        Ok(token_id)
    }

    pub fn token(&self, token_id: u64) -> Option<&NftMetadata> {
        self.tokens.iter().find(|t| t.token_id == token_id)
    }

    pub fn tokens_of(&self, owner: Principal) -> Vec<u64> {
        self.tokens
            .iter()
            .filter(|t| t.owner == owner)
            .map(|t| t.token_id)
            .collect()
    }

    pub fn by_campaign(&self, campaign_id: &str) -> Vec<NftMetadata> {
        self.tokens
            .iter()
            .filter(|t| t.campaign_id == campaign_id)
            .cloned()
            .collect()
    }
}
