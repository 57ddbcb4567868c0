use serde_json::json;
use tracing::info;

use crate::agent::Agent;
use crate::error::ClientError;
use crate::principal::Principal;
use crate::types::{CallResult, NftError, NftMetadata};

/// Client for the NFT receipt registry
#[derive(Clone)]
pub struct NftRegistry {
    agent: Agent,
    canister: Principal,
}

impl NftRegistry {
    pub fn new(agent: Agent, canister: Principal) -> Self {
        Self { agent, canister }
    }

    pub fn canister(&self) -> Principal {
        self.canister
    }

    /// Mint a receipt for a recorded donation, returning the token id
    pub async fn mint_donation_nft(
        &self,
        donation_id: u64,
        owner: Principal,
        campaign_id: &str,
        amount: u64,
    ) -> Result<u64, ClientError> {
        let result: CallResult<u64, NftError> = self
            .agent
            .update(
                self.canister,
                "mintDonationNFT",
                json!([donation_id, owner, campaign_id, amount]),
            )
            .await?;
        let token_id = Result::from(result)?;
        info!("Minted receipt #{} for donation {}", token_id, donation_id);
        Ok(token_id)
    }

    pub async fn tokens_of(&self, owner: Principal) -> Result<Vec<u64>, ClientError> {
        self.agent
            .query(self.canister, "tokensOf", json!([owner]))
            .await
    }

    /// `None` when the token does not exist
    pub async fn token_metadata(&self, token_id: u64) -> Result<Option<NftMetadata>, ClientError> {
        self.agent
            .query(self.canister, "tokenMetadata", json!([token_id]))
            .await
    }

    pub async fn get_all_nfts(&self) -> Result<Vec<NftMetadata>, ClientError> {
        self.agent
            .query(self.canister, "getAllNFTs", json!([]))
            .await
    }

    pub async fn get_nfts_by_campaign(
        &self,
        campaign_id: &str,
    ) -> Result<Vec<NftMetadata>, ClientError> {
        self.agent
            .query(self.canister, "getNFTsByCampaign", json!([campaign_id]))
            .await
    }
}
