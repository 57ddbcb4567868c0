use serde_json::json;
use tracing::info;

use crate::agent::Agent;
use crate::error::ClientError;
use crate::principal::Principal;
use crate::types::{
    CallResult, Campaign, CampaignStats, CreateCampaign, Donation, DonationError,
};

/// Client for the donation ledger
#[derive(Clone)]
pub struct DonationLedger {
    agent: Agent,
    canister: Principal,
}

impl DonationLedger {
    pub fn new(agent: Agent, canister: Principal) -> Self {
        Self { agent, canister }
    }

    pub fn canister(&self) -> Principal {
        self.canister
    }

    /// Open a campaign with the caller as recipient
    pub async fn create_campaign(&self, data: &CreateCampaign) -> Result<Campaign, ClientError> {
        let result: CallResult<Campaign, String> = self
            .agent
            .update(
                self.canister,
                "createCampaign",
                json!([
                    data.id,
                    data.title,
                    data.description,
                    data.target_amount,
                    data.end_date
                ]),
            )
            .await?;
        let campaign = Result::from(result).map_err(ClientError::CreateCampaign)?;
        info!("Created campaign {}", campaign.id);
        Ok(campaign)
    }

    pub async fn get_campaigns(&self) -> Result<Vec<Campaign>, ClientError> {
        self.agent
            .query(self.canister, "getCampaigns", json!([]))
            .await
    }

    /// `None` when no campaign has this id
    pub async fn get_campaign(&self, id: &str) -> Result<Option<Campaign>, ClientError> {
        self.agent
            .query(self.canister, "getCampaign", json!([id]))
            .await
    }

    /// Donate `amount` base units. The ledger pulls the tokens through an
    /// allowance the caller must have approved beforehand.
    pub async fn donate(
        &self,
        campaign_id: &str,
        amount: u64,
        reference: Option<&str>,
    ) -> Result<Donation, ClientError> {
        let result: CallResult<Donation, DonationError> = self
            .agent
            .update(
                self.canister,
                "donate",
                json!([campaign_id, amount, reference]),
            )
            .await?;
        let donation = Result::from(result)?;
        info!(
            "Donation {} of {} to {}",
            donation.id, donation.amount, donation.campaign_id
        );
        Ok(donation)
    }

    /// Withdraw the raised funds; only the campaign recipient may do this
    pub async fn withdraw(&self, campaign_id: &str) -> Result<u64, ClientError> {
        let result: CallResult<u64, DonationError> = self
            .agent
            .update(self.canister, "withdraw", json!([campaign_id]))
            .await?;
        Ok(Result::from(result)?)
    }

    pub async fn get_total_stats(&self) -> Result<CampaignStats, ClientError> {
        self.agent
            .query(self.canister, "getTotalStats", json!([]))
            .await
    }

    pub async fn get_donations(&self, campaign_id: &str) -> Result<Vec<Donation>, ClientError> {
        self.agent
            .query(self.canister, "getDonations", json!([campaign_id]))
            .await
    }

    pub async fn get_donations_by_donor(
        &self,
        donor: Principal,
    ) -> Result<Vec<Donation>, ClientError> {
        self.agent
            .query(self.canister, "getDonationsByDonor", json!([donor]))
            .await
    }
}
