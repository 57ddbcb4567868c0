//! In-memory donation ledger

use donation_client::principal::{Account, Principal};
use donation_client::types::{
    Campaign, CampaignStats, Donation, DonationError, TransferArgs, TransferFromArgs,
};

use crate::token::MockTokenLedger;

#[derive(Default)]
pub struct MockDonationLedger {
    pub campaigns: Vec<Campaign>,
    pub donations: Vec<Donation>,
    withdrawn: Vec<(String, u64)>,
}

impl MockDonationLedger {
    pub fn campaign(&self, id: &str) -> Option<&Campaign> {
        self.campaigns.iter().find(|c| c.id == id)
    }

    pub fn campaign_mut(&mut self, id: &str) -> Option<&mut Campaign> {
        self.campaigns.iter_mut().find(|c| c.id == id)
    }

    pub fn donation(&self, id: u64) -> Option<&Donation> {
        self.donations.iter().find(|d| d.id == id)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_campaign(
        &mut self,
        caller: Principal,
        id: String,
        title: String,
        description: String,
        target_amount: u64,
        end_date: Option<i64>,
        now: i64,
    ) -> Result<Campaign, String> {
        if caller.is_anonymous() {
            return Err("Anonymous callers cannot create campaigns".to_string());
        }
        if id.trim().is_empty() || title.trim().is_empty() {
            return Err("Campaign id and title are required".to_string());
        }
        if target_amount == 0 {
            return Err("Target amount must be greater than zero".to_string());
        }
        if self.campaign(&id).is_some() {
            return Err(format!("Campaign '{}' already exists", id));
        }

        let campaign = Campaign {
            id,
            title,
            description,
            recipient: caller,
            target_amount,
            current_amount: 0,
            is_active: true,
            created_at: now,
            end_date,
            withdrawable: false,
        };
        self.campaigns.push(campaign.clone());
        Ok(campaign)
    }

    /// Pull `amount` from the donor through their allowance to `canister`
    #[allow(clippy::too_many_arguments)]
    pub fn donate(
        &mut self,
        token: &mut MockTokenLedger,
        canister: Principal,
        caller: Principal,
        campaign_id: &str,
        amount: u64,
        reference: Option<String>,
        now: i64,
    ) -> Result<Donation, DonationError> {
        if caller.is_anonymous() {
            return Err(DonationError::Unauthorized);
        }
        let campaign = self
            .campaign(campaign_id)
            .ok_or(DonationError::CampaignNotFound)?;
        if !campaign.is_active || campaign.end_date.map_or(false, |end| now > end) {
            return Err(DonationError::CampaignInactive);
        }
        if amount == 0 {
            return Err(DonationError::InsufficientAmount);
        }

        token
            .transfer_from(
                canister,
                &TransferFromArgs {
                    spender_subaccount: None,
                    from: Account::from(caller),
                    to: Account::from(canister),
                    amount,
                    fee: None,
                    memo: None,
                    created_at_time: None,
                },
                now as u64,
            )
            .map_err(|_| DonationError::TransferFailed)?;

        let donation = Donation {
            id: self.donations.len() as u64 + 1,
            donor: caller,
            campaign_id: campaign_id.to_string(),
            amount,
            timestamp: now,
            tx_hash: reference,
        };
        if let Some(campaign) = self.campaign_mut(campaign_id) {
            campaign.current_amount += amount;
            campaign.withdrawable = campaign.current_amount >= campaign.target_amount;
        }
        self.donations.push(donation.clone());
        Ok(donation)
    }

    /// Pay out everything not yet withdrawn to the campaign recipient
    pub fn withdraw(
        &mut self,
        token: &mut MockTokenLedger,
        canister: Principal,
        caller: Principal,
        campaign_id: &str,
    ) -> Result<u64, DonationError> {
        let campaign = self
            .campaign(campaign_id)
            .ok_or(DonationError::CampaignNotFound)?;
        if campaign.recipient != caller {
            return Err(DonationError::Unauthorized);
        }
        let already: u64 = self
            .withdrawn
            .iter()
            .filter(|(id, _)| id == campaign_id)
            .map(|(_, amount)| amount)
            .sum();
        let amount = campaign.current_amount.saturating_sub(already);
        if amount == 0 {
            return Err(DonationError::InsufficientAmount);
        }

        let fee = token.fee;
        let payout = amount
            .checked_sub(fee)
            .ok_or(DonationError::InsufficientAmount)?;
        token
            .transfer(
                canister,
                &TransferArgs {
                    from_subaccount: None,
                    to: Account::from(caller),
                    amount: payout,
                    fee: None,
                    memo: None,
                    created_at_time: None,
                },
            )
            .map_err(|_| DonationError::TransferFailed)?;

        self.withdrawn.push((campaign_id.to_string(), amount));
        Ok(payout)
    }

    pub fn donations_for(&self, campaign_id: &str) -> Vec<Donation> {
        self.donations
            .iter()
            .filter(|d| d.campaign_id == campaign_id)
            .cloned()
            .collect()
    }

    pub fn donations_by(&self, donor: Principal) -> Vec<Donation> {
        self.donations
            .iter()
            .filter(|d| d.donor == donor)
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> CampaignStats {
        CampaignStats {
            total_donations: self.donations.len() as u64,
            total_amount: self.donations.iter().map(|d| d.amount).sum(),
            total_campaigns: self.campaigns.len() as u64,
        }
    }
}
