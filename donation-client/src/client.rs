//! High-level donation flows over the three service clients

use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::agent::Agent;
use crate::amount::{format_tokens, parse_amount, AmountError};
use crate::board::CampaignBoard;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::principal::{Account, Principal};
use crate::rpc::Transport;
use crate::services::{DonationLedger, NftRegistry, TokenLedger};
use crate::session::SessionHandle;
use crate::types::Donation;

/// Outcome of a donation together with its receipt.
///
/// The donation has been recorded whatever `receipt` holds; a minting failure
/// never hides it.
#[derive(Debug)]
pub struct DonationReceipt {
    pub donation: Donation,
    pub receipt: Result<u64, ClientError>,
}

pub struct DonationClient {
    agent: Agent,
    donations: DonationLedger,
    nfts: NftRegistry,
    token: TokenLedger,
    decimals: u8,
    symbol: String,
    /// Campaign of the donation currently between approve and donate
    in_flight: Arc<Mutex<Option<String>>>,
}

impl DonationClient {
    pub fn new(config: &ClientConfig, transport: Arc<dyn Transport>, session: SessionHandle) -> Self {
        let agent = Agent::new(transport, session);
        Self {
            donations: DonationLedger::new(agent.clone(), config.donation_canister()),
            nfts: NftRegistry::new(agent.clone(), config.nft_canister()),
            token: TokenLedger::new(agent.clone(), config.token_canister()),
            agent,
            decimals: config.token_decimals,
            symbol: config.token_symbol.clone(),
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn donations(&self) -> &DonationLedger {
        &self.donations
    }

    pub fn nfts(&self) -> &NftRegistry {
        &self.nfts
    }

    pub fn token(&self) -> &TokenLedger {
        &self.token
    }

    pub fn caller(&self) -> Option<Principal> {
        self.agent.caller()
    }

    /// Render base units with the configured decimals and symbol
    pub fn format(&self, amount: u64) -> Result<String, AmountError> {
        format_tokens(amount, self.decimals, &self.symbol)
    }

    /// Parse user input into base units
    pub fn parse(&self, text: &str) -> Result<u64, AmountError> {
        parse_amount(text, self.decimals)
    }

    /// Approve, donate, then mint the receipt NFT.
    ///
    /// The donation ledger is approved for `amount` plus the transfer fee so
    /// it can pull the tokens itself. An approval replaces the caller's
    /// previous allowance whatever the campaign, so only one donation may be
    /// in flight per client; a concurrent attempt fails with
    /// `DuplicateSubmission` naming the campaign already in progress.
    pub async fn donate_with_receipt(
        &self,
        campaign_id: &str,
        amount: u64,
        reference: Option<&str>,
    ) -> Result<DonationReceipt, ClientError> {
        let _guard = self.begin_submission(campaign_id)?;
        let caller = self.agent.require_caller("donating")?;

        let fee = self.token.fee().await?;
        let allowance = amount
            .checked_add(fee)
            .ok_or_else(|| AmountError::Overflow(format!("{} + fee {}", amount, fee)))?;
        self.token
            .approve(Account::from(self.donations.canister()), allowance, None)
            .await?;

        let donation = self.donations.donate(campaign_id, amount, reference).await?;

        let receipt = self
            .nfts
            .mint_donation_nft(donation.id, caller, &donation.campaign_id, donation.amount)
            .await;
        if let Err(e) = &receipt {
            warn!("Donation {} recorded but receipt failed: {}", donation.id, e);
        }
        Ok(DonationReceipt { donation, receipt })
    }

    /// Donate and, on success, re-fetch the campaign into `board`.
    ///
    /// A failed donation leaves the board untouched.
    pub async fn donate_and_refresh(
        &self,
        board: &mut CampaignBoard,
        campaign_id: &str,
        amount: u64,
        reference: Option<&str>,
    ) -> Result<DonationReceipt, ClientError> {
        let receipt = self
            .donate_with_receipt(campaign_id, amount, reference)
            .await?;

        match self.donations.get_campaign(campaign_id).await {
            Ok(Some(campaign)) => board.upsert(campaign),
            Ok(None) => warn!("Campaign {} vanished after donation", campaign_id),
            Err(e) => warn!("Failed to refresh campaign {}: {}", campaign_id, e),
        }
        Ok(receipt)
    }

    fn begin_submission(&self, campaign_id: &str) -> Result<SubmissionGuard, ClientError> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pending) = in_flight.as_ref() {
            info!(
                "Rejecting donation to {} while one to {} is pending",
                campaign_id, pending
            );
            return Err(ClientError::DuplicateSubmission(pending.clone()));
        }
        *in_flight = Some(campaign_id.to_string());
        Ok(SubmissionGuard {
            in_flight: Arc::clone(&self.in_flight),
        })
    }
}

/// Releases the donation slot when dropped
struct SubmissionGuard {
    in_flight: Arc<Mutex<Option<String>>>,
}

impl Drop for SubmissionGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }
}
