//! Last-fetched snapshot of the campaign list

use chrono::{DateTime, Utc};
use futures::try_join;

use crate::amount::compare_progress;
use crate::error::ClientError;
use crate::services::DonationLedger;
use crate::types::{Campaign, CampaignStats};

/// Campaigns and stats as of the last successful refresh.
///
/// The board is only replaced wholesale; a failed refresh leaves it as it
/// was.
#[derive(Debug, Clone, Default)]
pub struct CampaignBoard {
    campaigns: Vec<Campaign>,
    stats: CampaignStats,
    refreshed_at: Option<DateTime<Utc>>,
}

impl CampaignBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch campaigns and stats together; both must succeed
    pub async fn refresh(&mut self, ledger: &DonationLedger) -> Result<(), ClientError> {
        let (campaigns, stats) = try_join!(ledger.get_campaigns(), ledger.get_total_stats())?;
        self.replace(campaigns, stats);
        Ok(())
    }

    pub fn replace(&mut self, campaigns: Vec<Campaign>, stats: CampaignStats) {
        self.campaigns = campaigns;
        self.stats = stats;
        self.refreshed_at = Some(Utc::now());
    }

    /// Replace one campaign in place, appending it if unknown
    pub fn upsert(&mut self, campaign: Campaign) {
        match self.campaigns.iter_mut().find(|c| c.id == campaign.id) {
            Some(existing) => *existing = campaign,
            None => self.campaigns.push(campaign),
        }
    }

    pub fn campaigns(&self) -> &[Campaign] {
        &self.campaigns
    }

    pub fn stats(&self) -> &CampaignStats {
        &self.stats
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    pub fn campaign(&self, id: &str) -> Option<&Campaign> {
        self.campaigns.iter().find(|c| c.id == id)
    }

    /// Top `n` active campaigns, furthest along first
    pub fn featured(&self, n: usize) -> Vec<&Campaign> {
        let mut active: Vec<&Campaign> = self.campaigns.iter().filter(|c| c.is_active).collect();
        active.sort_by(|a, b| {
            compare_progress(
                (b.current_amount, b.target_amount),
                (a.current_amount, a.target_amount),
            )
        });
        active.truncate(n);
        active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::Principal;

    fn campaign(id: &str, current: u64, target: u64, active: bool) -> Campaign {
        Campaign {
            id: id.to_string(),
            title: id.to_string(),
            description: String::new(),
            recipient: Principal::anonymous(),
            target_amount: target,
            current_amount: current,
            is_active: active,
            created_at: 0,
            end_date: None,
            withdrawable: false,
        }
    }

    #[test]
    fn test_featured_orders_by_progress() {
        let mut board = CampaignBoard::new();
        board.replace(
            vec![
                campaign("quarter", 25, 100, true),
                campaign("closed", 99, 100, false),
                campaign("half", 500, 1_000, true),
                campaign("tenth", 1, 10, true),
                campaign("most", 9, 10, true),
            ],
            CampaignStats::default(),
        );

        let ids: Vec<&str> = board.featured(3).iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["most", "half", "quarter"]);
        assert!(board.refreshed_at().is_some());
    }

    #[test]
    fn test_upsert() {
        let mut board = CampaignBoard::new();
        board.replace(vec![campaign("water", 0, 100, true)], CampaignStats::default());
        board.upsert(campaign("water", 50, 100, true));
        board.upsert(campaign("school", 0, 10, true));

        assert_eq!(board.campaigns().len(), 2);
        assert_eq!(board.campaign("water").unwrap().current_amount, 50);
        assert!(board.campaign("missing").is_none());
    }
}
