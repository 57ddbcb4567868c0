//! Test doubles for the donation client: an in-memory replica hosting the
//! donation ledger, NFT registry and token ledger, and a scripted identity
//! provider for the delegated login flow.

mod donation;
mod identity_provider;
mod nft;
mod replica;
mod token;

pub use donation::MockDonationLedger;
pub use identity_provider::{LoginBehaviour, MockIdentityProvider};
pub use nft::MockNftRegistry;
pub use replica::{Canisters, GatedTransport, MockReplica, RecordedCall};
pub use token::MockTokenLedger;

use donation_client::principal::Principal;
use donation_client::types::Campaign;

/// An active campaign with no end date
pub fn campaign(id: &str, recipient: Principal, target_amount: u64) -> Campaign {
    Campaign {
        id: id.to_string(),
        title: format!("Campaign {}", id),
        description: format!("Fundraiser {}", id),
        recipient,
        target_amount,
        current_amount: 0,
        is_active: true,
        created_at: 0,
        end_date: None,
        withdrawable: false,
    }
}
