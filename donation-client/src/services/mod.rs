//! Typed clients for the remote services

mod donation;
mod nft;
mod token;

pub use donation::DonationLedger;
pub use nft::NftRegistry;
pub use token::TokenLedger;
