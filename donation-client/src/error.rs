//! Errors surfaced by the service clients

use thiserror::Error;

use crate::amount::AmountError;
use crate::rpc::TransportError;
use crate::types::{ApproveError, DonationError, NftError, TransferError, TransferFromError};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("donation rejected: {0}")]
    Donation(#[from] DonationError),

    #[error("receipt rejected: {0}")]
    Nft(#[from] NftError),

    #[error("transfer rejected: {0}")]
    Transfer(#[from] TransferError),

    #[error("approval rejected: {0}")]
    Approve(#[from] ApproveError),

    #[error("delegated transfer rejected: {0}")]
    TransferFrom(#[from] TransferFromError),

    #[error("campaign could not be created: {0}")]
    CreateCampaign(String),

    #[error("connect a wallet first: {0} requires a signed-in identity")]
    NotConnected(&'static str),

    #[error("a donation to campaign {0} is already in flight")]
    DuplicateSubmission(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("could not decode the reply to {method}: {source}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Amount(#[from] AmountError),
}

impl ClientError {
    /// True for network-level failures that should be shown as a transient
    /// "try again" notification.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Transport(err) => err.is_transient(),
            ClientError::Transfer(TransferError::TemporarilyUnavailable)
            | ClientError::Approve(ApproveError::TemporarilyUnavailable)
            | ClientError::TransferFrom(TransferFromError::TemporarilyUnavailable) => true,
            _ => false,
        }
    }
}
