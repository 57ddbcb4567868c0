//! Request and response shapes of the remote services
//!
//! Field names follow the services' wire format (camelCase for the donation
//! ledger and NFT registry, snake_case for the token ledger).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::amount::format_progress;
use crate::principal::{Account, Principal};

/// Timestamps are nanoseconds since the Unix epoch
pub type Timestamp = i64;

/// Outcome of a mutating call: `{"ok": T}` or `{"err": E}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallResult<T, E> {
    #[serde(rename = "ok", alias = "Ok")]
    Ok(T),
    #[serde(rename = "err", alias = "Err")]
    Err(E),
}

impl<T, E> From<CallResult<T, E>> for Result<T, E> {
    fn from(src: CallResult<T, E>) -> Self {
        match src {
            CallResult::Ok(value) => Ok(value),
            CallResult::Err(err) => Err(err),
        }
    }
}

impl<T, E> From<Result<T, E>> for CallResult<T, E> {
    fn from(src: Result<T, E>) -> Self {
        match src {
            Ok(value) => CallResult::Ok(value),
            Err(err) => CallResult::Err(err),
        }
    }
}

// ============================================================================
// Donation ledger
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: String,
    pub title: String,
    pub description: String,
    pub recipient: Principal,
    pub target_amount: u64,
    pub current_amount: u64,
    pub is_active: bool,
    pub created_at: Timestamp,
    #[serde(default)]
    pub end_date: Option<Timestamp>,
    pub withdrawable: bool,
}

impl Campaign {
    /// Funding progress, e.g. `"50.00%"`
    pub fn progress(&self) -> String {
        format_progress(self.current_amount, self.target_amount)
    }

    /// Amount still needed to reach the target
    pub fn remaining(&self) -> u64 {
        self.target_amount.saturating_sub(self.current_amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    pub id: u64,
    pub donor: Principal,
    pub campaign_id: String,
    pub amount: u64,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub tx_hash: Option<String>,
}

/// Aggregates recomputed by the ledger on every query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignStats {
    pub total_donations: u64,
    pub total_amount: u64,
    pub total_campaigns: u64,
}

/// Fields needed to open a campaign; the caller becomes its recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaign {
    pub id: String,
    pub title: String,
    pub description: String,
    pub target_amount: u64,
    #[serde(default)]
    pub end_date: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum DonationError {
    #[error("campaign not found")]
    CampaignNotFound,
    #[error("donation amount is too small")]
    InsufficientAmount,
    #[error("campaign is no longer accepting donations")]
    CampaignInactive,
    #[error("not authorized to perform this action on the campaign")]
    Unauthorized,
    #[error("token transfer to the campaign failed")]
    TransferFailed,
}

// ============================================================================
// NFT registry
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftMetadata {
    pub token_id: u64,
    pub donation_id: u64,
    #[serde(rename = "donor")]
    pub owner: Principal,
    pub campaign_id: String,
    pub amount: u64,
    pub timestamp: Timestamp,
    pub image_url: String,
    pub attributes: Vec<(String, String)>,
}

impl NftMetadata {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum NftError {
    #[error("receipt token not found")]
    TokenNotFound,
    #[error("not authorized to mint this receipt")]
    Unauthorized,
    #[error("a receipt already exists for this donation")]
    AlreadyExists,
    #[error("receipt metadata is invalid")]
    InvalidMetadata,
}

// ============================================================================
// Token ledger
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub fee: u64,
    pub total_supply: u64,
}

/// Values in the token ledger's metadata map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetadataValue {
    Nat(u64),
    Int(i64),
    Text(String),
    #[serde(with = "hex")]
    Blob(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferArgs {
    #[serde(default, with = "crate::principal::subaccount_hex")]
    pub from_subaccount: Option<[u8; 32]>,
    pub to: Account,
    pub amount: u64,
    #[serde(default)]
    pub fee: Option<u64>,
    #[serde(default, with = "opt_memo")]
    pub memo: Option<Vec<u8>>,
    #[serde(default)]
    pub created_at_time: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveArgs {
    #[serde(default, with = "crate::principal::subaccount_hex")]
    pub from_subaccount: Option<[u8; 32]>,
    pub spender: Account,
    pub amount: u64,
    #[serde(default)]
    pub expected_allowance: Option<u64>,
    #[serde(default)]
    pub expires_at: Option<u64>,
    #[serde(default)]
    pub fee: Option<u64>,
    #[serde(default, with = "opt_memo")]
    pub memo: Option<Vec<u8>>,
    #[serde(default)]
    pub created_at_time: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferFromArgs {
    #[serde(default, with = "crate::principal::subaccount_hex")]
    pub spender_subaccount: Option<[u8; 32]>,
    pub from: Account,
    pub to: Account,
    pub amount: u64,
    #[serde(default)]
    pub fee: Option<u64>,
    #[serde(default, with = "opt_memo")]
    pub memo: Option<Vec<u8>>,
    #[serde(default)]
    pub created_at_time: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceArgs {
    pub account: Account,
    pub spender: Account,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allowance {
    pub allowance: u64,
    #[serde(default)]
    pub expires_at: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum TransferError {
    #[error("ledger error {error_code}: {message}")]
    GenericError { message: String, error_code: u64 },
    #[error("ledger is temporarily unavailable")]
    TemporarilyUnavailable,
    #[error("burn amount below the minimum of {min_burn_amount}")]
    BadBurn { min_burn_amount: u64 },
    #[error("duplicate of transaction {duplicate_of}")]
    Duplicate { duplicate_of: u64 },
    #[error("wrong fee, expected {expected_fee}")]
    BadFee { expected_fee: u64 },
    #[error("created in the future (ledger time {ledger_time})")]
    CreatedInFuture { ledger_time: u64 },
    #[error("transaction is too old")]
    TooOld,
    #[error("insufficient funds, balance is {balance}")]
    InsufficientFunds { balance: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum ApproveError {
    #[error("ledger error {error_code}: {message}")]
    GenericError { message: String, error_code: u64 },
    #[error("ledger is temporarily unavailable")]
    TemporarilyUnavailable,
    #[error("duplicate of transaction {duplicate_of}")]
    Duplicate { duplicate_of: u64 },
    #[error("wrong fee, expected {expected_fee}")]
    BadFee { expected_fee: u64 },
    #[error("allowance changed, current allowance is {current_allowance}")]
    AllowanceChanged { current_allowance: u64 },
    #[error("created in the future (ledger time {ledger_time})")]
    CreatedInFuture { ledger_time: u64 },
    #[error("approval is too old")]
    TooOld,
    #[error("approval expiry is in the past (ledger time {ledger_time})")]
    Expired { ledger_time: u64 },
    #[error("insufficient funds to pay the approval fee, balance is {balance}")]
    InsufficientFunds { balance: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum TransferFromError {
    #[error("ledger error {error_code}: {message}")]
    GenericError { message: String, error_code: u64 },
    #[error("ledger is temporarily unavailable")]
    TemporarilyUnavailable,
    #[error("burn amount below the minimum of {min_burn_amount}")]
    BadBurn { min_burn_amount: u64 },
    #[error("duplicate of transaction {duplicate_of}")]
    Duplicate { duplicate_of: u64 },
    #[error("wrong fee, expected {expected_fee}")]
    BadFee { expected_fee: u64 },
    #[error("created in the future (ledger time {ledger_time})")]
    CreatedInFuture { ledger_time: u64 },
    #[error("transaction is too old")]
    TooOld,
    #[error("insufficient funds, balance is {balance}")]
    InsufficientFunds { balance: u64 },
    #[error("insufficient allowance, approved amount is {allowance}")]
    InsufficientAllowance { allowance: u64 },
}

mod opt_memo {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => s.serialize_some(&hex::encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let text: Option<String> = Option::deserialize(d)?;
        text.map(|t| hex::decode(t).map_err(serde::de::Error::custom))
            .transpose()
    }
}
