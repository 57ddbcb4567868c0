//! ICRC-1/ICRC-2 token ledger client

use futures::try_join;
use serde_json::json;
use tracing::info;

use crate::agent::Agent;
use crate::error::ClientError;
use crate::principal::{Account, Principal};
use crate::types::{
    Allowance, AllowanceArgs, ApproveArgs, ApproveError, CallResult, MetadataValue, TokenInfo,
    TransferArgs, TransferError, TransferFromArgs, TransferFromError,
};

#[derive(Clone)]
pub struct TokenLedger {
    agent: Agent,
    canister: Principal,
}

impl TokenLedger {
    pub fn new(agent: Agent, canister: Principal) -> Self {
        Self { agent, canister }
    }

    pub fn canister(&self) -> Principal {
        self.canister
    }

    pub async fn name(&self) -> Result<String, ClientError> {
        self.agent
            .query(self.canister, "icrc1_name", json!([]))
            .await
    }

    pub async fn symbol(&self) -> Result<String, ClientError> {
        self.agent
            .query(self.canister, "icrc1_symbol", json!([]))
            .await
    }

    pub async fn decimals(&self) -> Result<u8, ClientError> {
        self.agent
            .query(self.canister, "icrc1_decimals", json!([]))
            .await
    }

    pub async fn fee(&self) -> Result<u64, ClientError> {
        self.agent
            .query(self.canister, "icrc1_fee", json!([]))
            .await
    }

    pub async fn total_supply(&self) -> Result<u64, ClientError> {
        self.agent
            .query(self.canister, "icrc1_total_supply", json!([]))
            .await
    }

    pub async fn minting_account(&self) -> Result<Option<Account>, ClientError> {
        self.agent
            .query(self.canister, "icrc1_minting_account", json!([]))
            .await
    }

    pub async fn metadata(&self) -> Result<Vec<(String, MetadataValue)>, ClientError> {
        self.agent
            .query(self.canister, "icrc1_metadata", json!([]))
            .await
    }

    /// Name, symbol, decimals, fee and supply, fetched concurrently
    pub async fn token_info(&self) -> Result<TokenInfo, ClientError> {
        let (name, symbol, decimals, fee, total_supply) = try_join!(
            self.name(),
            self.symbol(),
            self.decimals(),
            self.fee(),
            self.total_supply()
        )?;
        Ok(TokenInfo {
            name,
            symbol,
            decimals,
            fee,
            total_supply,
        })
    }

    pub async fn balance_of(&self, account: &Account) -> Result<u64, ClientError> {
        self.agent
            .query(self.canister, "icrc1_balance_of", json!([account]))
            .await
    }

    /// Transfer from the caller's default account, returning the block index
    pub async fn transfer(
        &self,
        to: Account,
        amount: u64,
        memo: Option<Vec<u8>>,
    ) -> Result<u64, ClientError> {
        let args = TransferArgs {
            from_subaccount: None,
            to,
            amount,
            fee: None,
            memo,
            created_at_time: None,
        };
        let result: CallResult<u64, TransferError> = self
            .agent
            .update(self.canister, "icrc1_transfer", json!([args]))
            .await?;
        let block = Result::from(result)?;
        info!("Transferred {} to {} in block {}", amount, to, block);
        Ok(block)
    }

    /// Allow `spender` to pull up to `amount` from the caller's account
    pub async fn approve(
        &self,
        spender: Account,
        amount: u64,
        expires_at: Option<u64>,
    ) -> Result<u64, ClientError> {
        let args = ApproveArgs {
            from_subaccount: None,
            spender,
            amount,
            expected_allowance: None,
            expires_at,
            fee: None,
            memo: None,
            created_at_time: None,
        };
        let result: CallResult<u64, ApproveError> = self
            .agent
            .update(self.canister, "icrc2_approve", json!([args]))
            .await?;
        let block = Result::from(result)?;
        info!("Approved {} for {} in block {}", amount, spender, block);
        Ok(block)
    }

    pub async fn allowance(&self, owner: Account, spender: Account) -> Result<Allowance, ClientError> {
        let args = AllowanceArgs {
            account: owner,
            spender,
        };
        self.agent
            .query(self.canister, "icrc2_allowance", json!([args]))
            .await
    }

    /// Move `amount` out of `from` using an allowance granted to the caller.
    /// The allowance must cover `amount` plus the ledger fee.
    pub async fn transfer_from(
        &self,
        from: Account,
        to: Account,
        amount: u64,
    ) -> Result<u64, ClientError> {
        let args = TransferFromArgs {
            spender_subaccount: None,
            from,
            to,
            amount,
            fee: None,
            memo: None,
            created_at_time: None,
        };
        let result: CallResult<u64, TransferFromError> = self
            .agent
            .update(self.canister, "icrc2_transfer_from", json!([args]))
            .await?;
        Ok(Result::from(result)?)
    }
}
