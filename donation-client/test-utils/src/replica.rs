//! Mock replica hosting the three services behind the [`Transport`] seam

use async_trait::async_trait;
use donation_client::config::ClientConfig;
use donation_client::principal::{Account, Principal};
use donation_client::rpc::envelope::now_nanos;
use donation_client::rpc::{
    CallContent, CallKind, Envelope, ReplicaStatus, Transport, TransportError,
};
use donation_client::types::{
    AllowanceArgs, ApproveArgs, Campaign, Donation, NftMetadata, TransferArgs, TransferFromArgs,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::{Notify, Semaphore};

use crate::donation::MockDonationLedger;
use crate::nft::MockNftRegistry;
use crate::token::MockTokenLedger;

/// Canister ids the mock answers for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canisters {
    pub donation: Principal,
    pub nft: Principal,
    pub token: Principal,
}

impl Canisters {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            donation: config.donation_canister(),
            nft: config.nft_canister(),
            token: config.token_canister(),
        }
    }
}

/// One submitted call, as seen by the replica
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub kind: CallKind,
    pub canister: Principal,
    pub method: String,
    pub sender: Principal,
}

struct ReplicaState {
    clock: Option<i64>,
    unreachable: bool,
    calls: Vec<RecordedCall>,
    donations: MockDonationLedger,
    nfts: MockNftRegistry,
    token: MockTokenLedger,
}

impl ReplicaState {
    fn now(&self) -> i64 {
        self.clock.unwrap_or_else(|| now_nanos() as i64)
    }
}

/// An in-memory replica. Envelopes are verified like a real replica would,
/// then dispatched to the donation ledger, NFT registry or token ledger.
pub struct MockReplica {
    canisters: Canisters,
    state: Mutex<ReplicaState>,
}

impl Default for MockReplica {
    fn default() -> Self {
        Self::new(Canisters::from_config(&ClientConfig::default()))
    }
}

impl MockReplica {
    pub fn new(canisters: Canisters) -> Self {
        Self {
            canisters,
            state: Mutex::new(ReplicaState {
                clock: None,
                unreachable: false,
                calls: Vec::new(),
                donations: MockDonationLedger::default(),
                nfts: MockNftRegistry::default(),
                token: MockTokenLedger::default(),
            }),
        }
    }

    pub fn canisters(&self) -> Canisters {
        self.canisters
    }

    /// Make every call fail as if the replica were down
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    /// Pin the services' clock (nanoseconds); envelopes still expire in real time
    pub fn set_time(&self, nanos: i64) {
        self.state().clock = Some(nanos);
    }

    pub fn set_fee(&self, fee: u64) {
        self.state().token.fee = fee;
    }

    pub fn mint_tokens(&self, owner: Principal, amount: u64) {
        self.state().token.mint(&Account::from(owner), amount);
    }

    pub fn balance(&self, owner: Principal) -> u64 {
        self.state().token.balance_of(&Account::from(owner))
    }

    pub fn add_campaign(&self, campaign: Campaign) {
        self.state().donations.campaigns.push(campaign);
    }

    pub fn set_campaign_active(&self, id: &str, active: bool) {
        if let Some(campaign) = self.state().donations.campaign_mut(id) {
            campaign.is_active = active;
        }
    }

    pub fn campaign(&self, id: &str) -> Option<Campaign> {
        self.state().donations.campaign(id).cloned()
    }

    pub fn donations(&self) -> Vec<Donation> {
        self.state().donations.donations.clone()
    }

    pub fn nfts(&self) -> Vec<NftMetadata> {
        self.state().nfts.tokens.clone()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    /// Number of calls made to `method`
    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    fn state(&self) -> MutexGuard<'_, ReplicaState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn dispatch(&self, state: &mut ReplicaState, content: &CallContent) -> Result<Value, TransportError> {
        let args: Vec<Value> = serde_json::from_value(content.arg.clone())
            .map_err(|e| rejected(400, format!("arguments must be an array: {}", e)))?;
        let caller = content.sender;
        let now = state.now();
        let method = content.method.as_str();

        if content.canister_id == self.canisters.donation {
            let ledger = &mut state.donations;
            return Ok(match method {
                "createCampaign" => lower_result(ledger.create_campaign(
                    caller,
                    arg(&args, 0)?,
                    arg(&args, 1)?,
                    arg(&args, 2)?,
                    arg(&args, 3)?,
                    arg(&args, 4)?,
                    now,
                )),
                "getCampaigns" => json!(ledger.campaigns),
                "getCampaign" => json!(ledger.campaign(&arg::<String>(&args, 0)?)),
                "donate" => lower_result(ledger.donate(
                    &mut state.token,
                    self.canisters.donation,
                    caller,
                    &arg::<String>(&args, 0)?,
                    arg(&args, 1)?,
                    arg(&args, 2)?,
                    now,
                )),
                "withdraw" => lower_result(ledger.withdraw(
                    &mut state.token,
                    self.canisters.donation,
                    caller,
                    &arg::<String>(&args, 0)?,
                )),
                "getTotalStats" => json!(ledger.stats()),
                "getDonations" => json!(ledger.donations_for(&arg::<String>(&args, 0)?)),
                "getDonationsByDonor" => json!(ledger.donations_by(arg(&args, 0)?)),
                _ => return Err(unknown_method(content)),
            });
        }

        if content.canister_id == self.canisters.nft {
            return Ok(match method {
                "mintDonationNFT" => {
                    let donation_id: u64 = arg(&args, 0)?;
                    let donation = state.donations.donation(donation_id);
                    lower_result(state.nfts.mint(
                        caller,
                        donation,
                        arg(&args, 1)?,
                        &arg::<String>(&args, 2)?,
                        arg(&args, 3)?,
                        now,
                    ))
                }
                "tokensOf" => json!(state.nfts.tokens_of(arg(&args, 0)?)),
                "tokenMetadata" => json!(state.nfts.token(arg(&args, 0)?)),
                "getAllNFTs" => json!(state.nfts.tokens),
                "getNFTsByCampaign" => json!(state.nfts.by_campaign(&arg::<String>(&args, 0)?)),
                _ => return Err(unknown_method(content)),
            });
        }

        if content.canister_id == self.canisters.token {
            let token = &mut state.token;
            return Ok(match method {
                "icrc1_name" => json!(token.name),
                "icrc1_symbol" => json!(token.symbol),
                "icrc1_decimals" => json!(token.decimals),
                "icrc1_fee" => json!(token.fee),
                "icrc1_total_supply" => json!(token.total_supply()),
                "icrc1_minting_account" => json!(token.minting_account),
                "icrc1_metadata" => json!([
                    ["icrc1:name", {"Text": token.name}],
                    ["icrc1:symbol", {"Text": token.symbol}],
                    ["icrc1:decimals", {"Nat": token.decimals}],
                    ["icrc1:fee", {"Nat": token.fee}],
                ]),
                "icrc1_balance_of" => json!(token.balance_of(&arg::<Account>(&args, 0)?)),
                "icrc1_transfer" => upper_result(token.transfer(caller, &arg::<TransferArgs>(&args, 0)?)),
                "icrc2_approve" => {
                    upper_result(token.approve(caller, &arg::<ApproveArgs>(&args, 0)?, now as u64))
                }
                "icrc2_allowance" => {
                    json!(token.allowance(&arg::<AllowanceArgs>(&args, 0)?, now as u64))
                }
                "icrc2_transfer_from" => upper_result(token.transfer_from(
                    caller,
                    &arg::<TransferFromArgs>(&args, 0)?,
                    now as u64,
                )),
                _ => return Err(unknown_method(content)),
            });
        }

        Err(rejected(
            404,
            format!("canister {} not found", content.canister_id),
        ))
    }
}

#[async_trait]
impl Transport for MockReplica {
    async fn submit(&self, envelope: &Envelope) -> Result<Value, TransportError> {
        let mut state = self.state();
        if state.unreachable {
            return Err(unreachable());
        }
        envelope
            .verify(now_nanos())
            .map_err(|e| rejected(403, e.to_string()))?;

        let content = &envelope.content;
        state.calls.push(RecordedCall {
            kind: content.kind,
            canister: content.canister_id,
            method: content.method.clone(),
            sender: content.sender,
        });
        self.dispatch(&mut state, content)
    }

    async fn status(&self) -> Result<ReplicaStatus, TransportError> {
        if self.state().unreachable {
            return Err(unreachable());
        }
        Ok(ReplicaStatus {
            impl_version: "mock".to_string(),
            root_key: None,
            healthy: true,
        })
    }
}

/// Holds calls to one method until [`GatedTransport::release`] is called
pub struct GatedTransport<T> {
    inner: T,
    method: String,
    entered: Notify,
    gate: Semaphore,
}

impl<T: Transport> GatedTransport<T> {
    pub fn new(inner: T, method: &str) -> Self {
        Self {
            inner,
            method: method.to_string(),
            entered: Notify::new(),
            gate: Semaphore::new(0),
        }
    }

    /// Resolves once a gated call is waiting
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    /// Let held and future calls through
    pub fn release(&self) {
        self.gate.close();
    }
}

#[async_trait]
impl<T: Transport> Transport for GatedTransport<T> {
    async fn submit(&self, envelope: &Envelope) -> Result<Value, TransportError> {
        if envelope.content.method == self.method {
            self.entered.notify_one();
            // A closed semaphore means the gate is open.
            let _permit = self.gate.acquire().await;
        }
        self.inner.submit(envelope).await
    }

    async fn status(&self) -> Result<ReplicaStatus, TransportError> {
        self.inner.status().await
    }
}

fn arg<T: DeserializeOwned>(args: &[Value], index: usize) -> Result<T, TransportError> {
    let value = args.get(index).cloned().unwrap_or(Value::Null);
    serde_json::from_value(value)
        .map_err(|e| rejected(400, format!("argument {} is invalid: {}", index, e)))
}

/// `{"ok": ..}` / `{"err": ..}`
fn lower_result<T: Serialize, E: Serialize>(result: Result<T, E>) -> Value {
    match result {
        Ok(value) => json!({ "ok": value }),
        Err(err) => json!({ "err": err }),
    }
}

/// `{"Ok": ..}` / `{"Err": ..}`
fn upper_result<T: Serialize, E: Serialize>(result: Result<T, E>) -> Value {
    match result {
        Ok(value) => json!({ "Ok": value }),
        Err(err) => json!({ "Err": err }),
    }
}

fn rejected(code: i64, message: String) -> TransportError {
    TransportError::Rejected { code, message }
}

fn unknown_method(content: &CallContent) -> TransportError {
    rejected(
        404,
        format!(
            "canister {} has no method {}",
            content.canister_id, content.method
        ),
    )
}

fn unreachable() -> TransportError {
    TransportError::Unreachable {
        endpoint: "mock://replica".to_string(),
        reason: "connection refused".to_string(),
    }
}
