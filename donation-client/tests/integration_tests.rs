//! Integration tests for donation-client
//!
//! These tests drive the client end to end against the in-memory replica:
//! - Campaign creation and listing
//! - Donations with NFT receipts
//! - Token ledger transfers and allowances
//! - Session connect, restore and disconnect
//! - Delegated login through the identity provider callback

use assert_matches::assert_matches;
use donation_client::{
    board::CampaignBoard,
    session::{DelegatedProvider, EphemeralProvider, SessionStore},
    types::{ApproveError, CreateCampaign, DonationError, NftError, TransferError, TransferFromError},
    Account, AuthMode, ClientConfig, ClientError, DonationClient, Principal, Session,
    SessionError, Transport,
};
use donation_client_test_utils::{
    campaign, Canisters, GatedTransport, LoginBehaviour, MockIdentityProvider, MockReplica,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const TEST_PASSPHRASE: &str = "correct horse battery staple";

/// One ckUSDT with six decimals
const ONE_TOKEN: u64 = 1_000_000;

struct Harness {
    config: ClientConfig,
    replica: Arc<MockReplica>,
    session: Session,
    client: DonationClient,
}

impl Harness {
    fn new() -> Self {
        let config = ClientConfig::default();
        let replica = Arc::new(MockReplica::new(Canisters::from_config(&config)));
        let session = Session::new(Box::new(EphemeralProvider), None);
        let client = DonationClient::new(&config, replica.clone(), session.handle());
        Self {
            config,
            replica,
            session,
            client,
        }
    }

    async fn connected() -> (Self, Principal) {
        let harness = Self::new();
        let principal = harness.session.connect().await.unwrap();
        (harness, principal)
    }
}

// ============================================================================
// Campaign Tests
// ============================================================================

mod campaigns {
    use super::*;

    #[tokio::test]
    async fn test_create_and_list_campaign() {
        let (h, me) = Harness::connected().await;

        let created = h
            .client
            .donations()
            .create_campaign(&CreateCampaign {
                id: "wells".into(),
                title: "Clean water".into(),
                description: "Wells for three villages".into(),
                target_amount: 5 * ONE_TOKEN,
                end_date: None,
            })
            .await
            .unwrap();
        assert_eq!(created.recipient, me);
        assert_eq!(created.current_amount, 0);
        assert!(created.is_active);

        let listed = h.client.donations().get_campaigns().await.unwrap();
        assert_eq!(listed, vec![created.clone()]);

        let fetched = h.client.donations().get_campaign("wells").await.unwrap();
        assert_eq!(fetched, Some(created));
    }

    #[tokio::test]
    async fn test_duplicate_campaign_is_rejected() {
        let (h, _) = Harness::connected().await;
        let data = CreateCampaign {
            id: "wells".into(),
            title: "Clean water".into(),
            description: String::new(),
            target_amount: ONE_TOKEN,
            end_date: None,
        };
        h.client.donations().create_campaign(&data).await.unwrap();

        let err = h.client.donations().create_campaign(&data).await.unwrap_err();
        assert_matches!(err, ClientError::CreateCampaign(msg) if msg.contains("already exists"));
    }

    #[tokio::test]
    async fn test_unknown_campaign_is_none() {
        let h = Harness::new();
        let fetched = h.client.donations().get_campaign("missing").await.unwrap();
        assert_eq!(fetched, None);
    }

    #[tokio::test]
    async fn test_board_refresh_and_featured() {
        let h = Harness::new();
        let recipient = Principal::self_authenticating(b"recipient");

        let mut half = campaign("half", recipient, 100);
        half.current_amount = 50;
        let mut most = campaign("most", recipient, 100);
        most.current_amount = 90;
        let mut closed = campaign("closed", recipient, 100);
        closed.current_amount = 99;
        closed.is_active = false;
        for c in [half, most, closed] {
            h.replica.add_campaign(c);
        }

        let mut board = CampaignBoard::new();
        board.refresh(h.client.donations()).await.unwrap();
        assert!(board.refreshed_at().is_some());
        assert_eq!(board.stats().total_campaigns, 3);

        let featured: Vec<&str> = board.featured(3).iter().map(|c| c.id.as_str()).collect();
        assert_eq!(featured, vec!["most", "half"]);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_board() {
        let h = Harness::new();
        h.replica
            .add_campaign(campaign("wells", Principal::self_authenticating(b"r"), 100));

        let mut board = CampaignBoard::new();
        board.refresh(h.client.donations()).await.unwrap();
        let before = board.refreshed_at();

        h.replica.set_unreachable(true);
        let err = board.refresh(h.client.donations()).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(board.campaigns().len(), 1);
        assert_eq!(board.refreshed_at(), before);
    }
}

// ============================================================================
// Donation Tests
// ============================================================================

mod donations {
    use super::*;

    #[tokio::test]
    async fn test_donation_mints_receipt() {
        let (h, me) = Harness::connected().await;
        let recipient = Principal::self_authenticating(b"recipient");
        h.replica.add_campaign(campaign("wells", recipient, 2 * ONE_TOKEN));
        h.replica.set_fee(10_000);
        h.replica.mint_tokens(me, 10 * ONE_TOKEN);

        let mut board = CampaignBoard::new();
        board.refresh(h.client.donations()).await.unwrap();

        let outcome = h
            .client
            .donate_and_refresh(&mut board, "wells", ONE_TOKEN, Some("first"))
            .await
            .unwrap();
        assert_eq!(outcome.donation.id, 1);
        assert_eq!(outcome.donation.donor, me);
        assert_eq!(outcome.donation.tx_hash.as_deref(), Some("first"));
        assert_matches!(outcome.receipt, Ok(1));

        // The board reflects the new total without a full refresh.
        let updated = board.campaign("wells").unwrap();
        assert_eq!(updated.current_amount, ONE_TOKEN);
        assert_eq!(updated.progress(), "50.00%");

        let nft = h.client.nfts().token_metadata(1).await.unwrap().unwrap();
        assert_eq!(nft.owner, me);
        assert_eq!(nft.donation_id, 1);
        assert_eq!(nft.attribute("Campaign"), Some("wells"));
        assert_eq!(h.client.nfts().tokens_of(me).await.unwrap(), vec![1]);

        // Approval fee plus the pulled amount and its transfer fee.
        assert_eq!(h.replica.balance(me), 10 * ONE_TOKEN - 10_000 - ONE_TOKEN - 10_000);

        let mine = h.client.donations().get_donations_by_donor(me).await.unwrap();
        assert_eq!(mine.len(), 1);
        let stats = h.client.donations().get_total_stats().await.unwrap();
        assert_eq!(stats.total_amount, ONE_TOKEN);
    }

    #[tokio::test]
    async fn test_donate_requires_connection() {
        let h = Harness::new();
        h.replica
            .add_campaign(campaign("wells", Principal::self_authenticating(b"r"), 100));

        let err = h.client.donate_with_receipt("wells", 10, None).await.unwrap_err();
        assert_matches!(err, ClientError::NotConnected(_));
        assert_eq!(h.replica.calls().len(), 0);
    }

    #[tokio::test]
    async fn test_disconnected_calls_are_anonymous() {
        let (h, me) = Harness::connected().await;
        h.replica
            .add_campaign(campaign("wells", Principal::self_authenticating(b"r"), 100));
        h.replica.mint_tokens(me, 1_000);

        h.session.disconnect().unwrap();
        assert_eq!(h.client.caller(), None);

        let err = h.client.donations().donate("wells", 10, None).await.unwrap_err();
        assert_matches!(err, ClientError::Donation(DonationError::Unauthorized));

        let last = h.replica.calls().pop().unwrap();
        assert_eq!(last.method, "donate");
        assert!(last.sender.is_anonymous());
    }

    #[tokio::test]
    async fn test_inactive_campaign_leaves_board_untouched() {
        let (h, me) = Harness::connected().await;
        h.replica
            .add_campaign(campaign("wells", Principal::self_authenticating(b"r"), 100));
        h.replica.mint_tokens(me, 1_000);

        let mut board = CampaignBoard::new();
        board.refresh(h.client.donations()).await.unwrap();
        h.replica.set_campaign_active("wells", false);

        let err = h
            .client
            .donate_and_refresh(&mut board, "wells", 10, None)
            .await
            .unwrap_err();
        assert_matches!(err, ClientError::Donation(DonationError::CampaignInactive));
        assert!(board.campaign("wells").unwrap().is_active);
        assert!(h.replica.donations().is_empty());
    }

    #[tokio::test]
    async fn test_ended_campaign_is_inactive() {
        let (h, me) = Harness::connected().await;
        let mut ending = campaign("wells", Principal::self_authenticating(b"r"), 100);
        ending.end_date = Some(1_000);
        h.replica.add_campaign(ending);
        h.replica.mint_tokens(me, 1_000);
        h.replica.set_time(2_000);

        let err = h.client.donate_with_receipt("wells", 10, None).await.unwrap_err();
        assert_matches!(err, ClientError::Donation(DonationError::CampaignInactive));
    }

    #[tokio::test]
    async fn test_zero_and_unknown_donations_are_rejected() {
        let (h, me) = Harness::connected().await;
        h.replica
            .add_campaign(campaign("wells", Principal::self_authenticating(b"r"), 100));
        h.replica.mint_tokens(me, 1_000);

        let err = h.client.donate_with_receipt("wells", 0, None).await.unwrap_err();
        assert_matches!(err, ClientError::Donation(DonationError::InsufficientAmount));

        let err = h.client.donate_with_receipt("nowhere", 10, None).await.unwrap_err();
        assert_matches!(err, ClientError::Donation(DonationError::CampaignNotFound));
    }

    #[tokio::test]
    async fn test_donation_without_funds_fails_transfer() {
        let (h, _) = Harness::connected().await;
        h.replica
            .add_campaign(campaign("wells", Principal::self_authenticating(b"r"), 100));

        let err = h.client.donate_with_receipt("wells", 10, None).await.unwrap_err();
        assert_matches!(err, ClientError::Donation(DonationError::TransferFailed));
        assert_eq!(h.replica.campaign("wells").unwrap().current_amount, 0);
    }

    #[tokio::test]
    async fn test_concurrent_donation_is_rejected() {
        let config = ClientConfig::default();
        let replica = Arc::new(MockReplica::new(Canisters::from_config(&config)));
        let gated = Arc::new(GatedTransport::new(Arc::clone(&replica), "donate"));
        let session = Session::new(Box::new(EphemeralProvider), None);
        let me = session.connect().await.unwrap();
        replica.add_campaign(campaign("wells", Principal::self_authenticating(b"r"), 100));
        replica.mint_tokens(me, 1_000);

        let client = Arc::new(DonationClient::new(&config, gated.clone(), session.handle()));
        let first = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.donate_with_receipt("wells", 10, None).await })
        };
        gated.wait_entered().await;

        let err = client.donate_with_receipt("wells", 10, None).await.unwrap_err();
        assert_matches!(err, ClientError::DuplicateSubmission(id) if id == "wells");

        gated.release();
        let outcome = first.await.unwrap().unwrap();
        assert_eq!(outcome.donation.amount, 10);
        assert_eq!(replica.call_count("donate"), 1);

        // The slot is free again once the first donation completes.
        client.donate_with_receipt("wells", 5, None).await.unwrap();
        assert_eq!(replica.call_count("donate"), 2);
    }

    #[tokio::test]
    async fn test_concurrent_donations_to_other_campaigns_keep_allowance() {
        let config = ClientConfig::default();
        let replica = Arc::new(MockReplica::new(Canisters::from_config(&config)));
        let gated = Arc::new(GatedTransport::new(Arc::clone(&replica), "donate"));
        let session = Session::new(Box::new(EphemeralProvider), None);
        let me = session.connect().await.unwrap();
        let recipient = Principal::self_authenticating(b"r");
        replica.add_campaign(campaign("a", recipient, 1_000));
        replica.add_campaign(campaign("b", recipient, 1_000));
        replica.mint_tokens(me, 1_000);

        let client = Arc::new(DonationClient::new(&config, gated.clone(), session.handle()));
        let first = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.donate_with_receipt("a", 100, None).await })
        };
        gated.wait_entered().await;

        // A second approval would replace the one "a" is about to spend.
        let err = client.donate_with_receipt("b", 10, None).await.unwrap_err();
        assert_matches!(err, ClientError::DuplicateSubmission(pending) if pending == "a");
        assert_eq!(replica.call_count("icrc2_approve"), 1);

        gated.release();
        let outcome = first.await.unwrap().unwrap();
        assert_eq!(outcome.donation.amount, 100);
        assert_eq!(replica.campaign("a").unwrap().current_amount, 100);

        let outcome = client.donate_with_receipt("b", 10, None).await.unwrap();
        assert_eq!(outcome.donation.campaign_id, "b");
        assert_eq!(replica.balance(me), 890);
    }

    #[tokio::test]
    async fn test_quarter_funded_campaign_reaches_half() {
        let (h, me) = Harness::connected().await;
        let mut wells = campaign("wells", Principal::self_authenticating(b"r"), 10_000_000);
        wells.current_amount = 2_500_000;
        h.replica.add_campaign(wells);
        h.replica.mint_tokens(me, 2_500_000);

        let mut board = CampaignBoard::new();
        board.refresh(h.client.donations()).await.unwrap();
        assert_eq!(board.campaign("wells").unwrap().progress(), "25.00%");

        h.client
            .donate_and_refresh(&mut board, "wells", 2_500_000, None)
            .await
            .unwrap();
        let updated = board.campaign("wells").unwrap();
        assert_eq!(updated.current_amount, 5_000_000);
        assert_eq!(updated.progress(), "50.00%");
        assert_eq!(updated.remaining(), 5_000_000);
    }

    #[tokio::test]
    async fn test_receipt_cannot_be_minted_twice() {
        let (h, me) = Harness::connected().await;
        h.replica
            .add_campaign(campaign("wells", Principal::self_authenticating(b"r"), 100));
        h.replica.mint_tokens(me, 1_000);

        let outcome = h.client.donate_with_receipt("wells", 10, None).await.unwrap();
        let donation = outcome.donation;

        let err = h
            .client
            .nfts()
            .mint_donation_nft(donation.id, me, &donation.campaign_id, donation.amount)
            .await
            .unwrap_err();
        assert_matches!(err, ClientError::Nft(NftError::AlreadyExists));
        assert_eq!(h.replica.nfts().len(), 1);
    }

    #[tokio::test]
    async fn test_only_recipient_withdraws() {
        let (h, me) = Harness::connected().await;
        h.replica.add_campaign(campaign("mine", me, 100));
        h.replica.mint_tokens(me, 1_000);
        h.client.donate_with_receipt("mine", 100, None).await.unwrap();
        assert!(h.replica.campaign("mine").unwrap().withdrawable);

        let before = h.replica.balance(me);
        let paid = h.client.donations().withdraw("mine").await.unwrap();
        assert_eq!(paid, 100);
        assert_eq!(h.replica.balance(me), before + 100);

        let other = campaign("theirs", Principal::self_authenticating(b"other"), 100);
        h.replica.add_campaign(other);
        let err = h.client.donations().withdraw("theirs").await.unwrap_err();
        assert_matches!(err, ClientError::Donation(DonationError::Unauthorized));
    }
}

// ============================================================================
// Token Ledger Tests
// ============================================================================

mod token_ledger {
    use super::*;

    #[tokio::test]
    async fn test_token_info() {
        let h = Harness::new();
        h.replica.set_fee(10_000);
        h.replica
            .mint_tokens(Principal::self_authenticating(b"holder"), 3 * ONE_TOKEN);

        let info = h.client.token().token_info().await.unwrap();
        assert_eq!(info.symbol, h.config.token_symbol);
        assert_eq!(info.decimals, h.config.token_decimals);
        assert_eq!(info.fee, 10_000);
        assert_eq!(info.total_supply, 3 * ONE_TOKEN);

        let metadata = h.client.token().metadata().await.unwrap();
        assert!(metadata.iter().any(|(key, _)| key == "icrc1:fee"));
    }

    #[tokio::test]
    async fn test_transfer_moves_balance() {
        let (h, me) = Harness::connected().await;
        let friend = Principal::self_authenticating(b"friend");
        h.replica.mint_tokens(me, ONE_TOKEN);

        h.client
            .token()
            .transfer(Account::from(friend), 250_000, Some(b"thanks".to_vec()))
            .await
            .unwrap();
        assert_eq!(
            h.client.token().balance_of(&Account::from(friend)).await.unwrap(),
            250_000
        );
        assert_eq!(h.replica.balance(me), 750_000);
    }

    #[tokio::test]
    async fn test_transfer_insufficient_funds() {
        let (h, me) = Harness::connected().await;
        h.replica.mint_tokens(me, 100);

        let err = h
            .client
            .token()
            .transfer(Account::from(Principal::self_authenticating(b"x")), 500, None)
            .await
            .unwrap_err();
        assert_matches!(
            err,
            ClientError::Transfer(TransferError::InsufficientFunds { balance: 100 })
        );
    }

    #[tokio::test]
    async fn test_allowance_is_consumed() {
        let (owner_side, owner) = Harness::connected().await;
        owner_side.replica.mint_tokens(owner, 2 * ONE_TOKEN);

        // A second session on the same replica acts as the spender.
        let spender_session = Session::new(Box::new(EphemeralProvider), None);
        let spender = spender_session.connect().await.unwrap();
        let spender_client = DonationClient::new(
            &owner_side.config,
            owner_side.replica.clone(),
            spender_session.handle(),
        );

        owner_side
            .client
            .token()
            .approve(Account::from(spender), ONE_TOKEN, None)
            .await
            .unwrap();
        let allowance = owner_side
            .client
            .token()
            .allowance(Account::from(owner), Account::from(spender))
            .await
            .unwrap();
        assert_eq!(allowance.allowance, ONE_TOKEN);

        spender_client
            .token()
            .transfer_from(Account::from(owner), Account::from(spender), ONE_TOKEN)
            .await
            .unwrap();
        assert_eq!(owner_side.replica.balance(spender), ONE_TOKEN);

        let err = spender_client
            .token()
            .transfer_from(Account::from(owner), Account::from(spender), 1)
            .await
            .unwrap_err();
        assert_matches!(
            err,
            ClientError::TransferFrom(TransferFromError::InsufficientAllowance { allowance: 0 })
        );
    }

    #[tokio::test]
    async fn test_expired_approval_is_rejected() {
        let (h, me) = Harness::connected().await;
        h.replica.mint_tokens(me, ONE_TOKEN);
        h.replica.set_time(5_000);

        let err = h
            .client
            .token()
            .approve(
                Account::from(Principal::self_authenticating(b"spender")),
                100,
                Some(1_000),
            )
            .await
            .unwrap_err();
        assert_matches!(err, ClientError::Approve(ApproveError::Expired { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_replica_is_transient() {
        let h = Harness::new();
        h.replica.set_unreachable(true);

        let err = h.client.token().fee().await.unwrap_err();
        assert_matches!(err, ClientError::Transport(_));
        assert!(err.is_transient());
        assert!(h.client.agent().status().await.is_err());
    }
}

// ============================================================================
// Session Tests
// ============================================================================

mod sessions {
    use super::*;

    #[tokio::test]
    async fn test_reconnect_uses_new_principal() {
        let (h, first) = Harness::connected().await;
        h.client.token().fee().await.unwrap();

        h.session.disconnect().unwrap();
        let second = h.session.connect().await.unwrap();
        assert_ne!(first, second);
        h.client.token().fee().await.unwrap();

        let senders: Vec<Principal> = h.replica.calls().iter().map(|c| c.sender).collect();
        assert_eq!(senders, vec![first, second]);
    }

    #[tokio::test]
    async fn test_session_restores_from_store() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("session.json");

        let session = Session::new(
            Box::new(EphemeralProvider),
            Some(SessionStore::new(&path, TEST_PASSPHRASE)),
        );
        let principal = session.connect().await.unwrap();

        let resumed = Session::new(
            Box::new(EphemeralProvider),
            Some(SessionStore::new(&path, TEST_PASSPHRASE)),
        );
        assert!(resumed.restore().unwrap());
        assert_eq!(resumed.principal(), Some(principal));

        resumed.disconnect().unwrap();
        assert!(!path.exists());
    }
}

// ============================================================================
// Delegated Login Tests
// ============================================================================

mod delegated_login {
    use super::*;

    fn delegated_session(
        idp: &Arc<MockIdentityProvider>,
        login_timeout: Duration,
        store: Option<SessionStore>,
    ) -> Session {
        let provider = DelegatedProvider::new(
            "https://identity.example/",
            0,
            login_timeout,
            Duration::from_secs(3600),
            idp.presenter(),
        );
        Session::new(Box::new(provider), store)
    }

    #[tokio::test]
    async fn test_approved_login_signs_as_user() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("session.json");
        let idp = MockIdentityProvider::new(LoginBehaviour::Approve);
        let session = delegated_session(
            &idp,
            Duration::from_secs(10),
            Some(SessionStore::new(&path, TEST_PASSPHRASE)),
        );

        let principal = session.connect().await.unwrap();
        assert_eq!(principal, idp.user_principal());
        assert_eq!(session.mode(), AuthMode::Delegated);

        // The replica accepts calls signed by the delegated session key.
        let config = ClientConfig::default();
        let replica = Arc::new(MockReplica::new(Canisters::from_config(&config)));
        let client = DonationClient::new(&config, replica.clone(), session.handle());
        client.token().fee().await.unwrap();
        assert_eq!(replica.calls()[0].sender, idp.user_principal());

        let store = SessionStore::new(&path, TEST_PASSPHRASE);
        let summary = store.summary().unwrap().unwrap();
        assert_eq!(summary.principal, principal);
        assert_eq!(summary.mode, AuthMode::Delegated);

        let resumed = Session::new(Box::new(EphemeralProvider), Some(store));
        assert!(resumed.restore().unwrap());
        assert_eq!(resumed.principal(), Some(principal));
    }

    #[tokio::test]
    async fn test_denied_login_stays_disconnected() {
        let idp = MockIdentityProvider::new(LoginBehaviour::Deny);
        let session = delegated_session(&idp, Duration::from_secs(10), None);

        let err = session.connect().await.unwrap_err();
        assert_matches!(err, SessionError::ProviderFailed(_));
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_abandoned_login_times_out() {
        let idp = MockIdentityProvider::new(LoginBehaviour::Abandon);
        let session = delegated_session(&idp, Duration::from_millis(200), None);

        let err = session.connect().await.unwrap_err();
        assert_matches!(err, SessionError::LoginTimedOut(_));
        assert!(!session.is_connected());
    }
}

#[test]
fn test_replica_is_a_transport() {
    fn assert_transport<T: Transport>() {}
    assert_transport::<MockReplica>();
    assert_transport::<GatedTransport<Arc<MockReplica>>>();
}
